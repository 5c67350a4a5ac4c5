//! Storage Layer
//!
//! Flat-file persistence for probe outcomes:
//! - **Writer**: append-only, one synced line per record, serialized by a lock
//! - **Reader**: streaming line parser that skips malformed lines
//! - **Aggregator**: derives counts, hourly buckets and latency series
//!
//! # Components
//!
//! - [`LogStore`]: Append/read facade over the log file
//! - [`LogRecord`]: One persisted probe outcome
//! - [`AggregateStats`]: Derived statistics for the stats page

mod error;
mod log_file;
mod stats;
mod types;

pub use error::StorageError;
pub use log_file::LogStore;
pub use stats::{
    AggregateStats, LATENCY_SERIES_LIMIT, LatencyPoint, ModeCounts, StatsSummary, StatusCounts,
};
pub use types::{LOG_HEADER, LogRecord, ProbeStatus, TIMESTAMP_FORMAT, TestMode};
