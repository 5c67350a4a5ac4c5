//! connwatch - Connectivity Checker Library
//!
//! Checks reachability of a fixed external URL on demand or on a timer,
//! appends every outcome to a flat log file, and serves aggregate statistics
//! from that log.
//!
//! # Architecture
//!
//! - **Probe**: One HTTP reachability check ([`HttpProbe`])
//! - **Storage**: Append-only log file and aggregation ([`LogStore`], [`AggregateStats`])
//! - **Runner**: Probe + append as a single-flight step ([`TestRunner`])
//! - **Scheduler**: Start/stop interval timer ([`AutoTester`])
//! - **Presentation**: Web UI and JSON API ([`server`])
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use connwatch::{HttpProbe, LogStore, ProbeConfig, TestMode, TestRunner};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let probe = HttpProbe::new(ProbeConfig::default())?;
//! let runner = TestRunner::new(Arc::new(probe), LogStore::new("connectivity_log.txt"));
//! let record = runner.run(TestMode::Manual).await?;
//! println!("{} {:?}", record.status, record.latency_ms);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod probe;
pub mod runner;
pub mod scheduler;
pub mod server;
pub mod storage;

pub use probe::{HttpProbe, Probe, ProbeConfig, ProbeError, ProbeOutcome};
pub use runner::TestRunner;
pub use scheduler::{AutoStatus, AutoTester, SchedulerError, StartReport};
pub use storage::{
    AggregateStats, LogRecord, LogStore, ProbeStatus, StatsSummary, StorageError, TestMode,
};
