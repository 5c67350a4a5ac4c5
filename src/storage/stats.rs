//! Aggregate statistics over the connectivity log.
//!
//! Stats are derived on every request and never persisted.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::storage::types::{LogRecord, ProbeStatus, TestMode, round2, timestamp_format};

/// Maximum number of points returned in the latency time series.
pub const LATENCY_SERIES_LIMIT: usize = 500;

/// Hour bucket key format (`2025-01-02 10`).
const HOUR_BUCKET_FORMAT: &str = "%Y-%m-%d %H";

/// Headline counts and latency figures.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    /// Percentage of successful probes, 0 when there are none.
    pub success_rate: f64,
    pub avg_latency_ms: Option<f64>,
    pub min_latency_ms: Option<f64>,
    pub max_latency_ms: Option<f64>,
}

/// Success/failure counts for one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub success: usize,
    pub failed: usize,
}

impl StatusCounts {
    fn record(&mut self, status: ProbeStatus) {
        match status {
            ProbeStatus::Success => self.success += 1,
            ProbeStatus::Failed => self.failed += 1,
        }
    }
}

/// Probe counts per trigger mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModeCounts {
    pub manual: usize,
    pub auto: usize,
}

/// One point of the latency chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyPoint {
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    pub latency_ms: f64,
    pub status: ProbeStatus,
}

/// Everything the stats page renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateStats {
    pub summary: StatsSummary,
    pub by_mode: ModeCounts,
    /// Hour bucket (`YYYY-MM-DD HH`) to counts, in chronological order.
    pub hourly: BTreeMap<String, StatusCounts>,
    /// Most recent latency samples, oldest first.
    pub latency_series: Vec<LatencyPoint>,
}

impl AggregateStats {
    /// Aggregate records, optionally keeping only those at or after `since`.
    pub fn from_records<'a, I>(records: I, since: Option<NaiveDateTime>) -> Self
    where
        I: IntoIterator<Item = &'a LogRecord>,
    {
        let mut stats = Self::default();
        let mut latency_sum = 0.0;
        let mut latency_count = 0usize;
        let mut min_latency: Option<f64> = None;
        let mut max_latency: Option<f64> = None;

        for record in records {
            if since.is_some_and(|start| record.timestamp < start) {
                continue;
            }

            stats.summary.total += 1;
            match record.status {
                ProbeStatus::Success => stats.summary.success += 1,
                ProbeStatus::Failed => stats.summary.failed += 1,
            }
            match record.mode {
                TestMode::Manual => stats.by_mode.manual += 1,
                TestMode::Auto => stats.by_mode.auto += 1,
            }

            stats
                .hourly
                .entry(record.timestamp.format(HOUR_BUCKET_FORMAT).to_string())
                .or_default()
                .record(record.status);

            if let Some(ms) = record.latency_ms {
                latency_sum += ms;
                latency_count += 1;
                min_latency = Some(min_latency.map_or(ms, |m| m.min(ms)));
                max_latency = Some(max_latency.map_or(ms, |m| m.max(ms)));
                stats.latency_series.push(LatencyPoint {
                    timestamp: record.timestamp,
                    latency_ms: round2(ms),
                    status: record.status,
                });
            }
        }

        if stats.summary.total > 0 {
            stats.summary.success_rate =
                round2(stats.summary.success as f64 / stats.summary.total as f64 * 100.0);
        }
        if latency_count > 0 {
            stats.summary.avg_latency_ms = Some(round2(latency_sum / latency_count as f64));
        }
        stats.summary.min_latency_ms = min_latency.map(round2);
        stats.summary.max_latency_ms = max_latency.map(round2);

        let overflow = stats
            .latency_series
            .len()
            .saturating_sub(LATENCY_SERIES_LIMIT);
        if overflow > 0 {
            stats.latency_series.drain(..overflow);
        }

        stats
    }
}
