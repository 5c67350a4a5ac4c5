//! Core data types for the storage layer.
//!
//! - [`LogRecord`]: one persisted probe outcome, one line in the log file
//! - [`TestMode`]: what triggered the probe
//! - [`ProbeStatus`]: whether the target was reachable

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Timestamp format used in the log file and the JSON API.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// First line written to a fresh log file.
pub const LOG_HEADER: &str = "timestamp\tmode\tstatus\tlatency_ms\tdetail";

/// Number of tab-separated fields in a log line.
const FIELD_COUNT: usize = 5;

/// What triggered a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TestMode {
    /// Button press on the test page.
    Manual,
    /// Interval timer (server-side or client-driven).
    Auto,
}

/// Outcome classification of a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProbeStatus {
    /// Target answered with an accepted status code.
    Success,
    /// Timeout, connection error, or unexpected status code.
    Failed,
}

impl ProbeStatus {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// A single probe outcome as persisted in the log file.
///
/// Records are append-only: once written they are never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Local wall-clock time the probe completed (second precision).
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    pub mode: TestMode,
    pub status: ProbeStatus,
    /// Round-trip time in milliseconds; absent when no response arrived.
    #[serde(serialize_with = "serialize_latency")]
    pub latency_ms: Option<f64>,
    /// Short human-readable description (`HTTP 204`, error text, ...).
    pub detail: String,
}

impl LogRecord {
    /// Format the record as one log line, without the trailing newline.
    pub fn to_line(&self) -> String {
        let latency = self
            .latency_ms
            .map(|ms| format!("{ms:.2}"))
            .unwrap_or_default();
        let detail = self.detail.replace(['\t', '\n', '\r'], " ");
        format!(
            "{}\t{}\t{}\t{}\t{}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.mode,
            self.status,
            latency,
            detail
        )
    }

    /// Parse a single log line.
    ///
    /// Returns `None` for the header and for malformed lines. An unparseable
    /// latency is read as absent rather than rejecting the whole line.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line == LOG_HEADER {
            return None;
        }

        let mut fields = line.splitn(FIELD_COUNT, '\t');
        let timestamp = fields.next()?;
        let mode = fields.next()?;
        let status = fields.next()?;
        let latency = fields.next()?;
        let detail = fields.next()?;

        Some(Self {
            timestamp: NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).ok()?,
            mode: mode.parse().ok()?,
            status: status.parse().ok()?,
            latency_ms: latency.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            detail: detail.to_string(),
        })
    }
}

/// Round to two decimals for presentation.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn serialize_latency<S>(latency: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match latency {
        Some(ms) => serializer.serialize_some(&round2(*ms)),
        None => serializer.serialize_none(),
    }
}

pub(crate) mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&ts.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}
