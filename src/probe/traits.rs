//! Core probe traits and types.

use thiserror::Error;

use crate::storage::ProbeStatus;

/// Errors raised while setting up a probe.
///
/// Running a probe never fails: timeouts and connection errors are reported
/// through [`ProbeOutcome`] with [`ProbeStatus::Failed`].
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),
}

/// Result of a single reachability check.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub status: ProbeStatus,
    /// Round-trip time; `None` when no response was received.
    pub latency_ms: Option<f64>,
    /// `HTTP <code>` or the transport error text.
    pub detail: String,
}

impl ProbeOutcome {
    pub fn success(latency_ms: f64, detail: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Success,
            latency_ms: Some(latency_ms),
            detail: detail.into(),
        }
    }

    /// A failed check. Latency is kept when the target answered with an
    /// unexpected status.
    pub fn failure(latency_ms: Option<f64>, detail: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Failed,
            latency_ms,
            detail: detail.into(),
        }
    }
}

/// Core probe trait.
///
/// # Error Handling Philosophy
///
/// `probe()` is infallible by signature. A target that is down, slow or
/// answering with the wrong status is a valid observation and must be
/// returned as a failed [`ProbeOutcome`] so it lands in the log like any other
/// data point.
#[async_trait::async_trait]
pub trait Probe: Send + Sync + 'static {
    /// Human-readable target (URL, host, ...).
    fn target(&self) -> &str;

    /// Perform one check.
    async fn probe(&self) -> ProbeOutcome;
}
