//! HTTP endpoint reachability probe.
//!
//! Measures request latency to a fixed URL and classifies the response status.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::probe::{Probe, ProbeError, ProbeOutcome};

/// Default probe target. Answers `204 No Content` when the internet is reachable.
pub const DEFAULT_TARGET_URL: &str = "https://www.google.com/generate_204";

/// Default request timeout (5 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Status codes counted as success by default.
pub const DEFAULT_ACCEPTED_STATUSES: [u16; 2] = [200, 204];

fn default_url() -> String {
    DEFAULT_TARGET_URL.to_string()
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_accepted_statuses() -> Vec<u16> {
    DEFAULT_ACCEPTED_STATUSES.to_vec()
}

/// Configuration for the HTTP probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Target URL (HTTP or HTTPS).
    #[serde(default = "default_url")]
    pub url: String,
    /// Request timeout (default: 5s).
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// Status codes that count as reachable (default: 200, 204).
    #[serde(default = "default_accepted_statuses")]
    pub accepted_statuses: Vec<u16>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            timeout: DEFAULT_TIMEOUT,
            accepted_statuses: default_accepted_statuses(),
        }
    }
}

impl ProbeConfig {
    /// Create a probe configuration for the given URL with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the accepted status codes.
    pub fn with_accepted_statuses(mut self, statuses: Vec<u16>) -> Self {
        self.accepted_statuses = statuses;
        self
    }
}

/// HTTP reachability probe.
pub struct HttpProbe {
    config: ProbeConfig,
    client: Client,
}

impl HttpProbe {
    /// Create a new HTTP probe.
    ///
    /// # Errors
    /// Returns `ProbeError::Config` if the HTTP client cannot be built.
    pub fn new(config: ProbeConfig) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProbeError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }
}

impl std::fmt::Debug for HttpProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProbe")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Probe for HttpProbe {
    fn target(&self) -> &str {
        &self.config.url
    }

    async fn probe(&self) -> ProbeOutcome {
        let probe_timeout = self.config.timeout;
        let request = self.client.get(&self.config.url);

        let start = Instant::now();
        let result = timeout(probe_timeout, request.send()).await;
        let ms = start.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(Ok(response)) => {
                let status = response.status().as_u16();
                let detail = format!("HTTP {}", status);

                if self.config.accepted_statuses.contains(&status) {
                    tracing::debug!(
                        url = %self.config.url,
                        latency_ms = ms,
                        status,
                        "HTTP probe successful"
                    );
                    ProbeOutcome::success(ms, detail)
                } else {
                    tracing::warn!(
                        url = %self.config.url,
                        latency_ms = ms,
                        status,
                        expected = ?self.config.accepted_statuses,
                        "HTTP probe got unexpected status"
                    );
                    ProbeOutcome::failure(Some(ms), detail)
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(url = %self.config.url, error = %e, "HTTP probe failed");
                ProbeOutcome::failure(None, error_chain(&e))
            }
            Err(_) => {
                tracing::warn!(
                    url = %self.config.url,
                    timeout_ms = probe_timeout.as_millis(),
                    "HTTP probe timed out"
                );
                ProbeOutcome::failure(None, format!("timed out after {:?}", probe_timeout))
            }
        }
    }
}

/// Flatten an error and its sources into one line.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
