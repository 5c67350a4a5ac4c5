//! Config errors and the text-level helpers applied before parsing.

use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};
use thiserror::Error;

/// Why a configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    IoError(#[from] std::io::Error),

    #[error("malformed YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// A value parsed but is out of range or inconsistent.
    #[error("invalid config: {0}")]
    ValidationError(String),
}

/// `${NAME}` or `${NAME:-fallback}`.
static ENV_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .expect("env reference pattern is valid")
});

/// Parse a human-readable duration (`30s`, `1m`, `1h30m`, `500ms`).
///
/// Used for CLI overrides; config files go through `humantime_serde`.
///
/// # Examples
///
/// ```
/// use connwatch::config::parse_duration;
///
/// assert_eq!(parse_duration("30s").unwrap().as_secs(), 30);
/// assert_eq!(parse_duration("2m").unwrap().as_secs(), 120);
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    match s.trim() {
        "" => Err("empty duration".to_string()),
        trimmed => humantime::parse_duration(trimmed).map_err(|e| format!("{trimmed:?}: {e}")),
    }
}

/// Replace `${NAME}` / `${NAME:-fallback}` references with environment
/// values. Unset variables without a fallback become empty.
pub fn expand_env_vars(input: &str) -> String {
    ENV_REF
        .replace_all(input, |caps: &Captures| {
            std::env::var(&caps[1])
                .ok()
                .or_else(|| caps.get(2).map(|m| m.as_str().to_string()))
                .unwrap_or_default()
        })
        .into_owned()
}
