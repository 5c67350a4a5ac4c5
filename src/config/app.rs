//! Application configuration structures.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::probe::ProbeConfig;

use super::validation::{ConfigError, expand_env_vars};

// =============================================================================
// Constants
// =============================================================================

/// Default web server port.
pub const DEFAULT_PORT: u16 = 5000;

/// Default directory for `/static` assets, fixed at build time so the
/// binary can run from any working directory.
pub const DEFAULT_STATIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/templates/static");

/// Default log file path, relative to the working directory.
pub const DEFAULT_LOG_PATH: &str = "connectivity_log.txt";

/// Default auto-test interval (30 seconds).
pub const DEFAULT_AUTO_INTERVAL: Duration = Duration::from_secs(30);

/// Minimum auto-test interval (1 second).
pub const MIN_AUTO_INTERVAL: Duration = Duration::from_secs(1);

/// Maximum auto-test interval (1 day).
pub const MAX_AUTO_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

fn default_auto_interval() -> Duration {
    DEFAULT_AUTO_INTERVAL
}

fn default_min_interval() -> Duration {
    MIN_AUTO_INTERVAL
}

fn default_max_interval() -> Duration {
    MAX_AUTO_INTERVAL
}

// =============================================================================
// Server Configuration
// =============================================================================

/// Web server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address (default: "0.0.0.0").
    pub bind: String,

    /// Server port (default: 5000).
    pub port: u16,

    /// Directory served under `/static`.
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
        }
    }
}

// =============================================================================
// Log Configuration
// =============================================================================

/// Connectivity log file configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log file path (default: "connectivity_log.txt").
    pub path: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_LOG_PATH),
        }
    }
}

// =============================================================================
// Auto-test Configuration
// =============================================================================

/// Server-side auto-test timer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoConfig {
    /// Interval used when a start request does not name one (default: 30s).
    #[serde(default = "default_auto_interval", with = "humantime_serde")]
    pub default_interval: Duration,

    /// Smallest interval a start request may ask for (default: 1s).
    #[serde(default = "default_min_interval", with = "humantime_serde")]
    pub min_interval: Duration,

    /// Largest interval a start request may ask for (default: 1 day).
    #[serde(default = "default_max_interval", with = "humantime_serde")]
    pub max_interval: Duration,
}

impl Default for AutoConfig {
    fn default() -> Self {
        Self {
            default_interval: DEFAULT_AUTO_INTERVAL,
            min_interval: MIN_AUTO_INTERVAL,
            max_interval: MAX_AUTO_INTERVAL,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Web server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Log file configuration.
    #[serde(default)]
    pub log: LogConfig,

    /// Probe target configuration.
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Auto-test timer configuration.
    #[serde(default)]
    pub auto: AutoConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// `${VAR}` and `${VAR:-default}` references are expanded before parsing.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Load from a YAML file if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(content);
        // An empty or comment-only document is null, not a mapping.
        let config: Self = if expanded.trim().is_empty() {
            Self::default()
        } else {
            let value: serde_yaml::Value = serde_yaml::from_str(&expanded)?;
            if value.is_null() {
                Self::default()
            } else {
                serde_yaml::from_value(value)?
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate server bind address
        self.server.bind.parse::<IpAddr>().map_err(|_| {
            ConfigError::ValidationError(format!(
                "invalid server bind address: '{}'",
                self.server.bind
            ))
        })?;

        // Validate server port
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server port must be non-zero".to_string(),
            ));
        }

        if self.server.static_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "server static_dir must not be empty".to_string(),
            ));
        }

        if self.log.path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "log path must not be empty".to_string(),
            ));
        }

        // Validate probe URL format
        let url = url::Url::parse(&self.probe.url).map_err(|e| {
            ConfigError::ValidationError(format!("invalid probe URL '{}': {}", self.probe.url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::ValidationError(format!(
                "probe URL must be http or https: '{}'",
                self.probe.url
            )));
        }

        if self.probe.timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "probe timeout must be positive".to_string(),
            ));
        }

        if self.probe.accepted_statuses.is_empty() {
            return Err(ConfigError::ValidationError(
                "probe accepted_statuses must not be empty".to_string(),
            ));
        }
        if let Some(bad) = self
            .probe
            .accepted_statuses
            .iter()
            .find(|s| !(100..=599).contains(*s))
        {
            return Err(ConfigError::ValidationError(format!(
                "probe accepted status out of range: {}",
                bad
            )));
        }

        if self.auto.min_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "auto min_interval must be positive".to_string(),
            ));
        }
        if self.auto.default_interval < self.auto.min_interval {
            return Err(ConfigError::ValidationError(format!(
                "auto default_interval ({:?}) is below min_interval ({:?})",
                self.auto.default_interval, self.auto.min_interval
            )));
        }
        if self.auto.default_interval > self.auto.max_interval {
            return Err(ConfigError::ValidationError(format!(
                "auto default_interval ({:?}) is above max_interval ({:?})",
                self.auto.default_interval, self.auto.max_interval
            )));
        }
        if self.auto.max_interval > MAX_AUTO_INTERVAL * 365 {
            return Err(ConfigError::ValidationError(format!(
                "auto max_interval ({:?}) is above one year",
                self.auto.max_interval
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.static_dir.is_absolute());
        assert!(config.static_dir.join("app.css").is_file());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.log.path, PathBuf::from(DEFAULT_LOG_PATH));
        assert_eq!(config.auto.default_interval, DEFAULT_AUTO_INTERVAL);
    }

    #[test]
    fn test_from_yaml_full() {
        let yaml = r#"
server:
  bind: "127.0.0.1"
  port: 8080
log:
  path: /tmp/connwatch/log.txt
probe:
  url: "http://example.com/health"
  timeout: 3s
  accepted_statuses: [200]
auto:
  default_interval: 1m
  min_interval: 5s
  max_interval: 2h
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.log.path, PathBuf::from("/tmp/connwatch/log.txt"));
        assert_eq!(config.probe.timeout, Duration::from_secs(3));
        assert_eq!(config.probe.accepted_statuses, vec![200]);
        assert_eq!(config.auto.default_interval, Duration::from_secs(60));
        assert_eq!(config.auto.min_interval, Duration::from_secs(5));
        assert_eq!(config.auto.max_interval, Duration::from_secs(2 * 60 * 60));
    }

    #[test]
    fn test_from_yaml_partial_uses_defaults() {
        let config = AppConfig::from_yaml("server:\n  port: 9000\n").unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.probe, ProbeConfig::default());
        assert_eq!(config.auto, AutoConfig::default());
    }

    #[test]
    fn test_from_yaml_empty_document() {
        assert_eq!(AppConfig::from_yaml("").unwrap(), AppConfig::default());
        assert_eq!(
            AppConfig::from_yaml("# nothing here\n").unwrap(),
            AppConfig::default()
        );
    }

    #[test]
    fn test_from_yaml_expands_env_defaults() {
        let yaml = "probe:\n  url: \"${CONNWATCH_TEST_UNSET_URL_98765:-http://fallback.test/}\"\n";
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.probe.url, "http://fallback.test/");
    }

    #[test]
    fn test_config_validation_invalid_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_bind_address() {
        let mut config = AppConfig::default();
        config.server.bind = "not-an-ip".to_string();

        let result = config.validate();
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("invalid server bind address")
        );
    }

    #[test]
    fn test_config_validation_probe() {
        let mut config = AppConfig::default();
        config.probe.url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.probe.url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.probe.timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.probe.accepted_statuses = vec![];
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.probe.accepted_statuses = vec![204, 42];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_auto_intervals() {
        let mut config = AppConfig::default();
        config.auto.min_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.auto.default_interval = Duration::from_millis(500);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.auto.max_interval = Duration::from_secs(10);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.auto.max_interval = Duration::from_secs(u64::MAX);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(dir.path().join("nope.yaml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "log:\n  path: probes.log\n").unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.log.path, PathBuf::from("probes.log"));
    }
}
