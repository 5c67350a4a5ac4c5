//! Configuration module for connwatch.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Server settings (port, bind address)
//! - Log file location
//! - Probe target, timeout and accepted status codes
//! - Auto-test interval defaults

mod app;
mod validation;

pub use app::{AppConfig, AutoConfig, LogConfig, ServerConfig};
pub use validation::{ConfigError, expand_env_vars, parse_duration};

// Re-export constants
pub use app::{
    DEFAULT_AUTO_INTERVAL, DEFAULT_LOG_PATH, DEFAULT_PORT, DEFAULT_STATIC_DIR, MAX_AUTO_INTERVAL,
    MIN_AUTO_INTERVAL,
};
