//! Configuration loading from TOML and environment variables.
//!
//! The service reads its configuration from:
//! 1. A TOML config file (optional)
//! 2. Environment variables (override TOML values)
//!
//! Environment variable prefix: NODEPROPS_

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use nodeprops_notify::{NotifyError, WorkerPoolConfig};
use nodeprops_protocol::{
    DEFAULT_NOTIFY_MAX_CALLBACK_THREADS, DEFAULT_NOTIFY_SHUTDOWN_TIMEOUT_MS,
    DEFAULT_NOTIFY_THREAD_NAME, ENV_PREFIX,
};

use crate::ServiceError;

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Notification delivery configuration.
    #[serde(default)]
    pub notify: NotifyConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Worker pool used to run observer callbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Upper bound on concurrently running observer callbacks. Each
    /// listener with pending callbacks occupies at most one thread.
    #[serde(default = "default_max_callback_threads")]
    pub max_callback_threads: usize,
    /// Grace period for in-flight callbacks on shutdown, in milliseconds.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
    /// Thread name prefix for notification workers.
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "nodeprops_state=debug").
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to output JSON-formatted logs.
    #[serde(default)]
    pub json_format: bool,
}

// -- Defaults --

fn default_max_callback_threads() -> usize {
    DEFAULT_NOTIFY_MAX_CALLBACK_THREADS
}
fn default_shutdown_timeout_ms() -> u64 {
    DEFAULT_NOTIFY_SHUTDOWN_TIMEOUT_MS
}
fn default_thread_name() -> String {
    DEFAULT_NOTIFY_THREAD_NAME.to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

// -- Trait impls --

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            max_callback_threads: default_max_callback_threads(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            thread_name: default_thread_name(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, anyhow::Error> {
        let config: ServiceConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, with environment variable overrides.
    ///
    /// A missing file falls back to defaults. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, anyhow::Error> {
        let mut config = if let Some(path) = path {
            if path.exists() {
                Self::from_file(path)?
            } else {
                tracing::warn!(
                    path = %path.display(),
                    "Config file not found, using defaults"
                );
                Self::default()
            }
        } else {
            Self::default()
        };

        config.apply_overrides(|name| std::env::var(format!("{ENV_PREFIX}{name}")).ok());
        config.validate()?;

        Ok(config)
    }

    /// Apply overrides looked up by unprefixed variable name.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = lookup("LOG_JSON") {
            self.logging.json_format = val == "true" || val == "1";
        }
        if let Some(val) = lookup("MAX_CALLBACK_THREADS") {
            if let Ok(n) = val.parse() {
                self.notify.max_callback_threads = n;
            }
        }
        if let Some(val) = lookup("SHUTDOWN_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                self.notify.shutdown_timeout_ms = ms;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        self.worker_pool_config().validate().map_err(|e| match e {
            NotifyError::InvalidConfig(msg) => {
                ServiceError::InvalidConfig(format!("notify.{msg}"))
            }
            other => ServiceError::Notify(other),
        })
    }

    /// Worker pool settings derived from the `[notify]` section.
    pub fn worker_pool_config(&self) -> WorkerPoolConfig {
        WorkerPoolConfig {
            max_callback_threads: self.notify.max_callback_threads,
            shutdown_timeout: Duration::from_millis(self.notify.shutdown_timeout_ms),
            thread_name: self.notify.thread_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(
            config.notify.max_callback_threads,
            DEFAULT_NOTIFY_MAX_CALLBACK_THREADS
        );
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServiceConfig::from_toml(
            r#"
            [notify]
            max_callback_threads = 4

            [logging]
            json_format = true
            "#,
        )
        .unwrap();
        assert_eq!(config.notify.max_callback_threads, 4);
        assert_eq!(
            config.notify.shutdown_timeout_ms,
            DEFAULT_NOTIFY_SHUTDOWN_TIMEOUT_MS
        );
        assert!(config.logging.json_format);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("LOG_LEVEL", "debug"),
            ("MAX_CALLBACK_THREADS", "8"),
            ("SHUTDOWN_TIMEOUT_MS", "not-a-number"),
        ]
        .into_iter()
        .collect();
        let mut config = ServiceConfig::default();
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.notify.max_callback_threads, 8);
        assert_eq!(
            config.notify.shutdown_timeout_ms,
            DEFAULT_NOTIFY_SHUTDOWN_TIMEOUT_MS,
            "Unparseable overrides are ignored"
        );
    }

    #[test]
    fn test_zero_callback_threads_invalid() {
        let config = ServiceConfig::from_toml("[notify]\nmax_callback_threads = 0\n").unwrap();
        match config.validate() {
            Err(ServiceError::InvalidConfig(msg)) => {
                assert!(msg.starts_with("notify.max_callback_threads"), "{msg}");
            }
            other => panic!("expected invalid config, got {other:?}"),
        }
        // Both layers apply the same rule.
        assert!(config.worker_pool_config().validate().is_err());
    }

    #[test]
    fn test_unknown_notify_key_ignored() {
        let config = ServiceConfig::from_toml("[notify]\nworker_threads = 4\n").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = ServiceConfig::load(Some(Path::new("/nonexistent/nodeprops.toml"))).unwrap();
        assert!(config.notify.max_callback_threads >= 1);
    }

    #[test]
    fn test_worker_pool_config() {
        let config = ServiceConfig::default();
        let pool = config.worker_pool_config();
        assert_eq!(
            pool.shutdown_timeout,
            Duration::from_millis(DEFAULT_NOTIFY_SHUTDOWN_TIMEOUT_MS)
        );
        assert_eq!(pool.thread_name, DEFAULT_NOTIFY_THREAD_NAME);
    }
}
