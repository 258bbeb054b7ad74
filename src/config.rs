//! Runtime configuration loaded from TOML.
//!
//! Every field has a default, so an empty document is a valid configuration:
//!
//! ```toml
//! [tasks]
//! default_model = "default"
//!
//! [events]
//! capacity = 256
//!
//! [live]
//! client_queue_capacity = 64
//!
//! [input_capture]
//! base_url = "http://localhost:8081"
//! timeout_ms = 5000
//!
//! [logging]
//! filter = "info"
//!
//! [database]
//! url = "postgres://localhost/tasklane"
//! pool_size = 8
//! ```

use crate::live::DEFAULT_CLIENT_QUEUE_CAPACITY;
use crate::task::events::DEFAULT_EVENT_CAPACITY;
use crate::task::services::{DEFAULT_INPUT_CAPTURE_TIMEOUT, DEFAULT_MODEL, LifecycleSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskLaneConfig {
    /// Task defaults.
    pub tasks: TasksConfig,
    /// Domain event channel.
    pub events: EventsConfig,
    /// Live notifier.
    pub live: LiveConfig,
    /// Input-capture collaborator.
    pub input_capture: InputCaptureConfig,
    /// Log output.
    pub logging: LoggingConfig,
    /// Optional `PostgreSQL` store.
    pub database: DatabaseConfig,
}

/// `[tasks]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TasksConfig {
    /// Model assigned when a create request names none.
    pub default_model: String,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_owned(),
        }
    }
}

/// `[events]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventsConfig {
    /// Events buffered per subscriber before it lags.
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// `[live]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LiveConfig {
    /// Messages buffered per client before new ones are dropped.
    pub client_queue_capacity: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            client_queue_capacity: DEFAULT_CLIENT_QUEUE_CAPACITY,
        }
    }
}

/// `[input_capture]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputCaptureConfig {
    /// Collaborator base URL; unset disables the hook.
    pub base_url: Option<String>,
    /// Bound for one call in milliseconds.
    pub timeout_ms: u64,
}

impl InputCaptureConfig {
    /// Returns the per-call bound.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for InputCaptureConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: u64::try_from(DEFAULT_INPUT_CAPTURE_TIMEOUT.as_millis())
                .unwrap_or(u64::MAX),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter directive, overridden by `RUST_LOG`.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
        }
    }
}

/// `[database]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection URL; unset selects the in-memory store.
    pub url: Option<String>,
    /// Maximum pooled connections.
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: 8,
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        source: Arc<std::io::Error>,
    },
    /// The document is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is outside its allowed range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted field path.
        field: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },
}

impl TaskLaneConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed input and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise as
    /// [`TaskLaneConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = path.as_ref();
        let document = std::fs::read_to_string(file).map_err(|source| ConfigError::Io {
            path: file.to_path_buf(),
            source: Arc::new(source),
        })?;
        let config = Self::from_toml_str(&document)?;
        tracing::debug!(path = %file.display(), "configuration loaded");
        Ok(config)
    }

    /// Checks ranges that the type system does not.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &'static str| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid { field, reason })
        };
        if self.tasks.default_model.trim().is_empty() {
            return invalid("tasks.default_model", "must not be blank");
        }
        if self.events.capacity == 0 {
            return invalid("events.capacity", "must be at least 1");
        }
        if self.live.client_queue_capacity == 0 {
            return invalid("live.client_queue_capacity", "must be at least 1");
        }
        if self.input_capture.timeout_ms == 0 {
            return invalid("input_capture.timeout_ms", "must be at least 1");
        }
        if self
            .input_capture
            .base_url
            .as_deref()
            .is_some_and(|url| !(url.starts_with("http://") || url.starts_with("https://")))
        {
            return invalid("input_capture.base_url", "must be an http(s) URL");
        }
        if self.database.pool_size == 0 {
            return invalid("database.pool_size", "must be at least 1");
        }
        Ok(())
    }

    /// Lifecycle settings derived from this configuration.
    #[must_use]
    pub fn lifecycle_settings(&self) -> LifecycleSettings {
        LifecycleSettings {
            default_model: self.tasks.default_model.clone(),
            input_capture_timeout: self.input_capture.timeout(),
        }
    }
}
