//! # Configuration Management
//!
//! Centralized configuration for the capture parser, the replay queue, and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()` (`WIRE_PLAYBACK_*`)
//!
//! ## Parser Tuning
//! - `eof_markers_per_result` selects the result-set dialect: 2 for the classic
//!   protocol (one marker after column metadata, one after rows), 1 when the
//!   server deprecates the intermediate marker.
//! - `max_buffered_bytes` is the stall guard for a connection whose pending
//!   packet never completes. `0` disables it.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Default MySQL server port, used to infer packet direction
pub const DEFAULT_SERVER_PORT: u16 = 3306;

/// End-of-result markers per result set in the classic protocol
pub const DEFAULT_EOF_MARKERS_PER_RESULT: u8 = 2;

/// Default stall guard: a little over one maximum-size logical packet
pub const DEFAULT_MAX_BUFFERED_BYTES: usize = 32 * 1024 * 1024;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PlaybackConfig {
    #[serde(default)]
    pub parser: ParserConfig,

    #[serde(default)]
    pub replay: ReplayConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PlaybackConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(port) = std::env::var("WIRE_PLAYBACK_SERVER_PORT") {
            config.parser.server_port = port.parse::<u16>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid WIRE_PLAYBACK_SERVER_PORT: {e}"))
            })?;
        }

        if let Ok(markers) = std::env::var("WIRE_PLAYBACK_EOF_MARKERS") {
            if let Ok(val) = markers.parse::<u8>() {
                config.parser.eof_markers_per_result = val;
            }
        }

        if let Ok(limit) = std::env::var("WIRE_PLAYBACK_MAX_BUFFERED_BYTES") {
            if let Ok(val) = limit.parse::<usize>() {
                config.parser.max_buffered_bytes = val;
            }
        }

        if let Ok(depth) = std::env::var("WIRE_PLAYBACK_QUEUE_WARN_DEPTH") {
            if let Ok(val) = depth.parse::<usize>() {
                config.replay.queue_warn_depth = val;
            }
        }

        if let Ok(timeout) = std::env::var("WIRE_PLAYBACK_QUERY_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.replay.query_timeout = Duration::from_millis(val);
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate the configuration. An empty list means it is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.parser.validate());
        errors.extend(self.replay.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Capture parser configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ParserConfig {
    /// Port the captured server listens on; traffic to it is client-origin
    pub server_port: u16,

    /// End-of-result markers that complete one result set
    pub eof_markers_per_result: u8,

    /// Maximum bytes buffered for one direction before the connection is
    /// resynchronized (0 = unlimited)
    pub max_buffered_bytes: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            server_port: DEFAULT_SERVER_PORT,
            eof_markers_per_result: DEFAULT_EOF_MARKERS_PER_RESULT,
            max_buffered_bytes: DEFAULT_MAX_BUFFERED_BYTES,
        }
    }
}

impl ParserConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.server_port == 0 {
            errors.push("Server port cannot be 0".to_string());
        }

        if !(1..=2).contains(&self.eof_markers_per_result) {
            errors.push(format!(
                "Invalid eof_markers_per_result: {} (valid values: 1 or 2)",
                self.eof_markers_per_result
            ));
        }

        if self.max_buffered_bytes != 0 && self.max_buffered_bytes < 1024 {
            errors.push("Max buffered bytes too small (minimum: 1 KB, or 0 to disable)".to_string());
        }

        errors
    }

    /// Stall guard in effect, if any
    pub fn buffer_limit(&self) -> Option<usize> {
        (self.max_buffered_bytes > 0).then_some(self.max_buffered_bytes)
    }

    /// Marker count the parser runs with, clamped to the two known dialects
    pub fn markers_per_result(&self) -> u8 {
        self.eof_markers_per_result.clamp(1, 2)
    }
}

/// Replay queue configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplayConfig {
    /// Per-session queue depth above which a warning is logged
    pub queue_warn_depth: usize,

    /// Upper bound on a single replayed query before it is reported as failed
    #[serde(with = "duration_serde")]
    pub query_timeout: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            queue_warn_depth: 1024,
            query_timeout: Duration::from_secs(30),
        }
    }
}

impl ReplayConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.queue_warn_depth == 0 {
            errors.push("Queue warn depth must be greater than 0".to_string());
        }

        if self.query_timeout.as_millis() < 10 {
            errors.push("Query timeout too short (minimum: 10ms)".to_string());
        } else if self.query_timeout.as_secs() > 3600 {
            errors.push("Query timeout too long (maximum: 1 hour)".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("wire-playback"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
