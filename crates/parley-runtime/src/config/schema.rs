//! Configuration schema definitions.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    /// Identity of the root mux.
    #[serde(default)]
    pub bot: BotConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Dispatch loop settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Web-hook HTTP host settings.
    #[serde(default)]
    pub webhook: WebHookConfig,
}

// =============================================================================
// Bot
// =============================================================================

/// Name and description of the root mux. The name is also the first path
/// segment of every web-hook URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_bot_name")]
    pub name: String,

    #[serde(default)]
    pub description: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            description: String::new(),
        }
    }
}

fn default_bot_name() -> String {
    "parley".to_string()
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to `full` without it.
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Rotation policy for file output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level; `RUST_LOG` takes precedence when set.
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, required when `output` is `file`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    /// Include thread IDs.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include file names and line numbers.
    #[serde(default)]
    pub file_location: bool,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Per-module levels, e.g. `parley_framework = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

// =============================================================================
// Dispatch
// =============================================================================

/// Dispatch loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Capacity of the inbound queue shared by all adapters.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_queue_capacity() -> usize {
    parley_framework::DEFAULT_QUEUE_CAPACITY
}

// =============================================================================
// Web hooks
// =============================================================================

/// Web-hook HTTP host configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebHookConfig {
    /// Serve web hooks over HTTP.
    #[serde(default)]
    pub enabled: bool,

    /// Listen address.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Public base URL hooks are reachable under; derived from `bind` when
    /// unset.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for WebHookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: default_bind(),
            base_url: None,
        }
    }
}

impl WebHookConfig {
    /// The configured base URL, or `http://<bind>/`.
    pub fn public_base(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| format!("http://{}/", self.bind))
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}
