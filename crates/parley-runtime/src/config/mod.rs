//! Configuration loading for the Parley runtime.

mod error;
mod loader;
mod schema;
mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BotConfig, DispatchConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig,
    ParleyConfig, SpanEventConfig, WebHookConfig,
};
pub use validation::validate_config;
