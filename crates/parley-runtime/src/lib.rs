//! Parley Runtime - hosting layer for Parley bots.
//!
//! This crate provides:
//! - Layered configuration (`ConfigLoader`, `ParleyConfig`) via figment
//! - Logging setup (`LoggingBuilder`, `init_from_config`)
//! - The web-hook HTTP host (`WebHookServer`)
//! - Runtime orchestration (`ParleyRuntime`)
//!
//! ```ignore
//! use parley_runtime::ParleyRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut runtime = ParleyRuntime::new();
//!     runtime.register_adapter(MyAdapter::connect().await?);
//!     runtime.handle(ping());
//!
//!     // Run until Ctrl+C
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod webhook;

pub use config::{ConfigError, ConfigLoader, ConfigResult, ParleyConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, fmt_span, init_from_config};
pub use runtime::{ParleyRuntime, RuntimeBuilder};
pub use webhook::WebHookServer;

// Re-export tracing for use by bot crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros and span helpers.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
