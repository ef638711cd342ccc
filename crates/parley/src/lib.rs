//! # Parley
//!
//! A chat-bot framework: adapters deliver messages, a mux routes them to
//! commands, pattern listeners and raw handlers, and replies go back through
//! the adapter they came from.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐     ┌────────────┐     ┌─────┐──▶ raw handlers      (every message)
//! │ Adapters │────▶│ Dispatcher │────▶│ Mux │──▶ command set       (addressed to the bot)
//! └──────────┘     └────────────┘     └─────┘──▶ hears handlers    (pattern matched)
//!       ▲                                 │
//!       └──────── ResponseWriter ◀────────┘
//! ```
//!
//! - **Adapters**: chat backends; receive inbound and send outbound messages
//! - **Dispatcher**: merges adapter streams and runs each handler on its own task
//! - **Mux**: a registry of handlers, with a built-in `help` command
//! - **Runtime**: configuration, logging, the web-hook host and shutdown
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use parley::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut runtime = ParleyRuntime::new();
//!     runtime.register_adapter(my_adapter());
//!
//!     runtime.handle(command_handler("ping", "check the bot is alive", |_, w, _| {
//!         Box::pin(async move {
//!             w.write("pong").await;
//!             Ok(CommandOutcome::Success)
//!         })
//!     }));
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: read `parley.toml` configuration files (default)
//! - `json-log`: allow `logging.format = "json"`

pub use parley_core as core;
pub use parley_framework as framework;
pub use parley_runtime as runtime;

/// Commonly used types for building bots.
///
/// ```rust,ignore
/// use parley::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use parley_runtime::{ParleyConfig, ParleyRuntime, RuntimeError};

    // Messages and replies
    pub use parley_core::{
        Adapter, BoxedAdapter, Context, FlagSet, HandlerError, HandlerResult, Message,
        ResponseWriter, Sender,
    };

    // Handler capabilities
    pub use parley_framework::{
        BackgroundHandler, BoxFuture, BoxedHandler, CommandHandler, CommandOutcome, CommandResult,
        CommandSet, Handler, HearsHandler, Mux, RawHandler, WebHookHandler,
    };

    // Closure-backed handlers
    pub use parley_framework::{
        background_handler, command_group, command_handler, command_handler_with_subs,
        hears_handler, raw_handler, webhook_handler,
    };

    // Logging macros
    pub use parley_runtime::prelude::*;
}
