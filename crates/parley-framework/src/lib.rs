//! # Parley Framework
//!
//! Handlers, command routing and the dispatch loop.
//!
//! This layer provides:
//! - Capability traits for raw, hears, command, background and web-hook
//!   handlers, plus closure wrappers for each ([`handler`])
//! - Command sets with prefix resolution and nested sub-commands
//!   ([`command`])
//! - The [`Mux`], which routes messages to many handlers and answers `help`
//! - The [`Dispatcher`], which pumps messages from adapters into a handler
//! - [`ChannelAdapter`], an in-process adapter for tests and embedding

pub mod channel;
pub mod command;
pub mod dispatch;
pub mod handler;
pub mod mux;

pub use channel::{ChannelAdapter, ChannelAdapterHandle};
pub use command::{CommandSet, command_usage, run_command};
pub use dispatch::{DEFAULT_QUEUE_CAPACITY, DispatchState, Dispatcher, run_loop};
pub use handler::{
    BackgroundHandler, BoxedHandler, CommandHandler, CommandOutcome, CommandResult, Handler,
    HearsHandler, RawHandler, WebHookHandler, background_handler, command_group, command_handler,
    command_handler_with_subs, hears_handler, raw_handler, webhook_handler,
};
pub use mux::Mux;

pub use futures::future::BoxFuture;
