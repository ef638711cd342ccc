//! # Parley Core
//!
//! Foundation types shared by every layer of the Parley chat-bot framework.
//!
//! This crate knows nothing about command resolution or the
//! dispatch loop. It provides:
//!
//! - **Context**: cancellation plus typed values threaded through every
//!   handler invocation ([`Context`])
//! - **Message**: the normalized chat envelope, with a lazily parsed argument
//!   vector and per-invocation flag state ([`Message`], [`FlagSet`])
//! - **Sending**: the adapter contract and the per-message
//!   [`ResponseWriter`] used to reply ([`Sender`], [`Adapter`])
//! - **Errors**: the handler error taxonomy ([`HandlerError`])
//! - **Metrics**: labelled message counters ([`Metrics`])
//!
//! ## Data flow
//!
//! ```text
//! ┌─────────────┐  Message   ┌────────────────┐  ResponseWriter  ┌─────────┐
//! │   Adapter   │───────────▶│ dispatch loop  │─────────────────▶│ Handler │
//! │ (Slack, ..) │◀───────────│ (framework)    │◀─────────────────│         │
//! └─────────────┘    send    └────────────────┘      write       └─────────┘
//! ```

pub mod context;
pub mod error;
pub mod flags;
pub mod message;
pub mod metrics;
pub mod sender;

pub use context::Context;
pub use error::{HandlerError, HandlerResult};
pub use flags::FlagSet;
pub use message::Message;
pub use metrics::{LabeledCounter, MessageLabels, Metrics};
pub use sender::{Adapter, BoxedAdapter, BoxedSender, NullSender, ResponseWriter, Sender};

/// Prelude for common imports.
pub mod prelude {
    pub use super::{
        Adapter, Context, FlagSet, HandlerError, HandlerResult, Message, ResponseWriter, Sender,
    };
}
