//! Handler capabilities.
//!
//! Every handler implements [`Handler`], which carries its identity and a set
//! of capability queries. A handler opts into a capability by implementing
//! the matching trait and overriding the query to return itself:
//!
//! ```rust,ignore
//! struct Ping;
//!
//! impl Handler for Ping {
//!     fn name(&self) -> &str { "ping" }
//!     fn description(&self) -> &str { "check the bot is alive" }
//!
//!     fn as_command(self: Arc<Self>) -> Option<Arc<dyn CommandHandler>> {
//!         Some(self)
//!     }
//! }
//!
//! #[async_trait]
//! impl CommandHandler for Ping {
//!     async fn command(&self, _: &Context, w: &mut ResponseWriter, _: &mut Message) -> CommandResult {
//!         w.write("pong").await;
//!         Ok(CommandOutcome::Success)
//!     }
//! }
//! ```
//!
//! The dispatch loop queries each capability once per message and runs every
//! capability the handler has, independently.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use parley_core::{BoxedAdapter, Context, HandlerError, HandlerResult, Message, ResponseWriter};
use regex::Regex;
use url::Url;

use crate::command::CommandSet;

// ============================================================================
// Outcomes
// ============================================================================

/// How a command invocation finished.
#[derive(Debug, Clone)]
pub enum CommandOutcome {
    /// The command ran.
    Success,
    /// The command wants its usage shown to the user.
    UsageRequested,
    /// Resolution continues in the handler's sub-command set, using the
    /// carried context.
    Defer(Context),
    /// The command handled the message; hears handlers must not see it.
    SkipHears,
}

/// Result of a command invocation.
pub type CommandResult = Result<CommandOutcome, HandlerError>;

// ============================================================================
// Base Trait
// ============================================================================

/// Identity plus capability discovery.
pub trait Handler: Send + Sync + 'static {
    /// Short name; for commands, the word users type.
    fn name(&self) -> &str;

    /// One-line description shown in help.
    fn description(&self) -> &str;

    fn as_raw(self: Arc<Self>) -> Option<Arc<dyn RawHandler>> {
        None
    }

    fn as_hears(self: Arc<Self>) -> Option<Arc<dyn HearsHandler>> {
        None
    }

    fn as_command(self: Arc<Self>) -> Option<Arc<dyn CommandHandler>> {
        None
    }

    fn as_background(self: Arc<Self>) -> Option<Arc<dyn BackgroundHandler>> {
        None
    }

    fn as_webhook(self: Arc<Self>) -> Option<Arc<dyn WebHookHandler>> {
        None
    }
}

/// Type-erased handler.
pub type BoxedHandler = Arc<dyn Handler>;

// ============================================================================
// Capabilities
// ============================================================================

/// Sees every message, unfiltered.
#[async_trait]
pub trait RawHandler: Handler {
    async fn process(&self, ctx: &Context, w: &mut ResponseWriter, m: &Message) -> HandlerResult;
}

/// Sees messages whose text matches a pattern.
#[async_trait]
pub trait HearsHandler: Handler {
    /// The pattern; unanchored unless the pattern anchors itself.
    fn hears(&self) -> &Regex;

    /// Called with every match in the text, each as its list of capture
    /// groups (group 0 first, unmatched groups empty).
    async fn heard(
        &self,
        ctx: &Context,
        w: &mut ResponseWriter,
        m: &Message,
        submatches: Vec<Vec<String>>,
    );
}

/// Handles a command addressed to the bot.
#[async_trait]
pub trait CommandHandler: Handler {
    /// Runs the command. The message's first argument is the command name
    /// and its flag set is fresh.
    async fn command(&self, ctx: &Context, w: &mut ResponseWriter, m: &mut Message)
    -> CommandResult;

    /// Sub-commands consulted when [`command`](Self::command) returns
    /// [`CommandOutcome::Defer`].
    fn sub_commands(&self) -> Option<&CommandSet> {
        None
    }
}

/// Runs for the lifetime of the dispatch loop.
#[async_trait]
pub trait BackgroundHandler: Handler {
    /// Started once; must return when `ctx` is cancelled.
    async fn start(&self, ctx: Context, w: ResponseWriter);
}

/// Serves HTTP requests routed to it by the web-hook host.
#[async_trait]
pub trait WebHookHandler: Handler {
    /// The public URL, once assigned.
    fn url(&self) -> Option<Url>;

    /// Assigns the public URL. Only the first assignment takes effect.
    fn set_url(&self, url: Url);

    /// Binds the adapter requests should reply through.
    fn set_adapter(&self, adapter: BoxedAdapter);

    /// The bound adapter.
    fn adapter(&self) -> Option<BoxedAdapter>;

    async fn serve_http(&self, ctx: Context, request: Request<Body>) -> Response;
}
