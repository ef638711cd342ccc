//! Handlers built from closures.
//!
//! Each constructor wraps a closure into a named handler with exactly one
//! capability. Closures that borrow their arguments return a
//! [`BoxFuture`] tied to those borrows:
//!
//! ```rust,ignore
//! let ping = command_handler("ping", "check the bot is alive", |_ctx, w, _m| {
//!     Box::pin(async move {
//!         w.write("pong").await;
//!         Ok(CommandOutcome::Success)
//!     })
//! });
//! ```

use std::future::Future;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use parley_core::{BoxedAdapter, Context, HandlerResult, Message, ResponseWriter};
use regex::Regex;
use tracing::warn;
use url::Url;

use super::traits::{
    BackgroundHandler, CommandHandler, CommandOutcome, CommandResult, Handler, HearsHandler,
    RawHandler, WebHookHandler,
};
use crate::command::CommandSet;

type RawFn = Box<
    dyn for<'a> Fn(&'a Context, &'a mut ResponseWriter, &'a Message) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync,
>;

type HearsFn = Box<
    dyn for<'a> Fn(
            &'a Context,
            &'a mut ResponseWriter,
            &'a Message,
            Vec<Vec<String>>,
        ) -> BoxFuture<'a, ()>
        + Send
        + Sync,
>;

type CommandFn = Box<
    dyn for<'a> Fn(&'a Context, &'a mut ResponseWriter, &'a mut Message) -> BoxFuture<'a, CommandResult>
        + Send
        + Sync,
>;

type BackgroundFn = Box<dyn Fn(Context, ResponseWriter) -> BoxFuture<'static, ()> + Send + Sync>;

type WebHookFn = Box<dyn Fn(Context, Request<Body>) -> BoxFuture<'static, Response> + Send + Sync>;

// ============================================================================
// Raw
// ============================================================================

pub struct RawFunc {
    name: String,
    description: String,
    f: RawFn,
}

/// Wraps `f` as a handler that sees every message.
pub fn raw_handler<F>(name: impl Into<String>, description: impl Into<String>, f: F) -> Arc<RawFunc>
where
    F: for<'a> Fn(&'a Context, &'a mut ResponseWriter, &'a Message) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    Arc::new(RawFunc {
        name: name.into(),
        description: description.into(),
        f: Box::new(f),
    })
}

impl Handler for RawFunc {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn as_raw(self: Arc<Self>) -> Option<Arc<dyn RawHandler>> {
        Some(self)
    }
}

#[async_trait]
impl RawHandler for RawFunc {
    async fn process(&self, ctx: &Context, w: &mut ResponseWriter, m: &Message) -> HandlerResult {
        (self.f)(ctx, w, m).await
    }
}

// ============================================================================
// Hears
// ============================================================================

pub struct HearsFunc {
    name: String,
    description: String,
    pattern: Regex,
    f: HearsFn,
}

/// Wraps `f` as a handler for messages matching `pattern`.
pub fn hears_handler<F>(
    name: impl Into<String>,
    description: impl Into<String>,
    pattern: Regex,
    f: F,
) -> Arc<HearsFunc>
where
    F: for<'a> Fn(
            &'a Context,
            &'a mut ResponseWriter,
            &'a Message,
            Vec<Vec<String>>,
        ) -> BoxFuture<'a, ()>
        + Send
        + Sync
        + 'static,
{
    Arc::new(HearsFunc {
        name: name.into(),
        description: description.into(),
        pattern,
        f: Box::new(f),
    })
}

impl Handler for HearsFunc {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn as_hears(self: Arc<Self>) -> Option<Arc<dyn HearsHandler>> {
        Some(self)
    }
}

#[async_trait]
impl HearsHandler for HearsFunc {
    fn hears(&self) -> &Regex {
        &self.pattern
    }

    async fn heard(
        &self,
        ctx: &Context,
        w: &mut ResponseWriter,
        m: &Message,
        submatches: Vec<Vec<String>>,
    ) {
        (self.f)(ctx, w, m, submatches).await;
    }
}

// ============================================================================
// Command
// ============================================================================

pub struct CommandFunc {
    name: String,
    description: String,
    f: CommandFn,
    subs: Option<CommandSet>,
}

/// Wraps `f` as a command handler without sub-commands.
pub fn command_handler<F>(
    name: impl Into<String>,
    description: impl Into<String>,
    f: F,
) -> Arc<CommandFunc>
where
    F: for<'a> Fn(&'a Context, &'a mut ResponseWriter, &'a mut Message) -> BoxFuture<'a, CommandResult>
        + Send
        + Sync
        + 'static,
{
    Arc::new(CommandFunc {
        name: name.into(),
        description: description.into(),
        f: Box::new(f),
        subs: None,
    })
}

/// Wraps `f` as a command handler that may defer to `subs`.
pub fn command_handler_with_subs<F>(
    name: impl Into<String>,
    description: impl Into<String>,
    f: F,
    subs: CommandSet,
) -> Arc<CommandFunc>
where
    F: for<'a> Fn(&'a Context, &'a mut ResponseWriter, &'a mut Message) -> BoxFuture<'a, CommandResult>
        + Send
        + Sync
        + 'static,
{
    Arc::new(CommandFunc {
        name: name.into(),
        description: description.into(),
        f: Box::new(f),
        subs: Some(subs),
    })
}

/// A command that parses its flags and hands off to `subs`.
pub fn command_group(
    name: impl Into<String>,
    description: impl Into<String>,
    subs: CommandSet,
) -> Arc<CommandFunc> {
    command_handler_with_subs(name, description, defer_to_subs, subs)
}

fn defer_to_subs<'a>(
    ctx: &'a Context,
    _w: &'a mut ResponseWriter,
    m: &'a mut Message,
) -> BoxFuture<'a, CommandResult> {
    Box::pin(async move {
        m.parse()?;
        Ok(CommandOutcome::Defer(ctx.clone()))
    })
}

impl Handler for CommandFunc {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn as_command(self: Arc<Self>) -> Option<Arc<dyn CommandHandler>> {
        Some(self)
    }
}

#[async_trait]
impl CommandHandler for CommandFunc {
    async fn command(
        &self,
        ctx: &Context,
        w: &mut ResponseWriter,
        m: &mut Message,
    ) -> CommandResult {
        (self.f)(ctx, w, m).await
    }

    fn sub_commands(&self) -> Option<&CommandSet> {
        self.subs.as_ref()
    }
}

// ============================================================================
// Background
// ============================================================================

pub struct BackgroundFunc {
    name: String,
    description: String,
    f: BackgroundFn,
}

/// Wraps `f` as a handler started once when the dispatch loop starts.
pub fn background_handler<F, Fut>(
    name: impl Into<String>,
    description: impl Into<String>,
    f: F,
) -> Arc<BackgroundFunc>
where
    F: Fn(Context, ResponseWriter) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(BackgroundFunc {
        name: name.into(),
        description: description.into(),
        f: Box::new(move |ctx, w| f(ctx, w).boxed()),
    })
}

impl Handler for BackgroundFunc {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn as_background(self: Arc<Self>) -> Option<Arc<dyn BackgroundHandler>> {
        Some(self)
    }
}

#[async_trait]
impl BackgroundHandler for BackgroundFunc {
    async fn start(&self, ctx: Context, w: ResponseWriter) {
        (self.f)(ctx, w).await;
    }
}

// ============================================================================
// Web hook
// ============================================================================

pub struct WebHookFunc {
    name: String,
    description: String,
    url: OnceLock<Url>,
    adapter: RwLock<Option<BoxedAdapter>>,
    f: WebHookFn,
}

/// Wraps `f` as an HTTP endpoint.
///
/// Replies are sent through the adapter bound to the request context, see
/// [`ResponseWriter::from_context`].
pub fn webhook_handler<F, Fut>(
    name: impl Into<String>,
    description: impl Into<String>,
    f: F,
) -> Arc<WebHookFunc>
where
    F: Fn(Context, Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(WebHookFunc {
        name: name.into(),
        description: description.into(),
        url: OnceLock::new(),
        adapter: RwLock::new(None),
        f: Box::new(move |ctx, req| f(ctx, req).boxed()),
    })
}

impl Handler for WebHookFunc {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn as_webhook(self: Arc<Self>) -> Option<Arc<dyn WebHookHandler>> {
        Some(self)
    }
}

#[async_trait]
impl WebHookHandler for WebHookFunc {
    fn url(&self) -> Option<Url> {
        self.url.get().cloned()
    }

    fn set_url(&self, url: Url) {
        if let Err(url) = self.url.set(url) {
            warn!(handler = %self.name, %url, "web hook URL already assigned");
        }
    }

    fn set_adapter(&self, adapter: BoxedAdapter) {
        *self.adapter.write() = Some(adapter);
    }

    fn adapter(&self) -> Option<BoxedAdapter> {
        self.adapter.read().clone()
    }

    async fn serve_http(&self, ctx: Context, request: Request<Body>) -> Response {
        let ctx = match self.adapter() {
            Some(adapter) if ctx.adapter().is_none() => ctx.with_adapter(adapter),
            _ => ctx,
        };
        (self.f)(ctx, request).await
    }
}
