//! A handler that multiplexes many handlers.
//!
//! [`Mux`] is the usual top-level handler. It collects raw, hears, command,
//! background and web-hook handlers and routes each message to them:
//!
//! - every raw handler sees every message;
//! - messages addressed to the bot are resolved against the command set,
//!   and failures are reported back to the sender as `error: ...`;
//! - hears handlers whose pattern matches then see the message, unless a
//!   command asked for them to be skipped.
//!
//! A built-in `help` command lists everything registered and shows the
//! usage of individual commands.

use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use parking_lot::RwLock;
use parley_core::{
    BoxedAdapter, Context, HandlerError, HandlerResult, Message, ResponseWriter,
};
use tracing::{debug, warn};
use url::Url;

use crate::command::{CommandSet, command_usage, run_command};
use crate::dispatch::{run_background, run_hears, run_raw};
use crate::handler::{
    BackgroundHandler, BoxedHandler, CommandHandler, CommandOutcome, CommandResult, Handler,
    HearsHandler, RawHandler, WebHookHandler,
};

/// Registered handlers, shared with the help command through the context.
#[derive(Clone, Default)]
struct MuxIndex {
    commands: CommandSet,
    hears: Vec<Arc<dyn HearsHandler>>,
}

impl MuxIndex {
    fn overview(&self) -> String {
        let mut out = String::from("Commands:\n");
        for (name, cmd) in self.commands.list() {
            let _ = writeln!(out, "  {name} - {}", cmd.description());
        }
        if !self.hears.is_empty() {
            out.push_str("Listening for:\n");
            for hears in &self.hears {
                let _ = writeln!(
                    out,
                    "  {} - {} (/{}/)",
                    hears.name(),
                    hears.description(),
                    hears.hears().as_str()
                );
            }
        }
        out.trim_end().to_string()
    }
}

/// Routes messages to registered handlers.
pub struct Mux {
    name: String,
    description: String,
    raw: Vec<Arc<dyn RawHandler>>,
    background: Vec<Arc<dyn BackgroundHandler>>,
    webhooks: Vec<Arc<dyn WebHookHandler>>,
    index: Arc<MuxIndex>,
    url: OnceLock<Url>,
    adapter: RwLock<Option<BoxedAdapter>>,
}

impl Mux {
    /// Creates a mux with only the built-in `help` command.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let mut index = MuxIndex::default();
        index.commands.add(Arc::new(HelpCommand));
        Self {
            name: name.into(),
            description: description.into(),
            raw: Vec::new(),
            background: Vec::new(),
            webhooks: Vec::new(),
            index: Arc::new(index),
            url: OnceLock::new(),
            adapter: RwLock::new(None),
        }
    }

    /// Registers `handler` for every capability it has.
    pub fn handle(&mut self, handler: BoxedHandler) {
        let mut registered = false;
        if let Some(raw) = Arc::clone(&handler).as_raw() {
            self.handle_raw(raw);
            registered = true;
        }
        if let Some(hears) = Arc::clone(&handler).as_hears() {
            self.handle_hears(hears);
            registered = true;
        }
        if let Some(command) = Arc::clone(&handler).as_command() {
            self.handle_command(command);
            registered = true;
        }
        if let Some(background) = Arc::clone(&handler).as_background() {
            self.handle_background(background);
            registered = true;
        }
        if let Some(webhook) = Arc::clone(&handler).as_webhook() {
            self.handle_http(webhook);
            registered = true;
        }
        if !registered {
            warn!(handler = handler.name(), "handler has no capabilities, ignored");
        }
    }

    pub fn handle_raw(&mut self, handler: Arc<dyn RawHandler>) {
        debug!(mux = %self.name, handler = handler.name(), "registered raw handler");
        self.raw.push(handler);
    }

    pub fn handle_hears(&mut self, handler: Arc<dyn HearsHandler>) {
        debug!(
            mux = %self.name,
            handler = handler.name(),
            pattern = handler.hears().as_str(),
            "registered hears handler"
        );
        Arc::make_mut(&mut self.index).hears.push(handler);
    }

    pub fn handle_command(&mut self, handler: Arc<dyn CommandHandler>) {
        debug!(mux = %self.name, handler = handler.name(), "registered command");
        Arc::make_mut(&mut self.index).commands.add(handler);
    }

    pub fn handle_background(&mut self, handler: Arc<dyn BackgroundHandler>) {
        debug!(mux = %self.name, handler = handler.name(), "registered background handler");
        self.background.push(handler);
    }

    /// Registers a web hook, assigning its URL if the mux has one.
    pub fn handle_http(&mut self, handler: Arc<dyn WebHookHandler>) {
        if let Some(base) = self.url.get() {
            self.assign_hook_url(base, handler.as_ref());
        }
        if let Some(adapter) = self.adapter.read().clone() {
            handler.set_adapter(adapter);
        }
        debug!(mux = %self.name, handler = handler.name(), "registered web hook");
        self.webhooks.push(handler);
    }

    /// Registered commands, `help` included.
    pub fn commands(&self) -> &CommandSet {
        &self.index.commands
    }

    pub fn webhooks(&self) -> &[Arc<dyn WebHookHandler>] {
        &self.webhooks
    }

    /// Help text listing every command and hears handler.
    pub fn overview(&self) -> String {
        self.index.overview()
    }

    fn assign_hook_url(&self, base: &Url, hook: &dyn WebHookHandler) {
        match base.join(hook.name()) {
            Ok(url) => {
                debug!(handler = hook.name(), %url, "web hook URL assigned");
                hook.set_url(url);
            }
            Err(err) => warn!(handler = hook.name(), error = %err, "invalid web hook URL"),
        }
    }
}

impl std::fmt::Debug for Mux {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mux")
            .field("name", &self.name)
            .field("raw", &self.raw.len())
            .field("hears", &self.index.hears.len())
            .field("commands", &self.index.commands)
            .field("background", &self.background.len())
            .field("webhooks", &self.webhooks.len())
            .finish()
    }
}

impl Handler for Mux {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn as_raw(self: Arc<Self>) -> Option<Arc<dyn RawHandler>> {
        Some(self)
    }

    fn as_background(self: Arc<Self>) -> Option<Arc<dyn BackgroundHandler>> {
        Some(self)
    }

    fn as_webhook(self: Arc<Self>) -> Option<Arc<dyn WebHookHandler>> {
        Some(self)
    }
}

#[async_trait]
impl RawHandler for Mux {
    async fn process(&self, ctx: &Context, w: &mut ResponseWriter, m: &Message) -> HandlerResult {
        for raw in &self.raw {
            tokio::spawn(run_raw(ctx.clone(), Arc::clone(raw), w.clone(), m.clone()));
        }

        let mut outcome = Ok(CommandOutcome::Success);
        if m.to_bot {
            let ctx = ctx.with_value(Arc::clone(&self.index));
            let mut command = m.clone();
            outcome = self.index.commands.next_command(&ctx, w, &mut command).await;
        }
        if matches!(outcome, Ok(CommandOutcome::SkipHears)) {
            return Ok(());
        }

        let mut heard = false;
        for hears in &self.index.hears {
            if hears.hears().is_match(&m.text) {
                heard = true;
                tokio::spawn(run_hears(ctx.clone(), Arc::clone(hears), w.clone(), m.clone()));
            }
        }

        match outcome {
            Err(HandlerError::UnknownCommand) if heard => {}
            Err(err) => {
                debug!(mux = %self.name, error = %err, "command failed");
                w.write(format!("error: {err}")).await;
            }
            Ok(_) => {}
        }
        Ok(())
    }
}

#[async_trait]
impl BackgroundHandler for Mux {
    async fn start(&self, ctx: Context, w: ResponseWriter) {
        for background in &self.background {
            tokio::spawn(run_background(ctx.clone(), Arc::clone(background), w.clone()));
        }
    }
}

#[async_trait]
impl WebHookHandler for Mux {
    fn url(&self) -> Option<Url> {
        self.url.get().cloned()
    }

    /// Assigns `base/<mux>/` to the mux and `base/<mux>/<hook>` to each hook.
    fn set_url(&self, url: Url) {
        let mut base = url;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let own = match base.join(&format!("{}/", self.name)) {
            Ok(own) => own,
            Err(err) => {
                warn!(mux = %self.name, error = %err, "invalid mux URL");
                return;
            }
        };
        if self.url.set(own).is_err() {
            warn!(mux = %self.name, "mux URL already assigned");
            return;
        }
        if let Some(own) = self.url.get() {
            for hook in &self.webhooks {
                self.assign_hook_url(own, hook.as_ref());
            }
        }
    }

    fn set_adapter(&self, adapter: BoxedAdapter) {
        for hook in &self.webhooks {
            hook.set_adapter(Arc::clone(&adapter));
        }
        *self.adapter.write() = Some(adapter);
    }

    fn adapter(&self) -> Option<BoxedAdapter> {
        self.adapter.read().clone()
    }

    async fn serve_http(&self, ctx: Context, request: Request<Body>) -> Response {
        let path = request.uri().path().trim_end_matches('/').to_string();
        let hook = self.webhooks.iter().find(|hook| {
            hook.url()
                .is_some_and(|url| url.path().trim_end_matches('/') == path)
        });

        match hook {
            Some(hook) => {
                debug!(mux = %self.name, handler = hook.name(), %path, "routing web hook request");
                hook.serve_http(ctx, request).await
            }
            None => (StatusCode::NOT_FOUND, "no such web hook").into_response(),
        }
    }
}

// ============================================================================
// Help
// ============================================================================

struct HelpCommand;

impl Handler for HelpCommand {
    fn name(&self) -> &str {
        "help"
    }

    fn description(&self) -> &str {
        "list commands, or show the usage of one"
    }

    fn as_command(self: Arc<Self>) -> Option<Arc<dyn CommandHandler>> {
        Some(self)
    }
}

#[async_trait]
impl CommandHandler for HelpCommand {
    async fn command(
        &self,
        ctx: &Context,
        w: &mut ResponseWriter,
        m: &mut Message,
    ) -> CommandResult {
        m.parse()?;
        let Some(index) = ctx.value::<Arc<MuxIndex>>() else {
            return Err(HandlerError::failed("help is only available through a mux"));
        };

        let path = m.args().to_vec();
        let Some(first) = path.first() else {
            w.write(index.overview()).await;
            return Ok(CommandOutcome::SkipHears);
        };

        let (mut name, mut handler) = index.commands.resolve(first)?;
        for token in &path[1..] {
            let Some(subs) = handler.sub_commands() else {
                break;
            };
            let next = subs.resolve(token)?;
            (name, handler) = next;
        }

        // Run the target with --help into a throwaway writer so it declares
        // its flags, then render the usage from what it declared.
        let mut dry_run = m.envelope();
        dry_run.set_args(vec![name, "--help".to_string()]);
        let mut sink = ResponseWriter::null(m.envelope());
        if let Err(err) = run_command(ctx, Arc::clone(&handler), &mut sink, &mut dry_run).await {
            debug!(command = handler.name(), error = %err, "help dry run failed");
        }

        w.write(command_usage(handler.as_ref(), dry_run.flags())).await;
        Ok(CommandOutcome::SkipHears)
    }
}
