//! The dispatch loop.
//!
//! [`Dispatcher`] connects one top-level handler to one or more adapters:
//!
//! 1. If the handler has the background capability it is started once,
//!    replying through the primary adapter.
//! 2. If it has the web-hook capability it is bound to the primary adapter.
//! 3. Every adapter gets a forwarding task that pairs each inbound message
//!    with a [`ResponseWriter`] for that adapter and queues the pair.
//! 4. The loop takes pairs off the queue and, for each capability the
//!    handler has, spawns an independent invocation with its own copy of
//!    the message and writer.
//!
//! The loop stops only when its context is cancelled. Invocations already
//! spawned are not awaited.

use std::sync::Arc;

use parley_core::{BoxedAdapter, Context, Message, Metrics, ResponseWriter};
use regex::Regex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::command::run_command;
use crate::handler::{
    BackgroundHandler, BoxedHandler, CommandHandler, HearsHandler, RawHandler, guarded,
};

/// Default capacity of the inbound queue shared by all adapters.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Lifecycle of a [`Dispatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Starting background handlers and adapter forwarders.
    Starting,
    /// Dispatching messages.
    Running,
    /// Cancelled; in-flight invocations may still be finishing.
    Draining,
}

/// Runs a handler against a set of adapters.
pub struct Dispatcher {
    handler: BoxedHandler,
    primary: BoxedAdapter,
    adapters: Vec<BoxedAdapter>,
    metrics: Arc<Metrics>,
    queue_capacity: usize,
    state: watch::Sender<DispatchState>,
}

impl Dispatcher {
    /// Creates a dispatcher; `primary` receives background and web-hook
    /// traffic.
    pub fn new(handler: BoxedHandler, primary: BoxedAdapter) -> Self {
        Self {
            handler,
            primary,
            adapters: Vec::new(),
            metrics: Arc::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            state: watch::Sender::new(DispatchState::Starting),
        }
    }

    /// Adds a secondary adapter.
    pub fn adapter(mut self, adapter: BoxedAdapter) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Shares message counters with the caller.
    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Sets the inbound queue capacity (at least 1).
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Observes lifecycle transitions.
    pub fn state(&self) -> watch::Receiver<DispatchState> {
        self.state.subscribe()
    }

    /// Runs the loop on a new task.
    pub fn spawn(self, ctx: Context) -> JoinHandle<()> {
        tokio::spawn(self.run(ctx))
    }

    /// Runs the loop until `ctx` is cancelled.
    pub async fn run(self, ctx: Context) {
        self.state.send_replace(DispatchState::Starting);
        info!(
            handler = self.handler.name(),
            adapters = self.adapters.len() + 1,
            "starting dispatch loop"
        );

        if let Some(background) = Arc::clone(&self.handler).as_background() {
            let w = ResponseWriter::for_adapter(Arc::clone(&self.primary), Message::default())
                .with_metrics(Arc::clone(&self.metrics))
                .with_context(ctx.clone());
            tokio::spawn(run_background(ctx.clone(), background, w));
        }

        if let Some(webhook) = Arc::clone(&self.handler).as_webhook() {
            webhook.set_adapter(Arc::clone(&self.primary));
        }

        let (tx, mut rx) = mpsc::channel(self.queue_capacity);
        for adapter in std::iter::once(&self.primary).chain(&self.adapters) {
            tokio::spawn(forward(
                ctx.clone(),
                Arc::clone(adapter),
                tx.clone(),
                Arc::clone(&self.metrics),
            ));
        }
        drop(tx);

        self.state.send_replace(DispatchState::Running);

        loop {
            tokio::select! {
                _ = ctx.cancelled() => break,
                next = rx.recv() => match next {
                    Some((m, w)) => self.fan_out(&ctx, m, w),
                    None => {
                        debug!("all adapters closed, waiting for cancellation");
                        ctx.cancelled().await;
                        break;
                    }
                },
            }
        }

        self.state.send_replace(DispatchState::Draining);
        info!(handler = self.handler.name(), "dispatch loop stopped");
    }

    fn fan_out(&self, ctx: &Context, m: Message, w: ResponseWriter) {
        trace!(
            adapter = w.adapter_name(),
            channel = %m.channel,
            from = %m.from,
            to_bot = m.to_bot,
            "dispatching message"
        );

        if let Some(raw) = Arc::clone(&self.handler).as_raw() {
            tokio::spawn(run_raw(ctx.clone(), raw, w.clone(), m.clone()));
        }
        if let Some(hears) = Arc::clone(&self.handler).as_hears() {
            tokio::spawn(run_hears(ctx.clone(), hears, w.clone(), m.clone()));
        }
        if let Some(command) = Arc::clone(&self.handler).as_command() {
            tokio::spawn(run_top_command(ctx.clone(), command, w, m));
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handler", &self.handler.name())
            .field("primary", &self.primary.name())
            .field("adapters", &self.adapters.len())
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}

/// Runs `handler` against `primary` (and any `adapters`) until `ctx` is
/// cancelled.
pub async fn run_loop(
    ctx: Context,
    handler: BoxedHandler,
    primary: BoxedAdapter,
    adapters: impl IntoIterator<Item = BoxedAdapter>,
) {
    adapters
        .into_iter()
        .fold(Dispatcher::new(handler, primary), Dispatcher::adapter)
        .run(ctx)
        .await;
}

async fn forward(
    ctx: Context,
    adapter: BoxedAdapter,
    tx: mpsc::Sender<(Message, ResponseWriter)>,
    metrics: Arc<Metrics>,
) {
    let name = adapter.name().to_string();
    debug!(adapter = %name, "forwarding messages");

    loop {
        let next = tokio::select! {
            _ = ctx.cancelled() => return,
            next = adapter.receive() => next,
        };
        let Some(m) = next else {
            debug!(adapter = %name, "adapter closed");
            return;
        };

        metrics.messages_received.inc(&name, &m.channel, &m.from);
        let w = ResponseWriter::for_adapter(Arc::clone(&adapter), m.clone())
            .with_metrics(Arc::clone(&metrics))
            .with_context(ctx.clone());

        tokio::select! {
            _ = ctx.cancelled() => return,
            sent = tx.send((m, w)) => if sent.is_err() {
                return;
            },
        }
    }
}

// ============================================================================
// Invocations
// ============================================================================

/// Runs a raw handler, logging its error.
pub async fn run_raw(
    ctx: Context,
    handler: Arc<dyn RawHandler>,
    mut w: ResponseWriter,
    m: Message,
) {
    if let Some(Err(err)) = guarded(handler.name(), handler.process(&ctx, &mut w, &m)).await {
        warn!(handler = handler.name(), error = %err, "raw handler failed");
    }
}

/// Runs a hears handler if its pattern matches. Returns whether it matched.
pub async fn run_hears(
    ctx: Context,
    handler: Arc<dyn HearsHandler>,
    mut w: ResponseWriter,
    m: Message,
) -> bool {
    let submatches = submatches(handler.hears(), &m.text);
    if submatches.is_empty() {
        return false;
    }
    guarded(handler.name(), handler.heard(&ctx, &mut w, &m, submatches)).await;
    true
}

/// Starts a background handler.
pub async fn run_background(
    ctx: Context,
    handler: Arc<dyn BackgroundHandler>,
    w: ResponseWriter,
) {
    info!(handler = handler.name(), "starting background handler");
    guarded(handler.name(), handler.start(ctx, w)).await;
    debug!(handler = handler.name(), "background handler returned");
}

async fn run_top_command(
    ctx: Context,
    handler: Arc<dyn CommandHandler>,
    mut w: ResponseWriter,
    mut m: Message,
) {
    let name = handler.name().to_string();
    if let Err(err) = run_command(&ctx, handler, &mut w, &mut m).await {
        debug!(handler = %name, error = %err, "command failed");
    }
}

/// Every match of `pattern` in `text`, each as its capture groups with
/// unmatched groups empty.
pub fn submatches(pattern: &Regex, text: &str) -> Vec<Vec<String>> {
    pattern
        .captures_iter(text)
        .map(|caps| {
            caps.iter()
                .map(|group| group.map_or_else(String::new, |g| g.as_str().to_string()))
                .collect()
        })
        .collect()
}
