//! Sending messages: the adapter contract and response writers.
//!
//! An [`Adapter`] is a [`Sender`] that can also receive. Handlers never talk
//! to adapters directly; each inbound message comes with a
//! [`ResponseWriter`] that remembers where the message came from, so a
//! plain [`write`](ResponseWriter::write) lands back in the same channel.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use crate::context::Context;
use crate::message::Message;
use crate::metrics::Metrics;

/// Anything messages can be delivered to.
#[async_trait]
pub trait Sender: Send + Sync {
    /// Delivers `message`. Failures are the implementor's to report.
    async fn send(&self, ctx: &Context, message: &Message);
}

/// A chat-network connection.
#[async_trait]
pub trait Adapter: Sender {
    /// Waits for the next inbound message. `None` means the adapter closed.
    async fn receive(&self) -> Option<Message>;

    /// Label used in logs and metrics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Type-erased sender.
pub type BoxedSender = Arc<dyn Sender>;

/// Type-erased adapter.
pub type BoxedAdapter = Arc<dyn Adapter>;

/// A sender that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSender;

#[async_trait]
impl Sender for NullSender {
    async fn send(&self, _ctx: &Context, _message: &Message) {}
}

/// Replies to one inbound message.
///
/// Holds a sender, a template message, the label of the adapter it
/// writes through and the context its writes carry. Cloning yields an independent writer with its own
/// template; [`copy`](Self::copy) yields one with a blank template.
#[derive(Clone)]
pub struct ResponseWriter {
    sender: BoxedSender,
    template: Message,
    adapter: String,
    metrics: Arc<Metrics>,
    ctx: Context,
}

impl ResponseWriter {
    /// Creates a writer over `sender` with the given template and label.
    pub fn new(sender: BoxedSender, template: Message, adapter: impl Into<String>) -> Self {
        Self {
            sender,
            template: template.envelope(),
            adapter: adapter.into(),
            metrics: Arc::default(),
            ctx: Context::new(),
        }
    }

    /// Creates a writer replying through `adapter`, labelled with its name.
    pub fn for_adapter(adapter: BoxedAdapter, template: Message) -> Self {
        let label = adapter.name().to_string();
        Self::new(adapter, template, label)
    }

    /// Creates a writer that discards every write.
    pub fn null(template: Message) -> Self {
        Self::new(Arc::new(NullSender), template, "null")
    }

    /// Creates a writer for the adapter bound to `ctx`, if any. Its writes
    /// carry `ctx`.
    pub fn from_context(ctx: &Context) -> Option<Self> {
        ctx.adapter().map(|adapter| {
            Self::for_adapter(adapter, Message::default()).with_context(ctx.clone())
        })
    }

    /// Sets the context passed to the sender by [`write`](Self::write).
    pub fn with_context(mut self, ctx: Context) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Counts sent messages into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Redirects subsequent writes to `channel`.
    pub fn set_channel(&mut self, channel: impl Into<String>) {
        self.template.channel = channel.into();
    }

    /// Addresses subsequent writes to `to`.
    pub fn set_to(&mut self, to: impl Into<String>) {
        self.template.to = to.into();
    }

    /// Swaps the underlying sender, keeping template and label.
    pub fn set_sender(&mut self, sender: BoxedSender) {
        self.sender = sender;
    }

    pub fn template(&self) -> &Message {
        &self.template
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter
    }

    /// A writer on the same sender and label with a blank template.
    pub fn copy(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
            template: Message::default(),
            adapter: self.adapter.clone(),
            metrics: Arc::clone(&self.metrics),
            ctx: self.ctx.clone(),
        }
    }

    /// Sends a fully formed message through the underlying sender.
    pub async fn send(&self, ctx: &Context, message: &Message) {
        self.metrics
            .messages_sent
            .inc(&self.adapter, &message.channel, &message.from);
        trace!(
            adapter = %self.adapter,
            channel = %message.channel,
            to = %message.to,
            "sending message"
        );
        self.sender.send(ctx, message).await;
    }

    /// Sends the template with its text replaced by `text`.
    ///
    /// Every call produces exactly one message. Returns the number of bytes
    /// written.
    pub async fn write(&self, text: impl Into<String>) -> usize {
        let mut message = self.template.clone();
        message.text = text.into();
        let written = message.text.len();
        self.send(&self.ctx, &message).await;
        written
    }
}

#[async_trait]
impl Sender for ResponseWriter {
    async fn send(&self, ctx: &Context, message: &Message) {
        ResponseWriter::send(self, ctx, message).await;
    }
}

impl std::fmt::Debug for ResponseWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseWriter")
            .field("adapter", &self.adapter)
            .field("channel", &self.template.channel)
            .field("to", &self.template.to)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl Sender for Recorder {
        async fn send(&self, _ctx: &Context, message: &Message) {
            self.sent.lock().push(message.clone());
        }
    }

    #[async_trait]
    impl Adapter for Recorder {
        async fn receive(&self) -> Option<Message> {
            None
        }

        fn name(&self) -> &str {
            "recorder"
        }
    }

    fn inbound() -> Message {
        Message::new("ping")
            .with_channel("#ops")
            .with_from("alice")
            .addressed()
    }

    #[tokio::test]
    async fn test_write_uses_template() {
        let recorder = Arc::new(Recorder::default());
        let w = ResponseWriter::new(recorder.clone(), inbound(), "recorder");

        let n = w.write("pong").await;

        let sent = recorder.sent.lock();
        assert_eq!(n, 4);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel, "#ops");
        assert_eq!(sent[0].from, "alice");
        assert_eq!(sent[0].text, "pong");
    }

    #[tokio::test]
    async fn test_each_write_sends_one_message() {
        let recorder = Arc::new(Recorder::default());
        let mut w = ResponseWriter::new(recorder.clone(), inbound(), "recorder");

        w.write("first").await;
        w.set_channel("#dev");
        w.write("second").await;

        let sent = recorder.sent.lock();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].channel, "#ops");
        assert_eq!(sent[1].channel, "#dev");
    }

    #[tokio::test]
    async fn test_copy_has_blank_template() {
        let recorder = Arc::new(Recorder::default());
        let w = ResponseWriter::new(recorder.clone(), inbound(), "recorder");

        let mut copy = w.copy();
        copy.set_channel("#alerts");
        copy.write("fire").await;

        let sent = recorder.sent.lock();
        assert_eq!(copy.adapter_name(), "recorder");
        assert_eq!(sent[0].channel, "#alerts");
        assert_eq!(sent[0].from, "");
        assert_eq!(w.template().channel, "#ops");
    }

    #[tokio::test]
    async fn test_sent_messages_are_counted() {
        let recorder = Arc::new(Recorder::default());
        let metrics = Arc::new(Metrics::default());
        let w = ResponseWriter::for_adapter(recorder, inbound()).with_metrics(metrics.clone());

        w.write("one").await;
        w.write("two").await;

        assert_eq!(metrics.messages_sent.get("recorder", "#ops", "alice"), 2);
    }

    #[tokio::test]
    async fn test_null_writer_discards() {
        let w = ResponseWriter::null(inbound());

        assert_eq!(w.write("nothing").await, 7);
        assert_eq!(w.adapter_name(), "null");
    }

    #[tokio::test]
    async fn test_from_context_uses_bound_adapter() {
        let recorder = Arc::new(Recorder::default());
        let ctx = Context::new().with_adapter(recorder.clone());

        let mut w = ResponseWriter::from_context(&ctx).unwrap();
        w.set_channel("#hooks");
        w.write("hello world").await;

        assert!(ResponseWriter::from_context(&Context::new()).is_none());
        assert_eq!(recorder.sent.lock()[0].channel, "#hooks");
    }

    #[derive(Default)]
    struct CancelWatcher {
        cancelled: Mutex<Vec<bool>>,
    }

    #[async_trait]
    impl Sender for CancelWatcher {
        async fn send(&self, ctx: &Context, _message: &Message) {
            self.cancelled.lock().push(ctx.is_cancelled());
        }
    }

    #[tokio::test]
    async fn test_writes_carry_the_writer_context() {
        let watcher = Arc::new(CancelWatcher::default());
        let ctx = Context::new();
        let w = ResponseWriter::new(watcher.clone(), inbound(), "watcher")
            .with_context(ctx.child());
        let copy = w.copy();

        w.write("before").await;
        ctx.cancel();
        w.write("after").await;
        copy.write("copied").await;

        assert_eq!(*watcher.cancelled.lock(), [false, true, true]);
        assert!(w.context().is_cancelled());
    }
}
