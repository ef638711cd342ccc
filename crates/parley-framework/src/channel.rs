//! An in-process adapter backed by channels.
//!
//! Useful for tests and for embedding a bot behind another event source:
//! the [`ChannelAdapterHandle`] injects inbound messages and observes what
//! the bot sends.

use std::sync::Arc;

use async_trait::async_trait;
use parley_core::{Adapter, Context, Message, Sender};
use tokio::sync::{Mutex, mpsc};
use tracing::warn;

/// Adapter whose traffic flows through in-memory channels.
pub struct ChannelAdapter {
    name: String,
    inbound: Mutex<mpsc::Receiver<Message>>,
    outbound: mpsc::UnboundedSender<Message>,
}

/// The far end of a [`ChannelAdapter`].
pub struct ChannelAdapterHandle {
    inbound: mpsc::Sender<Message>,
    outbound: mpsc::UnboundedReceiver<Message>,
}

impl ChannelAdapter {
    /// Creates an adapter and its handle. `capacity` bounds pending
    /// inbound messages.
    pub fn new(name: impl Into<String>, capacity: usize) -> (Arc<Self>, ChannelAdapterHandle) {
        let (in_tx, in_rx) = mpsc::channel(capacity.max(1));
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let adapter = Arc::new(Self {
            name: name.into(),
            inbound: Mutex::new(in_rx),
            outbound: out_tx,
        });
        let handle = ChannelAdapterHandle {
            inbound: in_tx,
            outbound: out_rx,
        };
        (adapter, handle)
    }
}

#[async_trait]
impl Sender for ChannelAdapter {
    async fn send(&self, _ctx: &Context, message: &Message) {
        if self.outbound.send(message.clone()).is_err() {
            warn!(adapter = %self.name, "outbound channel closed, message dropped");
        }
    }
}

#[async_trait]
impl Adapter for ChannelAdapter {
    async fn receive(&self) -> Option<Message> {
        self.inbound.lock().await.recv().await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl ChannelAdapterHandle {
    /// Delivers `message` to the adapter. Returns `false` if it is gone.
    pub async fn inject(&self, message: Message) -> bool {
        self.inbound.send(message).await.is_ok()
    }

    /// Waits for the next message the bot sent.
    pub async fn recv(&mut self) -> Option<Message> {
        self.outbound.recv().await
    }

    /// The next sent message, if one is already waiting.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.outbound.try_recv().ok()
    }

    /// Closes the inbound side; the adapter's `receive` then returns `None`.
    pub fn close(self) -> mpsc::UnboundedReceiver<Message> {
        self.outbound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let (adapter, mut handle) = ChannelAdapter::new("test", 4);

        assert!(handle.inject(Message::new("hi")).await);
        let inbound = adapter.receive().await.unwrap();
        adapter
            .send(&Context::new(), &Message::new("hello").with_channel("c"))
            .await;

        assert_eq!(inbound.text, "hi");
        assert_eq!(handle.recv().await.unwrap().channel, "c");
        assert_eq!(adapter.name(), "test");
    }

    #[tokio::test]
    async fn test_close_ends_receive() {
        let (adapter, handle) = ChannelAdapter::new("test", 1);

        let _outbound = handle.close();

        assert!(adapter.receive().await.is_none());
    }
}
