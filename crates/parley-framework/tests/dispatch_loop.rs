use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parley_core::{Context, HandlerResult, Message, Metrics, ResponseWriter};
use parley_framework::{
    ChannelAdapter, ChannelAdapterHandle, CommandHandler, CommandOutcome, CommandResult,
    DispatchState, Dispatcher, Handler, HearsHandler, Mux, RawHandler, background_handler,
    command_handler, hears_handler, raw_handler,
};
use regex::Regex;

async fn reply(handle: &mut ChannelAdapterHandle) -> Message {
    tokio::time::timeout(Duration::from_secs(2), handle.recv())
        .await
        .expect("timed out waiting for reply")
        .expect("adapter closed")
}

fn bot() -> Mux {
    let mut mux = Mux::new("bot", "integration test bot");
    mux.handle(command_handler("ping", "check the bot is alive", |_, w, _| {
        Box::pin(async move {
            w.write("pong").await;
            Ok(CommandOutcome::Success)
        })
    }));
    mux.handle(command_handler("say", "repeat the arguments", |_, w, m| {
        Box::pin(async move {
            m.parse()?;
            w.write(m.args().join("|")).await;
            Ok(CommandOutcome::Success)
        })
    }));
    mux.handle(hears_handler(
        "anchored",
        "only exact hello",
        Regex::new("^hello$").unwrap(),
        |_, w, _, _| {
            Box::pin(async move {
                w.write("hi there").await;
            })
        },
    ));
    mux
}

#[tokio::test]
async fn test_replies_go_back_to_origin_channel() {
    let (adapter, mut handle) = ChannelAdapter::new("chan", 8);
    let ctx = Context::new();
    let task = Dispatcher::new(Arc::new(bot()), adapter).spawn(ctx.clone());

    handle
        .inject(Message::new("ping").with_channel("#ops").addressed())
        .await;
    let m = reply(&mut handle).await;

    assert_eq!(m.text, "pong");
    assert_eq!(m.channel, "#ops");

    ctx.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn test_quoted_arguments_survive_tokenizing() {
    let (adapter, mut handle) = ChannelAdapter::new("chan", 8);
    let ctx = Context::new();
    let task = Dispatcher::new(Arc::new(bot()), adapter).spawn(ctx.clone());

    handle
        .inject(Message::new(r#"say "hello world" again"#).addressed())
        .await;

    assert_eq!(reply(&mut handle).await.text, "hello world|again");

    ctx.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn test_hears_respects_anchors() {
    let (adapter, mut handle) = ChannelAdapter::new("chan", 8);
    let ctx = Context::new();
    let task = Dispatcher::new(Arc::new(bot()), adapter).spawn(ctx.clone());

    handle.inject(Message::new("well hello there")).await;
    handle.inject(Message::new("hello")).await;

    assert_eq!(reply(&mut handle).await.text, "hi there");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(handle.try_recv().is_none());

    ctx.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn test_panicking_handler_does_not_stop_the_loop() {
    let mut mux = bot();
    mux.handle(command_handler("explode", "always panics", |_, _, m| {
        Box::pin(async move {
            if !m.text.is_empty() {
                panic!("explode was called");
            }
            Ok(CommandOutcome::Success)
        })
    }));
    let (adapter, mut handle) = ChannelAdapter::new("chan", 8);
    let ctx = Context::new();
    let task = Dispatcher::new(Arc::new(mux), adapter).spawn(ctx.clone());

    handle.inject(Message::new("explode").addressed()).await;
    handle.inject(Message::new("ping").addressed()).await;

    assert_eq!(reply(&mut handle).await.text, "pong");

    ctx.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn test_slow_handler_does_not_block_others() {
    let mut mux = bot();
    mux.handle(command_handler("slow", "sleeps", |_, w, _| {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            w.write("finally").await;
            Ok(CommandOutcome::Success)
        })
    }));
    let (adapter, mut handle) = ChannelAdapter::new("chan", 8);
    let ctx = Context::new();
    let task = Dispatcher::new(Arc::new(mux), adapter).spawn(ctx.clone());

    handle.inject(Message::new("slow").addressed()).await;
    handle.inject(Message::new("ping").addressed()).await;

    assert_eq!(reply(&mut handle).await.text, "pong");
    assert_eq!(reply(&mut handle).await.text, "finally");

    ctx.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn test_every_adapter_is_served() {
    let (primary, mut primary_handle) = ChannelAdapter::new("primary", 8);
    let (secondary, mut secondary_handle) = ChannelAdapter::new("secondary", 8);
    let metrics = Arc::new(Metrics::default());
    let ctx = Context::new();
    let task = Dispatcher::new(Arc::new(bot()), primary)
        .adapter(secondary)
        .metrics(metrics.clone())
        .spawn(ctx.clone());

    secondary_handle
        .inject(Message::new("ping").with_from("bob").addressed())
        .await;
    primary_handle
        .inject(Message::new("ping").with_from("alice").addressed())
        .await;

    assert_eq!(reply(&mut secondary_handle).await.text, "pong");
    assert_eq!(reply(&mut primary_handle).await.text, "pong");
    assert_eq!(metrics.messages_received.get("secondary", "", "bob"), 1);
    assert_eq!(metrics.messages_received.get("primary", "", "alice"), 1);
    assert_eq!(metrics.messages_sent.total(), 2);

    ctx.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn test_raw_handler_sees_each_message_once() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let handler = raw_handler("count", "", move |_, _, _| {
        let counter = counter.clone();
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    });
    let (adapter, handle) = ChannelAdapter::new("chan", 8);
    let ctx = Context::new();
    let task = Dispatcher::new(handler, adapter).spawn(ctx.clone());

    for text in ["a", "b", "c"] {
        handle.inject(Message::new(text)).await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(seen.load(Ordering::SeqCst), 3);

    ctx.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn test_cancellation_stops_background_and_loop() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let stopped = Arc::new(AtomicUsize::new(0));
    let (t, s) = (ticks.clone(), stopped.clone());
    let mut mux = bot();
    mux.handle(background_handler("ticker", "", move |ctx, w| {
        let (ticks, stopped) = (t.clone(), s.clone());
        async move {
            w.write("started").await;
            loop {
                tokio::select! {
                    _ = ctx.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_millis(10)) => {
                        ticks.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
            stopped.fetch_add(1, Ordering::SeqCst);
        }
    }));
    let (adapter, mut handle) = ChannelAdapter::new("chan", 8);
    let ctx = Context::new();
    let dispatcher = Dispatcher::new(Arc::new(mux), adapter);
    let mut state = dispatcher.state();
    let task = dispatcher.spawn(ctx.clone());

    assert_eq!(reply(&mut handle).await.text, "started");
    ctx.cancel();
    task.await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(*state.borrow_and_update(), DispatchState::Draining);
    assert_eq!(stopped.load(Ordering::SeqCst), 1);
    let after_stop = ticks.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), after_stop);
}

#[tokio::test]
async fn test_closed_adapters_wait_for_cancellation() {
    let (adapter, handle) = ChannelAdapter::new("chan", 1);
    let _outbound = handle.close();
    let ctx = Context::new();
    let task = Dispatcher::new(Arc::new(bot()), adapter).spawn(ctx.clone());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!task.is_finished());

    ctx.cancel();
    task.await.unwrap();
}

/// Raw, hears and command at once; the command always panics.
struct Tripwire {
    pattern: Regex,
    raw: AtomicUsize,
    heard: AtomicUsize,
}

impl Handler for Tripwire {
    fn name(&self) -> &str {
        "tripwire"
    }

    fn description(&self) -> &str {
        "counts raw and hears, panics on command"
    }

    fn as_raw(self: Arc<Self>) -> Option<Arc<dyn RawHandler>> {
        Some(self)
    }

    fn as_hears(self: Arc<Self>) -> Option<Arc<dyn HearsHandler>> {
        Some(self)
    }

    fn as_command(self: Arc<Self>) -> Option<Arc<dyn CommandHandler>> {
        Some(self)
    }
}

#[async_trait]
impl RawHandler for Tripwire {
    async fn process(&self, _: &Context, _: &mut ResponseWriter, _: &Message) -> HandlerResult {
        self.raw.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl HearsHandler for Tripwire {
    fn hears(&self) -> &Regex {
        &self.pattern
    }

    async fn heard(
        &self,
        _: &Context,
        _: &mut ResponseWriter,
        _: &Message,
        _: Vec<Vec<String>>,
    ) {
        self.heard.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CommandHandler for Tripwire {
    async fn command(&self, _: &Context, _: &mut ResponseWriter, m: &mut Message) -> CommandResult {
        panic!("command path exploded on {:?}", m.text);
    }
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !done() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_command_panic_spares_raw_and_hears_of_same_message() {
    let tripwire = Arc::new(Tripwire {
        pattern: Regex::new("^boom$").unwrap(),
        raw: AtomicUsize::new(0),
        heard: AtomicUsize::new(0),
    });
    let (adapter, handle) = ChannelAdapter::new("chan", 8);
    let ctx = Context::new();
    let task = Dispatcher::new(tripwire.clone(), adapter).spawn(ctx.clone());

    handle.inject(Message::new("boom")).await;
    handle.inject(Message::new("after")).await;
    wait_until(|| {
        tripwire.raw.load(Ordering::SeqCst) == 2 && tripwire.heard.load(Ordering::SeqCst) == 1
    })
    .await;

    assert_eq!(tripwire.raw.load(Ordering::SeqCst), 2);
    assert_eq!(tripwire.heard.load(Ordering::SeqCst), 1);
    assert!(!task.is_finished());

    ctx.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn test_cancellation_does_not_wait_for_in_flight_invocations() {
    let started = Arc::new(AtomicBool::new(false));
    let finished = Arc::new(AtomicBool::new(false));
    let (s, f) = (started.clone(), finished.clone());
    let mut mux = bot();
    mux.handle(command_handler("sleepy", "takes five seconds", move |_, _, _| {
        let (started, finished) = (s.clone(), f.clone());
        Box::pin(async move {
            started.store(true, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(5)).await;
            finished.store(true, Ordering::SeqCst);
            Ok(CommandOutcome::Success)
        })
    }));
    let (adapter, handle) = ChannelAdapter::new("chan", 8);
    let ctx = Context::new();
    let dispatcher = Dispatcher::new(Arc::new(mux), adapter);
    let state = dispatcher.state();
    let task = dispatcher.spawn(ctx.clone());

    handle.inject(Message::new("sleepy").addressed()).await;
    wait_until(|| started.load(Ordering::SeqCst)).await;
    assert!(started.load(Ordering::SeqCst));

    ctx.cancel();
    tokio::time::timeout(Duration::from_millis(500), task)
        .await
        .expect("loop waited for the sleeping command")
        .unwrap();

    assert_eq!(*state.borrow(), DispatchState::Draining);
    assert!(!finished.load(Ordering::SeqCst));
}
