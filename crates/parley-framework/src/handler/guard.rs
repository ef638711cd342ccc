//! Panic containment for handler invocations.
//!
//! A process-wide panic hook records the backtrace at the panic site while
//! a guarded invocation is being polled, and stays out of the way for every
//! other panic.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::{Future, poll_fn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use futures::FutureExt;
use tracing::error;

thread_local! {
    static GUARD_DEPTH: Cell<usize> = const { Cell::new(0) };
    static PANIC_TRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if GUARD_DEPTH.try_with(Cell::get).unwrap_or(0) > 0 {
                let trace = Backtrace::force_capture();
                let _ = PANIC_TRACE.try_with(|slot| *slot.borrow_mut() = Some(trace));
            } else {
                previous(info);
            }
        }));
    });
}

/// Marks the current thread as polling a guarded invocation.
struct PollScope;

impl PollScope {
    fn enter() -> Self {
        GUARD_DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self
    }
}

impl Drop for PollScope {
    fn drop(&mut self) {
        GUARD_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// A contained panic: its message and, when the hook saw it, the stack at
/// the panic site.
struct Contained {
    message: String,
    backtrace: Option<Backtrace>,
}

async fn contain<F: Future>(fut: F) -> Result<F::Output, Contained> {
    install_hook();
    let mut fut = Box::pin(fut);
    let scoped = poll_fn(move |cx| {
        let _scope = PollScope::enter();
        fut.as_mut().poll(cx)
    });

    AssertUnwindSafe(scoped)
        .catch_unwind()
        .await
        .map_err(|payload| Contained {
            message: panic_message(payload.as_ref()),
            backtrace: PANIC_TRACE.with(|slot| slot.borrow_mut().take()),
        })
}

/// Runs `fut`, turning a panic into a logged error and `None`.
///
/// One handler panicking never takes the dispatch loop or its sibling
/// invocations down with it.
pub async fn guarded<F: Future>(handler: &str, fut: F) -> Option<F::Output> {
    match contain(fut).await {
        Ok(output) => Some(output),
        Err(Contained {
            message,
            backtrace: Some(backtrace),
        }) => {
            error!(handler, panic = %message, %backtrace, "handler panicked");
            None
        }
        Err(Contained {
            message,
            backtrace: None,
        }) => {
            error!(handler, panic = %message, "handler panicked");
            None
        }
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
