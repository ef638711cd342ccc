//! Invocation context for the Parley framework.
//!
//! A [`Context`] is handed to every handler invocation. It combines:
//!
//! - a [`CancellationToken`] governing the lifetime of the dispatch loop (and
//!   therefore of every background handler and in-flight invocation), and
//! - an immutable, typed value map used to pass data downstream, e.g. from a
//!   parent command to its sub-commands, or the adapter bound to an HTTP
//!   request.
//!
//! Contexts are cheap to clone. Adding a value never mutates the original;
//! [`Context::with_value`] returns a new context sharing the same token.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::sender::BoxedAdapter;

type ValueMap = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Cancellation and typed values for one handler invocation.
///
/// # Example
///
/// ```rust,ignore
/// use parley_core::Context;
///
/// #[derive(Clone)]
/// struct Deployment(String);
///
/// let ctx = Context::new();
/// let child = ctx.with_value(Deployment("prod".into()));
///
/// assert!(ctx.value::<Deployment>().is_none());
/// assert_eq!(child.value::<Deployment>().unwrap().0, "prod");
///
/// ctx.cancel();
/// assert!(child.is_cancelled());
/// ```
#[derive(Clone, Default)]
pub struct Context {
    token: CancellationToken,
    values: Arc<ValueMap>,
}

/// The adapter an HTTP-triggered invocation should reply through.
#[derive(Clone)]
struct BoundAdapter(BoxedAdapter);

impl Context {
    /// Creates a root context with a fresh cancellation token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a root context governed by an existing token.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            values: Arc::default(),
        }
    }

    /// Returns the governing cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns a context whose token is a child of this one.
    ///
    /// Cancelling the child does not affect the parent; cancelling the
    /// parent cancels the child. Values are inherited.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            values: Arc::clone(&self.values),
        }
    }

    /// Returns a new context carrying `value`, replacing any earlier value of
    /// the same type.
    pub fn with_value<T: Send + Sync + 'static>(&self, value: T) -> Self {
        let mut values = ValueMap::clone(&self.values);
        values.insert(TypeId::of::<T>(), Arc::new(value));
        Self {
            token: self.token.clone(),
            values: Arc::new(values),
        }
    }

    /// Looks up a value previously stored with [`with_value`](Self::with_value).
    pub fn value<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|v| (**v).downcast_ref::<T>())
    }

    /// Returns a new context bound to `adapter`.
    pub fn with_adapter(&self, adapter: BoxedAdapter) -> Self {
        self.with_value(BoundAdapter(adapter))
    }

    /// Returns the adapter bound with [`with_adapter`](Self::with_adapter).
    pub fn adapter(&self) -> Option<BoxedAdapter> {
        self.value::<BoundAdapter>().map(|b| Arc::clone(&b.0))
    }

    /// Cancels this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` once the context has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when the context is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.is_cancelled())
            .field("values", &self.values.len())
            .finish()
    }
}
