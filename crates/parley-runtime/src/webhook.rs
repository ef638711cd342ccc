//! HTTP host for web-hook handlers.
//!
//! Every hook that has been given a URL is mounted on an axum [`Router`] at
//! that URL's path. Each request runs the hook with a [`Context`] derived
//! from the server's, carrying the hook's bound adapter so the handler can
//! reply through [`ResponseWriter::from_context`](parley_core::ResponseWriter::from_context).

use std::collections::HashSet;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use parley_core::Context;
use parley_framework::WebHookHandler;
use tokio::net::TcpListener;
use tower::service_fn;
use tracing::{Instrument, Level, debug, info, span, warn};

/// Serves a set of web hooks until the governing context is cancelled.
pub struct WebHookServer {
    hooks: Vec<Arc<dyn WebHookHandler>>,
}

impl WebHookServer {
    pub fn new(hooks: impl IntoIterator<Item = Arc<dyn WebHookHandler>>) -> Self {
        Self {
            hooks: hooks.into_iter().collect(),
        }
    }

    /// Number of hooks this server knows about, mounted or not.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Builds the router. Hooks without a URL are skipped, and the first hook
    /// claiming a path keeps it.
    pub fn router(&self, ctx: &Context) -> Router {
        let mut router = Router::new();
        let mut mounted = HashSet::new();

        for hook in &self.hooks {
            let Some(url) = hook.url() else {
                warn!(handler = hook.name(), "web hook has no URL, not mounting");
                continue;
            };
            let path = url.path().to_string();
            if !mounted.insert(path.clone()) {
                warn!(handler = hook.name(), %path, "web hook path already mounted");
                continue;
            }

            debug!(handler = hook.name(), %path, "mounting web hook");
            let hook = Arc::clone(hook);
            let ctx = ctx.clone();
            router = router.route_service(
                &path,
                service_fn(move |request: Request<Body>| {
                    let hook = Arc::clone(&hook);
                    let ctx = match hook.adapter() {
                        Some(adapter) => ctx.with_adapter(adapter),
                        None => ctx.clone(),
                    };
                    let span = span!(Level::DEBUG, "webhook", handler = hook.name());
                    async move { Ok::<_, Infallible>(hook.serve_http(ctx, request).await) }
                        .instrument(span)
                }),
            );
        }

        router.fallback(|| async { (StatusCode::NOT_FOUND, "no such web hook") })
    }

    /// Binds `addr` and serves.
    pub async fn bind(self, addr: SocketAddr, ctx: Context) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, ctx).await
    }

    /// Serves on an already bound listener until `ctx` is cancelled.
    pub async fn serve(self, listener: TcpListener, ctx: Context) -> std::io::Result<()> {
        let router = self.router(&ctx);
        info!(addr = ?listener.local_addr().ok(), hooks = self.hooks.len(), "serving web hooks");

        let shutdown = ctx.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("web-hook server stopped");
        Ok(())
    }
}
