//! Runtime orchestration: configuration, logging, the root mux, the
//! dispatch loop and the web-hook host.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use parley_runtime::ParleyRuntime;
//!
//! // Loads parley.toml from the current directory, or defaults
//! let mut runtime = ParleyRuntime::new();
//!
//! // Or pick a file and profile
//! let mut runtime = ParleyRuntime::builder()
//!     .config_file("deploy/parley.toml")
//!     .profile("production")
//!     .build()?;
//!
//! runtime.register_adapter(my_adapter);
//! runtime.handle(my_handler);
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use parley_core::{BoxedAdapter, Context, Metrics};
use parley_framework::{BoxedHandler, Dispatcher, Mux, WebHookHandler};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::{ConfigError, ConfigLoader, ConfigResult, ParleyConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::webhook::WebHookServer;

/// Owns a bot's configuration, root [`Mux`] and adapters, and runs them.
///
/// The first registered adapter is the primary one: background handlers
/// and web hooks write through it.
pub struct ParleyRuntime {
    config: ParleyConfig,
    mux: Mux,
    adapters: Vec<BoxedAdapter>,
    metrics: Arc<Metrics>,
}

impl ParleyRuntime {
    /// Creates a runtime from the configuration found in the current
    /// directory or the user config directory, falling back to defaults if it does not load.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .with_user_config_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                ParleyConfig::default()
            });

        Self::from_config(&config)
    }

    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from configuration and initializes logging from it.
    pub fn from_config(config: &ParleyConfig) -> Self {
        logging::init_from_config(&config.logging);

        info!(
            bot = %config.bot.name,
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            webhooks = config.webhook.enabled,
            "Runtime initialized from configuration"
        );

        Self {
            mux: Mux::new(config.bot.name.clone(), config.bot.description.clone()),
            config: config.clone(),
            adapters: Vec::new(),
            metrics: Arc::default(),
        }
    }

    pub fn config(&self) -> &ParleyConfig {
        &self.config
    }

    /// Registers an adapter. The first one registered is primary.
    pub fn register_adapter(&mut self, adapter: BoxedAdapter) {
        info!(
            adapter = adapter.name(),
            primary = self.adapters.is_empty(),
            "Registered adapter"
        );
        self.adapters.push(adapter);
    }

    /// Registers a handler on the root mux.
    pub fn handle(&mut self, handler: BoxedHandler) {
        self.mux.handle(handler);
    }

    pub fn mux(&self) -> &Mux {
        &self.mux
    }

    /// The root mux, for registering through its typed `handle_*` methods.
    pub fn mux_mut(&mut self) -> &mut Mux {
        &mut self.mux
    }

    /// Message counters, shared with the dispatch loop once running.
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(self) -> RuntimeResult<()> {
        info!("Parley runtime is starting. Press Ctrl+C to stop.");
        self.run_until(wait_for_shutdown()).await
    }

    /// Runs until `shutdown` completes, then cancels the dispatch loop and
    /// the web-hook host and waits for both.
    pub async fn run_until<F>(self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let Self {
            config,
            mux,
            adapters,
            metrics,
        } = self;

        let mut adapters = adapters.into_iter();
        let primary = adapters.next().ok_or(RuntimeError::NoAdapters)?;

        if config.webhook.enabled {
            let base = config.webhook.public_base();
            let url =
                Url::parse(&base).map_err(|e| RuntimeError::InvalidUrl(format!("{base}: {e}")))?;
            mux.set_url(url);
        }
        let mux = Arc::new(mux);
        let ctx = Context::new();

        let server = if config.webhook.enabled {
            let addr: SocketAddr = config
                .webhook
                .bind
                .parse()
                .map_err(|e: std::net::AddrParseError| {
                    ConfigError::invalid_address(&config.webhook.bind, e.to_string())
                })?;
            let listener = TcpListener::bind(addr).await?;
            let server = WebHookServer::new(mux.webhooks().iter().cloned());
            Some(tokio::spawn(server.serve(listener, ctx.clone())))
        } else {
            None
        };

        let mut dispatcher = Dispatcher::new(mux, primary)
            .queue_capacity(config.dispatch.queue_capacity)
            .metrics(metrics);
        for adapter in adapters {
            dispatcher = dispatcher.adapter(adapter);
        }
        let dispatch = dispatcher.spawn(ctx.clone());

        info!("Parley runtime is running");
        shutdown.await;

        info!("Stopping Parley runtime");
        ctx.cancel();

        if let Err(e) = dispatch.await {
            error!(error = %e, "dispatch loop ended abnormally");
        }
        if let Some(server) = server {
            join_server(server).await?;
        }

        info!("Parley runtime stopped");
        Ok(())
    }
}

impl Default for ParleyRuntime {
    fn default() -> Self {
        Self::new()
    }
}

async fn join_server(server: JoinHandle<std::io::Result<()>>) -> RuntimeResult<()> {
    match server.await {
        Ok(result) => Ok(result?),
        Err(e) => {
            error!(error = %e, "web-hook server ended abnormally");
            Ok(())
        }
    }
}

/// Waits for Ctrl+C or, on Unix, SIGTERM.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    result = signal::ctrl_c() => log_ctrl_c(result),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    log_ctrl_c(signal::ctrl_c().await);
}

fn log_ctrl_c(result: std::io::Result<()>) {
    match result {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`ParleyRuntime`] with custom configuration sources.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new()
                .with_current_dir()
                .with_user_config_dir(),
        }
    }

    /// Loads exactly this configuration file.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g. "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile.into());
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration programmatically.
    pub fn merge(mut self, config: ParleyConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    pub fn build(self) -> ConfigResult<ParleyRuntime> {
        let config = self.config_loader.load()?;
        debug!(bot = %config.bot.name, "building runtime");
        Ok(ParleyRuntime::from_config(&config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parley_core::Message;
    use parley_framework::{ChannelAdapter, CommandOutcome, Handler, command_handler};
    use tokio::sync::oneshot;

    use super::*;

    fn quiet_config() -> ParleyConfig {
        let mut config = ParleyConfig::default();
        config.bot.name = "tester".into();
        config
    }

    #[tokio::test]
    async fn test_run_until_serves_adapters() {
        let mut runtime = ParleyRuntime::from_config(&quiet_config());
        let (adapter, mut handle) = ChannelAdapter::new("chan", 8);
        runtime.register_adapter(adapter);
        runtime.handle(command_handler("ping", "", |_, w, _| {
            Box::pin(async move {
                w.write("pong").await;
                Ok(CommandOutcome::Success)
            })
        }));
        let metrics = runtime.metrics();

        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(runtime.run_until(async {
            let _ = stopped.await;
        }));

        handle
            .inject(Message::new("ping").with_from("alice").addressed())
            .await;
        let reply = tokio::time::timeout(Duration::from_secs(2), handle.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.text, "pong");
        assert_eq!(metrics.messages_received.get("chan", "", "alice"), 1);

        stop.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_without_adapters_fails() {
        let runtime = ParleyRuntime::from_config(&quiet_config());
        let err = runtime.run_until(async {}).await.unwrap_err();
        assert!(matches!(err, RuntimeError::NoAdapters));
    }

    #[tokio::test]
    async fn test_webhook_host_starts_and_stops() {
        let mut config = quiet_config();
        config.webhook.enabled = true;
        config.webhook.bind = "127.0.0.1:0".into();
        config.webhook.base_url = Some("https://bots.example.com/hooks/".into());

        let mut runtime = ParleyRuntime::from_config(&config);
        let (adapter, _handle) = ChannelAdapter::new("chan", 8);
        runtime.register_adapter(adapter);

        runtime.run_until(async {}).await.unwrap();
    }

    #[test]
    fn test_builder_uses_merged_config() {
        let mut overrides = ParleyConfig::default();
        overrides.bot.name = "merged".into();
        overrides.dispatch.queue_capacity = 3;

        let dir = std::env::temp_dir().join(format!("parley-runtime-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let runtime = ParleyRuntime::builder()
            .search_path(&dir)
            .without_env()
            .merge(overrides)
            .build()
            .unwrap();

        assert_eq!(runtime.config().bot.name, "merged");
        assert_eq!(runtime.config().dispatch.queue_capacity, 3);
        assert_eq!(runtime.mux().name(), "merged");
    }

    #[test]
    fn test_builder_searches_user_config_dir() {
        let builder = RuntimeBuilder::new();
        let paths = builder.config_loader.search_paths();

        if let Some(user) = dirs::config_dir() {
            assert_eq!(paths.last(), Some(&user.join("parley")));
        }
        if let Ok(cwd) = std::env::current_dir() {
            assert_eq!(paths.first(), Some(&cwd));
        }
    }
}
