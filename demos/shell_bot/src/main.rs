//! Shell Bot Example
//!
//! Talk to a Parley bot on stdin. Every line is treated as a command
//! addressed to the bot; pattern listeners see it too.
//!
//! ```text
//! ping                      -> PONG!
//! help                      -> command and listener overview
//! help testcli              -> usage of a command group
//! testcli echo --upper hi   -> HI
//! testcli repeat -n 2 ho    -> ho ho
//! tableflip                 -> ┬─┬ノ( º _ ºノ)
//! ```
//!
//! With `--webhooks`, `GET http://127.0.0.1:8080/<nick>/test` answers
//! `hello world` and announces itself on the shell.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package shell-bot -- --nick minion --webhooks
//! ```

mod handlers;
mod shell;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use parley::prelude::*;
use parley::runtime::ConfigLoader;
use tracing::info;

use crate::shell::ShellAdapter;

#[derive(Debug, Parser)]
#[command(about = "A Parley bot on your terminal")]
struct Cli {
    /// Bot nick, also the web-hook path prefix
    #[arg(long, default_value = "minion")]
    nick: String,

    /// Configuration file; searched for in the current directory otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serve web hooks
    #[arg(long)]
    webhooks: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new()
        .with_current_dir()
        .with_user_config_dir();
    if let Some(path) = &cli.config {
        loader = loader.file(path);
    }
    let mut config = loader.load()?;
    config.bot.name.clone_from(&cli.nick);
    config.webhook.enabled |= cli.webhooks;

    let mut runtime = ParleyRuntime::from_config(&config);

    let shell = Arc::new(ShellAdapter::new(&cli.nick));
    runtime.register_adapter(shell.clone());

    runtime.handle(handlers::ping());
    runtime.handle(handlers::uptime());
    runtime.handle(handlers::testcli());
    runtime.handle(handlers::tableflip()?);
    runtime.handle(handlers::announcer());
    runtime.handle(handlers::test_hook());

    info!(nick = %cli.nick, "shell bot ready, type `help`");

    runtime
        .run_until(async move {
            tokio::select! {
                _ = shell.closed() => info!("stdin closed"),
                _ = tokio::signal::ctrl_c() => info!("interrupted"),
            }
        })
        .await?;

    Ok(())
}
