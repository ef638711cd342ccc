//! An adapter that reads lines from stdin and prints replies to stdout.

use async_trait::async_trait;
use parley::prelude::*;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};
use tokio::sync::{Mutex, watch};
use tracing::{error, warn};

/// Every line typed is a private message addressed to the bot.
pub struct ShellAdapter {
    nick: String,
    user: String,
    lines: Mutex<Lines<BufReader<Stdin>>>,
    out: Mutex<Stdout>,
    closed: watch::Sender<bool>,
}

impl ShellAdapter {
    pub fn new(nick: impl Into<String>) -> Self {
        let user = std::env::var("USER").unwrap_or_else(|_| "user".to_string());
        Self {
            nick: nick.into(),
            user,
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
            out: Mutex::new(tokio::io::stdout()),
            closed: watch::Sender::new(false),
        }
    }

    /// Resolves once stdin reaches end of file.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    async fn print(&self, line: &str) {
        let mut out = self.out.lock().await;
        let written = async {
            out.write_all(line.as_bytes()).await?;
            out.flush().await
        };
        if let Err(e) = written.await {
            warn!(error = %e, "could not write to stdout");
        }
    }
}

#[async_trait]
impl Sender for ShellAdapter {
    async fn send(&self, _ctx: &Context, message: &Message) {
        for line in message.text.lines() {
            self.print(&format!("{}: {}\n", self.nick, line)).await;
        }
    }
}

#[async_trait]
impl Adapter for ShellAdapter {
    async fn receive(&self) -> Option<Message> {
        let mut lines = self.lines.lock().await;
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => {
                    let mut m = Message::new(line.trim())
                        .with_channel("shell")
                        .with_from(self.user.clone())
                        .with_to(self.nick.clone())
                        .addressed()
                        .private();
                    m.user_id = self.user.clone();
                    return Some(m);
                }
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "could not read stdin");
                    break;
                }
            }
        }
        self.closed.send_replace(true);
        None
    }

    fn name(&self) -> &str {
        "shell"
    }
}
