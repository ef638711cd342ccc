//! The handlers the shell bot ships with.

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::response::Response;
use clap::Parser;
use parley::prelude::*;
use regex::Regex;
use tracing::info;

pub fn ping() -> BoxedHandler {
    command_handler("ping", "check the bot is alive", |_, w, _| {
        Box::pin(async move {
            w.write("PONG!").await;
            Ok(CommandOutcome::Success)
        })
    })
}

pub fn uptime() -> BoxedHandler {
    let started = Instant::now();
    command_handler("uptime", "how long the bot has been running", move |_, w, _| {
        let elapsed = started.elapsed();
        Box::pin(async move {
            w.write(format!("I have been running for {}", humanize(elapsed)))
                .await;
            Ok(CommandOutcome::Success)
        })
    })
}

fn humanize(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (days, hours, mins) = (secs / 86_400, secs / 3_600 % 24, secs / 60 % 60);
    match (days, hours, mins) {
        (0, 0, 0) => format!("{secs}s"),
        (0, 0, _) => format!("{mins}m{}s", secs % 60),
        (0, _, _) => format!("{hours}h{mins}m"),
        _ => format!("{days}d{hours}h"),
    }
}

#[derive(Debug, Parser)]
#[command(about = "say a word several times")]
struct RepeatArgs {
    /// How many times
    #[arg(short = 'n', long, default_value_t = 3)]
    times: u32,

    /// Separator between words
    #[arg(long, default_value = " ")]
    sep: String,

    word: String,
}

/// `testcli echo [--upper] words...` and `testcli repeat [-n N] word`.
pub fn testcli() -> BoxedHandler {
    let echo = command_handler("echo", "repeat the arguments", |_, w, m| {
        Box::pin(async move {
            m.flags_mut().flag("upper", "shout the reply");
            m.parse()?;
            let shout = m.flags().is_some_and(|f| f.get_flag("upper"));
            let text = m.args().join(" ");
            w.write(if shout { text.to_uppercase() } else { text }).await;
            Ok(CommandOutcome::Success)
        })
    });

    let repeat = command_handler("repeat", "say a word several times", |_, w, m| {
        Box::pin(async move {
            let args: RepeatArgs = m.parse_as()?;
            let words = vec![args.word; args.times as usize];
            w.write(words.join(&args.sep)).await;
            Ok(CommandOutcome::Success)
        })
    });

    command_group(
        "testcli",
        "exercise flags and sub-commands",
        CommandSet::new().with(echo).with(repeat),
    )
}

pub fn tableflip() -> anyhow::Result<BoxedHandler> {
    let pattern = Regex::new(r"(?i)^\s*(tableflip|\(╯°□°）╯︵ ┻━┻)\s*$")?;
    let handler: BoxedHandler =
        hears_handler("tableflip", "puts tables back", pattern, |_, w, _, _| {
            Box::pin(async move {
                w.write("┬─┬ノ( º _ ºノ)").await;
            })
        });
    Ok(handler)
}

pub fn announcer() -> BoxedHandler {
    background_handler("announcer", "says hello and goodbye", |ctx, mut w| async move {
        w.set_channel("shell");
        w.write("Starting background").await;
        ctx.cancelled().await;
        w.write("Stopping background").await;
    })
}

pub fn test_hook() -> BoxedHandler {
    webhook_handler("test", "answers hello world", |ctx, request| async move {
        info!(method = %request.method(), uri = %request.uri(), "web hook called");
        if let Some(mut w) = ResponseWriter::from_context(&ctx) {
            w.set_channel("shell");
            w.write(format!("web hook hit: {}", request.uri())).await;
        }
        Response::new(Body::from("hello world"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_humanize() {
        assert_eq!(humanize(Duration::from_secs(42)), "42s");
        assert_eq!(humanize(Duration::from_secs(125)), "2m5s");
        assert_eq!(humanize(Duration::from_secs(3 * 3600 + 60)), "3h1m");
        assert_eq!(humanize(Duration::from_secs(2 * 86_400 + 3600)), "2d1h");
    }

    #[test]
    fn test_tableflip_pattern() {
        let handler = tableflip().unwrap();
        let hears = handler.as_hears().unwrap();
        assert!(hears.hears().is_match("tableflip"));
        assert!(hears.hears().is_match("(╯°□°）╯︵ ┻━┻"));
        assert!(!hears.hears().is_match("please do not tableflip"));
    }
}
