//! Running a single command level.

use std::fmt::Write as _;
use std::sync::Arc;

use futures::future::BoxFuture;
use parley_core::{Context, FlagSet, HandlerError, Message, ResponseWriter};
use tracing::{Instrument, Level, debug, span};

use crate::handler::{CommandHandler, CommandOutcome, CommandResult, guarded};

/// Runs `handler` against `m`.
///
/// Tokenizes the text if needed, installs a fresh flag set named after the
/// first argument, and invokes the handler. Help requests are answered with
/// the command's usage and reported as [`CommandOutcome::SkipHears`];
/// [`CommandOutcome::Defer`] continues in the handler's sub-commands. A
/// panicking handler is logged and treated as having succeeded.
pub fn run_command<'a>(
    ctx: &'a Context,
    handler: Arc<dyn CommandHandler>,
    w: &'a mut ResponseWriter,
    m: &'a mut Message,
) -> BoxFuture<'a, CommandResult> {
    Box::pin(async move {
        let name = match m.parse_args()?.first() {
            Some(name) => name.clone(),
            None => return Err(HandlerError::NoArguments),
        };
        m.install_flags(FlagSet::new(name.clone(), handler.description()));

        let span = span!(Level::DEBUG, "command", handler = handler.name(), command = %name);
        let outcome = guarded(handler.name(), handler.command(ctx, w, m))
            .instrument(span)
            .await;

        match outcome {
            None => Ok(CommandOutcome::Success),
            Some(Ok(CommandOutcome::Defer(next))) => match handler.sub_commands() {
                Some(subs) => subs.next_command(&next, w, m).await,
                None => Err(HandlerError::NoSubCommands(name)),
            },
            Some(Ok(CommandOutcome::UsageRequested) | Err(HandlerError::HelpRequested)) => {
                debug!(command = %name, "usage requested");
                let usage = command_usage(handler.as_ref(), m.flags());
                w.write(usage).await;
                Ok(CommandOutcome::SkipHears)
            }
            Some(result) => result,
        }
    })
}

/// Usage text for `handler`: its flag help followed by its sub-commands.
///
/// Text captured from a `--help` request is preferred over rendering the
/// flag set afresh.
pub fn command_usage(handler: &dyn CommandHandler, flags: Option<&FlagSet>) -> String {
    let mut usage = match flags {
        Some(flags) if !flags.output().is_empty() => flags.output().to_string(),
        Some(flags) => flags.render_help(),
        None => FlagSet::new(handler.name(), handler.description()).render_help(),
    };

    if let Some(subs) = handler.sub_commands()
        && !subs.is_empty()
    {
        let _ = writeln!(usage, "\nSub-commands:");
        for (name, sub) in subs.list() {
            let _ = writeln!(usage, "  {name} - {}", sub.description());
        }
    }

    usage.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use parley_core::Sender;

    use super::*;
    use crate::command::CommandSet;
    use crate::handler::{command_group, command_handler};

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Sender for Recorder {
        async fn send(&self, _ctx: &Context, message: &Message) {
            self.sent.lock().push(message.text.clone());
        }
    }

    fn writer() -> (Arc<Recorder>, ResponseWriter) {
        let recorder = Arc::new(Recorder::default());
        let w = ResponseWriter::new(recorder.clone(), Message::default(), "recorder");
        (recorder, w)
    }

    fn deploy_set(hits: Arc<AtomicUsize>) -> CommandSet {
        let prod = command_handler("prod", "deploy to production", move |_, w, m| {
            let hits = Arc::clone(&hits);
            Box::pin(async move {
                m.flags_mut().flag("force", "skip checks");
                m.parse()?;
                hits.fetch_add(1, Ordering::SeqCst);
                let forced = m.flags().is_some_and(|f| f.get_flag("force"));
                w.write(format!("prod forced={forced} rest={:?}", m.args()))
                    .await;
                Ok(CommandOutcome::Success)
            })
        });
        CommandSet::new().with(prod)
    }

    #[tokio::test]
    async fn test_empty_args_is_error() {
        let (_, mut w) = writer();
        let handler = command_handler("x", "", |_, _, _| {
            Box::pin(async { Ok(CommandOutcome::Success) })
        });
        let mut m = Message::new("");

        let err = run_command(&Context::new(), handler, &mut w, &mut m)
            .await
            .unwrap_err();

        assert_eq!(err, HandlerError::NoArguments);
    }

    #[tokio::test]
    async fn test_defer_recurses_into_sub_commands() {
        let hits = Arc::new(AtomicUsize::new(0));
        let group = command_group("deploy", "deploy things", deploy_set(hits.clone()));
        let (recorder, mut w) = writer();
        let mut m = Message::new("deploy prod --force api");

        let outcome = run_command(&Context::new(), group, &mut w, &mut m)
            .await
            .unwrap();

        assert!(matches!(outcome, CommandOutcome::Success));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(
            recorder.sent.lock().as_slice(),
            [r#"prod forced=true rest=["api"]"#]
        );
    }

    #[tokio::test]
    async fn test_defer_without_subs_is_error() {
        let handler = command_handler("lonely", "", |ctx, _, _| {
            Box::pin(async move { Ok(CommandOutcome::Defer(ctx.clone())) })
        });
        let (_, mut w) = writer();
        let mut m = Message::new("lonely");

        let err = run_command(&Context::new(), handler, &mut w, &mut m)
            .await
            .unwrap_err();

        assert_eq!(err, HandlerError::NoSubCommands("lonely".into()));
    }

    #[tokio::test]
    async fn test_help_writes_usage_and_skips_hears() {
        let hits = Arc::new(AtomicUsize::new(0));
        let group = command_group("deploy", "deploy things", deploy_set(hits.clone()));
        let (recorder, mut w) = writer();
        let mut m = Message::new("deploy --help");

        let outcome = run_command(&Context::new(), group, &mut w, &mut m)
            .await
            .unwrap();

        assert!(matches!(outcome, CommandOutcome::SkipHears));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        let sent = recorder.sent.lock();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("deploy things"));
        assert!(sent[0].contains("Sub-commands:"));
        assert!(sent[0].contains("prod - deploy to production"));
    }

    #[tokio::test]
    async fn test_usage_requested_renders_flags() {
        let handler = command_handler("greet", "say hello", |_, _, m| {
            Box::pin(async move {
                m.flags_mut().option("name", "who to greet", None);
                Ok(CommandOutcome::UsageRequested)
            })
        });
        let (recorder, mut w) = writer();
        let mut m = Message::new("greet");

        let outcome = run_command(&Context::new(), handler, &mut w, &mut m)
            .await
            .unwrap();

        assert!(matches!(outcome, CommandOutcome::SkipHears));
        assert!(recorder.sent.lock()[0].contains("--name"));
    }

    #[tokio::test]
    async fn test_flag_errors_propagate() {
        let handler = command_handler("strict", "", |_, _, m| {
            Box::pin(async move {
                m.parse()?;
                Ok(CommandOutcome::Success)
            })
        });
        let (recorder, mut w) = writer();
        let mut m = Message::new("strict --nope");

        let err = run_command(&Context::new(), handler, &mut w, &mut m)
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Flags(_)));
        assert!(recorder.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_panic_counts_as_success() {
        let handler = command_handler("boom", "", |_, _, m| {
            Box::pin(async move {
                if m.text == "boom" {
                    panic!("handler exploded");
                }
                Ok(CommandOutcome::Success)
            })
        });
        let (_, mut w) = writer();
        let mut m = Message::new("boom");

        let outcome = run_command(&Context::new(), handler, &mut w, &mut m)
            .await
            .unwrap();

        assert!(matches!(outcome, CommandOutcome::Success));
    }
}
