//! Per-invocation flag parsing.
//!
//! Every command invocation gets a fresh [`FlagSet`] named after the command
//! token. Handlers declare their flags on it, then call
//! [`Message::parse`](crate::Message::parse); parsing consumes leading flags
//! and leaves the remaining positional arguments in the message for the
//! next command level.
//!
//! Help and parse errors are rendered into the flag set's output buffer
//! rather than printed, so they can be sent back to the chat.

use clap::error::ErrorKind;
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::error::HandlerError;

const REST: &str = "args";

/// Flag declarations and parse results for one command invocation.
#[derive(Debug, Clone)]
pub struct FlagSet {
    name: String,
    about: String,
    args: Vec<Arg>,
    matches: Option<ArgMatches>,
    output: String,
}

impl FlagSet {
    /// Creates an empty flag set for the command `name`.
    pub fn new(name: impl Into<String>, about: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            about: about.into(),
            args: Vec::new(),
            matches: None,
            output: String::new(),
        }
    }

    /// The command token this flag set belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declares a boolean `--name` switch.
    pub fn flag(&mut self, name: &'static str, help: &'static str) -> &mut Self {
        self.arg(Arg::new(name).long(name).help(help).action(ArgAction::SetTrue))
    }

    /// Declares a `--name <VALUE>` option with an optional default.
    pub fn option(
        &mut self,
        name: &'static str,
        help: &'static str,
        default: Option<&'static str>,
    ) -> &mut Self {
        let mut arg = Arg::new(name)
            .long(name)
            .help(help)
            .value_name("VALUE")
            .action(ArgAction::Set);
        if let Some(default) = default {
            arg = arg.default_value(default);
        }
        self.arg(arg)
    }

    /// Declares an arbitrary clap argument.
    pub fn arg(&mut self, arg: Arg) -> &mut Self {
        self.args.push(arg);
        self
    }

    /// Parses `argv` (command token first), returning the positional
    /// arguments left after the flags.
    pub fn parse(&mut self, argv: &[String]) -> Result<Vec<String>, HandlerError> {
        match self.command().try_get_matches_from(argv) {
            Ok(matches) => {
                let rest = matches
                    .get_many::<String>(REST)
                    .map(|values| values.cloned().collect())
                    .unwrap_or_default();
                self.matches = Some(matches);
                Ok(rest)
            }
            Err(err) => Err(self.capture(err)),
        }
    }

    /// Records a parser error in the output buffer and classifies it.
    pub fn capture(&mut self, err: clap::Error) -> HandlerError {
        let rendered = err.render().to_string();
        self.output.push_str(&rendered);
        match err.kind() {
            ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => HandlerError::HelpRequested,
            _ => HandlerError::Flags(rendered.trim_end().to_string()),
        }
    }

    /// Whether [`parse`](Self::parse) has succeeded.
    pub fn parsed(&self) -> bool {
        self.matches.is_some()
    }

    /// Value of a boolean switch; `false` when unset or undeclared.
    pub fn get_flag(&self, name: &str) -> bool {
        self.matches
            .as_ref()
            .and_then(|m| m.try_get_one::<bool>(name).ok().flatten())
            .copied()
            .unwrap_or(false)
    }

    /// Value of a string option, falling back to its declared default.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.matches
            .as_ref()
            .and_then(|m| m.try_get_one::<String>(name).ok().flatten())
            .map(String::as_str)
    }

    /// Text captured from help requests and parse errors.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Renders the help text for the declared flags.
    pub fn render_help(&self) -> String {
        self.command().render_help().to_string()
    }

    fn command(&self) -> Command {
        Command::new(self.name.clone())
            .about(self.about.clone())
            .disable_version_flag(true)
            .args(self.args.iter().cloned())
            .arg(
                Arg::new(REST)
                    .value_name("ARGS")
                    .num_args(0..)
                    .trailing_var_arg(true),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_flags_consumed_and_rest_returned() {
        let mut flags = FlagSet::new("deploy", "ship things");
        flags
            .flag("force", "skip checks")
            .option("env", "target environment", Some("staging"));

        let rest = flags
            .parse(&argv(&["deploy", "--force", "api", "web"]))
            .unwrap();

        assert_eq!(rest, vec!["api", "web"]);
        assert!(flags.get_flag("force"));
        assert_eq!(flags.get_str("env"), Some("staging"));
    }

    #[test]
    fn test_undeclared_lookups_are_empty() {
        let mut flags = FlagSet::new("ping", "");
        flags.parse(&argv(&["ping"])).unwrap();

        assert!(!flags.get_flag("verbose"));
        assert_eq!(flags.get_str("env"), None);
    }

    #[test]
    fn test_help_is_captured() {
        let mut flags = FlagSet::new("deploy", "ship things");
        flags.flag("force", "skip checks");

        let err = flags.parse(&argv(&["deploy", "--help"])).unwrap_err();

        assert_eq!(err, HandlerError::HelpRequested);
        assert!(flags.output().contains("--force"));
        assert!(!flags.parsed());
    }

    #[test]
    fn test_unknown_flag_is_reported() {
        let mut flags = FlagSet::new("deploy", "");

        let err = flags.parse(&argv(&["deploy", "--bogus"])).unwrap_err();

        assert!(matches!(err, HandlerError::Flags(ref text) if text.contains("--bogus")));
    }

    #[test]
    fn test_render_help_lists_flags() {
        let mut flags = FlagSet::new("deploy", "ship things");
        flags.option("env", "target environment", None);

        let help = flags.render_help();

        assert!(help.contains("ship things"));
        assert!(help.contains("--env"));
    }
}
