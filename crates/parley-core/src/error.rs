//! Error types for handler invocation and command resolution.

use std::fmt::Display;

use thiserror::Error;

// =============================================================================
// Handler Errors
// =============================================================================

/// Errors produced while resolving or running a handler.
///
/// The display strings are user-facing: the mux replies with them verbatim
/// when a command fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// The message text could not be tokenized as a command line.
    #[error("could not process as command line")]
    BadCli,

    /// No registered command matched the first argument.
    #[error("unknown command")]
    UnknownCommand,

    /// The first argument was a prefix of several command names.
    #[error("ambiguous command, {token}: {}", .candidates.join(", "))]
    Ambiguous {
        /// The argument as typed.
        token: String,
        /// Matching command names, sorted.
        candidates: Vec<String>,
    },

    /// More than one command carries exactly the requested name.
    #[error("multiple exact matches for {0}")]
    AmbiguousExact(String),

    /// A command set was invoked with no arguments left.
    #[error("required sub-command missing: {}", .0.join(", "))]
    MissingSubCommand(Vec<String>),

    /// A command handler was invoked with an empty argument vector.
    #[error("command handler called with no possible arguments")]
    NoArguments,

    /// A command deferred to sub-commands it does not have.
    #[error("command {0} has no sub-commands")]
    NoSubCommands(String),

    /// The user asked for usage with `-h`/`--help`.
    #[error("help requested")]
    HelpRequested,

    /// Flag parsing failed; carries the rendered parser message.
    #[error("{0}")]
    Flags(String),

    /// The handler failed for its own reasons.
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    /// Wraps an arbitrary failure.
    pub fn failed(err: impl Display) -> Self {
        Self::Failed(err.to_string())
    }
}

/// Result type for raw handlers and other unit-returning invocations.
pub type HandlerResult<T = ()> = Result<T, HandlerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_messages() {
        assert_eq!(
            HandlerError::BadCli.to_string(),
            "could not process as command line"
        );
        assert_eq!(
            HandlerError::Ambiguous {
                token: "de".into(),
                candidates: vec!["debug".into(), "deploy".into()],
            }
            .to_string(),
            "ambiguous command, de: debug, deploy"
        );
        assert_eq!(
            HandlerError::MissingSubCommand(vec!["help".into(), "list".into()]).to_string(),
            "required sub-command missing: help, list"
        );
        assert_eq!(
            HandlerError::AmbiguousExact("ping".into()).to_string(),
            "multiple exact matches for ping"
        );
    }

    #[test]
    fn test_failed_wraps_display() {
        let err = HandlerError::failed(std::fmt::Error);
        assert!(matches!(err, HandlerError::Failed(ref s) if !s.is_empty()));
    }
}
