//! The normalized chat message.
//!
//! Adapters translate their native events into [`Message`] values and
//! translate outbound messages back. Besides the envelope fields a message
//! carries two pieces of per-invocation state that never leave the process:
//! the tokenized argument vector and the command's flag set.

use serde::{Deserialize, Serialize};

use crate::error::HandlerError;
use crate::flags::FlagSet;

/// A chat message, inbound or outbound.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    /// Where the message was seen, or where it should go.
    pub channel: String,
    /// Display name of the sender.
    pub from: String,
    /// Addressee, when the message targets someone specific.
    pub to: String,
    /// Stable identifier of the sender.
    pub user_id: String,
    /// Direct or otherwise private conversation.
    pub private: bool,
    /// The bot was addressed directly.
    pub to_bot: bool,
    /// The message body.
    pub text: String,

    #[serde(skip)]
    args: Option<Vec<String>>,
    #[serde(skip)]
    flags: Option<FlagSet>,
}

impl Message {
    /// Creates a message with just a body.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Sets the channel.
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Sets the sender name.
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    /// Sets the addressee.
    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.to = to.into();
        self
    }

    /// Marks the message as addressed to the bot.
    pub fn addressed(mut self) -> Self {
        self.to_bot = true;
        self
    }

    /// Marks the message as private.
    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    /// The envelope without per-invocation state, used as a reply template.
    pub fn envelope(&self) -> Self {
        Self {
            channel: self.channel.clone(),
            from: self.from.clone(),
            to: self.to.clone(),
            user_id: self.user_id.clone(),
            private: self.private,
            to_bot: self.to_bot,
            text: self.text.clone(),
            args: None,
            flags: None,
        }
    }

    /// Tokenizes the text with shell quoting rules on first use.
    ///
    /// Later calls return the stored vector unchanged, including whatever
    /// earlier parsing stages left behind.
    pub fn parse_args(&mut self) -> Result<&[String], HandlerError> {
        if self.args.is_none() {
            let args = shell_words::split(&self.text).map_err(|_| HandlerError::BadCli)?;
            self.args = Some(args);
        }
        Ok(self.args.as_deref().unwrap_or_default())
    }

    /// The stored argument vector; empty before [`parse_args`](Self::parse_args).
    pub fn args(&self) -> &[String] {
        self.args.as_deref().unwrap_or_default()
    }

    /// Whether the text has been tokenized.
    pub fn has_args(&self) -> bool {
        self.args.is_some()
    }

    /// Replaces the argument vector.
    pub fn set_args(&mut self, args: Vec<String>) {
        self.args = Some(args);
    }

    /// Installs a fresh flag set for the next command level.
    pub fn install_flags(&mut self, flags: FlagSet) {
        self.flags = Some(flags);
    }

    /// The current flag set, if a command is running.
    pub fn flags(&self) -> Option<&FlagSet> {
        self.flags.as_ref()
    }

    /// The current flag set, created from the first argument if absent.
    pub fn flags_mut(&mut self) -> &mut FlagSet {
        let name = self.args().first().cloned().unwrap_or_default();
        self.flags.get_or_insert_with(|| FlagSet::new(name, ""))
    }

    /// Parses the current flag set against the argument vector.
    ///
    /// Leading flags and the command token are consumed; the remaining
    /// positional arguments replace the argument vector so a sub-command
    /// sees its own name first.
    pub fn parse(&mut self) -> Result<(), HandlerError> {
        let argv = self.parse_args()?.to_vec();
        let rest = self.flags_mut().parse(&argv)?;
        self.args = Some(rest);
        Ok(())
    }

    /// Parses the argument vector into a clap derive type.
    ///
    /// The vector is left untouched; help and errors land in the flag set's
    /// output buffer just as with [`parse`](Self::parse).
    pub fn parse_as<T: clap::Parser>(&mut self) -> Result<T, HandlerError> {
        let argv = self.parse_args()?.to_vec();
        T::try_parse_from(&argv).map_err(|err| self.flags_mut().capture(err))
    }
}
