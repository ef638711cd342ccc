//! Named command collections and name resolution.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use parley_core::{Context, HandlerError, Message, ResponseWriter};
use tracing::debug;

use super::run::run_command;
use crate::handler::{CommandHandler, CommandResult};

const HELP: &str = "help";

/// A set of commands addressable by name or unambiguous prefix.
///
/// Built before the dispatch loop starts and read-only afterwards.
#[derive(Clone, Default)]
pub struct CommandSet {
    commands: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under its own name, replacing any previous
    /// handler of that name.
    pub fn add(&mut self, handler: Arc<dyn CommandHandler>) {
        let name = handler.name().to_string();
        self.add_as(name, handler);
    }

    /// Registers `handler` under `name`.
    pub fn add_as(&mut self, name: impl Into<String>, handler: Arc<dyn CommandHandler>) {
        self.commands.insert(name.into(), handler);
    }

    /// Builder form of [`add`](Self::add).
    pub fn with(mut self, handler: Arc<dyn CommandHandler>) -> Self {
        self.add(handler);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.commands.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Registered names: `help` first if present, the rest alphabetical.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.keys().cloned().collect();
        names.sort_by(|a, b| (a != HELP).cmp(&(b != HELP)).then_with(|| a.cmp(b)));
        names
    }

    /// Handlers in [`names`](Self::names) order.
    pub fn list(&self) -> Vec<(String, Arc<dyn CommandHandler>)> {
        self.names()
            .into_iter()
            .filter_map(|name| {
                let handler = self.commands.get(&name).cloned()?;
                Some((name, handler))
            })
            .collect()
    }

    /// Resolves `token` to a single handler.
    ///
    /// An exact name wins over longer names it prefixes; otherwise the token
    /// must prefix exactly one name.
    pub fn resolve(&self, token: &str) -> Result<(String, Arc<dyn CommandHandler>), HandlerError> {
        let mut exact = Vec::new();
        let mut prefixed = Vec::new();
        for (name, handler) in &self.commands {
            if name == token {
                exact.push((name.clone(), Arc::clone(handler)));
            }
            if name.starts_with(token) {
                prefixed.push((name.clone(), Arc::clone(handler)));
            }
        }

        match (exact.len(), prefixed.len()) {
            (0, 0) => Err(HandlerError::UnknownCommand),
            (1, _) => Ok(exact.remove(0)),
            (0, 1) => Ok(prefixed.remove(0)),
            (0, _) => {
                let mut candidates: Vec<String> =
                    prefixed.into_iter().map(|(name, _)| name).collect();
                candidates.sort();
                Err(HandlerError::Ambiguous {
                    token: token.to_string(),
                    candidates,
                })
            }
            _ => Err(HandlerError::AmbiguousExact(token.to_string())),
        }
    }

    /// Resolves the message's first argument and runs the matching command.
    pub fn next_command<'a>(
        &'a self,
        ctx: &'a Context,
        w: &'a mut ResponseWriter,
        m: &'a mut Message,
    ) -> BoxFuture<'a, CommandResult> {
        Box::pin(async move {
            let token = match m.parse_args()?.first() {
                Some(token) => token.clone(),
                None => return Err(HandlerError::MissingSubCommand(self.names())),
            };
            let (name, handler) = self.resolve(&token)?;
            debug!(token = %token, command = %name, "resolved command");
            run_command(ctx, handler, w, m).await
        })
    }
}

impl std::fmt::Debug for CommandSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSet")
            .field("commands", &self.names())
            .finish()
    }
}
