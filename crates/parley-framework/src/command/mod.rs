//! Command resolution.
//!
//! Messages addressed to the bot are tokenized with shell quoting rules and
//! resolved level by level:
//!
//! ```text
//! "deploy --dry-run prod api"
//!   └─ CommandSet: "deploy" ─▶ deploy handler parses --dry-run, defers
//!        └─ CommandSet: "prod" ─▶ prod handler sees ["prod", "api"]
//! ```
//!
//! At each level the first argument must name a command exactly or be a
//! prefix of exactly one command name.

mod run;
mod set;

pub use run::{command_usage, run_command};
pub use set::CommandSet;
