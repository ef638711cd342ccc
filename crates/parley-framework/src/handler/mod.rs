//! Handler capabilities, closure wrappers and panic containment.

mod func;
mod guard;
mod traits;

pub use func::{
    BackgroundFunc, CommandFunc, HearsFunc, RawFunc, WebHookFunc, background_handler,
    command_group, command_handler, command_handler_with_subs, hears_handler, raw_handler,
    webhook_handler,
};
pub use guard::{guarded, panic_message};
pub use traits::{
    BackgroundHandler, BoxedHandler, CommandHandler, CommandOutcome, CommandResult, Handler,
    HearsHandler, RawHandler, WebHookHandler,
};
