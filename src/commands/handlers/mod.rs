pub(super) mod config;
pub(super) mod conversation;
pub(super) mod core;

use crate::commands::CommandResult;
use crate::core::error::ChatError;

pub(crate) const STILL_GENERATING: &str =
    "A reply is still being generated; use /stop first.";

pub(super) fn usage(syntax: &'static str) -> CommandResult {
    CommandResult::Output(format!("Usage: {syntax}"))
}

pub(super) fn report(result: Result<String, ChatError>) -> CommandResult {
    match result {
        Ok(message) => CommandResult::Output(message),
        Err(err) => CommandResult::Output(format!("Error: {err}")),
    }
}
