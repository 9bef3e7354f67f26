//! Slash commands for the line-mode chat shell.

mod handlers;
mod registry;

pub use registry::{
    all_commands, find_command, matching_commands, Command, CommandInvocation, CommandUsage,
};

use crate::core::service::ChatService;

#[derive(Debug, PartialEq, Eq)]
pub enum CommandResult {
    /// Nothing to show.
    Continue,
    /// Text for the user.
    Output(String),
    /// Not a command; send it as a chat message.
    ProcessAsMessage(String),
    /// Regenerate the last reply (the shell drives the async work).
    Regenerate,
    Quit,
}

pub fn process_input(service: &ChatService, input: &str) -> CommandResult {
    let trimmed = input.trim();

    let Some(stripped) = trimmed.strip_prefix('/') else {
        return as_message(service, input);
    };

    let mut parts = stripped.splitn(2, ' ');
    let command_name = match parts.next() {
        Some(name) if !name.is_empty() => name,
        _ => return as_message(service, input),
    };
    let args = parts.next().unwrap_or("").trim();

    // Unambiguous prefixes stand in for the full name (`/sw 2`).
    let command = match registry::find_command(command_name) {
        Some(command) => command,
        None => match matching_commands(command_name).as_slice() {
            [only] => *only,
            [] => {
                return CommandResult::Output(format!(
                    "Unknown command: /{command_name} (try /help)"
                ))
            }
            several => {
                let names: Vec<String> = several
                    .iter()
                    .map(|command| format!("/{}", command.name))
                    .collect();
                return CommandResult::Output(format!(
                    "Ambiguous command: /{command_name} ({})",
                    names.join(", ")
                ));
            }
        },
    };

    let invocation = CommandInvocation {
        input: trimmed,
        args,
    };
    (command.handler)(service, invocation)
}

/// Plain input, unless the active conversation is still generating.
fn as_message(service: &ChatService, input: &str) -> CommandResult {
    if !input.trim().is_empty() && service.is_generating(&service.active_id()) {
        return CommandResult::Output(handlers::STILL_GENERATING.to_string());
    }
    CommandResult::ProcessAsMessage(input.to_string())
}

#[cfg(test)]
mod tests;
