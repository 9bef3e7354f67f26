use super::STILL_GENERATING;
use crate::commands::registry::CommandInvocation;
use crate::commands::{all_commands, CommandResult};
use crate::core::service::ChatService;

pub(crate) fn handle_help(_service: &ChatService, _invocation: CommandInvocation<'_>) -> CommandResult {
    let mut help = String::from("Type a message and press Enter to send it.\n\nCommands:\n");
    for command in all_commands() {
        for usage in command.usages {
            help.push_str(&format!("  {:<18} {}\n", usage.syntax, usage.description));
        }
    }
    CommandResult::Output(help.trim_end().to_string())
}

pub(crate) fn handle_regen(service: &ChatService, _invocation: CommandInvocation<'_>) -> CommandResult {
    let id = service.active_id();
    if service.is_generating(&id) {
        return CommandResult::Output(STILL_GENERATING.to_string());
    }
    CommandResult::Regenerate
}

pub(crate) fn handle_stop(service: &ChatService, _invocation: CommandInvocation<'_>) -> CommandResult {
    if service.cancel(&service.active_id()) {
        CommandResult::Continue
    } else {
        CommandResult::Output("Nothing to stop.".to_string())
    }
}

pub(crate) fn handle_quit(_service: &ChatService, _invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::Quit
}
