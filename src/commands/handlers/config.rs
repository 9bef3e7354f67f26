use super::{report, usage};
use crate::commands::registry::CommandInvocation;
use crate::commands::CommandResult;
use crate::core::config::defaults::SETTING_KEYS;
use crate::core::service::ChatService;

pub(crate) fn handle_set(service: &ChatService, invocation: CommandInvocation<'_>) -> CommandResult {
    let Some(args) = invocation.rest() else {
        return CommandResult::Output(service.settings().render_all().trim_end().to_string());
    };

    let (key, value) = match args.split_once(char::is_whitespace) {
        Some((key, value)) if !value.trim().is_empty() => (key, value.trim()),
        _ => return usage("/set <key> <value>"),
    };
    if !SETTING_KEYS.contains(&key) {
        return CommandResult::Output(format!(
            "Unknown setting '{key}' (one of: {})",
            SETTING_KEYS.join(", ")
        ));
    }

    // Validate on a copy so a rejected value leaves the live settings alone.
    let mut updated = service.settings();
    if let Err(message) = updated.set_value(key, value) {
        return CommandResult::Output(format!("Error: {message}"));
    }
    report(
        service
            .update_settings(|settings| *settings = updated)
            .map(|_| format!("Set {key} to: {value}")),
    )
}
