use super::{report, usage};
use crate::commands::registry::CommandInvocation;
use crate::commands::CommandResult;
use crate::core::ids::ConversationId;
use crate::core::service::ChatService;

/// Resolve `/switch`-style targets: a 1-based position in `/list`, or an id.
fn resolve(service: &ChatService, target: &str) -> Result<ConversationId, String> {
    service.read(|store| {
        let listing = store.listing();
        if let Ok(position) = target.parse::<usize>() {
            return listing
                .get(position.wrapping_sub(1))
                .map(|conversation| conversation.id.clone())
                .ok_or_else(|| format!("No conversation number {position} (see /list)"));
        }
        listing
            .iter()
            .find(|conversation| conversation.id.as_str() == target)
            .map(|conversation| conversation.id.clone())
            .ok_or_else(|| format!("No conversation matches '{target}'"))
    })
}

pub(crate) fn handle_new(service: &ChatService, invocation: CommandInvocation<'_>) -> CommandResult {
    let id = service.create_conversation(invocation.rest());
    let name = service
        .conversation(&id)
        .map(|conversation| conversation.name)
        .unwrap_or_default();
    CommandResult::Output(format!("Started conversation: {name}"))
}

pub(crate) fn handle_list(service: &ChatService, _invocation: CommandInvocation<'_>) -> CommandResult {
    let text = service.read(|store| {
        let active = store.active_id();
        let mut lines = Vec::new();
        for (index, conversation) in store.listing().into_iter().enumerate() {
            let marker = if &conversation.id == active { '*' } else { ' ' };
            let busy = if store.is_locked(&conversation.id) {
                " (generating)"
            } else {
                ""
            };
            lines.push(format!(
                "{marker} {:>2}. {} [{} messages, updated {}]{busy}",
                index + 1,
                conversation.name,
                conversation.messages.len(),
                conversation.updated_at.format("%Y-%m-%d %H:%M"),
            ));
        }
        lines.join("\n")
    });
    CommandResult::Output(text)
}

pub(crate) fn handle_switch(service: &ChatService, invocation: CommandInvocation<'_>) -> CommandResult {
    let Some(target) = invocation.rest() else {
        return usage("/switch <n>");
    };
    let id = match resolve(service, target) {
        Ok(id) => id,
        Err(message) => return CommandResult::Output(message),
    };
    report(service.switch_conversation(&id).and_then(|_| {
        let conversation = service.conversation(&id)?;
        Ok(format!("Switched to: {}", conversation.name))
    }))
}

pub(crate) fn handle_rename(service: &ChatService, invocation: CommandInvocation<'_>) -> CommandResult {
    let Some(name) = invocation.rest() else {
        return usage("/rename <name>");
    };
    let id = service.active_id();
    report(
        service
            .rename_conversation(&id, name)
            .map(|_| format!("Renamed to: {name}")),
    )
}

pub(crate) fn handle_delete(service: &ChatService, invocation: CommandInvocation<'_>) -> CommandResult {
    let id = match invocation.rest() {
        Some(target) => match resolve(service, target) {
            Ok(id) => id,
            Err(message) => return CommandResult::Output(message),
        },
        None => service.active_id(),
    };
    let name = service
        .conversation(&id)
        .map(|conversation| conversation.name)
        .unwrap_or_default();
    report(
        service
            .delete_conversation(&id)
            .map(|_| format!("Deleted: {name}")),
    )
}

pub(crate) fn handle_clear(service: &ChatService, _invocation: CommandInvocation<'_>) -> CommandResult {
    let id = service.active_id();
    report(
        service
            .clear_conversation(&id)
            .map(|_| "Conversation cleared".to_string()),
    )
}

pub(crate) fn handle_model(service: &ChatService, invocation: CommandInvocation<'_>) -> CommandResult {
    let id = service.active_id();
    match invocation.rest() {
        Some(model) => report(
            service
                .set_model(&id, model)
                .map(|_| format!("Model set to: {model}")),
        ),
        None => report(service.conversation(&id).map(|conversation| {
            let settings = service.settings();
            let model = settings.effective_model(&conversation.model);
            if model.is_empty() {
                "No model selected (use /model <id> or `causette set default-model <id>`)"
                    .to_string()
            } else {
                format!("Model: {model}")
            }
        })),
    }
}

pub(crate) fn handle_system(service: &ChatService, invocation: CommandInvocation<'_>) -> CommandResult {
    let id = service.active_id();
    match invocation.rest() {
        Some("default") => report(
            service
                .set_system_prompt(&id, None)
                .map(|_| "Using the configured system prompt".to_string()),
        ),
        Some(prompt) => report(
            service
                .set_system_prompt(&id, Some(prompt))
                .map(|_| "System prompt updated".to_string()),
        ),
        None => report(service.conversation(&id).map(|conversation| {
            let settings = service.settings();
            match settings.effective_system_prompt(conversation.system_prompt.as_deref()) {
                Some(prompt) => format!("System prompt: {prompt}"),
                None => "No system prompt".to_string(),
            }
        })),
    }
}
