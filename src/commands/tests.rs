use super::*;
use crate::core::collaborators::{MemoryPersistence, NoCue, TracingNotifier};
use crate::core::config::Settings;
use crate::core::message::Message;
use crate::core::test_support::test_client;
use std::sync::Arc;

fn test_service() -> ChatService {
    ChatService::new(
        test_client(),
        Arc::new(MemoryPersistence::with_settings(Settings {
            default_model: "llama3".to_string(),
            ..Settings::default()
        })),
        Arc::new(TracingNotifier),
        Arc::new(NoCue),
    )
}

fn output(result: CommandResult) -> String {
    match result {
        CommandResult::Output(text) => text,
        other => panic!("expected output, got {other:?}"),
    }
}

#[test]
fn plain_text_is_sent_as_a_message() {
    let service = test_service();
    assert_eq!(
        process_input(&service, "hello /there"),
        CommandResult::ProcessAsMessage("hello /there".to_string())
    );
    assert_eq!(
        process_input(&service, "/"),
        CommandResult::ProcessAsMessage("/".to_string())
    );
}

#[test]
fn unknown_commands_are_reported() {
    let service = test_service();
    let text = output(process_input(&service, "/frobnicate now"));
    assert!(text.contains("/frobnicate"));
}

#[test]
fn unique_prefixes_resolve_to_their_command() {
    let service = test_service();
    let first = service.active_id();
    process_input(&service, "/new");
    output(process_input(&service, "/sw 2"));
    assert_eq!(service.active_id(), first);

    let text = output(process_input(&service, "/re"));
    assert_eq!(text, "Ambiguous command: /re (/rename, /regen)");
}

#[test]
fn help_lists_every_command() {
    let service = test_service();
    let text = output(process_input(&service, "/help"));
    for command in all_commands() {
        assert!(text.contains(&format!("/{}", command.name)), "missing {}", command.name);
    }
}

#[test]
fn commands_are_case_insensitive() {
    let service = test_service();
    assert_eq!(process_input(&service, "/QUIT"), CommandResult::Quit);
    assert_eq!(matching_commands("re").len(), 2);
}

#[test]
fn new_list_and_switch_work_together() {
    let service = test_service();
    let first = service.active_id();

    let text = output(process_input(&service, "/new Research"));
    assert!(text.contains("Research"));
    assert_ne!(service.active_id(), first);

    let listing = output(process_input(&service, "/list"));
    assert!(listing.lines().next().unwrap().starts_with("*  1. Research"));
    assert_eq!(listing.lines().count(), 2);

    output(process_input(&service, "/switch 2"));
    assert_eq!(service.active_id(), first);

    let text = output(process_input(&service, "/switch 9"));
    assert!(text.contains("No conversation number 9"));
    let text = output(process_input(&service, "/switch"));
    assert!(text.starts_with("Usage:"));
}

#[test]
fn deleting_the_only_conversation_reports_an_error() {
    let service = test_service();
    let text = output(process_input(&service, "/delete"));
    assert_eq!(text, "Error: Cannot delete the last conversation");
    assert_eq!(service.read(|store| store.conversations().len()), 1);
}

#[test]
fn rename_and_clear_change_the_active_conversation() {
    let service = test_service();
    let id = service.active_id();
    service.append_message(&id, Message::user("hi")).unwrap();

    output(process_input(&service, "/rename Groceries"));
    assert_eq!(service.conversation(&id).unwrap().name, "Groceries");

    output(process_input(&service, "/clear"));
    assert!(service.conversation(&id).unwrap().messages.is_empty());
}

#[test]
fn model_and_system_overrides() {
    let service = test_service();
    let id = service.active_id();

    assert_eq!(output(process_input(&service, "/model")), "Model: llama3");
    output(process_input(&service, "/model mistral:7b"));
    assert_eq!(service.conversation(&id).unwrap().model, "mistral:7b");

    output(process_input(&service, "/system Answer like a pirate."));
    assert_eq!(
        output(process_input(&service, "/system")),
        "System prompt: Answer like a pirate."
    );
    output(process_input(&service, "/system default"));
    assert_eq!(service.conversation(&id).unwrap().system_prompt, None);
}

#[test]
fn stop_without_a_generation_says_so() {
    let service = test_service();
    assert_eq!(output(process_input(&service, "/stop")), "Nothing to stop.");
}

#[test]
fn regen_is_handed_back_to_the_shell() {
    let service = test_service();
    assert_eq!(process_input(&service, "/regen"), CommandResult::Regenerate);
}

#[test]
fn set_changes_and_saves_settings() {
    use crate::core::collaborators::Persistence;

    let persistence = Arc::new(MemoryPersistence::new());
    let service = ChatService::new(
        test_client(),
        persistence.clone(),
        Arc::new(TracingNotifier),
        Arc::new(NoCue),
    );

    assert_eq!(
        output(process_input(&service, "/set memory-window 5")),
        "Set memory-window to: 5"
    );
    output(process_input(&service, "/set system-prompt Answer in French."));
    let settings = service.settings();
    assert_eq!(settings.memory_window.to_string(), "5");
    assert_eq!(settings.system_prompt, "Answer in French.");
    assert_eq!(persistence.load_settings().unwrap(), settings);

    let text = output(process_input(&service, "/set streaming sometimes"));
    assert!(text.starts_with("Error:"), "{text}");
    assert!(service.settings().streaming);

    assert!(output(process_input(&service, "/set colour blue")).contains("Unknown setting"));
    assert!(output(process_input(&service, "/set sound")).starts_with("Usage:"));
    assert!(output(process_input(&service, "/set")).contains("memory-window: 5"));
}

#[tokio::test]
async fn messages_wait_for_the_running_reply() {
    use crate::core::test_support::{spawn_http_server, BodyStep, CannedResponse};
    use std::time::Duration;

    let server = spawn_http_server(vec![CannedResponse::streamed(
        "application/x-ndjson",
        vec![BodyStep::Send(b"{\"response\":\"thinking\"}".to_vec()), BodyStep::Hold],
    )])
    .await;
    let service = ChatService::new(
        test_client(),
        Arc::new(MemoryPersistence::with_settings(Settings {
            base_url: server.base_url.clone(),
            default_model: "llama3".to_string(),
            ..Settings::default()
        })),
        Arc::new(TracingNotifier),
        Arc::new(NoCue),
    );
    let id = service.active_id();

    let running = {
        let service = service.clone();
        let id = id.clone();
        tokio::spawn(async move { service.send_message(&id, "first").await })
    };
    tokio::time::timeout(Duration::from_secs(5), async {
        while !service.is_generating(&id) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("generation should start");

    let text = output(process_input(&service, "second"));
    assert!(text.contains("still being generated"), "{text}");

    assert!(service.cancel(&id));
    let report = running.await.unwrap().unwrap();
    assert_eq!(report.state, crate::core::generation::GenerationState::Cancelled);
    let messages = service.conversation(&id).unwrap().messages;
    assert!(messages.iter().all(|message| message.content != "second"));
    assert_eq!(
        process_input(&service, "second"),
        CommandResult::ProcessAsMessage("second".to_string())
    );
}
