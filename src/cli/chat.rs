//! Line-mode chat shell
//!
//! Lines typed on stdin are either slash commands or messages for the active
//! conversation. Generations run on their own tasks so the shell keeps
//! reading input (and `/stop` or Ctrl+C can reach them) while a reply
//! streams in.

use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::commands::{process_input, CommandResult};
use crate::core::collaborators::{StderrNotifier, TerminalBell};
use crate::core::error::ChatError;
use crate::core::generation::{GenerationReport, GenerationState};
use crate::core::ids::ConversationId;
use crate::core::persistence::FilePersistence;
use crate::core::service::ChatService;

type Outcome = Result<GenerationReport, ChatError>;

enum Request {
    Send(String),
    RegenerateLast,
}

pub async fn run_chat(model: Option<String>) -> Result<(), Box<dyn Error>> {
    let persistence = FilePersistence::from_project_dirs()?;
    let conversations_path = persistence.conversations_path().to_path_buf();
    let service = ChatService::new(
        reqwest::Client::new(),
        Arc::new(persistence),
        Arc::new(StderrNotifier),
        Arc::new(TerminalBell),
    );

    if let Some(model) = model {
        service.set_model(&service.active_id(), &model)?;
    }

    print_banner(&service, &conversations_path.display().to_string());

    let (tx, mut rx) = mpsc::unbounded_channel::<Outcome>();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut in_flight = 0_usize;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match process_input(&service, &line) {
                    CommandResult::Continue => {}
                    CommandResult::Output(text) => println!("{text}"),
                    CommandResult::Quit => break,
                    CommandResult::ProcessAsMessage(text) => {
                        if !text.trim().is_empty() {
                            spawn_generation(&service, &tx, Request::Send(text));
                            in_flight += 1;
                        }
                    }
                    CommandResult::Regenerate => {
                        spawn_generation(&service, &tx, Request::RegenerateLast);
                        in_flight += 1;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                // Ctrl+C stops a running reply; with nothing running it quits.
                if !service.cancel(&service.active_id()) {
                    println!();
                    break;
                }
            }
            Some(outcome) = rx.recv() => {
                in_flight = in_flight.saturating_sub(1);
                print_outcome(outcome);
            }
        }
    }

    // Let running generations settle so their final state gets saved.
    for id in generating_conversations(&service) {
        service.cancel(&id);
    }
    while in_flight > 0 {
        match rx.recv().await {
            Some(outcome) => {
                in_flight -= 1;
                print_outcome(outcome);
            }
            None => break,
        }
    }

    Ok(())
}

fn print_banner(service: &ChatService, conversations_path: &str) {
    let settings = service.settings();
    let (name, model) = service.read(|store| {
        let active = store.active();
        (
            active.name.clone(),
            settings.effective_model(&active.model).to_string(),
        )
    });

    eprintln!("🚀 Starting Causette");
    eprintln!("🌐 Server: {}", settings.base_url);
    if model.is_empty() {
        eprintln!("📡 Model: (unset, use /model <name> or causette set default-model)");
    } else {
        eprintln!("📡 Model: {model}");
    }
    eprintln!("💬 Conversation: {name}");
    eprintln!("📁 History: {conversations_path}");
    eprintln!("💡 Type /help for commands, Ctrl+C to stop a reply");
    eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

fn spawn_generation(service: &ChatService, tx: &mpsc::UnboundedSender<Outcome>, request: Request) {
    let service = service.clone();
    let tx = tx.clone();
    let id = service.active_id();
    tokio::spawn(async move {
        let listener = service.on_delta(&id, |event| {
            print!("{}", event.delta);
            let _ = io::stdout().flush();
        });
        let outcome = match request {
            Request::Send(text) => service.send_message(&id, &text).await,
            Request::RegenerateLast => service.regenerate_last(&id).await,
        };
        service.remove_listener(listener);
        let _ = tx.send(outcome);
    });
}

fn print_outcome(outcome: Outcome) {
    match outcome {
        Ok(report) => {
            match report.state {
                GenerationState::Completed | GenerationState::Cancelled => println!(),
                GenerationState::Failed => {
                    println!();
                    if let Some(err) = report.error {
                        eprintln!("❌ Error: {err}");
                    }
                }
                _ => {}
            }
        }
        Err(err) => eprintln!("❌ Error: {err}"),
    }
}

fn generating_conversations(service: &ChatService) -> Vec<ConversationId> {
    service.read(|store| {
        store
            .conversations()
            .iter()
            .filter(|conversation| store.is_locked(&conversation.id))
            .map(|conversation| conversation.id.clone())
            .collect()
    })
}
