//! One-shot `say` command

use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;

use tracing::warn;

use crate::core::collaborators::{MemoryPersistence, NoCue, TracingNotifier};
use crate::core::config::Settings;
use crate::core::generation::GenerationState;
use crate::core::service::ChatService;

pub async fn run_say(prompt: Vec<String>, model: Option<String>) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: causette say <prompt>");
        std::process::exit(1);
    }

    let mut settings = Settings::load().unwrap_or_else(|err| {
        warn!(error = %err, "Failed to load settings; using defaults");
        Settings::default()
    });
    if let Some(model) = model {
        settings.default_model = model;
    }

    // Nothing from a one-shot run is written back to disk.
    let service = ChatService::new(
        reqwest::Client::new(),
        Arc::new(MemoryPersistence::with_settings(settings)),
        Arc::new(TracingNotifier),
        Arc::new(NoCue),
    );
    let id = service.active_id();
    service.on_delta(&id, |event| {
        print!("{}", event.delta);
        let _ = io::stdout().flush();
    });

    let send = service.send_message(&id, &prompt);
    tokio::pin!(send);
    let report = tokio::select! {
        report = &mut send => report,
        _ = tokio::signal::ctrl_c() => {
            service.cancel(&id);
            send.await
        }
    };

    let report = match report {
        Ok(report) => report,
        Err(err) => {
            eprintln!("❌ Error: {err}");
            std::process::exit(1);
        }
    };

    match report.state {
        GenerationState::Completed => {
            println!();
            Ok(())
        }
        GenerationState::Cancelled => {
            println!();
            eprintln!("⚠️  Generation stopped");
            std::process::exit(130);
        }
        _ => {
            let detail = report
                .error
                .map(|err| err.to_string())
                .unwrap_or_else(|| report.content.clone());
            eprintln!("\n\n❌ Error: {detail}");
            std::process::exit(1);
        }
    }
}
