//! Model listing

use std::error::Error;

use chrono::{DateTime, Utc};

use crate::api::models::{fetch_models, sort_models};
use crate::core::config::Settings;

pub async fn list_models() -> Result<(), Box<dyn Error>> {
    let settings = Settings::load()?;

    println!("🤖 Available Models at {}", settings.base_url);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    if !settings.default_model.is_empty() {
        println!("🎯 Default model: {} (from config)", settings.default_model);
        println!();
    }

    let client = reqwest::Client::new();
    let mut models = fetch_models(&client, &settings.base_url).await?;

    if models.is_empty() {
        println!("No models found on this server.");
        return Ok(());
    }

    println!("Found {} models (sorted newest first):", models.len());
    println!();
    sort_models(&mut models);

    for model in models {
        println!("  • {}", model.id);
        if let Some(modified_at) = model.modified_at.as_deref().and_then(format_modified) {
            println!("    Modified: {modified_at}");
        }
        if let Some(size) = model.size {
            println!("    Size: {}", format_size(size));
        }
        println!();
    }

    Ok(())
}

fn format_modified(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Some(
            dt.with_timezone(&Utc)
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string(),
        ),
        Err(_) => Some(raw.to_string()),
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
