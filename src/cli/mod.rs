//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments and runs the selected subcommand.

pub mod chat;
pub mod models;
pub mod say;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::chat::run_chat;
use crate::cli::models::list_models;
use crate::cli::say::run_say;
use crate::core::config::{path_display, Settings};
use crate::logging;

#[derive(Parser)]
#[command(name = "causette")]
#[command(about = "A terminal chat client for locally hosted language models")]
#[command(
    long_about = "Causette talks to a local inference server (Ollama-compatible by default), \
keeps several conversations side by side and prints replies as they stream in.\n\n\
Environment Variables:\n\
  CAUSETTE_LOG      Log filter directives (defaults to \"warn\")\n\n\
Chat commands:\n\
  /help             List slash commands\n\
  /new [name]       Start a new conversation\n\
  /regen            Regenerate the last reply\n\
  Ctrl+C            Stop the reply being generated"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model to use instead of the configured default
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Append log output to the given file instead of stderr
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the line-mode chat shell (default)
    Chat,
    /// Send a single prompt and print the reply
    Say {
        /// Prompt text (multiple words are joined with spaces)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// List the models installed on the server
    Models,
    /// Set a configuration value
    Set {
        /// Configuration key to set
        key: String,
        /// Value to set for the key (can be multiple words for system-prompt)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Reset a configuration value to its default
    Unset {
        /// Configuration key to unset
        key: String,
    },
    /// Show the current configuration
    Config,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    logging::init(args.log.as_deref())?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let model = args.model.filter(|model| !model.trim().is_empty());

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(model).await,
        Commands::Say { prompt } => run_say(prompt, model).await,
        Commands::Models => list_models().await,
        Commands::Set { key, value } => {
            let value = value.join(" ");
            if value.trim().is_empty() {
                eprintln!("⚠️  A value is required: causette set {key} <value>");
                std::process::exit(1);
            }
            let mut settings = Settings::load()?;
            if let Err(e) = settings.set_value(&key, &value) {
                eprintln!("❌ {e}");
                std::process::exit(1);
            }
            settings.save()?;
            println!("✅ Set {key} to: {value}");
            Ok(())
        }
        Commands::Unset { key } => {
            let mut settings = Settings::load()?;
            if let Err(e) = settings.unset_value(&key) {
                eprintln!("❌ {e}");
                std::process::exit(1);
            }
            settings.save()?;
            println!("✅ Reset {key} to its default");
            Ok(())
        }
        Commands::Config => {
            let path = Settings::default_path()?;
            let settings = Settings::load()?;
            println!("📁 {}", path_display(&path));
            settings.print_all();
            Ok(())
        }
    }
}
