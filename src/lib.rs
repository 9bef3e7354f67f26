//! Causette is a terminal chat client for language models served locally
//! (Ollama-compatible servers by default).
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns conversations and their store, the streaming decode
//!   pipeline, and the generation state machine that ties them together
//!   behind [`core::service::ChatService`].
//! - [`commands`] implements slash-command parsing and execution for the
//!   line-mode shell.
//! - [`api`] defines request and model-listing payloads.
//! - [`logging`] installs the tracing subscriber.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod commands;
pub mod core;
pub mod logging;
pub mod utils;
