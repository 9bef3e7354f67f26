//! Interfaces the chat core consumes from its host.
//!
//! The core never reaches for storage, notification surfaces, or sound
//! directly; a front end wires these in when it builds a
//! [`ChatService`](crate::core::service::ChatService).

use std::io::Write;
use std::sync::Mutex;

use tracing::{error, info, warn};

use crate::core::config::{ConfigError, Settings};
use crate::core::conversation::Conversation;

/// Durable storage for conversations and settings.
pub trait Persistence: Send + Sync {
    fn load_conversations(&self) -> Result<Vec<Conversation>, ConfigError>;
    fn save_conversations(&self, conversations: &[Conversation]) -> Result<(), ConfigError>;
    fn load_settings(&self) -> Result<Settings, ConfigError>;
    fn save_settings(&self, settings: &Settings) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    Success,
    Error,
    Warning,
}

/// Fire-and-forget user notifications (toasts, status lines).
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, kind: NotifyKind);
}

/// Completion sound. Failures are swallowed by implementations.
pub trait AudioCue: Send + Sync {
    fn play_cue(&self);
}

/// Keeps everything in process memory. Used by one-shot runs and tests.
#[derive(Default)]
pub struct MemoryPersistence {
    conversations: Mutex<Vec<Conversation>>,
    settings: Mutex<Option<Settings>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            conversations: Mutex::new(Vec::new()),
            settings: Mutex::new(Some(settings)),
        }
    }

    /// Last saved conversation list.
    pub fn saved_conversations(&self) -> Vec<Conversation> {
        match self.conversations.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Persistence for MemoryPersistence {
    fn load_conversations(&self) -> Result<Vec<Conversation>, ConfigError> {
        Ok(self.saved_conversations())
    }

    fn save_conversations(&self, conversations: &[Conversation]) -> Result<(), ConfigError> {
        let mut guard = match self.conversations.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = conversations.to_vec();
        Ok(())
    }

    fn load_settings(&self) -> Result<Settings, ConfigError> {
        let guard = match self.settings.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(guard.clone().unwrap_or_default())
    }

    fn save_settings(&self, settings: &Settings) -> Result<(), ConfigError> {
        let mut guard = match self.settings.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(settings.clone());
        Ok(())
    }
}

/// Routes notifications into the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, kind: NotifyKind) {
        match kind {
            NotifyKind::Success => info!(target: "causette::notify", "{message}"),
            NotifyKind::Warning => warn!(target: "causette::notify", "{message}"),
            NotifyKind::Error => error!(target: "causette::notify", "{message}"),
        }
    }
}

/// Prints notifications to stderr, for terminal front ends.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, message: &str, kind: NotifyKind) {
        let prefix = match kind {
            NotifyKind::Success => "✓",
            NotifyKind::Warning => "⚠️",
            NotifyKind::Error => "❌",
        };
        eprintln!("{prefix} {message}");
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoCue;

impl AudioCue for NoCue {
    fn play_cue(&self) {}
}

/// Rings the terminal bell.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl AudioCue for TerminalBell {
    fn play_cue(&self) {
        let mut stderr = std::io::stderr();
        let _ = stderr.write_all(b"\x07");
        let _ = stderr.flush();
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_persistence_round_trips_conversations_and_settings() {
        let persistence = MemoryPersistence::new();
        assert!(persistence.load_conversations().unwrap().is_empty());
        assert_eq!(persistence.load_settings().unwrap(), Settings::default());

        let conversation = Conversation::new(Some("Saved"), "llama3");
        persistence
            .save_conversations(std::slice::from_ref(&conversation))
            .unwrap();
        assert_eq!(persistence.load_conversations().unwrap(), vec![conversation]);

        let settings = Settings {
            sound: true,
            ..Settings::default()
        };
        persistence.save_settings(&settings).unwrap();
        assert!(persistence.load_settings().unwrap().sound);
    }
}
