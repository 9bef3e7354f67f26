use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::config::MemoryWindow;
use crate::core::ids::{ConversationId, MessageId};
use crate::core::message::Message;

pub const DEFAULT_CONVERSATION_NAME: &str = "New Chat";
const AUTO_NAME_CHARS: usize = 40;

fn default_name() -> String {
    DEFAULT_CONVERSATION_NAME.to_string()
}

/// An ordered chat history plus the per-conversation overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    /// Selected model; empty means the settings default applies.
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Conversation {
    pub fn new(name: Option<&str>, model: impl Into<String>) -> Self {
        let now = Utc::now();
        let name = name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(default_name);
        Self {
            id: ConversationId::generate(),
            name,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            model: model.into(),
            system_prompt: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn position(&self, id: &MessageId) -> Option<usize> {
        self.messages.iter().position(|message| &message.id == id)
    }

    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| &message.id == id)
    }

    pub fn message_mut(&mut self, id: &MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|message| &message.id == id)
    }

    /// Append a message, auto-naming the conversation from its first user message.
    pub fn push(&mut self, message: Message) -> MessageId {
        self.insert(self.messages.len(), message)
    }

    /// Insert at `index` (clamped to the end). Ids are kept unique within the conversation.
    pub fn insert(&mut self, index: usize, mut message: Message) -> MessageId {
        while self.position(&message.id).is_some() {
            message.id = MessageId::generate();
        }
        if message.is_user() && !self.messages.iter().any(Message::is_user) {
            self.auto_name(&message.content);
        }
        let id = message.id.clone();
        let index = index.min(self.messages.len());
        self.messages.insert(index, message);
        self.touch();
        id
    }

    pub fn remove(&mut self, id: &MessageId) -> Option<Message> {
        let index = self.position(id)?;
        let removed = self.messages.remove(index);
        self.touch();
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.touch();
    }

    /// Messages sent as context for a request built from `messages[..end]`.
    ///
    /// Error messages never reach the model; the window applies after
    /// they are dropped.
    pub fn context_window(&self, window: MemoryWindow, end: usize) -> Vec<&Message> {
        let end = end.min(self.messages.len());
        let usable: Vec<&Message> = self.messages[..end]
            .iter()
            .filter(|message| !message.is_error)
            .collect();
        window.select(&usable).to_vec()
    }

    /// Index of the nearest user message strictly before `index`.
    pub fn preceding_user_message(&self, index: usize) -> Option<usize> {
        let end = index.min(self.messages.len());
        self.messages[..end].iter().rposition(Message::is_user)
    }

    fn auto_name(&mut self, first_user_text: &str) {
        if self.name != DEFAULT_CONVERSATION_NAME {
            return;
        }
        let text = first_user_text.trim();
        if text.is_empty() {
            return;
        }
        let mut name: String = text.chars().take(AUTO_NAME_CHARS).collect();
        if text.chars().nth(AUTO_NAME_CHARS).is_some() {
            name.push_str("...");
        }
        self.name = name;
    }
}
