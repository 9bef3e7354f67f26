//! In-memory conversation store and its locking rules.
//!
//! A conversation with a running generation is locked: it can still be
//! viewed, switched to, and renamed, but it cannot be deleted or cleared,
//! its target message cannot be deleted, and no second generation starts.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::config::Settings;
use crate::core::conversation::Conversation;
use crate::core::error::ChatError;
use crate::core::ids::{ConversationId, MessageId};
use crate::core::message::{Message, Role};

/// Where a generation's placeholder lands once the response starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// At the end of the conversation.
    Append,
    /// Directly after the given message, or at the end if it is gone.
    After(MessageId),
}

/// Bookkeeping for a conversation whose generation is in flight.
#[derive(Debug, Clone)]
pub struct ActiveGeneration {
    pub cancel: CancellationToken,
    /// Set once the placeholder exists.
    pub message_id: Option<MessageId>,
}

/// Everything a generation needs, captured while the store is locked.
#[derive(Debug, Clone)]
pub struct PreparedGeneration {
    pub conversation_id: ConversationId,
    pub slot: Slot,
    /// Context window, oldest first.
    pub context: Vec<Message>,
    pub model: String,
    pub system_prompt: Option<String>,
    pub cancel: CancellationToken,
}

#[derive(Debug)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    active: ConversationId,
    generations: HashMap<ConversationId, ActiveGeneration>,
}

impl ConversationStore {
    /// Fresh store holding one empty conversation.
    pub fn new(default_model: &str) -> Self {
        let conversation = Conversation::new(None, default_model);
        Self {
            active: conversation.id.clone(),
            conversations: vec![conversation],
            generations: HashMap::new(),
        }
    }

    /// Build from persisted conversations. Returns `true` when a default
    /// conversation had to be created because nothing usable was loaded.
    pub fn from_loaded(loaded: Vec<Conversation>, default_model: &str) -> (Self, bool) {
        let mut conversations: Vec<Conversation> = Vec::with_capacity(loaded.len());
        for conversation in loaded {
            if conversations.iter().any(|c| c.id == conversation.id) {
                debug!(conversation_id = %conversation.id, "Dropping duplicate conversation on load");
                continue;
            }
            conversations.push(conversation);
        }

        match conversations.first() {
            Some(first) => {
                let active = first.id.clone();
                (
                    Self {
                        conversations,
                        active,
                        generations: HashMap::new(),
                    },
                    false,
                )
            }
            None => (Self::new(default_model), true),
        }
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Conversations ordered most recently updated first.
    pub fn listing(&self) -> Vec<&Conversation> {
        let mut listing: Vec<&Conversation> = self.conversations.iter().collect();
        listing.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        listing
    }

    pub fn active_id(&self) -> &ConversationId {
        &self.active
    }

    pub fn active(&self) -> &Conversation {
        // The active id always names a live conversation.
        self.conversations
            .iter()
            .find(|c| c.id == self.active)
            .unwrap_or(&self.conversations[0])
    }

    pub fn get(&self, id: &ConversationId) -> Result<&Conversation, ChatError> {
        self.conversations
            .iter()
            .find(|c| &c.id == id)
            .ok_or_else(|| ChatError::ConversationNotFound(id.clone()))
    }

    fn get_mut(&mut self, id: &ConversationId) -> Result<&mut Conversation, ChatError> {
        self.conversations
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| ChatError::ConversationNotFound(id.clone()))
    }

    pub fn is_locked(&self, id: &ConversationId) -> bool {
        self.generations.contains_key(id)
    }

    pub fn active_generation(&self, id: &ConversationId) -> Option<&ActiveGeneration> {
        self.generations.get(id)
    }

    /// Create a conversation and make it active.
    pub fn create(&mut self, name: Option<&str>, default_model: &str) -> ConversationId {
        let conversation = Conversation::new(name, default_model);
        let id = conversation.id.clone();
        self.conversations.insert(0, conversation);
        self.active = id.clone();
        id
    }

    /// Switching is always allowed, including to or from a locked conversation.
    pub fn switch(&mut self, id: &ConversationId) -> Result<(), ChatError> {
        self.get(id)?;
        self.active = id.clone();
        Ok(())
    }

    pub fn delete(&mut self, id: &ConversationId) -> Result<Conversation, ChatError> {
        let index = self
            .conversations
            .iter()
            .position(|c| &c.id == id)
            .ok_or_else(|| ChatError::ConversationNotFound(id.clone()))?;
        if self.conversations.len() == 1 {
            return Err(ChatError::LastConversation);
        }
        if self.is_locked(id) {
            return Err(ChatError::ConversationLocked);
        }

        let removed = self.conversations.remove(index);
        if self.active == removed.id {
            self.active = self.conversations[0].id.clone();
        }
        Ok(removed)
    }

    pub fn rename(&mut self, id: &ConversationId, name: &str) -> Result<(), ChatError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let conversation = self.get_mut(id)?;
        conversation.name = name.to_string();
        conversation.touch();
        Ok(())
    }

    pub fn clear(&mut self, id: &ConversationId) -> Result<(), ChatError> {
        if self.is_locked(id) {
            self.get(id)?;
            return Err(ChatError::ConversationLocked);
        }
        self.get_mut(id)?.clear();
        Ok(())
    }

    pub fn set_model(&mut self, id: &ConversationId, model: &str) -> Result<(), ChatError> {
        let conversation = self.get_mut(id)?;
        conversation.model = model.trim().to_string();
        conversation.touch();
        Ok(())
    }

    /// `None` (or a blank prompt) reverts to the settings default.
    pub fn set_system_prompt(
        &mut self,
        id: &ConversationId,
        prompt: Option<&str>,
    ) -> Result<(), ChatError> {
        let conversation = self.get_mut(id)?;
        conversation.system_prompt = prompt
            .filter(|prompt| !prompt.trim().is_empty())
            .map(str::to_string);
        conversation.touch();
        Ok(())
    }

    pub fn append(&mut self, id: &ConversationId, message: Message) -> Result<MessageId, ChatError> {
        Ok(self.get_mut(id)?.push(message))
    }

    pub fn delete_message(
        &mut self,
        id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<Message, ChatError> {
        let targeted = self
            .generations
            .get(id)
            .and_then(|generation| generation.message_id.as_ref())
            == Some(message_id);
        if targeted {
            return Err(ChatError::MessageLocked);
        }
        self.get_mut(id)?
            .remove(message_id)
            .ok_or_else(|| ChatError::MessageNotFound(message_id.clone()))
    }

    /// Append the user's message and lock the conversation for a new generation.
    pub fn begin_send(
        &mut self,
        id: &ConversationId,
        text: &str,
        settings: &Settings,
    ) -> Result<PreparedGeneration, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        self.get(id)?;
        if self.is_locked(id) {
            return Err(ChatError::ConcurrentGeneration);
        }

        let conversation = self.get_mut(id)?;
        conversation.push(Message::user(text));
        let end = conversation.messages.len();
        let prepared = prepare(conversation, Slot::Append, end, settings);
        self.lock(id, &prepared);
        Ok(prepared)
    }

    /// Remove an assistant message and lock the conversation to regenerate it
    /// from the nearest preceding user message.
    ///
    /// Nothing is changed when the request is rejected.
    pub fn begin_regenerate(
        &mut self,
        id: &ConversationId,
        assistant_message_id: &MessageId,
        settings: &Settings,
    ) -> Result<PreparedGeneration, ChatError> {
        if self.is_locked(id) {
            self.get(id)?;
            return Err(ChatError::ConcurrentGeneration);
        }

        let conversation = self.get_mut(id)?;
        let index = conversation
            .position(assistant_message_id)
            .ok_or_else(|| ChatError::MessageNotFound(assistant_message_id.clone()))?;
        if conversation.messages[index].role != Role::Assistant {
            return Err(ChatError::NotAnAssistantMessage);
        }
        let source = conversation
            .preceding_user_message(index)
            .ok_or(ChatError::NoSourceMessage)?;

        let slot = Slot::After(conversation.messages[index - 1].id.clone());
        conversation.messages.remove(index);
        conversation.touch();
        let prepared = prepare(conversation, slot, source + 1, settings);
        self.lock(id, &prepared);
        Ok(prepared)
    }

    /// Most recent assistant message in a conversation, if any.
    pub fn last_assistant_message(&self, id: &ConversationId) -> Result<Option<MessageId>, ChatError> {
        Ok(self
            .get(id)?
            .messages
            .iter()
            .rev()
            .find(|message| message.is_assistant())
            .map(|message| message.id.clone()))
    }

    fn lock(&mut self, id: &ConversationId, prepared: &PreparedGeneration) {
        self.generations.insert(
            id.clone(),
            ActiveGeneration {
                cancel: prepared.cancel.clone(),
                message_id: None,
            },
        );
    }

    /// Insert `message` at the generation's slot and record it as the target.
    pub fn place_generated(
        &mut self,
        id: &ConversationId,
        slot: &Slot,
        message: Message,
    ) -> Result<MessageId, ChatError> {
        let conversation = self.get_mut(id)?;
        let index = match slot {
            Slot::Append => conversation.messages.len(),
            Slot::After(anchor) => conversation
                .position(anchor)
                .map(|index| index + 1)
                .unwrap_or(conversation.messages.len()),
        };
        let message_id = conversation.insert(index, message);
        if let Some(generation) = self.generations.get_mut(id) {
            generation.message_id = Some(message_id.clone());
        }
        Ok(message_id)
    }

    /// Append streamed text to the generation target. Returns the new content length.
    pub fn append_delta(
        &mut self,
        id: &ConversationId,
        message_id: &MessageId,
        delta: &str,
    ) -> Result<usize, ChatError> {
        let message = self
            .get_mut(id)?
            .message_mut(message_id)
            .ok_or_else(|| ChatError::MessageNotFound(message_id.clone()))?;
        message.content.push_str(delta);
        Ok(message.content.len())
    }

    /// Replace an empty target with error text and flag it.
    pub fn mark_error(
        &mut self,
        id: &ConversationId,
        message_id: &MessageId,
        text: &str,
    ) -> Result<(), ChatError> {
        let conversation = self.get_mut(id)?;
        let message = conversation
            .message_mut(message_id)
            .ok_or_else(|| ChatError::MessageNotFound(message_id.clone()))?;
        message.content = text.to_string();
        message.is_error = true;
        conversation.touch();
        Ok(())
    }

    pub fn message_content(
        &self,
        id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<String, ChatError> {
        self.get(id)?
            .message(message_id)
            .map(|message| message.content.clone())
            .ok_or_else(|| ChatError::MessageNotFound(message_id.clone()))
    }

    /// Release the lock taken by `begin_send` / `begin_regenerate`.
    pub fn end_generation(&mut self, id: &ConversationId) {
        self.generations.remove(id);
        if let Ok(conversation) = self.get_mut(id) {
            conversation.touch();
        }
    }

    /// Request cancellation. Returns `false` when nothing is running.
    pub fn cancel(&self, id: &ConversationId) -> bool {
        match self.generations.get(id) {
            Some(generation) => {
                generation.cancel.cancel();
                true
            }
            None => false,
        }
    }
}

fn prepare(
    conversation: &Conversation,
    slot: Slot,
    end: usize,
    settings: &Settings,
) -> PreparedGeneration {
    let context = conversation
        .context_window(settings.memory_window, end)
        .into_iter()
        .cloned()
        .collect();
    PreparedGeneration {
        conversation_id: conversation.id.clone(),
        slot,
        context,
        model: settings.effective_model(&conversation.model).to_string(),
        system_prompt: settings
            .effective_system_prompt(conversation.system_prompt.as_deref())
            .map(str::to_string),
        cancel: CancellationToken::new(),
    }
}
