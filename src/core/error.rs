use thiserror::Error;

use crate::core::config::ConfigError;
use crate::core::ids::{ConversationId, MessageId};

/// Failures surfaced by the chat core.
///
/// Cancellation is not an error: a stopped generation finishes with
/// [`GenerationState::Cancelled`](crate::core::generation::GenerationState).
#[derive(Debug, Error)]
pub enum ChatError {
    /// The request could not be sent, or the server answered with a non-success status.
    #[error("{0}")]
    Network(String),

    /// The response body failed after some content had already arrived.
    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("A response is already being generated for this conversation")]
    ConcurrentGeneration,

    #[error("No user message to regenerate from")]
    NoSourceMessage,

    #[error("Conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    #[error("Message not found: {0}")]
    MessageNotFound(MessageId),

    #[error("Cannot delete the last conversation")]
    LastConversation,

    #[error("Conversation is busy generating a response")]
    ConversationLocked,

    #[error("Message is still being generated")]
    MessageLocked,

    #[error("Only assistant messages can be regenerated")]
    NotAnAssistantMessage,

    #[error("Message is empty")]
    EmptyMessage,

    #[error(transparent)]
    Storage(#[from] ConfigError),
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Network(err.to_string())
    }
}
