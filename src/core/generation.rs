//! One in-flight generation: request, placeholder, streamed deltas, and a
//! terminal state.
//!
//! ```text
//! Idle -> Requesting -> Streaming -> Completed | Cancelled | Failed
//! ```
//!
//! The store mutex is taken only for short synchronous sections and is
//! never held across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::StreamExt;
use tracing::{debug, info, warn};

use crate::core::chat_stream::{open_stream, OutboundRequest};
use crate::core::error::ChatError;
use crate::core::ids::{ConversationId, MessageId};
use crate::core::message::Message;
use crate::core::store::{ConversationStore, PreparedGeneration};
use crate::core::stream::{ChunkOutcome, DeltaPipeline};

/// Text stored in place of a reply that never arrived.
pub const ERROR_REPLY: &str =
    "Sorry, there was an error processing your request. Please try again.";

pub type SharedStore = Arc<Mutex<ConversationStore>>;

pub(crate) fn lock_store(store: &SharedStore) -> MutexGuard<'_, ConversationStore> {
    match store.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    Requesting,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl GenerationState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            GenerationState::Completed | GenerationState::Cancelled | GenerationState::Failed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GenerationState::Idle => "idle",
            GenerationState::Requesting => "requesting",
            GenerationState::Streaming => "streaming",
            GenerationState::Completed => "completed",
            GenerationState::Cancelled => "cancelled",
            GenerationState::Failed => "failed",
        }
    }
}

/// Passed to delta listeners each time text is appended.
#[derive(Debug, Clone, Copy)]
pub struct DeltaEvent<'a> {
    pub conversation_id: &'a ConversationId,
    pub message_id: &'a MessageId,
    pub delta: &'a str,
}

/// How a generation ended.
#[derive(Debug)]
pub struct GenerationReport {
    pub conversation_id: ConversationId,
    /// Placeholder (or synthetic error message) that received the outcome.
    pub message_id: Option<MessageId>,
    pub state: GenerationState,
    /// Final content of `message_id`.
    pub content: String,
    /// Set when `state` is `Failed`.
    pub error: Option<ChatError>,
}

impl GenerationReport {
    pub fn is_completed(&self) -> bool {
        self.state == GenerationState::Completed
    }
}

pub struct GenerationSession {
    prepared: PreparedGeneration,
    request: OutboundRequest,
    state: GenerationState,
    message_id: Option<MessageId>,
}

impl GenerationSession {
    pub fn new(prepared: PreparedGeneration, request: OutboundRequest) -> Self {
        Self {
            prepared,
            request,
            state: GenerationState::Idle,
            message_id: None,
        }
    }

    pub fn state(&self) -> GenerationState {
        self.state
    }

    fn transition(&mut self, next: GenerationState) {
        debug!(
            conversation_id = %self.prepared.conversation_id,
            from = self.state.as_str(),
            to = next.as_str(),
            "Generation state change"
        );
        self.state = next;
    }

    /// Drive the generation to a terminal state. The conversation lock taken
    /// when the generation was prepared is released before this returns.
    pub async fn run<F>(
        mut self,
        client: &reqwest::Client,
        store: &SharedStore,
        mut on_delta: F,
    ) -> GenerationReport
    where
        F: FnMut(&DeltaEvent<'_>),
    {
        let cancel = self.prepared.cancel.clone();
        self.transition(GenerationState::Requesting);

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = open_stream(client, &self.request) => Some(result),
        };
        let response = match opened {
            None => return self.finish(store, GenerationState::Cancelled, None),
            Some(Err(err)) => return self.finish(store, GenerationState::Failed, Some(err)),
            Some(Ok(response)) => response,
        };

        let placed = lock_store(store).place_generated(
            &self.prepared.conversation_id,
            &self.prepared.slot,
            Message::placeholder(),
        );
        match placed {
            Ok(message_id) => self.message_id = Some(message_id),
            Err(err) => return self.finish(store, GenerationState::Failed, Some(err)),
        }
        self.transition(GenerationState::Streaming);

        let mut body = response.bytes_stream();
        let mut pipeline = DeltaPipeline::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return self.finish(store, GenerationState::Cancelled, None);
                }
                next = body.next() => next,
            };

            let (outcome, at_end) = match next {
                Some(Ok(bytes)) => {
                    debug!(
                        conversation_id = %self.prepared.conversation_id,
                        bytes = bytes.len(),
                        "Received body chunk"
                    );
                    (pipeline.push(&bytes), false)
                }
                Some(Err(err)) => {
                    let err = ChatError::Network(err.to_string());
                    return self.finish(store, GenerationState::Failed, Some(err));
                }
                None => (pipeline.finish(), true),
            };

            if let Err(err) = self.apply(&outcome, store, &mut on_delta) {
                return self.finish(store, GenerationState::Failed, Some(err));
            }
            if let Some(message) = outcome.error {
                let err = ChatError::Network(message);
                return self.finish(store, GenerationState::Failed, Some(err));
            }
            if outcome.finished || at_end {
                return self.finish(store, GenerationState::Completed, None);
            }
        }
    }

    fn apply<F>(
        &self,
        outcome: &ChunkOutcome,
        store: &SharedStore,
        on_delta: &mut F,
    ) -> Result<(), ChatError>
    where
        F: FnMut(&DeltaEvent<'_>),
    {
        let Some(message_id) = self.message_id.as_ref() else {
            return Ok(());
        };
        for delta in &outcome.deltas {
            lock_store(store).append_delta(&self.prepared.conversation_id, message_id, delta)?;
            on_delta(&DeltaEvent {
                conversation_id: &self.prepared.conversation_id,
                message_id,
                delta,
            });
        }
        Ok(())
    }

    fn finish(
        mut self,
        store: &SharedStore,
        state: GenerationState,
        error: Option<ChatError>,
    ) -> GenerationReport {
        self.transition(state);
        let conversation_id = self.prepared.conversation_id.clone();
        let mut guard = lock_store(store);

        let mut content = self
            .message_id
            .as_ref()
            .and_then(|id| guard.message_content(&conversation_id, id).ok())
            .unwrap_or_default();

        let error = match (state, error) {
            (GenerationState::Failed, Some(err)) => {
                let reported = if content.is_empty() {
                    self.message_id = self.record_failure(&mut guard);
                    content = ERROR_REPLY.to_string();
                    match err {
                        ChatError::StreamInterrupted(message) => ChatError::Network(message),
                        other => other,
                    }
                } else {
                    match err {
                        ChatError::Network(message) => ChatError::StreamInterrupted(message),
                        other => other,
                    }
                };
                warn!(
                    conversation_id = %conversation_id,
                    error = %reported,
                    "Generation failed"
                );
                Some(reported)
            }
            (_, error) => error,
        };

        guard.end_generation(&conversation_id);
        drop(guard);

        info!(
            conversation_id = %conversation_id,
            state = state.as_str(),
            chars = content.chars().count(),
            "Generation finished"
        );

        GenerationReport {
            conversation_id,
            message_id: self.message_id,
            state,
            content,
            error,
        }
    }

    /// Leave an error-flagged message where the reply would have been.
    fn record_failure(&self, store: &mut ConversationStore) -> Option<MessageId> {
        let conversation_id = &self.prepared.conversation_id;
        match self.message_id.as_ref() {
            Some(placeholder) => store
                .mark_error(conversation_id, placeholder, ERROR_REPLY)
                .ok()
                .map(|_| placeholder.clone()),
            None => store
                .place_generated(conversation_id, &self.prepared.slot, Message::error(ERROR_REPLY))
                .ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chat_stream::build_request;
    use crate::core::config::{ApiMode, MemoryWindow, Settings};
    use crate::core::test_support::{
        spawn_http_server, test_client, BodyStep, CannedResponse,
    };
    use std::time::Duration;

    fn settings_for(base_url: &str) -> Settings {
        Settings {
            base_url: base_url.to_string(),
            default_model: "llama3".to_string(),
            memory_window: MemoryWindow::All,
            ..Settings::default()
        }
    }

    fn start(
        store: &SharedStore,
        settings: &Settings,
        text: &str,
    ) -> (ConversationId, GenerationSession) {
        let mut guard = lock_store(store);
        let id = guard.active_id().clone();
        let prepared = guard.begin_send(&id, text, settings).unwrap();
        let request = build_request(&settings.base_url, ApiMode::Generate, true, &prepared);
        (id, GenerationSession::new(prepared, request))
    }

    fn new_store() -> SharedStore {
        Arc::new(Mutex::new(ConversationStore::new("llama3")))
    }

    #[tokio::test]
    async fn concatenated_objects_complete_on_the_done_flag() {
        let server = spawn_http_server(vec![CannedResponse::chunks(
            "application/x-ndjson",
            &[
                r#"{"response":"Hel"}{"resp"#,
                r#"onse":"lo"}"#,
                "{\"response\":\"\",\"done\":true}",
            ],
        )])
        .await;
        let store = new_store();
        let settings = settings_for(&server.base_url);
        let (id, session) = start(&store, &settings, "Hi");
        assert_eq!(session.state(), GenerationState::Idle);

        let mut seen = Vec::new();
        let report = session
            .run(&test_client(), &store, |event| seen.push(event.delta.to_string()))
            .await;

        assert_eq!(report.state, GenerationState::Completed);
        assert_eq!(report.content, "Hello");
        assert_eq!(seen, vec!["Hel", "lo"]);
        let guard = lock_store(&store);
        assert!(!guard.is_locked(&id));
        let messages = &guard.get(&id).unwrap().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "Hello");
        assert!(!messages[1].is_error);
    }

    #[tokio::test]
    async fn event_stream_ends_at_the_sentinel_without_closing() {
        let server = spawn_http_server(vec![CannedResponse::streamed(
            "text/event-stream",
            vec![
                BodyStep::Send(b"data: {\"choices\":[{\"delta\":{\"content\":\"H\"}}]}\n\n".to_vec()),
                BodyStep::Send(b"data: {\"choices\":[{\"delta\":{\"content\":\"i\"}}]}\n\ndata: [DONE]\n\n".to_vec()),
                BodyStep::Hold,
            ],
        )])
        .await;
        let store = new_store();
        let settings = settings_for(&server.base_url);
        let (_, session) = start(&store, &settings, "Hello?");

        let report = tokio::time::timeout(
            Duration::from_secs(5),
            session.run(&test_client(), &store, |_| {}),
        )
        .await
        .expect("generation should end at the sentinel");

        assert_eq!(report.state, GenerationState::Completed);
        assert_eq!(report.content, "Hi");
    }

    #[tokio::test]
    async fn http_errors_leave_an_error_message() {
        let server = spawn_http_server(vec![CannedResponse::json(
            404,
            r#"{"error":"model 'llama3' not found"}"#,
        )])
        .await;
        let store = new_store();
        let settings = settings_for(&server.base_url);
        let (id, session) = start(&store, &settings, "Hi");

        let report = session.run(&test_client(), &store, |_| {}).await;

        assert_eq!(report.state, GenerationState::Failed);
        match report.error {
            Some(ChatError::Network(text)) => assert!(text.contains("not found"), "{text}"),
            other => panic!("expected network error, got {other:?}"),
        }
        let guard = lock_store(&store);
        let messages = &guard.get(&id).unwrap().messages;
        assert_eq!(messages.len(), 2);
        assert!(messages[1].is_error);
        assert_eq!(messages[1].content, ERROR_REPLY);
        assert_eq!(report.message_id.as_ref(), Some(&messages[1].id));
    }

    #[tokio::test]
    async fn in_band_errors_after_content_keep_the_partial_reply() {
        let server = spawn_http_server(vec![CannedResponse::chunks(
            "application/x-ndjson",
            &[
                "{\"response\":\"Par\"}\n",
                "{\"error\":\"model crashed\"}\n",
            ],
        )])
        .await;
        let store = new_store();
        let settings = settings_for(&server.base_url);
        let (id, session) = start(&store, &settings, "Hi");

        let report = session.run(&test_client(), &store, |_| {}).await;

        assert_eq!(report.state, GenerationState::Failed);
        assert!(matches!(report.error, Some(ChatError::StreamInterrupted(_))));
        assert_eq!(report.content, "Par");
        let guard = lock_store(&store);
        let messages = &guard.get(&id).unwrap().messages;
        assert_eq!(messages.len(), 2);
        assert!(!messages[1].is_error);
    }

    #[tokio::test]
    async fn connection_loss_after_content_keeps_the_partial_reply() {
        let server = spawn_http_server(vec![CannedResponse::streamed(
            "application/x-ndjson",
            vec![
                BodyStep::Send(b"{\"response\":\"Half a\"}\n".to_vec()),
                BodyStep::Pause(Duration::from_millis(10)),
                BodyStep::Drop,
            ],
        )])
        .await;
        let store = new_store();
        let settings = settings_for(&server.base_url);
        let (id, session) = start(&store, &settings, "Hi");

        let report = session.run(&test_client(), &store, |_| {}).await;

        assert_eq!(report.state, GenerationState::Failed);
        assert!(
            matches!(report.error, Some(ChatError::StreamInterrupted(_))),
            "{:?}",
            report.error
        );
        assert_eq!(report.content, "Half a");
        let guard = lock_store(&store);
        assert!(!guard.is_locked(&id));
        let messages = &guard.get(&id).unwrap().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "Half a");
        assert!(!messages[1].is_error);
    }

    #[tokio::test]
    async fn cancelling_keeps_partial_content() {
        let server = spawn_http_server(vec![CannedResponse::streamed(
            "application/x-ndjson",
            vec![
                BodyStep::Send(b"{\"response\":\"a\"}".to_vec()),
                BodyStep::Pause(Duration::from_millis(10)),
                BodyStep::Send(b"{\"response\":\"b\"}".to_vec()),
                BodyStep::Hold,
            ],
        )])
        .await;
        let store = new_store();
        let settings = settings_for(&server.base_url);
        let (id, session) = start(&store, &settings, "Count");
        let cancel = lock_store(&store).active_generation(&id).unwrap().cancel.clone();

        let mut count = 0;
        let report = session
            .run(&test_client(), &store, |_| {
                count += 1;
                if count == 2 {
                    cancel.cancel();
                }
            })
            .await;

        assert_eq!(report.state, GenerationState::Cancelled);
        assert_eq!(report.content, "ab");
        assert!(report.error.is_none());
        let guard = lock_store(&store);
        assert!(!guard.is_locked(&id));
        let messages = &guard.get(&id).unwrap().messages;
        assert_eq!(messages.len(), 2);
        assert!(!messages[1].is_error);
    }

    #[tokio::test]
    async fn cancelling_before_the_response_adds_nothing() {
        let store = new_store();
        // Already cancelled, so no request goes out.
        let settings = settings_for("http://127.0.0.1:9");
        let (id, session) = start(&store, &settings, "Hi");
        lock_store(&store).cancel(&id);

        let report = session.run(&test_client(), &store, |_| {}).await;
        assert_eq!(report.state, GenerationState::Cancelled);
        assert!(report.message_id.is_none());
        assert_eq!(lock_store(&store).get(&id).unwrap().messages.len(), 1);
    }

    #[tokio::test]
    async fn transport_close_completes_streams_without_markers() {
        let server = spawn_http_server(vec![CannedResponse::chunks(
            "text/plain",
            &["plain ", "text reply"],
        )])
        .await;
        let store = new_store();
        let settings = settings_for(&server.base_url);
        let (_, session) = start(&store, &settings, "Hi");

        let report = session.run(&test_client(), &store, |_| {}).await;
        assert_eq!(report.state, GenerationState::Completed);
        assert_eq!(report.content, "plain text reply");
    }

    #[test]
    fn terminal_states_are_recognised() {
        assert!(GenerationState::Completed.is_terminal());
        assert!(GenerationState::Cancelled.is_terminal());
        assert!(GenerationState::Failed.is_terminal());
        assert!(!GenerationState::Streaming.is_terminal());
    }
}
