//! The chat core as front ends see it.
//!
//! [`ChatService`] owns the conversation store, runs generations, fans
//! deltas out to listeners, and persists after every mutation. It is cheap
//! to clone; clones share state, so several conversations can stream at
//! once from different tasks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::core::chat_stream::build_request;
use crate::core::collaborators::{AudioCue, NotifyKind, Notifier, Persistence};
use crate::core::config::Settings;
use crate::core::conversation::Conversation;
use crate::core::error::ChatError;
use crate::core::generation::{
    lock_store, DeltaEvent, GenerationReport, GenerationSession, GenerationState, SharedStore,
};
use crate::core::ids::{ConversationId, MessageId};
use crate::core::message::Message;
use crate::core::store::{ConversationStore, PreparedGeneration};

pub type DeltaCallback = Arc<dyn Fn(&DeltaEvent<'_>) + Send + Sync>;

/// Handle returned by [`ChatService::on_delta`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listeners = HashMap<ConversationId, Vec<(ListenerId, DeltaCallback)>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Send,
    Regenerate,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Clone)]
pub struct ChatService {
    client: reqwest::Client,
    store: SharedStore,
    settings: Arc<Mutex<Settings>>,
    listeners: Arc<Mutex<Listeners>>,
    next_listener: Arc<AtomicU64>,
    persistence: Arc<dyn Persistence>,
    notifier: Arc<dyn Notifier>,
    audio: Arc<dyn AudioCue>,
}

impl ChatService {
    /// Load settings and conversations, falling back to defaults when the
    /// stored state cannot be read.
    pub fn new(
        client: reqwest::Client,
        persistence: Arc<dyn Persistence>,
        notifier: Arc<dyn Notifier>,
        audio: Arc<dyn AudioCue>,
    ) -> Self {
        let settings = persistence.load_settings().unwrap_or_else(|err| {
            warn!(error = %err, "Failed to load settings; using defaults");
            Settings::default()
        });
        let loaded = persistence.load_conversations().unwrap_or_else(|err| {
            warn!(error = %err, "Failed to load conversations; starting fresh");
            Vec::new()
        });
        let (store, created) = ConversationStore::from_loaded(loaded, &settings.default_model);

        let service = Self {
            client,
            store: Arc::new(Mutex::new(store)),
            settings: Arc::new(Mutex::new(settings)),
            listeners: Arc::new(Mutex::new(HashMap::new())),
            next_listener: Arc::new(AtomicU64::new(1)),
            persistence,
            notifier,
            audio,
        };
        if created {
            service.persist();
        }
        service
    }

    pub fn settings(&self) -> Settings {
        lock(&self.settings).clone()
    }

    /// Apply `change` to the settings and save them.
    pub fn update_settings<F>(&self, change: F) -> Result<(), ChatError>
    where
        F: FnOnce(&mut Settings),
    {
        let snapshot = {
            let mut settings = lock(&self.settings);
            change(&mut settings);
            settings.clone()
        };
        self.persistence.save_settings(&snapshot)?;
        Ok(())
    }

    /// Read-only access to the store.
    pub fn read<R>(&self, f: impl FnOnce(&ConversationStore) -> R) -> R {
        f(&lock_store(&self.store))
    }

    pub fn active_id(&self) -> ConversationId {
        self.read(|store| store.active_id().clone())
    }

    pub fn conversation(&self, id: &ConversationId) -> Result<Conversation, ChatError> {
        self.read(|store| store.get(id).cloned())
    }

    pub fn is_generating(&self, id: &ConversationId) -> bool {
        self.read(|store| store.is_locked(id))
    }

    /// Register a callback for text appended to `id`'s generations.
    pub fn on_delta<F>(&self, id: &ConversationId, callback: F) -> ListenerId
    where
        F: Fn(&DeltaEvent<'_>) + Send + Sync + 'static,
    {
        let listener = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        lock(&self.listeners)
            .entry(id.clone())
            .or_default()
            .push((listener, Arc::new(callback)));
        listener
    }

    pub fn remove_listener(&self, listener: ListenerId) {
        let mut listeners = lock(&self.listeners);
        for callbacks in listeners.values_mut() {
            callbacks.retain(|(id, _)| *id != listener);
        }
        listeners.retain(|_, callbacks| !callbacks.is_empty());
    }

    fn dispatch(&self, event: &DeltaEvent<'_>) {
        let callbacks: Vec<DeltaCallback> = lock(&self.listeners)
            .get(event.conversation_id)
            .map(|callbacks| callbacks.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();
        for callback in callbacks {
            callback(event);
        }
    }

    fn persist(&self) {
        let conversations = self.read(|store| store.conversations().to_vec());
        if let Err(err) = self.persistence.save_conversations(&conversations) {
            warn!(error = %err, "Failed to save conversations");
            self.notifier.notify("Failed to save chats", NotifyKind::Error);
        }
    }

    fn mutate<R>(
        &self,
        change: impl FnOnce(&mut ConversationStore) -> Result<R, ChatError>,
    ) -> Result<R, ChatError> {
        let result = change(&mut lock_store(&self.store))?;
        self.persist();
        Ok(result)
    }

    /// Append `text` as a user message and generate a reply. Resolves once
    /// the generation reaches a terminal state.
    pub async fn send_message(
        &self,
        id: &ConversationId,
        text: &str,
    ) -> Result<GenerationReport, ChatError> {
        let settings = self.settings();
        let prepared = self.mutate(|store| store.begin_send(id, text, &settings))?;
        Ok(self.generate(prepared, &settings, Origin::Send).await)
    }

    /// Replace an assistant reply with a fresh generation from the nearest
    /// preceding user message.
    pub async fn regenerate(
        &self,
        id: &ConversationId,
        assistant_message_id: &MessageId,
    ) -> Result<GenerationReport, ChatError> {
        let settings = self.settings();
        let prepared = self
            .mutate(|store| store.begin_regenerate(id, assistant_message_id, &settings))
            .inspect_err(|err| {
                if matches!(err, ChatError::NoSourceMessage) {
                    self.notifier
                        .notify("No user message found to regenerate from", NotifyKind::Error);
                }
            })?;
        Ok(self.generate(prepared, &settings, Origin::Regenerate).await)
    }

    /// Regenerate the newest assistant reply of a conversation.
    pub async fn regenerate_last(&self, id: &ConversationId) -> Result<GenerationReport, ChatError> {
        let target = self
            .read(|store| store.last_assistant_message(id))?
            .ok_or(ChatError::NoSourceMessage)?;
        self.regenerate(id, &target).await
    }

    /// Stop the conversation's generation. Returns `false` (and does nothing)
    /// when none is running.
    pub fn cancel(&self, id: &ConversationId) -> bool {
        let cancelled = self.read(|store| store.cancel(id));
        debug!(conversation_id = %id, cancelled, "Cancel requested");
        cancelled
    }

    async fn generate(
        &self,
        prepared: PreparedGeneration,
        settings: &Settings,
        origin: Origin,
    ) -> GenerationReport {
        let request = build_request(
            &settings.base_url,
            settings.api_mode,
            settings.streaming,
            &prepared,
        );
        let session = GenerationSession::new(prepared, request);
        let report = session
            .run(&self.client, &self.store, |event| self.dispatch(event))
            .await;

        match report.state {
            GenerationState::Completed => {
                if settings.sound && !report.content.is_empty() {
                    self.audio.play_cue();
                }
            }
            GenerationState::Cancelled => {
                self.notifier.notify("Generation stopped", NotifyKind::Warning);
            }
            GenerationState::Failed => {
                let message = match origin {
                    Origin::Send => "Failed to get response",
                    Origin::Regenerate => "Failed to regenerate",
                };
                self.notifier.notify(message, NotifyKind::Error);
            }
            GenerationState::Idle | GenerationState::Requesting | GenerationState::Streaming => {}
        }

        self.persist();
        report
    }

    /// Create a conversation using the default model and make it active.
    pub fn create_conversation(&self, name: Option<&str>) -> ConversationId {
        let default_model = self.settings().default_model;
        let id = lock_store(&self.store).create(name, &default_model);
        self.persist();
        id
    }

    pub fn switch_conversation(&self, id: &ConversationId) -> Result<(), ChatError> {
        self.mutate(|store| store.switch(id))
    }

    pub fn delete_conversation(&self, id: &ConversationId) -> Result<(), ChatError> {
        self.mutate(|store| store.delete(id).map(|_| ()))?;
        lock(&self.listeners).remove(id);
        Ok(())
    }

    pub fn rename_conversation(&self, id: &ConversationId, name: &str) -> Result<(), ChatError> {
        self.mutate(|store| store.rename(id, name))
    }

    pub fn clear_conversation(&self, id: &ConversationId) -> Result<(), ChatError> {
        self.mutate(|store| store.clear(id))
    }

    pub fn append_message(&self, id: &ConversationId, message: Message) -> Result<MessageId, ChatError> {
        self.mutate(|store| store.append(id, message))
    }

    pub fn delete_message(&self, id: &ConversationId, message_id: &MessageId) -> Result<(), ChatError> {
        self.mutate(|store| store.delete_message(id, message_id).map(|_| ()))
    }

    pub fn set_model(&self, id: &ConversationId, model: &str) -> Result<(), ChatError> {
        self.mutate(|store| store.set_model(id, model))
    }

    pub fn set_system_prompt(&self, id: &ConversationId, prompt: Option<&str>) -> Result<(), ChatError> {
        self.mutate(|store| store.set_system_prompt(id, prompt))
    }
}
