//! Per-conversation message log with a replaying update stream.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use strum::Display;
use tokio::sync::{broadcast, Mutex};
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::types::Message;

const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// What changed in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Mutation {
    /// Initial replay delivered to a new subscriber.
    Snapshot,
    Add,
    Update,
    Clear,
}

/// One item of the update stream: the mutation and the full log after it.
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    pub mutation: Mutation,
    pub messages: Arc<Vec<Message>>,
}

/// Ordered, capacity-bounded message log for one conversation.
///
/// When the log is over capacity the oldest messages are evicted. A capacity
/// of zero retains nothing.
pub struct SessionStore {
    id: String,
    capacity: usize,
    messages: Mutex<VecDeque<Message>>,
    updates: broadcast::Sender<SessionUpdate>,
}

impl SessionStore {
    pub fn new(id: impl Into<String>, capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            id: id.into(),
            capacity,
            messages: Mutex::new(VecDeque::new()),
            updates,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `message`, assigning an id when it has none. Returns the id.
    pub async fn add_message(&self, mut message: Message) -> String {
        if message.id.is_empty() {
            message.id = Uuid::new_v4().to_string();
        }
        let id = message.id.clone();

        let mut messages = self.messages.lock().await;
        messages.push_back(message);
        while messages.len() > self.capacity {
            messages.pop_front();
        }
        self.publish(Mutation::Add, &messages);
        id
    }

    /// Replace the message with `id` by `updater(old)`. The id is preserved.
    /// Returns whether the message was found; a miss changes nothing.
    pub async fn update_message<F>(&self, id: &str, updater: F) -> bool
    where
        F: FnOnce(&Message) -> Message,
    {
        let mut messages = self.messages.lock().await;
        let Some(slot) = messages.iter_mut().find(|m| m.id == id) else {
            return false;
        };
        let mut updated = updater(slot);
        updated.id = slot.id.clone();
        *slot = updated;
        self.publish(Mutation::Update, &messages);
        true
    }

    /// Owned snapshot of the log, oldest first.
    pub async fn get_messages(&self) -> Vec<Message> {
        self.messages.lock().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.lock().await.is_empty()
    }

    pub async fn clear(&self) {
        let mut messages = self.messages.lock().await;
        messages.clear();
        self.publish(Mutation::Clear, &messages);
    }

    /// Stream that replays the current log, then every subsequent mutation.
    ///
    /// Snapshot and subscription are taken under the same lock, so no
    /// mutation falls between them. A subscriber that lags behind skips the
    /// missed updates; the next one it sees carries the full log anyway.
    pub async fn updates(&self) -> BoxStream<'static, SessionUpdate> {
        let messages = self.messages.lock().await;
        let initial = SessionUpdate {
            mutation: Mutation::Snapshot,
            messages: Arc::new(messages.iter().cloned().collect()),
        };
        let receiver = self.updates.subscribe();
        drop(messages);

        let rest = BroadcastStream::new(receiver).filter_map(|item| async move { item.ok() });
        futures::stream::once(async move { initial }).chain(rest).boxed()
    }

    fn publish(&self, mutation: Mutation, messages: &VecDeque<Message>) {
        if self.updates.receiver_count() == 0 {
            return;
        }
        let _ = self.updates.send(SessionUpdate {
            mutation,
            messages: Arc::new(messages.iter().cloned().collect()),
        });
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
