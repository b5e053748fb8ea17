use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use tokio::{sync::Mutex, time::Instant};

use crate::{
    conversation::ConversationState, domain::ChatId, ports::ConversationStore, Result,
};

#[derive(Debug)]
struct Entry {
    state: ConversationState,
    expires_at: Option<Instant>,
}

/// Process-local conversation store with an optional TTL.
///
/// Expired entries are dropped lazily on read; partially entered readings are
/// lost when that happens.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    ttl: Option<Duration>,
    entries: Mutex<HashMap<i64, Entry>>,
}

impl InMemoryStore {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let mut map = self.entries.lock().await;
        map.retain(|_, e| !is_expired(e, now));
        map.len()
    }
}

fn is_expired(entry: &Entry, now: Instant) -> bool {
    entry.expires_at.is_some_and(|at| now >= at)
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn get(&self, chat_id: ChatId) -> Result<Option<ConversationState>> {
        let mut map = self.entries.lock().await;
        let Some(entry) = map.get(&chat_id.0) else {
            return Ok(None);
        };
        if is_expired(entry, Instant::now()) {
            map.remove(&chat_id.0);
            return Ok(None);
        }
        Ok(Some(entry.state.clone()))
    }

    async fn set(&self, state: &ConversationState) -> Result<()> {
        let now = Instant::now();
        let expires_at = self.ttl.map(|ttl| now + ttl);
        let mut map = self.entries.lock().await;
        map.retain(|_, e| !is_expired(e, now));
        map.insert(
            state.chat_id.0,
            Entry {
                state: state.clone(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, chat_id: ChatId) -> Result<()> {
        self.entries.lock().await.remove(&chat_id.0);
        Ok(())
    }
}
