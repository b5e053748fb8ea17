//! Redis-backed conversation store: pending dialogs survive a bot restart.
//!
//! One key per chat holding the JSON-encoded state, written with `SET .. EX`
//! so abandoned dialogs expire on their own. `get` followed by `set` is not a
//! compare-and-set; per-chat ordering comes from the engine's in-process
//! lock, so a single bot process (one long-polling consumer) owns the keys.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::info;

use meterbot_core::{
    conversation::ConversationState, domain::ChatId, errors::Error, ports::ConversationStore,
    Result,
};

const KEY_PREFIX: &str = "meterbot:conversation:";

fn redis_error(e: redis::RedisError) -> Error {
    Error::External(format!("redis error: {e}"))
}

pub fn state_key(chat_id: ChatId) -> String {
    format!("{KEY_PREFIX}{chat_id}")
}

#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    ttl: Option<Duration>,
}

impl RedisStore {
    pub fn new(conn: MultiplexedConnection, ttl: Option<Duration>) -> Self {
        Self { conn, ttl }
    }

    /// Open a multiplexed connection to `url` (`redis://host:port/db`).
    pub async fn connect(url: &str, ttl: Option<Duration>) -> Result<Self> {
        let client = redis::Client::open(url).map_err(redis_error)?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(redis_error)?;
        info!(ttl_secs = ttl.map(|t| t.as_secs()), "redis conversation store connected");
        Ok(Self::new(conn, ttl))
    }
}

/// Whole seconds for `EX`; `None` keeps the key until it is deleted.
fn expiry_secs(ttl: Option<Duration>) -> Option<u64> {
    ttl.map(|t| t.as_secs().max(1))
}

#[async_trait]
impl ConversationStore for RedisStore {
    async fn get(&self, chat_id: ChatId) -> Result<Option<ConversationState>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(state_key(chat_id))
            .await
            .map_err(redis_error)?;

        raw.map(|s| serde_json::from_str(&s).map_err(Error::from))
            .transpose()
    }

    async fn set(&self, state: &ConversationState) -> Result<()> {
        let mut conn = self.conn.clone();
        let value = serde_json::to_string(state)?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(state_key(state.chat_id)).arg(value);
        if let Some(secs) = expiry_secs(self.ttl) {
            cmd.arg("EX").arg(secs);
        }
        cmd.query_async::<_, ()>(&mut conn)
            .await
            .map_err(redis_error)
    }

    async fn delete(&self, chat_id: ChatId) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(state_key(chat_id))
            .await
            .map_err(redis_error)
    }
}
