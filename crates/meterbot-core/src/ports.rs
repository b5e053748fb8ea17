use async_trait::async_trait;
use chrono::{Local, NaiveDate};

use crate::{conversation::ConversationState, domain::ChatId, Result};

/// A stored spreadsheet row: plain text cells.
pub type Row = Vec<String>;

/// Hexagonal port for the append-only meter log (Google Sheets in production).
#[async_trait]
pub trait MeterLog: Send + Sync {
    async fn append_row(&self, row: &[String]) -> Result<()>;

    /// All rows, oldest first.
    async fn rows(&self) -> Result<Vec<Row>>;

    /// The most recent row, or `None` if the log is empty.
    async fn last_row(&self) -> Result<Option<Row>> {
        Ok(self.rows().await?.pop())
    }
}

/// Keyed storage for suspended conversations.
///
/// Implementations must make each call atomic per key. Expired entries (for
/// stores with a TTL) must read as `None`.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, chat_id: ChatId) -> Result<Option<ConversationState>>;
    async fn set(&self, state: &ConversationState) -> Result<()>;
    async fn delete(&self, chat_id: ChatId) -> Result<()>;
}

/// Source of "today" for stamping records.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}
