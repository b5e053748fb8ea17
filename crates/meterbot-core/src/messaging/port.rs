use async_trait::async_trait;

use crate::{domain::ChatId, Result};

/// Outbound half of the chat transport.
///
/// Telegram is the only implementation; handlers depend on this trait so they
/// can be exercised with a recording fake.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()>;

    /// Send Telegram-flavoured HTML (`<b>`, `<i>`, `<code>` ...).
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<()>;
}
