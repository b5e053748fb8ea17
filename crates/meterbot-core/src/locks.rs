use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::ChatId;

/// One async mutex per chat, created on demand.
///
/// Holding the guard serializes work for that chat; other chats are unaffected.
/// Entries nobody holds or waits on are dropped on the next `lock_chat`.
#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: ChatId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            // Every clone is taken under the map lock, so a count of one means idle.
            map.retain(|_, l| Arc::strong_count(l) > 1);
            map.entry(chat_id.0)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
