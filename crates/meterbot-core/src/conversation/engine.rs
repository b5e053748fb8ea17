use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    commands::parse_command,
    conversation::state::{ConversationState, Prompt, Transition, CANCEL_COMMAND},
    domain::ChatId,
    errors::Error,
    locks::ChatLocks,
    meters::{MeterDiff, MeterRecord, RowError},
    ports::{Clock, ConversationStore, MeterLog, SystemClock},
    validate::{validate, ValidationError},
    Result,
};

/// How a finished record compares with the one recorded before it.
#[derive(Debug, PartialEq, Eq)]
pub enum Delta {
    Changed(MeterDiff),
    /// The log was empty; there is nothing to compare against.
    NoHistory,
    /// The previous row exists but could not be parsed.
    Unavailable(RowError),
}

/// Outcome of feeding one message to the engine.
#[derive(Debug)]
pub enum StepResult {
    /// The chat has no pending dialog; treat the message as ordinary input.
    NotInConversation,
    /// The reply was rejected; `prompt` asks for the same field again.
    Invalid {
        error: ValidationError,
        prompt: Prompt,
    },
    Cancelled,
    NextPrompt(Prompt),
    Finished {
        record: MeterRecord,
        delta: Delta,
    },
    /// Storage or the meter log failed. The dialog is over either way.
    PersistenceError(Error),
}

/// Drives the meters dialog and hands finished records to the meter log.
///
/// Every state change for a chat runs under that chat's lock, so concurrent
/// messages from one chat are applied one after another.
pub struct ConversationEngine {
    store: Arc<dyn ConversationStore>,
    log: Arc<dyn MeterLog>,
    clock: Arc<dyn Clock>,
    locks: ChatLocks,
}

impl ConversationEngine {
    pub fn new(store: Arc<dyn ConversationStore>, log: Arc<dyn MeterLog>) -> Self {
        Self {
            store,
            log,
            clock: Arc::new(SystemClock),
            locks: ChatLocks::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Begin a fresh dialog, discarding any pending one for this chat.
    pub async fn start(&self, chat_id: ChatId) -> Result<Prompt> {
        let _guard = self.locks.lock_chat(chat_id).await;
        self.store.set(&ConversationState::new(chat_id)).await?;
        info!(chat_id = chat_id.0, "meters conversation started");
        Ok(Prompt::first())
    }

    pub async fn pending(&self, chat_id: ChatId) -> Result<Option<ConversationState>> {
        self.store.get(chat_id).await
    }

    /// Drop the pending dialog, if any. Returns whether one existed.
    pub async fn cancel(&self, chat_id: ChatId) -> Result<bool> {
        let _guard = self.locks.lock_chat(chat_id).await;
        let existed = self.store.get(chat_id).await?.is_some();
        if existed {
            self.store.delete(chat_id).await?;
            info!(chat_id = chat_id.0, "meters conversation cancelled");
        }
        Ok(existed)
    }

    pub async fn advance(&self, chat_id: ChatId, text: &str) -> StepResult {
        let _guard = self.locks.lock_chat(chat_id).await;
        match self.advance_locked(chat_id, text).await {
            Ok(step) => step,
            Err(e) => {
                warn!(chat_id = chat_id.0, error = %e, "meters conversation failed");
                StepResult::PersistenceError(e)
            }
        }
    }

    async fn advance_locked(&self, chat_id: ChatId, text: &str) -> Result<StepResult> {
        let Some(state) = self.store.get(chat_id).await? else {
            return Ok(StepResult::NotInConversation);
        };

        if is_cancel(text) {
            self.store.delete(chat_id).await?;
            info!(chat_id = chat_id.0, field = ?state.next, "meters conversation cancelled");
            return Ok(StepResult::Cancelled);
        }

        let value = match validate(text) {
            Ok(v) => v,
            Err(error) => {
                let state = state.reject();
                debug!(chat_id = chat_id.0, field = ?state.next, retries = state.retries, %error, "invalid reading");
                self.store.set(&state).await?;
                return Ok(StepResult::Invalid {
                    error,
                    prompt: Prompt::ask(state.next),
                });
            }
        };

        match state.apply(value, self.clock.today()) {
            Transition::Continue(next) => {
                self.store.set(&next).await?;
                Ok(StepResult::NextPrompt(Prompt::ask(next.next)))
            }
            Transition::Complete(record) => {
                // The dialog ends here whether or not the log accepts the row.
                self.store.delete(chat_id).await?;
                let (record, delta) = self.persist(record).await?;
                info!(chat_id = chat_id.0, date = %record.formatted_date(), "meters recorded");
                Ok(StepResult::Finished { record, delta })
            }
        }
    }

    /// Newest stored record and the one before it, for `/lastmeters`.
    ///
    /// A row that does not parse is reported as [`Error::CorruptRow`]; only the
    /// newest row is required, a corrupt older row just drops the comparison.
    pub async fn last_meters(&self) -> Result<Option<(MeterRecord, Option<MeterRecord>)>> {
        let mut rows = self.log.rows().await?;
        let Some(last) = rows.pop() else {
            return Ok(None);
        };
        let last = MeterRecord::from_row(&last)?;

        let previous = match rows.pop() {
            None => None,
            Some(row) => match MeterRecord::from_row(&row) {
                Ok(prev) => Some(prev),
                Err(e) => {
                    warn!(error = %e, ?row, "previous meters row is corrupt");
                    None
                }
            },
        };
        Ok(Some((last, previous)))
    }

    async fn persist(&self, record: MeterRecord) -> Result<(MeterRecord, Delta)> {
        // Read before appending so the comparison is against the prior row.
        let previous = self.log.last_row().await?;
        self.log.append_row(&record.to_row()).await?;

        let delta = match previous {
            None => Delta::NoHistory,
            Some(row) => match MeterRecord::from_row(&row) {
                Ok(prev) => Delta::Changed(record.diff(&prev)),
                Err(e) => {
                    warn!(error = %e, ?row, "previous meters row is corrupt");
                    Delta::Unavailable(e)
                }
            },
        };
        Ok((record, delta))
    }
}

fn is_cancel(text: &str) -> bool {
    let sentinel = CANCEL_COMMAND.trim_start_matches('/');
    parse_command(text).is_some_and(|(name, _)| name == sentinel)
}
