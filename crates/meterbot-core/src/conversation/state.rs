use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    domain::ChatId,
    meters::{Field, MeterRecord, Readings},
};

/// Text that aborts the dialog at any step.
pub const CANCEL_COMMAND: &str = "/cancel";

/// A suspended meters dialog for one chat.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub chat_id: ChatId,
    /// Field the next reply fills.
    pub next: Field,
    pub readings: Readings,
    /// Invalid replies seen for `next`. Informational; retries are unbounded.
    #[serde(default)]
    pub retries: u32,
}

/// Result of applying one valid reading.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    Continue(ConversationState),
    Complete(MeterRecord),
}

impl ConversationState {
    pub fn new(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            next: Field::HotWater,
            readings: Readings::default(),
            retries: 0,
        }
    }

    /// Fill the pending field and move on. Pure: storage is the engine's job.
    pub fn apply(mut self, value: u64, today: NaiveDate) -> Transition {
        self.readings.set(self.next, value);
        self.retries = 0;

        if let Some(record) = self.readings.finalize(today) {
            return Transition::Complete(record);
        }
        if let Some(field) = self.readings.first_unset() {
            self.next = field;
        }
        Transition::Continue(self)
    }

    /// Record an invalid reply; the pending field stays the same.
    pub fn reject(mut self) -> Self {
        self.retries = self.retries.saturating_add(1);
        self
    }
}

/// Outbound question for the next reading.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prompt {
    pub field: Field,
    pub text: String,
}

impl Prompt {
    /// Opening prompt; mentions how to get out.
    pub fn first() -> Self {
        let field = Field::HotWater;
        Self {
            field,
            text: format!("enter {} or use {CANCEL_COMMAND} to stop", field.label()),
        }
    }

    pub fn ask(field: Field) -> Self {
        Self {
            field,
            text: format!("enter {}", field.label()),
        }
    }
}
