//! The `/meters` dialog: four numeric prompts collected one message at a time.

pub mod engine;
pub mod state;

pub use engine::{ConversationEngine, Delta, StepResult};
pub use state::{ConversationState, Prompt, Transition};
