use meterbot_core::{
    conversation::StepResult,
    domain::ChatId,
    formatting::{render_finished, render_invalid},
    Result,
};

use crate::router::AppState;

/// Feed a reply to the pending meters dialog and report the outcome.
///
/// Returns `false` when the dialog was already gone; the message is then
/// still unanswered.
pub(super) async fn handle_reply(state: &AppState, chat_id: ChatId, text: &str) -> Result<bool> {
    let messenger = &state.messenger;

    match state.engine.advance(chat_id, text).await {
        StepResult::NotInConversation => return Ok(false),
        StepResult::Invalid { error, prompt } => {
            messenger
                .send_text(chat_id, &render_invalid(&error, &prompt))
                .await
        }
        StepResult::Cancelled => messenger.send_text(chat_id, "canceled").await,
        StepResult::NextPrompt(prompt) => messenger.send_text(chat_id, &prompt.text).await,
        StepResult::Finished { record, delta } => {
            messenger
                .send_html(chat_id, &render_finished(&record, &delta))
                .await
        }
        StepResult::PersistenceError(e) => {
            messenger
                .send_text(chat_id, &format!("failed to save meters: {e}"))
                .await
        }
    }?;
    Ok(true)
}
