use tracing::{info, warn};

use meterbot_core::{
    commands::Command,
    formatting::{escape_html, render_last_meters, render_rates, render_whoami},
    rates::REPORTED_CURRENCIES,
    Result,
};

use super::Incoming;
use crate::router::AppState;

pub(super) async fn handle_command(
    state: &AppState,
    command: Command,
    incoming: &Incoming,
) -> Result<()> {
    let chat_id = incoming.chat_id;
    let messenger = &state.messenger;

    match command {
        Command::Status => {
            let text = match state.cfg.source_version.as_deref() {
                Some(version) => format!("version: {version}"),
                None => "ok".to_string(),
            };
            messenger.send_text(chat_id, &text).await
        }

        Command::Help => messenger.send_text(chat_id, &state.router.help_text()).await,

        Command::Currency => match state.rates.daily().await {
            Ok(report) => {
                let picked = report.select(&REPORTED_CURRENCIES);
                messenger
                    .send_html(chat_id, &render_rates(report.date.as_deref(), &picked))
                    .await
            }
            Err(e) => {
                warn!(chat_id = chat_id.0, error = %e, "exchange rates unavailable");
                messenger
                    .send_text(chat_id, &format!("failed to fetch exchange rates: {e}"))
                    .await
            }
        },

        Command::Meters => match state.engine.start(chat_id).await {
            Ok(prompt) => messenger.send_text(chat_id, &prompt.text).await,
            Err(e) => {
                warn!(chat_id = chat_id.0, error = %e, "could not start meters dialog");
                messenger
                    .send_text(chat_id, &format!("failed to start meters: {e}"))
                    .await
            }
        },

        Command::LastMeters => match state.engine.last_meters().await {
            Ok(Some((last, previous))) => {
                messenger
                    .send_html(chat_id, &render_last_meters(&last, previous.as_ref()))
                    .await
            }
            Ok(None) => messenger.send_text(chat_id, "no meters recorded yet").await,
            Err(e) => {
                warn!(chat_id = chat_id.0, error = %e, "could not read last meters");
                messenger
                    .send_html(
                        chat_id,
                        &format!("failed to read meters: {}", escape_html(&e.to_string())),
                    )
                    .await
            }
        },

        // Only reached when no dialog is pending; a pending one is cancelled by
        // the engine itself.
        Command::Cancel => {
            let text = if state.engine.cancel(chat_id).await? {
                "canceled"
            } else {
                "nothing to cancel"
            };
            messenger.send_text(chat_id, text).await
        }

        Command::WhoAmI => {
            info!(chat_id = chat_id.0, "whoami");
            messenger
                .send_html(
                    chat_id,
                    &render_whoami(chat_id.0, &incoming.first_name, incoming.last_name.as_deref()),
                )
                .await
        }
    }
}
