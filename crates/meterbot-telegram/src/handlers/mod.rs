//! Telegram update handlers.
//!
//! `handle_message` turns a teloxide `Message` into an [`Incoming`] and hands
//! it to [`dispatch`], which routes it through the core command table.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};
use tracing::{debug, error, warn};

use meterbot_core::{
    commands::Route,
    domain::{ChatId, UserId},
    security::is_authorized,
    Result,
};

use crate::router::AppState;

mod commands;
mod conversation;

/// The parts of an inbound text message the handlers need.
#[derive(Clone, Debug)]
pub struct Incoming {
    pub chat_id: ChatId,
    pub user_id: Option<UserId>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub text: String,
}

impl Incoming {
    fn from_message(msg: &Message) -> Option<Self> {
        let text = msg.text()?.to_string();
        let user = msg.from();
        let first_name = msg
            .chat
            .first_name()
            .map(str::to_string)
            .or_else(|| user.map(|u| u.first_name.clone()))
            .unwrap_or_default();
        let last_name = msg
            .chat
            .last_name()
            .map(str::to_string)
            .or_else(|| user.and_then(|u| u.last_name.clone()));

        Some(Self {
            chat_id: ChatId(msg.chat.id.0),
            user_id: user.map(|u| UserId(u.id.0 as i64)),
            first_name,
            last_name,
            text,
        })
    }
}

pub async fn handle_message(_bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(incoming) = Incoming::from_message(&msg) else {
        return Ok(());
    };

    if let Err(e) = dispatch(&state, &incoming).await {
        error!(chat_id = incoming.chat_id.0, error = %e, "message handling failed");
    }
    Ok(())
}

pub async fn dispatch(state: &AppState, incoming: &Incoming) -> Result<()> {
    let chat_id = incoming.chat_id;
    let authorized = is_authorized(incoming.user_id, &state.cfg.allowed_users);

    let in_conversation = authorized
        && match state.engine.pending(chat_id).await {
            Ok(pending) => pending.is_some(),
            Err(e) => {
                warn!(chat_id = chat_id.0, error = %e, "conversation lookup failed");
                false
            }
        };

    let mut route = state.router.route(&incoming.text, authorized, in_conversation);
    if route == Route::Conversation {
        if conversation::handle_reply(state, chat_id, &incoming.text).await? {
            return Ok(());
        }
        // Finished or expired between the lookup and the engine's chat lock.
        debug!(chat_id = chat_id.0, "dialog gone, handling as ordinary message");
        route = state.router.route(&incoming.text, authorized, false);
    }

    match route {
        Route::Command(command) => commands::handle_command(state, command, incoming).await,
        Route::Unsupported(name) => {
            debug!(chat_id = chat_id.0, authorized, command = %name, "unsupported command");
            state
                .messenger
                .send_text(chat_id, &format!("unsupported command: {name:?}"))
                .await
        }
        Route::Conversation | Route::Ignore => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use meterbot_core::{
        commands::CommandRouter,
        config::Config,
        conversation::{ConversationEngine, ConversationState},
        errors::Error,
        messaging::port::MessagingPort,
        ports::{Clock, ConversationStore, MeterLog, Row},
        rates::{ExchangeRate, RatesReport, RatesSource},
        store::InMemoryStore,
    };
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    };

    const OWNER: i64 = 42;
    const STRANGER: i64 = 7;

    #[derive(Default)]
    struct FakeMessenger {
        sent: Mutex<Vec<(i64, String)>>,
    }

    impl FakeMessenger {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.sent.lock().unwrap())
                .into_iter()
                .map(|(_, text)| text)
                .collect()
        }
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
            self.sent.lock().unwrap().push((chat_id.0, text.to_string()));
            Ok(())
        }

        async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<()> {
            self.sent.lock().unwrap().push((chat_id.0, html.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeLog {
        rows: Mutex<Vec<Row>>,
        fail_append: AtomicBool,
    }

    #[async_trait]
    impl MeterLog for FakeLog {
        async fn append_row(&self, row: &[String]) -> Result<()> {
            if self.fail_append.load(Ordering::SeqCst) {
                return Err(Error::External("sheets unavailable".to_string()));
            }
            self.rows.lock().unwrap().push(row.to_vec());
            Ok(())
        }

        async fn rows(&self) -> Result<Vec<Row>> {
            Ok(self.rows.lock().unwrap().clone())
        }
    }

    struct FakeRates(Option<RatesReport>);

    #[async_trait]
    impl RatesSource for FakeRates {
        async fn daily(&self) -> Result<RatesReport> {
            self.0
                .clone()
                .ok_or_else(|| Error::External("cbr unavailable".to_string()))
        }
    }

    struct FixedClock;

    impl Clock for FixedClock {
        fn today(&self) -> NaiveDate {
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        }
    }

    /// Reports a pending dialog on the first lookup only, as if it finished
    /// right after `dispatch` checked for it.
    #[derive(Default)]
    struct VanishingStore {
        looked_up: AtomicBool,
    }

    #[async_trait]
    impl ConversationStore for VanishingStore {
        async fn get(&self, chat_id: ChatId) -> Result<Option<ConversationState>> {
            if self.looked_up.swap(true, Ordering::SeqCst) {
                return Ok(None);
            }
            Ok(Some(ConversationState::new(chat_id)))
        }

        async fn set(&self, _state: &ConversationState) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _chat_id: ChatId) -> Result<()> {
            Ok(())
        }
    }

    struct Harness {
        state: AppState,
        messenger: Arc<FakeMessenger>,
        log: Arc<FakeLog>,
    }

    fn harness(source_version: Option<&str>, rates: Option<RatesReport>) -> Harness {
        harness_with_store(source_version, rates, Arc::new(InMemoryStore::new(None)))
    }

    fn harness_with_store(
        source_version: Option<&str>,
        rates: Option<RatesReport>,
        store: Arc<dyn ConversationStore>,
    ) -> Harness {
        let cfg = Config::from_lookup(|key| match key {
            "TELEGRAM_BOT_TOKEN" => Some("123:abc".to_string()),
            "ALLOWED_USERS" => Some(OWNER.to_string()),
            "GOOGLE_SPREADSHEET" => Some("sheet:Meters".to_string()),
            "GOOGLE_CREDENTIALS" => Some("{}".to_string()),
            "SOURCE_VERSION" => source_version.map(str::to_string),
            _ => None,
        })
        .unwrap();

        let messenger = Arc::new(FakeMessenger::default());
        let log = Arc::new(FakeLog::default());
        let engine = ConversationEngine::new(store, log.clone())
            .with_clock(Arc::new(FixedClock));

        Harness {
            state: AppState {
                cfg: Arc::new(cfg),
                engine: Arc::new(engine),
                router: Arc::new(CommandRouter::default()),
                messenger: messenger.clone(),
                rates: Arc::new(FakeRates(rates)),
            },
            messenger,
            log,
        }
    }

    impl Harness {
        async fn send(&self, from: i64, text: &str) -> Vec<String> {
            let incoming = Incoming {
                chat_id: ChatId(from),
                user_id: Some(UserId(from)),
                first_name: "Ann".to_string(),
                last_name: Some("Lee".to_string()),
                text: text.to_string(),
            };
            dispatch(&self.state, &incoming).await.unwrap();
            self.messenger.take()
        }
    }

    #[tokio::test]
    async fn full_meters_dialog_appends_a_row() {
        let h = harness(None, None);
        h.log
            .rows
            .lock()
            .unwrap()
            .push(["01.01.2024", "8", "15", "3", "4"].map(String::from).to_vec());

        assert_eq!(
            h.send(OWNER, "/meters").await,
            ["enter hot water or use /cancel to stop"]
        );
        assert_eq!(h.send(OWNER, "10").await, ["enter cold water"]);
        assert_eq!(
            h.send(OWNER, "abc").await,
            ["value should be a number, got \"abc\"\nenter cold water"]
        );
        assert_eq!(h.send(OWNER, "20").await, ["enter electricity (t1)"]);
        assert_eq!(h.send(OWNER, "5").await, ["enter electricity (t2)"]);

        let done = h.send(OWNER, "7").await;
        assert_eq!(done.len(), 1);
        assert!(done[0].starts_with("sheet updated"));
        assert!(done[0].contains("<b>cold water:</b> 20 (+5)"));

        let rows = h.log.rows.lock().unwrap().clone();
        assert_eq!(rows.last().unwrap(), &["01.02.2024", "10", "20", "5", "7"]);

        // Dialog is over; plain numbers are ignored again.
        assert!(h.send(OWNER, "11").await.is_empty());
    }

    #[tokio::test]
    async fn cancel_inside_and_outside_a_dialog() {
        let h = harness(None, None);
        assert_eq!(h.send(OWNER, "/cancel").await, ["nothing to cancel"]);

        h.send(OWNER, "/meters").await;
        h.send(OWNER, "10").await;
        assert_eq!(h.send(OWNER, "/cancel@meter_bot").await, ["canceled"]);
        assert!(h.state.engine.pending(ChatId(OWNER)).await.unwrap().is_none());
        assert!(h.log.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_failure_is_reported_and_ends_the_dialog() {
        let h = harness(None, None);
        h.log.fail_append.store(true, Ordering::SeqCst);

        h.send(OWNER, "/meters").await;
        for v in ["1", "2", "3"] {
            h.send(OWNER, v).await;
        }
        let reply = h.send(OWNER, "4").await;
        assert_eq!(reply, ["failed to save meters: external error: sheets unavailable"]);
        assert!(h.state.engine.pending(ChatId(OWNER)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn command_is_answered_when_dialog_ends_before_the_reply() {
        let h = harness_with_store(Some("v1"), None, Arc::new(VanishingStore::default()));
        assert_eq!(h.send(OWNER, "/status").await, ["version: v1"]);
    }

    #[tokio::test]
    async fn plain_text_is_dropped_when_dialog_ends_before_the_reply() {
        let h = harness_with_store(None, None, Arc::new(VanishingStore::default()));
        assert!(h.send(OWNER, "12").await.is_empty());
    }

    #[tokio::test]
    async fn status_reports_version_when_known() {
        assert_eq!(harness(None, None).send(OWNER, "/status").await, ["ok"]);
        assert_eq!(
            harness(Some("abc123"), None).send(OWNER, "/status").await,
            ["version: abc123"]
        );
    }

    #[tokio::test]
    async fn strangers_only_get_whoami() {
        let h = harness(None, None);
        assert_eq!(
            h.send(STRANGER, "/whoami").await,
            ["<b>id:</b> 7\n<b>name:</b> Ann Lee"]
        );
        assert_eq!(
            h.send(STRANGER, "/meters").await,
            ["unsupported command: \"meters\""]
        );
        assert!(h.send(STRANGER, "hello").await.is_empty());
    }

    #[tokio::test]
    async fn unknown_commands_are_unsupported() {
        let h = harness(None, None);
        assert_eq!(h.send(OWNER, "/frobnicate").await, ["unsupported command: \"frobnicate\""]);
    }

    #[tokio::test]
    async fn last_meters_reports_history() {
        let h = harness(None, None);
        assert_eq!(h.send(OWNER, "/lastmeters").await, ["no meters recorded yet"]);

        h.log.rows.lock().unwrap().extend([
            ["01.01.2024", "8", "15", "3", "4"].map(String::from).to_vec(),
            ["01.02.2024", "10", "20", "5", "7"].map(String::from).to_vec(),
        ]);
        let reply = h.send(OWNER, "/lastmeters").await;
        assert!(reply[0].starts_with("here is the last meters\n\n<b>date:</b> 01.02.2024"));
        assert!(reply[0].contains("<b>hot water:</b> 10 (+2)"));
    }

    #[tokio::test]
    async fn currency_lists_usd_and_eur() {
        let report = RatesReport {
            date: Some("02.02.2024".to_string()),
            rates: vec![
                ExchangeRate {
                    char_code: "AUD".to_string(),
                    nominal: 1,
                    value: 59.09,
                },
                ExchangeRate {
                    char_code: "USD".to_string(),
                    nominal: 1,
                    value: 89.2887,
                },
                ExchangeRate {
                    char_code: "EUR".to_string(),
                    nominal: 1,
                    value: 96.8299,
                },
            ],
        };
        let h = harness(None, Some(report));
        assert_eq!(
            h.send(OWNER, "/currency").await,
            ["<i>02.02.2024</i>\n<b>USD:</b> 89.29\n<b>EUR:</b> 96.83"]
        );

        let down = harness(None, None);
        assert_eq!(
            down.send(OWNER, "/currency").await,
            ["failed to fetch exchange rates: external error: cbr unavailable"]
        );
    }

    #[tokio::test]
    async fn help_lists_the_command_table() {
        let h = harness(None, None);
        let reply = h.send(OWNER, "/help").await;
        assert_eq!(reply[0], h.state.router.help_text());
    }
}
