use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::{errors::Error, Result};

pub const DEFAULT_CURRENCY_ENDPOINT: &str = "http://www.cbr.ru/scripts/XML_daily.asp";

/// Spreadsheet and sheet that hold the meter log (`<spreadsheet_id>:<sheet_name>`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpreadsheetTarget {
    pub spreadsheet_id: String,
    pub sheet_name: String,
}

impl SpreadsheetTarget {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.trim().split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(id), Some(sheet), None) if !id.is_empty() && !sheet.is_empty() => Ok(Self {
                spreadsheet_id: id.to_string(),
                sheet_name: sheet.to_string(),
            }),
            _ => Err(Error::Config(format!(
                "GOOGLE_SPREADSHEET must look like <spreadsheet_id>:<sheet_name>, got {raw:?}"
            ))),
        }
    }
}

/// Where the Google service-account key comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum GoogleCredentials {
    /// Raw JSON key (`GOOGLE_CREDENTIALS`).
    Json(String),
    /// Path to the JSON key (`GOOGLE_APPLICATION_CREDENTIALS`).
    File(PathBuf),
}

impl std::fmt::Debug for GoogleCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(_) => f.write_str("Json(<redacted>)"),
            Self::File(p) => f.debug_tuple("File").field(p).finish(),
        }
    }
}

impl GoogleCredentials {
    pub fn read(&self) -> Result<String> {
        match self {
            Self::Json(s) => Ok(s.clone()),
            Self::File(p) => Ok(fs::read_to_string(p)?),
        }
    }
}

/// Typed configuration, read from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub allowed_users: Vec<i64>,

    // Meter log
    pub spreadsheet: SpreadsheetTarget,
    pub google_credentials: GoogleCredentials,

    // Conversation state
    pub redis_url: Option<String>,
    pub conversation_ttl: Duration,

    // Misc
    pub source_version: Option<String>,
    pub currency_endpoint: String,
    pub http_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"))?;
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the process env in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        // Required
        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN")
            .or_else(|| get("BOT_TOKEN"))
            .ok_or_else(|| {
                Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
            })?;

        let allowed_users = parse_allowed_users(&get("ALLOWED_USERS").unwrap_or_default())?;
        if allowed_users.is_empty() {
            return Err(Error::Config(
                "ALLOWED_USERS environment variable is required".to_string(),
            ));
        }

        let spreadsheet = SpreadsheetTarget::parse(&get("GOOGLE_SPREADSHEET").ok_or_else(|| {
            Error::Config("GOOGLE_SPREADSHEET environment variable is required".to_string())
        })?)?;

        let google_credentials = match (
            get("GOOGLE_CREDENTIALS"),
            get("GOOGLE_APPLICATION_CREDENTIALS"),
        ) {
            (Some(json), _) => GoogleCredentials::Json(json),
            (None, Some(path)) => GoogleCredentials::File(PathBuf::from(path)),
            (None, None) => {
                return Err(Error::Config(
                    "GOOGLE_CREDENTIALS or GOOGLE_APPLICATION_CREDENTIALS is required".to_string(),
                ))
            }
        };

        // Optional
        let redis_url = get("REDIS_URL");
        let conversation_ttl =
            Duration::from_secs(parse_u64(&get, "CONVERSATION_TTL_SECS")?.unwrap_or(3600));
        let source_version = get("SOURCE_VERSION");
        let currency_endpoint =
            get("CURRENCY_ENDPOINT").unwrap_or_else(|| DEFAULT_CURRENCY_ENDPOINT.to_string());
        let http_timeout = Duration::from_secs(parse_u64(&get, "HTTP_TIMEOUT_SECS")?.unwrap_or(10));

        Ok(Self {
            telegram_bot_token,
            allowed_users,
            spreadsheet,
            google_credentials,
            redis_url,
            conversation_ttl,
            source_version,
            currency_endpoint,
            http_timeout,
        })
    }
}

#[derive(Deserialize)]
struct AllowedUser {
    id: i64,
}

/// `[{"id": 1}, {"id": 2}]` or `1,2`.
pub fn parse_allowed_users(raw: &str) -> Result<Vec<i64>> {
    let raw = raw.trim();
    if raw.starts_with('[') {
        let users: Vec<AllowedUser> = serde_json::from_str(raw)
            .map_err(|e| Error::Config(format!("ALLOWED_USERS is not valid JSON: {e}")))?;
        return Ok(users.into_iter().map(|u| u.id).collect());
    }

    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| Error::Config(format!("ALLOWED_USERS has a bad id: {s:?}")))
        })
        .collect()
}

fn parse_u64(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    get(key)
        .map(|s| {
            s.trim()
                .parse::<u64>()
                .map_err(|_| Error::Config(format!("{key} must be a whole number, got {s:?}")))
        })
        .transpose()
}

/// Load `KEY=value` pairs from `path` into the process env. Variables that are
/// already set win; a missing file is not an error.
fn load_dotenv_if_present(path: &Path) -> Result<()> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(Error::Config(format!("{}: {e}", path.display()))),
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("TELEGRAM_BOT_TOKEN", "123:abc"),
        ("ALLOWED_USERS", r#"[{"id": 42}]"#),
        ("GOOGLE_SPREADSHEET", "sheet-id:Meters"),
        ("GOOGLE_CREDENTIALS", "{}"),
    ];

    #[test]
    fn loads_with_defaults() {
        let cfg = Config::from_lookup(lookup(REQUIRED)).unwrap();
        assert_eq!(cfg.telegram_bot_token, "123:abc");
        assert_eq!(cfg.allowed_users, vec![42]);
        assert_eq!(cfg.spreadsheet.spreadsheet_id, "sheet-id");
        assert_eq!(cfg.spreadsheet.sheet_name, "Meters");
        assert_eq!(cfg.google_credentials, GoogleCredentials::Json("{}".to_string()));
        assert_eq!(cfg.redis_url, None);
        assert_eq!(cfg.conversation_ttl, Duration::from_secs(3600));
        assert_eq!(cfg.currency_endpoint, DEFAULT_CURRENCY_ENDPOINT);
        assert_eq!(cfg.http_timeout, Duration::from_secs(10));
    }

    #[test]
    fn legacy_token_name_and_overrides() {
        let mut pairs: Vec<(&str, &str)> = REQUIRED
            .iter()
            .copied()
            .filter(|(k, _)| *k != "TELEGRAM_BOT_TOKEN" && *k != "GOOGLE_CREDENTIALS")
            .collect();
        pairs.extend([
            ("BOT_TOKEN", "legacy"),
            ("GOOGLE_APPLICATION_CREDENTIALS", "/etc/key.json"),
            ("REDIS_URL", "redis://localhost:6379"),
            ("CONVERSATION_TTL_SECS", "600"),
            ("SOURCE_VERSION", "abc123"),
        ]);

        let cfg = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(cfg.telegram_bot_token, "legacy");
        assert_eq!(
            cfg.google_credentials,
            GoogleCredentials::File(PathBuf::from("/etc/key.json"))
        );
        assert_eq!(cfg.redis_url.as_deref(), Some("redis://localhost:6379"));
        assert_eq!(cfg.conversation_ttl, Duration::from_secs(600));
        assert_eq!(cfg.source_version.as_deref(), Some("abc123"));
    }

    #[test]
    fn missing_required_values_are_config_errors() {
        for skip in ["TELEGRAM_BOT_TOKEN", "ALLOWED_USERS", "GOOGLE_SPREADSHEET", "GOOGLE_CREDENTIALS"] {
            let pairs: Vec<_> = REQUIRED.iter().copied().filter(|(k, _)| *k != skip).collect();
            assert!(
                matches!(Config::from_lookup(lookup(&pairs)), Err(Error::Config(_))),
                "{skip} should be required"
            );
        }
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("CONVERSATION_TTL_SECS", "soon"));
        assert!(matches!(Config::from_lookup(lookup(&pairs)), Err(Error::Config(_))));
    }

    #[test]
    fn allowed_users_json_or_csv() {
        assert_eq!(
            parse_allowed_users(r#"[{"id": 1}, {"id": -100200}]"#).unwrap(),
            vec![1, -100200]
        );
        assert_eq!(parse_allowed_users(" 1, 2 ,,3").unwrap(), vec![1, 2, 3]);
        assert!(parse_allowed_users("").unwrap().is_empty());
        assert!(parse_allowed_users("1,x").is_err());
        assert!(parse_allowed_users("[{\"name\": 1}]").is_err());
    }

    #[test]
    fn dotenv_fills_gaps_without_overriding() {
        let dir = std::env::temp_dir().join(format!("meterbot-dotenv-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(".env");
        fs::write(
            &path,
            "# local overrides\nMETERBOT_DOTENV_NEW=\"from file\"\nMETERBOT_DOTENV_SET=from file\n",
        )
        .unwrap();
        env::set_var("METERBOT_DOTENV_SET", "from env");

        load_dotenv_if_present(&path).unwrap();
        assert_eq!(env::var("METERBOT_DOTENV_NEW").unwrap(), "from file");
        assert_eq!(env::var("METERBOT_DOTENV_SET").unwrap(), "from env");

        assert!(load_dotenv_if_present(&dir.join("missing.env")).is_ok());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn spreadsheet_target_shape() {
        assert!(SpreadsheetTarget::parse("id:Sheet1").is_ok());
        assert!(SpreadsheetTarget::parse("id").is_err());
        assert!(SpreadsheetTarget::parse("id:").is_err());
        assert!(SpreadsheetTarget::parse("a:b:c").is_err());
    }
}
