//! Google Sheets adapter: the meter log is one sheet, one row per submission.

pub mod auth;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use meterbot_core::{
    config::SpreadsheetTarget,
    errors::Error,
    ports::{MeterLog, Row},
    Result,
};

use crate::auth::{ServiceAccountKey, TokenProvider};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets/";

pub struct SheetsClient {
    http: reqwest::Client,
    tokens: TokenProvider,
    target: SpreadsheetTarget,
}

impl SheetsClient {
    pub fn new(target: SpreadsheetTarget, credentials_json: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("sheets client build error: {e}")))?;
        let key = ServiceAccountKey::from_json(credentials_json)?;
        let tokens = TokenProvider::new(key, http.clone())?;
        Ok(Self {
            http,
            tokens,
            target,
        })
    }

    async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(Error::External(format!(
            "sheets {what} failed: {status} {}",
            body.chars().take(200).collect::<String>()
        )))
    }
}

/// `.../spreadsheets/{id}/values/{range}` with each segment percent-encoded.
fn values_url(target: &SpreadsheetTarget, range: &str) -> Result<Url> {
    let mut url = Url::parse(SHEETS_API)
        .map_err(|e| Error::Config(format!("bad sheets endpoint: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| Error::Config("sheets endpoint cannot be a base".to_string()))?
        .pop_if_empty()
        .push(&target.spreadsheet_id)
        .push("values")
        .push(range);
    Ok(url)
}

fn append_url(target: &SpreadsheetTarget) -> Result<Url> {
    let mut url = values_url(target, &format!("{}:append", target.sheet_name))?;
    url.query_pairs_mut().append_pair("valueInputOption", "RAW");
    Ok(url)
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

fn cell_text(v: Value) -> String {
    match v {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Rows of a `values.get` response. A sheet with no data has no `values` key.
fn parse_rows(body: Value) -> Result<Vec<Row>> {
    let range: ValueRange = serde_json::from_value(body)?;
    Ok(range
        .values
        .into_iter()
        .map(|row| row.into_iter().map(cell_text).collect())
        .collect())
}

#[async_trait]
impl MeterLog for SheetsClient {
    async fn append_row(&self, row: &[String]) -> Result<()> {
        let token = self.tokens.access_token().await?;
        let resp = self
            .http
            .post(append_url(&self.target)?)
            .bearer_auth(token)
            .json(&json!({ "majorDimension": "ROWS", "values": [row] }))
            .send()
            .await
            .map_err(|e| Error::External(format!("sheets request error: {e}")))?;
        Self::check(resp, "append").await?;

        debug!(sheet = %self.target.sheet_name, "meters row appended");
        Ok(())
    }

    async fn rows(&self) -> Result<Vec<Row>> {
        let token = self.tokens.access_token().await?;
        let resp = self
            .http
            .get(values_url(&self.target, &self.target.sheet_name)?)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::External(format!("sheets request error: {e}")))?;
        let body: Value = Self::check(resp, "read")
            .await?
            .json()
            .await
            .map_err(|e| Error::External(format!("sheets json error: {e}")))?;

        parse_rows(body)
    }
}
