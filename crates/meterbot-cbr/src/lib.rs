//! Central Bank of Russia daily rates adapter (`XML_daily.asp`).
//!
//! The feed is declared as windows-1251. Only ASCII fields (codes, nominals,
//! values, the date attribute) are read, so the body is decoded lossily.

use std::{sync::OnceLock, time::Duration};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use meterbot_core::{
    errors::Error,
    rates::{ExchangeRate, RatesReport, RatesSource, REPORTED_CURRENCIES},
    Result,
};

#[derive(Clone, Debug)]
pub struct CbrClient {
    endpoint: String,
    http: reqwest::Client,
}

impl CbrClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("cbr client build error: {e}")))?;
        Ok(Self {
            endpoint: endpoint.into(),
            http,
        })
    }
}

#[async_trait]
impl RatesSource for CbrClient {
    async fn daily(&self) -> Result<RatesReport> {
        let resp = self
            .http
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| Error::External(format!("cbr request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "cbr rates failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::External(format!("cbr body error: {e}")))?;

        let report = parse_daily(&String::from_utf8_lossy(&bytes))?;
        debug!(date = ?report.date, rates = report.rates.len(), "cbr rates fetched");
        Ok(report)
    }
}

fn valute_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<Valute\b[^>]*>(.*?)</Valute>").expect("valid regex"))
}

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"<ValCurs\b[^>]*\bDate="([^"]*)""#).expect("valid regex"))
}

fn tag_text<'a>(body: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = body.find(&open)? + open.len();
    let len = body[start..].find(&close)?;
    Some(body[start..start + len].trim())
}

/// One `<Valute>` body. A missing `CharCode` yields `Ok(None)`.
fn parse_valute(body: &str) -> Result<Option<ExchangeRate>> {
    let Some(char_code) = tag_text(body, "CharCode").filter(|c| !c.is_empty()) else {
        return Ok(None);
    };

    let nominal = match tag_text(body, "Nominal") {
        None => 1,
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| Error::External(format!("cbr {char_code}: bad nominal {raw:?}")))?,
    };

    let raw_value = tag_text(body, "Value")
        .ok_or_else(|| Error::External(format!("cbr {char_code}: missing Value")))?;
    let value = raw_value
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|_| Error::External(format!("cbr {char_code}: bad value {raw_value:?}")))?;

    Ok(Some(ExchangeRate {
        char_code: char_code.to_string(),
        nominal,
        value,
    }))
}

fn is_reported(body: &str) -> bool {
    tag_text(body, "CharCode").is_some_and(|code| {
        REPORTED_CURRENCIES
            .iter()
            .any(|c| c.eq_ignore_ascii_case(code))
    })
}

/// Decode a `ValCurs` document. Values use a decimal comma (`92,1234`).
///
/// A malformed entry for one of [`REPORTED_CURRENCIES`] fails the whole
/// report; any other malformed entry is skipped.
pub fn parse_daily(xml: &str) -> Result<RatesReport> {
    if !xml.contains("<ValCurs") {
        return Err(Error::External("cbr response is not a ValCurs document".to_string()));
    }

    let date = date_re()
        .captures(xml)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    let mut rates = Vec::new();
    for cap in valute_re().captures_iter(xml) {
        let body = cap.get(1).map(|m| m.as_str()).unwrap_or_default();

        match parse_valute(body) {
            Ok(Some(rate)) => rates.push(rate),
            Ok(None) => warn!("cbr valute without CharCode skipped"),
            Err(e) if is_reported(body) => return Err(e),
            Err(e) => warn!(error = %e, "cbr valute skipped"),
        }
    }

    Ok(RatesReport { date, rates })
}
