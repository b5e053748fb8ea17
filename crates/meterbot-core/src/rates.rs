use async_trait::async_trait;

use crate::Result;

/// Currencies reported by `/currency`.
pub const REPORTED_CURRENCIES: [&str; 2] = ["USD", "EUR"];

/// One currency quote: `nominal` units cost `value` roubles.
#[derive(Clone, Debug, PartialEq)]
pub struct ExchangeRate {
    pub char_code: String,
    pub nominal: u32,
    pub value: f64,
}

/// A daily rates feed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RatesReport {
    /// Feed date as published (`DD.MM.YYYY`), if present.
    pub date: Option<String>,
    pub rates: Vec<ExchangeRate>,
}

impl RatesReport {
    /// Rates whose code matches one of `codes` (case-insensitive), in feed order.
    pub fn select(&self, codes: &[&str]) -> Vec<&ExchangeRate> {
        self.rates
            .iter()
            .filter(|r| codes.iter().any(|c| c.eq_ignore_ascii_case(&r.char_code)))
            .collect()
    }
}

/// Port for fetching the current rates.
#[async_trait]
pub trait RatesSource: Send + Sync {
    async fn daily(&self) -> Result<RatesReport>;
}
