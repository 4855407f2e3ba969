//! Exchange rate sources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_engine::ExchangeRate;

/// A rate together with the instant it was quoted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateQuote {
    pub rate: ExchangeRate,
    pub as_of: DateTime<Utc>,
}

/// Supplies the display-unit rate.
///
/// A session reads the rate once when it opens and converts with that
/// quote for its whole lifetime.
pub trait ExchangeRateProvider: Send + Sync {
    fn current_rate(&self) -> RateQuote;
}

/// A rate fixed at construction time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedRate {
    quote: RateQuote,
}

impl FixedRate {
    pub fn new(rate: ExchangeRate) -> Self {
        Self {
            quote: RateQuote {
                rate,
                as_of: Utc::now(),
            },
        }
    }

    /// Quote from a BTC price in dollars.
    pub fn from_btc_price(usd_per_btc: f64) -> tally_engine::error::Result<Self> {
        ExchangeRate::from_btc_price(usd_per_btc).map(Self::new)
    }
}

impl ExchangeRateProvider for FixedRate {
    fn current_rate(&self) -> RateQuote {
        self.quote
    }
}
