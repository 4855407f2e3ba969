//! Configuration management for editing sessions.

use std::env;

use tally_engine::{ExchangeRate, UnitConverter, UnitMode, UpdatePolicy, Variant};

use crate::rate::{ExchangeRateProvider, FixedRate};
use crate::session::SessionOptions;

/// Session defaults loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Unit amounts are shown in when a session opens
    pub unit_mode: UnitMode,
    /// Dollars per bitcoin used for the display unit
    pub btc_usd: f64,
    pub update_policy: UpdatePolicy,
    /// Cap on concurrent commit requests
    pub max_in_flight: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            unit_mode: UnitMode::Canonical,
            btc_usd: 60_000.0,
            update_policy: UpdatePolicy::Always,
            max_in_flight: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let unit_mode = match lookup("TALLY_UNIT_MODE").as_deref() {
            None => defaults.unit_mode,
            Some("canonical") => UnitMode::Canonical,
            Some("display") => UnitMode::Display,
            Some(other) => return Err(ConfigError::InvalidUnitMode(other.to_string())),
        };

        let btc_usd = match lookup("TALLY_BTC_USD") {
            None => defaults.btc_usd,
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|price| price.is_finite() && *price > 0.0)
                .ok_or(ConfigError::InvalidBtcPrice(raw))?,
        };

        let update_policy = match lookup("TALLY_UPDATE_POLICY").as_deref() {
            None => defaults.update_policy,
            Some("always") => UpdatePolicy::Always,
            Some("changed") => UpdatePolicy::ChangedOnly,
            Some(other) => return Err(ConfigError::InvalidUpdatePolicy(other.to_string())),
        };

        let max_in_flight = match lookup("TALLY_MAX_IN_FLIGHT") {
            None => defaults.max_in_flight,
            Some(raw) => Some(
                raw.parse::<usize>()
                    .ok()
                    .filter(|limit| *limit > 0)
                    .ok_or(ConfigError::InvalidMaxInFlight(raw))?,
            ),
        };

        Ok(Self {
            unit_mode,
            btc_usd,
            update_policy,
            max_in_flight,
        })
    }

    /// Provider quoting the configured bitcoin price.
    pub fn rate_provider(&self) -> Result<FixedRate, ConfigError> {
        Ok(FixedRate::from_btc_price(self.btc_usd)?)
    }

    /// Options for a new session over `variant`. Milestones convert with the
    /// provider's current rate; rewards are already in cents and use the
    /// identity rate.
    pub fn session_options(
        &self,
        variant: Variant,
        rates: &dyn ExchangeRateProvider,
    ) -> SessionOptions {
        let rate = match variant {
            Variant::Milestone => rates.current_rate().rate,
            Variant::Reward => ExchangeRate::identity(),
        };
        SessionOptions {
            update_policy: self.update_policy,
            converter: UnitConverter::new(self.unit_mode, rate),
            max_in_flight: self.max_in_flight,
            limits: None,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TALLY_UNIT_MODE value: {0}")]
    InvalidUnitMode(String),

    #[error("Invalid TALLY_BTC_USD value: {0}")]
    InvalidBtcPrice(String),

    #[error("Invalid TALLY_UPDATE_POLICY value: {0}")]
    InvalidUpdatePolicy(String),

    #[error("Invalid TALLY_MAX_IN_FLIGHT value: {0}")]
    InvalidMaxInFlight(String),

    #[error(transparent)]
    Rate(#[from] tally_engine::Error),
}
