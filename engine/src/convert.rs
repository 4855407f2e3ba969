//! Conversion between canonical amounts and display amounts.
//!
//! Amounts are always stored in a canonical integer unit (satoshis for
//! milestones, USD cents for rewards). Editors may show them in a decimal
//! display unit (dollars) instead. The display value is derived on read and
//! converted back on write; it is never the system of record.
//!
//! # Rounding
//!
//! - canonical → display: scale to display minor units (cents) at full
//!   precision, round half-up to a whole minor unit, divide by 100.
//! - display → canonical: scale to minor units, divide by the rate, round
//!   half-up to a whole canonical unit.
//!
//! When one canonical unit is worth at most one display minor unit (the
//! satoshi case), converting a displayed value back and displaying it again
//! yields the same display value.

use crate::{error::Result, Amount, Error};
use serde::{Deserialize, Serialize};

/// Display minor units per display major unit (cents per dollar).
pub const MINOR_PER_MAJOR: f64 = 100.0;

/// Satoshis per bitcoin.
pub const SATOSHIS_PER_BTC: f64 = 100_000_000.0;

/// Largest amount `to_canonical` accepts; every integer up to it is exact
/// as an `f64`.
pub const MAX_CONVERTIBLE: Amount = 1 << 53;

/// How many display minor units one canonical unit is worth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRate {
    minor_per_canonical: f64,
}

impl ExchangeRate {
    /// Create a rate. Must be finite and strictly positive.
    pub fn new(minor_per_canonical: f64) -> Result<Self> {
        if !minor_per_canonical.is_finite() || minor_per_canonical <= 0.0 {
            return Err(Error::InvalidRate(minor_per_canonical));
        }
        Ok(Self {
            minor_per_canonical,
        })
    }

    /// One canonical unit per display minor unit (cents shown as dollars).
    pub fn identity() -> Self {
        Self {
            minor_per_canonical: 1.0,
        }
    }

    /// Cents per satoshi derived from a USD-per-BTC quote.
    pub fn from_btc_price(usd_per_btc: f64) -> Result<Self> {
        Self::new(usd_per_btc * MINOR_PER_MAJOR / SATOSHIS_PER_BTC)
    }

    pub fn minor_per_canonical(&self) -> f64 {
        self.minor_per_canonical
    }
}

/// Unit the editor shows amounts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitMode {
    /// Amounts are edited in the canonical unit; conversion is identity
    #[default]
    Canonical,
    /// Amounts are edited in the decimal display unit
    Display,
}

/// Bidirectional amount converter for a fixed rate and mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitConverter {
    mode: UnitMode,
    rate: ExchangeRate,
}

impl UnitConverter {
    pub fn new(mode: UnitMode, rate: ExchangeRate) -> Self {
        Self { mode, rate }
    }

    /// Converter that never changes a value.
    pub fn canonical() -> Self {
        Self::new(UnitMode::Canonical, ExchangeRate::identity())
    }

    pub fn mode(&self) -> UnitMode {
        self.mode
    }

    pub fn rate(&self) -> ExchangeRate {
        self.rate
    }

    /// Same rate, different mode.
    pub fn with_mode(self, mode: UnitMode) -> Self {
        Self { mode, ..self }
    }

    /// Canonical amount as shown to the user. Exact in canonical mode for
    /// amounts up to [`MAX_CONVERTIBLE`].
    pub fn to_display(&self, canonical: Amount) -> f64 {
        match self.mode {
            UnitMode::Canonical => canonical as f64,
            UnitMode::Display => {
                let minor = canonical as f64 * self.rate.minor_per_canonical;
                round_half_up(minor) / MINOR_PER_MAJOR
            }
        }
    }

    /// User-entered amount in the canonical unit. Results above
    /// [`MAX_CONVERTIBLE`] are rejected.
    pub fn to_canonical(&self, display: f64) -> Result<Amount> {
        if !display.is_finite() || display < 0.0 {
            return Err(Error::InvalidAmount(display));
        }
        let canonical = match self.mode {
            UnitMode::Canonical => round_half_up(display),
            UnitMode::Display => {
                let minor = display * MINOR_PER_MAJOR;
                round_half_up(minor / self.rate.minor_per_canonical)
            }
        };
        if canonical > MAX_CONVERTIBLE as f64 {
            return Err(Error::InvalidAmount(display));
        }
        Ok(canonical as Amount)
    }
}

impl Default for UnitConverter {
    fn default() -> Self {
        Self::canonical()
    }
}

/// Round a non-negative value to the nearest integer, ties upward.
fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}
