//! Item price using decimal arithmetic.
//!
//! Prices are sensitive: they are only ever persisted through the field
//! cipher. [`Price::to_plaintext`] and [`Price::from_plaintext`] define the
//! canonical string form that gets encrypted.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A non-negative item price with two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

/// Errors produced when parsing a price.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceError {
    #[error("price is not a number: {0}")]
    NotANumber(String),
    #[error("price must not be negative")]
    Negative,
}

impl Price {
    /// Create a price, rounding to two decimal places.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` for amounts below zero.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        Ok(Self(amount.round_dp(2)))
    }

    /// The decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Canonical plaintext form fed to the field cipher.
    #[must_use]
    pub fn to_plaintext(&self) -> String {
        format!("{:.2}", self.0)
    }

    /// Parse the canonical plaintext form (also accepts user input such as `"12,5"`).
    ///
    /// # Errors
    ///
    /// Returns `PriceError` if the text is not a non-negative number.
    pub fn from_plaintext(text: &str) -> Result<Self, PriceError> {
        let normalized = text.trim().replace(',', ".");
        let amount = normalized
            .parse::<Decimal>()
            .map_err(|_| PriceError::NotANumber(text.to_owned()))?;
        Self::new(amount)
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
