use serde::{Deserialize, Serialize};

use promostock_core::{DomainError, DomainResult, ValueObject};

/// Upper bound on units of one item, summed over its sizes. Keeps every
/// counter and every signed holdings delta representable.
pub const MAX_UNITS: u64 = i64::MAX as u64;

/// Number of units moved by a single stock command. Never zero, at most
/// [`MAX_UNITS`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Quantity(u64);

impl Quantity {
    pub fn new(units: u64) -> DomainResult<Self> {
        if units == 0 {
            return Err(DomainError::validation("quantity must be greater than zero"));
        }
        if units > MAX_UNITS {
            return Err(DomainError::validation("quantity too large"));
        }
        Ok(Self(units))
    }

    /// Signed input from the HTTP layer; zero and negatives are rejected.
    pub fn from_signed(units: i64) -> DomainResult<Self> {
        if units <= 0 {
            return Err(DomainError::validation("quantity must be greater than zero"));
        }
        Self::new(units as u64)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl ValueObject for Quantity {}

impl TryFrom<u64> for Quantity {
    type Error = DomainError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u64 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}
