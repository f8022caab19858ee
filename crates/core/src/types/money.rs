//! Money amounts held in minor currency units.
//!
//! Order totals arrive from the backend as integer cents (`total_price: 1998`),
//! while line prices are decimals (`9.99`). `Money` keeps the integer form and
//! converts to [`Decimal`] only for display and arithmetic with line prices.

use core::fmt;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Number of minor units per major unit (cents per dollar).
const MINOR_UNIT_SCALE: u32 = 2;

/// An amount in minor currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Create an amount from minor units.
    #[must_use]
    pub const fn from_minor_units(minor: i64) -> Self {
        Self(minor)
    }

    /// Convert a decimal major-unit amount, rounding half away from zero to the
    /// nearest minor unit. Returns `None` if the amount does not fit in `i64`.
    #[must_use]
    pub fn from_decimal(amount: Decimal) -> Option<Self> {
        let minor = amount
            .checked_mul(Decimal::ONE_HUNDRED)?
            .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
        minor.to_i64().map(Self)
    }

    /// The raw minor-unit value.
    #[must_use]
    pub const fn minor_units(self) -> i64 {
        self.0
    }

    /// The amount in major units (e.g. dollars).
    #[must_use]
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, MINOR_UNIT_SCALE)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.to_decimal())
    }
}
