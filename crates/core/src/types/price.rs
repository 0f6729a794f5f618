//! Per-serving prices and the fixed price bands used for discrete filtering.
//!
//! Prices are stored in whole US cents. The provider reports fractional cents
//! (e.g. `56.72`), which are rounded once at normalization time.

use serde::{Deserialize, Serialize};

/// A price per serving in whole US cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cents(i64);

impl Cents {
    /// Create a price from whole cents.
    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    /// Get the amount in cents.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// Round a fractional cent amount to the nearest whole cent.
    ///
    /// Returns `None` for non-finite input.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // rounded and range-checked above
    pub fn from_fractional_cents(amount: f64) -> Option<Self> {
        if !amount.is_finite() || amount.abs() > 9.0e15 {
            return None;
        }
        Some(Self(amount.round() as i64))
    }

    /// Convert a dollar amount (as entered in the UI) to cents.
    #[must_use]
    pub fn from_dollars(dollars: f64) -> Option<Self> {
        Self::from_fractional_cents(dollars * 100.0)
    }
}

impl std::fmt::Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

/// One of the four fixed price-per-serving bands.
///
/// Lower bounds are inclusive, upper bounds exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceBucket {
    /// $0 – $2
    UnderTwo,
    /// $2 – $5
    TwoToFive,
    /// $5 – $10
    FiveToTen,
    /// $10 and up
    TenPlus,
}

/// Buckets in wire order: index `i` in a `priceBuckets` request selects `PRICE_BUCKETS[i]`.
pub const PRICE_BUCKETS: [PriceBucket; 4] = [
    PriceBucket::UnderTwo,
    PriceBucket::TwoToFive,
    PriceBucket::FiveToTen,
    PriceBucket::TenPlus,
];

impl PriceBucket {
    /// Look up a bucket by its wire index. Unknown indices yield `None`.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        PRICE_BUCKETS.get(index).copied()
    }

    /// Inclusive lower bound in cents.
    #[must_use]
    pub const fn min(self) -> Cents {
        match self {
            Self::UnderTwo => Cents(0),
            Self::TwoToFive => Cents(200),
            Self::FiveToTen => Cents(500),
            Self::TenPlus => Cents(1000),
        }
    }

    /// Exclusive upper bound in cents, `None` for the open-ended top band.
    #[must_use]
    pub const fn max(self) -> Option<Cents> {
        match self {
            Self::UnderTwo => Some(Cents(200)),
            Self::TwoToFive => Some(Cents(500)),
            Self::FiveToTen => Some(Cents(1000)),
            Self::TenPlus => None,
        }
    }

    /// Whether a price falls inside this band.
    #[must_use]
    pub fn contains(self, price: Cents) -> bool {
        price >= self.min() && self.max().is_none_or(|max| price < max)
    }
}
