//! Stock levels and the quantities a shopper may select against them.
//!
//! A selectable quantity always satisfies `1 <= quantity <= stock`. Requests
//! outside that range are clamped, never rejected; a product with no stock
//! has no selectable quantity at all.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Units of a product available for sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stock(u32);

impl Stock {
    /// Create a stock level.
    #[must_use]
    pub const fn new(units: u32) -> Self {
        Self(units)
    }

    /// Number of units available.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Whether at least one unit can be sold.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.0 > 0
    }

    /// The largest selectable quantity, or `None` when sold out.
    #[must_use]
    pub fn max_quantity(&self) -> Option<Quantity> {
        NonZeroU32::new(self.0).map(Quantity)
    }
}

/// Error returned when a zero quantity is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("quantity must be at least 1")]
pub struct QuantityError;

/// A positive number of units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// A single unit.
    pub const ONE: Self = Self(NonZeroU32::MIN);

    /// Create a quantity, rejecting zero.
    #[must_use]
    pub const fn new(units: u32) -> Option<Self> {
        match NonZeroU32::new(units) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }

    /// Number of units.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0.get()
    }

    /// Clamp a requested quantity into `[1, stock]`.
    ///
    /// Returns `None` only when the product is sold out.
    #[must_use]
    pub fn clamped(requested: i64, stock: Stock) -> Option<Self> {
        let max = stock.max_quantity()?;
        let units = requested.clamp(1, i64::from(max.get()));
        u32::try_from(units).ok().and_then(Self::new)
    }

    /// One more unit, capped at `stock`.
    #[must_use]
    pub fn increment(self, stock: Stock) -> Self {
        Self::clamped(i64::from(self.get()) + 1, stock).unwrap_or(self)
    }

    /// One fewer unit, never below 1 and never above `stock`.
    #[must_use]
    pub fn decrement(self, stock: Stock) -> Self {
        Self::clamped(i64::from(self.get()) - 1, stock).unwrap_or(self)
    }

    /// Combine two quantities, saturating at `u32::MAX`.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0.get()))
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::ONE
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;

    fn try_from(units: u32) -> Result<Self, Self::Error> {
        Self::new(units).ok_or(QuantityError)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.get()
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sold_out_has_no_quantity() {
        assert_eq!(Quantity::clamped(1, Stock::new(0)), None);
        assert_eq!(Stock::new(0).max_quantity(), None);
        assert!(!Stock::new(0).is_available());
    }

    #[test]
    fn test_clamped_stays_within_bounds() {
        let stock = Stock::new(5);
        for requested in [-10, 0, 1, 3, 5, 6, 1_000, i64::MAX, i64::MIN] {
            let q = Quantity::clamped(requested, stock).unwrap().get();
            assert!((1..=5).contains(&q), "requested {requested} gave {q}");
        }
        assert_eq!(Quantity::clamped(3, stock).unwrap().get(), 3);
        assert_eq!(Quantity::clamped(0, stock).unwrap().get(), 1);
        assert_eq!(Quantity::clamped(99, stock).unwrap().get(), 5);
    }

    #[test]
    fn test_stepper_clamps_at_both_ends() {
        let stock = Stock::new(2);
        let q = Quantity::ONE.decrement(stock);
        assert_eq!(q.get(), 1);
        let q = q.increment(stock).increment(stock).increment(stock);
        assert_eq!(q.get(), 2);
    }

    #[test]
    fn test_stepper_pulls_stale_quantity_down_to_stock() {
        // Stock dropped below the quantity the shopper had selected.
        let q = Quantity::new(7).unwrap();
        assert_eq!(q.increment(Stock::new(4)).get(), 4);
        assert_eq!(q.decrement(Stock::new(4)).get(), 4);
    }

    #[test]
    fn test_quantity_deserialize_rejects_zero() {
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert_eq!(serde_json::from_str::<Quantity>("3").unwrap().get(), 3);
        assert!(serde_json::from_str::<Stock>("-1").is_err());
    }
}
