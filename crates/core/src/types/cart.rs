//! Cart arithmetic.

use super::price::{CurrencyCode, Price, PriceError};
use super::quantity::Quantity;

/// Sum of `unit price x quantity` over every line.
///
/// An empty cart totals zero in `currency`.
///
/// # Errors
///
/// Returns `PriceError::CurrencyMismatch` if a line is priced in another
/// currency, or `PriceError::Overflow` if the total does not fit.
pub fn subtotal<I>(lines: I, currency: CurrencyCode) -> Result<Price, PriceError>
where
    I: IntoIterator<Item = (Price, Quantity)>,
{
    lines
        .into_iter()
        .try_fold(Price::zero(currency), |total, (unit, quantity)| {
            total.checked_add(unit.times(quantity)?)
        })
}
