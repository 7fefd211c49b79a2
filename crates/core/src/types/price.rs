//! Type-safe price representation using decimal arithmetic.
//!
//! Prices are stored in the currency's standard unit (dong, dollars) and
//! formatted following the conventions of the currency's home locale:
//!
//! | Currency | Locale | Example |
//! |---|---|---|
//! | VND | `vi-VN` | `2.500.000 ₫` |
//! | USD | `en-US` | `$1,234.50` |
//! | EUR | `de-DE` | `1.234,50 €` |

use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::quantity::Quantity;

/// No-break space placed between an amount and a trailing currency symbol.
const NBSP: char = '\u{a0}';

/// Errors produced by price arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    /// Two prices in different currencies were combined.
    #[error("currency mismatch: {0} vs {1}")]
    CurrencyMismatch(CurrencyCode, CurrencyCode),

    /// The result does not fit in a decimal.
    #[error("price arithmetic overflowed")]
    Overflow,
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dong, dollars).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// A zero amount in the given currency.
    #[must_use]
    pub const fn zero(currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency_code)
    }

    /// Price of `quantity` units at this unit price.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Overflow` if the product does not fit.
    pub fn times(self, quantity: Quantity) -> Result<Self, PriceError> {
        let amount = self
            .amount
            .checked_mul(Decimal::from(quantity.get()))
            .ok_or(PriceError::Overflow)?;
        Ok(Self::new(amount, self.currency_code))
    }

    /// Add two prices of the same currency.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::CurrencyMismatch` when the currencies differ and
    /// `PriceError::Overflow` when the sum does not fit.
    pub fn checked_add(self, other: Self) -> Result<Self, PriceError> {
        if self.currency_code != other.currency_code {
            return Err(PriceError::CurrencyMismatch(
                self.currency_code,
                other.currency_code,
            ));
        }
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(PriceError::Overflow)?;
        Ok(Self::new(amount, self.currency_code))
    }

    /// Format for display using the currency's locale rules.
    ///
    /// Amounts are rounded to the currency's minor units, midpoints away
    /// from zero.
    #[must_use]
    pub fn display(&self) -> String {
        let format = self.currency_code.format();
        let rounded = self
            .amount
            .round_dp_with_strategy(format.minor_units, RoundingStrategy::MidpointAwayFromZero);

        let digits = format!("{:.*}", format.minor_units as usize, rounded.abs());
        let (integer, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), ""));

        let mut number = group_thousands(integer, format.group_separator);
        if !fraction.is_empty() {
            number.push(format.decimal_separator);
            number.push_str(fraction);
        }

        let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
            "-"
        } else {
            ""
        };

        if format.symbol_first {
            format!("{sign}{}{number}", format.symbol)
        } else {
            format!("{sign}{number}{NBSP}{}", format.symbol)
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Insert `separator` between every group of three digits, counting from the right.
fn group_thousands(digits: &str, separator: char) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(c);
    }
    out
}

/// Locale conventions for rendering one currency.
#[derive(Debug, Clone, Copy)]
struct CurrencyFormat {
    symbol: &'static str,
    symbol_first: bool,
    group_separator: char,
    decimal_separator: char,
    minor_units: u32,
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    VND,
    USD,
    EUR,
}

impl CurrencyCode {
    /// The three-letter ISO code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::VND => "VND",
            Self::USD => "USD",
            Self::EUR => "EUR",
        }
    }

    const fn format(self) -> CurrencyFormat {
        match self {
            Self::VND => CurrencyFormat {
                symbol: "₫",
                symbol_first: false,
                group_separator: '.',
                decimal_separator: ',',
                minor_units: 0,
            },
            Self::USD => CurrencyFormat {
                symbol: "$",
                symbol_first: true,
                group_separator: ',',
                decimal_separator: '.',
                minor_units: 2,
            },
            Self::EUR => CurrencyFormat {
                symbol: "€",
                symbol_first: false,
                group_separator: '.',
                decimal_separator: ',',
                minor_units: 2,
            },
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error returned when parsing an unsupported currency code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported currency code: {0}")]
pub struct UnknownCurrency(pub String);

impl FromStr for CurrencyCode {
    type Err = UnknownCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VND" => Ok(Self::VND),
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            _ => Err(UnknownCurrency(s.to_string())),
        }
    }
}
