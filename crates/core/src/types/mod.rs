//! Core types for the Luxury Jewelry storefront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod price;
pub mod quantity;

pub use cart::subtotal;
pub use id::*;
pub use price::{CurrencyCode, Price, PriceError, UnknownCurrency};
pub use quantity::{Quantity, QuantityError, Stock};
