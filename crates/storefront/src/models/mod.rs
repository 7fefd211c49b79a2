//! Domain models for the storefront.
//!
//! Row types mirror the `products` and `cart_items` tables as returned by
//! the data API; money and quantities are decoded straight into the core
//! types so invalid rows fail at the boundary.

pub mod session;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use luxury_jewelry_core::{
    CartLineId, CurrencyCode, Price, PriceError, ProductId, Quantity, Stock, UserId, subtotal,
};

pub use session::{AuthUser, CurrentUser, SessionTokens};

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Unit price in the store currency's standard unit.
    pub price: Decimal,
    #[serde(default)]
    pub image_url: Option<String>,
    pub stock: Stock,
    #[serde(default)]
    pub featured: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Unit price in `currency`.
    #[must_use]
    pub const fn price(&self, currency: CurrencyCode) -> Price {
        Price::new(self.price, currency)
    }
}

/// A product to be inserted; the service assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub stock: Stock,
    #[serde(default)]
    pub featured: bool,
}

/// A raw `cart_items` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub created_at: DateTime<Utc>,
}

/// The product fields shown next to a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub image_url: Option<String>,
    pub stock: Stock,
}

impl From<&Product> for ProductSummary {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            price: product.price,
            image_url: product.image_url.clone(),
            stock: product.stock,
        }
    }
}

/// A cart line joined with its product, as embedded by the data API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartLineId,
    pub quantity: Quantity,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "products")]
    pub product: ProductSummary,
}

impl CartItem {
    /// Unit price times quantity.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Overflow` if the amount does not fit.
    pub fn line_total(&self, currency: CurrencyCode) -> Result<Price, PriceError> {
        Price::new(self.product.price, currency).times(self.quantity)
    }
}

/// Sum of price times quantity over every line; zero for an empty cart.
///
/// # Errors
///
/// Returns `PriceError::Overflow` if the total does not fit.
pub fn cart_subtotal(items: &[CartItem], currency: CurrencyCode) -> Result<Price, PriceError> {
    subtotal(
        items
            .iter()
            .map(|item| (Price::new(item.product.price, currency), item.quantity)),
        currency,
    )
}
