//! Data access for the catalog and carts.
//!
//! # Source of truth: the hosted data service
//!
//! Nothing is stored locally. Every read goes to the service and every
//! write is a single request:
//!
//! ## Tables
//!
//! - `products` - The catalog, readable by anyone
//! - `cart_items` - One row per `(user, product)`; row-level security
//!   limits every query to the signed-in shopper's rows
//!
//! ## Functions
//!
//! - `add_to_cart(p_product_id, p_quantity)` - Atomic add-or-increment
//!   against the `unique (user_id, product_id)` constraint
//!
//! # Schema
//!
//! Migrations live in `crates/storefront/supabase/migrations/` and are
//! applied with the hosted service's own tooling.
//!
//! # Backends
//!
//! - [`SupabaseStore`] - Pass-through to the REST API
//! - [`MemoryStore`] - In-process with the same semantics, for tests and
//!   dry runs

mod memory;
mod supabase;

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;

use async_trait::async_trait;
use thiserror::Error;

use luxury_jewelry_core::{CartLineId, ProductId, Quantity};

use crate::models::{CartItem, CartLine, CurrentUser, NewProduct, Product};
use crate::supabase::SupabaseError;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The backing service failed.
    #[error("backend error: {0}")]
    Backend(#[from] SupabaseError),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate cart line).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// Data returned by the service is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

impl RepositoryError {
    /// Map service errors, turning "no such row" answers into `NotFound`.
    fn from_backend(error: SupabaseError) -> Self {
        match error {
            SupabaseError::NotFound(_) => Self::NotFound,
            // PostgREST reports malformed identifiers as invalid text
            // representation; an id that cannot exist is simply not found
            SupabaseError::Api { code: Some(code), .. } if code == "22P02" => Self::NotFound,
            SupabaseError::Api {
                code: Some(code),
                message,
                ..
            } if code == "23505" => Self::Conflict(message),
            SupabaseError::Parse(e) => Self::DataCorruption(e.to_string()),
            other => Self::Backend(other),
        }
    }
}

/// Read access to the product catalog.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Every product, newest first.
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError>;

    /// Up to `limit` products flagged as featured.
    async fn featured_products(&self, limit: usize) -> Result<Vec<Product>, RepositoryError>;

    /// One product by id.
    ///
    /// Returns `RepositoryError::NotFound` when no product has that id.
    async fn get_product(&self, id: ProductId) -> Result<Product, RepositoryError>;

    /// Add a product to the catalog. Requires a key with write access.
    async fn insert_product(&self, product: &NewProduct) -> Result<Product, RepositoryError>;

    /// Check the backing store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// A signed-in shopper's cart.
///
/// Every method acts only on `user`'s lines.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// The shopper's lines joined with product fields, newest first.
    async fn list_lines(&self, user: &CurrentUser) -> Result<Vec<CartItem>, RepositoryError>;

    /// Add `quantity` of a product, creating the line or incrementing the
    /// existing one in a single atomic write.
    async fn add_to_cart(
        &self,
        user: &CurrentUser,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartLine, RepositoryError>;

    /// Replace a line's quantity.
    async fn update_quantity(
        &self,
        user: &CurrentUser,
        line_id: CartLineId,
        quantity: Quantity,
    ) -> Result<CartLine, RepositoryError>;

    /// Delete exactly one line.
    ///
    /// Returns `RepositoryError::NotFound` if the shopper has no such line.
    async fn remove_line(
        &self,
        user: &CurrentUser,
        line_id: CartLineId,
    ) -> Result<(), RepositoryError>;
}
