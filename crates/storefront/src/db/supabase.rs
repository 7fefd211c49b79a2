//! Repositories backed by the hosted data service.

use async_trait::async_trait;
use serde::Serialize;
use tracing::instrument;

use luxury_jewelry_core::{CartLineId, ProductId, Quantity};

use super::{CartRepository, CatalogRepository, RepositoryError};
use crate::models::{CartItem, CartLine, CurrentUser, NewProduct, Product};
use crate::supabase::{DataClient, Direction, Query};

const PRODUCTS: &str = "products";
const CART_ITEMS: &str = "cart_items";

/// Cart line columns with the product fields the cart page shows.
const CART_SELECT: &str =
    "id,quantity,created_at,products!inner(id,name,price,image_url,stock)";

#[derive(Serialize)]
struct AddToCartArgs {
    p_product_id: ProductId,
    p_quantity: Quantity,
}

#[derive(Serialize)]
struct QuantityPatch {
    quantity: Quantity,
}

/// Pass-through repositories over [`DataClient`].
///
/// Catalog reads use the client's own key. Cart calls are re-scoped to the
/// shopper's access token so row-level security applies.
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    client: DataClient,
}

impl SupabaseStore {
    #[must_use]
    pub const fn new(client: DataClient) -> Self {
        Self { client }
    }

    fn as_user(&self, user: &CurrentUser) -> DataClient {
        self.client.with_bearer(user.access_token())
    }
}

#[async_trait]
impl CatalogRepository for SupabaseStore {
    #[instrument(skip(self))]
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let query = Query::new()
            .select("*")
            .order("created_at", Direction::Descending);
        self.client
            .fetch_all(PRODUCTS, &query)
            .await
            .map_err(RepositoryError::from_backend)
    }

    #[instrument(skip(self))]
    async fn featured_products(&self, limit: usize) -> Result<Vec<Product>, RepositoryError> {
        let query = Query::new().select("*").eq("featured", true).limit(limit);
        self.client
            .fetch_all(PRODUCTS, &query)
            .await
            .map_err(RepositoryError::from_backend)
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn get_product(&self, id: ProductId) -> Result<Product, RepositoryError> {
        let query = Query::new().select("*").eq("id", id);
        self.client
            .fetch_one(PRODUCTS, &query)
            .await
            .map_err(RepositoryError::from_backend)
    }

    #[instrument(skip(self, product), fields(name = %product.name))]
    async fn insert_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        self.client
            .insert(PRODUCTS, product)
            .await
            .map_err(RepositoryError::from_backend)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.client
            .ping(PRODUCTS)
            .await
            .map_err(RepositoryError::from_backend)
    }
}

#[async_trait]
impl CartRepository for SupabaseStore {
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn list_lines(&self, user: &CurrentUser) -> Result<Vec<CartItem>, RepositoryError> {
        let query = Query::new()
            .select(CART_SELECT)
            .order("created_at", Direction::Descending);
        self.as_user(user)
            .fetch_all(CART_ITEMS, &query)
            .await
            .map_err(RepositoryError::from_backend)
    }

    #[instrument(skip(self, user), fields(user_id = %user.id, product_id = %product_id, quantity = %quantity))]
    async fn add_to_cart(
        &self,
        user: &CurrentUser,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartLine, RepositoryError> {
        let args = AddToCartArgs {
            p_product_id: product_id,
            p_quantity: quantity,
        };
        self.as_user(user)
            .rpc("add_to_cart", &args)
            .await
            .map_err(RepositoryError::from_backend)
    }

    #[instrument(skip(self, user), fields(user_id = %user.id, line_id = %line_id, quantity = %quantity))]
    async fn update_quantity(
        &self,
        user: &CurrentUser,
        line_id: CartLineId,
        quantity: Quantity,
    ) -> Result<CartLine, RepositoryError> {
        let query = Query::new().eq("id", line_id);
        let rows: Vec<CartLine> = self
            .as_user(user)
            .update(CART_ITEMS, &query, &QuantityPatch { quantity })
            .await
            .map_err(RepositoryError::from_backend)?;
        rows.into_iter().next().ok_or(RepositoryError::NotFound)
    }

    #[instrument(skip(self, user), fields(user_id = %user.id, line_id = %line_id))]
    async fn remove_line(
        &self,
        user: &CurrentUser,
        line_id: CartLineId,
    ) -> Result<(), RepositoryError> {
        let query = Query::new().eq("id", line_id);
        let removed: Vec<CartLine> = self
            .as_user(user)
            .delete(CART_ITEMS, &query)
            .await
            .map_err(RepositoryError::from_backend)?;

        match removed.len() {
            0 => Err(RepositoryError::NotFound),
            1 => Ok(()),
            n => Err(RepositoryError::DataCorruption(format!(
                "deleting one cart line removed {n} rows"
            ))),
        }
    }
}
