//! In-process repositories.
//!
//! Mirrors what the hosted service enforces: cart rows are only visible to
//! their owner, `(user, product)` is unique, adds are atomic, and lists come
//! back newest first.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;

use luxury_jewelry_core::{CartLineId, ProductId, Quantity, Stock, UserId};

use super::{CartRepository, CatalogRepository, RepositoryError};
use crate::models::{CartItem, CartLine, CurrentUser, NewProduct, Product, ProductSummary};
use crate::supabase::SupabaseError;

#[derive(Debug, Default)]
struct State {
    products: Vec<Product>,
    lines: Vec<CartLine>,
    last_created: Option<DateTime<Utc>>,
    offline: bool,
}

impl State {
    /// A creation time strictly after every earlier one, so ordering by
    /// `created_at` is total.
    fn next_created_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let at = match self.last_created {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_created = Some(at);
        at
    }

    fn check_online(&self) -> Result<(), RepositoryError> {
        if self.offline {
            return Err(RepositoryError::Backend(SupabaseError::Api {
                status: StatusCode::SERVICE_UNAVAILABLE,
                code: None,
                message: "memory store is offline".to_string(),
            }));
        }
        Ok(())
    }
}

/// Catalog and carts held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the service were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Change a product's stock, as a sale elsewhere would.
    pub fn set_stock(&self, product_id: ProductId, stock: Stock) {
        if let Some(product) = self.lock().products.iter_mut().find(|p| p.id == product_id) {
            product.stock = stock;
        }
    }

    /// Every cart line of one user, in insertion order.
    #[must_use]
    pub fn lines_for(&self, user_id: UserId) -> Vec<CartLine> {
        self.lock()
            .lines
            .iter()
            .filter(|line| line.user_id == user_id)
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // State stays consistent across panics: every mutation is a single push or assignment
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let state = self.lock();
        state.check_online()?;
        let mut products = state.products.clone();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(products)
    }

    async fn featured_products(&self, limit: usize) -> Result<Vec<Product>, RepositoryError> {
        let state = self.lock();
        state.check_online()?;
        Ok(state
            .products
            .iter()
            .filter(|p| p.featured)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_product(&self, id: ProductId) -> Result<Product, RepositoryError> {
        let state = self.lock();
        state.check_online()?;
        state
            .products
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn insert_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let mut state = self.lock();
        state.check_online()?;
        let product = Product {
            id: ProductId::generate(),
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            image_url: product.image_url.clone(),
            stock: product.stock,
            featured: product.featured,
            created_at: state.next_created_at(),
        };
        state.products.push(product.clone());
        Ok(product)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.lock().check_online()
    }
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn list_lines(&self, user: &CurrentUser) -> Result<Vec<CartItem>, RepositoryError> {
        let state = self.lock();
        state.check_online()?;

        // Inner join: lines whose product vanished are not shown
        let mut items: Vec<CartItem> = state
            .lines
            .iter()
            .filter(|line| line.user_id == user.id)
            .filter_map(|line| {
                let product = state.products.iter().find(|p| p.id == line.product_id)?;
                Some(CartItem {
                    id: line.id,
                    quantity: line.quantity,
                    created_at: line.created_at,
                    product: ProductSummary::from(product),
                })
            })
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn add_to_cart(
        &self,
        user: &CurrentUser,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartLine, RepositoryError> {
        let mut state = self.lock();
        state.check_online()?;

        if !state.products.iter().any(|p| p.id == product_id) {
            return Err(RepositoryError::NotFound);
        }

        if let Some(line) = state
            .lines
            .iter_mut()
            .find(|line| line.user_id == user.id && line.product_id == product_id)
        {
            line.quantity = line.quantity.saturating_add(quantity);
            return Ok(line.clone());
        }

        let line = CartLine {
            id: CartLineId::generate(),
            user_id: user.id,
            product_id,
            quantity,
            created_at: state.next_created_at(),
        };
        state.lines.push(line.clone());
        Ok(line)
    }

    async fn update_quantity(
        &self,
        user: &CurrentUser,
        line_id: CartLineId,
        quantity: Quantity,
    ) -> Result<CartLine, RepositoryError> {
        let mut state = self.lock();
        state.check_online()?;
        let line = state
            .lines
            .iter_mut()
            .find(|line| line.id == line_id && line.user_id == user.id)
            .ok_or(RepositoryError::NotFound)?;
        line.quantity = quantity;
        Ok(line.clone())
    }

    async fn remove_line(
        &self,
        user: &CurrentUser,
        line_id: CartLineId,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        state.check_online()?;
        let before = state.lines.len();
        state
            .lines
            .retain(|line| !(line.id == line_id && line.user_id == user.id));
        if state.lines.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use luxury_jewelry_core::Stock;
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::{AuthUser, SessionTokens};

    fn shopper() -> CurrentUser {
        CurrentUser::new(
            AuthUser {
                id: UserId::generate(),
                email: None,
            },
            SessionTokens {
                access_token: "a".to_string(),
                refresh_token: "r".to_string(),
                expires_in: 3600,
            },
            Utc::now(),
        )
    }

    fn new_product(name: &str, price: i64, stock: u32, featured: bool) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: None,
            price: Decimal::from(price),
            image_url: None,
            stock: Stock::new(stock),
            featured,
        }
    }

    fn qty(n: u32) -> Quantity {
        Quantity::new(n).unwrap()
    }

    #[tokio::test]
    async fn test_products_listed_newest_first() {
        let store = MemoryStore::new();
        for name in ["Nhẫn", "Vòng tay", "Bông tai"] {
            store.insert_product(&new_product(name, 1, 1, false)).await.unwrap();
        }
        let names: Vec<_> = store
            .list_products()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["Bông tai", "Vòng tay", "Nhẫn"]);
    }

    #[tokio::test]
    async fn test_featured_capped() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .insert_product(&new_product(&format!("p{i}"), 1, 1, i != 2))
                .await
                .unwrap();
        }
        let featured = store.featured_products(3).await.unwrap();
        assert_eq!(featured.len(), 3);
        assert!(featured.iter().all(|p| p.featured));
    }

    #[tokio::test]
    async fn test_get_unknown_product() {
        let store = MemoryStore::new();
        let err = store.get_product(ProductId::generate()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_add_existing_line_increments() {
        let store = MemoryStore::new();
        let user = shopper();
        let ring = store.insert_product(&new_product("Nhẫn", 1, 10, false)).await.unwrap();

        store.add_to_cart(&user, ring.id, qty(2)).await.unwrap();
        let line = store.add_to_cart(&user, ring.id, qty(1)).await.unwrap();

        assert_eq!(line.quantity.get(), 3);
        let lines = store.lines_for(user.id);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity.get(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_adds_keep_one_line() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let user = shopper();
        let ring = store.insert_product(&new_product("Nhẫn", 1, 100, false)).await.unwrap();

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let store = store.clone();
                let user = user.clone();
                tokio::spawn(async move { store.add_to_cart(&user, ring.id, qty(1)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let lines = store.lines_for(user.id);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity.get(), 10);
    }

    #[tokio::test]
    async fn test_lines_are_private_to_their_owner() {
        let store = MemoryStore::new();
        let alice = shopper();
        let bob = shopper();
        let ring = store.insert_product(&new_product("Nhẫn", 1, 10, false)).await.unwrap();

        let line = store.add_to_cart(&alice, ring.id, qty(1)).await.unwrap();

        assert!(store.list_lines(&bob).await.unwrap().is_empty());
        assert!(matches!(
            store.remove_line(&bob, line.id).await,
            Err(RepositoryError::NotFound)
        ));
        assert!(matches!(
            store.update_quantity(&bob, line.id, qty(5)).await,
            Err(RepositoryError::NotFound)
        ));
        assert_eq!(store.list_lines(&alice).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_only_that_line() {
        let store = MemoryStore::new();
        let user = shopper();
        let ring = store.insert_product(&new_product("Nhẫn", 1, 10, false)).await.unwrap();
        let chain = store.insert_product(&new_product("Dây chuyền", 1, 10, false)).await.unwrap();

        let first = store.add_to_cart(&user, ring.id, qty(1)).await.unwrap();
        let second = store.add_to_cart(&user, chain.id, qty(1)).await.unwrap();

        store.remove_line(&user, first.id).await.unwrap();
        let remaining: Vec<_> = store.lines_for(user.id).into_iter().map(|l| l.id).collect();
        assert_eq!(remaining, [second.id]);
    }

    #[tokio::test]
    async fn test_cart_joined_newest_first() {
        let store = MemoryStore::new();
        let user = shopper();
        let ring = store.insert_product(&new_product("Nhẫn", 1_000_000, 10, false)).await.unwrap();
        let chain = store.insert_product(&new_product("Dây chuyền", 500_000, 10, false)).await.unwrap();

        store.add_to_cart(&user, ring.id, qty(2)).await.unwrap();
        store.add_to_cart(&user, chain.id, qty(1)).await.unwrap();

        let items = store.list_lines(&user).await.unwrap();
        assert_eq!(items[0].product.name, "Dây chuyền");
        assert_eq!(items[1].product.name, "Nhẫn");
        assert_eq!(items[1].quantity.get(), 2);
    }

    #[tokio::test]
    async fn test_offline_fails_every_call() {
        let store = MemoryStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.list_products().await,
            Err(RepositoryError::Backend(_))
        ));
        assert!(store.ping().await.is_err());
        store.set_offline(false);
        assert!(store.ping().await.is_ok());
    }
}
