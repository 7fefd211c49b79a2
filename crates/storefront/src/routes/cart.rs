//! Cart route handlers.
//!
//! Every handler requires a signed-in shopper. Reads and writes go through
//! the shopper's own token, so the data service only ever exposes their
//! lines. Mutations redirect back to `/cart`, which re-fetches.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::Redirect,
};
use luxury_jewelry_core::{CartLineId, CurrencyCode, Price, Quantity};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::db::RepositoryError;
use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{CspNonce, RequireAuth};
use crate::models::{CartItem, cart_subtotal};
use crate::notice::{self, Notice, messages};
use crate::state::AppState;
use crate::views::Layout;

const CART_PATH: &str = "/cart";

/// Cart line display data for templates.
#[derive(Clone, Debug)]
pub struct CartItemView {
    pub id: String,
    pub product_href: String,
    pub name: String,
    pub image_url: Option<String>,
    pub quantity: u32,
    pub stock: u32,
    pub in_stock: bool,
    pub unit_price: String,
    pub line_price: String,
}

impl CartItemView {
    fn new(item: &CartItem, currency: CurrencyCode) -> Result<Self> {
        let unit = Price::new(item.product.price, currency);
        Ok(Self {
            id: item.id.to_string(),
            product_href: format!("/product/{}", item.product.id),
            name: item.product.name.clone(),
            image_url: item
                .product
                .image_url
                .clone()
                .filter(|u| !u.trim().is_empty()),
            quantity: item.quantity.get(),
            stock: item.product.stock.get(),
            in_stock: item.product.stock.is_available(),
            unit_price: unit.display(),
            line_price: item.line_total(currency)?.display(),
        })
    }
}

/// Cart display data for templates.
#[derive(Clone, Debug)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub item_count: u32,
}

impl CartView {
    /// Build the view; the subtotal is the exact sum of price times quantity.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Price` if the subtotal overflows.
    pub fn new(items: &[CartItem], currency: CurrencyCode) -> Result<Self> {
        Ok(Self {
            items: items
                .iter()
                .map(|item| CartItemView::new(item, currency))
                .collect::<Result<_>>()?,
            subtotal: cart_subtotal(items, currency)?.display(),
            item_count: items
                .iter()
                .fold(0u32, |n, item| n.saturating_add(item.quantity.get())),
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub layout: Layout,
    pub cart: CartView,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub line_id: String,
    pub quantity: String,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub line_id: String,
}

/// Display the cart page.
///
/// # Errors
///
/// Returns `AppError::Price` if the subtotal cannot be computed.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    nonce: CspNonce,
) -> Result<CartShowTemplate> {
    let items = match state.carts().list_lines(&user).await {
        Ok(items) => items,
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch cart");
            notice::flash(&session, Notice::error(messages::CART_LOAD_FAILED)).await;
            Vec::new()
        }
    };

    let cart = CartView::new(&items, state.config().currency)?;

    Ok(CartShowTemplate {
        layout: Layout::new(&session, Some(&user), &nonce).await,
        cart,
    })
}

/// Remove exactly one line by id.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    Form(form): Form<RemoveFromCartForm>,
) -> Redirect {
    let result = match form.line_id.parse::<CartLineId>() {
        Ok(line_id) => state.carts().remove_line(&user, line_id).await,
        Err(_) => Err(RepositoryError::NotFound),
    };

    match result {
        Ok(()) => {
            tracing::info!(line_id = %form.line_id, "Removed cart line");
            add_breadcrumb(
                "cart",
                "Removed from cart",
                Some(&[("line_id", form.line_id.as_str())]),
            );
            notice::flash(&session, Notice::success(messages::REMOVED_FROM_CART)).await;
        }
        Err(e) => {
            tracing::warn!(line_id = %form.line_id, error = %e, "Remove failed");
            notice::flash(&session, Notice::error(messages::REMOVE_FAILED)).await;
        }
    }

    Redirect::to(CART_PATH)
}

/// Set a line's quantity, clamped to the product's current stock.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    Form(form): Form<UpdateCartForm>,
) -> Redirect {
    let (Ok(line_id), Ok(requested)) = (
        form.line_id.parse::<CartLineId>(),
        form.quantity.trim().parse::<i64>(),
    ) else {
        notice::flash(&session, Notice::error(messages::QUANTITY_UPDATE_FAILED)).await;
        return Redirect::to(CART_PATH);
    };

    // Stock lives on the joined product; the line list is the only read
    // that carries it for the shopper's own lines.
    let stock = match state.carts().list_lines(&user).await {
        Ok(items) => items
            .into_iter()
            .find(|item| item.id == line_id)
            .map(|item| item.product.stock),
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch cart");
            None
        }
    };
    let Some(stock) = stock else {
        notice::flash(&session, Notice::error(messages::QUANTITY_UPDATE_FAILED)).await;
        return Redirect::to(CART_PATH);
    };

    let Some(quantity) = Quantity::clamped(requested, stock) else {
        notice::flash(&session, Notice::error(messages::OUT_OF_STOCK)).await;
        return Redirect::to(CART_PATH);
    };

    match state.carts().update_quantity(&user, line_id, quantity).await {
        Ok(line) => {
            tracing::info!(line_id = %line.id, quantity = line.quantity.get(), "Updated cart line");
            notice::flash(&session, Notice::success(messages::QUANTITY_UPDATED)).await;
        }
        Err(e) => {
            tracing::warn!(line_id = %line_id, error = %e, "Quantity update failed");
            notice::flash(&session, Notice::error(messages::QUANTITY_UPDATE_FAILED)).await;
        }
    }

    Redirect::to(CART_PATH)
}

/// Checkout placeholder: payment is not available yet.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn checkout(RequireAuth(user): RequireAuth, session: Session) -> Redirect {
    notice::flash(&session, Notice::info(messages::CHECKOUT_UNAVAILABLE)).await;
    Redirect::to(CART_PATH)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use luxury_jewelry_core::{ProductId, Stock};
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::ProductSummary;

    fn item(price: i64, quantity: u32) -> CartItem {
        item_with_stock(price, quantity, 10)
    }

    fn item_with_stock(price: i64, quantity: u32, stock: u32) -> CartItem {
        CartItem {
            id: CartLineId::generate(),
            quantity: Quantity::new(quantity).unwrap(),
            created_at: Utc::now(),
            product: ProductSummary {
                id: ProductId::generate(),
                name: "Dây chuyền".to_string(),
                price: Decimal::from(price),
                image_url: Some(String::new()),
                stock: Stock::new(stock),
            },
        }
    }

    #[test]
    fn test_cart_view_totals() {
        let items = vec![item(1_000_000, 2), item(500_000, 1)];
        let view = CartView::new(&items, CurrencyCode::VND).unwrap();

        assert_eq!(view.subtotal, "2.500.000\u{a0}₫");
        assert_eq!(view.item_count, 3);
        assert_eq!(view.items[0].line_price, "2.000.000\u{a0}₫");
        assert_eq!(view.items[0].unit_price, "1.000.000\u{a0}₫");
        assert!(view.items[0].image_url.is_none());
    }

    #[test]
    fn test_empty_cart_view() {
        let view = CartView::new(&[], CurrencyCode::VND).unwrap();
        assert!(view.is_empty());
        assert_eq!(view.subtotal, "0\u{a0}₫");
        assert_eq!(view.item_count, 0);
    }

    #[test]
    fn test_sold_out_line_is_flagged() {
        let items = vec![item_with_stock(1_000_000, 2, 0), item(500_000, 1)];
        let view = CartView::new(&items, CurrencyCode::VND).unwrap();

        assert!(!view.items[0].in_stock);
        assert!(view.items[1].in_stock);
        // Still counted until the shopper removes it
        assert_eq!(view.subtotal, "2.500.000\u{a0}₫");
    }
}
