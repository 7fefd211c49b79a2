//! Product route handlers: listing, detail and add-to-cart.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use luxury_jewelry_core::{ProductId, Quantity, Stock};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::db::RepositoryError;
use crate::error::add_breadcrumb;
use crate::filters;
use crate::middleware::{CspNonce, OptionalAuth, auth::SIGN_IN_PATH};
use crate::models::Product;
use crate::notice::{self, Notice, messages};
use crate::state::AppState;
use crate::views::{Layout, ProductCardView};

const LISTING_PATH: &str = "/products";

/// Quantity stepper state for the detail page.
#[derive(Clone, Debug)]
pub struct StepperView {
    pub quantity: u32,
    pub max: u32,
    pub decrement_href: Option<String>,
    pub increment_href: Option<String>,
}

impl StepperView {
    /// `None` when the product is out of stock.
    fn new(product_id: ProductId, requested: Option<i64>, stock: Stock) -> Option<Self> {
        let quantity = Quantity::clamped(requested.unwrap_or(1), stock)?;
        let href = |q: Quantity| format!("/product/{product_id}?qty={}", q.get());

        let down = quantity.decrement(stock);
        let up = quantity.increment(stock);

        Some(Self {
            quantity: quantity.get(),
            max: stock.get(),
            decrement_href: (down != quantity).then(|| href(down)),
            increment_href: (up != quantity).then(|| href(up)),
        })
    }
}

/// Product detail display data.
#[derive(Clone, Debug)]
pub struct ProductDetailView {
    pub card: ProductCardView,
    pub stock: u32,
    pub stepper: Option<StepperView>,
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub layout: Layout,
    pub products: Vec<ProductCardView>,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub layout: Layout,
    pub product: ProductDetailView,
}

/// Stepper position carried in the detail URL.
#[derive(Debug, Deserialize)]
pub struct StepperQuery {
    pub qty: Option<i64>,
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub quantity: Option<String>,
}

/// Display the product listing, newest first.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    nonce: CspNonce,
) -> ProductsIndexTemplate {
    let currency = state.config().currency;
    let products = match state.catalog().list_products().await {
        Ok(products) => products
            .iter()
            .map(|p| ProductCardView::new(p, currency))
            .collect(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch products");
            notice::flash(&session, Notice::error(messages::PRODUCTS_LOAD_FAILED)).await;
            Vec::new()
        }
    };

    ProductsIndexTemplate {
        layout: Layout::new(&session, user.as_ref(), &nonce).await,
        products,
    }
}

/// Fetch a product for a detail route, turning failures into a notice.
///
/// Unparseable ids are treated like unknown ones.
async fn load_product(state: &AppState, session: &Session, raw_id: &str) -> Option<Product> {
    let Ok(id) = raw_id.parse::<ProductId>() else {
        notice::flash(session, Notice::error(messages::PRODUCT_NOT_FOUND)).await;
        return None;
    };

    match state.catalog().get_product(id).await {
        Ok(product) => Some(product),
        Err(RepositoryError::NotFound) => {
            tracing::info!(product_id = %id, "Product not found");
            notice::flash(session, Notice::error(messages::PRODUCT_NOT_FOUND)).await;
            None
        }
        Err(e) => {
            tracing::error!(product_id = %id, error = %e, "Failed to fetch product");
            notice::flash(session, Notice::error(messages::PRODUCTS_LOAD_FAILED)).await;
            None
        }
    }
}

/// Display one product with its quantity stepper.
///
/// Unknown products send the shopper back to the listing with a notice.
#[instrument(skip(state, user, session, nonce, query))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    nonce: CspNonce,
    Path(id): Path<String>,
    Query(query): Query<StepperQuery>,
) -> Response {
    let Some(product) = load_product(&state, &session, &id).await else {
        return Redirect::to(LISTING_PATH).into_response();
    };

    let view = ProductDetailView {
        card: ProductCardView::new(&product, state.config().currency),
        stock: product.stock.get(),
        stepper: StepperView::new(product.id, query.qty, product.stock),
    };

    ProductShowTemplate {
        layout: Layout::new(&session, user.as_ref(), &nonce).await,
        product: view,
    }
    .into_response()
}

/// Add the selected quantity to the shopper's cart.
///
/// The session is checked before anything else; out-of-stock products are
/// never written. The requested quantity is clamped to the current stock.
#[instrument(skip(state, user, session, form))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Path(id): Path<String>,
    Form(form): Form<AddToCartForm>,
) -> Redirect {
    let Some(user) = user else {
        notice::flash(&session, Notice::error(messages::SIGN_IN_TO_ADD)).await;
        return Redirect::to(SIGN_IN_PATH);
    };

    let Some(product) = load_product(&state, &session, &id).await else {
        return Redirect::to(LISTING_PATH);
    };
    let detail_path = format!("/product/{}", product.id);

    let requested = form
        .quantity
        .as_deref()
        .and_then(|q| q.trim().parse::<i64>().ok())
        .unwrap_or(1);
    let Some(quantity) = Quantity::clamped(requested, product.stock) else {
        notice::flash(&session, Notice::error(messages::OUT_OF_STOCK)).await;
        return Redirect::to(&detail_path);
    };

    match state
        .carts()
        .add_to_cart(&user, product.id, quantity)
        .await
    {
        Ok(line) => {
            tracing::info!(
                user_id = %user.id,
                product_id = %product.id,
                quantity = line.quantity.get(),
                "Added to cart"
            );
            let product_id = product.id.to_string();
            add_breadcrumb(
                "cart",
                "Added to cart",
                Some(&[("product_id", product_id.as_str())]),
            );
            notice::flash(&session, Notice::success(messages::ADDED_TO_CART)).await;
        }
        Err(e) => {
            tracing::error!(product_id = %product.id, error = %e, "Add to cart failed");
            notice::flash(&session, Notice::error(messages::ADD_TO_CART_FAILED)).await;
        }
    }

    Redirect::to(&format!("{detail_path}?qty={}", quantity.get()))
}
