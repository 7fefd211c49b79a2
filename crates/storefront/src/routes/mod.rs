//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page (featured products)
//! GET  /about                  - About page
//! GET  /health                 - Liveness
//! GET  /health/ready           - Readiness (pings the data service)
//!
//! # Products
//! GET  /products               - Product listing, newest first
//! GET  /product/{id}?qty=N     - Product detail with quantity stepper
//! POST /product/{id}/cart      - Add to cart
//!
//! # Cart (requires sign-in)
//! GET  /cart                   - Cart page
//! POST /cart/update            - Set a line quantity
//! POST /cart/remove            - Remove a line
//! GET  /checkout               - Checkout placeholder
//!
//! # Auth
//! GET  /auth                   - Redirect to the hosted sign-in page
//! GET  /auth/callback          - Exchange the hosted sign-in code for a session
//! POST /auth/sign-out          - Sign out
//! GET  /session/events         - Session changes (server-sent events)
//! ```

pub mod auth;
pub mod cart;
pub mod events;
pub mod health;
pub mod home;
pub mod pages;
pub mod products;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{auth_rate_limiter, cart_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(auth::sign_in))
        .route(
            "/callback",
            get(auth::callback).layer(auth_rate_limiter()),
        )
        .route("/sign-out", post(auth::sign_out))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(products::show))
        .route(
            "/{id}/cart",
            post(products::add_to_cart).layer(cart_rate_limiter()),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    let limiter = cart_rate_limiter();
    Router::new()
        .route("/", get(cart::show))
        .route("/update", post(cart::update).layer(limiter.clone()))
        .route("/remove", post(cart::remove).layer(limiter))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/about", get(pages::about))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/products", get(products::index))
        .nest("/product", product_routes())
        .nest("/cart", cart_routes())
        .route("/checkout", get(cart::checkout))
        .nest("/auth", auth_routes())
        .route("/session/events", get(events::session_events))
}
