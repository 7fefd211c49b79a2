//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tower_sessions::Session;
use tracing::instrument;

use crate::filters;
use crate::middleware::{CspNonce, OptionalAuth};
use crate::notice::{self, Notice, messages};
use crate::state::AppState;
use crate::views::{Layout, ProductCardView};

/// Number of featured products shown on the home page.
pub const FEATURED_LIMIT: usize = 3;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub layout: Layout,
    pub featured: Vec<ProductCardView>,
}

/// Display the home page.
#[instrument(skip_all)]
pub async fn home(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    nonce: CspNonce,
) -> HomeTemplate {
    let currency = state.config().currency;
    let featured = match state.catalog().featured_products(FEATURED_LIMIT).await {
        Ok(products) => products
            .iter()
            .map(|p| ProductCardView::new(p, currency))
            .collect(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch featured products");
            notice::flash(&session, Notice::error(messages::FEATURED_LOAD_FAILED)).await;
            Vec::new()
        }
    };

    HomeTemplate {
        layout: Layout::new(&session, user.as_ref(), &nonce).await,
        featured,
    }
}
