//! Display data shared by page templates.

use luxury_jewelry_core::CurrencyCode;
use tower_sessions::Session;

use crate::middleware::CspNonce;
use crate::models::{CurrentUser, Product};
use crate::notice::{self, Notice};

/// Everything the base layout needs: header session controls, pending
/// notices and the script nonce.
#[derive(Clone, Debug, Default)]
pub struct Layout {
    pub notices: Vec<Notice>,
    pub user_name: Option<String>,
    pub nonce: String,
}

impl Layout {
    /// Build the layout for a page, consuming pending notices.
    pub async fn new(session: &Session, user: Option<&CurrentUser>, nonce: &CspNonce) -> Self {
        Self {
            notices: notice::take(session).await,
            user_name: user.map(CurrentUser::display_name),
            nonce: nonce.value().to_string(),
        }
    }

    #[must_use]
    pub const fn signed_in(&self) -> bool {
        self.user_name.is_some()
    }
}

/// Product display data for grids.
#[derive(Clone, Debug)]
pub struct ProductCardView {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price: String,
    pub image_url: Option<String>,
    pub in_stock: bool,
}

impl ProductCardView {
    #[must_use]
    pub fn new(product: &Product, currency: CurrencyCode) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            description: product.description.clone().filter(|d| !d.trim().is_empty()),
            price: product.price(currency).display(),
            image_url: product.image_url.clone().filter(|u| !u.trim().is_empty()),
            in_stock: product.stock.is_available(),
        }
    }

    /// Link to the detail page.
    #[must_use]
    pub fn href(&self) -> String {
        format!("/product/{}", self.id)
    }
}
