//! One-shot notices shown at the top of the next rendered page.
//!
//! Every failed call to the data or auth service ends up here as a short,
//! human-readable message; nothing is retried and nothing is fatal.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::models::session::keys;

/// Severity of a notice, used for styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
    Info,
}

/// A message for the shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn success(message: &str) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn error(message: &str) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn info(message: &str) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.to_string(),
        }
    }

    /// CSS modifier class.
    #[must_use]
    pub const fn css_class(&self) -> &'static str {
        match self.level {
            NoticeLevel::Success => "notice--success",
            NoticeLevel::Error => "notice--error",
            NoticeLevel::Info => "notice--info",
        }
    }

    /// ARIA role: errors interrupt, everything else is polite.
    #[must_use]
    pub const fn role(&self) -> &'static str {
        match self.level {
            NoticeLevel::Error => "alert",
            NoticeLevel::Success | NoticeLevel::Info => "status",
        }
    }
}

/// Queue a notice for the next rendered page.
///
/// Session failures are logged, never propagated: losing a notice must not
/// fail the request that produced it.
pub async fn flash(session: &Session, notice: Notice) {
    let mut pending = session
        .get::<Vec<Notice>>(keys::NOTICES)
        .await
        .ok()
        .flatten()
        .unwrap_or_default();
    pending.push(notice);

    if let Err(e) = session.insert(keys::NOTICES, pending).await {
        tracing::warn!(error = %e, "Failed to store notice");
    }
}

/// Remove and return every pending notice.
pub async fn take(session: &Session) -> Vec<Notice> {
    match session.remove::<Vec<Notice>>(keys::NOTICES).await {
        Ok(notices) => notices.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read notices");
            Vec::new()
        }
    }
}

/// Shopper-facing messages, in the store's language.
pub mod messages {
    pub const PRODUCTS_LOAD_FAILED: &str = "Không thể tải sản phẩm";
    pub const FEATURED_LOAD_FAILED: &str = "Không thể tải sản phẩm nổi bật";
    pub const PRODUCT_NOT_FOUND: &str = "Không tìm thấy sản phẩm";
    pub const SIGN_IN_TO_ADD: &str = "Vui lòng đăng nhập để thêm vào giỏ hàng";
    pub const SIGN_IN_FOR_CART: &str = "Vui lòng đăng nhập để xem giỏ hàng";
    pub const ADDED_TO_CART: &str = "Đã thêm vào giỏ hàng!";
    pub const ADD_TO_CART_FAILED: &str = "Không thể thêm vào giỏ hàng";
    pub const OUT_OF_STOCK: &str = "Sản phẩm đã hết hàng";
    pub const CART_LOAD_FAILED: &str = "Không thể tải giỏ hàng";
    pub const REMOVED_FROM_CART: &str = "Đã xóa khỏi giỏ hàng";
    pub const REMOVE_FAILED: &str = "Không thể xóa sản phẩm";
    pub const QUANTITY_UPDATED: &str = "Đã cập nhật số lượng";
    pub const QUANTITY_UPDATE_FAILED: &str = "Không thể cập nhật số lượng";
    pub const CHECKOUT_UNAVAILABLE: &str = "Tính năng thanh toán đang được phát triển";
    pub const SIGNED_IN: &str = "Đăng nhập thành công";
    pub const SIGN_IN_FAILED: &str = "Đăng nhập thất bại";
    pub const SIGNED_OUT: &str = "Đã đăng xuất";
    pub const SIGN_OUT_FAILED: &str = "Không thể đăng xuất";
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_notices_are_shown_once_in_order() {
        let session = session();
        flash(&session, Notice::error(messages::REMOVE_FAILED)).await;
        flash(&session, Notice::success(messages::ADDED_TO_CART)).await;

        let notices = take(&session).await;
        assert_eq!(
            notices,
            vec![
                Notice::error(messages::REMOVE_FAILED),
                Notice::success(messages::ADDED_TO_CART),
            ]
        );
        assert!(take(&session).await.is_empty());
    }

    #[test]
    fn test_presentation() {
        let notice = Notice::error(messages::CART_LOAD_FAILED);
        assert_eq!(notice.css_class(), "notice--error");
        assert_eq!(notice.role(), "alert");
        assert_eq!(Notice::info("x").role(), "status");
    }
}
