//! Integration tests for add-to-cart and the cart page.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use luxury_jewelry_core::Stock;
use luxury_jewelry_integration_tests::TestContext;

// =============================================================================
// Add to cart
// =============================================================================

#[tokio::test]
async fn test_add_requires_session_and_writes_nothing() {
    let ctx = TestContext::new();
    let product = ctx.product("Nhẫn", 1_000_000, 5, false).await;
    let mut client = ctx.client();

    let resp = client
        .post_form(&format!("/product/{}/cart", product.id), "quantity=1")
        .await;

    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), Some("/auth"));
    assert!(ctx.store.lines_for(ctx.provider.user_id).is_empty());
}

#[tokio::test]
async fn test_out_of_stock_add_issues_no_mutation() {
    let ctx = TestContext::new();
    let product = ctx.product("Lắc tay", 1_000_000, 0, false).await;
    let mut client = ctx.client();
    client.sign_in().await;

    let resp = client
        .post_form(&format!("/product/{}/cart", product.id), "quantity=1")
        .await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert!(ctx.store.lines_for(ctx.provider.user_id).is_empty());

    let page = client.follow(&resp).await;
    assert!(page.body.contains("Sản phẩm đã hết hàng"));
}

#[tokio::test]
async fn test_adding_twice_increments_single_line() {
    let ctx = TestContext::new();
    let product = ctx.product("Nhẫn", 1_000_000, 10, false).await;
    let mut client = ctx.client();
    client.sign_in().await;

    let uri = format!("/product/{}/cart", product.id);
    client.post_form(&uri, "quantity=2").await;
    let resp = client.post_form(&uri, "quantity=1").await;

    let lines = ctx.store.lines_for(ctx.provider.user_id);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity.get(), 3);

    let page = client.follow(&resp).await;
    assert!(page.body.contains("Đã thêm vào giỏ hàng!"));
}

#[tokio::test]
async fn test_requested_quantity_is_clamped_to_stock() {
    let ctx = TestContext::new();
    let product = ctx.product("Nhẫn", 1_000_000, 4, false).await;
    let mut client = ctx.client();
    client.sign_in().await;

    client
        .post_form(&format!("/product/{}/cart", product.id), "quantity=99")
        .await;

    let lines = ctx.store.lines_for(ctx.provider.user_id);
    assert_eq!(lines[0].quantity.get(), 4);
}

#[tokio::test]
async fn test_add_during_outage_returns_to_listing() {
    let ctx = TestContext::new();
    let product = ctx.product("Nhẫn", 1_000_000, 4, false).await;
    let mut client = ctx.client();
    client.sign_in().await;

    ctx.store.set_offline(true);
    let resp = client
        .post_form(&format!("/product/{}/cart", product.id), "quantity=1")
        .await;
    ctx.store.set_offline(false);

    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), Some("/products"));
    let page = client.follow(&resp).await;
    assert!(page.body.contains("Không thể tải sản phẩm"));
}

// =============================================================================
// Cart page
// =============================================================================

#[tokio::test]
async fn test_cart_requires_session() {
    let ctx = TestContext::new();
    let mut client = ctx.client();

    let resp = client.get("/cart").await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), Some("/auth"));

    let resp = client.get("/checkout").await;
    assert_eq!(resp.location(), Some("/auth"));
}

#[tokio::test]
async fn test_cart_subtotal_is_sum_of_lines() {
    let ctx = TestContext::new();
    let ring = ctx.product("Nhẫn", 1_000_000, 5, false).await;
    let chain = ctx.product("Dây chuyền", 500_000, 5, false).await;
    let mut client = ctx.client();
    client.sign_in().await;

    client
        .post_form(&format!("/product/{}/cart", ring.id), "quantity=2")
        .await;
    client
        .post_form(&format!("/product/{}/cart", chain.id), "quantity=1")
        .await;

    let resp = client.get("/cart").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.contains("2.500.000\u{a0}₫"));
    assert!(resp.body.contains("2.000.000\u{a0}₫"));
    assert!(resp.body.contains("Tạm tính (3 sản phẩm)"));
}

#[tokio::test]
async fn test_sold_out_line_has_no_quantity_form() {
    let ctx = TestContext::new();
    let ring = ctx.product("Nhẫn", 1_000_000, 5, false).await;
    let mut client = ctx.client();
    client.sign_in().await;
    client
        .post_form(&format!("/product/{}/cart", ring.id), "quantity=2")
        .await;

    ctx.store.set_stock(ring.id, Stock::new(0));

    let resp = client.get("/cart").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.contains("Hết hàng"));
    assert!(!resp.body.contains(r#"max="0""#));
    assert!(!resp.body.contains(r#"action="/cart/update""#));
    assert!(resp.body.contains(r#"action="/cart/remove""#));
}

#[tokio::test]
async fn test_empty_cart() {
    let ctx = TestContext::new();
    let mut client = ctx.client();
    client.sign_in().await;

    let resp = client.get("/cart").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.body.contains("Giỏ hàng trống"));
    assert!(resp.body.contains("Tiếp tục mua sắm"));
}

#[tokio::test]
async fn test_remove_deletes_exactly_one_line() {
    let ctx = TestContext::new();
    let ring = ctx.product("Nhẫn", 1_000_000, 5, false).await;
    let chain = ctx.product("Dây chuyền", 500_000, 5, false).await;
    let mut client = ctx.client();
    client.sign_in().await;

    for product in [&ring, &chain] {
        client
            .post_form(&format!("/product/{}/cart", product.id), "quantity=1")
            .await;
    }
    let lines = ctx.store.lines_for(ctx.provider.user_id);
    let target = lines.iter().find(|l| l.product_id == ring.id).unwrap();

    let resp = client
        .post_form("/cart/remove", &format!("line_id={}", target.id))
        .await;
    assert_eq!(resp.location(), Some("/cart"));

    let remaining = ctx.store.lines_for(ctx.provider.user_id);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].product_id, chain.id);

    let page = client.follow(&resp).await;
    assert!(page.body.contains("Đã xóa khỏi giỏ hàng"));
}

#[tokio::test]
async fn test_failed_remove_leaves_cart_unchanged() {
    let ctx = TestContext::new();
    let ring = ctx.product("Nhẫn", 1_000_000, 5, false).await;
    let mut client = ctx.client();
    client.sign_in().await;
    client
        .post_form(&format!("/product/{}/cart", ring.id), "quantity=1")
        .await;
    let line_id = ctx.store.lines_for(ctx.provider.user_id)[0].id;

    ctx.store.set_offline(true);
    let resp = client
        .post_form("/cart/remove", &format!("line_id={line_id}"))
        .await;
    ctx.store.set_offline(false);

    assert_eq!(ctx.store.lines_for(ctx.provider.user_id).len(), 1);
    let page = client.follow(&resp).await;
    assert!(page.body.contains("Không thể xóa sản phẩm"));
}

#[tokio::test]
async fn test_update_quantity_is_clamped() {
    let ctx = TestContext::new();
    let ring = ctx.product("Nhẫn", 1_000_000, 3, false).await;
    let mut client = ctx.client();
    client.sign_in().await;
    client
        .post_form(&format!("/product/{}/cart", ring.id), "quantity=1")
        .await;
    let line_id = ctx.store.lines_for(ctx.provider.user_id)[0].id;

    let resp = client
        .post_form("/cart/update", &format!("line_id={line_id}&quantity=50"))
        .await;
    assert_eq!(resp.location(), Some("/cart"));
    assert_eq!(ctx.store.lines_for(ctx.provider.user_id)[0].quantity.get(), 3);

    client
        .post_form("/cart/update", &format!("line_id={line_id}&quantity=0"))
        .await;
    assert_eq!(ctx.store.lines_for(ctx.provider.user_id)[0].quantity.get(), 1);
}

#[tokio::test]
async fn test_checkout_is_a_placeholder() {
    let ctx = TestContext::new();
    let mut client = ctx.client();
    client.sign_in().await;

    let resp = client.get("/checkout").await;
    assert_eq!(resp.location(), Some("/cart"));
    let page = client.follow(&resp).await;
    assert!(page.body.contains("Tính năng thanh toán đang được phát triển"));
}
