//! Integration tests for cross-cutting HTTP behaviour: health checks,
//! security headers and request ids.

#![allow(clippy::unwrap_used)]

use axum::http::{StatusCode, header};
use luxury_jewelry_integration_tests::TestContext;

#[tokio::test]
async fn test_health_endpoints() {
    let ctx = TestContext::new();
    let mut client = ctx.client();

    let resp = client.get("/health").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, "ok");

    let resp = client.get("/health/ready").await;
    assert_eq!(resp.status, StatusCode::OK);

    ctx.store.set_offline(true);
    let resp = client.get("/health/ready").await;
    assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_csp_nonce_matches_inline_script() {
    let ctx = TestContext::new();

    let resp = ctx.client().get("/").await;

    let csp = resp
        .headers
        .get(header::CONTENT_SECURITY_POLICY)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let start = csp.find("'nonce-").unwrap() + "'nonce-".len();
    let nonce = &csp[start..start + csp[start..].find('\'').unwrap()];

    assert!(resp.body.contains(&format!(r#"<script nonce="{nonce}">"#)));
    assert!(csp.contains("default-src 'none'"));
}

#[tokio::test]
async fn test_security_headers_present() {
    let ctx = TestContext::new();

    let resp = ctx.client().get("/products").await;

    assert_eq!(resp.headers.get(header::X_FRAME_OPTIONS).unwrap(), "DENY");
    assert_eq!(
        resp.headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
        "nosniff"
    );
    assert_eq!(
        resp.headers.get("cross-origin-embedder-policy").unwrap(),
        "credentialless"
    );
    assert!(resp.headers.get("permissions-policy").is_some());
}

#[tokio::test]
async fn test_session_cookie_flags() {
    let ctx = TestContext::new();
    let mut client = ctx.client();

    // A notice writes to the session, so a cookie is issued
    let resp = client.get("/cart").await;
    let cookie = resp
        .headers
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();

    assert!(cookie.starts_with("lj_session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    // Plain-http base URL in tests
    assert!(!cookie.contains("Secure"));
}

#[tokio::test]
async fn test_request_id_is_echoed_or_generated() {
    let ctx = TestContext::new();

    let resp = ctx.client().get("/health").await;
    let generated = resp.headers.get("x-request-id").unwrap().to_str().unwrap();
    assert_eq!(generated.len(), 36);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let ctx = TestContext::new();
    let resp = ctx.client().get("/khong-ton-tai").await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}
