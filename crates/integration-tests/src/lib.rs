//! Integration test harness for the Luxury Jewelry storefront.
//!
//! Drives the full router in-process: real middleware, templates and
//! sessions, with the hosted services replaced by [`MemoryStore`] and
//! [`FakeProvider`].
//!
//! ```rust,ignore
//! let ctx = TestContext::new();
//! let mut client = ctx.client();
//! client.sign_in().await;
//! let resp = client.get("/cart").await;
//! assert_eq!(resp.status, StatusCode::OK);
//! ```

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use secrecy::SecretString;
use tower::ServiceExt;
use tracing_subscriber::fmt::MakeWriter;
use url::Url;

use luxury_jewelry_core::{CurrencyCode, Stock, UserId};
use luxury_jewelry_storefront::config::{LogFormat, StorefrontConfig, SupabaseConfig};
use luxury_jewelry_storefront::content::ContentStore;
use luxury_jewelry_storefront::db::{CatalogRepository, MemoryStore};
use luxury_jewelry_storefront::models::{AuthUser, NewProduct, Product, SessionTokens};
use luxury_jewelry_storefront::services::auth::{AuthError, SessionProvider, pkce};
use luxury_jewelry_storefront::state::AppState;

/// Access token the fake provider accepts.
pub const VALID_TOKEN: &str = "valid-access-token";

/// Address sent as `x-forwarded-for` so rate limiters can key requests.
const CLIENT_IP: &str = "203.0.113.10";

/// Session provider that accepts exactly [`VALID_TOKEN`] and plays the
/// hosted sign-in page through [`FakeProvider::authorize`].
#[derive(Debug)]
pub struct FakeProvider {
    pub user_id: UserId,
    sign_out_fails: AtomicBool,
    /// Issued sign-in codes and the challenge each was issued for.
    codes: Mutex<HashMap<String, String>>,
    next_code: AtomicUsize,
}

impl FakeProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            user_id: UserId::generate(),
            sign_out_fails: AtomicBool::new(false),
            codes: Mutex::new(HashMap::new()),
            next_code: AtomicUsize::new(1),
        }
    }

    /// Sign in on the hosted page the storefront redirected to and return
    /// the code it would append to the callback URL.
    pub fn authorize(&self, location: &str) -> String {
        let url = Url::parse(location).unwrap();
        let param = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };
        assert!(param("provider").is_some_and(|p| !p.is_empty()));
        assert_eq!(param("code_challenge_method").as_deref(), Some("s256"));
        let challenge = param("code_challenge").unwrap();

        let code = format!("code-{}", self.next_code.fetch_add(1, Ordering::SeqCst));
        self.codes.lock().unwrap().insert(code.clone(), challenge);
        code
    }

    /// Make remote sign-out fail with a service error.
    pub fn fail_sign_out(&self) {
        self.sign_out_fails.store(true, Ordering::SeqCst);
    }
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionProvider for FakeProvider {
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        if access_token == VALID_TOKEN {
            Ok(AuthUser {
                id: self.user_id,
                email: Some("khach@example.vn".to_string()),
            })
        } else {
            Err(AuthError::InvalidToken)
        }
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<SessionTokens, AuthError> {
        Err(AuthError::InvalidToken)
    }

    async fn exchange_code(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<SessionTokens, AuthError> {
        // Codes are single use, matched or not
        let challenge = self.codes.lock().unwrap().remove(auth_code);
        match challenge {
            Some(challenge) if pkce::challenge(code_verifier) == challenge => Ok(SessionTokens {
                access_token: VALID_TOKEN.to_string(),
                refresh_token: "refresh".to_string(),
                expires_in: 3600,
            }),
            _ => Err(AuthError::InvalidToken),
        }
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), AuthError> {
        if self.sign_out_fails.load(Ordering::SeqCst) {
            Err(AuthError::Provider(
                luxury_jewelry_storefront::supabase::SupabaseError::RateLimited(1),
            ))
        } else {
            Ok(())
        }
    }
}

/// Storefront configuration pointing at unreachable placeholder services.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    let url = Url::parse("https://project.supabase.test/").unwrap();
    StorefrontConfig {
        host: [127, 0, 0, 1].into(),
        port: 3000,
        base_url: "http://localhost:3000".to_string(),
        supabase: SupabaseConfig {
            auth_url: url.join("auth/v1/authorize").unwrap(),
            auth_provider: "google".to_string(),
            url,
            api_key: SecretString::from("test-anon-key"),
        },
        currency: CurrencyCode::VND,
        log_format: LogFormat::Text,
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// One app instance with its in-memory backends.
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub provider: Arc<FakeProvider>,
    pub app: Router,
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::new());
        let content = ContentStore::from_sources([(
            "about",
            "---\ntitle: Về chúng tôi\n---\n\n## Câu chuyện của chúng tôi\n",
        )])
        .unwrap();
        let state = AppState::from_parts(
            test_config(),
            store.clone(),
            store.clone(),
            provider.clone(),
            content,
        );

        Self {
            store,
            provider,
            app: luxury_jewelry_storefront::app(state),
        }
    }

    /// A browser with an empty cookie jar.
    #[must_use]
    pub fn client(&self) -> TestClient {
        TestClient {
            app: self.app.clone(),
            provider: self.provider.clone(),
            cookie: None,
        }
    }

    /// Insert a product and return it.
    pub async fn product(&self, name: &str, price: i64, stock: u32, featured: bool) -> Product {
        self.store
            .insert_product(&NewProduct {
                name: name.to_string(),
                description: Some(format!("Mô tả {name}")),
                price: Decimal::from(price),
                image_url: None,
                stock: Stock::new(stock),
                featured,
            })
            .await
            .unwrap()
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A collected response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    /// The `Location` header of a redirect.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }
}

/// Sends requests through the router, carrying the session cookie along.
pub struct TestClient {
    app: Router,
    provider: Arc<FakeProvider>,
    cookie: Option<String>,
}

impl TestClient {
    pub async fn get(&mut self, uri: &str) -> TestResponse {
        let request = Request::get(uri);
        self.send(request, Body::empty()).await
    }

    pub async fn post_form(&mut self, uri: &str, form: &str) -> TestResponse {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        self.send(request, Body::from(form.to_string())).await
    }

    /// Start a sign-in and return the code the hosted page hands back.
    pub async fn start_sign_in(&mut self) -> String {
        let resp = self.get("/auth").await;
        assert_eq!(resp.status, StatusCode::SEE_OTHER);
        self.provider.authorize(resp.location().unwrap())
    }

    /// Complete the hosted sign-in round trip.
    pub async fn sign_in(&mut self) -> TestResponse {
        let code = self.start_sign_in().await;
        let resp = self.get(&format!("/auth/callback?code={code}")).await;
        assert_eq!(resp.status, StatusCode::SEE_OTHER);
        resp
    }

    /// Follow a redirect with a GET, as a browser would.
    pub async fn follow(&mut self, resp: &TestResponse) -> TestResponse {
        let location = resp.location().unwrap().to_string();
        self.get(&location).await
    }

    async fn send(&mut self, builder: axum::http::request::Builder, body: Body) -> TestResponse {
        let mut builder = builder.header("x-forwarded-for", CLIENT_IP);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        if let Some(cookie) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
        {
            self.cookie = Some(cookie.to_string());
        }

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();

        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}

/// Log output collected in memory, for asserting what never gets logged.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Install a capturing subscriber for the current thread.
    ///
    /// `#[tokio::test]` runs on a single thread, so every span and event of
    /// a request driven through [`TestClient`] lands here.
    #[must_use]
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(capture.clone())
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
