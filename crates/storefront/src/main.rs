//! Luxury Jewelry storefront binary.
//!
//! Serves the public shop on port 3000 by default.
//!
//! # Architecture
//!
//! - Axum web framework, Askama templates rendered on the server
//! - Hosted PostgREST endpoint for products and carts
//! - Hosted auth service for sessions; the sign-in page itself is external

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use luxury_jewelry_storefront::config::{LogFormat, StorefrontConfig};
use luxury_jewelry_storefront::state::AppState;
use luxury_jewelry_storefront::{CONTENT_DIR, app};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            before_send: Some(Arc::new(|mut event: sentry::protocol::Event<'static>| {
                if let Some(request) = event.request.as_mut() {
                    strip_query(request);
                }
                Some(event)
            })),
            before_send_transaction: Some(Arc::new(
                |mut transaction: sentry::protocol::Transaction<'static>| {
                    if let Some(request) = transaction.request.as_mut() {
                        strip_query(request);
                    }
                    Some(transaction)
                },
            )),
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Drop the query string from a captured request; the auth callback
/// carries a sign-in code there.
fn strip_query(request: &mut sentry::protocol::Request) {
    if let Some(url) = request.url.as_mut() {
        url.set_query(None);
    }
    request.query_string = None;
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing(format: LogFormat) {
    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "luxury_jewelry_storefront=info,tower_http=debug".into());

    let fmt_layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer().boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);
    init_tracing(config.log_format);

    let state = AppState::new(config.clone(), Path::new(CONTENT_DIR))
        .expect("Failed to initialize application state");
    tracing::info!(pages = state.content().len(), "Content loaded");

    let app = app(state);

    let addr = config.socket_addr();
    tracing::info!("storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_query_removes_sign_in_code() {
        let mut request = sentry::protocol::Request {
            url: Some("https://shop.example/auth/callback?code=secret".parse().unwrap()),
            query_string: Some("code=secret".to_string()),
            ..Default::default()
        };

        strip_query(&mut request);

        assert_eq!(
            request.url.unwrap().as_str(),
            "https://shop.example/auth/callback"
        );
        assert!(request.query_string.is_none());
    }
}
