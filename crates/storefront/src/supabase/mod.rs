//! Clients for the hosted data and auth service.
//!
//! # Architecture
//!
//! - The hosted service (Supabase) is the source of truth - NO local copy,
//!   NO cache, every page load goes straight to the API
//! - Row-level security scopes cart rows to the signed-in shopper, so
//!   requests made on a shopper's behalf carry their access token
//!
//! # APIs
//!
//! ## REST (`/rest/v1`)
//! - `products` and `cart_items` tables, filtered and ordered with
//!   PostgREST query parameters
//! - `rpc/add_to_cart` for the atomic add-or-increment
//!
//! ## Auth (`/auth/v1`)
//! - Validate access tokens, refresh sessions, sign out
//!
//! # Example
//!
//! ```rust,ignore
//! use luxury_jewelry_storefront::supabase::{DataClient, Direction, Query};
//!
//! let client = DataClient::new(&config.supabase)?;
//! let products: Vec<Product> = client
//!     .fetch_all("products", &Query::new().order("created_at", Direction::Descending))
//!     .await?;
//! ```

mod auth;
mod rest;

pub use auth::GoTrueClient;
pub use rest::{DataClient, Direction, Query};

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when interacting with the hosted service.
#[derive(Debug, Error)]
pub enum SupabaseError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with an error status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status returned by the service.
        status: StatusCode,
        /// Error code reported by the service, if any.
        code: Option<String>,
        /// Human-readable message.
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the service.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// A URL could not be built from the configured base.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl SupabaseError {
    /// Whether the service rejected the credentials we sent.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Api { status, .. }
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
        )
    }
}

/// Error body shapes returned by the REST and auth services.
///
/// REST errors use `message`/`code`; auth errors use `msg`, `error_description`
/// or `error`, with a numeric or string `code`.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Turn a non-success response body into a [`SupabaseError::Api`].
fn api_error(status: StatusCode, body: &str) -> SupabaseError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

    let code = parsed.code.map(|c| match c {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    });

    let message = parsed
        .message
        .or(parsed.msg)
        .or(parsed.error_description)
        .or(parsed.error)
        .unwrap_or_else(|| body.chars().take(200).collect());

    SupabaseError::Api {
        status,
        code,
        message,
    }
}

/// Read `Retry-After` (seconds) from a 429 response, defaulting to 1.
fn retry_after(response: &reqwest::Response) -> u64 {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(1)
}
