//! Session-related types.
//!
//! Types stored in the cookie session for authentication state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use luxury_jewelry_core::UserId;

/// Access tokens are refreshed this long before they actually expire.
const EXPIRY_LEEWAY_SECS: i64 = 60;

/// Identity reported by the auth service for a valid access token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

/// Token pair issued by the auth service.
#[derive(Clone, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime of `access_token` in seconds.
    pub expires_in: i64,
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Session-stored user identity.
///
/// Holds the tokens needed to act on the shopper's behalf so row-level
/// security on the data service sees who is asking.
#[derive(Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Auth service user ID.
    pub id: UserId,
    /// Email, when the provider shares one.
    pub email: Option<String>,
    access_token: String,
    refresh_token: String,
    /// When `access_token` stops being accepted.
    pub expires_at: DateTime<Utc>,
}

impl CurrentUser {
    /// Build the session identity from a validated user and their tokens.
    #[must_use]
    pub fn new(user: AuthUser, tokens: SessionTokens, now: DateTime<Utc>) -> Self {
        Self {
            id: user.id,
            email: user.email,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: now + Duration::seconds(tokens.expires_in.max(0)),
        }
    }

    /// Swap in a refreshed token pair, keeping the identity.
    #[must_use]
    pub fn refreshed(self, tokens: SessionTokens, now: DateTime<Utc>) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: now + Duration::seconds(tokens.expires_in.max(0)),
            ..self
        }
    }

    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    #[must_use]
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// Whether the access token is expired or about to be.
    #[must_use]
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_LEEWAY_SECS) >= self.expires_at
    }

    /// Label for the header: email when known, otherwise the short user id.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.email.clone().unwrap_or_else(|| {
            let id = self.id.to_string();
            id.chars().take(8).collect()
        })
    }
}

impl std::fmt::Debug for CurrentUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrentUser")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current signed-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the per-browser client id used to route session events.
    pub const CLIENT_ID: &str = "client_id";

    /// Key for the PKCE verifier of a sign-in in progress.
    pub const PKCE_VERIFIER: &str = "pkce_verifier";

    /// Key for pending flash notices.
    pub const NOTICES: &str = "notices";
}
