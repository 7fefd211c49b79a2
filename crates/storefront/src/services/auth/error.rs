//! Authentication error types.

use thiserror::Error;

use crate::supabase::SupabaseError;

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The auth service rejected the access or refresh token.
    #[error("invalid or expired token")]
    InvalidToken,

    /// The auth service could not be reached or failed.
    #[error("auth provider error: {0}")]
    Provider(#[from] SupabaseError),

    /// Cookie session storage failed.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// The action needs a signed-in shopper.
    #[error("not signed in")]
    NotSignedIn,

    /// A sign-in callback arrived without a sign-in started in this browser.
    #[error("no sign-in in progress")]
    NoPendingSignIn,
}

impl AuthError {
    /// Classify a provider error, separating rejected tokens from outages.
    #[must_use]
    pub fn from_provider(error: SupabaseError) -> Self {
        if error.is_unauthorized() {
            return Self::InvalidToken;
        }
        match error {
            SupabaseError::Api { status, .. } if status == reqwest::StatusCode::BAD_REQUEST => {
                Self::InvalidToken
            }
            other => Self::Provider(other),
        }
    }
}
