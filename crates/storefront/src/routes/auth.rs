//! Authentication route handlers.
//!
//! Sign-in itself happens on the hosted auth page. The storefront sends
//! shoppers there with a PKCE challenge, exchanges the code it hands back
//! and signs out.

use axum::{
    extract::{Query, State},
    response::Redirect,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::notice::{self, Notice, messages};
use crate::services::auth::{AuthError, SessionManager, pkce};
use crate::state::AppState;

const HOME_PATH: &str = "/";

/// Parameters the hosted auth page appends to the callback URL.
#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackQuery {
    fn auth_code(&self) -> Option<&str> {
        self.code.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// Send the shopper to the hosted sign-in page.
#[instrument(skip_all)]
pub async fn sign_in(State(state): State<AppState>, session: Session) -> Redirect {
    let challenge = match SessionManager::begin_sign_in(&session).await {
        Ok(challenge) => challenge,
        Err(e) => {
            tracing::error!(error = %e, "Could not start sign-in");
            notice::flash(&session, Notice::error(messages::SIGN_IN_FAILED)).await;
            return Redirect::to(HOME_PATH);
        }
    };

    let config = state.config();
    let mut url = config.supabase.auth_url.clone();
    url.query_pairs_mut()
        .append_pair("provider", &config.supabase.auth_provider)
        .append_pair("redirect_to", &config.auth_callback_url())
        .append_pair("code_challenge", &challenge)
        .append_pair("code_challenge_method", pkce::CHALLENGE_METHOD);
    Redirect::to(url.as_str())
}

/// Exchange the code from the hosted sign-in page for a session.
#[instrument(skip_all)]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Redirect {
    if let Some(error) = &query.error {
        tracing::warn!(
            error = %error,
            description = query.error_description.as_deref().unwrap_or_default(),
            "Sign-in returned an error"
        );
        notice::flash(&session, Notice::error(messages::SIGN_IN_FAILED)).await;
        return Redirect::to(HOME_PATH);
    }

    let Some(code) = query.auth_code() else {
        tracing::warn!("Sign-in callback without a code");
        notice::flash(&session, Notice::error(messages::SIGN_IN_FAILED)).await;
        return Redirect::to(HOME_PATH);
    };

    match state.sessions().complete_sign_in(&session, code).await {
        Ok(_) => notice::flash(&session, Notice::success(messages::SIGNED_IN)).await,
        Err(e) => {
            tracing::warn!(error = %e, "Sign-in rejected");
            notice::flash(&session, Notice::error(messages::SIGN_IN_FAILED)).await;
        }
    }

    Redirect::to(HOME_PATH)
}

/// Sign out remotely and locally, then go home.
///
/// The local session is cleared even when the remote call fails; the
/// failure is still reported to the shopper.
#[instrument(skip_all)]
pub async fn sign_out(State(state): State<AppState>, session: Session) -> Redirect {
    match state.sessions().sign_out(&session).await {
        Ok(()) => notice::flash(&session, Notice::success(messages::SIGNED_OUT)).await,
        Err(AuthError::NotSignedIn) => {}
        Err(e) => {
            tracing::error!(error = %e, "Sign-out failed");
            notice::flash(&session, Notice::error(messages::SIGN_OUT_FAILED)).await;
        }
    }

    Redirect::to(HOME_PATH)
}
