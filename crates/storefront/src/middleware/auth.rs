//! Session extractors for route handlers.
//!
//! Both extractors go through [`SessionManager::current`], so an expired
//! access token is refreshed before the handler sees it.
//!
//! [`SessionManager::current`]: crate::services::auth::SessionManager::current

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::CurrentUser;
use crate::notice::{self, Notice, messages};
use crate::state::AppState;

/// Where shoppers are sent to sign in.
pub const SIGN_IN_PATH: &str = "/auth";

/// Extractor that requires a signed-in shopper.
///
/// Without a session the request is redirected to the sign-in entry point
/// with a notice explaining why.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.display_name())
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        match state.sessions().current(&session).await {
            Ok(Some(user)) => Ok(Self(user)),
            Ok(None) => {
                notice::flash(&session, Notice::error(messages::SIGN_IN_FOR_CART)).await;
                Err(Redirect::to(SIGN_IN_PATH).into_response())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not resolve session");
                notice::flash(&session, Notice::error(messages::SIGN_IN_FOR_CART)).await;
                Err(Redirect::to(SIGN_IN_PATH).into_response())
            }
        }
    }
}

/// Extractor that optionally gets the signed-in shopper.
///
/// Never rejects: a session that cannot be resolved counts as signed out.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Ok(session) = Session::from_request_parts(parts, state).await else {
            return Ok(Self(None));
        };

        let user = state
            .sessions()
            .current(&session)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Could not resolve session");
                None
            });

        Ok(Self(user))
    }
}
