//! Session service.
//!
//! Authentication itself happens on an external page. This module starts
//! that round trip with a PKCE challenge, exchanges the returned code for
//! tokens, keeps them in the cookie session and refreshes them when they
//! expire. It also signs out and tells open tabs when the session changes.

mod error;
mod events;
pub mod pkce;

pub use error::AuthError;
pub use events::{SessionChange, SessionEvents};
pub use pkce::CodeVerifier;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::Stream;
use tower_sessions::Session;
use tracing::instrument;

use luxury_jewelry_core::ClientId;

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::models::session::keys;
use crate::models::{AuthUser, CurrentUser, SessionTokens};

/// The external session capability.
///
/// Injected into [`SessionManager`] so tests and alternative providers can
/// stand in for the hosted auth service.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Resolve the user behind an access token.
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError>;

    /// Exchange a refresh token for a new token pair.
    async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, AuthError>;

    /// Exchange a sign-in code and its PKCE verifier for a token pair.
    async fn exchange_code(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<SessionTokens, AuthError>;

    /// Revoke the session behind an access token.
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;
}

/// Per-request facade over the provider and the cookie session.
#[derive(Clone)]
pub struct SessionManager {
    provider: Arc<dyn SessionProvider>,
    events: SessionEvents,
}

impl SessionManager {
    #[must_use]
    pub fn new(provider: Arc<dyn SessionProvider>, events: SessionEvents) -> Self {
        Self { provider, events }
    }

    #[must_use]
    pub const fn events(&self) -> &SessionEvents {
        &self.events
    }

    /// The browser's client id, minted on first use.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Session` if the session store fails.
    pub async fn client_id(session: &Session) -> Result<ClientId, AuthError> {
        if let Some(id) = session.get::<ClientId>(keys::CLIENT_ID).await? {
            return Ok(id);
        }
        let id = ClientId::generate();
        session.insert(keys::CLIENT_ID, id).await?;
        Ok(id)
    }

    /// The signed-in shopper, if any.
    ///
    /// Expired tokens are refreshed transparently. A session whose refresh
    /// is rejected is dropped and reported as signed out.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Session` if the session store fails, or
    /// `AuthError::Provider` if the auth service is unreachable while a
    /// refresh is due.
    #[instrument(skip_all)]
    pub async fn current(&self, session: &Session) -> Result<Option<CurrentUser>, AuthError> {
        let Some(user) = session.get::<CurrentUser>(keys::CURRENT_USER).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        if !user.needs_refresh(now) {
            return Ok(Some(user));
        }

        match self.provider.refresh(user.refresh_token()).await {
            Ok(tokens) => {
                let user = user.refreshed(tokens, now);
                session.insert(keys::CURRENT_USER, &user).await?;
                tracing::debug!(user_id = %user.id, "Refreshed access token");
                Ok(Some(user))
            }
            Err(AuthError::InvalidToken) => {
                tracing::info!(user_id = %user.id, "Refresh rejected, dropping session");
                session.remove::<CurrentUser>(keys::CURRENT_USER).await?;
                let client = Self::client_id(session).await?;
                self.events.publish(client, SessionChange::SignedOut);
                clear_sentry_user();
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Start a hosted sign-in: remember a fresh verifier, return its challenge.
    ///
    /// Starting again replaces any verifier from an earlier attempt.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Session` if the session store fails.
    pub async fn begin_sign_in(session: &Session) -> Result<String, AuthError> {
        let verifier = CodeVerifier::generate();
        session.insert(keys::PKCE_VERIFIER, &verifier).await?;
        Ok(verifier.challenge())
    }

    /// Finish a hosted sign-in by exchanging the callback's code.
    ///
    /// The verifier is consumed whatever the outcome, so a code can be tried
    /// once per started sign-in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NoPendingSignIn` if this browser never started a
    /// sign-in, `AuthError::InvalidToken` if the provider rejects the code,
    /// or another error if the provider or session store fails.
    #[instrument(skip_all)]
    pub async fn complete_sign_in(
        &self,
        session: &Session,
        auth_code: &str,
    ) -> Result<CurrentUser, AuthError> {
        let Some(verifier) = session.remove::<CodeVerifier>(keys::PKCE_VERIFIER).await? else {
            return Err(AuthError::NoPendingSignIn);
        };
        let tokens = self
            .provider
            .exchange_code(auth_code, verifier.as_str())
            .await?;
        self.sign_in(session, tokens).await
    }

    /// Validate a token pair from the auth service and store it.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the provider rejects the access
    /// token, or another error if the provider or session store fails.
    #[instrument(skip_all)]
    pub async fn sign_in(
        &self,
        session: &Session,
        tokens: SessionTokens,
    ) -> Result<CurrentUser, AuthError> {
        let auth_user = self.provider.get_user(&tokens.access_token).await?;
        let user = CurrentUser::new(auth_user, tokens, Utc::now());

        // Fresh id on privilege change; stored data carries over
        session.cycle_id().await?;
        session.insert(keys::CURRENT_USER, &user).await?;

        let client = Self::client_id(session).await?;
        self.events.publish(
            client,
            SessionChange::SignedIn { user_id: user.id },
        );
        set_sentry_user(&user.id, user.email.as_deref());

        tracing::info!(user_id = %user.id, "Shopper signed in");
        Ok(user)
    }

    /// Sign out remotely and locally.
    ///
    /// The local session is always cleared and the change published; the
    /// remote result is returned so callers can surface a failure.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotSignedIn` if nobody was signed in, or the
    /// provider's error if remote sign-out failed.
    #[instrument(skip_all)]
    pub async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        let Some(user) = session.remove::<CurrentUser>(keys::CURRENT_USER).await? else {
            return Err(AuthError::NotSignedIn);
        };

        let client = Self::client_id(session).await?;
        self.events.publish(client, SessionChange::SignedOut);
        clear_sentry_user();

        let result = self.provider.sign_out(user.access_token()).await;
        match &result {
            Ok(()) => tracing::info!(user_id = %user.id, "Shopper signed out"),
            // An already-invalid token means the remote session is gone anyway
            Err(AuthError::InvalidToken) => return Ok(()),
            Err(e) => tracing::warn!(user_id = %user.id, error = %e, "Remote sign-out failed"),
        }
        result
    }

    /// Session changes for this browser, until the stream is dropped.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Session` if the session store fails.
    pub async fn subscribe(
        &self,
        session: &Session,
    ) -> Result<impl Stream<Item = SessionChange> + Send + use<>, AuthError> {
        let client = Self::client_id(session).await?;
        Ok(self.events.subscribe(client))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::pin::pin;
    use std::sync::Mutex;

    use futures::StreamExt;
    use luxury_jewelry_core::UserId;
    use tower_sessions::MemoryStore;

    use super::*;

    #[derive(Default)]
    struct FakeProvider {
        user_id: Option<UserId>,
        refresh_ok: bool,
        sign_out_fails: bool,
        signed_out: Mutex<Vec<String>>,
        pending_challenge: Mutex<Option<String>>,
    }

    #[async_trait]
    impl SessionProvider for FakeProvider {
        async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
            match (self.user_id, access_token) {
                (Some(id), "good") => Ok(AuthUser {
                    id,
                    email: Some("khach@example.vn".to_string()),
                }),
                _ => Err(AuthError::InvalidToken),
            }
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<SessionTokens, AuthError> {
            if self.refresh_ok {
                Ok(tokens("refreshed", 3600))
            } else {
                Err(AuthError::InvalidToken)
            }
        }

        async fn exchange_code(
            &self,
            auth_code: &str,
            code_verifier: &str,
        ) -> Result<SessionTokens, AuthError> {
            let pending = self.pending_challenge.lock().unwrap().take();
            match pending {
                Some(challenge)
                    if auth_code == "good-code" && pkce::challenge(code_verifier) == challenge =>
                {
                    Ok(tokens("good", 3600))
                }
                _ => Err(AuthError::InvalidToken),
            }
        }

        async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
            self.signed_out
                .lock()
                .unwrap()
                .push(access_token.to_string());
            if self.sign_out_fails {
                Err(AuthError::Provider(crate::supabase::SupabaseError::RateLimited(1)))
            } else {
                Ok(())
            }
        }
    }

    fn tokens(access: &str, expires_in: i64) -> SessionTokens {
        SessionTokens {
            access_token: access.to_string(),
            refresh_token: "refresh".to_string(),
            expires_in,
        }
    }

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    fn manager(provider: FakeProvider) -> (SessionManager, Arc<FakeProvider>) {
        let provider = Arc::new(provider);
        let manager = SessionManager::new(provider.clone(), SessionEvents::new());
        (manager, provider)
    }

    #[tokio::test]
    async fn test_sign_in_stores_user_and_notifies() {
        let user_id = UserId::generate();
        let (manager, _) = manager(FakeProvider {
            user_id: Some(user_id),
            ..Default::default()
        });
        let session = session();
        let mut changes = pin!(manager.subscribe(&session).await.unwrap());

        let user = manager.sign_in(&session, tokens("good", 3600)).await.unwrap();
        assert_eq!(user.id, user_id);
        assert_eq!(
            manager.current(&session).await.unwrap().unwrap().id,
            user_id
        );
        assert_eq!(
            changes.next().await.unwrap(),
            SessionChange::SignedIn { user_id }
        );
    }

    #[tokio::test]
    async fn test_code_exchange_signs_in_with_matching_verifier() {
        let user_id = UserId::generate();
        let (manager, provider) = manager(FakeProvider {
            user_id: Some(user_id),
            ..Default::default()
        });
        let session = session();

        let challenge = SessionManager::begin_sign_in(&session).await.unwrap();
        *provider.pending_challenge.lock().unwrap() = Some(challenge);

        let user = manager.complete_sign_in(&session, "good-code").await.unwrap();
        assert_eq!(user.id, user_id);
        assert!(
            session
                .get::<CodeVerifier>(keys::PKCE_VERIFIER)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_code_exchange_requires_started_sign_in() {
        let (manager, provider) = manager(FakeProvider {
            user_id: Some(UserId::generate()),
            ..Default::default()
        });
        // A code issued for another browser's challenge
        let other = session();
        let challenge = SessionManager::begin_sign_in(&other).await.unwrap();
        *provider.pending_challenge.lock().unwrap() = Some(challenge);

        let session = session();
        let err = manager.complete_sign_in(&session, "good-code").await.unwrap_err();
        assert!(matches!(err, AuthError::NoPendingSignIn));

        SessionManager::begin_sign_in(&session).await.unwrap();
        let err = manager.complete_sign_in(&session, "good-code").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
        assert!(manager.current(&session).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_subscription_outlives_request_borrows() {
        let user_id = UserId::generate();
        let (manager, _) = manager(FakeProvider {
            user_id: Some(user_id),
            ..Default::default()
        });
        let session = session();

        let stream = {
            let request_manager = manager.clone();
            let request_session = session.clone();
            request_manager.subscribe(&request_session).await.unwrap()
        };
        let listener = tokio::spawn(async move {
            let mut stream = pin!(stream);
            stream.next().await
        });

        manager.sign_in(&session, tokens("good", 3600)).await.unwrap();
        assert_eq!(
            listener.await.unwrap(),
            Some(SessionChange::SignedIn { user_id })
        );
    }

    #[tokio::test]
    async fn test_sign_in_rejects_bad_token() {
        let (manager, _) = manager(FakeProvider {
            user_id: Some(UserId::generate()),
            ..Default::default()
        });
        let session = session();
        let err = manager.sign_in(&session, tokens("forged", 3600)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
        assert!(manager.current(&session).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed() {
        let (manager, _) = manager(FakeProvider {
            user_id: Some(UserId::generate()),
            refresh_ok: true,
            ..Default::default()
        });
        let session = session();
        manager.sign_in(&session, tokens("good", 0)).await.unwrap();

        let user = manager.current(&session).await.unwrap().unwrap();
        assert_eq!(user.access_token(), "refreshed");
    }

    #[tokio::test]
    async fn test_rejected_refresh_signs_out() {
        let (manager, _) = manager(FakeProvider {
            user_id: Some(UserId::generate()),
            ..Default::default()
        });
        let session = session();
        manager.sign_in(&session, tokens("good", 0)).await.unwrap();
        let mut changes = pin!(manager.subscribe(&session).await.unwrap());

        assert!(manager.current(&session).await.unwrap().is_none());
        assert_eq!(changes.next().await.unwrap(), SessionChange::SignedOut);
    }

    #[tokio::test]
    async fn test_sign_out_clears_locally_even_when_remote_fails() {
        let (manager, provider) = manager(FakeProvider {
            user_id: Some(UserId::generate()),
            sign_out_fails: true,
            ..Default::default()
        });
        let session = session();
        manager.sign_in(&session, tokens("good", 3600)).await.unwrap();

        let result = manager.sign_out(&session).await;
        assert!(matches!(result, Err(AuthError::Provider(_))));
        assert!(manager.current(&session).await.unwrap().is_none());
        assert_eq!(provider.signed_out.lock().unwrap().as_slice(), ["good"]);
    }

    #[tokio::test]
    async fn test_sign_out_without_session() {
        let (manager, provider) = manager(FakeProvider::default());
        let err = manager.sign_out(&session()).await.unwrap_err();
        assert!(matches!(err, AuthError::NotSignedIn));
        assert!(provider.signed_out.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_client_id_is_stable() {
        let session = session();
        let first = SessionManager::client_id(&session).await.unwrap();
        let second = SessionManager::client_id(&session).await.unwrap();
        assert_eq!(first, second);
    }
}
