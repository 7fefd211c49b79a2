//! GoTrue client for the `/auth/v1` API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use super::{SupabaseError, api_error, retry_after};
use crate::config::SupabaseConfig;
use crate::models::{AuthUser, SessionTokens};
use crate::services::auth::{AuthError, SessionProvider};

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct PkceRequest<'a> {
    auth_code: &'a str,
    code_verifier: &'a str,
}

/// Client for the hosted auth service.
#[derive(Clone)]
pub struct GoTrueClient {
    inner: Arc<GoTrueClientInner>,
}

struct GoTrueClientInner {
    client: reqwest::Client,
    api_url: Url,
    api_key: SecretString,
}

impl std::fmt::Debug for GoTrueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoTrueClient")
            .field("api_url", &self.inner.api_url.as_str())
            .finish_non_exhaustive()
    }
}

impl GoTrueClient {
    /// Create a client for the configured project.
    ///
    /// # Errors
    ///
    /// Returns an error if the auth endpoint cannot be derived from the
    /// project URL.
    pub fn new(config: &SupabaseConfig) -> Result<Self, SupabaseError> {
        Self::with_http_client(reqwest::Client::new(), config)
    }

    /// Create a client sharing an existing connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the auth endpoint cannot be derived from the
    /// project URL.
    pub fn with_http_client(
        client: reqwest::Client,
        config: &SupabaseConfig,
    ) -> Result<Self, SupabaseError> {
        Ok(Self {
            inner: Arc::new(GoTrueClientInner {
                client,
                api_url: config.url.join("auth/v1/")?,
                api_key: config.api_key.clone(),
            }),
        })
    }

    /// Fetch the user an access token belongs to.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Api` with 401 if the token is invalid.
    #[instrument(skip_all)]
    pub async fn user(&self, access_token: &str) -> Result<AuthUser, SupabaseError> {
        let request = self
            .inner
            .client
            .get(self.inner.api_url.join("user")?)
            .header("apikey", self.inner.api_key.expose_secret())
            .bearer_auth(access_token);
        Self::parse(request.send().await?).await
    }

    /// Exchange a refresh token for a new token pair.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Api` with 400 if the refresh token was
    /// revoked or already used.
    #[instrument(skip_all)]
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<SessionTokens, SupabaseError> {
        let request = self
            .inner
            .client
            .post(self.inner.api_url.join("token")?)
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", self.inner.api_key.expose_secret())
            .json(&RefreshRequest { refresh_token });
        Self::parse(request.send().await?).await
    }

    /// Exchange a sign-in code and its PKCE verifier for a token pair.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Api` with 400 or 404 if the code is unknown,
    /// expired, already used, or the verifier does not match its challenge.
    #[instrument(skip_all)]
    pub async fn exchange_pkce_code(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<SessionTokens, SupabaseError> {
        let request = self
            .inner
            .client
            .post(self.inner.api_url.join("token")?)
            .query(&[("grant_type", "pkce")])
            .header("apikey", self.inner.api_key.expose_secret())
            .json(&PkceRequest {
                auth_code,
                code_verifier,
            });
        Self::parse(request.send().await?).await
    }

    /// Revoke the session behind an access token.
    ///
    /// # Errors
    ///
    /// Returns an error if the service does not confirm the sign-out.
    #[instrument(skip_all)]
    pub async fn logout(&self, access_token: &str) -> Result<(), SupabaseError> {
        let response = self
            .inner
            .client
            .post(self.inner.api_url.join("logout")?)
            .header("apikey", self.inner.api_key.expose_secret())
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(Self::error(status, response).await)
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, SupabaseError> {
        let status = response.status();
        if !status.is_success() {
            return Err(Self::error(status, response).await);
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn error(status: StatusCode, response: reqwest::Response) -> SupabaseError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            return SupabaseError::RateLimited(retry_after(&response));
        }
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status = %status, "Auth API returned non-success status");
        api_error(status, &body)
    }
}

#[async_trait]
impl SessionProvider for GoTrueClient {
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        self.user(access_token)
            .await
            .map_err(AuthError::from_provider)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, AuthError> {
        self.refresh_session(refresh_token)
            .await
            .map_err(AuthError::from_provider)
    }

    async fn exchange_code(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<SessionTokens, AuthError> {
        match self.exchange_pkce_code(auth_code, code_verifier).await {
            // Unknown or already used codes come back as 404
            Err(SupabaseError::Api { status, .. }) if status == StatusCode::NOT_FOUND => {
                Err(AuthError::InvalidToken)
            }
            other => other.map_err(AuthError::from_provider),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        self.logout(access_token)
            .await
            .map_err(AuthError::from_provider)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_endpoints() {
        let config = SupabaseConfig {
            url: Url::parse("https://project.supabase.co/").unwrap(),
            api_key: SecretString::from("anon-key-for-tests"),
            auth_url: Url::parse("https://project.supabase.co/auth/v1/authorize").unwrap(),
            auth_provider: "google".to_string(),
        };
        let client = GoTrueClient::new(&config).unwrap();
        assert_eq!(
            client.inner.api_url.join("user").unwrap().as_str(),
            "https://project.supabase.co/auth/v1/user"
        );
        assert_eq!(
            client.inner.api_url.join("token").unwrap().as_str(),
            "https://project.supabase.co/auth/v1/token"
        );
        assert!(!format!("{client:?}").contains("anon-key-for-tests"));
    }

    #[test]
    fn test_pkce_request_uses_grant_field_names() {
        let body = serde_json::to_value(PkceRequest {
            auth_code: "code-1",
            code_verifier: "verifier",
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"auth_code": "code-1", "code_verifier": "verifier"})
        );
    }

    #[test]
    fn test_token_response_decodes() {
        let json = r#"{
            "access_token": "eyJ.access",
            "token_type": "bearer",
            "expires_in": 3600,
            "expires_at": 1735689600,
            "refresh_token": "v1.refresh",
            "user": {"id": "0b6f4d8e-3f59-4e3c-9a57-1c2d3e4f5a6b"}
        }"#;
        let tokens: SessionTokens = serde_json::from_str(json).unwrap();
        assert_eq!(tokens.access_token, "eyJ.access");
        assert_eq!(tokens.expires_in, 3600);
    }

    #[test]
    fn test_user_response_decodes() {
        let json = r#"{
            "id": "0b6f4d8e-3f59-4e3c-9a57-1c2d3e4f5a6b",
            "aud": "authenticated",
            "role": "authenticated",
            "email": "khach@example.vn",
            "app_metadata": {"provider": "email"}
        }"#;
        let user: AuthUser = serde_json::from_str(json).unwrap();
        assert_eq!(user.email.as_deref(), Some("khach@example.vn"));
    }
}
