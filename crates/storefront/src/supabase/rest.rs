//! PostgREST client for the `/rest/v1` API.

use std::fmt::Display;
use std::sync::Arc;

use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use super::{SupabaseError, api_error, retry_after};
use crate::config::SupabaseConfig;

/// Media type asking PostgREST for exactly one object instead of an array.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

// =============================================================================
// Query
// =============================================================================

/// Sort direction for [`Query::order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

/// Column selection, filters, ordering and limit for a table request.
#[derive(Debug, Clone, Default)]
pub struct Query {
    select: Option<String>,
    filters: Vec<(String, String)>,
    order: Vec<String>,
    limit: Option<usize>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns to return, including embedded resources (`products!inner(...)`).
    #[must_use]
    pub fn select(mut self, columns: &str) -> Self {
        self.select = Some(columns.to_string());
        self
    }

    /// Keep rows where `column` equals `value`.
    #[must_use]
    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.filters.push((column.to_string(), format!("eq.{value}")));
        self
    }

    /// Append a sort key. Keys apply in the order they are added.
    #[must_use]
    pub fn order(mut self, column: &str, direction: Direction) -> Self {
        self.order.push(format!("{column}.{}", direction.as_str()));
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Query-string pairs in PostgREST syntax.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.filters.len() + 3);
        if let Some(select) = &self.select {
            pairs.push(("select".to_string(), select.clone()));
        }
        pairs.extend(self.filters.iter().cloned());
        if !self.order.is_empty() {
            pairs.push(("order".to_string(), self.order.join(",")));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }
}

// =============================================================================
// DataClient
// =============================================================================

/// Client for the REST data API.
///
/// Cheap to clone. Without a bearer token requests run as the anonymous
/// role; [`DataClient::with_bearer`] scopes a copy to one shopper so
/// row-level security sees their identity.
#[derive(Clone)]
pub struct DataClient {
    inner: Arc<DataClientInner>,
    bearer: Option<Arc<SecretString>>,
}

struct DataClientInner {
    client: reqwest::Client,
    rest_url: Url,
    api_key: SecretString,
}

impl std::fmt::Debug for DataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataClient")
            .field("rest_url", &self.inner.rest_url.as_str())
            .field("scoped", &self.bearer.is_some())
            .finish_non_exhaustive()
    }
}

impl DataClient {
    /// Create a client for the configured project.
    ///
    /// # Errors
    ///
    /// Returns an error if the REST endpoint cannot be derived from the
    /// project URL.
    pub fn new(config: &SupabaseConfig) -> Result<Self, SupabaseError> {
        Self::with_http_client(reqwest::Client::new(), config)
    }

    /// Create a client sharing an existing connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the REST endpoint cannot be derived from the
    /// project URL.
    pub fn with_http_client(
        client: reqwest::Client,
        config: &SupabaseConfig,
    ) -> Result<Self, SupabaseError> {
        Ok(Self {
            inner: Arc::new(DataClientInner {
                client,
                rest_url: config.url.join("rest/v1/")?,
                api_key: config.api_key.clone(),
            }),
            bearer: None,
        })
    }

    /// A copy of this client that acts on behalf of the holder of `access_token`.
    #[must_use]
    pub fn with_bearer(&self, access_token: &str) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            bearer: Some(Arc::new(SecretString::from(access_token.to_string()))),
        }
    }

    /// Fetch every row matching `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the rows cannot be decoded.
    #[instrument(skip(self, query), fields(table = %table))]
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
    ) -> Result<Vec<T>, SupabaseError> {
        let request = self.request(Method::GET, table)?.query(&query.to_pairs());
        let body = self.send(request).await?;
        let rows: Vec<T> = serde_json::from_str(&body)?;
        debug!(rows = rows.len(), "Fetched rows");
        Ok(rows)
    }

    /// Fetch exactly one row.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::NotFound` when no row matches, or another
    /// error if the request fails.
    #[instrument(skip(self, query), fields(table = %table))]
    pub async fn fetch_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
    ) -> Result<T, SupabaseError> {
        let request = self
            .request(Method::GET, table)?
            .query(&query.to_pairs())
            .header(reqwest::header::ACCEPT, SINGLE_OBJECT);

        match self.send(request).await {
            Ok(body) => Ok(serde_json::from_str(&body)?),
            // PostgREST answers 406 when the single-object request matched zero rows
            Err(SupabaseError::Api { status, .. }) if status == StatusCode::NOT_ACCEPTABLE => {
                Err(SupabaseError::NotFound(table.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Insert one row and return it as stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the service rejects the row.
    #[instrument(skip(self, row), fields(table = %table))]
    pub async fn insert<B, T>(&self, table: &str, row: &B) -> Result<T, SupabaseError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .request(Method::POST, table)?
            .header("Prefer", "return=representation")
            .header(reqwest::header::ACCEPT, SINGLE_OBJECT)
            .json(row);
        let body = self.send(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Patch the rows matching `query`, returning the updated rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, query, patch), fields(table = %table))]
    pub async fn update<B, T>(
        &self,
        table: &str,
        query: &Query,
        patch: &B,
    ) -> Result<Vec<T>, SupabaseError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .request(Method::PATCH, table)?
            .query(&query.to_pairs())
            .header("Prefer", "return=representation")
            .json(patch);
        let body = self.send(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Delete the rows matching `query`, returning what was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, query), fields(table = %table))]
    pub async fn delete<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
    ) -> Result<Vec<T>, SupabaseError> {
        let request = self
            .request(Method::DELETE, table)?
            .query(&query.to_pairs())
            .header("Prefer", "return=representation");
        let body = self.send(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Call a database function.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or its result cannot be decoded.
    #[instrument(skip(self, args), fields(function = %function))]
    pub async fn rpc<B, T>(&self, function: &str, args: &B) -> Result<T, SupabaseError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .request(Method::POST, &format!("rpc/{function}"))?
            .json(args);
        let body = self.send(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Cheapest possible round-trip, used by readiness checks.
    ///
    /// # Errors
    ///
    /// Returns an error if the service cannot be reached or rejects the key.
    pub async fn ping(&self, table: &str) -> Result<(), SupabaseError> {
        let request = self
            .request(Method::GET, table)?
            .query(&[("select", "id"), ("limit", "1")]);
        self.send(request).await.map(|_| ())
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, SupabaseError> {
        let url = self.inner.rest_url.join(path)?;
        let key = self.inner.api_key.expose_secret();
        let bearer = self
            .bearer
            .as_ref()
            .map_or(key, |token| token.expose_secret());

        Ok(self
            .inner
            .client
            .request(method, url)
            .header("apikey", key)
            .bearer_auth(bearer))
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, SupabaseError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SupabaseError::RateLimited(retry_after(&response)));
        }

        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(
                status = %status,
                scoped = self.bearer.is_some(),
                body = %body.chars().take(500).collect::<String>(),
                "Data API returned non-success status"
            );
            return Err(api_error(status, &body));
        }

        Ok(body)
    }
}
