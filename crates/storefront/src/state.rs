//! Application state shared across handlers.

use std::path::Path;
use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::content::{ContentError, ContentStore};
use crate::db::{CartRepository, CatalogRepository, SupabaseStore};
use crate::services::auth::{SessionEvents, SessionManager, SessionProvider};
use crate::supabase::{DataClient, GoTrueClient, SupabaseError};

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("supabase client: {0}")]
    Supabase(#[from] SupabaseError),
    #[error("content: {0}")]
    Content(#[from] ContentError),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. The data and session capabilities are
/// trait objects so tests can substitute in-process backends.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    catalog: Arc<dyn CatalogRepository>,
    carts: Arc<dyn CartRepository>,
    sessions: SessionManager,
    content: ContentStore,
}

impl AppState {
    /// Create the state backed by the hosted data and auth services.
    ///
    /// # Errors
    ///
    /// Returns an error if the service URLs are invalid or the content
    /// directory cannot be read.
    pub fn new(config: StorefrontConfig, content_dir: &Path) -> Result<Self, StateError> {
        let http = reqwest::Client::new();
        let store = Arc::new(SupabaseStore::new(DataClient::with_http_client(
            http.clone(),
            &config.supabase,
        )?));
        let provider = Arc::new(GoTrueClient::with_http_client(http, &config.supabase)?);
        let content = ContentStore::load(content_dir)?;

        Ok(Self::from_parts(
            config,
            store.clone(),
            store,
            provider,
            content,
        ))
    }

    /// Assemble the state from explicit capabilities.
    #[must_use]
    pub fn from_parts(
        config: StorefrontConfig,
        catalog: Arc<dyn CatalogRepository>,
        carts: Arc<dyn CartRepository>,
        provider: Arc<dyn SessionProvider>,
        content: ContentStore,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                catalog,
                carts,
                sessions: SessionManager::new(provider, SessionEvents::new()),
                content,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Product catalog.
    #[must_use]
    pub fn catalog(&self) -> &dyn CatalogRepository {
        self.inner.catalog.as_ref()
    }

    /// Shopper carts.
    #[must_use]
    pub fn carts(&self) -> &dyn CartRepository {
        self.inner.carts.as_ref()
    }

    /// Session lifecycle and change notifications.
    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.inner.sessions
    }

    /// Markdown content pages.
    #[must_use]
    pub fn content(&self) -> &ContentStore {
        &self.inner.content
    }
}
