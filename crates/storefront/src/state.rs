//! Application state shared across handlers.

use std::sync::Arc;

use thiserror::Error;

use crate::backend::{BackendClient, BackendError};
use crate::config::StorefrontConfig;
use crate::geography::{Geography, GeographyError};

/// Error building the application state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("backend client: {0}")]
    Backend(#[from] BackendError),
    #[error("geography dataset: {0}")]
    Geography(#[from] GeographyError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// backend client, the address index and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    backend: BackendClient,
    geography: Geography,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the bundled
    /// governorate dataset fails to load.
    pub fn new(config: StorefrontConfig) -> Result<Self, StateError> {
        let backend = BackendClient::new(&config.backend)?;
        let geography = Geography::egypt()?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                geography,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the backend REST client.
    #[must_use]
    pub fn backend(&self) -> &BackendClient {
        &self.inner.backend
    }

    /// Get a reference to the governorate dataset and its search index.
    #[must_use]
    pub fn geography(&self) -> &Geography {
        &self.inner.geography
    }
}
