//! Shared application state

use crate::config::ServerConfig;
use std::sync::Arc;
use tally_store::ArtifactStore;

/// State handed to every handler
#[derive(Debug)]
pub struct AppState {
    /// Validated service configuration
    pub config: ServerConfig,
    /// Shared artifact store
    pub store: Arc<ArtifactStore>,
}

impl AppState {
    /// Create state from validated configuration and an opened store
    pub fn new(config: ServerConfig, store: ArtifactStore) -> Self {
        Self {
            config,
            store: Arc::new(store),
        }
    }

    /// Open the artifact store named by `config`
    ///
    /// # Errors
    /// Fails when the store directory cannot be created or the prefix is invalid
    pub async fn open(config: ServerConfig) -> Result<Self, tally_store::StoreError> {
        let store = ArtifactStore::open(&config.storage_dir, config.artifact_prefix.clone()).await?;
        Ok(Self::new(config, store))
    }
}
