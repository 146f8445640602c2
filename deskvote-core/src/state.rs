use std::sync::Arc;

use deskvote_dependencies::sqlx::PgPool;
use deskvote_models::{Client, MemoryStore, Store};

use crate::blob::{BlobStore, HttpBlobStore, LocalBlobStore};
use crate::config::Configuration;
use crate::error::DeskResult;
use crate::media::{ImageTransform, Passthrough, ResizeTransform};
use crate::rate_limit::SlidingWindow;

/// Shared application state, cloned into every request handler.
///
/// Owns the store handle for the lifetime of the server; [`DeskState::close`]
/// releases it on shutdown.
#[derive(Clone, Debug)]
pub struct DeskState {
    config: Arc<Configuration>,
    store: Arc<dyn Store>,
    blobs: Arc<dyn BlobStore>,
    transform: Arc<dyn ImageTransform>,
    vote_limiter: Arc<SlidingWindow>,
    upload_limiter: Arc<SlidingWindow>,
}

impl DeskState {
    /// Builds the state from configuration. `pool` is the database connection if one
    /// is configured, without it everything is kept in memory.
    pub fn new(config: Configuration, pool: Option<PgPool>) -> DeskResult<Self> {
        let store: Arc<dyn Store> = match pool {
            Some(pool) => Arc::new(Client::from(pool)),
            None => {
                warn!("No database configured, votes and images are kept in memory only");
                Arc::new(MemoryStore::new())
            }
        };
        let blobs: Arc<dyn BlobStore> = match config.blob_service() {
            Some((base, token)) => {
                info!("Storing uploads at {}", base);
                Arc::new(HttpBlobStore::new(
                    crate::http_client(&config)?,
                    base.clone(),
                    token.to_string(),
                ))
            }
            None => {
                info!("Storing uploads in {}", config.data_root.display());
                Arc::new(LocalBlobStore::new(
                    config.data_root.clone(),
                    config.local_url_root()?,
                ))
            }
        };
        let transform: Arc<dyn ImageTransform> = if config.transform_images {
            Arc::new(ResizeTransform::new(config.resolution_limit()))
        } else {
            Arc::new(Passthrough)
        };
        Ok(Self::with_parts(config, store, blobs, transform))
    }

    pub fn with_parts(
        config: Configuration,
        store: Arc<dyn Store>,
        blobs: Arc<dyn BlobStore>,
        transform: Arc<dyn ImageTransform>,
    ) -> Self {
        let window = config.rate_limit_window();
        Self {
            vote_limiter: Arc::new(SlidingWindow::new("vote", config.vote_rate_limit, window)),
            upload_limiter: Arc::new(SlidingWindow::new(
                "upload",
                config.upload_rate_limit,
                window,
            )),
            config: Arc::new(config),
            store,
            blobs,
            transform,
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn blobs(&self) -> &dyn BlobStore {
        self.blobs.as_ref()
    }

    pub fn transform(&self) -> &dyn ImageTransform {
        self.transform.as_ref()
    }

    pub fn vote_limiter(&self) -> &SlidingWindow {
        &self.vote_limiter
    }

    pub fn upload_limiter(&self) -> &SlidingWindow {
        &self.upload_limiter
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}
