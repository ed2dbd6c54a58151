use std::sync::Arc;

use crate::backend::memory::{MemoryIdentity, MemoryOrderStore, MemoryPhotoStore};
use crate::backend::{IdentityProvider, OrderStore, PhotoStore};
use crate::config::PhotoSettings;
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub orders: Arc<dyn OrderStore>,
    pub photos: Arc<dyn PhotoStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub metrics: Metrics,
    pub intake_key: Option<String>,
}

impl AppState {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        photos: Arc<dyn PhotoStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            orders,
            photos,
            identity,
            metrics: Metrics::new(),
            intake_key: None,
        }
    }

    pub fn with_intake_key(mut self, intake_key: Option<String>) -> Self {
        self.intake_key = intake_key;
        self
    }

    pub fn in_memory(event_buffer_size: usize, photos: &PhotoSettings) -> Self {
        Self::new(
            Arc::new(MemoryOrderStore::new(event_buffer_size)),
            Arc::new(MemoryPhotoStore::new(
                photos.bucket.clone(),
                photos.public_base_url.clone(),
                photos.storage_enabled,
            )),
            Arc::new(MemoryIdentity::new()),
        )
    }
}
