//! Enabled-store registry.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::{ConfigStore, StoreDescriptor};

/// Exposes the configuration's store list filtered to enabled stores,
/// preserving declaration order. That order is the upload priority order.
///
/// The filtered list is cached and keyed by the configuration generation,
/// so any reload or save invalidates it.
pub struct StoreRegistry {
    config: Arc<ConfigStore>,
    cache: RwLock<Option<(u64, Vec<StoreDescriptor>)>>,
}

impl StoreRegistry {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self {
            config,
            cache: RwLock::new(None),
        }
    }

    /// Enabled stores in declaration order.
    pub async fn enabled_stores(&self) -> Vec<StoreDescriptor> {
        let generation = self.config.generation().await;

        {
            let cache = self.cache.read().await;
            if let Some((cached_generation, stores)) = cache.as_ref() {
                if *cached_generation == generation {
                    return stores.clone();
                }
            }
        }

        let document = self.config.current().await;
        let stores: Vec<StoreDescriptor> = document
            .trans_stores
            .into_iter()
            .filter(|store| store.enabled)
            .collect();

        let mut cache = self.cache.write().await;
        *cache = Some((generation, stores.clone()));
        stores
    }

    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }
}
