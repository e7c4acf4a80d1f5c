//! Upload placement strategies.

use async_trait::async_trait;

use super::capacity::CapacityOracle;
use crate::config::StoreDescriptor;

/// Strategy for choosing which store receives a new upload.
#[async_trait]
pub trait PlacementPolicy: Send + Sync {
    /// Select a store able to accept a file of `candidate_size` bytes, or
    /// None when every store is exhausted. Callers treat None as "reject
    /// upload, no retry".
    async fn select_store<'a>(
        &self,
        stores: &'a [StoreDescriptor],
        candidate_size: u64,
    ) -> Option<&'a StoreDescriptor>;
}

/// Greedy first-fit over the declared store order.
///
/// Earlier-declared stores fill first; predictability over even
/// utilization. Both the physical free space and the logical cap must
/// admit the file.
pub struct FirstFitPlacement {
    oracle: CapacityOracle,
}

impl FirstFitPlacement {
    pub fn new(oracle: CapacityOracle) -> Self {
        Self { oracle }
    }
}

#[async_trait]
impl PlacementPolicy for FirstFitPlacement {
    async fn select_store<'a>(
        &self,
        stores: &'a [StoreDescriptor],
        candidate_size: u64,
    ) -> Option<&'a StoreDescriptor> {
        for store in stores {
            // A missing directory is lazily provisioned, not a failure.
            if !store.path.exists() {
                if let Err(e) = tokio::fs::create_dir_all(&store.path).await {
                    log::warn!(
                        "Cannot provision store {} at {}: {}",
                        store.name,
                        store.path.display(),
                        e
                    );
                    continue;
                }
            }

            if candidate_size > self.oracle.free_space(&store.path) {
                log::info!(
                    "Store {} lacks physical space for {} bytes",
                    store.name,
                    candidate_size
                );
                continue;
            }

            if !self
                .oracle
                .fits(&store.path, candidate_size, store.max_size_bytes)
                .await
            {
                log::info!("Store {} would exceed max size with this file", store.name);
                continue;
            }

            log::info!(
                "Selected store {} for upload of {} bytes",
                store.name,
                candidate_size
            );
            return Some(store);
        }

        log::warn!("No suitable store found for upload of {} bytes", candidate_size);
        None
    }
}
