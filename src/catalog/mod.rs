//! Unified file catalog across all enabled stores.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::StoreDescriptor;

/// One file in the catalog, tagged with its originating store.
#[derive(Clone, Debug, Serialize)]
pub struct FileRecord {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub store_name: String,
}

struct CatalogCache {
    records: Vec<FileRecord>,
    generation: u64,
    built_at: DateTime<Utc>,
}

/// Cached, name-sorted view of the files scattered across the stores.
///
/// Validity is a generation counter, not a wall-clock comparison: every
/// write (upload or delete completion) bumps the counter before success is
/// reported, so the next listing is guaranteed to observe the mutation. A
/// rebuild replaces the cache atomically under the write lock; readers
/// never see a half-built catalog.
pub struct FileCatalog {
    cache: RwLock<Option<CatalogCache>>,
    generation: AtomicU64,
}

impl Default for FileCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl FileCatalog {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// All files across `stores`, sorted by name. Served from cache while
    /// valid, otherwise rescanned.
    pub async fn list_files(
        &self,
        stores: &[StoreDescriptor],
        force_refresh: bool,
    ) -> Vec<FileRecord> {
        // Read the counter before scanning: an invalidation racing with
        // the scan leaves the rebuilt cache already outdated, and the next
        // read rescans.
        let generation = self.generation.load(Ordering::Acquire);

        if !force_refresh {
            let cache = self.cache.read().await;
            if let Some(cache) = cache.as_ref() {
                if cache.generation == generation {
                    return cache.records.clone();
                }
            }
        }

        let records = scan_stores(stores).await;
        let mut cache = self.cache.write().await;
        *cache = Some(CatalogCache {
            records: records.clone(),
            generation,
            built_at: Utc::now(),
        });
        records
    }

    /// Look up a single record by exact name. Same-named files in
    /// different stores resolve to the last store in declaration order.
    pub async fn find_by_name(
        &self,
        stores: &[StoreDescriptor],
        name: &str,
    ) -> Option<FileRecord> {
        self.list_files(stores, false)
            .await
            .into_iter()
            .filter(|record| record.name == name)
            .last()
    }

    /// Mark the cache invalid. Cheap; the next read rescans.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// When the current cache was built, if one exists.
    pub async fn last_built_at(&self) -> Option<DateTime<Utc>> {
        self.cache.read().await.as_ref().map(|c| c.built_at)
    }
}

async fn scan_stores(stores: &[StoreDescriptor]) -> Vec<FileRecord> {
    let mut records = Vec::new();

    for store in stores {
        if !store.path.exists() {
            log::warn!(
                "Store {} path {} does not exist, skipping scan",
                store.name,
                store.path.display()
            );
            continue;
        }

        let mut entries = match tokio::fs::read_dir(&store.path).await {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Failed to scan store {}: {}", store.name, e);
                continue;
            }
        };

        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    let metadata = match entry.metadata().await {
                        Ok(metadata) => metadata,
                        Err(_) => continue,
                    };
                    if !metadata.is_file() {
                        continue;
                    }
                    let name = match path.file_name().and_then(|n| n.to_str()) {
                        Some(name) => name.to_string(),
                        None => continue,
                    };
                    let modified = metadata
                        .modified()
                        .map(DateTime::<Utc>::from)
                        .unwrap_or_else(|_| Utc::now());

                    records.push(FileRecord {
                        name,
                        path,
                        size: metadata.len(),
                        modified,
                        store_name: store.name.clone(),
                    });
                }
                Ok(None) => break,
                Err(e) => {
                    log::warn!("Error reading store {}: {}", store.name, e);
                    break;
                }
            }
        }
    }

    // Stable sort: same-named files keep store declaration order.
    records.sort_by(|a, b| a.name.cmp(&b.name));
    records
}
