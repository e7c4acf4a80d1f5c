//! Service facade wiring configuration, stores, and catalog together.
//!
//! One `TransferService` instance is constructed at process start and
//! shared across all requests; every mutable cache behind it is
//! synchronized.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::catalog::{FileCatalog, FileRecord};
use crate::config::{ConfigStore, Configuration, StoreDescriptor, GIB};
use crate::error::{Result, TransferError};
use crate::store::{
    AvailabilityGuard, CapacityOracle, FirstFitPlacement, PlacementPolicy, StoreDiagnostic,
    StoreRegistry,
};

/// Result of a successful upload.
#[derive(Clone, Debug, Serialize)]
pub struct StoredFile {
    pub stored_name: String,
    pub store_name: String,
    pub size: u64,
}

/// Capacity and usage report for one store.
#[derive(Clone, Debug, Serialize)]
pub struct StoreStatus {
    pub name: String,
    pub path: PathBuf,
    pub free_gb: f64,
    pub total_gb: f64,
    pub usage_percent: f64,
    pub file_count: usize,
    /// 1-based position in declaration order.
    pub store_number: usize,
}

pub struct TransferService {
    config: Arc<ConfigStore>,
    registry: StoreRegistry,
    catalog: FileCatalog,
    oracle: CapacityOracle,
    guard: AvailabilityGuard,
    placement: Box<dyn PlacementPolicy>,
    /// Reachable stores only; recomputed by the guard on init and on
    /// every configuration reload.
    effective: RwLock<Vec<StoreDescriptor>>,
    diagnostics: RwLock<Vec<StoreDiagnostic>>,
}

impl TransferService {
    /// Point the service at a configuration document. No I/O happens
    /// until `initialize`.
    pub fn new<P: Into<PathBuf>>(document_path: P) -> Self {
        let config = Arc::new(ConfigStore::new(document_path));
        Self {
            registry: StoreRegistry::new(Arc::clone(&config)),
            config,
            catalog: FileCatalog::new(),
            oracle: CapacityOracle::default(),
            guard: AvailabilityGuard::default(),
            placement: Box::new(FirstFitPlacement::new(CapacityOracle::default())),
            effective: RwLock::new(Vec::new()),
            diagnostics: RwLock::new(Vec::new()),
        }
    }

    /// Substitute the placement strategy.
    pub fn with_placement(mut self, placement: Box<dyn PlacementPolicy>) -> Self {
        self.placement = placement;
        self
    }

    /// Idempotent startup: load or create the configuration, provision
    /// store directories, and compute the effective store set.
    pub async fn initialize(&self) -> Result<Configuration> {
        let document = self.config.load().await?;
        self.refresh_stores().await;
        Ok(document)
    }

    /// Snapshot of the current configuration.
    pub async fn configuration(&self) -> Configuration {
        self.config.current().await
    }

    /// Stores currently in the effective working set.
    pub async fn effective_stores(&self) -> Vec<StoreDescriptor> {
        self.effective.read().await.clone()
    }

    /// Diagnostics for stores excluded by the availability guard.
    pub async fn diagnostics(&self) -> Vec<StoreDiagnostic> {
        self.diagnostics.read().await.clone()
    }

    /// Store a file in the first store with capacity.
    pub async fn upload(&self, candidate_name: &str, data: Bytes) -> Result<StoredFile> {
        self.ensure_fresh().await?;

        let filename = sanitize_filename(candidate_name)?;
        let document = self.config.current().await;

        match file_extension(&filename) {
            Some(extension) if document.allows_extension(&extension) => {}
            _ => {
                log::warn!("File type not allowed: {}", filename);
                return Err(TransferError::DisallowedExtension(filename));
            }
        }

        let size = data.len() as u64;
        let limit = document.max_file_size_bytes();
        if size > limit {
            log::warn!("File too large: {} ({} bytes)", filename, size);
            return Err(TransferError::TooLarge { size, limit });
        }

        let stores = self.effective.read().await.clone();
        let store = self
            .placement
            .select_store(&stores, size)
            .await
            .ok_or(TransferError::CapacityExceeded { required: size })?
            .clone();

        let target = store.path.join(&filename);
        tokio::fs::write(&target, &data).await?;

        // Invalidate before reporting success so the next listing sees
        // the new file, on any task.
        self.catalog.invalidate();
        log::info!("Saved file: {} ({} bytes) to {}", filename, size, store.name);

        Ok(StoredFile {
            stored_name: filename,
            store_name: store.name,
            size,
        })
    }

    /// Locate a file for download. The catalog is not implicitly
    /// refreshed on a miss.
    pub async fn download(&self, name: &str) -> Result<FileRecord> {
        self.ensure_fresh().await?;
        let stores = self.effective.read().await.clone();
        self.catalog
            .find_by_name(&stores, name)
            .await
            .ok_or_else(|| TransferError::NotFound(name.to_string()))
    }

    /// Delete a file by name from whichever store holds it.
    pub async fn delete(&self, name: &str) -> Result<()> {
        self.ensure_fresh().await?;
        let stores = self.effective.read().await.clone();
        let record = self
            .catalog
            .find_by_name(&stores, name)
            .await
            .ok_or_else(|| TransferError::NotFound(name.to_string()))?;

        match tokio::fs::remove_file(&record.path).await {
            Ok(()) => {
                self.catalog.invalidate();
                log::info!("Deleted file: {} from {}", name, record.store_name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted concurrently; the catalog entry is gone either way.
                self.catalog.invalidate();
                Err(TransferError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All files across the effective stores, sorted by name.
    pub async fn list(&self, force_refresh: bool) -> Result<Vec<FileRecord>> {
        self.ensure_fresh().await?;
        let stores = self.effective.read().await.clone();
        Ok(self.catalog.list_files(&stores, force_refresh).await)
    }

    /// Capacity and usage report for every effective store.
    pub async fn store_status(&self) -> Result<Vec<StoreStatus>> {
        self.ensure_fresh().await?;
        let stores = self.effective.read().await.clone();
        let records = self.catalog.list_files(&stores, false).await;

        let mut report = Vec::new();
        for (index, store) in stores.iter().enumerate() {
            let free = self.oracle.free_space(&store.path);
            let total = self.oracle.total_space(&store.path);
            let usage_percent = if total > 0 {
                round2(total.saturating_sub(free) as f64 / total as f64 * 100.0)
            } else {
                0.0
            };

            report.push(StoreStatus {
                name: store.name.clone(),
                path: store.path.clone(),
                free_gb: round2(free as f64 / GIB as f64),
                total_gb: round2(total as f64 / GIB as f64),
                usage_percent,
                file_count: records.iter().filter(|r| r.store_name == store.name).count(),
                store_number: index + 1,
            });
        }

        Ok(report)
    }

    /// Recompute the effective store set from the current configuration.
    async fn refresh_stores(&self) {
        let stores = self.registry.enabled_stores().await;
        let (effective, unreachable) = self.guard.check(&stores).await;
        *self.effective.write().await = effective;
        *self.diagnostics.write().await = unreachable;
        self.catalog.invalidate();
    }

    /// Pick up external configuration edits before serving a request.
    async fn ensure_fresh(&self) -> Result<()> {
        if self.config.reload_if_needed().await? {
            self.registry.invalidate().await;
            self.refresh_stores().await;
        }
        Ok(())
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Reduce a client-supplied name to a bare filename. Some mobile clients
/// send path-qualified names.
fn sanitize_filename(candidate: &str) -> Result<String> {
    let name = candidate
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(TransferError::InvalidName(candidate.to_string()));
    }
    Ok(name.to_string())
}

/// Lowercased extension without the leading dot, if the name has one.
fn file_extension(name: &str) -> Option<String> {
    match name.rsplit_once('.') {
        Some((_, extension)) if !extension.is_empty() => Some(extension.to_ascii_lowercase()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename_strips_client_paths() {
        assert_eq!(sanitize_filename("report.pdf").unwrap(), "report.pdf");
        assert_eq!(sanitize_filename("photos/img.png").unwrap(), "img.png");
        assert_eq!(sanitize_filename("C:\\Users\\me\\doc.txt").unwrap(), "doc.txt");
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("uploads/").is_err());
        assert!(sanitize_filename("..").is_err());
    }

    #[test]
    fn test_file_extension_lowercased() {
        assert_eq!(file_extension("A.PDF"), Some("pdf".to_string()));
        assert_eq!(file_extension("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(file_extension("noext"), None);
        assert_eq!(file_extension("trailing."), None);
    }
}
