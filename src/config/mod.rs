//! Configuration for the transfer service.
//!
//! This module defines the available storage locations (trans stores) and
//! service settings, persisted as a single JSON document.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Result, TransferError};

/// Bytes per gigabyte, the unit used by the configuration document.
pub const GIB: u64 = 1024 * 1024 * 1024;

const DEFAULT_SERVICE_NAME: &str = "WiFi File Transfer";
const DEFAULT_MAX_FILE_SIZE_GB: u64 = 16;
const DEFAULT_EXTENSIONS: &[&str] = &[
    "txt", "pdf", "png", "jpg", "jpeg", "gif", "mp3", "mp4", "zip", "rar", "doc", "docx", "xls",
    "xlsx", "ppt", "pptx",
];

/// A store entry as it appears on disk. Older documents carry the cap in
/// bytes (`max_size`), newer ones in gigabytes (`max_size_gb`); either or
/// both may be present.
#[derive(Serialize, Deserialize)]
struct RawStoreEntry {
    name: String,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_size_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_size: Option<u64>,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// One storage location with a single canonical size cap in bytes.
///
/// Unit normalization happens once here, at the load boundary; downstream
/// consumers only ever see `max_size_bytes` (0 = unbounded).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawStoreEntry", into = "RawStoreEntry")]
pub struct StoreDescriptor {
    pub name: String,
    pub path: PathBuf,
    pub max_size_bytes: u64,
    pub enabled: bool,
}

impl From<RawStoreEntry> for StoreDescriptor {
    fn from(raw: RawStoreEntry) -> Self {
        let max_size_bytes = match (raw.max_size, raw.max_size_gb) {
            (Some(bytes), _) => bytes,
            (None, Some(gb)) if gb > 0.0 => (gb * GIB as f64) as u64,
            _ => 0,
        };

        Self {
            name: raw.name,
            path: PathBuf::from(raw.path),
            max_size_bytes,
            enabled: raw.enabled,
        }
    }
}

impl From<StoreDescriptor> for RawStoreEntry {
    fn from(store: StoreDescriptor) -> Self {
        // Both unit forms are written back so older readers keep working.
        let max_size_gb = if store.max_size_bytes > 0 {
            store.max_size_bytes as f64 / GIB as f64
        } else {
            0.0
        };

        Self {
            name: store.name,
            path: store.path.to_string_lossy().into_owned(),
            max_size_gb: Some(max_size_gb),
            max_size: Some(store.max_size_bytes),
            enabled: store.enabled,
        }
    }
}

/// The persisted configuration document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Configuration {
    pub service_name: String,
    pub max_file_size_gb: u64,
    pub allowed_extensions: Vec<String>,
    pub trans_stores: Vec<StoreDescriptor>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            max_file_size_gb: DEFAULT_MAX_FILE_SIZE_GB,
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            trans_stores: vec![StoreDescriptor {
                name: "trans_store_1".to_string(),
                path: PathBuf::from("trans_store"),
                max_size_bytes: 0,
                enabled: true,
            }],
        }
    }
}

impl Configuration {
    /// Maximum allowed upload size in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_gb * GIB
    }

    /// Check whether a lowercase extension (no leading dot) is allowed.
    pub fn allows_extension(&self, extension: &str) -> bool {
        self.allowed_extensions.iter().any(|e| e == extension)
    }
}

struct ConfigState {
    document: Configuration,
    /// Document mtime recorded at the last successful load; staleness is
    /// the on-disk mtime advancing past this.
    loaded_mtime: Option<SystemTime>,
    generation: u64,
}

/// Loads and persists the configuration document, detecting external edits.
///
/// Shared across all requests; all access goes through the interior lock.
pub struct ConfigStore {
    path: PathBuf,
    state: RwLock<ConfigState>,
}

impl ConfigStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            state: RwLock::new(ConfigState {
                document: Configuration::default(),
                loaded_mtime: None,
                generation: 0,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document from disk, creating it with defaults if absent.
    ///
    /// A malformed or unreadable document falls back to built-in defaults
    /// with a warning; callers never see a parse failure.
    pub async fn load(&self) -> Result<Configuration> {
        let document = if self.path.exists() {
            match std::fs::read(&self.path) {
                Ok(data) => match serde_json::from_slice::<Configuration>(&data) {
                    Ok(document) => document,
                    Err(e) => {
                        log::warn!(
                            "Malformed configuration {}: {}; using defaults",
                            self.path.display(),
                            e
                        );
                        Configuration::default()
                    }
                },
                Err(e) => {
                    log::warn!(
                        "Failed to read configuration {}: {}; using defaults",
                        self.path.display(),
                        e
                    );
                    Configuration::default()
                }
            }
        } else {
            log::info!("Creating default configuration file: {}", self.path.display());
            let defaults = Configuration::default();
            self.persist(&defaults)?;
            defaults
        };

        let mtime = document_mtime(&self.path);
        let mut state = self.state.write().await;
        state.document = document.clone();
        state.loaded_mtime = mtime;
        state.generation += 1;

        Ok(document)
    }

    /// Persist the document and make it the current in-memory configuration.
    pub async fn save(&self, document: &Configuration) -> Result<()> {
        self.persist(document)?;

        let mtime = document_mtime(&self.path);
        let mut state = self.state.write().await;
        state.document = document.clone();
        state.loaded_mtime = mtime;
        state.generation += 1;

        Ok(())
    }

    /// Whether the on-disk document has changed since the last load.
    pub async fn is_stale(&self) -> bool {
        let state = self.state.read().await;
        match state.loaded_mtime {
            Some(loaded) => match document_mtime(&self.path) {
                Some(current) => current > loaded,
                None => false,
            },
            // Never loaded
            None => true,
        }
    }

    /// Reload the document if an external edit is detected. Returns true if
    /// a reload occurred.
    pub async fn reload_if_needed(&self) -> Result<bool> {
        if self.is_stale().await {
            log::info!("Configuration {} changed on disk, reloading", self.path.display());
            self.load().await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Snapshot of the current in-memory configuration.
    pub async fn current(&self) -> Configuration {
        self.state.read().await.document.clone()
    }

    /// Monotonic counter bumped on every load, reload, and save. Downstream
    /// caches key their validity on this.
    pub async fn generation(&self) -> u64 {
        self.state.read().await.generation
    }

    pub async fn max_file_size_bytes(&self) -> u64 {
        self.state.read().await.document.max_file_size_bytes()
    }

    pub async fn allowed_extensions(&self) -> Vec<String> {
        self.state.read().await.document.allowed_extensions.clone()
    }

    fn persist(&self, document: &Configuration) -> Result<()> {
        let data = serde_json::to_vec_pretty(document)
            .map_err(|e| TransferError::Config(format!("Failed to serialize configuration: {}", e)))?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }
}

fn document_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_path(dir: &TempDir) -> PathBuf {
        dir.path().join("config.json")
    }

    #[tokio::test]
    async fn test_defaults_created_on_first_load() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(store_path(&dir));

        let config = store.load().await.unwrap();

        assert!(store_path(&dir).exists());
        assert_eq!(config.service_name, "WiFi File Transfer");
        assert_eq!(config.trans_stores.len(), 1);
        assert_eq!(config.trans_stores[0].name, "trans_store_1");
        assert_eq!(config.trans_stores[0].max_size_bytes, 0);
        assert!(config.trans_stores[0].enabled);
    }

    #[tokio::test]
    async fn test_round_trip_preserves_logical_configuration() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(store_path(&dir));

        let mut config = store.load().await.unwrap();
        config.trans_stores = vec![
            StoreDescriptor {
                name: "fast".to_string(),
                path: dir.path().join("fast"),
                max_size_bytes: 10 * GIB,
                enabled: true,
            },
            StoreDescriptor {
                name: "bulk".to_string(),
                path: dir.path().join("bulk"),
                max_size_bytes: 0,
                enabled: false,
            },
        ];
        store.save(&config).await.unwrap();

        let reloaded = store.load().await.unwrap();
        assert_eq!(reloaded.trans_stores, config.trans_stores);
    }

    #[tokio::test]
    async fn test_legacy_unit_normalization() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        std::fs::write(
            &path,
            r#"{
                "service_name": "t",
                "max_file_size_gb": 1,
                "allowed_extensions": ["txt"],
                "trans_stores": [
                    {"name": "gb_store", "path": "a", "max_size_gb": 2, "enabled": true},
                    {"name": "byte_store", "path": "b", "max_size": 4096, "enabled": true},
                    {"name": "open_store", "path": "c", "enabled": true}
                ]
            }"#,
        )
        .unwrap();

        let store = ConfigStore::new(path);
        let config = store.load().await.unwrap();

        assert_eq!(config.trans_stores[0].max_size_bytes, 2 * GIB);
        assert_eq!(config.trans_stores[1].max_size_bytes, 4096);
        assert_eq!(config.trans_stores[2].max_size_bytes, 0);
    }

    #[tokio::test]
    async fn test_malformed_document_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        std::fs::write(&path, "{not json").unwrap();

        let store = ConfigStore::new(path);
        let config = store.load().await.unwrap();

        assert_eq!(config.service_name, "WiFi File Transfer");
    }

    #[tokio::test]
    async fn test_external_edit_detected_as_stale() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        let store = ConfigStore::new(path.clone());
        store.load().await.unwrap();
        assert!(!store.is_stale().await);

        // mtime resolution guard
        std::thread::sleep(std::time::Duration::from_millis(20));
        let mut edited = store.current().await;
        edited.service_name = "edited".to_string();
        std::fs::write(&path, serde_json::to_vec_pretty(&edited).unwrap()).unwrap();

        assert!(store.is_stale().await);
        let reloaded = store.reload_if_needed().await.unwrap();
        assert!(reloaded);
        assert_eq!(store.current().await.service_name, "edited");
        assert!(!store.is_stale().await);
    }

    #[tokio::test]
    async fn test_generation_advances_on_reload() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(store_path(&dir));

        store.load().await.unwrap();
        let first = store.generation().await;
        store.save(&store.current().await).await.unwrap();
        assert!(store.generation().await > first);
    }
}
