//! Disk capacity accounting for store paths.

use std::path::Path;

/// Computes free space and current occupied size for a store path.
///
/// Physical free space and the logical size cap are independent
/// constraints; placement checks both.
#[derive(Clone, Copy, Debug, Default)]
pub struct CapacityOracle;

impl CapacityOracle {
    /// Physical free space at `path` in bytes, 0 if the path is
    /// inaccessible.
    pub fn free_space(&self, path: &Path) -> u64 {
        match fs2::available_space(path) {
            Ok(free) => free,
            Err(e) => {
                log::warn!("Error getting free space for {}: {}", path.display(), e);
                0
            }
        }
    }

    /// Total size of the volume holding `path` in bytes, 0 if inaccessible.
    pub fn total_space(&self, path: &Path) -> u64 {
        match fs2::total_space(path) {
            Ok(total) => total,
            Err(e) => {
                log::warn!("Error getting total space for {}: {}", path.display(), e);
                0
            }
        }
    }

    /// Sum of the sizes of regular files directly inside `path`,
    /// non-recursive. Computed live, never cached.
    pub async fn occupied_size(&self, path: &Path) -> u64 {
        let mut entries = match tokio::fs::read_dir(path).await {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Error scanning {}: {}", path.display(), e);
                return 0;
            }
        };

        let mut total = 0u64;
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    if let Ok(metadata) = entry.metadata().await {
                        if metadata.is_file() {
                            total += metadata.len();
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::warn!("Error scanning {}: {}", path.display(), e);
                    break;
                }
            }
        }
        total
    }

    /// Whether a candidate file fits under the store's size cap
    /// (`max_size_bytes == 0` means unbounded).
    pub async fn fits(&self, path: &Path, candidate_size: u64, max_size_bytes: u64) -> bool {
        if max_size_bytes == 0 {
            return true;
        }
        self.occupied_size(path).await.saturating_add(candidate_size) <= max_size_bytes
    }
}
