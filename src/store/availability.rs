//! Store reachability checks.

use std::path::PathBuf;

use crate::config::StoreDescriptor;

/// Diagnostic for a store excluded from the effective working set.
#[derive(Clone, Debug)]
pub struct StoreDiagnostic {
    pub name: String,
    pub path: PathBuf,
    pub error: String,
}

/// Probes every enabled store at startup and on refresh, reducing the
/// working set to the reachable ones. The persisted configuration is
/// never modified; exclusion is in-memory only.
#[derive(Clone, Copy, Debug, Default)]
pub struct AvailabilityGuard;

impl AvailabilityGuard {
    /// Ensure each store directory exists, splitting the list into the
    /// effective set and the unreachable remainder. Emits one
    /// consolidated warning per detection, not one per operation.
    pub async fn check(
        &self,
        stores: &[StoreDescriptor],
    ) -> (Vec<StoreDescriptor>, Vec<StoreDiagnostic>) {
        let mut effective = Vec::new();
        let mut unreachable = Vec::new();

        for store in stores {
            match tokio::fs::create_dir_all(&store.path).await {
                Ok(()) => effective.push(store.clone()),
                Err(e) => unreachable.push(StoreDiagnostic {
                    name: store.name.clone(),
                    path: store.path.clone(),
                    error: e.to_string(),
                }),
            }
        }

        if !unreachable.is_empty() {
            let summary: Vec<String> = unreachable
                .iter()
                .map(|d| format!("{} ({}): {}", d.name, d.path.display(), d.error))
                .collect();
            log::warn!(
                "{} of {} stores unreachable: {}",
                unreachable.len(),
                stores.len(),
                summary.join("; ")
            );
        }

        (effective, unreachable)
    }
}
