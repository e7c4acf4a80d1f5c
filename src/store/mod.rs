//! Store management for the transfer service.
//!
//! This module handles the enabled-store registry, capacity accounting,
//! upload placement, and reachability checks.

pub mod availability;
pub mod capacity;
pub mod placement;
pub mod registry;

pub use availability::{AvailabilityGuard, StoreDiagnostic};
pub use capacity::CapacityOracle;
pub use placement::{FirstFitPlacement, PlacementPolicy};
pub use registry::StoreRegistry;
