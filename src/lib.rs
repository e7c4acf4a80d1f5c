// Lanshare - LAN File Transfer Service

pub mod catalog;
pub mod config;
pub mod error;
pub mod net;
pub mod service;
pub mod store;

pub use catalog::{FileCatalog, FileRecord};
pub use config::{ConfigStore, Configuration, StoreDescriptor};
pub use error::{Result, TransferError};
pub use service::{StoreStatus, StoredFile, TransferService};
