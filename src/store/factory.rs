use std::sync::Arc;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::{AppError, Result};
use crate::store::{AuditSink, ContentStore, InMemoryStore, SledStore};

/// Create the system-of-record and its audit sink from configuration.
/// Both backends implement the two traits over the same storage, so the
/// pair shares one underlying instance.
pub fn create_store(config: &StoreConfig) -> Result<(Arc<dyn ContentStore>, Arc<dyn AuditSink>)> {
    match config.backend {
        StoreBackend::Sled => {
            let path = config.path.as_ref().ok_or_else(|| {
                AppError::Configuration("Sled backend requires 'path' configuration".to_string())
            })?;

            tracing::info!(path = ?path, "Initializing Sled storage backend");

            let store = SledStore::new(path)?;
            Ok((Arc::new(store.clone()), Arc::new(store)))
        }

        StoreBackend::Memory => {
            tracing::info!("Initializing in-memory storage backend");
            let store = InMemoryStore::new();
            Ok((Arc::new(store.clone()), Arc::new(store)))
        }
    }
}
