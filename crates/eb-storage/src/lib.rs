//! eb-storage: the object storage collaborator.
//!
//! The pipeline only ever sees the [`ObjectStore`] trait. Two backends are
//! provided: [`LocalStore`] for a plain directory tree and
//! [`DaprBindingStore`] for a Dapr output binding reached over the sidecar's
//! HTTP API.

pub mod dapr;
pub mod local;
pub mod store;

pub use dapr::{DaprBindingStore, DaprStoreOptions};
pub use local::LocalStore;
pub use store::{local_file_name, ObjectStore};

use std::sync::Arc;

use eb_core::config::{Config, StorageBackend};

/// Build the store selected by configuration.
pub fn from_config(config: &Config) -> eb_core::Result<Arc<dyn ObjectStore>> {
    match config.storage.backend {
        StorageBackend::Local => {
            let root = config.storage.local_root.clone().ok_or_else(|| {
                eb_core::Error::Validation("storage.local_root is required for the local backend".into())
            })?;
            Ok(Arc::new(LocalStore::new(root)))
        }
        StorageBackend::Dapr => {
            if config.storage.component.is_empty() {
                return Err(eb_core::Error::Validation(
                    "storage.component (OBJECT_STORE_NAME) is required for the dapr backend".into(),
                ));
            }
            Ok(Arc::new(DaprBindingStore::new(DaprStoreOptions::from_config(config))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_backend_requires_root() {
        let mut cfg = Config::default();
        cfg.storage.backend = StorageBackend::Local;
        assert!(from_config(&cfg).is_err());
        cfg.storage.local_root = Some("/srv/assets".into());
        assert_eq!(from_config(&cfg).unwrap().name(), "local");
    }

    #[test]
    fn dapr_backend_requires_component() {
        let mut cfg = Config::default();
        assert!(from_config(&cfg).is_err());
        cfg.storage.component = "assets".into();
        assert_eq!(from_config(&cfg).unwrap().name(), "dapr:assets");
    }
}
