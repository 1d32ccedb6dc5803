//! Namespaced storage access with optional digest verification, mirroring
//! the way campaign state survives between sessions on the device.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::warn;

use crate::SynchronousStorage;

const KEY_NAMESPACE: &str = "reach.";
const HASH_SUFFIX: &str = ".hash";

/// Wraps a host storage implementation with the SDK key namespace and a
/// verified read/write pair for blobs that must not be consumed when
/// tampered with or torn.
#[derive(Clone)]
pub struct StorageManager {
    store: Arc<dyn SynchronousStorage>,
}

impl StorageManager {
    pub fn new(store: Arc<dyn SynchronousStorage>) -> Self {
        Self { store }
    }

    pub fn save_data(&self, key: &str, data: &str) {
        self.store.set_item(&self.namespaced(key), data);
    }

    pub fn get_data(&self, key: &str) -> Option<String> {
        self.store.get_item(&self.namespaced(key))
    }

    pub fn clear_data(&self, key: &str) {
        self.store.remove_item(&self.namespaced(key));
    }

    /// Store `data` together with a digest over key and contents.
    pub fn save_verified(&self, key: &str, data: &str) {
        let digest = Self::digest(key, data);
        self.store.set_item(&self.namespaced(key), data);
        self.store.set_item(&self.hash_key(key), &digest);
    }

    /// Read back a verified blob. A missing or mismatched digest is treated
    /// as no data: the engine starts fresh rather than consuming a corrupt
    /// state blob.
    pub fn get_verified(&self, key: &str) -> Option<String> {
        let data = self.store.get_item(&self.namespaced(key))?;
        let stored = self.store.get_item(&self.hash_key(key));

        let expected = Self::digest(key, &data);
        match stored {
            Some(hash) if hash == expected => Some(data),
            _ => {
                warn!(key, "storage digest mismatch, treating as absent");
                None
            }
        }
    }

    fn digest(key: &str, data: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hasher.update(data.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{KEY_NAMESPACE}{key}")
    }

    fn hash_key(&self, key: &str) -> String {
        format!("{KEY_NAMESPACE}{key}{HASH_SUFFIX}")
    }
}
