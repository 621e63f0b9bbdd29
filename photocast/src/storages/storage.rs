use std::sync::Arc;

use crate::storages::{
    BlobStorage, BlobStorageTrait, KvStorage, KvStorageTrait, ProgressStorage, RecipientRegistry,
};

/// Combined storage trait that provides all storage backends
/// This trait allows converting to specific trait objects for components that only need a subset
pub trait StorageTrait: Send + Sync {
    /// Convert to KvStorageTrait trait object
    fn as_kv_storage(self: Arc<Self>) -> Arc<dyn KvStorageTrait>;

    /// Convert to BlobStorageTrait trait object
    fn as_blob_storage(self: Arc<Self>) -> Arc<dyn BlobStorageTrait>;

    /// Subscriber and channel lists on top of the key-value storage
    fn recipient_registry(self: Arc<Self>) -> RecipientRegistry {
        RecipientRegistry::new(self.as_kv_storage())
    }

    /// Delivery progress on top of the key-value storage
    fn progress_storage(self: Arc<Self>) -> ProgressStorage {
        ProgressStorage::new(self.as_kv_storage())
    }
}

/// Main storage structure that holds all bot backends
#[derive(Clone)]
pub struct Storage {
    kv: Arc<dyn KvStorageTrait>,
    blobs: Arc<dyn BlobStorageTrait>,
}

impl Storage {
    /// Create a new storage with all backends in memory
    pub fn new() -> Self {
        Self {
            kv: Arc::new(KvStorage::new()),
            blobs: Arc::new(BlobStorage::new()),
        }
    }

    /// Builder-like method to replace the key-value storage
    pub fn kv_storage(mut self, storage: impl KvStorageTrait + 'static) -> Self {
        self.kv = Arc::new(storage);
        self
    }

    /// Builder-like method to replace the image storage
    pub fn blob_storage(mut self, storage: impl BlobStorageTrait + 'static) -> Self {
        self.blobs = Arc::new(storage);
        self
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageTrait for Storage {
    fn as_kv_storage(self: Arc<Self>) -> Arc<dyn KvStorageTrait> {
        self.kv.clone()
    }

    fn as_blob_storage(self: Arc<Self>) -> Arc<dyn BlobStorageTrait> {
        self.blobs.clone()
    }
}
