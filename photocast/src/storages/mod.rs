mod blob_storage;
mod kv_storage;
mod progress_storage;
mod recipient_storage;
mod storage;

pub use blob_storage::{
    BlobStorage, BlobStorageTrait, Image, ImageId, PersistentBlobStorage, PhotoLocator, delete_each,
};
pub use kv_storage::{KvStorage, KvStorageTrait, PersistentKvStorage};
pub use progress_storage::{DeliveryProgress, ProgressStorage};
pub use recipient_storage::{ChannelId, RecipientRegistry, SubscriberId};
pub use storage::{Storage, StorageTrait};
