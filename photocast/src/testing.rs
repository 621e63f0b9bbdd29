//! Helpers shared by unit tests of the bot modules

use std::{sync::Arc, time::Duration};

use teloxide::types::Recipient;

use crate::{
    distributor::{DistributionOptions, Distributor},
    error::SendError,
    messenger::MessengerTrait,
    storages::{PhotoLocator, Storage, StorageTrait},
};

/// Messenger that accepts every photo and drops notifications
pub struct SilentMessenger;

#[async_trait::async_trait]
impl MessengerTrait for SilentMessenger {
    async fn send_photo(&self, _recipient: Recipient, _photo: &PhotoLocator) -> Result<(), SendError> {
        Ok(())
    }

    async fn notify_admin(&self, _text: &str) {}
}

/// In-memory storage together with a distributor working on it
pub fn in_memory_distributor() -> (Arc<dyn StorageTrait>, Arc<Distributor>) {
    let storage: Arc<dyn StorageTrait> = Arc::new(Storage::new());
    let options = DistributionOptions {
        send_delay: Duration::ZERO,
        ..DistributionOptions::default()
    };
    let distributor = Distributor::new(
        Arc::new(storage.clone().recipient_registry()),
        storage.clone().progress_storage(),
        storage.clone().as_blob_storage(),
        Arc::new(SilentMessenger),
        options,
    );
    (storage, Arc::new(distributor))
}
