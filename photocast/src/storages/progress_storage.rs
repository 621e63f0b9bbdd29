use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::StoreError,
    storages::{
        blob_storage::ImageId,
        kv_storage::{KvStorageTrait, load_json, save_json},
        recipient_storage::ChannelId,
    },
};

const DELIVERY_PROGRESS_KEY: &str = "delivery_progress";

/// Which channels already received which images.
/// Stored as `{"<image id>": ["<channel id>", ...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryProgress {
    delivered: BTreeMap<ImageId, BTreeSet<ChannelId>>,
}

impl DeliveryProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.delivered.is_empty()
    }

    pub fn len(&self) -> usize {
        self.delivered.len()
    }

    /// Check whether `image` was already delivered to `channel`
    pub fn contains(&self, image: &ImageId, channel: &ChannelId) -> bool {
        self.delivered
            .get(image)
            .is_some_and(|channels| channels.contains(channel))
    }

    /// Record a successful delivery, returns `false` if it was already recorded
    pub fn record(&mut self, image: &ImageId, channel: &ChannelId) -> bool {
        self.delivered
            .entry(image.clone())
            .or_default()
            .insert(channel.clone())
    }

    /// Channels that already received `image`
    pub fn channels_for(&self, image: &ImageId) -> Option<&BTreeSet<ChannelId>> {
        self.delivered.get(image)
    }

    pub fn images(&self) -> impl Iterator<Item = &ImageId> {
        self.delivered.keys()
    }

    /// Drop the entries of the given images
    pub fn remove(&mut self, images: &[ImageId]) {
        for image in images {
            self.delivered.remove(image);
        }
    }

    /// Keep entries only for images that still exist, returns the number of dropped entries
    pub fn retain_images<'a>(&mut self, existing: impl IntoIterator<Item = &'a ImageId>) -> usize {
        let existing: HashSet<&ImageId> = existing.into_iter().collect();
        let before = self.delivered.len();
        self.delivered.retain(|image, _| existing.contains(image));
        before - self.delivered.len()
    }
}

/// Persists [`DeliveryProgress`] in the key-value storage
#[derive(Clone)]
pub struct ProgressStorage {
    storage: Arc<dyn KvStorageTrait>,
}

impl ProgressStorage {
    pub fn new(storage: Arc<dyn KvStorageTrait>) -> Self {
        Self { storage }
    }

    /// Load the stored progress, empty if nothing was saved yet
    pub async fn load(&self) -> Result<DeliveryProgress, StoreError> {
        load_json(self.storage.as_ref(), DELIVERY_PROGRESS_KEY).await
    }

    pub async fn save(&self, progress: &DeliveryProgress) -> Result<(), StoreError> {
        save_json(self.storage.as_ref(), DELIVERY_PROGRESS_KEY, progress).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storages::kv_storage::KvStorage;

    fn channel(s: &str) -> ChannelId {
        s.parse().unwrap()
    }

    #[test]
    fn test_record_and_contains() {
        let mut progress = DeliveryProgress::new();
        let image = ImageId::from("img1");

        assert!(!progress.contains(&image, &channel("@alpha")));
        assert!(progress.record(&image, &channel("@alpha")));
        // A channel is recorded at most once per image
        assert!(!progress.record(&image, &channel("@alpha")));
        assert!(progress.record(&image, &channel("@bravo")));

        assert!(progress.contains(&image, &channel("@alpha")));
        assert!(!progress.contains(&ImageId::from("img2"), &channel("@alpha")));
        assert_eq!(progress.channels_for(&image).map(|c| c.len()), Some(2));
    }

    #[test]
    fn test_remove_and_retain() {
        let mut progress = DeliveryProgress::new();
        for id in ["img1", "img2", "img3"] {
            progress.record(&ImageId::from(id), &channel("@alpha"));
        }

        progress.remove(&[ImageId::from("img1")]);
        assert_eq!(progress.len(), 2);

        let existing = [ImageId::from("img3"), ImageId::from("img4")];
        assert_eq!(progress.retain_images(&existing), 1);
        assert_eq!(
            progress.images().collect::<Vec<_>>(),
            vec![&ImageId::from("img3")]
        );
    }

    #[tokio::test]
    async fn test_progress_storage_json_layout() {
        let kv = Arc::new(KvStorage::new());
        let storage = ProgressStorage::new(kv.clone());

        // Nothing stored yet
        assert!(storage.load().await.unwrap().is_empty());

        let mut progress = DeliveryProgress::new();
        progress.record(&ImageId::from("img1"), &channel("@bravo"));
        progress.record(&ImageId::from("img1"), &channel("@alpha"));
        storage.save(&progress).await.unwrap();

        let raw = kv.get("delivery_progress").await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, serde_json::json!({"img1": ["@alpha", "@bravo"]}));

        assert_eq!(storage.load().await.unwrap(), progress);
    }

    #[tokio::test]
    async fn test_progress_storage_tolerates_duplicates_in_stored_sets() {
        let kv = Arc::new(KvStorage::new());
        kv.set(
            "delivery_progress",
            r#"{"img1": ["@alpha", "@alpha"]}"#.to_string(),
        )
        .await
        .unwrap();
        let progress = ProgressStorage::new(kv).load().await.unwrap();
        assert_eq!(progress.channels_for(&ImageId::from("img1")).map(|c| c.len()), Some(1));
    }
}
