use std::{
    collections::HashSet,
    fmt,
    hash::Hash,
    str::FromStr,
    sync::{Arc, LazyLock},
};

use regex::Regex;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use teloxide::types::{ChatId, Recipient, UserId};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{
    error::StoreError,
    storages::kv_storage::{KvStorageTrait, load_json, save_json},
};

const SUBSCRIBERS_KEY: &str = "subscribers";
const CHANNELS_KEY: &str = "channels";

// Public channel username or numeric chat id (private channels use `-100...`)
static CHANNEL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(@[A-Za-z][A-Za-z0-9_]{4,31}|-?[0-9]{1,20})$").unwrap());

/// Broadcast destination managed by the administrator
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Error)]
#[error("`{0}` is not a channel: expected @channel_name or a numeric chat id")]
pub struct InvalidChannelId(String);

impl FromStr for ChannelId {
    type Err = InvalidChannelId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if CHANNEL_ID_RE.is_match(s) {
            // Usernames are case-insensitive
            Ok(ChannelId(s.to_ascii_lowercase()))
        } else {
            Err(InvalidChannelId(s.to_string()))
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&ChannelId> for Recipient {
    fn from(channel: &ChannelId) -> Self {
        match channel.0.parse::<i64>() {
            Ok(id) => Recipient::Id(ChatId(id)),
            Err(_) => Recipient::ChannelUsername(channel.0.clone()),
        }
    }
}

/// End user who subscribed with /start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(pub i64);

impl From<UserId> for SubscriberId {
    fn from(user: UserId) -> Self {
        SubscriberId(ChatId::from(user).0)
    }
}

impl From<SubscriberId> for Recipient {
    fn from(subscriber: SubscriberId) -> Self {
        Recipient::Id(ChatId(subscriber.0))
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Keep the first occurrence of every element
fn unique_in_order<T: Eq + Hash + Clone>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Subscriber and channel lists persisted in the key-value storage.
/// Every mutation is written through immediately.
pub struct RecipientRegistry {
    storage: Arc<dyn KvStorageTrait>,
    // Serializes read-modify-write cycles so concurrent updates are not lost
    write_lock: Mutex<()>,
}

impl RecipientRegistry {
    pub fn new(storage: Arc<dyn KvStorageTrait>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    async fn load_list<T>(&self, key: &str) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned + Eq + Hash + Clone,
    {
        let items: Vec<T> = load_json(self.storage.as_ref(), key).await?;
        Ok(unique_in_order(items))
    }

    async fn insert<T>(&self, key: &str, item: T) -> Result<bool, StoreError>
    where
        T: DeserializeOwned + Serialize + Eq + Hash + Clone,
    {
        let _guard = self.write_lock.lock().await;
        let mut items = self.load_list::<T>(key).await?;
        if items.contains(&item) {
            return Ok(false);
        }
        items.push(item);
        save_json(self.storage.as_ref(), key, &items).await?;
        Ok(true)
    }

    async fn remove<T>(&self, key: &str, item: &T) -> Result<bool, StoreError>
    where
        T: DeserializeOwned + Serialize + Eq + Hash + Clone,
    {
        let _guard = self.write_lock.lock().await;
        let mut items = self.load_list::<T>(key).await?;
        let before = items.len();
        items.retain(|existing| existing != item);
        if items.len() == before {
            return Ok(false);
        }
        save_json(self.storage.as_ref(), key, &items).await?;
        Ok(true)
    }

    pub async fn list_subscribers(&self) -> Result<Vec<SubscriberId>, StoreError> {
        self.load_list(SUBSCRIBERS_KEY).await
    }

    /// Returns `false` if the user was already subscribed
    pub async fn add_subscriber(&self, subscriber: SubscriberId) -> Result<bool, StoreError> {
        self.insert(SUBSCRIBERS_KEY, subscriber).await
    }

    /// Returns `false` if the user was not subscribed
    pub async fn remove_subscriber(&self, subscriber: SubscriberId) -> Result<bool, StoreError> {
        self.remove(SUBSCRIBERS_KEY, &subscriber).await
    }

    pub async fn list_channels(&self) -> Result<Vec<ChannelId>, StoreError> {
        self.load_list(CHANNELS_KEY).await
    }

    /// Returns `false` if the channel was already registered
    pub async fn add_channel(&self, channel: ChannelId) -> Result<bool, StoreError> {
        self.insert(CHANNELS_KEY, channel).await
    }

    /// Returns `false` if the channel was not registered
    pub async fn remove_channel(&self, channel: &ChannelId) -> Result<bool, StoreError> {
        self.remove(CHANNELS_KEY, channel).await
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
    fn test_channel_id_validation() {
        for valid in ["@channel", "@my_pictures_2024", "-1001234567890", "42"] {
            assert!(valid.parse::<ChannelId>().is_ok(), "{} should be valid", valid);
        }
        for invalid in ["channel", "@abc", "@", "", "@with space", "@1channel", "12ab"] {
            assert!(
                invalid.parse::<ChannelId>().is_err(),
                "{} should be invalid",
                invalid
            );
        }
    }

    #[tokio::test]
    async fn test_channel_usernames_ignore_case() {
        let upper: ChannelId = "@Pictures_Daily".parse().unwrap();
        assert_eq!(upper.as_str(), "@pictures_daily");
        assert_eq!(upper, "@pictures_daily".parse().unwrap());

        let registry = RecipientRegistry::new(Arc::new(KvStorage::new()));
        assert!(registry.add_channel(upper).await.unwrap());
        assert!(
            !registry
                .add_channel("@PICTURES_DAILY".parse().unwrap())
                .await
                .unwrap()
        );
        assert_eq!(registry.list_channels().await.unwrap().len(), 1);
        // Non-ASCII letters are not valid in usernames
        assert!("@bildér_kanal".parse::<ChannelId>().is_err());
    }

    #[test]
    fn test_channel_recipient() {
        assert_eq!(
            Recipient::from(&channel("@pictures")),
            Recipient::ChannelUsername("@pictures".to_string())
        );
        assert_eq!(
            Recipient::from(&channel("-1001234")),
            Recipient::Id(ChatId(-1001234))
        );
        assert_eq!(
            Recipient::from(SubscriberId(77)),
            Recipient::Id(ChatId(77))
        );
        assert_eq!(SubscriberId::from(UserId(12345)), SubscriberId(12345));
    }

    #[tokio::test]
    async fn test_registry_set_semantics() {
        let storage = Arc::new(KvStorage::new());
        let registry = RecipientRegistry::new(storage.clone());

        assert!(registry.list_channels().await.unwrap().is_empty());
        assert!(registry.add_channel(channel("@second")).await.unwrap());
        assert!(registry.add_channel(channel("@first")).await.unwrap());
        // Adding again is a no-op
        assert!(!registry.add_channel(channel("@second")).await.unwrap());
        assert_eq!(
            registry.list_channels().await.unwrap(),
            vec![channel("@second"), channel("@first")]
        );

        assert!(registry.remove_channel(&channel("@second")).await.unwrap());
        assert!(!registry.remove_channel(&channel("@second")).await.unwrap());
        assert_eq!(registry.list_channels().await.unwrap(), vec![channel("@first")]);

        assert!(registry.add_subscriber(SubscriberId(1)).await.unwrap());
        assert!(!registry.add_subscriber(SubscriberId(1)).await.unwrap());
        assert!(registry.add_subscriber(SubscriberId(2)).await.unwrap());
        assert!(registry.remove_subscriber(SubscriberId(1)).await.unwrap());
        assert!(!registry.remove_subscriber(SubscriberId(1)).await.unwrap());
        assert_eq!(
            registry.list_subscribers().await.unwrap(),
            vec![SubscriberId(2)]
        );

        // Persisted layout is a plain JSON array
        let raw = storage.get("subscribers").await.unwrap().unwrap();
        let persisted: Vec<i64> = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted, vec![2]);
    }

    #[tokio::test]
    async fn test_registry_collapses_persisted_duplicates() {
        let storage = Arc::new(KvStorage::new());
        storage
            .set("channels", r#"["@alpha1", "@beta22", "@alpha1"]"#.to_string())
            .await
            .unwrap();
        storage
            .set("subscribers", "[3, 1, 3, 2, 1]".to_string())
            .await
            .unwrap();
        let registry = RecipientRegistry::new(storage.clone());

        assert_eq!(
            registry.list_channels().await.unwrap(),
            vec![channel("@alpha1"), channel("@beta22")]
        );
        assert_eq!(
            registry.list_subscribers().await.unwrap(),
            vec![SubscriberId(3), SubscriberId(1), SubscriberId(2)]
        );

        // The next write persists the de-duplicated list
        registry.add_subscriber(SubscriberId(4)).await.unwrap();
        let raw = storage.get("subscribers").await.unwrap().unwrap();
        let persisted: Vec<i64> = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted, vec![3, 1, 2, 4]);
    }

    #[tokio::test]
    async fn test_concurrent_subscriptions_are_not_lost() {
        let registry = Arc::new(RecipientRegistry::new(Arc::new(KvStorage::new())));
        let tasks: Vec<_> = (0..20)
            .map(|id| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.add_subscriber(SubscriberId(id)).await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().unwrap());
        }
        assert_eq!(registry.list_subscribers().await.unwrap().len(), 20);
    }
}
