use std::{collections::HashMap, io::ErrorKind, path::PathBuf, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};
use tokio::{fs, sync::Mutex};

use crate::error::StoreError;

const TEMP_FILE_SUFFIX: &str = ".tmp";

/// Trait for key-value storage of text blobs
#[async_trait::async_trait]
pub trait KvStorageTrait: Send + Sync {
    /// Get the value stored under `key`, `None` if the key was never set
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
}

/// Load a JSON-encoded value, absent key gives the default value
pub async fn load_json<T>(storage: &dyn KvStorageTrait, key: &str) -> Result<T, StoreError>
where
    T: DeserializeOwned + Default,
{
    match storage.get(key).await? {
        Some(text) => Ok(serde_json::from_str(&text)?),
        None => Ok(T::default()),
    }
}

/// Store a value as pretty-printed JSON
pub async fn save_json<T>(storage: &dyn KvStorageTrait, key: &str, value: &T) -> Result<(), StoreError>
where
    T: Serialize + ?Sized,
{
    let text = serde_json::to_string_pretty(value)?;
    storage.set(key, text).await
}

/// In-memory key-value storage, contents are lost on restart
#[derive(Clone, Default)]
pub struct KvStorage {
    data: Arc<Mutex<HashMap<String, String>>>,
}

impl KvStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KvStorageTrait for KvStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let storage_guard = self.data.lock().await;
        Ok(storage_guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut storage_guard = self.data.lock().await;
        storage_guard.insert(key.to_string(), value);
        Ok(())
    }
}

/// Persistent key-value storage keeping every key in its own `<key>.json` file
#[derive(Clone)]
pub struct PersistentKvStorage {
    storage_dir: PathBuf,
}

impl PersistentKvStorage {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
        }
    }

    fn get_file_path(&self, key: &str) -> PathBuf {
        self.storage_dir.join(format!("{}.json", key))
    }
}

#[async_trait::async_trait]
impl KvStorageTrait for PersistentKvStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let file_path = self.get_file_path(key);
        match fs::read_to_string(&file_path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        fs::create_dir_all(&self.storage_dir).await?;
        let file_path = self.get_file_path(key);
        // Write next to the target and rename so readers never see a half-written file
        let temp_path = self
            .storage_dir
            .join(format!("{}.json{}", key, TEMP_FILE_SUFFIX));
        fs::write(&temp_path, value).await?;
        fs::rename(&temp_path, &file_path).await?;
        log::debug!("Saved key {} to {:?}", key, file_path);
        Ok(())
    }
}
