use std::{
    collections::HashMap,
    fmt,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use tokio::{fs, sync::Mutex};

use crate::error::{BatchDeleteError, StoreError};

const TEMP_FILE_SUFFIX: &str = ".tmp";

/// Stable identifier of a stored image, assigned by the blob storage
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub String);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageId {
    fn from(s: &str) -> Self {
        ImageId(s.to_string())
    }
}

/// How the messenger gets the image content without another upload step
#[derive(Clone, PartialEq)]
pub enum PhotoLocator {
    File(PathBuf),
    Memory(Arc<[u8]>),
}

impl fmt::Debug for PhotoLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhotoLocator::File(path) => f.debug_tuple("File").field(path).finish(),
            PhotoLocator::Memory(bytes) => write!(f, "Memory({} bytes)", bytes.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub id: ImageId,
    pub locator: PhotoLocator,
}

/// Trait for image blob storage grouped by folders
#[async_trait::async_trait]
pub trait BlobStorageTrait: Send + Sync {
    /// List all images currently stored in `folder`
    async fn list_images(&self, folder: &str) -> Result<Vec<Image>, StoreError>;

    /// Store a new image under `name`, fails if the name is already taken
    async fn upload_image(&self, folder: &str, name: &str, bytes: Vec<u8>)
    -> Result<Image, StoreError>;

    /// Delete a single image
    async fn delete_image(&self, folder: &str, id: &ImageId) -> Result<(), StoreError>;

    /// Delete several images in one request. Every id is attempted, the error lists
    /// only the images that are still stored.
    async fn delete_images(&self, folder: &str, ids: &[ImageId]) -> Result<(), BatchDeleteError> {
        delete_each(self, folder, ids).await
    }
}

/// Delete images one by one. An image that is already gone counts as deleted.
pub async fn delete_each<S>(storage: &S, folder: &str, ids: &[ImageId]) -> Result<(), BatchDeleteError>
where
    S: BlobStorageTrait + ?Sized,
{
    let mut failed = Vec::new();
    for id in ids {
        match storage.delete_image(folder, id).await {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => log::debug!("Image {} is already deleted", id),
            Err(e) => failed.push((id.clone(), e)),
        }
    }
    if failed.is_empty() {
        Ok(())
    } else {
        Err(BatchDeleteError { failed })
    }
}

/// Image names become file names, so anything resembling a path is rejected
fn validate_name(name: &str) -> Result<(), StoreError> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.ends_with(TEMP_FILE_SUFFIX)
        || name.contains(['/', '\\']);
    if invalid {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// In-memory blob storage keeping image bytes in insertion order
#[derive(Clone, Default)]
pub struct BlobStorage {
    folders: Arc<Mutex<HashMap<String, Vec<(ImageId, Arc<[u8]>)>>>>,
}

impl BlobStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl BlobStorageTrait for BlobStorage {
    async fn list_images(&self, folder: &str) -> Result<Vec<Image>, StoreError> {
        let storage_guard = self.folders.lock().await;
        Ok(storage_guard
            .get(folder)
            .map(|images| {
                images
                    .iter()
                    .map(|(id, bytes)| Image {
                        id: id.clone(),
                        locator: PhotoLocator::Memory(bytes.clone()),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn upload_image(
        &self,
        folder: &str,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<Image, StoreError> {
        validate_name(name)?;
        let id = ImageId::from(name);
        let mut storage_guard = self.folders.lock().await;
        let images = storage_guard.entry(folder.to_string()).or_default();
        if images.iter().any(|(existing, _)| *existing == id) {
            return Err(StoreError::AlreadyExists(id));
        }
        let bytes: Arc<[u8]> = bytes.into();
        images.push((id.clone(), bytes.clone()));
        Ok(Image {
            id,
            locator: PhotoLocator::Memory(bytes),
        })
    }

    async fn delete_image(&self, folder: &str, id: &ImageId) -> Result<(), StoreError> {
        let mut storage_guard = self.folders.lock().await;
        let Some(images) = storage_guard.get_mut(folder) else {
            return Err(StoreError::NotFound(id.clone()));
        };
        let before = images.len();
        images.retain(|(existing, _)| existing != id);
        if images.len() == before {
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(())
    }
}

/// Blob storage backed by a local directory, one subdirectory per folder
#[derive(Clone)]
pub struct PersistentBlobStorage {
    storage_dir: PathBuf,
}

impl PersistentBlobStorage {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
        }
    }

    fn folder_path(&self, folder: &str) -> PathBuf {
        self.storage_dir.join(folder)
    }

    fn image_path(&self, folder: &str, id: &ImageId) -> PathBuf {
        self.folder_path(folder).join(&id.0)
    }
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

#[async_trait::async_trait]
impl BlobStorageTrait for PersistentBlobStorage {
    async fn list_images(&self, folder: &str) -> Result<Vec<Image>, StoreError> {
        let folder_path = self.folder_path(folder);
        let mut entries = match fs::read_dir(&folder_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fs::create_dir_all(&folder_path).await?;
                log::info!("Created image folder {:?}", folder_path);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut images = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if validate_name(&file_name).is_err() || !is_file(&entry.path()).await {
                continue;
            }
            images.push(Image {
                id: ImageId(file_name),
                locator: PhotoLocator::File(entry.path()),
            });
        }
        images.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(images)
    }

    async fn upload_image(
        &self,
        folder: &str,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<Image, StoreError> {
        validate_name(name)?;
        let id = ImageId::from(name);
        let folder_path = self.folder_path(folder);
        fs::create_dir_all(&folder_path).await?;

        let path = self.image_path(folder, &id);
        if is_file(&path).await {
            return Err(StoreError::AlreadyExists(id));
        }
        let temp_path = folder_path.join(format!("{}{}", name, TEMP_FILE_SUFFIX));
        fs::write(&temp_path, bytes).await?;
        fs::rename(&temp_path, &path).await?;
        log::info!("Stored image {} at {:?}", id, path);
        Ok(Image {
            id,
            locator: PhotoLocator::File(path),
        })
    }

    async fn delete_image(&self, folder: &str, id: &ImageId) -> Result<(), StoreError> {
        validate_name(&id.0)?;
        match fs::remove_file(self.image_path(folder, id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(id.clone())),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(images: &[Image]) -> Vec<String> {
        images.iter().map(|image| image.id.0.clone()).collect()
    }

    #[tokio::test]
    async fn test_memory_upload_list_delete() {
        let storage = BlobStorage::new();
        assert!(storage.list_images("images").await.unwrap().is_empty());

        storage
            .upload_image("images", "b.jpg", vec![1, 2, 3])
            .await
            .unwrap();
        storage
            .upload_image("images", "a.jpg", vec![4])
            .await
            .unwrap();
        // Other folders are independent
        storage
            .upload_image("archive", "c.jpg", vec![5])
            .await
            .unwrap();

        let images = storage.list_images("images").await.unwrap();
        assert_eq!(ids(&images), vec!["b.jpg", "a.jpg"]);
        assert_eq!(images[0].locator, PhotoLocator::Memory(vec![1u8, 2, 3].into()));

        // Duplicate names are rejected
        let duplicate = storage.upload_image("images", "a.jpg", vec![9]).await;
        assert!(matches!(duplicate, Err(StoreError::AlreadyExists(_))));

        storage
            .delete_images("images", &[ImageId::from("a.jpg"), ImageId::from("b.jpg")])
            .await
            .unwrap();
        assert!(storage.list_images("images").await.unwrap().is_empty());

        let missing = storage.delete_image("images", &ImageId::from("a.jpg")).await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_batch_delete_attempts_every_image() {
        let storage = BlobStorage::new();
        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            storage.upload_image("images", name, vec![1]).await.unwrap();
        }

        // A missing image does not stop the batch and is not an error
        storage
            .delete_images(
                "images",
                &[ImageId::from("a.jpg"), ImageId::from("gone.jpg"), ImageId::from("c.jpg")],
            )
            .await
            .unwrap();
        assert_eq!(ids(&storage.list_images("images").await.unwrap()), vec!["b.jpg"]);
    }

    #[tokio::test]
    async fn test_invalid_names() {
        let storage = BlobStorage::new();
        for name in ["", "../escape.jpg", "dir/file.jpg", ".hidden", "partial.jpg.tmp"] {
            let result = storage.upload_image("images", name, vec![1]).await;
            assert!(
                matches!(result, Err(StoreError::InvalidName(_))),
                "name {:?} should be rejected",
                name
            );
        }
    }

    #[tokio::test]
    async fn test_persistent_storage_files() {
        let dir = std::env::temp_dir().join(format!("photocast-blobs-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let storage = PersistentBlobStorage::new(&dir);

        // Missing folder is created and reads as empty
        assert!(storage.list_images("images").await.unwrap().is_empty());
        assert!(dir.join("images").is_dir());

        let image = storage
            .upload_image("images", "photo1.jpg", b"jpeg".to_vec())
            .await
            .unwrap();
        assert_eq!(image.locator, PhotoLocator::File(dir.join("images/photo1.jpg")));
        storage
            .upload_image("images", "photo0.jpg", b"jpeg".to_vec())
            .await
            .unwrap();

        // Stray temporary files are not listed
        std::fs::write(dir.join("images/partial.jpg.tmp"), b"x").unwrap();

        let images = storage.list_images("images").await.unwrap();
        assert_eq!(ids(&images), vec!["photo0.jpg", "photo1.jpg"]);

        let duplicate = storage
            .upload_image("images", "photo1.jpg", b"jpeg".to_vec())
            .await;
        assert!(matches!(duplicate, Err(StoreError::AlreadyExists(_))));

        storage
            .delete_image("images", &ImageId::from("photo1.jpg"))
            .await
            .unwrap();
        assert_eq!(
            ids(&storage.list_images("images").await.unwrap()),
            vec!["photo0.jpg"]
        );
        let missing = storage
            .delete_image("images", &ImageId::from("photo1.jpg"))
            .await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
