use std::time::Duration;

use thiserror::Error;

use crate::storages::ImageId;

/// Failure of a key-value or blob store operation
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed stored data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("image `{0}` is already stored")]
    AlreadyExists(ImageId),
    #[error("image `{0}` not found")]
    NotFound(ImageId),
    #[error("invalid image name `{0}`")]
    InvalidName(String),
    #[error("storage request timed out after {0:?}")]
    Timeout(Duration),
}

/// Images of a batch deletion that could not be deleted, the rest of the batch is gone
#[derive(Debug, Error)]
#[error("failed to delete {} images", failed.len())]
pub struct BatchDeleteError {
    pub failed: Vec<(ImageId, StoreError)>,
}

impl BatchDeleteError {
    pub fn ids(&self) -> impl Iterator<Item = &ImageId> {
        self.failed.iter().map(|(id, _)| id)
    }
}

/// Failure of a single outgoing message
#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Request(#[from] teloxide::RequestError),
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
}

/// Invalid or missing startup configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} not found")]
    MissingEnv(String),
    #[error("administrator id is not configured (use --admin-id or ADMIN_USER_ID)")]
    MissingAdmin,
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
