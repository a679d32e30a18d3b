use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Storage request failed for s3://{bucket}/{key}: {reason}")]
    Transport {
        bucket: String,
        key: String,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum ResizeError {
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Failed to encode '{size}' variant: {source}")]
    Encode {
        size: String,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Failed to write archive entry '{name}': {source}")]
    Entry {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Invalid notification batch: {0}")]
    InvalidBatch(#[source] serde_json::Error),

    #[error("Invalid storage event in message {message_id}: {source}")]
    InvalidMessage {
        message_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid storage-change entry #{index} in message {message_id}: {source}")]
    InvalidEntry {
        message_id: String,
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid size definition {var}={value}, expected <width>x<height>")]
    InvalidSize { var: String, value: String },

    #[error("Size '{0}' must have a width and height greater than zero")]
    ZeroDimension(String),

    #[error("Size '{0}' is defined more than once")]
    DuplicateSize(String),

    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: String, value: String },
}

/// Pipeline stage a record was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStage {
    Parsing,
    Fetching,
    Resizing,
    Archiving,
    Uploading,
}

/// Record-level failure. Never escapes the batch; it ends up in the report.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Notification(#[from] NotificationError),

    #[error("Fetch failed: {0}")]
    Fetch(#[source] StorageError),

    #[error(transparent)]
    Resize(#[from] ResizeError),

    #[error("No variant could be produced, all {failed} sizes failed")]
    NoVariants { failed: usize },

    #[error("Resize task aborted: {0}")]
    ResizeTask(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("Upload failed: {0}")]
    Upload(#[source] StorageError),
}

impl PipelineError {
    pub fn stage(&self) -> RecordStage {
        match self {
            PipelineError::Notification(_) => RecordStage::Parsing,
            PipelineError::Fetch(_) => RecordStage::Fetching,
            PipelineError::Resize(_)
            | PipelineError::NoVariants { .. }
            | PipelineError::ResizeTask(_) => RecordStage::Resizing,
            PipelineError::Archive(_) => RecordStage::Archiving,
            PipelineError::Upload(_) => RecordStage::Uploading,
        }
    }
}
