use std::path::PathBuf;

use thiserror::Error;

/// A boxed transport or I/O failure kept as the source of an
/// [`StorageError::Unavailable`].
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while ingesting, retrieving or deleting a picture.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The upload carried no bytes.
    #[error("uploaded content is empty")]
    EmptyContent,

    /// The declared MIME type is not one of the supported picture formats.
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// No artifact exists for the checksum.
    #[error("picture artifact not found: {0}")]
    NotFound(String),

    /// The shard directory could not be prepared.
    ///
    /// The path is kept for logging only, the message names the checksum.
    #[error("failed to prepare storage for picture {checksum}")]
    PrepareStorage {
        checksum: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The storage directory exists but the artifact could not be written.
    #[error("failed to write picture artifact {checksum}")]
    WriteArtifact {
        checksum: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The underlying medium or transport failed.
    #[error("storage unavailable during {operation}")]
    Unavailable {
        operation: &'static str,
        #[source]
        source: BoxedCause,
    },
}

impl StorageError {
    pub fn unavailable(
        operation: &'static str,
        source: impl Into<BoxedCause>,
    ) -> Self {
        Self::Unavailable {
            operation,
            source: source.into(),
        }
    }

    /// Returns `true` for every kind that means the storage medium
    /// failed rather than the request being bad or missing.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::PrepareStorage { .. } | Self::WriteArtifact { .. } | Self::Unavailable { .. }
        )
    }
}

/// Startup errors raised while selecting and constructing a backend.
///
/// Every variant is fatal, the process must not begin serving.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting was absent.
    #[error("missing required setting {0}")]
    Incomplete(&'static str),

    /// A setting was present but its value cannot be used.
    #[error("invalid value {value:?} for setting {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("gallery directory {0:?} does not exist")]
    GalleryMissing(PathBuf),

    /// The gallery path exists but could not be inspected.
    #[error("gallery directory {path:?} cannot be accessed")]
    GalleryInaccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("gallery path {0:?} is not a directory")]
    GalleryNotDirectory(PathBuf),

    #[error("gallery directory {path:?} is not writable")]
    GalleryNotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The object store client could not be built.
    #[error("failed to build object store client: {0}")]
    Client(String),
}
