use std::fmt;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use rusoto_core::Region;
use uuid::Uuid;

use crate::config::{
    StorageSettings,
    AWS_ACCESS_KEY_ID,
    AWS_BUCKET_NAME,
    AWS_REGION,
    AWS_SECRET_ACCESS_KEY,
};
use crate::error::ConfigError;
use crate::storage::StorageBackend;

use super::filesystem::FileSystemBackend;
use super::object_store::ObjectStoreBackend;

/// The validated choice of storage backend.
///
/// A gallery directory always wins, the object store settings are not
/// even looked at when one is configured.
pub enum BackendConfigs {
    FileSystem {
        directory: PathBuf,
    },
    ObjectStore {
        access_key: String,
        secret_key: String,
        region: Region,
        bucket: String,
    },
}

impl fmt::Debug for BackendConfigs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileSystem { directory } => f
                .debug_struct("FileSystem")
                .field("directory", directory)
                .finish(),
            Self::ObjectStore {
                access_key,
                region,
                bucket,
                ..
            } => f
                .debug_struct("ObjectStore")
                .field("access_key", access_key)
                .field("secret_key", &"<redacted>")
                .field("region", region)
                .field("bucket", bucket)
                .finish(),
        }
    }
}

fn require(value: &Option<String>, key: &'static str) -> Result<String, ConfigError> {
    value.clone().ok_or(ConfigError::Incomplete(key))
}

impl BackendConfigs {
    /// Applies the selection rule to the raw settings.
    pub fn from_settings(settings: &StorageSettings) -> Result<Self, ConfigError> {
        if let Some(directory) = settings.gallery_dir.as_ref() {
            return Ok(Self::FileSystem {
                directory: directory.clone(),
            });
        }

        let access_key = require(&settings.aws_access_key_id, AWS_ACCESS_KEY_ID)?;
        let secret_key = require(&settings.aws_secret_access_key, AWS_SECRET_ACCESS_KEY)?;
        let region_name = require(&settings.aws_region, AWS_REGION)?;
        let bucket = require(&settings.aws_bucket_name, AWS_BUCKET_NAME)?;

        let region = Region::from_str(&region_name).map_err(|e| ConfigError::Invalid {
            key: AWS_REGION,
            value: region_name.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self::ObjectStore {
            access_key,
            secret_key,
            region,
            bucket,
        })
    }

    /// Builds the backend, checking the gallery directory up front so a
    /// misconfigured path fails at boot rather than on the first upload.
    pub fn connect(&self) -> Result<Arc<dyn StorageBackend>, ConfigError> {
        match self {
            Self::FileSystem { directory } => {
                ensure_gallery(directory)?;
                let backend = FileSystemBackend::new(directory.clone());
                info!("Using filesystem picture storage @ {:?}", backend.directory());
                Ok(Arc::new(backend))
            },
            Self::ObjectStore {
                access_key,
                secret_key,
                region,
                bucket,
            } => {
                let backend = ObjectStoreBackend::new(
                    access_key.clone(),
                    secret_key.clone(),
                    region.clone(),
                    bucket.clone(),
                )?;
                info!(
                    "Using object store picture storage, bucket {} in {}",
                    backend.bucket(),
                    region.name(),
                );
                Ok(Arc::new(backend))
            },
        }
    }
}

/// Selects and constructs the process-wide backend.
pub fn select_backend(settings: &StorageSettings) -> Result<Arc<dyn StorageBackend>, ConfigError> {
    BackendConfigs::from_settings(settings)?.connect()
}

fn ensure_gallery(path: &Path) -> Result<(), ConfigError> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ConfigError::GalleryMissing(path.to_path_buf()));
        },
        Err(e) => {
            return Err(ConfigError::GalleryInaccessible {
                path: path.to_path_buf(),
                source: e,
            });
        },
    };

    if !metadata.is_dir() {
        return Err(ConfigError::GalleryNotDirectory(path.to_path_buf()));
    }

    let probe = path.join(format!(".write-probe-{}", Uuid::new_v4()));
    let result = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&probe)
        .and_then(|file| {
            drop(file);
            std::fs::remove_file(&probe)
        });

    result.map_err(|e| ConfigError::GalleryNotWritable {
        path: path.to_path_buf(),
        source: e,
    })
}
