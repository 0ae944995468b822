use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::codec;
use crate::error::StorageError;
use crate::picture::PictureIdentity;
use crate::storage::{PictureReader, StorageBackend};

/// Stores pictures under `{directory}/{checksum[0:4]}/{checksum}.{ext}`.
///
/// The four character shard keeps any single directory to roughly
/// 1/65536th of the artifacts.
pub struct FileSystemBackend {
    directory: PathBuf,
}

impl FileSystemBackend {
    pub fn new(dir: PathBuf) -> Self {
        Self { directory: dir }
    }

    #[inline]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The shard directory and the artifact path for a picture.
    fn format_path(&self, identity: &PictureIdentity) -> Result<(PathBuf, PathBuf), StorageError> {
        let extension = codec::resolve_extension(identity.mime_type().as_mime_str())?;
        let store_in = self.directory.join(codec::shard(identity.checksum()));
        let path = store_in.join(format!("{}.{}", identity.checksum(), extension));

        Ok((store_in, path))
    }
}

async fn write_then_rename(temp_path: &Path, path: &Path, data: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(temp_path, data).await?;
    tokio::fs::rename(temp_path, path).await
}

#[async_trait]
impl StorageBackend for FileSystemBackend {
    #[instrument(skip(self, identity, data), fields(checksum = %identity.checksum()))]
    async fn save(&self, identity: &PictureIdentity, data: Bytes) -> Result<(), StorageError> {
        let (store_in, path) = self.format_path(identity)?;

        if let Err(e) = tokio::fs::create_dir_all(&store_in).await {
            warn!("Creation of shard directory {:?} failed: {}", &store_in, e);
            return Err(StorageError::PrepareStorage {
                checksum: identity.checksum().to_string(),
                path: store_in,
                source: e,
            });
        }

        // Readers only ever see a complete artifact.
        let temp_path = store_in.join(format!(".{}.{}.tmp", identity.checksum(), Uuid::new_v4()));

        debug!("Storing picture @ {:?}", &path);
        if let Err(e) = write_then_rename(&temp_path, &path, &data).await {
            warn!("Recording of picture file {:?} failed: {}", &path, e);
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StorageError::WriteArtifact {
                checksum: identity.checksum().to_string(),
                path,
                source: e,
            });
        }

        Ok(())
    }

    #[instrument(skip(self, identity), fields(checksum = %identity.checksum()))]
    async fn retrieve(&self, identity: &PictureIdentity) -> Result<PictureReader, StorageError> {
        let (_, path) = self.format_path(identity)?;

        debug!("Retrieving picture @ {:?}", &path);
        match tokio::fs::File::open(&path).await {
            Ok(file) => Ok(Box::pin(file)),
            Err(ref e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(identity.checksum().to_string()))
            },
            Err(other) => {
                warn!("Opening picture file {:?} failed: {}", &path, other);
                Err(StorageError::unavailable("retrieve", other))
            },
        }
    }

    #[instrument(skip(self, identity), fields(checksum = %identity.checksum()))]
    async fn delete(&self, identity: &PictureIdentity) -> Result<(), StorageError> {
        let (_, path) = self.format_path(identity)?;

        debug!("Purging picture @ {:?}", &path);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(ref e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(other) => {
                warn!("Deleting picture file {:?} failed: {}", &path, other);
                Err(StorageError::unavailable("delete", other))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::picture::PictureFormat;

    fn identity(checksum: &str, format: PictureFormat) -> PictureIdentity {
        PictureIdentity::new(checksum.to_string(), format, Utc::now())
    }

    async fn read_all(mut reader: PictureReader) -> Vec<u8> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn test_save_and_retrieve() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileSystemBackend::new(temp_dir.path().to_path_buf());

        let blob = codec::convert(Bytes::from_static(b"OKLAHOMA"), "image/jpeg").unwrap();
        backend.save(&blob.identity, blob.data.clone()).await.unwrap();

        let retrieved = read_all(backend.retrieve(&blob.identity).await.unwrap()).await;
        assert_eq!(retrieved, b"OKLAHOMA");
    }

    #[tokio::test]
    async fn test_layout_is_sharded_by_checksum_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileSystemBackend::new(temp_dir.path().to_path_buf());

        let checksum = format!("abcd1234{}", "0".repeat(56));
        let picture = identity(&checksum, PictureFormat::Png);
        backend.save(&picture, Bytes::from_static(b"png bytes")).await.unwrap();

        let expected = temp_dir.path().join("abcd").join(format!("{}.png", checksum));
        assert!(expected.is_file());
    }

    #[tokio::test]
    async fn test_oklahoma_lands_at_the_expected_path() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileSystemBackend::new(temp_dir.path().to_path_buf());

        let blob = codec::convert(Bytes::from_static(b"OKLAHOMA"), "image/jpeg").unwrap();
        backend.save(&blob.identity, blob.data).await.unwrap();

        let checksum = blob.identity.checksum();
        let expected = temp_dir
            .path()
            .join(&checksum[..4])
            .join(format!("{}.jpg", checksum));
        assert_eq!(tokio::fs::read(expected).await.unwrap(), b"OKLAHOMA");
    }

    #[tokio::test]
    async fn test_repeated_save_keeps_a_single_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileSystemBackend::new(temp_dir.path().to_path_buf());

        let blob = codec::convert(Bytes::from_static(b"twice"), "image/gif").unwrap();
        backend.save(&blob.identity, blob.data.clone()).await.unwrap();
        backend.save(&blob.identity, blob.data.clone()).await.unwrap();

        let shard_dir = temp_dir.path().join(codec::shard(blob.identity.checksum()));
        let entries = std::fs::read_dir(shard_dir).unwrap().count();
        assert_eq!(entries, 1);

        let retrieved = read_all(backend.retrieve(&blob.identity).await.unwrap()).await;
        assert_eq!(retrieved, b"twice");
    }

    #[tokio::test]
    async fn test_delete_keeps_the_shard_directory() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileSystemBackend::new(temp_dir.path().to_path_buf());

        let blob = codec::convert(Bytes::from_static(b"delete me"), "image/bmp").unwrap();
        backend.save(&blob.identity, blob.data).await.unwrap();
        backend.delete(&blob.identity).await.unwrap();

        let result = backend.retrieve(&blob.identity).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));

        let shard_dir = temp_dir.path().join(codec::shard(blob.identity.checksum()));
        assert!(shard_dir.is_dir());
    }

    #[tokio::test]
    async fn test_delete_of_missing_artifact_succeeds() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileSystemBackend::new(temp_dir.path().to_path_buf());

        let blob = codec::convert(Bytes::from_static(b"never stored"), "image/png").unwrap();
        backend.delete(&blob.identity).await.unwrap();
    }

    #[tokio::test]
    async fn test_retrieve_missing_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileSystemBackend::new(temp_dir.path().to_path_buf());

        let blob = codec::convert(Bytes::from_static(b"ghost"), "image/png").unwrap();
        let result = backend.retrieve(&blob.identity).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_error_messages_name_the_checksum_not_the_path() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileSystemBackend::new(temp_dir.path().to_path_buf());
        let root = temp_dir.path().display().to_string();

        let blob = codec::convert(Bytes::from_static(b"ghost"), "image/png").unwrap();
        let checksum = blob.identity.checksum();
        let missing = backend.retrieve(&blob.identity).await.err().unwrap().to_string();
        assert!(missing.contains(checksum));
        assert!(!missing.contains(&root));

        let shard_dir = temp_dir.path().join(codec::shard(checksum));
        std::fs::create_dir_all(shard_dir.join(format!("{}.png", checksum))).unwrap();
        let blocked = backend.save(&blob.identity, blob.data.clone()).await.err().unwrap();
        assert!(matches!(blocked, StorageError::WriteArtifact { .. }));
        assert!(blocked.to_string().contains(checksum));
        assert!(!blocked.to_string().contains(&root));
    }

    #[tokio::test]
    async fn test_shard_path_occupied_by_file_fails_preparation() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileSystemBackend::new(temp_dir.path().to_path_buf());

        let blob = codec::convert(Bytes::from_static(b"blocked"), "image/png").unwrap();
        let shard_dir = temp_dir.path().join(codec::shard(blob.identity.checksum()));
        std::fs::write(&shard_dir, b"not a directory").unwrap();

        let result = backend.save(&blob.identity, blob.data).await;
        match result {
            Err(err @ StorageError::PrepareStorage { .. }) => assert!(err.is_unavailable()),
            other => panic!("expected a preparation failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_artifact_path_occupied_by_directory_fails_write() {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileSystemBackend::new(temp_dir.path().to_path_buf());

        let blob = codec::convert(Bytes::from_static(b"blocked"), "image/jpeg").unwrap();
        let checksum = blob.identity.checksum();
        let shard_dir = temp_dir.path().join(codec::shard(checksum));
        std::fs::create_dir_all(shard_dir.join(format!("{}.jpg", checksum))).unwrap();

        let result = backend.save(&blob.identity, blob.data.clone()).await;
        assert!(matches!(result, Err(StorageError::WriteArtifact { .. })));

        // The temporary file does not outlive the failed write.
        let entries = std::fs::read_dir(&shard_dir).unwrap().count();
        assert_eq!(entries, 1);
    }
}
