use std::sync::Arc;

use bytes::Bytes;

use crate::codec;
use crate::error::StorageError;
use crate::picture::PictureIdentity;
use crate::repository::PictureRepository;
use crate::storage::{PictureReader, StorageBackend};

/// The result of ingesting an upload.
#[derive(Debug, Clone)]
pub struct Ingested {
    /// The identity on record for the uploaded content.
    pub picture: PictureIdentity,

    /// `false` when identical content was already stored and the
    /// backend was not touched.
    pub created: bool,
}

/// Orchestrates deduplicated storage of uploaded pictures.
///
/// Two concurrent uploads of identical new content may both reach the
/// backend. That is harmless as saves of identical bytes are idempotent,
/// but callers needing at-most-once writes must serialise per checksum
/// themselves.
pub struct PictureController {
    storage: Arc<dyn StorageBackend>,
    repository: Arc<dyn PictureRepository>,
}

impl PictureController {
    pub fn new(storage: Arc<dyn StorageBackend>, repository: Arc<dyn PictureRepository>) -> Self {
        Self {
            storage,
            repository,
        }
    }

    /// Stores an upload unless its content is already on record.
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn ingest(&self, data: Bytes, mime_type: &str) -> Result<Ingested, StorageError> {
        let blob = codec::convert(data, mime_type)?;

        let existing = self
            .repository
            .find_by_checksum(blob.identity.checksum())
            .await?;
        if let Some(picture) = existing {
            debug!("Picture {} already stored, skipping write", picture.checksum());
            return Ok(Ingested {
                picture,
                created: false,
            });
        }

        self.storage.save(&blob.identity, blob.data).await?;
        let picture = self.repository.save(blob.identity).await?;

        info!("Stored new picture {} ({})", picture.checksum(), picture.mime_type());
        Ok(Ingested {
            picture,
            created: true,
        })
    }

    /// Opens a picture whose metadata record the caller has already found.
    pub async fn retrieve(&self, identity: &PictureIdentity) -> Result<PictureReader, StorageError> {
        self.storage.retrieve(identity).await
    }

    /// Removes the stored artifact, the metadata record is left to the caller.
    pub async fn remove(&self, identity: &PictureIdentity) -> Result<(), StorageError> {
        self.storage.delete(identity).await
    }

    pub async fn lookup(&self, checksum: &str) -> Result<Option<PictureIdentity>, StorageError> {
        self.repository.find_by_checksum(checksum).await
    }

    /// Deletes the metadata record and then the artifact.
    ///
    /// Returns `None` when no record exists for the checksum. If the artifact
    /// delete fails the record is already gone, the orphaned artifact is
    /// logged and the error returned.
    #[instrument(skip(self))]
    pub async fn purge(&self, checksum: &str) -> Result<Option<PictureIdentity>, StorageError> {
        let picture = match self.repository.find_by_checksum(checksum).await? {
            Some(picture) => picture,
            None => return Ok(None),
        };

        self.repository.delete(&picture).await?;
        if let Err(e) = self.remove(&picture).await {
            error!(
                "Record for picture {} removed but its artifact was not, it is now orphaned: {}",
                picture.checksum(),
                e,
            );
            return Err(e);
        }

        info!("Deleted picture {}", picture.checksum());
        Ok(Some(picture))
    }
}
