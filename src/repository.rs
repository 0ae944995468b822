use async_trait::async_trait;
use hashbrown::HashMap;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::picture::PictureIdentity;

/// Where picture metadata records live.
///
/// The storage core only ever looks records up by checksum, saves new
/// ones and deletes them, everything else about persistence belongs to
/// the implementor.
#[async_trait]
pub trait PictureRepository: Sync + Send + 'static {
    async fn find_by_checksum(&self, checksum: &str) -> Result<Option<PictureIdentity>, StorageError>;

    /// Persists a record and returns the one now on file.
    ///
    /// When a record for the checksum already exists it is kept and
    /// returned unchanged.
    async fn save(&self, identity: PictureIdentity) -> Result<PictureIdentity, StorageError>;

    async fn delete(&self, identity: &PictureIdentity) -> Result<(), StorageError>;
}

/// A process-local repository.
#[derive(Default)]
pub struct MemoryPictureRepository {
    records: RwLock<HashMap<String, PictureIdentity>>,
}

impl MemoryPictureRepository {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl PictureRepository for MemoryPictureRepository {
    async fn find_by_checksum(&self, checksum: &str) -> Result<Option<PictureIdentity>, StorageError> {
        Ok(self.records.read().await.get(checksum).cloned())
    }

    async fn save(&self, identity: PictureIdentity) -> Result<PictureIdentity, StorageError> {
        let mut records = self.records.write().await;
        let stored = records
            .entry(identity.checksum().to_string())
            .or_insert(identity);

        Ok(stored.clone())
    }

    async fn delete(&self, identity: &PictureIdentity) -> Result<(), StorageError> {
        self.records.write().await.remove(identity.checksum());
        Ok(())
    }
}
