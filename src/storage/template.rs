use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::error::StorageError;
use crate::picture::PictureIdentity;

/// A lazily read picture body.
///
/// Nothing is buffered up front, the underlying file handle or network
/// stream is released when the reader is dropped.
pub type PictureReader = Pin<Box<dyn AsyncRead + Send>>;

/// A medium that can hold picture artifacts keyed by checksum.
///
/// Every location is recomputed from the identity on each call, a backend
/// keeps no per-artifact state.
#[async_trait]
pub trait StorageBackend: Sync + Send + 'static {
    /// Persists the bytes at the location derived from `identity`.
    ///
    /// Saving identical content at an occupied location is a no-op
    /// overwrite, so concurrent ingests of the same picture are harmless.
    async fn save(&self, identity: &PictureIdentity, data: Bytes) -> Result<(), StorageError>;

    /// Opens the artifact for reading.
    async fn retrieve(&self, identity: &PictureIdentity) -> Result<PictureReader, StorageError>;

    /// Removes the artifact.
    ///
    /// Deleting an artifact that does not exist succeeds.
    async fn delete(&self, identity: &PictureIdentity) -> Result<(), StorageError>;
}
