use bytes::Bytes;
use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::error::StorageError;
use crate::picture::{PictureBlob, PictureFormat, PictureIdentity};

/// Hex-encoded SHA-256 of the full byte sequence.
pub fn compute_checksum(data: &[u8]) -> Result<String, StorageError> {
    if data.is_empty() {
        return Err(StorageError::EmptyContent);
    }

    let mut hasher = Sha256::new();
    hasher.update(data);
    Ok(hex::encode(hasher.finalize()))
}

/// Validates a declared content type against the allow-list.
pub fn resolve_format(mime_type: &str) -> Result<PictureFormat, StorageError> {
    PictureFormat::from_mime(mime_type)
        .ok_or_else(|| StorageError::UnsupportedMediaType(mime_type.to_string()))
}

/// Maps a declared content type to the extension used on disk.
pub fn resolve_extension(mime_type: &str) -> Result<&'static str, StorageError> {
    resolve_format(mime_type).map(|format| format.as_file_extension())
}

/// The first four hex characters of a checksum.
#[inline]
pub fn shard(checksum: &str) -> &str {
    checksum.get(..4).unwrap_or(checksum)
}

/// Turns a raw upload into a blob ready for storage.
///
/// The content type is validated first so an unsupported upload never
/// reaches the hashing or storage steps.
pub fn convert(data: Bytes, mime_type: &str) -> Result<PictureBlob, StorageError> {
    let format = resolve_format(mime_type)?;
    let checksum = compute_checksum(&data)?;

    Ok(PictureBlob {
        identity: PictureIdentity::new(checksum, format, Utc::now()),
        data,
    })
}
