use async_trait::async_trait;
use bytes::Bytes;
use rusoto_core::credential::StaticProvider;
use rusoto_core::{HttpClient, Region, RusotoError};
use rusoto_s3::{
    DeleteObjectRequest,
    GetObjectError,
    GetObjectRequest,
    PutObjectRequest,
    S3Client,
    StreamingBody,
    S3,
};

use crate::error::{ConfigError, StorageError};
use crate::picture::PictureIdentity;
use crate::storage::{PictureReader, StorageBackend};

/// Stores pictures as objects in a single bucket.
///
/// The object key is the bare checksum, the content type travels as object
/// metadata rather than as a key suffix. Transport failures never escape as
/// rusoto types, they are wrapped as [`StorageError::Unavailable`].
pub struct ObjectStoreBackend {
    bucket: String,
    client: S3Client,
}

impl ObjectStoreBackend {
    pub fn new(
        access_key: String,
        secret_key: String,
        region: Region,
        bucket: String,
    ) -> Result<Self, ConfigError> {
        let dispatcher = HttpClient::new().map_err(|e| ConfigError::Client(e.to_string()))?;
        let creds = StaticProvider::new_minimal(access_key, secret_key);
        let client = S3Client::new_with(dispatcher, creds, region);

        Ok(Self::with_client(client, bucket))
    }

    /// Wraps a pre-built client.
    pub fn with_client(client: S3Client, bucket: String) -> Self {
        Self { bucket, client }
    }

    #[inline]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    #[inline]
    fn format_key(&self, identity: &PictureIdentity) -> String {
        identity.checksum().to_string()
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    #[instrument(skip(self, identity, data), fields(checksum = %identity.checksum()))]
    async fn save(&self, identity: &PictureIdentity, data: Bytes) -> Result<(), StorageError> {
        let key = self.format_key(identity);

        debug!("Storing picture in bucket {} @ {}", &self.bucket, &key);
        let request = PutObjectRequest {
            bucket: self.bucket.clone(),
            key,
            content_type: Some(identity.mime_type().as_mime_str().to_string()),
            content_length: Some(data.len() as i64),
            body: Some(StreamingBody::from(data.to_vec())),
            ..Default::default()
        };

        self.client.put_object(request).await.map_err(|e| {
            error!("Error while uploading picture to bucket {}: {}", &self.bucket, e);
            StorageError::unavailable("save", e)
        })?;

        Ok(())
    }

    #[instrument(skip(self, identity), fields(checksum = %identity.checksum()))]
    async fn retrieve(&self, identity: &PictureIdentity) -> Result<PictureReader, StorageError> {
        let key = self.format_key(identity);

        debug!("Retrieving picture in bucket {} @ {}", &self.bucket, &key);
        let request = GetObjectRequest {
            bucket: self.bucket.clone(),
            key: key.clone(),
            ..Default::default()
        };

        let output = match self.client.get_object(request).await {
            Ok(output) => output,
            Err(RusotoError::Service(GetObjectError::NoSuchKey(_))) => {
                return Err(StorageError::NotFound(key));
            },
            Err(RusotoError::Unknown(ref response)) if response.status.as_u16() == 404 => {
                return Err(StorageError::NotFound(key));
            },
            Err(other) => {
                error!("Error while downloading picture from bucket {}: {}", &self.bucket, other);
                return Err(StorageError::unavailable("retrieve", other));
            },
        };

        match output.body {
            Some(body) => Ok(Box::pin(body.into_async_read())),
            None => Ok(Box::pin(tokio::io::empty())),
        }
    }

    #[instrument(skip(self, identity), fields(checksum = %identity.checksum()))]
    async fn delete(&self, identity: &PictureIdentity) -> Result<(), StorageError> {
        let key = self.format_key(identity);

        debug!("Purging picture in bucket {} @ {}", &self.bucket, &key);
        let request = DeleteObjectRequest {
            bucket: self.bucket.clone(),
            key,
            ..Default::default()
        };

        self.client.delete_object(request).await.map_err(|e| {
            error!("Error while deleting picture from bucket {}: {}", &self.bucket, e);
            StorageError::unavailable("delete", e)
        })?;

        Ok(())
    }
}
