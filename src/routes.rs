use std::sync::Arc;

use chrono::{DateTime, Utc};
use poem::error::ResponseError;
use poem::http::StatusCode;
use poem::web::Data;
use poem::{get, handler, Body, Endpoint, EndpointExt, Response, Route};
use poem_openapi::param::{Path, Query};
use poem_openapi::payload::{Binary, Json};
use poem_openapi::{ApiResponse, Object, OpenApi, OpenApiService};

use crate::controller::PictureController;
use crate::error::StorageError;
use crate::picture::PictureIdentity;

impl ResponseError for StorageError {
    fn status(&self) -> StatusCode {
        if self.is_unavailable() {
            return StatusCode::INTERNAL_SERVER_ERROR;
        }

        match self {
            Self::EmptyContent => StatusCode::BAD_REQUEST,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Object, Debug)]
pub struct PictureInfo {
    /// The hex SHA-256 of the picture's content.
    ///
    /// This is the picture's identity, uploading the same bytes again
    /// always yields the same checksum.
    checksum: String,

    /// The declared media type the picture was first stored with.
    mime_type: String,

    created_at: DateTime<Utc>,

    /// Where the raw picture can be downloaded from.
    file_url: String,
}

impl From<&PictureIdentity> for PictureInfo {
    fn from(picture: &PictureIdentity) -> Self {
        Self {
            checksum: picture.checksum().to_string(),
            mime_type: picture.mime_type().to_string(),
            created_at: picture.created_at(),
            file_url: format!("/files/{}", picture.checksum()),
        }
    }
}

#[derive(ApiResponse)]
pub enum UploadResponse {
    /// The picture was new and has been stored.
    #[oai(status = 201)]
    Created(Json<PictureInfo>),

    /// Identical content was already stored, nothing was written.
    #[oai(status = 200)]
    Existing(Json<PictureInfo>),
}

#[derive(ApiResponse)]
pub enum MetadataResponse {
    #[oai(status = 200)]
    Found(Json<PictureInfo>),

    /// No picture with that checksum is on record.
    #[oai(status = 404)]
    NotFound,
}

#[derive(ApiResponse)]
pub enum DeleteResponse {
    #[oai(status = 204)]
    Deleted,

    /// No picture with that checksum is on record.
    #[oai(status = 404)]
    NotFound,
}

pub struct PictureApi {
    controller: Arc<PictureController>,
}

impl PictureApi {
    pub fn new(controller: Arc<PictureController>) -> Self {
        Self { controller }
    }
}

#[OpenApi]
impl PictureApi {
    /// Upload a picture
    ///
    /// The body is the raw picture, `mime_type` declares its format.
    /// Uploading content that is already stored returns the existing record.
    #[oai(path = "/files", method = "post")]
    async fn upload(
        &self,
        mime_type: Query<String>,
        file: Binary<Vec<u8>>,
    ) -> poem::Result<UploadResponse> {
        let ingested = self.controller.ingest(file.0.into(), &mime_type.0).await?;
        let info = Json(PictureInfo::from(&ingested.picture));

        if ingested.created {
            Ok(UploadResponse::Created(info))
        } else {
            Ok(UploadResponse::Existing(info))
        }
    }

    /// Get a picture's metadata
    #[oai(path = "/pictures/:checksum", method = "get")]
    async fn metadata(&self, checksum: Path<String>) -> poem::Result<MetadataResponse> {
        let response = match self.controller.lookup(&checksum.0).await? {
            Some(picture) => MetadataResponse::Found(Json(PictureInfo::from(&picture))),
            None => MetadataResponse::NotFound,
        };

        Ok(response)
    }

    /// Delete a picture
    ///
    /// Removes both the metadata record and the stored artifact.
    #[oai(path = "/pictures/:checksum", method = "delete")]
    async fn delete(&self, checksum: Path<String>) -> poem::Result<DeleteResponse> {
        let response = match self.controller.purge(&checksum.0).await? {
            Some(_) => DeleteResponse::Deleted,
            None => DeleteResponse::NotFound,
        };

        Ok(response)
    }
}

/// Streams a stored picture back with the media type it was uploaded as.
#[handler]
async fn fetch_file(
    poem::web::Path(checksum): poem::web::Path<String>,
    controller: Data<&Arc<PictureController>>,
) -> poem::Result<Response> {
    let picture = controller
        .lookup(&checksum)
        .await?
        .ok_or_else(|| StorageError::NotFound(checksum.clone()))?;

    let reader = controller.retrieve(&picture).await?;

    Ok(Response::builder()
        .content_type(picture.mime_type().as_mime_str())
        .body(Body::from_async_read(reader)))
}

/// Builds the HTTP application around a controller.
pub fn app(controller: Arc<PictureController>) -> impl Endpoint {
    let api_service = OpenApiService::new(
        PictureApi::new(controller.clone()),
        "Gallery API",
        env!("CARGO_PKG_VERSION"),
    );
    let ui = api_service.redoc();

    Route::new()
        .nest("/v1", api_service)
        .nest("/docs", ui)
        .at("/files/:checksum", get(fetch_file))
        .data(controller)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cause = std::io::Error::new(std::io::ErrorKind::Other, "gone");
        assert_eq!(StorageError::EmptyContent.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            StorageError::UnsupportedMediaType("text/plain".to_string()).status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
        );
        assert_eq!(StorageError::NotFound("abcd".to_string()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            StorageError::unavailable("retrieve", cause).status(),
            StatusCode::INTERNAL_SERVER_ERROR,
        );
    }
}
