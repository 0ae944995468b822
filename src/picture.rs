use bytes::Bytes;
use chrono::{DateTime, Utc};
use strum::{Display, EnumIter, IntoEnumIterator};

/// The closed set of picture formats accepted for storage.
///
/// The file extension used by the filesystem layout is derived from this,
/// so supporting a new format is a code change rather than configuration.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Display, EnumIter)]
pub enum PictureFormat {
    #[strum(serialize = "image/jpeg")]
    Jpeg,

    #[strum(serialize = "image/png")]
    Png,

    #[strum(serialize = "image/gif")]
    Gif,

    #[strum(serialize = "image/bmp")]
    Bmp,
}

impl PictureFormat {
    /// Matches a declared content type against the allow-list.
    ///
    /// Parameters and letter case are ignored, `IMAGE/PNG; q=1` resolves
    /// to [`PictureFormat::Png`].
    pub fn from_mime(declared: &str) -> Option<Self> {
        let parsed: mime::Mime = declared.trim().parse().ok()?;
        let essence = parsed.essence_str();

        Self::iter().find(|format| format.as_mime_str().eq_ignore_ascii_case(essence))
    }

    #[inline]
    pub fn as_mime_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
        }
    }

    #[inline]
    pub fn as_file_extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
        }
    }
}

/// The identity of a stored picture.
///
/// The checksum is a pure function of the content bytes and is the only
/// key a backend addresses the artifact by. An identity is never mutated
/// once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureIdentity {
    checksum: String,
    mime_type: PictureFormat,
    created_at: DateTime<Utc>,
}

impl PictureIdentity {
    pub fn new(checksum: String, mime_type: PictureFormat, created_at: DateTime<Utc>) -> Self {
        Self {
            checksum,
            mime_type,
            created_at,
        }
    }

    #[inline]
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    #[inline]
    pub fn mime_type(&self) -> PictureFormat {
        self.mime_type
    }

    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Raw upload bytes paired with their identity.
///
/// Transient, only ever persisted through a storage backend.
#[derive(Debug, Clone)]
pub struct PictureBlob {
    pub identity: PictureIdentity,
    pub data: Bytes,
}
