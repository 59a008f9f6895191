use crate::types::cid::{Cid, CidLink};
use crate::{CowStr, IntoStatic};
use serde::{Deserialize, Deserializer, Serialize};
use smol_str::ToSmolStr;
use std::convert::Infallible;
use std::{fmt, ops::Deref, str::FromStr};

/// Structural errors for blob references.
#[derive(Debug, Clone, thiserror::Error, miette::Diagnostic, PartialEq, Eq)]
pub enum BlobError {
    /// `$type` field absent
    #[error("blob reference is missing $type")]
    #[diagnostic(code(twill::blob::missing_type))]
    MissingType,

    /// `$type` is not `blob`
    #[error("invalid blob $type: {0}")]
    #[diagnostic(code(twill::blob::invalid_type))]
    InvalidType(String),

    /// `ref` field absent
    #[error("blob reference is missing ref")]
    #[diagnostic(code(twill::blob::missing_ref))]
    MissingRef,

    /// `ref` is not a CID link
    #[error("invalid blob ref: {0}")]
    #[diagnostic(code(twill::blob::invalid_ref))]
    InvalidRef(String),

    /// `size` field absent
    #[error("blob reference is missing size")]
    #[diagnostic(code(twill::blob::missing_size))]
    MissingSize,

    /// `size` is zero or not a positive integer
    #[error("invalid blob size")]
    #[diagnostic(code(twill::blob::invalid_size))]
    InvalidSize,

    /// `mimeType` absent or not `type/subtype`
    #[error("invalid blob mime type: {0}")]
    #[diagnostic(code(twill::blob::invalid_mime_type))]
    InvalidMimeType(String),

    /// Declared size exceeds a caller-imposed limit
    #[error("blob size {size} exceeds limit {limit}")]
    #[diagnostic(code(twill::blob::size_exceeded))]
    SizeExceeded {
        /// Declared size
        size: u64,
        /// The limit that was exceeded
        limit: u64,
    },
}

/// A blob reference body: CID of the bytes, declared mime type, and size.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Blob<'b> {
    /// CID of the blob bytes (raw codec)
    pub r#ref: CidLink<'b>,
    /// Declared mime type
    #[serde(borrow)]
    pub mime_type: MimeType<'b>,
    /// Declared size in bytes
    pub size: u64,
}

impl<'b> Blob<'b> {
    /// Content-address `data` with the raw codec and wrap it in a blob
    /// reference with the given mime type.
    pub fn from_data(data: &[u8], mime_type: MimeType<'b>) -> Blob<'b> {
        Blob {
            r#ref: CidLink(Cid::from_raw_data(data)),
            mime_type,
            size: data.len() as u64,
        }
    }

    /// Structural validation: parseable ref CID, `type/subtype` mime, and a
    /// positive size.
    pub fn validate(&self) -> Result<(), BlobError> {
        Cid::parse(self.r#ref.as_str())
            .map_err(|e| BlobError::InvalidRef(e.to_string()))?;
        check_mime(self.mime_type.as_str())?;
        if self.size == 0 {
            return Err(BlobError::InvalidSize);
        }
        Ok(())
    }

    /// [`Blob::validate`] plus a maximum-size check.
    pub fn validate_max_size(&self, limit: u64) -> Result<(), BlobError> {
        self.validate()?;
        if self.size > limit {
            return Err(BlobError::SizeExceeded {
                size: self.size,
                limit,
            });
        }
        Ok(())
    }
}

fn check_mime(mime: &str) -> Result<(), BlobError> {
    let valid = mime
        .split_once('/')
        .is_some_and(|(ty, sub)| !ty.is_empty() && !sub.is_empty());
    if !valid {
        return Err(BlobError::InvalidMimeType(mime.to_string()));
    }
    Ok(())
}

/// Typed blob reference with its `$type` envelope.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "$type", rename_all = "lowercase")]
pub enum BlobRef<'r> {
    /// The only current variant
    #[serde(borrow)]
    Blob(Blob<'r>),
}

impl<'r> BlobRef<'r> {
    /// The inner blob body.
    pub fn blob(&self) -> &Blob<'r> {
        match self {
            BlobRef::Blob(blob) => blob,
        }
    }

    /// Parse a loose JSON value into a validated blob reference.
    ///
    /// Reports the first structural problem: missing/invalid `$type`, `ref`,
    /// `mimeType`, or `size`.
    pub fn from_json(value: &serde_json::Value) -> Result<BlobRef<'static>, BlobError> {
        let obj = value
            .as_object()
            .ok_or_else(|| BlobError::InvalidType("not an object".into()))?;
        match obj.get("$type") {
            None => return Err(BlobError::MissingType),
            Some(ty) => {
                if ty.as_str() != Some("blob") {
                    return Err(BlobError::InvalidType(ty.to_string()));
                }
            }
        }
        let r#ref = obj.get("ref").ok_or(BlobError::MissingRef)?;
        let link = r#ref
            .get("$link")
            .and_then(|l| l.as_str())
            .ok_or_else(|| BlobError::InvalidRef("missing $link".into()))?;
        let cid = Cid::parse_owned(link).map_err(|e| BlobError::InvalidRef(e.to_string()))?;
        let mime = obj
            .get("mimeType")
            .and_then(|m| m.as_str())
            .ok_or_else(|| BlobError::InvalidMimeType("missing".into()))?;
        check_mime(mime)?;
        let size = match obj.get("size") {
            None => return Err(BlobError::MissingSize),
            Some(size) => size.as_u64().filter(|s| *s > 0).ok_or(BlobError::InvalidSize)?,
        };
        Ok(BlobRef::Blob(Blob {
            r#ref: CidLink(cid),
            mime_type: MimeType::new_owned(mime),
            size,
        }))
    }
}

impl IntoStatic for Blob<'_> {
    type Output = Blob<'static>;

    fn into_static(self) -> Self::Output {
        Blob {
            r#ref: self.r#ref.into_static(),
            mime_type: self.mime_type.into_static(),
            size: self.size,
        }
    }
}

impl IntoStatic for BlobRef<'_> {
    type Output = BlobRef<'static>;

    fn into_static(self) -> Self::Output {
        match self {
            BlobRef::Blob(blob) => BlobRef::Blob(blob.into_static()),
        }
    }
}

/// Wrapper for a mime type string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct MimeType<'m>(pub CowStr<'m>);

impl<'m> MimeType<'m> {
    /// Borrowing constructor.
    pub fn new(mime_type: &'m str) -> Self {
        Self(CowStr::Borrowed(mime_type))
    }

    /// Owning constructor.
    pub fn new_owned(mime_type: impl AsRef<str>) -> MimeType<'static> {
        MimeType(CowStr::Owned(mime_type.as_ref().to_smolstr()))
    }

    /// Returns the mime type as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for MimeType<'_> {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new_owned(s))
    }
}

impl IntoStatic for MimeType<'_> {
    type Output = MimeType<'static>;

    fn into_static(self) -> Self::Output {
        MimeType(self.0.into_static())
    }
}

impl<'de, 'b> Deserialize<'de> for MimeType<'b>
where
    'de: 'b,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = CowStr::deserialize(deserializer)?;
        Ok(MimeType(value))
    }
}

impl fmt::Display for MimeType<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'m> From<MimeType<'m>> for CowStr<'m> {
    fn from(value: MimeType<'m>) -> Self {
        value.0
    }
}

impl AsRef<str> for MimeType<'_> {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Deref for MimeType<'_> {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}
