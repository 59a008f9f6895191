use crate::CowStr;
use crate::error::AtStrError;
use crate::types::ident::AtIdentifier;
use crate::types::nsid::Nsid;
use crate::types::recordkey::Rkey;
use regex::Regex;
use serde::Serializer;
use serde::{Deserialize, Deserializer, Serialize, de::Error};
use smol_str::ToSmolStr;
use std::fmt;
use std::sync::LazyLock;
use std::{ops::Deref, str::FromStr};

use crate::IntoStatic;

const SPEC: &str = "at-uri-scheme";
const MAX_LEN: usize = 8192;

/// at:// URI type
///
/// Authority (DID or handle), optional collection (NSID), optional record
/// key, optional fragment. The original string is kept verbatim so parsing
/// round-trips exactly.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct AtUri<'u> {
    uri: CowStr<'u>,
    /// The authority: a DID or a handle.
    pub authority: AtIdentifier<'u>,
    /// Collection and record key, when present.
    pub path: Option<UriPath<'u>>,
    /// Fragment, when present.
    pub fragment: Option<CowStr<'u>>,
}

/// at:// URI path component.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct UriPath<'u> {
    /// The collection NSID.
    pub collection: Nsid<'u>,
    /// The record key within the collection.
    pub rkey: Option<Rkey<'u>>,
}

/// Structural at:// grammar; components are validated by their own parsers.
pub static ATURI_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r##"^at://(?<authority>[a-zA-Z0-9._:%-]+)(/(?<collection>[a-zA-Z0-9.-]+)(/(?<rkey>[a-zA-Z0-9._~:@!$&'()*+,;=%-]+))?)?(#(?<fragment>[a-zA-Z0-9._~:@!$&'()*+,;=%/\[\]-]*))?$"##,
    )
    .unwrap()
});

impl<'u> AtUri<'u> {
    /// Fallible constructor, validates, borrows from input
    pub fn new(uri: &'u str) -> Result<Self, AtStrError> {
        if uri.len() > MAX_LEN {
            return Err(AtStrError::too_long(SPEC, uri, MAX_LEN, uri.len()));
        }
        let parts = ATURI_REGEX
            .captures(uri)
            .ok_or_else(|| AtStrError::char_class(SPEC, uri, "doesn't match the at:// grammar"))?;
        let authority = parts
            .name("authority")
            .ok_or_else(|| AtStrError::missing(SPEC, uri, "authority"))?;
        let authority = AtIdentifier::new(authority.as_str())
            .map_err(|e| AtStrError::wrap(SPEC, uri, e))?;
        let path = if let Some(collection) = parts.name("collection") {
            let collection =
                Nsid::new(collection.as_str()).map_err(|e| AtStrError::wrap(SPEC, uri, e))?;
            let rkey = match parts.name("rkey") {
                Some(rkey) => {
                    Some(Rkey::new(rkey.as_str()).map_err(|e| AtStrError::wrap(SPEC, uri, e))?)
                }
                None => None,
            };
            Some(UriPath { collection, rkey })
        } else {
            None
        };
        let fragment = parts
            .name("fragment")
            .map(|fragment| CowStr::Borrowed(fragment.as_str()));
        Ok(AtUri {
            uri: CowStr::Borrowed(uri),
            authority,
            path,
            fragment,
        })
    }

    /// Fallible constructor, validates, takes ownership
    pub fn new_owned(uri: impl AsRef<str>) -> Result<AtUri<'static>, AtStrError> {
        let uri = uri.as_ref();
        let parsed = AtUri::new(uri)?;
        Ok(AtUri {
            uri: CowStr::Owned(uri.to_smolstr()),
            authority: parsed.authority.into_static(),
            path: parsed.path.map(|p| UriPath {
                collection: p.collection.into_static(),
                rkey: p.rkey.map(IntoStatic::into_static),
            }),
            fragment: parsed.fragment.map(IntoStatic::into_static),
        })
    }

    /// Infallible constructor for known-valid input. Panics otherwise.
    pub fn raw(uri: &'u str) -> Self {
        match Self::new(uri) {
            Ok(uri) => uri,
            Err(e) => panic!("invalid at:// URI: {e}"),
        }
    }

    /// The collection NSID, when the URI has a path.
    pub fn collection(&self) -> Option<&Nsid<'u>> {
        self.path.as_ref().map(|p| &p.collection)
    }

    /// The record key, when the URI points at a record.
    pub fn rkey(&self) -> Option<&Rkey<'u>> {
        self.path.as_ref().and_then(|p| p.rkey.as_ref())
    }

    /// Returns the URI as a string slice.
    pub fn as_str(&self) -> &str {
        &self.uri
    }
}

impl FromStr for AtUri<'_> {
    type Err = AtStrError;

    /// Has to take ownership due to the lifetime constraints of the FromStr
    /// trait. Prefer [`AtUri::new`] if you want to borrow.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new_owned(s)?)
    }
}

impl IntoStatic for AtUri<'_> {
    type Output = AtUri<'static>;

    fn into_static(self) -> Self::Output {
        AtUri {
            uri: self.uri.into_static(),
            authority: self.authority.into_static(),
            path: self.path.map(|p| UriPath {
                collection: p.collection.into_static(),
                rkey: p.rkey.map(IntoStatic::into_static),
            }),
            fragment: self.fragment.into_static(),
        }
    }
}

impl<'de, 'a> Deserialize<'de> for AtUri<'a>
where
    'de: 'a,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Deserialize::deserialize(deserializer)?;
        Self::new(value).map_err(D::Error::custom)
    }
}

impl Serialize for AtUri<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.uri)
    }
}

impl fmt::Display for AtUri<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

impl<'d> From<AtUri<'d>> for String {
    fn from(value: AtUri<'d>) -> Self {
        value.uri.to_string()
    }
}

impl<'d> From<AtUri<'d>> for CowStr<'d> {
    fn from(value: AtUri<'d>) -> Self {
        value.uri
    }
}

impl TryFrom<String> for AtUri<'static> {
    type Error = AtStrError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new_owned(&value)
    }
}

impl AsRef<str> for AtUri<'_> {
    fn as_ref(&self) -> &str {
        self.uri.as_ref()
    }
}

impl Deref for AtUri<'_> {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.uri.as_ref()
    }
}
