use std::fmt;
use std::{ops::Deref, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, de::Error};

use crate::error::AtStrError;
use crate::types::did::Did;
use crate::types::handle::Handle;
use crate::{CowStr, IntoStatic};

/// An at-identifier: either a DID or a handle.
///
/// This is the authority position of an at:// URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AtIdentifier<'i> {
    /// A DID authority
    Did(Did<'i>),
    /// A handle authority
    Handle(Handle<'i>),
}

impl<'i> AtIdentifier<'i> {
    /// Fallible constructor, validates, borrows from input.
    ///
    /// Anything starting `did:` must parse as a DID; everything else must
    /// parse as a handle.
    pub fn new(ident: &'i str) -> Result<Self, AtStrError> {
        if ident.starts_with("did:") || ident.starts_with("DID:") {
            Ok(AtIdentifier::Did(Did::new(ident)?))
        } else {
            Ok(AtIdentifier::Handle(Handle::new(ident)?))
        }
    }

    /// Fallible constructor, validates, takes ownership.
    pub fn new_owned(ident: impl AsRef<str>) -> Result<AtIdentifier<'static>, AtStrError> {
        let ident = ident.as_ref();
        if ident.starts_with("did:") || ident.starts_with("DID:") {
            Ok(AtIdentifier::Did(Did::new_owned(ident)?))
        } else {
            Ok(AtIdentifier::Handle(Handle::new_owned(ident)?))
        }
    }

    /// Infallible constructor for known-valid input. Panics otherwise.
    pub fn raw(ident: &'i str) -> Self {
        match Self::new(ident) {
            Ok(ident) => ident,
            Err(e) => panic!("invalid at-identifier: {e}"),
        }
    }

    /// The DID, if this identifier is one.
    pub fn as_did(&self) -> Option<&Did<'i>> {
        match self {
            AtIdentifier::Did(did) => Some(did),
            AtIdentifier::Handle(_) => None,
        }
    }

    /// The handle, if this identifier is one.
    pub fn as_handle(&self) -> Option<&Handle<'i>> {
        match self {
            AtIdentifier::Did(_) => None,
            AtIdentifier::Handle(handle) => Some(handle),
        }
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        match self {
            AtIdentifier::Did(did) => did.as_str(),
            AtIdentifier::Handle(handle) => handle.as_str(),
        }
    }
}

impl FromStr for AtIdentifier<'_> {
    type Err = AtStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new_owned(s)?)
    }
}

impl IntoStatic for AtIdentifier<'_> {
    type Output = AtIdentifier<'static>;

    fn into_static(self) -> Self::Output {
        match self {
            AtIdentifier::Did(did) => AtIdentifier::Did(did.into_static()),
            AtIdentifier::Handle(handle) => AtIdentifier::Handle(handle.into_static()),
        }
    }
}

impl Serialize for AtIdentifier<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de, 'a> Deserialize<'de> for AtIdentifier<'a>
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

impl fmt::Display for AtIdentifier<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'i> From<Did<'i>> for AtIdentifier<'i> {
    fn from(value: Did<'i>) -> Self {
        AtIdentifier::Did(value)
    }
}

impl<'i> From<Handle<'i>> for AtIdentifier<'i> {
    fn from(value: Handle<'i>) -> Self {
        AtIdentifier::Handle(value)
    }
}

impl<'i> From<AtIdentifier<'i>> for CowStr<'i> {
    fn from(value: AtIdentifier<'i>) -> Self {
        match value {
            AtIdentifier::Did(did) => did.into(),
            AtIdentifier::Handle(handle) => handle.into(),
        }
    }
}

impl AsRef<str> for AtIdentifier<'_> {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Deref for AtIdentifier<'_> {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_dids_and_handles() {
        let did = AtIdentifier::new("did:plc:44ybard66vv44zksje25o7dz").unwrap();
        assert!(did.as_did().is_some());

        let handle = AtIdentifier::new("alice.bsky.social").unwrap();
        assert!(handle.as_handle().is_some());
    }

    #[test]
    fn bad_did_is_not_a_handle() {
        // `did:` prefix commits to DID parsing; no handle fallback
        assert!(AtIdentifier::new("did:bogus").is_err());
    }
}
