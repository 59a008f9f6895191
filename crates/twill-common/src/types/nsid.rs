use crate::error::AtStrError;
use crate::{CowStr, IntoStatic};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, de::Error};
use smol_str::{SmolStr, ToSmolStr};
use std::fmt;
use std::sync::LazyLock;
use std::{ops::Deref, str::FromStr};

const SPEC: &str = "nsid";
const MAX_LEN: usize = 317;
const MAX_AUTHORITY_LEN: usize = 253;

/// Namespaced Identifier (NSID)
///
/// Reverse-DNS authority (2+ lowercase LDH segments, first not digit-leading)
/// followed by a case-sensitive alphanumeric name segment.
#[derive(Clone, PartialEq, Eq, Serialize, Hash)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Nsid<'n>(CowStr<'n>);

/// NSID grammar: lowercase domain authority, then a letter-led name.
pub static NSID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-z]([a-z0-9-]{0,61}[a-z0-9])?(\.[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?)+(\.[a-zA-Z][a-zA-Z0-9]{0,62})$",
    )
    .unwrap()
});

fn check(nsid: &str) -> Result<(), AtStrError> {
    if nsid.len() > MAX_LEN {
        return Err(AtStrError::too_long(SPEC, nsid, MAX_LEN, nsid.len()));
    }
    let segments = nsid.split('.').count();
    if segments < 3 {
        return Err(AtStrError::too_few_segments(SPEC, nsid, 3, segments));
    }
    if !NSID_REGEX.is_match(nsid) {
        return Err(AtStrError::char_class(
            SPEC,
            nsid,
            "must be a lowercase domain authority plus an alphanumeric name",
        ));
    }
    // authority cap applies to everything before the name segment
    let authority_len = nsid.rfind('.').unwrap_or(0);
    if authority_len > MAX_AUTHORITY_LEN {
        return Err(AtStrError::too_long(
            SPEC,
            nsid,
            MAX_AUTHORITY_LEN,
            authority_len,
        ));
    }
    Ok(())
}

impl<'n> Nsid<'n> {
    /// Fallible constructor, validates, borrows from input
    pub fn new(nsid: &'n str) -> Result<Self, AtStrError> {
        check(nsid)?;
        Ok(Self(CowStr::Borrowed(nsid)))
    }

    /// Fallible constructor, validates, takes ownership
    pub fn new_owned(nsid: impl AsRef<str>) -> Result<Nsid<'static>, AtStrError> {
        let nsid = nsid.as_ref();
        check(nsid)?;
        Ok(Nsid(CowStr::Owned(nsid.to_smolstr())))
    }

    /// Infallible constructor for when you *know* the string is a valid NSID.
    /// Will panic on invalid NSIDs.
    pub fn raw(nsid: &'n str) -> Self {
        match Self::new(nsid) {
            Ok(nsid) => nsid,
            Err(e) => panic!("invalid NSID: {e}"),
        }
    }

    /// Infallible constructor for when you *know* the string is a valid NSID.
    /// Marked unsafe because responsibility for upholding the invariant is on
    /// the developer.
    pub unsafe fn unchecked(nsid: &'n str) -> Self {
        Self(CowStr::Borrowed(nsid))
    }

    /// Returns the domain authority part of the NSID.
    pub fn domain_authority(&self) -> &str {
        let split = self.0.rfind('.').expect("enforced by constructor");
        &self.0[..split]
    }

    /// Returns the name segment of the NSID.
    pub fn name(&self) -> &str {
        let split = self.0.rfind('.').expect("enforced by constructor");
        &self.0[split + 1..]
    }

    /// Returns the NSID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Nsid<'_> {
    type Err = AtStrError;

    /// Has to take ownership due to the lifetime constraints of the FromStr
    /// trait. Prefer [`Nsid::new`] if you want to borrow.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new_owned(s)?)
    }
}

impl IntoStatic for Nsid<'_> {
    type Output = Nsid<'static>;

    fn into_static(self) -> Self::Output {
        Nsid(self.0.into_static())
    }
}

impl<'de, 'a> Deserialize<'de> for Nsid<'a>
where
    'de: 'a,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: &str = Deserialize::deserialize(deserializer)?;
        Self::new(value).map_err(D::Error::custom)
    }
}

impl fmt::Display for Nsid<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Nsid<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nsid({})", self.0)
    }
}

impl<'n> From<Nsid<'n>> for String {
    fn from(value: Nsid) -> Self {
        value.0.to_string()
    }
}

impl<'n> From<Nsid<'n>> for CowStr<'n> {
    fn from(value: Nsid<'n>) -> Self {
        value.0
    }
}

impl From<Nsid<'_>> for SmolStr {
    fn from(value: Nsid) -> Self {
        value.0.to_smolstr()
    }
}

impl TryFrom<String> for Nsid<'static> {
    type Error = AtStrError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new_owned(&value)
    }
}

impl AsRef<str> for Nsid<'_> {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Deref for Nsid<'_> {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_nsids() {
        assert!(Nsid::new("com.example.foo").is_ok());
        assert!(Nsid::new("com.example.fooBar").is_ok());
        assert!(Nsid::new("com.long-domain.foo").is_ok());
        assert!(Nsid::new("app.bsky.feed.post").is_ok());
        assert!(Nsid::new("a.b.c").is_ok());
    }

    #[test]
    fn minimum_segments() {
        assert!(Nsid::new("com.example").is_err());
        assert!(Nsid::new("com").is_err());
    }

    #[test]
    fn domain_and_name_parsing() {
        let nsid = Nsid::new("app.bsky.feed.post").unwrap();
        assert_eq!(nsid.domain_authority(), "app.bsky.feed");
        assert_eq!(nsid.name(), "post");
    }

    #[test]
    fn name_segment_rules() {
        assert!(Nsid::new("com.example.3foo").is_err()); // digit-leading name
        assert!(Nsid::new("com.example.foo-bar").is_err()); // no hyphens in name
        assert!(Nsid::new("com.example.fooBar123").is_ok());
    }

    #[test]
    fn authority_is_lowercase() {
        assert!(Nsid::new("com.Example.foo").is_err());
        assert!(Nsid::new("COM.example.foo").is_err());
        // name keeps case
        assert!(Nsid::new("com.example.FooBar").is_ok());
    }

    #[test]
    fn first_segment_cannot_start_with_digit() {
        assert!(Nsid::new("9com.example.foo").is_err());
        // later authority segments may be digit-leading
        assert!(Nsid::new("com.4example.foo").is_ok());
    }

    #[test]
    fn domain_segment_rules() {
        assert!(Nsid::new("foo-bar.example.baz").is_ok());
        assert!(Nsid::new("-foo.bar.baz").is_err());
        assert!(Nsid::new("foo-.bar.baz").is_err());
    }

    #[test]
    fn max_length() {
        // authority 253 (63 + 63 + 63 + 61 + three dots), name 63
        let s1 = format!("a{}a", "b".repeat(61));
        let s2 = format!("c{}c", "d".repeat(61));
        let s3 = format!("e{}e", "f".repeat(61));
        let s4 = format!("g{}g", "h".repeat(59));
        let name = format!("i{}i", "j".repeat(61));
        let valid_317 = format!("{s1}.{s2}.{s3}.{s4}.{name}");
        assert_eq!(valid_317.len(), 317);
        assert!(Nsid::new(&valid_317).is_ok());

        let s4_long = format!("g{}g", "h".repeat(60));
        let too_long_318 = format!("{s1}.{s2}.{s3}.{s4_long}.{name}");
        assert_eq!(too_long_318.len(), 318);
        assert!(Nsid::new(&too_long_318).is_err());
    }

    #[test]
    fn segment_length() {
        let valid_63 = format!("{}.{}.foo", "a".repeat(63), "b".repeat(63));
        assert!(Nsid::new(&valid_63).is_ok());

        let too_long_64 = format!("{}.b.foo", "a".repeat(64));
        assert!(Nsid::new(&too_long_64).is_err());
    }

    #[test]
    fn roundtrip() {
        let s = "app.bsky.feed.post";
        assert_eq!(Nsid::new(s).unwrap().to_string(), s);
    }
}
