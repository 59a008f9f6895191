use std::fmt;
use std::sync::LazyLock;
use std::{ops::Deref, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, de::Error};
use smol_str::ToSmolStr;

use crate::error::AtStrError;
use crate::{CowStr, IntoStatic};
use regex::Regex;

const SPEC: &str = "record-key";
const MAX_LEN: usize = 512;

/// A record key: the per-collection identifier of a record in a repository.
///
/// Most record keys are TIDs, but the grammar admits any URL-safe token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Hash)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Rkey<'r>(CowStr<'r>);

/// Record key grammar (`.` and `..` excluded separately).
pub static RKEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._~:@!$&'()*+,;=%-]{1,512}$").unwrap());

fn check(rkey: &str) -> Result<(), AtStrError> {
    if rkey.len() > MAX_LEN {
        return Err(AtStrError::too_long(SPEC, rkey, MAX_LEN, rkey.len()));
    }
    if rkey == "." || rkey == ".." {
        return Err(AtStrError::char_class(
            SPEC,
            rkey,
            "`.` and `..` are not valid record keys",
        ));
    }
    if !RKEY_REGEX.is_match(rkey) {
        return Err(AtStrError::char_class(
            SPEC,
            rkey,
            "must be 1-512 URL-safe characters",
        ));
    }
    Ok(())
}

impl<'r> Rkey<'r> {
    /// Fallible constructor, validates, borrows from input
    pub fn new(rkey: &'r str) -> Result<Self, AtStrError> {
        check(rkey)?;
        Ok(Self(CowStr::Borrowed(rkey)))
    }

    /// Fallible constructor, validates, takes ownership
    pub fn new_owned(rkey: impl AsRef<str>) -> Result<Rkey<'static>, AtStrError> {
        let rkey = rkey.as_ref();
        check(rkey)?;
        Ok(Rkey(CowStr::Owned(rkey.to_smolstr())))
    }

    /// Infallible constructor for when you *know* the string is a valid
    /// record key. Will panic otherwise.
    pub fn raw(rkey: &'r str) -> Self {
        match Self::new(rkey) {
            Ok(rkey) => rkey,
            Err(e) => panic!("invalid record key: {e}"),
        }
    }

    /// Returns the record key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Rkey<'_> {
    type Err = AtStrError;

    /// Has to take ownership due to the lifetime constraints of the FromStr
    /// trait. Prefer [`Rkey::new`] if you want to borrow.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new_owned(s)?)
    }
}

impl IntoStatic for Rkey<'_> {
    type Output = Rkey<'static>;

    fn into_static(self) -> Self::Output {
        Rkey(self.0.into_static())
    }
}

impl<'de, 'a> Deserialize<'de> for Rkey<'a>
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

impl fmt::Display for Rkey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'r> From<Rkey<'r>> for String {
    fn from(value: Rkey<'r>) -> Self {
        value.0.to_string()
    }
}

impl<'r> From<Rkey<'r>> for CowStr<'r> {
    fn from(value: Rkey<'r>) -> Self {
        value.0
    }
}

impl TryFrom<String> for Rkey<'static> {
    type Error = AtStrError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new_owned(&value)
    }
}

impl AsRef<str> for Rkey<'_> {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Deref for Rkey<'_> {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}
