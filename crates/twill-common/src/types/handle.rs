use std::fmt;
use std::sync::LazyLock;
use std::{ops::Deref, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, de::Error};
use smol_str::ToSmolStr;

use crate::error::AtStrError;
use crate::{CowStr, IntoStatic};
use regex::Regex;

const SPEC: &str = "handle";
const MAX_LEN: usize = 253;

/// A handle: a domain name standing in for a DID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Hash)]
#[serde(transparent)]
pub struct Handle<'h>(CowStr<'h>);

/// Handle grammar: dotted LDH labels, final label letter-led.
pub static HANDLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?$").unwrap()
});

fn check(handle: &str) -> Result<(), AtStrError> {
    if handle.len() > MAX_LEN {
        return Err(AtStrError::too_long(SPEC, handle, MAX_LEN, handle.len()));
    }
    if !HANDLE_REGEX.is_match(handle) {
        return Err(AtStrError::char_class(
            SPEC,
            handle,
            "must be a domain of dotted LDH labels",
        ));
    }
    Ok(())
}

impl<'h> Handle<'h> {
    /// Fallible constructor, validates, borrows from input.
    ///
    /// Accepts (and strips) a preceding `@` if present.
    pub fn new(handle: &'h str) -> Result<Self, AtStrError> {
        let handle = handle.strip_prefix('@').unwrap_or(handle);
        check(handle)?;
        Ok(Self(CowStr::Borrowed(handle)))
    }

    /// Fallible constructor, validates, takes ownership.
    ///
    /// Accepts (and strips) a preceding `@` if present.
    pub fn new_owned(handle: impl AsRef<str>) -> Result<Handle<'static>, AtStrError> {
        let handle = handle.as_ref();
        let handle = handle.strip_prefix('@').unwrap_or(handle);
        check(handle)?;
        Ok(Handle(CowStr::Owned(handle.to_smolstr())))
    }

    /// Infallible constructor for when you *know* the string is a valid
    /// handle. Will panic on invalid handles.
    pub fn raw(handle: &'h str) -> Self {
        match Self::new(handle) {
            Ok(handle) => handle,
            Err(e) => panic!("invalid handle: {e}"),
        }
    }

    /// Returns the handle as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Handle<'_> {
    type Err = AtStrError;

    /// Has to take ownership due to the lifetime constraints of the FromStr
    /// trait. Prefer [`Handle::new`] if you want to borrow.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new_owned(s)?)
    }
}

impl IntoStatic for Handle<'_> {
    type Output = Handle<'static>;

    fn into_static(self) -> Self::Output {
        Handle(self.0.into_static())
    }
}

impl<'de, 'a> Deserialize<'de> for Handle<'a>
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

impl fmt::Display for Handle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl<'h> From<Handle<'h>> for String {
    fn from(value: Handle<'h>) -> Self {
        value.0.to_string()
    }
}

impl<'h> From<Handle<'h>> for CowStr<'h> {
    fn from(value: Handle<'h>) -> Self {
        value.0
    }
}

impl TryFrom<String> for Handle<'static> {
    type Error = AtStrError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new_owned(&value)
    }
}

impl AsRef<str> for Handle<'_> {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Deref for Handle<'_> {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}
