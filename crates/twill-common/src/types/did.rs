use crate::error::AtStrError;
use crate::{CowStr, IntoStatic};
use serde::{Deserialize, Deserializer, Serialize, de::Error};
use smol_str::format_smolstr;
use std::fmt;
use std::{ops::Deref, str::FromStr};
use url::Url;

const SPEC: &str = "did";
const MAX_LEN: usize = 2048;
const PLC_LEN: usize = 24;
const MAX_DOMAIN_LEN: usize = 253;

/// The DID methods atproto supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DidMethod {
    /// `did:plc`, the placeholder directory
    Plc,
    /// `did:web`, domain-anchored documents
    Web,
    /// `did:key`, self-describing public keys
    Key,
}

impl DidMethod {
    /// Every supported method, in registry order.
    pub const ALL: [DidMethod; 3] = [DidMethod::Plc, DidMethod::Web, DidMethod::Key];

    /// The method name as it appears in a DID.
    pub fn as_str(self) -> &'static str {
        match self {
            DidMethod::Plc => "plc",
            DidMethod::Web => "web",
            DidMethod::Key => "key",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        // method names are matched after lowercasing the input
        if name.eq_ignore_ascii_case("plc") {
            Some(DidMethod::Plc)
        } else if name.eq_ignore_ascii_case("web") {
            Some(DidMethod::Web)
        } else if name.eq_ignore_ascii_case("key") {
            Some(DidMethod::Key)
        } else {
            None
        }
    }
}

impl fmt::Display for DidMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated DID with its parsed components.
///
/// The original string is kept verbatim, so parsing and re-serializing
/// round-trips exactly. Use [`Did::normalized`] for the canonical
/// lowercased form.
#[derive(Clone, PartialEq, Eq, Serialize, Hash)]
#[serde(transparent)]
pub struct Did<'d> {
    did: CowStr<'d>,
    #[serde(skip)]
    method: DidMethod,
    #[serde(skip)]
    identifier: CowStr<'d>,
    #[serde(skip)]
    query: Option<CowStr<'d>>,
    #[serde(skip)]
    fragment: Option<CowStr<'d>>,
}

struct DidParts<'s> {
    method: DidMethod,
    method_name: &'s str,
    identifier: &'s str,
    query: Option<&'s str>,
    fragment: Option<&'s str>,
}

fn is_hex(b: u8) -> bool {
    b.is_ascii_hexdigit()
}

/// W3C `idchar` set (alphanum plus `. - _`), with `%` and `:` handled by the
/// caller.
fn is_id_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_')
}

/// Validate the method-specific-id character classes: `idchar`, `:`
/// separators, and well-formed `%HH` escapes. A trailing `:` is rejected.
fn check_msid_chars(did: &str, msid: &str) -> Result<(), AtStrError> {
    if msid.is_empty() {
        return Err(AtStrError::missing(SPEC, did, "method-specific identifier"));
    }
    let bytes = msid.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                if i + 2 >= bytes.len() || !is_hex(bytes[i + 1]) || !is_hex(bytes[i + 2]) {
                    return Err(AtStrError::char_class(
                        SPEC,
                        did,
                        "percent sign must be followed by two hex digits",
                    ));
                }
                i += 3;
            }
            b':' => i += 1,
            b if is_id_char(b) => i += 1,
            _ => {
                return Err(AtStrError::char_class(
                    SPEC,
                    did,
                    "identifier may only contain alphanumerics and . - _ : %",
                ));
            }
        }
    }
    if bytes.ends_with(b":") {
        return Err(AtStrError::char_class(SPEC, did, "identifier ends with `:`"));
    }
    Ok(())
}

/// One RFC-1123 LDH label: alphanumeric, hyphens allowed inside.
fn check_domain_label(did: &str, label: &str) -> Result<(), AtStrError> {
    if label.is_empty() || label.len() > 63 {
        return Err(AtStrError::char_class(
            SPEC,
            did,
            "domain label must be 1-63 characters",
        ));
    }
    let bytes = label.as_bytes();
    if bytes[0] == b'-' || bytes[bytes.len() - 1] == b'-' {
        return Err(AtStrError::char_class(
            SPEC,
            did,
            "domain label may not start or end with a hyphen",
        ));
    }
    if !bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-') {
        return Err(AtStrError::char_class(
            SPEC,
            did,
            "domain label must be LDH (letters, digits, hyphens)",
        ));
    }
    Ok(())
}

fn check_web_identifier(did: &str, identifier: &str) -> Result<(), AtStrError> {
    let mut segments = identifier.split(':');
    let domain = segments
        .next()
        .filter(|d| !d.is_empty())
        .ok_or_else(|| AtStrError::missing(SPEC, did, "domain"))?;
    if domain.len() > MAX_DOMAIN_LEN {
        return Err(AtStrError::too_long(SPEC, did, MAX_DOMAIN_LEN, domain.len()));
    }
    for label in domain.split('.') {
        check_domain_label(did, label)?;
    }
    for segment in segments {
        if segment.is_empty() {
            return Err(AtStrError::char_class(SPEC, did, "empty did:web path segment"));
        }
    }
    Ok(())
}

fn check_plc_identifier(did: &str, identifier: &str, strict_case: bool) -> Result<(), AtStrError> {
    if identifier.len() != PLC_LEN {
        return Err(AtStrError::char_class(
            SPEC,
            did,
            "did:plc identifier must be exactly 24 characters",
        ));
    }
    let ok = identifier.bytes().all(|b| {
        matches!(b, b'a'..=b'z' | b'2'..=b'7') || (!strict_case && matches!(b, b'A'..=b'Z'))
    });
    if !ok {
        return Err(AtStrError::char_class(
            SPEC,
            did,
            "did:plc identifier must be base32 (a-z2-7)",
        ));
    }
    Ok(())
}

fn check_key_identifier(did: &str, identifier: &str) -> Result<(), AtStrError> {
    let Some(tail) = identifier.strip_prefix('z') else {
        return Err(AtStrError::char_class(
            SPEC,
            did,
            "did:key identifier must be multibase base58btc (z-prefixed)",
        ));
    };
    if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_alphanumeric() && b != b'0') {
        return Err(AtStrError::char_class(
            SPEC,
            did,
            "did:key identifier body must be base58btc",
        ));
    }
    Ok(())
}

/// Split a DID into components and validate per-method rules.
///
/// `strict` requires the canonical lowercase scheme, method, and (for plc)
/// identifier; the lenient mode backs [`Did::normalize`].
fn parse_parts<'s>(did: &'s str, strict: bool) -> Result<DidParts<'s>, AtStrError> {
    if did.len() > MAX_LEN {
        return Err(AtStrError::too_long(SPEC, did, MAX_LEN, did.len()));
    }
    let rest = if strict {
        did.strip_prefix("did:")
            .ok_or_else(|| AtStrError::missing(SPEC, did, "`did:` scheme"))?
    } else if did
        .get(..4)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("did:"))
    {
        &did[4..]
    } else {
        return Err(AtStrError::missing(SPEC, did, "`did:` scheme"));
    };

    let (method_name, tail) = rest
        .split_once(':')
        .ok_or_else(|| AtStrError::missing(SPEC, did, "method-specific identifier"))?;
    if method_name.is_empty() || !method_name.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(AtStrError::char_class(
            SPEC,
            did,
            "method name must be alphanumeric",
        ));
    }
    if strict && method_name.bytes().any(|b| b.is_ascii_uppercase()) {
        return Err(AtStrError::char_class(SPEC, did, "method name must be lowercase"));
    }
    let method = DidMethod::from_name(method_name)
        .ok_or_else(|| AtStrError::unsupported(SPEC, did, method_name))?;

    let (tail, fragment) = match tail.split_once('#') {
        Some((before, frag)) => (before, Some(frag)),
        None => (tail, None),
    };
    let (identifier, query) = match tail.split_once('?') {
        Some((before, q)) => (before, Some(q)),
        None => (tail, None),
    };

    check_msid_chars(did, identifier)?;
    match method {
        DidMethod::Plc => check_plc_identifier(did, identifier, strict)?,
        DidMethod::Web => check_web_identifier(did, identifier)?,
        DidMethod::Key => check_key_identifier(did, identifier)?,
    }

    Ok(DidParts {
        method,
        method_name,
        identifier,
        query,
        fragment,
    })
}

impl<'d> Did<'d> {
    /// Fallible constructor, validates, borrows from input.
    ///
    /// Accepts (and strips) a preceding `at://` if present.
    pub fn new(did: &'d str) -> Result<Self, AtStrError> {
        let did = did.strip_prefix("at://").unwrap_or(did);
        let parts = parse_parts(did, true)?;
        Ok(Self {
            did: CowStr::Borrowed(did),
            method: parts.method,
            identifier: CowStr::Borrowed(parts.identifier),
            query: parts.query.map(CowStr::Borrowed),
            fragment: parts.fragment.map(CowStr::Borrowed),
        })
    }

    /// Fallible constructor, validates, takes ownership.
    pub fn new_owned(did: impl AsRef<str>) -> Result<Did<'static>, AtStrError> {
        let did = did.as_ref();
        let did = did.strip_prefix("at://").unwrap_or(did);
        let parts = parse_parts(did, true)?;
        Ok(Did {
            did: CowStr::copy_from_str(did),
            method: parts.method,
            identifier: CowStr::copy_from_str(parts.identifier),
            query: parts.query.map(CowStr::copy_from_str),
            fragment: parts.fragment.map(CowStr::copy_from_str),
        })
    }

    /// Infallible constructor for when you *know* the string is a valid DID.
    /// Will panic on invalid DIDs. If you're manually decoding atproto records
    /// or API values you know are valid (rather than using serde), this is the
    /// one to use.
    pub fn raw(did: &'d str) -> Self {
        match Self::new(did) {
            Ok(did) => did,
            Err(e) => panic!("invalid DID: {e}"),
        }
    }

    /// Parse a possibly mixed-case DID and return its canonical form:
    /// scheme and method lowercased, the identifier lowercased for plc and
    /// the domain portion lowercased for web; did:key identifiers, did:web
    /// path segments, query, and fragment keep their case.
    pub fn normalize(input: &str) -> Result<Did<'static>, AtStrError> {
        let input = input.strip_prefix("at://").unwrap_or(input);
        let parts = parse_parts(input, false)?;

        let identifier: String = match parts.method {
            DidMethod::Plc => parts.identifier.to_ascii_lowercase(),
            DidMethod::Web => {
                // lowercase only the domain (first `:` segment)
                match parts.identifier.split_once(':') {
                    Some((domain, path)) => {
                        format!("{}:{}", domain.to_ascii_lowercase(), path)
                    }
                    None => parts.identifier.to_ascii_lowercase(),
                }
            }
            DidMethod::Key => parts.identifier.to_string(),
        };

        let mut out = format!("did:{}:{}", parts.method_name.to_ascii_lowercase(), identifier);
        if let Some(q) = parts.query {
            out.push('?');
            out.push_str(q);
        }
        if let Some(f) = parts.fragment {
            out.push('#');
            out.push_str(f);
        }
        Did::new_owned(out)
    }

    /// The canonical form of this DID. Idempotent: normalizing a normalized
    /// DID is a no-op.
    pub fn normalized(&self) -> Did<'static> {
        // self is already strictly valid, so re-normalizing cannot fail
        match Did::normalize(self.as_str()) {
            Ok(did) => did,
            Err(_) => self.clone().into_static(),
        }
    }

    /// The DID method.
    pub fn method(&self) -> DidMethod {
        self.method
    }

    /// The method-specific identifier, without query or fragment.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The raw query string, if any.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// The fragment, if any.
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// The query parsed as an ordered list of parameters. A key without `=`
    /// maps to `None` (a bare flag).
    pub fn params(&self) -> Vec<(&str, Option<&str>)> {
        match self.query.as_deref() {
            Some(query) => query
                .split('&')
                .filter(|pair| !pair.is_empty())
                .map(|pair| match pair.split_once('=') {
                    Some((k, v)) => (k, Some(v)),
                    None => (pair, None),
                })
                .collect(),
            None => Vec::new(),
        }
    }

    /// The URL where a did:web document is published: the first identifier
    /// segment is the host; a bare domain resolves under `/.well-known/`,
    /// a path-qualified identifier under the joined path.
    pub fn web_url(&self) -> Result<Url, AtStrError> {
        if self.method != DidMethod::Web {
            return Err(AtStrError::unsupported(
                SPEC,
                self.as_str(),
                self.method.as_str(),
            ));
        }
        let mut segments = self.identifier.split(':');
        // non-empty by construction
        let host = segments.next().unwrap_or_default();
        let path: Vec<&str> = segments.collect();
        let url = if path.is_empty() {
            format!("https://{host}/.well-known/did.json")
        } else {
            format!("https://{host}/{}/did.json", path.join("/"))
        };
        Url::parse(&url).map_err(|_| AtStrError::char_class(SPEC, self.as_str(), "unparseable host"))
    }

    /// Returns the DID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.did
    }
}

impl FromStr for Did<'_> {
    type Err = AtStrError;

    /// Has to take ownership due to the lifetime constraints of the FromStr
    /// trait. Prefer [`Did::new`] if you want to borrow.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new_owned(s)?)
    }
}

impl IntoStatic for Did<'_> {
    type Output = Did<'static>;

    fn into_static(self) -> Self::Output {
        Did {
            did: self.did.into_static(),
            method: self.method,
            identifier: self.identifier.into_static(),
            query: self.query.into_static(),
            fragment: self.fragment.into_static(),
        }
    }
}

impl<'de, 'a> Deserialize<'de> for Did<'a>
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

impl fmt::Display for Did<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.did)
    }
}

impl fmt::Debug for Did<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at://{}", self.did)
    }
}

impl<'d> From<Did<'d>> for String {
    fn from(value: Did<'d>) -> Self {
        value.did.to_string()
    }
}

impl<'d> From<Did<'d>> for CowStr<'d> {
    fn from(value: Did<'d>) -> Self {
        value.did
    }
}

impl TryFrom<String> for Did<'static> {
    type Error = AtStrError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new_owned(&value)
    }
}

impl<'d> TryFrom<CowStr<'d>> for Did<'d> {
    type Error = AtStrError;

    fn try_from(value: CowStr<'d>) -> Result<Self, Self::Error> {
        match value {
            CowStr::Borrowed(s) => Did::new(s),
            CowStr::Owned(s) => {
                let did = Did::new(s.as_str())?;
                Ok(did.into_static())
            }
        }
    }
}

impl AsRef<str> for Did<'_> {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Deref for Did<'_> {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

/// Build a did:web DID from a domain (and optional `:`-separated path).
pub fn did_web(identifier: &str) -> Result<Did<'static>, AtStrError> {
    Did::new_owned(format_smolstr!("did:web:{identifier}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_dids() {
        assert!(Did::new("did:plc:44ybard66vv44zksje25o7dz").is_ok());
        assert!(Did::new("did:web:example.com").is_ok());
        assert!(Did::new("did:web:example.com:u:alice").is_ok());
        assert!(Did::new("did:key:zQ3shunBKsXixLxKtC5qeSG9E4J5RkGN57im31pcTzbNQnm5w").is_ok());
    }

    #[test]
    fn unsupported_methods() {
        let err = Did::new("did:ion:EiClkZMDxPKqC9c").unwrap_err();
        assert!(matches!(
            err.kind,
            crate::error::StrParseKind::Unsupported { .. }
        ));
        assert!(Did::new("did:example:123").is_err());
    }

    #[test]
    fn must_start_with_did() {
        assert!(Did::new("DID:plc:44ybard66vv44zksje25o7dz").is_err());
        assert!(Did::new("plc:44ybard66vv44zksje25o7dz").is_err());
        assert!(Did::new("44ybard66vv44zksje25o7dz").is_err());
    }

    #[test]
    fn prefix_stripping() {
        assert_eq!(
            Did::new("at://did:plc:44ybard66vv44zksje25o7dz")
                .unwrap()
                .as_str(),
            "did:plc:44ybard66vv44zksje25o7dz"
        );
    }

    #[test]
    fn components() {
        let did = Did::new("did:web:example.com:path?version=1&flag#key1").unwrap();
        assert_eq!(did.method(), DidMethod::Web);
        assert_eq!(did.identifier(), "example.com:path");
        assert_eq!(did.query(), Some("version=1&flag"));
        assert_eq!(did.fragment(), Some("key1"));
        assert_eq!(
            did.params(),
            vec![("version", Some("1")), ("flag", None)]
        );
    }

    #[test]
    fn plc_identifier_rules() {
        // wrong length
        assert!(Did::new("did:plc:short").is_err());
        // wrong alphabet (0, 1, 8, 9 are not base32)
        assert!(Did::new("did:plc:44ybard66vv44zksje25o0dz").is_err());
        // uppercase rejected in strict parsing
        assert!(Did::new("did:plc:44YBARD66VV44ZKSJE25O7DZ").is_err());
    }

    #[test]
    fn web_identifier_rules() {
        assert!(Did::new("did:web:-bad.example.com").is_err());
        assert!(Did::new("did:web:bad-.example.com").is_err());
        assert!(Did::new("did:web:exa mple.com").is_err());
        let too_long = format!("did:web:{}.com", "a".repeat(253));
        assert!(Did::new(&too_long).is_err());
    }

    #[test]
    fn key_identifier_rules() {
        // must be z-prefixed base58btc
        assert!(Did::new("did:key:QmNotMultibase").is_err());
        assert!(Did::new("did:key:z0invalid").is_err());
        assert!(Did::new("did:key:z").is_err());
    }

    #[test]
    fn trailing_colon_rejected() {
        assert!(Did::new("did:web:example.com:").is_err());
    }

    #[test]
    fn percent_encoding_strictness() {
        assert!(Did::new("did:web:example.com:a%20b").is_ok());
        assert!(Did::new("did:web:example.com:a%2xb").is_err());
        assert!(Did::new("did:web:example.com:a%2").is_err());
    }

    #[test]
    fn roundtrip() {
        for s in [
            "did:plc:44ybard66vv44zksje25o7dz",
            "did:web:example.com:u:alice?v=1#frag",
            "did:key:zQ3shunBKsXixLxKtC5qeSG9E4J5RkGN57im31pcTzbNQnm5w",
        ] {
            assert_eq!(Did::new(s).unwrap().to_string(), s);
        }
    }

    #[test]
    fn normalization() {
        let did = Did::normalize("DID:WEB:EXAMPLE.COM?VERSION=1#KEY1").unwrap();
        assert_eq!(did.as_str(), "did:web:example.com?VERSION=1#KEY1");

        // plc identifier lowercases
        let did = Did::normalize("DID:PLC:44YBARD66VV44ZKSJE25O7DZ").unwrap();
        assert_eq!(did.as_str(), "did:plc:44ybard66vv44zksje25o7dz");

        // web path segments keep case
        let did = Did::normalize("did:web:EXAMPLE.com:Users:Alice").unwrap();
        assert_eq!(did.as_str(), "did:web:example.com:Users:Alice");
    }

    #[test]
    fn normalization_idempotent() {
        let once = Did::normalize("DID:WEB:EXAMPLE.COM?VERSION=1#KEY1").unwrap();
        let twice = Did::normalize(once.as_str()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn web_url_construction() {
        let bare = Did::new("did:web:example.com").unwrap();
        assert_eq!(
            bare.web_url().unwrap().as_str(),
            "https://example.com/.well-known/did.json"
        );

        let pathy = Did::new("did:web:example.com:u:alice").unwrap();
        assert_eq!(
            pathy.web_url().unwrap().as_str(),
            "https://example.com/u/alice/did.json"
        );

        let plc = Did::new("did:plc:44ybard66vv44zksje25o7dz").unwrap();
        assert!(plc.web_url().is_err());
    }
}
