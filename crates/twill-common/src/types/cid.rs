use crate::{CowStr, IntoStatic};
pub use cid::Cid as IpldCid;
use multihash::Multihash;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Visitor};
use sha2::{Digest, Sha256};
use smol_str::ToSmolStr;
use std::{fmt, ops::Deref, str::FromStr};

/// raw
pub const RAW: u64 = 0x55;

/// dag-pb
pub const DAG_PB: u64 = 0x70;

/// dag-cbor
pub const DAG_CBOR: u64 = 0x71;

/// SHA-256
pub const SHA2_256: u64 = 0x12;

/// base 32, the multibase atproto renders CIDs in
pub const ATP_CID_BASE: multibase::Base = multibase::Base::Base32Lower;

/// Content codec carried in a CID header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CidCodec {
    /// dag-pb (0x70), the codec of every CIDv0
    DagPb,
    /// dag-cbor (0x71), the codec of repo records and MST nodes
    DagCbor,
    /// raw (0x55), the codec of blob CIDs
    Raw,
    /// any other registered multicodec
    Other(u64),
}

impl CidCodec {
    /// The multicodec code for this codec.
    pub fn code(self) -> u64 {
        match self {
            CidCodec::DagPb => DAG_PB,
            CidCodec::DagCbor => DAG_CBOR,
            CidCodec::Raw => RAW,
            CidCodec::Other(code) => code,
        }
    }

    /// Codec from a multicodec code.
    pub fn from_code(code: u64) -> Self {
        match code {
            DAG_PB => CidCodec::DagPb,
            DAG_CBOR => CidCodec::DagCbor,
            RAW => CidCodec::Raw,
            other => CidCodec::Other(other),
        }
    }
}

/// Base encoding of a CID's string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CidBase {
    /// base58btc (`z` prefix on CIDv1; implicit on CIDv0)
    Base58Btc,
    /// base32 lower (`b` prefix)
    Base32,
}

/// Errors from CID parsing and conversion.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum CidError {
    /// String doesn't match any CID form we accept.
    #[error("invalid CID format: {0}")]
    #[diagnostic(code(twill::cid::invalid_format))]
    InvalidFormat(&'static str),

    /// Binary CID decoding failed.
    #[error(transparent)]
    #[diagnostic(code(twill::cid::ipld))]
    Ipld(#[from] cid::Error),

    /// Bytes weren't valid utf8 when a string CID was expected.
    #[error(transparent)]
    #[diagnostic(code(twill::cid::utf8))]
    Utf8(#[from] std::str::Utf8Error),
}

/// Either the string form of a CID or the parsed IPLD form.
///
/// The IPLD form also caches the string representation. Strings round-trip
/// exactly: whatever was parsed is what `as_str` and `Display` give back.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Cid<'c> {
    /// Parsed CID with its original (or rendered) string form
    Ipld {
        /// the parsed CID
        cid: IpldCid,
        /// cached string form
        s: CowStr<'c>,
    },
    /// String-only CID (well-formed per the string grammar, not decoded)
    Str(CowStr<'c>),
}

/// Check the string grammar: CIDv0 (`Qm…`, 46 chars), CIDv1 base32
/// (`b` + `[a-z2-7]+`), or CIDv1 base58btc (`z` + `[1-9A-Za-z]+`).
fn check_format(s: &str) -> Result<(), CidError> {
    if s.starts_with("Qm") {
        if s.len() != 46 {
            return Err(CidError::InvalidFormat("CIDv0 must be 46 characters"));
        }
        Ok(())
    } else if let Some(tail) = s.strip_prefix('b') {
        if tail.is_empty() || !tail.bytes().all(|b| matches!(b, b'a'..=b'z' | b'2'..=b'7')) {
            return Err(CidError::InvalidFormat("CIDv1 base32 body must be [a-z2-7]"));
        }
        Ok(())
    } else if let Some(tail) = s.strip_prefix('z') {
        if tail.is_empty()
            || !tail
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() && b != b'0')
        {
            return Err(CidError::InvalidFormat(
                "CIDv1 base58btc body must be [1-9A-Za-z]",
            ));
        }
        Ok(())
    } else {
        Err(CidError::InvalidFormat("unrecognized CID prefix"))
    }
}

impl<'c> Cid<'c> {
    /// Parse a CID string, validating the string grammar and borrowing from
    /// the input.
    ///
    /// Decodes the binary form when possible, but a string that matches the
    /// grammar without decoding (e.g. a hash we don't know) is kept as-is:
    /// equality and ordering are by string form either way.
    pub fn parse(s: &'c str) -> Result<Self, CidError> {
        check_format(s)?;
        if let Ok(cid) = IpldCid::try_from(s) {
            Ok(Cid::Ipld {
                cid,
                s: CowStr::Borrowed(s),
            })
        } else {
            Ok(Cid::Str(CowStr::Borrowed(s)))
        }
    }

    /// Parse a CID string, taking ownership.
    pub fn parse_owned(s: impl AsRef<str>) -> Result<Cid<'static>, CidError> {
        let s = s.as_ref();
        check_format(s)?;
        if let Ok(cid) = IpldCid::try_from(s) {
            Ok(Cid::Ipld {
                cid,
                s: CowStr::copy_from_str(s),
            })
        } else {
            Ok(Cid::Str(CowStr::copy_from_str(s)))
        }
    }

    /// Content-address `data`: SHA-256 multihash, CIDv1 with the given codec,
    /// rendered base32.
    pub fn from_data(data: &[u8], codec: CidCodec) -> Cid<'static> {
        let digest = Sha256::digest(data);
        // a 32-byte digest always fits the 64-byte multihash buffer
        let mh = Multihash::<64>::wrap(SHA2_256, digest.as_slice()).expect("sha-256 digest fits");
        Cid::ipld(IpldCid::new_v1(codec.code(), mh))
    }

    /// Content-address DAG-CBOR bytes (records, MST nodes, commits).
    pub fn from_dag_cbor(data: &[u8]) -> Cid<'static> {
        Self::from_data(data, CidCodec::DagCbor)
    }

    /// Content-address raw bytes (blobs).
    pub fn from_raw_data(data: &[u8]) -> Cid<'static> {
        Self::from_data(data, CidCodec::Raw)
    }

    /// From binary CID bytes, falling back to the utf8 string form.
    pub fn new(cid: &'c [u8]) -> Result<Self, CidError> {
        if let Ok(cid) = IpldCid::try_from(cid) {
            Ok(Self::ipld(cid))
        } else {
            let cid_str = CowStr::from_utf8(cid)?;
            Ok(Self::Str(cid_str))
        }
    }

    /// Wrap a parsed IPLD CID, rendering its base32 string form.
    pub fn ipld(cid: IpldCid) -> Cid<'static> {
        let s = CowStr::Owned(
            cid.to_string_of_base(ATP_CID_BASE)
                .unwrap_or_default()
                .to_smolstr(),
        );
        Cid::Ipld { cid, s }
    }

    /// Wrap a string without validating.
    pub fn str(cid: &'c str) -> Self {
        Self::Str(CowStr::Borrowed(cid))
    }

    /// Wrap a [`CowStr`] without validating.
    pub fn cow_str(cid: CowStr<'c>) -> Self {
        Self::Str(cid)
    }

    /// CID version: 0 for `Qm…`, 1 otherwise.
    pub fn version(&self) -> u64 {
        match self {
            Cid::Ipld { cid, .. } => cid.version() as u64,
            Cid::Str(s) => {
                if s.starts_with("Qm") {
                    0
                } else {
                    1
                }
            }
        }
    }

    /// Content codec. Derived from the string prefix when the binary form
    /// isn't available (CIDv0 implies dag-pb, CIDv1 defaults to dag-cbor).
    pub fn codec(&self) -> CidCodec {
        match self {
            Cid::Ipld { cid, .. } => CidCodec::from_code(cid.codec()),
            Cid::Str(s) => {
                if s.starts_with("Qm") {
                    CidCodec::DagPb
                } else {
                    CidCodec::DagCbor
                }
            }
        }
    }

    /// Base encoding of the string form.
    pub fn multibase(&self) -> CidBase {
        match self.as_str().as_bytes().first() {
            Some(b'b') => CidBase::Base32,
            _ => CidBase::Base58Btc,
        }
    }

    /// The parsed IPLD CID, decoding the string form if needed.
    pub fn to_ipld(&self) -> Result<IpldCid, cid::Error> {
        match self {
            Cid::Ipld { cid, s: _ } => Ok(*cid),
            Cid::Str(cow_str) => IpldCid::try_from(cow_str.as_ref()),
        }
    }

    /// The string form.
    pub fn as_str(&self) -> &str {
        match self {
            Cid::Ipld { cid: _, s } => s.as_ref(),
            Cid::Str(cow_str) => cow_str.as_ref(),
        }
    }
}

impl fmt::Display for Cid<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cid<'_> {
    type Err = CidError;

    /// Has to take ownership due to the lifetime constraints of the FromStr
    /// trait. Prefer [`Cid::parse`] if you want to borrow.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cid::parse_owned(s)
    }
}

impl IntoStatic for Cid<'_> {
    type Output = Cid<'static>;

    fn into_static(self) -> Self::Output {
        match self {
            Cid::Ipld { cid, s } => Cid::Ipld {
                cid,
                s: s.into_static(),
            },
            Cid::Str(cow_str) => Cid::Str(cow_str.into_static()),
        }
    }
}

impl Serialize for Cid<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(self.as_str())
        } else {
            match self {
                Cid::Ipld { cid, s: _ } => cid.serialize(serializer),
                Cid::Str(cow_str) => cow_str.serialize(serializer),
            }
        }
    }
}

impl<'de> Deserialize<'de> for Cid<'_> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct StringOrBytes;

        impl<'de> Visitor<'de> for StringOrBytes {
            type Value = Cid<'static>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("either binary CID bytes or a CID string")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Cid::Str(CowStr::copy_from_str(v)))
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let cid = IpldCid::try_from(v).map_err(E::custom)?;
                Ok(Cid::ipld(cid))
            }
        }

        deserializer.deserialize_any(StringOrBytes)
    }
}

impl From<Cid<'_>> for String {
    fn from(value: Cid) -> Self {
        let cow_str = match value {
            Cid::Ipld { cid: _, s } => s,
            Cid::Str(cow_str) => cow_str,
        };
        cow_str.to_string()
    }
}

impl<'d> From<Cid<'d>> for CowStr<'d> {
    fn from(value: Cid<'d>) -> Self {
        match value {
            Cid::Ipld { cid: _, s } => s,
            Cid::Str(cow_str) => cow_str,
        }
    }
}

impl From<String> for Cid<'_> {
    fn from(value: String) -> Self {
        Cid::Str(CowStr::Owned(value.to_smolstr()))
    }
}

impl<'d> From<CowStr<'d>> for Cid<'d> {
    fn from(value: CowStr<'d>) -> Self {
        Cid::Str(value)
    }
}

impl From<IpldCid> for Cid<'_> {
    fn from(value: IpldCid) -> Self {
        Cid::ipld(value)
    }
}

impl AsRef<str> for Cid<'_> {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Deref for Cid<'_> {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

/// CID link wrapper that serializes as `{"$link": "cid"}` in JSON
/// and as a raw CID in CBOR.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct CidLink<'c>(pub Cid<'c>);

impl<'c> CidLink<'c> {
    /// Wrap a parsed IPLD CID.
    pub fn ipld(cid: IpldCid) -> CidLink<'static> {
        CidLink(Cid::ipld(cid))
    }

    /// Wrap a string without validating.
    pub fn str(cid: &'c str) -> Self {
        Self(Cid::str(cid))
    }

    /// The string form.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// The parsed IPLD CID.
    pub fn to_ipld(&self) -> Result<IpldCid, cid::Error> {
        self.0.to_ipld()
    }

    /// Unwrap into the inner [`Cid`].
    pub fn into_inner(self) -> Cid<'c> {
        self.0
    }
}

impl fmt::Display for CidLink<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for CidLink<'_> {
    type Err = CidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(CidLink(Cid::from_str(s)?))
    }
}

impl IntoStatic for CidLink<'_> {
    type Output = CidLink<'static>;

    fn into_static(self) -> Self::Output {
        CidLink(self.0.into_static())
    }
}

impl Serialize for CidLink<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            use serde::ser::SerializeMap;
            let mut map = serializer.serialize_map(Some(1))?;
            map.serialize_entry("$link", self.0.as_str())?;
            map.end()
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for CidLink<'_> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            struct LinkVisitor;

            impl<'de> Visitor<'de> for LinkVisitor {
                type Value = CidLink<'static>;

                fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                    formatter.write_str("a CID link object with $link field")
                }

                fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
                where
                    A: serde::de::MapAccess<'de>,
                {
                    use serde::de::Error;

                    let mut link: Option<String> = None;

                    while let Some(key) = map.next_key::<String>()? {
                        if key == "$link" {
                            link = Some(map.next_value()?);
                        } else {
                            let _: serde::de::IgnoredAny = map.next_value()?;
                        }
                    }

                    if let Some(cid_str) = link {
                        Ok(CidLink(Cid::from(cid_str)))
                    } else {
                        Err(A::Error::missing_field("$link"))
                    }
                }
            }

            deserializer.deserialize_map(LinkVisitor)
        } else {
            Ok(CidLink(Cid::deserialize(deserializer)?))
        }
    }
}

impl<'c> From<Cid<'c>> for CidLink<'c> {
    fn from(value: Cid<'c>) -> Self {
        CidLink(value)
    }
}

impl<'c> From<CidLink<'c>> for Cid<'c> {
    fn from(value: CidLink<'c>) -> Self {
        value.0
    }
}

impl From<IpldCid> for CidLink<'_> {
    fn from(value: IpldCid) -> Self {
        CidLink(Cid::from(value))
    }
}

impl AsRef<str> for CidLink<'_> {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl Deref for CidLink<'_> {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.deref()
    }
}
