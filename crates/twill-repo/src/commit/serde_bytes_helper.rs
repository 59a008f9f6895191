//! Bridge between `bytes::Bytes` and CBOR byte strings.
//!
//! Serializing a `Bytes` value through serde's default machinery produces an
//! array of integers (CBOR major type 4); the wire format needs a byte
//! string (major type 2).

use bytes::Bytes;
use serde::{Deserializer, Serializer};

/// Serialize `Bytes` as a CBOR byte string
pub fn serialize<S>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serde_bytes::serialize(bytes.as_ref(), serializer)
}

/// Deserialize `Bytes` from a CBOR byte string
pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
where
    D: Deserializer<'de>,
{
    let vec: Vec<u8> = serde_bytes::deserialize(deserializer)?;
    Ok(Bytes::from(vec))
}
