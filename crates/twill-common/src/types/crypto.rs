//! Multicodec public keys and did:key conversion.
//!
//! atproto signing keys are compressed SEC1 points carried behind a
//! multicodec varint prefix, multibase base58btc encoded. The same payload
//! appears in `did:key` identifiers and in DID document Multikey entries.

use crate::types::did::{Did, DidMethod};
use crate::{IntoStatic, varint};
use std::borrow::Cow;

/// p256-pub
pub const P256_CODE: u64 = 0x1200;

/// secp256k1-pub
pub const SECP256K1_CODE: u64 = 0xE7;

/// Compressed SEC1 point length.
const COMPRESSED_LEN: usize = 33;

/// Known multicodec key codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCodec {
    /// NIST P-256 (ES256)
    P256,
    /// secp256k1 (ES256K)
    Secp256k1,
    /// Unknown codec
    Unknown(u64),
}

impl KeyCodec {
    /// The multicodec code.
    pub fn code(self) -> u64 {
        match self {
            KeyCodec::P256 => P256_CODE,
            KeyCodec::Secp256k1 => SECP256K1_CODE,
            KeyCodec::Unknown(code) => code,
        }
    }
}

/// JWT signing algorithm implied by a key codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JwtAlg {
    /// ECDSA over P-256 with SHA-256
    ES256,
    /// ECDSA over secp256k1 with SHA-256
    ES256K,
}

impl JwtAlg {
    /// The RFC 7518 / draft registry name.
    pub fn as_str(self) -> &'static str {
        match self {
            JwtAlg::ES256 => "ES256",
            JwtAlg::ES256K => "ES256K",
        }
    }
}

/// Errors from decoding or converting multicodec key values.
#[derive(Debug, Clone, thiserror::Error, miette::Diagnostic, PartialEq, Eq)]
pub enum CryptoError {
    /// Multibase decode error
    #[error("failed to decode multibase")]
    #[diagnostic(code(twill::crypto::multibase))]
    MultibaseDecode,

    /// Multicodec varint decode error
    #[error("failed to decode multicodec varint")]
    #[diagnostic(code(twill::crypto::multicodec))]
    MulticodecDecode,

    /// Codec outside the atproto registry
    #[error("unsupported key codec: {0:#x}")]
    #[diagnostic(code(twill::crypto::unsupported_codec))]
    UnsupportedCodec(u64),

    /// Key bytes have the wrong length
    #[error("invalid key length: expected {expected}, got {got}")]
    #[diagnostic(code(twill::crypto::length))]
    InvalidLength {
        /// Expected length of the key
        expected: usize,
        /// Actual length of the key
        got: usize,
    },

    /// Point encoding is not a compressed SEC1 point
    #[error("invalid key format")]
    #[diagnostic(code(twill::crypto::format))]
    InvalidFormat,

    /// DID passed to [`PublicKey::from_did`] isn't a did:key
    #[error("not a did:key")]
    #[diagnostic(code(twill::crypto::not_did_key))]
    NotDidKey,

    /// Conversion to a concrete curve type failed
    #[error("conversion error: {0}")]
    #[diagnostic(code(twill::crypto::conversion))]
    Conversion(String),
}

/// Public key decoded from a multicodec payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey<'a> {
    /// Codec the key was encoded with
    pub codec: KeyCodec,
    /// Compressed SEC1 point bytes
    pub bytes: Cow<'a, [u8]>,
}

impl PublicKey<'_> {
    /// Decode from a multibase-encoded multicodec string (the form found in
    /// `did:key` identifiers and Multikey `publicKeyMultibase` fields).
    pub fn decode(multibase_str: &str) -> Result<PublicKey<'static>, CryptoError> {
        let (_base, data) =
            multibase::decode(multibase_str).map_err(|_| CryptoError::MultibaseDecode)?;
        let (code, rest) = varint::decode(&data).map_err(|_| CryptoError::MulticodecDecode)?;
        let codec = match code {
            P256_CODE => KeyCodec::P256,
            SECP256K1_CODE => KeyCodec::Secp256k1,
            other => return Err(CryptoError::UnsupportedCodec(other)),
        };
        if rest.len() != COMPRESSED_LEN {
            return Err(CryptoError::InvalidLength {
                expected: COMPRESSED_LEN,
                got: rest.len(),
            });
        }
        // 0x02 / 0x03 are the compressed y-parity tags
        if rest[0] != 0x02 && rest[0] != 0x03 {
            return Err(CryptoError::InvalidFormat);
        }
        Ok(PublicKey {
            codec,
            bytes: Cow::Owned(rest.to_vec()),
        })
    }

    /// Decode from a `did:key` DID, exposing the signing algorithm and key
    /// bytes behind the identifier.
    pub fn from_did(did: &Did<'_>) -> Result<PublicKey<'static>, CryptoError> {
        if did.method() != DidMethod::Key {
            return Err(CryptoError::NotDidKey);
        }
        Self::decode(did.identifier())
    }

    /// The multibase (z-prefixed base58btc) multicodec form.
    pub fn multibase(&self) -> String {
        let mut buf = varint::encode(self.codec.code());
        buf.extend_from_slice(&self.bytes);
        multibase::encode(multibase::Base::Base58Btc, buf)
    }

    /// Format as a `did:key` DID.
    pub fn to_did_key(&self) -> Did<'static> {
        // the multibase form always satisfies the did:key grammar
        Did::raw(&format!("did:key:{}", self.multibase())).into_static()
    }

    /// The JWT algorithm this key signs with.
    pub fn jwt_alg(&self) -> Option<JwtAlg> {
        match self.codec {
            KeyCodec::P256 => Some(JwtAlg::ES256),
            KeyCodec::Secp256k1 => Some(JwtAlg::ES256K),
            KeyCodec::Unknown(_) => None,
        }
    }

    /// Convert to a p256 verifying key.
    pub fn to_p256(&self) -> Result<p256::ecdsa::VerifyingKey, CryptoError> {
        if self.codec != KeyCodec::P256 {
            return Err(CryptoError::UnsupportedCodec(self.codec.code()));
        }
        p256::ecdsa::VerifyingKey::from_sec1_bytes(self.bytes.as_ref())
            .map_err(|e| CryptoError::Conversion(e.to_string()))
    }

    /// Convert to a k256 verifying key.
    pub fn to_k256(&self) -> Result<k256::ecdsa::VerifyingKey, CryptoError> {
        if self.codec != KeyCodec::Secp256k1 {
            return Err(CryptoError::UnsupportedCodec(self.codec.code()));
        }
        k256::ecdsa::VerifyingKey::from_sec1_bytes(self.bytes.as_ref())
            .map_err(|e| CryptoError::Conversion(e.to_string()))
    }
}

impl PublicKey<'static> {
    /// Wrap raw compressed point bytes.
    pub fn from_bytes(codec: KeyCodec, bytes: Vec<u8>) -> Result<Self, CryptoError> {
        if bytes.len() != COMPRESSED_LEN {
            return Err(CryptoError::InvalidLength {
                expected: COMPRESSED_LEN,
                got: bytes.len(),
            });
        }
        Ok(PublicKey {
            codec,
            bytes: Cow::Owned(bytes),
        })
    }
}

impl IntoStatic for PublicKey<'_> {
    type Output = PublicKey<'static>;

    fn into_static(self) -> Self::Output {
        PublicKey {
            codec: self.codec,
            bytes: Cow::Owned(self.bytes.into_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multikey(code: u64, key: &[u8]) -> String {
        let mut buf = varint::encode(code);
        buf.extend_from_slice(key);
        multibase::encode(multibase::Base::Base58Btc, buf)
    }

    fn compressed_point(tag: u8) -> [u8; 33] {
        let mut key = [0u8; 33];
        key[0] = tag;
        key[32] = 7;
        key
    }

    #[test]
    fn decode_p256() {
        let key = compressed_point(0x02);
        let s = multikey(P256_CODE, &key);
        let pk = PublicKey::decode(&s).expect("decode");
        assert_eq!(pk.codec, KeyCodec::P256);
        assert_eq!(pk.bytes.as_ref(), &key);
        assert_eq!(pk.jwt_alg(), Some(JwtAlg::ES256));
    }

    #[test]
    fn decode_secp256k1() {
        let key = compressed_point(0x03);
        let s = multikey(SECP256K1_CODE, &key);
        let pk = PublicKey::decode(&s).expect("decode");
        assert_eq!(pk.codec, KeyCodec::Secp256k1);
        assert_eq!(pk.jwt_alg(), Some(JwtAlg::ES256K));
    }

    #[test]
    fn reject_unknown_codec() {
        let key = compressed_point(0x02);
        let s = multikey(0xED, &key);
        assert_eq!(
            PublicKey::decode(&s),
            Err(CryptoError::UnsupportedCodec(0xED))
        );
    }

    #[test]
    fn reject_uncompressed() {
        let mut key = [0u8; 65];
        key[0] = 0x04;
        let s = multikey(P256_CODE, &key);
        assert!(matches!(
            PublicKey::decode(&s),
            Err(CryptoError::InvalidLength { .. })
        ));
    }

    #[test]
    fn did_key_roundtrip() {
        let key = compressed_point(0x02);
        let pk = PublicKey::from_bytes(KeyCodec::P256, key.to_vec()).unwrap();
        let did = pk.to_did_key();
        assert!(did.as_str().starts_with("did:key:z"));
        let decoded = PublicKey::from_did(&did).unwrap();
        assert_eq!(decoded, pk);
    }

    #[test]
    fn from_did_rejects_other_methods() {
        let did = Did::new("did:plc:44ybard66vv44zksje25o7dz").unwrap();
        assert_eq!(PublicKey::from_did(&did), Err(CryptoError::NotDidKey));
    }
}
