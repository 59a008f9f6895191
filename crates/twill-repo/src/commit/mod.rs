//! Commit structures and signature plumbing for AT Protocol repositories.

pub(crate) mod serde_bytes_helper;

use crate::error::{CommitError, Result};
use bytes::Bytes;
use cid::Cid as IpldCid;
use twill_common::IntoStatic;
use twill_common::types::crypto::{KeyCodec, PublicKey};
use twill_common::types::did::Did;
use twill_common::types::tid::Tid;

/// The commit version this library writes.
pub const COMMIT_VERSION: i64 = 3;

/// Repository commit object.
///
/// The signed, versioned snapshot anchoring a repository: stored as a block
/// in CAR files and identified by its CID. `rev` values strictly increase
/// along a commit chain; `prev` threads the chain backwards.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Commit<'a> {
    /// Repository DID
    #[serde(borrow)]
    pub did: Did<'a>,

    /// Commit version (3)
    pub version: i64,

    /// MST root CID
    pub data: IpldCid,

    /// Revision TID
    #[serde(borrow)]
    pub rev: Tid<'a>,

    /// Previous commit CID (None for an initial commit)
    pub prev: Option<IpldCid>,

    /// Signature bytes (empty when unsigned)
    #[serde(default, with = "serde_bytes_helper")]
    pub sig: Bytes,
}

/// The sig-less projection that gets signed.
///
/// Field order is the canonical `did, version, data, rev, prev`; peers must
/// agree on these bytes exactly.
#[derive(serde::Serialize)]
struct UnsignedCommit<'c, 'a> {
    did: &'c Did<'a>,
    version: i64,
    data: &'c IpldCid,
    rev: &'c Tid<'a>,
    prev: Option<IpldCid>,
}

impl<'a> Commit<'a> {
    /// New unsigned commit at the current protocol version, with a freshly
    /// generated revision.
    pub fn new_unsigned(did: Did<'a>, data: IpldCid) -> Self {
        Self {
            did,
            version: COMMIT_VERSION,
            data,
            rev: Tid::now_random(),
            prev: None,
            sig: Bytes::new(),
        }
    }

    /// New unsigned commit chained onto a prior commit's CID.
    pub fn new_next(did: Did<'a>, data: IpldCid, prev: IpldCid) -> Self {
        Self {
            prev: Some(prev),
            ..Self::new_unsigned(did, data)
        }
    }

    /// Override the revision (defaults to a fresh TID).
    pub fn with_rev(mut self, rev: Tid<'a>) -> Self {
        self.rev = rev;
        self
    }

    /// Whether a signature is present.
    pub fn is_signed(&self) -> bool {
        !self.sig.is_empty()
    }

    /// The bytes peers sign and verify: DAG-CBOR of the sig-less fields.
    pub fn unsigned_bytes(&self) -> Result<Vec<u8>> {
        let unsigned = UnsignedCommit {
            did: &self.did,
            version: self.version,
            data: &self.data,
            rev: &self.rev,
            prev: self.prev,
        };
        serde_ipld_dagcbor::to_vec(&unsigned)
            .map_err(|e| CommitError::Serialization(Box::new(e)).into())
    }

    /// Sign this commit with an injected key.
    ///
    /// Any failure inside the signer is reported as a signing failure with
    /// the cause attached.
    pub fn sign(mut self, key: &impl SigningKey) -> Result<Self> {
        let unsigned = self.unsigned_bytes()?;
        self.sig = key
            .sign_bytes(&unsigned)
            .map_err(CommitError::SigningFailed)?;
        Ok(self)
    }

    /// Verify the signature against a public key from a DID document.
    ///
    /// The curve is inferred from the key's multicodec. Returns an
    /// unsigned-commit error when no signature is present.
    pub fn verify(&self, pubkey: &PublicKey<'_>) -> std::result::Result<(), CommitError> {
        if !self.is_signed() {
            return Err(CommitError::UnsignedCommit);
        }
        let unsigned = self
            .unsigned_bytes()
            .map_err(|e| CommitError::VerificationFailed(Some(Box::new(e))))?;
        let signature = self.sig.as_ref();

        match pubkey.codec {
            KeyCodec::P256 => {
                use p256::ecdsa::{Signature, signature::Verifier};
                let verifying_key = pubkey
                    .to_p256()
                    .map_err(|e| CommitError::InvalidKey(e.to_string()))?;
                let sig = Signature::from_slice(signature)
                    .map_err(|e| CommitError::InvalidSignature(e.to_string()))?;
                verifying_key
                    .verify(&unsigned, &sig)
                    .map_err(|_| CommitError::VerificationFailed(None))?;
            }
            KeyCodec::Secp256k1 => {
                use k256::ecdsa::{Signature, signature::Verifier};
                let verifying_key = pubkey
                    .to_k256()
                    .map_err(|e| CommitError::InvalidKey(e.to_string()))?;
                let sig = Signature::from_slice(signature)
                    .map_err(|e| CommitError::InvalidSignature(e.to_string()))?;
                verifying_key
                    .verify(&unsigned, &sig)
                    .map_err(|_| CommitError::VerificationFailed(None))?;
            }
            KeyCodec::Unknown(code) => {
                return Err(CommitError::UnsupportedKeyType(code));
            }
        }

        Ok(())
    }

    /// Structural validation: version and field well-formedness.
    ///
    /// The typed fields already guarantee the DID and TID grammars; what's
    /// left is the version gate, which also catches commits deserialized
    /// from foreign data.
    pub fn validate(&self) -> std::result::Result<(), CommitError> {
        if self.version != COMMIT_VERSION {
            return Err(CommitError::InvalidVersion(self.version));
        }
        Ok(())
    }

    /// Serialize to DAG-CBOR.
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        serde_ipld_dagcbor::to_vec(self).map_err(|e| CommitError::Serialization(Box::new(e)).into())
    }

    /// Deserialize from DAG-CBOR.
    pub fn from_cbor(data: &'a [u8]) -> Result<Self> {
        serde_ipld_dagcbor::from_slice(data)
            .map_err(|e| CommitError::Serialization(Box::new(e)).into())
    }

    /// Compute the CID of this commit's current encoding.
    pub fn to_cid(&self) -> Result<IpldCid> {
        let cbor = self.to_cbor()?;
        crate::mst::util::compute_cid(&cbor)
    }
}

/// Byte-wise comparison of two revision TIDs.
///
/// Because TIDs are base32-sortable, this is also chronological order.
pub fn compare_revs(a: &Tid<'_>, b: &Tid<'_>) -> std::cmp::Ordering {
    a.as_str().cmp(b.as_str())
}

impl IntoStatic for Commit<'_> {
    type Output = Commit<'static>;

    fn into_static(self) -> Self::Output {
        Commit {
            did: self.did.into_static(),
            version: self.version,
            data: self.data,
            rev: self.rev.into_static(),
            prev: self.prev,
            sig: self.sig,
        }
    }
}

/// Capability interface for signing commit bytes.
///
/// Implemented for the p256 and k256 ECDSA signing keys, so the crypto
/// backend stays pluggable: anything that can sign bytes (an HSM proxy, a
/// remote signer) can implement this.
pub trait SigningKey {
    /// Sign the given data, returning the signature bytes.
    fn sign_bytes(
        &self,
        data: &[u8],
    ) -> std::result::Result<Bytes, Box<dyn std::error::Error + Send + Sync>>;

    /// The compressed public key bytes.
    fn public_key(&self) -> Vec<u8>;
}

impl SigningKey for p256::ecdsa::SigningKey {
    fn sign_bytes(
        &self,
        data: &[u8],
    ) -> std::result::Result<Bytes, Box<dyn std::error::Error + Send + Sync>> {
        use p256::ecdsa::signature::Signer;
        let sig: p256::ecdsa::Signature = Signer::sign(self, data);
        Ok(Bytes::copy_from_slice(&sig.to_bytes()))
    }

    fn public_key(&self) -> Vec<u8> {
        self.verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }
}

impl SigningKey for k256::ecdsa::SigningKey {
    fn sign_bytes(
        &self,
        data: &[u8],
    ) -> std::result::Result<Bytes, Box<dyn std::error::Error + Send + Sync>> {
        use k256::ecdsa::signature::Signer;
        let sig: k256::ecdsa::Signature = Signer::sign(self, data);
        Ok(Bytes::copy_from_slice(&sig.to_bytes()))
    }

    fn public_key(&self) -> Vec<u8> {
        self.verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twill_common::types::crypto::KeyCodec;

    fn test_cid(n: u8) -> IpldCid {
        use sha2::{Digest, Sha256};
        use twill_common::types::cid::{DAG_CBOR, SHA2_256};
        let hash = Sha256::digest([n]);
        let mh = multihash::Multihash::wrap(SHA2_256, &hash).unwrap();
        IpldCid::new_v1(DAG_CBOR, mh)
    }

    fn test_key() -> p256::ecdsa::SigningKey {
        p256::ecdsa::SigningKey::from_slice(&[7u8; 32]).unwrap()
    }

    fn test_pubkey(key: &p256::ecdsa::SigningKey) -> PublicKey<'static> {
        PublicKey::from_bytes(KeyCodec::P256, SigningKey::public_key(key)).unwrap()
    }

    #[test]
    fn new_unsigned_defaults() {
        let commit = Commit::new_unsigned(
            Did::raw("did:plc:44ybard66vv44zksje25o7dz"),
            test_cid(1),
        );
        assert_eq!(commit.version, 3);
        assert!(commit.prev.is_none());
        assert!(!commit.is_signed());
        assert!(commit.validate().is_ok());
    }

    #[test]
    fn chained_commits_increase_rev() {
        let did = Did::raw("did:plc:44ybard66vv44zksje25o7dz");
        let first = Commit::new_unsigned(did.clone(), test_cid(1))
            .with_rev(Tid::from_parts(1_700_000_000_000_000, 0));
        let first_cid = first.to_cid().unwrap();

        let second = Commit::new_next(did, test_cid(2), first_cid)
            .with_rev(Tid::from_parts(1_700_000_000_000_001, 0));

        assert_eq!(second.prev, Some(first_cid));
        assert_eq!(
            compare_revs(&first.rev, &second.rev),
            std::cmp::Ordering::Less
        );
    }

    #[test]
    fn sign_and_verify() {
        let key = test_key();
        let commit = Commit::new_unsigned(
            Did::raw("did:plc:44ybard66vv44zksje25o7dz"),
            test_cid(1),
        )
        .sign(&key)
        .unwrap();

        assert!(commit.is_signed());
        commit.verify(&test_pubkey(&key)).unwrap();
    }

    #[test]
    fn verify_unsigned_errors() {
        let key = test_key();
        let commit = Commit::new_unsigned(
            Did::raw("did:plc:44ybard66vv44zksje25o7dz"),
            test_cid(1),
        );
        assert!(matches!(
            commit.verify(&test_pubkey(&key)),
            Err(CommitError::UnsignedCommit)
        ));
    }

    #[test]
    fn tampered_commit_fails_verification() {
        let key = test_key();
        let mut commit = Commit::new_unsigned(
            Did::raw("did:plc:44ybard66vv44zksje25o7dz"),
            test_cid(1),
        )
        .sign(&key)
        .unwrap();

        commit.data = test_cid(2);
        assert!(commit.verify(&test_pubkey(&key)).is_err());
    }

    #[test]
    fn wrong_curve_is_rejected() {
        let key = test_key();
        let commit = Commit::new_unsigned(
            Did::raw("did:plc:44ybard66vv44zksje25o7dz"),
            test_cid(1),
        )
        .sign(&key)
        .unwrap();

        let wrong = PublicKey::from_bytes(KeyCodec::Unknown(0xED), vec![2u8; 33]).unwrap();
        assert!(matches!(
            commit.verify(&wrong),
            Err(CommitError::UnsupportedKeyType(0xED))
        ));
    }

    #[test]
    fn invalid_version_rejected() {
        let mut commit = Commit::new_unsigned(
            Did::raw("did:plc:44ybard66vv44zksje25o7dz"),
            test_cid(1),
        );
        commit.version = 2;
        assert!(matches!(
            commit.validate(),
            Err(CommitError::InvalidVersion(2))
        ));
    }

    #[test]
    fn cbor_roundtrip() {
        let key = test_key();
        let commit = Commit::new_unsigned(
            Did::raw("did:plc:44ybard66vv44zksje25o7dz"),
            test_cid(1),
        )
        .with_rev(Tid::from_parts(1_700_000_000_000_000, 3))
        .sign(&key)
        .unwrap();

        let cbor = commit.to_cbor().unwrap();
        let decoded = Commit::from_cbor(&cbor).unwrap();
        assert_eq!(decoded.did.as_str(), commit.did.as_str());
        assert_eq!(decoded.rev.as_str(), commit.rev.as_str());
        assert_eq!(decoded.data, commit.data);
        assert_eq!(decoded.sig, commit.sig);
        decoded.verify(&test_pubkey(&key)).unwrap();
    }

    #[test]
    fn unsigned_bytes_exclude_signature() {
        let key = test_key();
        let unsigned = Commit::new_unsigned(
            Did::raw("did:plc:44ybard66vv44zksje25o7dz"),
            test_cid(1),
        )
        .with_rev(Tid::from_parts(1_700_000_000_000_000, 3));
        let before = unsigned.unsigned_bytes().unwrap();
        let signed = unsigned.sign(&key).unwrap();
        assert_eq!(signed.unsigned_bytes().unwrap(), before);
    }
}
