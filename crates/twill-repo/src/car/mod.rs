//! CAR (Content Addressable aRchive) codec
//!
//! The binary container for repository import and export: a DAG-CBOR header
//! naming the roots, then a sequence of length-prefixed (CID, bytes) blocks.
//!
//! Layout (CARv1):
//!
//! ```text
//! varint(len(header)) || DAG-CBOR({roots, version: 1})
//! repeat: varint(len(cid || data)) || cid-bytes || data
//! ```
//!
//! CIDs inside blocks use the canonical self-delimiting byte encoding, so
//! archives interoperate with the rest of the network.
//!
//! # Examples
//!
//! ```ignore
//! use twill_repo::car::{decode_car, encode_car};
//!
//! let bytes = encode_car(&[root], blocks)?;
//! let parsed = decode_car(&bytes)?;
//! assert_eq!(parsed.roots[0], root);
//! ```

pub mod reader;
pub mod writer;

pub use reader::{ParsedCar, decode_car};
pub use writer::{encode_car, encode_repo_car};

use cid::Cid as IpldCid;

/// CAR header: the archive's roots and format version.
///
/// Field order matters: the header is DAG-CBOR and peers hash these bytes.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CarHeader {
    /// Root CIDs; the first is the canonical head.
    pub roots: Vec<IpldCid>,
    /// Format version, currently always 1.
    pub version: u64,
}

impl CarHeader {
    /// A version-1 header with the given roots.
    pub fn new_v1(roots: Vec<IpldCid>) -> Self {
        Self { roots, version: 1 }
    }
}
