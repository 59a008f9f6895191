//! CAR decoding

use super::CarHeader;
use crate::error::{CarError, Result};
use bytes::Bytes;
use cid::Cid as IpldCid;
use std::collections::BTreeMap;
use twill_common::varint;

/// A fully decoded CAR archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCar {
    /// Root CIDs from the header; the first is the canonical head.
    pub roots: Vec<IpldCid>,
    /// All blocks, keyed by CID.
    pub blocks: BTreeMap<IpldCid, Bytes>,
}

impl ParsedCar {
    /// The canonical head: the first root.
    pub fn root(&self) -> Option<&IpldCid> {
        self.roots.first()
    }

    /// Look up a block by CID.
    pub fn get_block(&self, cid: &IpldCid) -> Option<&Bytes> {
        self.blocks.get(cid)
    }
}

fn read_varint<'d>(input: &'d [u8], context: &'static str) -> Result<(u64, &'d [u8])> {
    varint::decode(input).map_err(|_| CarError::InsufficientData { context }.into())
}

fn take<'d>(input: &'d [u8], len: usize, context: &'static str) -> Result<(&'d [u8], &'d [u8])> {
    if input.len() < len {
        return Err(CarError::InsufficientData { context }.into());
    }
    Ok(input.split_at(len))
}

/// Decode a CAR archive from bytes.
///
/// Fails with an insufficient-data error whenever a length prefix points
/// past the end of the input, and surfaces CID parse failures from block
/// bodies.
pub fn decode_car(data: &[u8]) -> Result<ParsedCar> {
    let (header_len, rest) = read_varint(data, "header length")?;
    let (header_bytes, mut rest) = take(rest, header_len as usize, "header")?;

    let header: CarHeader = serde_ipld_dagcbor::from_slice(header_bytes)
        .map_err(|e| CarError::InvalidHeader(Box::new(e)))?;
    if header.version != 1 {
        return Err(CarError::UnsupportedVersion(header.version).into());
    }

    let mut blocks = BTreeMap::new();
    while !rest.is_empty() {
        let (block_len, after_len) = read_varint(rest, "block length")?;
        let (block, after_block) = take(after_len, block_len as usize, "block")?;

        // the CID is self-delimiting; whatever follows it is the payload
        let mut cursor = std::io::Cursor::new(block);
        let cid = IpldCid::read_bytes(&mut cursor).map_err(CarError::InvalidCid)?;
        let data_start = cursor.position() as usize;
        blocks.insert(cid, Bytes::copy_from_slice(&block[data_start..]));

        rest = after_block;
    }

    Ok(ParsedCar {
        roots: header.roots,
        blocks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::car::encode_car;
    use crate::mst::util::compute_cid;

    fn test_block(n: u8) -> (IpldCid, Bytes) {
        let data = vec![n, n + 1, n + 2];
        (compute_cid(&data).unwrap(), Bytes::from(data))
    }

    #[test]
    fn roundtrip() {
        let (cid1, data1) = test_block(1);
        let (cid2, data2) = test_block(4);

        let bytes = encode_car(
            &[cid1],
            vec![(cid1, data1.clone()), (cid2, data2.clone())],
        )
        .unwrap();

        let parsed = decode_car(&bytes).unwrap();
        assert_eq!(parsed.roots, vec![cid1]);
        assert_eq!(parsed.root(), Some(&cid1));
        assert_eq!(parsed.blocks.len(), 2);
        assert_eq!(parsed.get_block(&cid1), Some(&data1));
        assert_eq!(parsed.get_block(&cid2), Some(&data2));
    }

    #[test]
    fn multiple_roots() {
        let (cid1, data1) = test_block(1);
        let (cid2, _) = test_block(4);

        let bytes = encode_car(&[cid1, cid2], vec![(cid1, data1)]).unwrap();
        let parsed = decode_car(&bytes).unwrap();
        assert_eq!(parsed.roots, vec![cid1, cid2]);
    }

    #[test]
    fn empty_blocks() {
        let (cid1, _) = test_block(1);
        let bytes = encode_car(&[cid1], vec![]).unwrap();
        let parsed = decode_car(&bytes).unwrap();
        assert!(parsed.blocks.is_empty());
    }

    #[test]
    fn truncated_header() {
        let (cid1, data1) = test_block(1);
        let bytes = encode_car(&[cid1], vec![(cid1, data1)]).unwrap();

        // header length varint says more than we provide
        assert!(decode_car(&bytes[..3]).is_err());
        assert!(decode_car(&[]).is_err());
    }

    #[test]
    fn truncated_block() {
        let (cid1, data1) = test_block(1);
        let bytes = encode_car(&[cid1], vec![(cid1, data1)]).unwrap();

        // chop the final payload byte
        let err = decode_car(&bytes[..bytes.len() - 1]).unwrap_err();
        assert_eq!(err.kind(), crate::error::RepoErrorKind::Car);
    }

    #[test]
    fn garbage_block_cid() {
        let (cid1, _) = test_block(1);
        let header = super::super::CarHeader::new_v1(vec![cid1]);
        let header_bytes = serde_ipld_dagcbor::to_vec(&header).unwrap();

        let mut bytes = twill_common::varint::encode(header_bytes.len() as u64);
        bytes.extend_from_slice(&header_bytes);
        // block of 3 garbage bytes where a CID should start
        bytes.extend_from_slice(&[3, 0xFF, 0xFF, 0xFF]);

        assert!(decode_car(&bytes).is_err());
    }
}
