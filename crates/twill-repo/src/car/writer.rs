//! CAR encoding

use super::CarHeader;
use crate::error::{CarError, RepoError, Result};
use crate::mst::Mst;
use crate::storage::BlockStore;
use bytes::Bytes;
use cid::Cid as IpldCid;
use twill_common::varint;

/// Encode a CAR archive from roots and blocks.
///
/// Blocks are written in iteration order; pass a `BTreeMap` (or its
/// iterator) for deterministic output.
pub fn encode_car(
    roots: &[IpldCid],
    blocks: impl IntoIterator<Item = (IpldCid, Bytes)>,
) -> Result<Vec<u8>> {
    let header = CarHeader::new_v1(roots.to_vec());
    let header_bytes =
        serde_ipld_dagcbor::to_vec(&header).map_err(|e| CarError::InvalidHeader(Box::new(e)))?;

    let mut out = Vec::with_capacity(header_bytes.len() + 64);
    varint::encode_into(header_bytes.len() as u64, &mut out);
    out.extend_from_slice(&header_bytes);

    for (cid, data) in blocks {
        let cid_bytes = cid.to_bytes();
        varint::encode_into((cid_bytes.len() + data.len()) as u64, &mut out);
        out.extend_from_slice(&cid_bytes);
        out.extend_from_slice(&data);
    }

    Ok(out)
}

/// Encode a full repository archive: the commit block, every MST node, and
/// every record block reachable from the tree.
///
/// The commit CID becomes the archive's single root. Commit and record
/// blocks are read from the tree's storage; a missing commit is an error,
/// missing record blocks are skipped (a partial store can still export its
/// structure).
pub fn encode_repo_car<S: BlockStore>(commit_cid: IpldCid, mst: &Mst<S>) -> Result<Vec<u8>> {
    let storage = mst.storage();
    let commit_data = storage
        .get(&commit_cid)?
        .ok_or_else(|| RepoError::not_found("commit", commit_cid))?;

    let (nodes, record_cids) = mst.export_blocks()?;

    let mut blocks = Vec::with_capacity(1 + nodes.len() + record_cids.len());
    blocks.push((commit_cid, commit_data));
    blocks.extend(nodes);

    let record_blocks = storage.get_many(&record_cids)?;
    for (cid, maybe_data) in record_cids.into_iter().zip(record_blocks) {
        if let Some(data) = maybe_data {
            blocks.push((cid, data));
        }
    }

    encode_car(&[commit_cid], blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::car::decode_car;
    use crate::mst::util::compute_cid;
    use crate::storage::memory::MemoryBlockStore;
    use std::sync::Arc;

    #[test]
    fn export_repo_car() {
        let storage = Arc::new(MemoryBlockStore::new());
        let mst = Mst::new(storage.clone());

        // two records
        let record1 = b"record one".to_vec();
        let record2 = b"record two".to_vec();
        let cid1 = storage.put(&record1).unwrap();
        let cid2 = storage.put(&record2).unwrap();

        let mst = mst.add("app.bsky.feed.post/abc123", cid1).unwrap();
        let mst = mst.add("app.bsky.feed.post/def456", cid2).unwrap();
        mst.persist().unwrap();

        // commit block
        let commit_bytes = b"commit placeholder".to_vec();
        let commit_cid = storage.put(&commit_bytes).unwrap();

        let car = encode_repo_car(commit_cid, &mst).unwrap();
        let parsed = decode_car(&car).unwrap();

        assert_eq!(parsed.root(), Some(&commit_cid));
        assert_eq!(
            parsed.get_block(&commit_cid).unwrap().as_ref(),
            commit_bytes.as_slice()
        );
        let root_cid = mst.root().unwrap();
        assert!(parsed.get_block(&root_cid).is_some());
        assert_eq!(parsed.get_block(&cid1).unwrap().as_ref(), record1.as_slice());
        assert_eq!(parsed.get_block(&cid2).unwrap().as_ref(), record2.as_slice());
    }

    #[test]
    fn missing_commit_is_error() {
        let storage = Arc::new(MemoryBlockStore::new());
        let mst = Mst::new(storage);
        let bogus = compute_cid(b"nowhere").unwrap();
        assert!(encode_repo_car(bogus, &mst).is_err());
    }

    #[test]
    fn reimport_into_fresh_store() {
        let storage = Arc::new(MemoryBlockStore::new());
        let mst = Mst::new(storage.clone());

        let cid1 = storage.put(b"a record").unwrap();
        let mst = mst.add("com.example.record/a", cid1).unwrap();
        mst.persist().unwrap();
        let commit_cid = storage.put(b"commit").unwrap();

        let car = encode_repo_car(commit_cid, &mst).unwrap();
        let parsed = decode_car(&car).unwrap();

        // seed a new store from the archive and read the tree back
        let fresh = Arc::new(MemoryBlockStore::new());
        fresh.put_many(parsed.blocks.clone()).unwrap();
        let reloaded = Mst::load(fresh, mst.root().unwrap(), None);
        assert_eq!(
            reloaded.get("com.example.record/a").unwrap(),
            Some(cid1)
        );
    }
}
