//! In-memory block storage implementation

use crate::error::Result;
use crate::storage::BlockStore;
use bytes::Bytes;
use cid::Cid as IpldCid;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// In-memory block storage using a BTreeMap.
///
/// Useful for tests, temporary operations, and repositories that fit in
/// memory. Uses `Bytes` for reference-counted storage with cheap cloning;
/// clones of the store share the same underlying map.
#[derive(Debug, Clone)]
pub struct MemoryBlockStore {
    blocks: Arc<RwLock<BTreeMap<IpldCid, Bytes>>>,
}

impl MemoryBlockStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self {
            blocks: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Create a memory store from an existing map of blocks
    pub fn new_from_blocks(blocks: BTreeMap<IpldCid, Bytes>) -> Self {
        Self {
            blocks: Arc::new(RwLock::new(blocks)),
        }
    }

    /// Number of blocks stored
    pub fn len(&self) -> usize {
        self.blocks.read().unwrap().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.blocks.read().unwrap().is_empty()
    }

    /// Remove all blocks
    pub fn clear(&self) {
        self.blocks.write().unwrap().clear();
    }

    /// Snapshot the current contents.
    pub fn blocks(&self) -> BTreeMap<IpldCid, Bytes> {
        self.blocks.read().unwrap().clone()
    }
}

impl Default for MemoryBlockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockStore for MemoryBlockStore {
    fn get(&self, cid: &IpldCid) -> Result<Option<Bytes>> {
        Ok(self.blocks.read().unwrap().get(cid).cloned())
    }

    fn put(&self, data: &[u8]) -> Result<IpldCid> {
        let cid = crate::mst::util::compute_cid(data)?;
        self.blocks
            .write()
            .unwrap()
            .insert(cid, Bytes::copy_from_slice(data));
        Ok(cid)
    }

    fn has(&self, cid: &IpldCid) -> Result<bool> {
        Ok(self.blocks.read().unwrap().contains_key(cid))
    }

    fn put_many(&self, blocks: impl IntoIterator<Item = (IpldCid, Bytes)>) -> Result<()> {
        let mut store = self.blocks.write().unwrap();
        for (cid, data) in blocks {
            store.insert(cid, data);
        }
        Ok(())
    }

    fn get_many(&self, cids: &[IpldCid]) -> Result<Vec<Option<Bytes>>> {
        let store = self.blocks.read().unwrap();
        Ok(cids.iter().map(|cid| store.get(cid).cloned()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_and_get() {
        let store = MemoryBlockStore::new();
        let data = b"test data";

        let cid = store.put(data).unwrap();
        let retrieved = store.get(&cid).unwrap();

        assert_eq!(retrieved.as_deref(), Some(&data[..]));
    }

    #[test]
    fn has() {
        let store = MemoryBlockStore::new();
        let cid = store.put(b"test data").unwrap();
        assert!(store.has(&cid).unwrap());

        let fake_cid = IpldCid::default();
        assert!(!store.has(&fake_cid).unwrap());
    }

    #[test]
    fn put_many_and_get_many() {
        let store = MemoryBlockStore::new();

        let data1 = b"data1";
        let data2 = b"data2";
        let cid1 = crate::mst::util::compute_cid(data1).unwrap();
        let cid2 = crate::mst::util::compute_cid(data2).unwrap();

        store
            .put_many(vec![
                (cid1, Bytes::from_static(data1)),
                (cid2, Bytes::from_static(data2)),
            ])
            .unwrap();
        assert_eq!(store.len(), 2);

        let results = store
            .get_many(&[cid1, IpldCid::default(), cid2])
            .unwrap();
        assert_eq!(results[0].as_deref(), Some(&data1[..]));
        assert_eq!(results[1], None);
        assert_eq!(results[2].as_deref(), Some(&data2[..]));
    }

    #[test]
    fn clone_shares_storage() {
        let store1 = MemoryBlockStore::new();
        let store2 = store1.clone();

        let cid = store1.put(b"test").unwrap();
        assert!(store2.has(&cid).unwrap());
    }
}
