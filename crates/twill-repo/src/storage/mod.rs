//! Block storage abstraction for MST nodes, commits, and records

use crate::error::Result;
use bytes::Bytes;
use cid::Cid as IpldCid;

/// CID-keyed block storage.
///
/// The library is synchronous and pull-based; implementations are expected to
/// answer from process-local state (a map, an mmap, a cache). Anything that
/// talks to a network belongs outside this crate, feeding blocks in through
/// an implementation of this trait.
///
/// Clone is required so the MST can share storage references across tree
/// operations.
///
/// # Example
///
/// ```rust,ignore
/// use twill_repo::storage::{BlockStore, MemoryBlockStore};
///
/// let storage = MemoryBlockStore::new();
/// let cid = storage.put(b"hello world")?;
/// assert!(storage.has(&cid)?);
/// ```
pub trait BlockStore: Clone {
    /// Get a block by CID.
    ///
    /// Returns `None` if the block is not found.
    fn get(&self, cid: &IpldCid) -> Result<Option<Bytes>>;

    /// Put a block, returning its CID.
    ///
    /// The CID is calculated from the data using a SHA-256 multihash and the
    /// DAG-CBOR codec, so the same data always produces the same CID.
    fn put(&self, data: &[u8]) -> Result<IpldCid>;

    /// Check whether a block exists without retrieving it.
    fn has(&self, cid: &IpldCid) -> Result<bool>;

    /// Put many blocks at once.
    ///
    /// The provided CIDs are trusted to match the data; implementations may
    /// recalculate and validate them.
    fn put_many(&self, blocks: impl IntoIterator<Item = (IpldCid, Bytes)>) -> Result<()>;

    /// Get multiple blocks at once.
    ///
    /// Returns a vec of the same length as the input, with `None` for
    /// missing blocks.
    fn get_many(&self, cids: &[IpldCid]) -> Result<Vec<Option<Bytes>>>;
}

pub mod memory;

pub use memory::MemoryBlockStore;
