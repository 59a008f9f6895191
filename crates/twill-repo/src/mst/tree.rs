//! Immutable Merkle Search Tree operations

use super::node::NodeEntry;
use super::util;
use crate::error::{RepoError, Result};
use crate::storage::BlockStore;
use bytes::Bytes;
use cid::Cid as IpldCid;
use smol_str::SmolStr;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Write operation for batch application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Create a new record (error if the key exists)
    Create {
        /// Record key (collection/rkey)
        key: SmolStr,
        /// Record CID
        cid: IpldCid,
    },

    /// Update an existing record (error if the key doesn't exist)
    Update {
        /// Record key (collection/rkey)
        key: SmolStr,
        /// New record CID
        cid: IpldCid,
    },

    /// Delete a record (error if the key doesn't exist)
    Delete {
        /// Record key (collection/rkey)
        key: SmolStr,
    },
}

/// Immutable Merkle Search Tree.
///
/// Operations return new tree values, leaving the original unchanged. A
/// single tree value is safe to share: nothing mutates in place except the
/// lazily-computed caches behind locks.
///
/// # Architecture
///
/// The tree uses a flat `Vec<NodeEntry>` representation in memory, where
/// `NodeEntry` is either a `Tree` (subtree) or a `Leaf` (key-value pair),
/// interleaved as `[Tree, Leaf, Tree, Leaf, Leaf, Tree]` and so on. This
/// makes the structural operations simple Vec splicing.
///
/// The wire format uses prefix compression and left/tree pointers; see
/// `NodeData` in node.rs.
///
/// # Layer structure
///
/// Keys are SHA-256 hashed and their leading zero bits determine the layer
/// (floor(zeros / 2), giving a fanout of ~4). The resulting shape is
/// deterministic and independent of insertion order, which is what makes
/// the root CID a digest of the map's contents.
pub struct Mst<S> {
    /// Block storage for loading and persisting nodes (shared via Arc)
    storage: Arc<S>,

    /// Flat list of entries; `None` means not yet loaded from storage.
    entries: Arc<RwLock<Option<Vec<NodeEntry<S>>>>>,

    /// CID pointer to this node in storage.
    pointer: Arc<RwLock<IpldCid>>,

    /// Whether `pointer` is stale relative to `entries`.
    outdated_pointer: Arc<RwLock<bool>>,

    /// Layer hint for this node; `None` means unknown (computed on demand).
    layer: Option<usize>,
}

impl<S> Clone for Mst<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            entries: self.entries.clone(),
            pointer: self.pointer.clone(),
            outdated_pointer: self.outdated_pointer.clone(),
            layer: self.layer,
        }
    }
}

impl<S> std::fmt::Debug for Mst<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mst")
            .field("pointer", &*self.pointer.read().unwrap())
            .field("layer", &self.layer)
            .finish_non_exhaustive()
    }
}

impl<S: BlockStore> Mst<S> {
    /// Create an empty MST.
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            entries: Arc::new(RwLock::new(Some(Vec::new()))),
            pointer: Arc::new(RwLock::new(IpldCid::default())),
            outdated_pointer: Arc::new(RwLock::new(true)),
            layer: Some(0),
        }
    }

    /// Create an MST with existing entries.
    ///
    /// Computes the node CID up front; doesn't persist to storage.
    pub(crate) fn create(
        storage: Arc<S>,
        entries: Vec<NodeEntry<S>>,
        layer: Option<usize>,
    ) -> Result<Self> {
        let node_data = util::serialize_node_data(&entries)?;
        let cid = util::node_to_cid(&node_data)?;

        Ok(Self {
            storage,
            entries: Arc::new(RwLock::new(Some(entries))),
            pointer: Arc::new(RwLock::new(cid)),
            outdated_pointer: Arc::new(RwLock::new(false)),
            layer,
        })
    }

    /// Load an MST from a CID, lazily.
    ///
    /// Storage isn't touched until the entries are first needed.
    pub fn load(storage: Arc<S>, cid: IpldCid, layer: Option<usize>) -> Self {
        Self {
            storage,
            entries: Arc::new(RwLock::new(None)),
            pointer: Arc::new(RwLock::new(cid)),
            outdated_pointer: Arc::new(RwLock::new(false)),
            layer,
        }
    }

    /// New tree sharing this one's storage, with modified entries and a
    /// stale pointer.
    ///
    /// The pointer cell is fresh, not shared: recomputing the new tree's CID
    /// must not disturb the tree it was derived from.
    fn new_tree(&self, entries: Vec<NodeEntry<S>>) -> Result<Self> {
        Ok(Self {
            storage: self.storage.clone(),
            entries: Arc::new(RwLock::new(Some(entries))),
            pointer: Arc::new(RwLock::new(*self.pointer.read().unwrap())),
            outdated_pointer: Arc::new(RwLock::new(true)),
            layer: self.layer,
        })
    }

    /// Entries of this node, loading from storage on first access.
    fn get_entries(&self) -> Result<Vec<NodeEntry<S>>> {
        {
            let entries_guard = self.entries.read().unwrap();
            if let Some(ref entries) = *entries_guard {
                return Ok(entries.clone());
            }
        }

        let pointer = *self.pointer.read().unwrap();
        let node_bytes = self
            .storage
            .get(&pointer)?
            .ok_or_else(|| RepoError::not_found("MST node", &pointer))?;

        let node_data: super::node::NodeData =
            serde_ipld_dagcbor::from_slice(&node_bytes).map_err(RepoError::serialization)?;

        let entries = util::deserialize_node_data(self.storage.clone(), &node_data, self.layer)?;

        let mut entries_guard = self.entries.write().unwrap();
        *entries_guard = Some(entries.clone());

        Ok(entries)
    }

    /// CID pointer of this node, recomputed if entries changed.
    ///
    /// Doesn't persist anything; use [`Mst::collect_blocks`] or
    /// [`Mst::persist`] for that.
    pub fn get_pointer(&self) -> Result<IpldCid> {
        let outdated = *self.outdated_pointer.read().unwrap();
        if !outdated {
            return Ok(*self.pointer.read().unwrap());
        }

        let entries = self.get_entries()?;
        let node_data = util::serialize_node_data(&entries)?;
        let cid = util::node_to_cid(&node_data)?;

        *self.pointer.write().unwrap() = cid;
        *self.outdated_pointer.write().unwrap() = false;

        Ok(cid)
    }

    /// Root CID (alias for [`Mst::get_pointer`]).
    pub fn root(&self) -> Result<IpldCid> {
        self.get_pointer()
    }

    /// Shared reference to the block storage.
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// The layer of this node: the layer of any leaf key in it, or one above
    /// its first subtree.
    fn get_layer(&self) -> Result<usize> {
        if let Some(layer) = self.layer {
            return Ok(layer);
        }

        let entries = self.get_entries()?;

        for entry in &entries {
            if let NodeEntry::Leaf { key, .. } = entry {
                return Ok(util::key_depth(key.as_str()));
            }
        }

        for entry in &entries {
            if let NodeEntry::Tree(subtree) = entry {
                return Ok(subtree.get_layer()? + 1);
            }
        }

        Ok(0)
    }

    /// Index of the first leaf >= key; `entries.len()` if none.
    fn find_gt_or_equal_leaf_index_in(entries: &[NodeEntry<S>], key: &str) -> usize {
        for (i, entry) in entries.iter().enumerate() {
            if let NodeEntry::Leaf { key: leaf_key, .. } = entry {
                if leaf_key.as_str() >= key {
                    return i;
                }
            }
        }

        entries.len()
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Result<Option<IpldCid>> {
        util::validate_key(key)?;
        self.get_recurse(key)
    }

    fn get_recurse(&self, key: &str) -> Result<Option<IpldCid>> {
        let entries = self.get_entries()?;
        let index = Self::find_gt_or_equal_leaf_index_in(&entries, key);

        if index < entries.len() {
            if let NodeEntry::Leaf {
                key: leaf_key,
                value,
            } = &entries[index]
            {
                if leaf_key.as_str() == key {
                    return Ok(Some(*value));
                }
            }
        }

        // not at this level, try the subtree left of the insertion point
        if index > 0 {
            if let NodeEntry::Tree(subtree) = &entries[index - 1] {
                return subtree.get_recurse(key);
            }
        }

        Ok(None)
    }

    /// Add a key-value pair, returning the new tree.
    ///
    /// Adding an existing key replaces its value.
    pub fn add(&self, key: &str, cid: IpldCid) -> Result<Mst<S>> {
        util::validate_key(key)?;
        self.add_recurse(key, cid)
    }

    fn add_recurse(&self, key: &str, cid: IpldCid) -> Result<Mst<S>> {
        let key_layer = util::key_depth(key);
        let node_layer = self.get_layer()?;
        let entries = self.get_entries()?;

        if key_layer == node_layer {
            // key belongs at this layer
            let index = Self::find_gt_or_equal_leaf_index_in(&entries, key);

            if index < entries.len() {
                if let NodeEntry::Leaf { key: leaf_key, .. } = &entries[index] {
                    if leaf_key.as_str() == key {
                        let mut new_entries = entries.clone();
                        new_entries[index] = NodeEntry::Leaf {
                            key: SmolStr::new(key),
                            value: cid,
                        };
                        return self.new_tree(new_entries);
                    }
                }
            }

            if index > 0 {
                match &entries[index - 1] {
                    NodeEntry::Leaf { .. } => self.splice_in(
                        NodeEntry::Leaf {
                            key: SmolStr::new(key),
                            value: cid,
                        },
                        index,
                    ),
                    NodeEntry::Tree(subtree) => {
                        // the neighboring subtree straddles the key; split it
                        let (left, right) = subtree.split_around(key)?;
                        self.replace_with_split(
                            index - 1,
                            left,
                            NodeEntry::Leaf {
                                key: SmolStr::new(key),
                                value: cid,
                            },
                            right,
                        )
                    }
                }
            } else {
                self.splice_in(
                    NodeEntry::Leaf {
                        key: SmolStr::new(key),
                        value: cid,
                    },
                    index,
                )
            }
        } else if key_layer < node_layer {
            // key belongs below us
            let index = Self::find_gt_or_equal_leaf_index_in(&entries, key);

            if index > 0 {
                if let NodeEntry::Tree(prev_tree) = &entries[index - 1] {
                    let new_subtree = prev_tree.add_recurse(key, cid)?;
                    return self.update_entry(index - 1, NodeEntry::Tree(new_subtree));
                }
            }

            let child = self.create_child()?;
            let new_subtree = child.add_recurse(key, cid)?;
            self.splice_in(NodeEntry::Tree(new_subtree), index)
        } else {
            // key belongs above us; grow parent layers
            let extra_layers = key_layer - node_layer;

            let (mut left, mut right) = self.split_around(key)?;

            for _ in 1..extra_layers {
                if let Some(l) = left {
                    left = Some(l.create_parent()?);
                }
                if let Some(r) = right {
                    right = Some(r.create_parent()?);
                }
            }

            let mut new_entries = Vec::new();
            if let Some(l) = left {
                new_entries.push(NodeEntry::Tree(l));
            }
            new_entries.push(NodeEntry::Leaf {
                key: SmolStr::new(key),
                value: cid,
            });
            if let Some(r) = right {
                new_entries.push(NodeEntry::Tree(r));
            }

            Mst::create(self.storage.clone(), new_entries, Some(key_layer))
        }
    }

    /// Delete a key, returning the new tree.
    ///
    /// Deleting a key that isn't present is an error, not a no-op.
    pub fn delete(&self, key: &str) -> Result<Mst<S>> {
        util::validate_key(key)?;

        let altered = self.delete_recurse(key)?;
        altered.trim_top()
    }

    fn delete_recurse(&self, key: &str) -> Result<Mst<S>> {
        let entries = self.get_entries()?;
        let index = Self::find_gt_or_equal_leaf_index_in(&entries, key);

        if index < entries.len() {
            if let NodeEntry::Leaf { key: leaf_key, .. } = &entries[index] {
                if leaf_key.as_str() == key {
                    let prev = if index > 0 {
                        Some(&entries[index - 1])
                    } else {
                        None
                    };
                    let next = entries.get(index + 1);

                    // neighboring subtrees merge when their separator leaf goes
                    if let (Some(NodeEntry::Tree(prev_tree)), Some(NodeEntry::Tree(next_tree))) =
                        (prev, next)
                    {
                        let merged = prev_tree.append_merge(next_tree)?;

                        let mut new_entries = entries[..index - 1].to_vec();
                        new_entries.push(NodeEntry::Tree(merged));
                        new_entries.extend_from_slice(&entries[index + 2..]);

                        return self.new_tree(new_entries);
                    }

                    return self.remove_entry(index);
                }
            }
        }

        if index > 0 {
            if let NodeEntry::Tree(prev_tree) = &entries[index - 1] {
                let subtree = prev_tree.delete_recurse(key)?;
                let subtree_entries = subtree.get_entries()?;

                if subtree_entries.is_empty() {
                    return self.remove_entry(index - 1);
                } else {
                    return self.update_entry(index - 1, NodeEntry::Tree(subtree));
                }
            }
        }

        Err(RepoError::not_found("key", key))
    }

    /// Update an existing key, returning the new tree.
    ///
    /// Errors if the key doesn't exist.
    pub fn update(&self, key: &str, cid: IpldCid) -> Result<Mst<S>> {
        util::validate_key(key)?;

        if self.get(key)?.is_none() {
            return Err(RepoError::not_found("key", key));
        }

        self.add(key, cid)
    }

    fn update_entry(&self, index: usize, entry: NodeEntry<S>) -> Result<Mst<S>> {
        let mut entries = self.get_entries()?;
        entries[index] = entry;
        self.new_tree(entries)
    }

    fn remove_entry(&self, index: usize) -> Result<Mst<S>> {
        let mut entries = self.get_entries()?;
        entries.remove(index);
        self.new_tree(entries)
    }

    fn append(&self, entry: NodeEntry<S>) -> Result<Mst<S>> {
        let mut entries = self.get_entries()?;
        entries.push(entry);
        self.new_tree(entries)
    }

    fn prepend(&self, entry: NodeEntry<S>) -> Result<Mst<S>> {
        let mut entries = self.get_entries()?;
        entries.insert(0, entry);
        self.new_tree(entries)
    }

    fn splice_in(&self, entry: NodeEntry<S>, index: usize) -> Result<Mst<S>> {
        let mut entries = self.get_entries()?;
        entries.insert(index, entry);
        self.new_tree(entries)
    }

    /// Drop top nodes that hold nothing but a single subtree.
    fn trim_top(self) -> Result<Mst<S>> {
        let entries = self.get_entries()?;

        if entries.len() == 1 {
            if let NodeEntry::Tree(subtree) = &entries[0] {
                return subtree.clone().trim_top();
            }
        }

        Ok(self)
    }

    /// Split the tree around a key.
    ///
    /// Returns `(left, right)` where left holds all entries < key and right
    /// all entries >= key; either side is `None` when empty.
    fn split_around(&self, key: &str) -> Result<(Option<Mst<S>>, Option<Mst<S>>)> {
        let entries = self.get_entries()?;
        let index = Self::find_gt_or_equal_leaf_index_in(&entries, key);

        let left_data = entries[..index].to_vec();
        let right_data = entries[index..].to_vec();

        let mut left = self.new_tree(left_data.clone())?;
        let mut right = self.new_tree(right_data)?;

        // a trailing subtree on the left may itself straddle the key
        if let Some(NodeEntry::Tree(last_tree)) = left_data.last() {
            let left_len = left_data.len();
            left = left.remove_entry(left_len - 1)?;

            let (split_left, split_right) = last_tree.split_around(key)?;

            if let Some(sl) = split_left {
                left = left.append(NodeEntry::Tree(sl))?;
            }
            if let Some(sr) = split_right {
                right = right.prepend(NodeEntry::Tree(sr))?;
            }
        }

        let left_out = if left.get_entries()?.is_empty() {
            None
        } else {
            Some(left)
        };

        let right_out = if right.get_entries()?.is_empty() {
            None
        } else {
            Some(right)
        };

        Ok((left_out, right_out))
    }

    /// Merge two adjacent subtrees.
    ///
    /// All keys in `to_merge` must be greater than all keys in `self`.
    fn append_merge(&self, to_merge: &Mst<S>) -> Result<Mst<S>> {
        let self_layer = self.get_layer()?;
        let merge_layer = to_merge.get_layer()?;

        if self_layer != merge_layer {
            return Err(RepoError::invalid_mst(
                "Cannot merge MST nodes from different layers",
            ));
        }

        let mut self_entries = self.get_entries()?;
        let merge_entries = to_merge.get_entries()?;

        if let (Some(NodeEntry::Tree(left_tree)), Some(NodeEntry::Tree(right_tree))) =
            (self_entries.last(), merge_entries.first())
        {
            let merged = left_tree.append_merge(right_tree)?;

            let mut new_entries = self_entries[..self_entries.len() - 1].to_vec();
            new_entries.push(NodeEntry::Tree(merged));
            new_entries.extend_from_slice(&merge_entries[1..]);

            return self.new_tree(new_entries);
        }

        self_entries.extend(merge_entries);
        self.new_tree(self_entries)
    }

    /// Empty child tree one layer down.
    fn create_child(&self) -> Result<Mst<S>> {
        let layer = self.get_layer()?;
        Mst::create(
            self.storage.clone(),
            Vec::new(),
            Some(layer.saturating_sub(1)),
        )
    }

    /// Parent tree one layer up, containing only this node.
    fn create_parent(self) -> Result<Mst<S>> {
        let layer = self.get_layer()?;
        Mst::create(
            self.storage.clone(),
            vec![NodeEntry::Tree(self)],
            Some(layer + 1),
        )
    }

    /// Replace the entry at `index` with `[left?, leaf, right?]`.
    fn replace_with_split(
        &self,
        index: usize,
        left: Option<Mst<S>>,
        leaf: NodeEntry<S>,
        right: Option<Mst<S>>,
    ) -> Result<Mst<S>> {
        let entries = self.get_entries()?;

        let mut new_entries = entries[..index].to_vec();

        if let Some(l) = left {
            new_entries.push(NodeEntry::Tree(l));
        }
        new_entries.push(leaf);
        if let Some(r) = right {
            new_entries.push(NodeEntry::Tree(r));
        }

        new_entries.extend_from_slice(&entries[index + 1..]);

        self.new_tree(new_entries)
    }

    /// All leaf entries (key, CID) in lexicographic key order.
    pub fn leaves(&self) -> Result<Vec<(SmolStr, IpldCid)>> {
        let mut result = Vec::new();
        self.collect_leaves(&mut result)?;
        Ok(result)
    }

    fn collect_leaves(&self, result: &mut Vec<(SmolStr, IpldCid)>) -> Result<()> {
        let entries = self.get_entries()?;

        for entry in entries {
            match entry {
                NodeEntry::Tree(subtree) => {
                    subtree.collect_leaves(result)?;
                }
                NodeEntry::Leaf { key, value } => {
                    result.push((key, value));
                }
            }
        }

        Ok(())
    }

    /// Apply a batch of write operations in order, returning the new tree.
    ///
    /// - Create errors if the key already exists
    /// - Update errors if the key doesn't exist
    /// - Delete errors if the key doesn't exist
    pub fn batch(&self, ops: &[WriteOp]) -> Result<Mst<S>> {
        let mut tree = self.clone();

        for op in ops {
            tree = match op {
                WriteOp::Create { key, cid } => {
                    if tree.get(key.as_str())?.is_some() {
                        return Err(RepoError::invalid_mst(format!(
                            "Cannot create: key already exists: {}",
                            key
                        )));
                    }
                    tree.add(key.as_str(), *cid)?
                }

                WriteOp::Update { key, cid } => tree.update(key.as_str(), *cid)?,

                WriteOp::Delete { key } => tree.delete(key.as_str())?,
            };
        }

        Ok(tree)
    }

    /// Collect all blocks that need persisting.
    ///
    /// Walks the tree, serializing nodes not already in storage. Returns
    /// `(root_cid, blocks)`.
    pub fn collect_blocks(&self) -> Result<(IpldCid, BTreeMap<IpldCid, Bytes>)> {
        let mut blocks = BTreeMap::new();
        let pointer = self.get_pointer()?;

        if self.storage.has(&pointer)? {
            return Ok((pointer, blocks));
        }

        let entries = self.get_entries()?;
        let node_data = util::serialize_node_data(&entries)?;
        let cbor = serde_ipld_dagcbor::to_vec(&node_data).map_err(RepoError::serialization)?;
        blocks.insert(pointer, Bytes::from(cbor));

        for entry in &entries {
            if let NodeEntry::Tree(subtree) = entry {
                let (_, subtree_blocks) = subtree.collect_blocks()?;
                blocks.extend(subtree_blocks);
            }
        }

        Ok((pointer, blocks))
    }

    /// Persist all unstored node blocks, returning the root CID.
    pub fn persist(&self) -> Result<IpldCid> {
        let (root_cid, blocks) = self.collect_blocks()?;

        if !blocks.is_empty() {
            self.storage.put_many(blocks)?;
        }

        Ok(root_cid)
    }

    /// Serialized node blocks (walk order) and record CIDs for export.
    ///
    /// Unlike [`Mst::collect_blocks`], this re-serializes every node whether
    /// or not storage already has it, which is what a full archive needs.
    pub fn export_blocks(&self) -> Result<(Vec<(IpldCid, Bytes)>, Vec<IpldCid>)> {
        let mut nodes = Vec::new();
        let mut records = Vec::new();
        self.export_blocks_recurse(&mut nodes, &mut records)?;
        Ok((nodes, records))
    }

    fn export_blocks_recurse(
        &self,
        nodes: &mut Vec<(IpldCid, Bytes)>,
        records: &mut Vec<IpldCid>,
    ) -> Result<()> {
        let pointer = self.get_pointer()?;
        let entries = self.get_entries()?;
        let node_data = util::serialize_node_data(&entries)?;
        let cbor = serde_ipld_dagcbor::to_vec(&node_data).map_err(RepoError::serialization)?;
        nodes.push((pointer, Bytes::from(cbor)));

        for entry in &entries {
            match entry {
                NodeEntry::Tree(subtree) => {
                    subtree.export_blocks_recurse(nodes, records)?;
                }
                NodeEntry::Leaf { value, .. } => {
                    records.push(*value);
                }
            }
        }

        Ok(())
    }

    /// CIDs along the merkle path to a key.
    ///
    /// Always includes this node's pointer; includes the record CID when the
    /// key exists, and every intermediate node CID on the way down. Useful
    /// for existence and non-existence proofs.
    pub fn cids_for_path(&self, key: &str) -> Result<Vec<IpldCid>> {
        util::validate_key(key)?;
        self.cids_for_path_recurse(key)
    }

    fn cids_for_path_recurse(&self, key: &str) -> Result<Vec<IpldCid>> {
        let mut cids = vec![self.get_pointer()?];
        let entries = self.get_entries()?;
        let index = Self::find_gt_or_equal_leaf_index_in(&entries, key);

        if index < entries.len() {
            if let NodeEntry::Leaf {
                key: leaf_key,
                value,
            } = &entries[index]
            {
                if leaf_key.as_str() == key {
                    cids.push(*value);
                    return Ok(cids);
                }
            }
        }

        if index > 0 {
            if let NodeEntry::Tree(subtree) = &entries[index - 1] {
                let mut subtree_cids = subtree.cids_for_path_recurse(key)?;
                cids.append(&mut subtree_cids);
                return Ok(cids);
            }
        }

        Ok(cids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryBlockStore;
    use twill_common::types::cid::{DAG_CBOR, SHA2_256};

    fn test_cid(n: u8) -> IpldCid {
        let data = vec![n; 32];
        let mh = multihash::Multihash::wrap(SHA2_256, &data).unwrap();
        IpldCid::new_v1(DAG_CBOR, mh)
    }

    fn empty_mst() -> Mst<MemoryBlockStore> {
        Mst::new(Arc::new(MemoryBlockStore::new()))
    }

    #[test]
    fn empty_tree() {
        let mst = empty_mst();
        assert_eq!(mst.leaves().unwrap().len(), 0);
        assert_eq!(mst.get("test/key").unwrap(), None);
    }

    #[test]
    fn add_get_replace() {
        let mst = empty_mst();
        let mst = mst.add("com.example.record/a", test_cid(1)).unwrap();

        assert_eq!(mst.get("com.example.record/a").unwrap(), Some(test_cid(1)));

        // adding the same key replaces the value
        let mst = mst.add("com.example.record/a", test_cid(2)).unwrap();
        assert_eq!(mst.get("com.example.record/a").unwrap(), Some(test_cid(2)));
        assert_eq!(mst.leaves().unwrap().len(), 1);
    }

    #[test]
    fn immutable_operations() {
        let mst = empty_mst();
        let v2 = mst.add("com.example.record/a", test_cid(1)).unwrap();

        assert_eq!(mst.get("com.example.record/a").unwrap(), None);
        assert_eq!(v2.get("com.example.record/a").unwrap(), Some(test_cid(1)));
    }

    #[test]
    fn leaves_sorted() {
        let mut mst = empty_mst();
        let keys = [
            "app.bsky.feed.post/3jwd",
            "app.bsky.feed.like/3aaa",
            "app.bsky.graph.follow/9zzz",
            "app.bsky.feed.post/1abc",
        ];
        for (i, key) in keys.iter().enumerate() {
            mst = mst.add(key, test_cid(i as u8)).unwrap();
        }

        let leaves = mst.leaves().unwrap();
        assert_eq!(leaves.len(), 4);
        for pair in leaves.windows(2) {
            assert!(pair[0].0 < pair[1].0);
        }
    }

    #[test]
    fn delete_missing_is_error() {
        let mst = empty_mst().add("com.example.record/a", test_cid(1)).unwrap();
        assert!(mst.delete("com.example.record/b").is_err());
    }

    #[test]
    fn delete_removes() {
        let mst = empty_mst();
        let mst = mst.add("com.example.record/a", test_cid(1)).unwrap();
        let mst = mst.add("com.example.record/b", test_cid(2)).unwrap();

        let mst = mst.delete("com.example.record/a").unwrap();
        assert_eq!(mst.get("com.example.record/a").unwrap(), None);
        assert_eq!(mst.get("com.example.record/b").unwrap(), Some(test_cid(2)));
        assert_eq!(mst.leaves().unwrap().len(), 1);
    }

    #[test]
    fn update_requires_existing() {
        let mst = empty_mst();
        assert!(mst.update("com.example.record/a", test_cid(1)).is_err());

        let mst = mst.add("com.example.record/a", test_cid(1)).unwrap();
        let mst = mst.update("com.example.record/a", test_cid(9)).unwrap();
        assert_eq!(mst.get("com.example.record/a").unwrap(), Some(test_cid(9)));
    }

    #[test]
    fn insertion_order_independent() {
        let keys: Vec<String> = (0..24).map(|i| format!("com.example.record/{i:02}")).collect();

        let mut forward = empty_mst();
        for (i, key) in keys.iter().enumerate() {
            forward = forward.add(key, test_cid(i as u8)).unwrap();
        }

        let mut backward = empty_mst();
        for (i, key) in keys.iter().enumerate().rev() {
            backward = backward.add(key, test_cid(i as u8)).unwrap();
        }

        assert_eq!(
            forward.get_pointer().unwrap(),
            backward.get_pointer().unwrap()
        );
    }

    #[test]
    fn persist_and_reload() {
        let storage = Arc::new(MemoryBlockStore::new());
        let mut mst = Mst::new(storage.clone());
        for i in 0..16u8 {
            mst = mst
                .add(&format!("com.example.record/{i:02}"), test_cid(i))
                .unwrap();
        }

        let root = mst.persist().unwrap();

        let reloaded = Mst::load(storage, root, None);
        let leaves = reloaded.leaves().unwrap();
        assert_eq!(leaves.len(), 16);
        assert_eq!(
            reloaded.get("com.example.record/07").unwrap(),
            Some(test_cid(7))
        );
        assert_eq!(reloaded.get_pointer().unwrap(), root);
    }

    #[test]
    fn batch_ops() {
        let mst = empty_mst();
        let mst = mst
            .batch(&[
                WriteOp::Create {
                    key: SmolStr::new("com.example.record/a"),
                    cid: test_cid(1),
                },
                WriteOp::Create {
                    key: SmolStr::new("com.example.record/b"),
                    cid: test_cid(2),
                },
                WriteOp::Update {
                    key: SmolStr::new("com.example.record/a"),
                    cid: test_cid(3),
                },
                WriteOp::Delete {
                    key: SmolStr::new("com.example.record/b"),
                },
            ])
            .unwrap();

        assert_eq!(mst.get("com.example.record/a").unwrap(), Some(test_cid(3)));
        assert_eq!(mst.get("com.example.record/b").unwrap(), None);

        // create of an existing key fails
        assert!(
            mst.batch(&[WriteOp::Create {
                key: SmolStr::new("com.example.record/a"),
                cid: test_cid(4),
            }])
            .is_err()
        );
    }

    #[test]
    fn cids_for_path_includes_root_and_record() {
        let mst = empty_mst().add("com.example.record/a", test_cid(1)).unwrap();
        let cids = mst.cids_for_path("com.example.record/a").unwrap();
        assert_eq!(cids.first(), Some(&mst.get_pointer().unwrap()));
        assert_eq!(cids.last(), Some(&test_cid(1)));
    }
}
