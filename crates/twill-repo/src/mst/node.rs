//! MST node data structures

use std::fmt;

use bytes::Bytes;
use cid::Cid as IpldCid;
use smol_str::SmolStr;

use crate::mst::Mst;

/// Entry in an MST node: either a subtree or a leaf.
///
/// This is the in-memory representation used for tree operations. The tree
/// works on flat `Vec<NodeEntry>` values where entries interleave:
/// `[Tree, Leaf, Tree, Leaf, Leaf, Tree]` and so on.
///
/// The wire format (CBOR) is different; see [`NodeData`] and [`TreeEntry`].
#[derive(Clone)]
pub enum NodeEntry<S> {
    /// Subtree reference, loaded lazily from storage when needed.
    Tree(Mst<S>),

    /// Leaf node with a key-value pair.
    Leaf {
        /// Full key (not prefix-compressed in memory)
        key: SmolStr,
        /// CID of the record value
        value: IpldCid,
    },
}

impl<S> fmt::Debug for NodeEntry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeEntry::Tree(t) => write!(f, "{:?}", t),
            NodeEntry::Leaf { key, value } => {
                write!(f, "Leaf {{ key: {}, value: {} }}", key, value)
            }
        }
    }
}

impl<S> NodeEntry<S> {
    /// Check if this is a tree entry
    pub fn is_tree(&self) -> bool {
        matches!(self, NodeEntry::Tree(_))
    }

    /// Check if this is a leaf entry
    pub fn is_leaf(&self) -> bool {
        matches!(self, NodeEntry::Leaf { .. })
    }

    /// Get the key if this is a leaf
    pub fn leaf_key(&self) -> Option<&str> {
        match self {
            NodeEntry::Leaf { key, .. } => Some(key.as_str()),
            NodeEntry::Tree(_) => None,
        }
    }
}

// Wire format structures (DAG-CBOR serialization). These carry the on-disk
// prefix compression; conversion to and from the flat in-memory form lives
// in util.rs.

/// Wire format entry: a prefix-compressed leaf with an optional subtree
/// pointer.
///
/// Fields are declared in the canonical order (k, p, t, v); the serializer
/// writes struct fields in declaration order and peers hash these bytes.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TreeEntry {
    /// Key suffix after the shared prefix.
    ///
    /// Must serialize as a CBOR byte string (major type 2), not an array of
    /// integers, hence the serde_bytes bridge.
    #[serde(rename = "k", with = "crate::commit::serde_bytes_helper")]
    pub key_suffix: Bytes,

    /// Length of the prefix shared with the previous key in this node.
    ///
    /// u8 to match the CBOR encoding in peer implementations.
    #[serde(rename = "p")]
    pub prefix_len: u8,

    /// Optional subtree pointer (CID of the child node).
    ///
    /// Serializes as an explicit `null` when None; skipping the field would
    /// change the node bytes and therefore every CID above it.
    #[serde(rename = "t")]
    pub tree: Option<IpldCid>,

    /// CID of the record value.
    #[serde(rename = "v")]
    pub value: IpldCid,
}

/// Wire format node (serialized as DAG-CBOR).
///
/// # Conversion rules
///
/// Serialization (flat → wire):
/// - first entry if `Tree` → becomes the `left` pointer
/// - each `Leaf` → an entry in `entries`
/// - `Tree` after a `Leaf` → that leaf's `tree` pointer
///
/// Deserialization is the inverse.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NodeData {
    /// Left-most subtree pointer. Explicit `null` when absent.
    #[serde(rename = "l")]
    pub left: Option<IpldCid>,

    /// Entries in this node (sorted by full key, prefix-compressed).
    #[serde(rename = "e")]
    pub entries: Vec<TreeEntry>,
}
