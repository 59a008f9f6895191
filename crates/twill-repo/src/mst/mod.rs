//! Merkle Search Tree
//!
//! A deterministic, content-addressed ordered map: the on-disk form of an
//! AT Protocol repository's records.

pub mod node;
pub mod tree;
pub mod util;

pub use node::{NodeData, NodeEntry, TreeEntry};
pub use tree::{Mst, WriteOp};
pub use util::key_depth;
