//! MST utility functions

use super::node::{NodeData, NodeEntry, TreeEntry};
use crate::error::{MstError, Result};
use crate::storage::BlockStore;
use bytes::Bytes;
use cid::Cid as IpldCid;
use sha2::{Digest, Sha256};
use twill_common::types::cid::{DAG_CBOR, SHA2_256};

/// Compute a CID from raw bytes.
///
/// SHA-256 multihash, DAG-CBOR codec. Assumes the data is already DAG-CBOR
/// encoded.
pub fn compute_cid(data: &[u8]) -> Result<IpldCid> {
    let digest = Sha256::digest(data);
    let mh = multihash::Multihash::<64>::wrap(SHA2_256, digest.as_slice())
        .map_err(|e| MstError::InvalidNode(e.to_string()))?;
    Ok(IpldCid::new_v1(DAG_CBOR, mh))
}

/// Serialize a node to DAG-CBOR and compute its CID.
pub fn node_to_cid(node: &NodeData) -> Result<IpldCid> {
    let cbor =
        serde_ipld_dagcbor::to_vec(node).map_err(|e| MstError::Serialization(Box::new(e)))?;
    compute_cid(&cbor)
}

/// Calculate the depth (layer) a key lives at.
///
/// depth = floor(leading_zero_bits(SHA-256(key)) / 2), counting 2-bit chunks
/// of zeros for a fanout of ~4. More leading zeros = higher layer.
pub fn key_depth(key: &str) -> usize {
    let hash = Sha256::digest(key.as_bytes());
    leading_zeros(&hash) / 2
}

/// Count leading zero bits across the digest.
fn leading_zeros(hash: &[u8]) -> usize {
    let mut count = 0;
    for byte in hash {
        if *byte == 0 {
            count += 8;
        } else {
            count += byte.leading_zeros() as usize;
            break;
        }
    }
    count
}

/// Validate MST key format.
///
/// Keys must be non-empty, at most 256 bytes, and match `[a-zA-Z0-9._:~/-]+`.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(MstError::EmptyKey.into());
    }

    if key.len() > 256 {
        return Err(MstError::KeyTooLong {
            len: key.len(),
            max: 256,
        }
        .into());
    }

    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '~' | '-' | '/'))
    {
        return Err(MstError::InvalidKeyChars {
            key: key.to_string(),
        }
        .into());
    }

    Ok(())
}

/// Count the shared prefix length of two strings.
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count()
}

/// Serialize flat entries to the wire format (with prefix compression).
///
/// - first `Tree` entry → `left` pointer
/// - each `Leaf` → an entry with prefix compression
/// - `Tree` after a `Leaf` → that leaf's `tree` pointer
pub fn serialize_node_data<S: BlockStore>(entries: &[NodeEntry<S>]) -> Result<NodeData> {
    let mut data = NodeData {
        left: None,
        entries: Vec::new(),
    };

    let mut i = 0;

    if let Some(NodeEntry::Tree(tree)) = entries.first() {
        data.left = Some(tree.get_pointer()?);
        i += 1;
    }

    let mut last_key = String::new();
    while i < entries.len() {
        let entry = &entries[i];

        if let NodeEntry::Leaf { key, value } = entry {
            i += 1;

            let prefix_len = common_prefix_len(&last_key, key.as_str());
            let key_suffix = &key.as_str()[prefix_len..];

            // a Tree following this Leaf hangs off its `t` pointer
            let tree_ptr = if let Some(NodeEntry::Tree(tree)) = entries.get(i) {
                i += 1;
                Some(tree.get_pointer()?)
            } else {
                None
            };

            data.entries.push(TreeEntry {
                prefix_len: prefix_len.try_into().map_err(|_| {
                    MstError::InvalidNode(format!("Prefix length {} exceeds u8::MAX", prefix_len))
                })?,
                key_suffix: Bytes::copy_from_slice(key_suffix.as_bytes()),
                value: *value,
                tree: tree_ptr,
            });

            last_key = key.as_str().to_string();
        } else {
            return Err(MstError::InvalidNode("Two Trees adjacent in flat entries".into()).into());
        }
    }

    Ok(data)
}

/// Deserialize the wire format into flat entries.
pub fn deserialize_node_data<S: BlockStore>(
    storage: std::sync::Arc<S>,
    data: &NodeData,
    layer: Option<usize>,
) -> Result<Vec<NodeEntry<S>>> {
    use crate::mst::Mst;

    let mut entries = Vec::new();
    let child_layer = layer.map(|l| l.saturating_sub(1));

    if let Some(left_cid) = data.left {
        entries.push(NodeEntry::Tree(Mst::load(
            storage.clone(),
            left_cid,
            child_layer,
        )));
    }

    let mut last_key = String::new();
    for entry in &data.entries {
        let key_str = std::str::from_utf8(&entry.key_suffix)
            .map_err(|e| MstError::InvalidNode(format!("Invalid UTF-8 in key suffix: {}", e)))?;
        let prefix_len = entry.prefix_len as usize;
        if prefix_len > last_key.len() {
            return Err(MstError::InvalidNode(format!(
                "Prefix length {} exceeds previous key length {}",
                prefix_len,
                last_key.len()
            ))
            .into());
        }
        let full_key = format!("{}{}", &last_key[..prefix_len], key_str);

        entries.push(NodeEntry::Leaf {
            key: smol_str::SmolStr::new(&full_key),
            value: entry.value,
        });

        last_key = full_key;

        if let Some(tree_cid) = entry.tree {
            entries.push(NodeEntry::Tree(Mst::load(
                storage.clone(),
                tree_cid,
                child_layer,
            )));
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_key_valid() {
        assert!(validate_key("app.bsky.feed.post/abc123").is_ok());
        assert!(validate_key("foo.bar/test-key_2024").is_ok());
        assert!(validate_key("a").is_ok());
    }

    #[test]
    fn validate_key_empty() {
        assert!(validate_key("").is_err());
    }

    #[test]
    fn validate_key_too_long() {
        let long_key = "a".repeat(257);
        assert!(validate_key(&long_key).is_err());
    }

    #[test]
    fn validate_key_invalid_chars() {
        assert!(validate_key("key with spaces").is_err());
        assert!(validate_key("key@invalid").is_err());
        assert!(validate_key("key#hash").is_err());
    }

    #[test]
    fn common_prefix() {
        assert_eq!(common_prefix_len("hello", "help"), 3);
        assert_eq!(common_prefix_len("abc", "abc"), 3);
        assert_eq!(common_prefix_len("abc", "def"), 0);
        assert_eq!(common_prefix_len("", "test"), 0);
    }

    #[test]
    fn key_depth_is_stable() {
        let depth = key_depth("app.bsky.feed.post/test");
        assert!(depth < 128);

        let again = key_depth("app.bsky.feed.post/test");
        assert_eq!(depth, again);
    }

    #[test]
    fn leading_zero_counting() {
        assert_eq!(leading_zeros(&[0, 0, 0, 1]), 31);
        assert_eq!(leading_zeros(&[0xFF, 0, 0]), 0);
        assert_eq!(leading_zeros(&[0, 0x80]), 8);
        assert_eq!(leading_zeros(&[0, 0x01]), 15);
    }
}
