//! End-to-end repository tests: MST laws, CAR round-trips, commit chains.

use bytes::Bytes;
use cid::Cid as IpldCid;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::Arc;
use twill_common::types::did::Did;
use twill_common::types::tid::Tid;
use twill_repo::commit::{Commit, SigningKey, compare_revs};
use twill_repo::{BlockStore, MemoryBlockStore, Mst, decode_car, encode_car};
use twill_common::types::crypto::{KeyCodec, PublicKey};

fn record_cid(n: u32) -> IpldCid {
    use sha2::{Digest, Sha256};
    use twill_common::types::cid::{DAG_CBOR, SHA2_256};
    let hash = Sha256::digest(n.to_be_bytes());
    let mh = multihash::Multihash::wrap(SHA2_256, &hash).unwrap();
    IpldCid::new_v1(DAG_CBOR, mh)
}

#[test]
fn mst_stays_sorted_under_random_churn() {
    let mut rng = StdRng::seed_from_u64(0x7311);
    let mut mst = Mst::new(Arc::new(MemoryBlockStore::new()));
    let mut model: BTreeMap<String, IpldCid> = BTreeMap::new();

    for round in 0..400u32 {
        let key = format!("app.bsky.feed.post/{:04}", rng.gen_range(0..120));
        if rng.gen_bool(0.7) || !model.contains_key(&key) {
            let value = record_cid(round);
            mst = mst.add(&key, value).unwrap();
            model.insert(key, value);
        } else {
            mst = mst.delete(&key).unwrap();
            model.remove(&key);
        }
    }

    let leaves = mst.leaves().unwrap();
    // strictly ascending, no duplicates
    for pair in leaves.windows(2) {
        assert!(pair[0].0 < pair[1].0, "{} !< {}", pair[0].0, pair[1].0);
    }
    // agrees with a model map exactly
    assert_eq!(leaves.len(), model.len());
    for (key, value) in &model {
        assert_eq!(mst.get(key).unwrap().as_ref(), Some(value));
    }
}

#[test]
fn mst_root_is_history_independent() {
    let mut rng = StdRng::seed_from_u64(0xbead);
    let keys: Vec<String> = (0..60).map(|i| format!("com.example.item/{i:03}")).collect();

    let mut shuffled = keys.clone();
    for i in (1..shuffled.len()).rev() {
        shuffled.swap(i, rng.gen_range(0..=i));
    }

    let mut a = Mst::new(Arc::new(MemoryBlockStore::new()));
    for key in &keys {
        a = a.add(key, record_cid(1)).unwrap();
    }

    // different insertion order, plus some churn that cancels out
    let mut b = Mst::new(Arc::new(MemoryBlockStore::new()));
    for key in &shuffled {
        b = b.add(key, record_cid(2)).unwrap();
    }
    for key in &shuffled {
        b = b.add(key, record_cid(1)).unwrap();
    }

    assert_eq!(a.root().unwrap(), b.root().unwrap());
}

#[test]
fn car_roundtrip_known_vector() {
    let root = IpldCid::try_from("bafyreie5cvv4h45feadgeuwhbcutmh6t2ceseocckahdoe6uat64zmz454")
        .expect("vector CID parses");
    let block = Bytes::from_static(&[1, 2, 3]);

    let bytes = encode_car(&[root], vec![(root, block.clone())]).unwrap();
    let parsed = decode_car(&bytes).unwrap();

    assert_eq!(parsed.roots, vec![root]);
    assert_eq!(parsed.get_block(&root), Some(&block));

    // encoding the decoded structure reproduces the bytes
    let again = encode_car(&parsed.roots, parsed.blocks.clone()).unwrap();
    assert_eq!(again, bytes);
}

#[test]
fn full_repo_cycle() {
    let storage = Arc::new(MemoryBlockStore::new());
    let mut mst = Mst::new(storage.clone());

    // records into storage and the tree
    let mut record_cids = Vec::new();
    for i in 0..8u8 {
        let cid = storage.put(format!("record body {i}").as_bytes()).unwrap();
        mst = mst
            .add(&format!("app.bsky.feed.post/{i:02}"), cid)
            .unwrap();
        record_cids.push(cid);
    }
    let data_root = mst.persist().unwrap();

    // signed commit over the tree root
    let key = p256::ecdsa::SigningKey::from_slice(&[11u8; 32]).unwrap();
    let commit = Commit::new_unsigned(Did::raw("did:plc:44ybard66vv44zksje25o7dz"), data_root)
        .with_rev(Tid::from_parts(1_700_000_000_000_000, 1))
        .sign(&key)
        .unwrap();
    let commit_bytes = commit.to_cbor().unwrap();
    let commit_cid = storage.put(&commit_bytes).unwrap();

    // export, then rebuild everything from the archive alone
    let car = twill_repo::car::encode_repo_car(commit_cid, &mst).unwrap();
    let parsed = decode_car(&car).unwrap();
    assert_eq!(parsed.root(), Some(&commit_cid));

    let decoded_bytes = parsed.get_block(&commit_cid).unwrap();
    let decoded = Commit::from_cbor(decoded_bytes).unwrap();
    decoded.validate().unwrap();
    assert_eq!(decoded.data, data_root);

    let pubkey = PublicKey::from_bytes(KeyCodec::P256, SigningKey::public_key(&key)).unwrap();
    decoded.verify(&pubkey).unwrap();

    let fresh = Arc::new(MemoryBlockStore::new());
    fresh.put_many(parsed.blocks.clone()).unwrap();
    let reloaded = Mst::load(fresh, decoded.data, None);
    for (i, cid) in record_cids.iter().enumerate() {
        assert_eq!(
            reloaded.get(&format!("app.bsky.feed.post/{i:02}")).unwrap(),
            Some(*cid)
        );
    }
}

#[test]
fn commit_chain_revs_increase() {
    let did = Did::raw("did:plc:44ybard66vv44zksje25o7dz");
    let key = p256::ecdsa::SigningKey::from_slice(&[5u8; 32]).unwrap();

    let mut prev_cid = None;
    let mut prev_rev: Option<Tid> = None;
    for i in 0..5u64 {
        let commit = match prev_cid {
            None => Commit::new_unsigned(did.clone(), record_cid(0)),
            Some(prev) => Commit::new_next(did.clone(), record_cid(i as u32), prev),
        }
        .with_rev(Tid::from_parts(1_700_000_000_000_000 + i, 0))
        .sign(&key)
        .unwrap();

        if let Some(prev_rev) = &prev_rev {
            assert_eq!(
                compare_revs(prev_rev, &commit.rev),
                std::cmp::Ordering::Less
            );
        }
        assert_eq!(commit.prev, prev_cid);

        prev_cid = Some(commit.to_cid().unwrap());
        prev_rev = Some(commit.rev.clone());
    }
}
