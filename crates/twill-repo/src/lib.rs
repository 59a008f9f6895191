//! AT Protocol repository primitives
//!
//! This crate provides building blocks for working with AT Protocol
//! repositories:
//!
//! - **MST (Merkle Search Tree)**: Immutable tree operations with
//!   deterministic structure
//! - **Commits**: Signed commit structures (version 3) with pluggable
//!   signing and verification
//! - **CAR codec**: Encode and decode repositories in CAR (Content
//!   Addressable aRchive) form
//! - **Storage**: Pluggable block storage abstraction with an in-memory
//!   implementation
//!
//! # Design Philosophy
//!
//! - Everything is synchronous and pull-based; no task owns a thread
//! - Immutable MST operations for referential transparency
//! - Storage is a value-level capability, shared by `Arc`
//!
//! # Example
//!
//! ```rust,ignore
//! use twill_repo::{Mst, MemoryBlockStore};
//! use std::sync::Arc;
//!
//! let storage = Arc::new(MemoryBlockStore::new());
//! let mst = Mst::new(storage);
//!
//! let mst = mst.add("app.bsky.feed.post/abc123", cid)?;
//! if let Some(value) = mst.get("app.bsky.feed.post/abc123")? {
//!     println!("found: {}", value);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

/// CAR (Content Addressable aRchive) codec
pub mod car;
/// Commit structures and signature plumbing
pub mod commit;
pub mod error;
/// Merkle Search Tree implementation
pub mod mst;
/// Block storage abstraction
pub mod storage;

pub use car::{ParsedCar, decode_car, encode_car};
pub use commit::{Commit, SigningKey};
pub use error::{RepoError, RepoErrorKind, Result};
pub use mst::{Mst, WriteOp};
pub use storage::{BlockStore, MemoryBlockStore};
