//! Baseline AT Protocol data types.

pub mod aturi;
pub mod blob;
pub mod cid;
pub mod crypto;
pub mod did;
pub mod did_doc;
pub mod handle;
pub mod ident;
pub mod nsid;
pub mod record;
pub mod recordkey;
pub mod tid;

pub use aturi::AtUri;
pub use blob::{Blob, BlobRef, MimeType};
pub use cid::{Cid, CidLink};
pub use crypto::PublicKey;
pub use did::{Did, DidMethod};
pub use did_doc::DidDocument;
pub use handle::Handle;
pub use ident::AtIdentifier;
pub use nsid::Nsid;
pub use record::Record;
pub use recordkey::Rkey;
pub use tid::Tid;
