//! Core data types for the twill implementation of atproto
//!
//! Everything here is a plain value: identifiers parse into validated,
//! cheaply-cloneable wrappers, and nothing owns a task, a socket, or a file.

#![warn(missing_docs)]
pub use cowstr::CowStr;
pub use into_static::IntoStatic;
pub use smol_str;
pub use url;

/// A copy-on-write immutable string type that uses [`smol_str::SmolStr`] for
/// the "owned" variant.
pub mod cowstr;
/// Trait for taking ownership of most borrowed types in twill.
pub mod into_static;

pub mod error;
/// Baseline fundamental AT Protocol data types.
pub mod types;
/// Unsigned LEB128 varints (the IPFS unsigned-varint flavor).
pub mod varint;
