//! DPoP proofs and the JOSE plumbing underneath them, for the AT Protocol
//! OAuth profile. Transport, discovery, and session orchestration live
//! elsewhere; this crate only mints and checks credentials.

pub mod dpop;
pub mod error;
pub mod jose;
pub mod pkce;

/// The signing algorithm every atproto authorization server must accept.
pub const FALLBACK_ALG: &str = "ES256";

pub use dpop::{build_proof, calculate_jkt, extract_jkt, verify_proof};
pub use error::DpopError;
