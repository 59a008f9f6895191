//! Minimal JOSE plumbing: JWS headers, JWT claims, and compact ES256
//! signing.

pub mod jws;
pub mod jwt;
mod signing;

pub use signing::create_signed_jwt;

use serde::{Deserialize, Serialize};

/// A JOSE header. Only JWS headers exist here; JWE is out of scope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Header<'a> {
    /// Signed-token header
    #[serde(borrow)]
    Jws(jws::Header<'a>),
}
