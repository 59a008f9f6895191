use miette::Diagnostic;
use thiserror::Error;

/// Errors from building and verifying DPoP proofs.
#[derive(Debug, Error, Diagnostic)]
pub enum DpopError {
    /// Token is not three dot-separated base64url segments
    #[error("invalid JWT format")]
    #[diagnostic(code(twill_oauth::jwt_format))]
    InvalidJwtFormat,

    /// Header `typ` is not `dpop+jwt`
    #[error("invalid typ: expected dpop+jwt")]
    #[diagnostic(code(twill_oauth::typ))]
    InvalidTyp,

    /// Header carries no embedded JWK
    #[error("proof header is missing its JWK")]
    #[diagnostic(code(twill_oauth::missing_jwk))]
    MissingJwk,

    /// Embedded JWK is malformed or not an EC P-256 key
    #[error("invalid JWK")]
    #[diagnostic(
        code(twill_oauth::jwk),
        help("DPoP proofs for atproto use EC P-256 keys (ES256)")
    )]
    InvalidJwk,

    /// Key is not one we can sign with
    #[error("key does not match any supported algorithm")]
    #[diagnostic(code(twill_oauth::unsupported_key))]
    UnsupportedKey,

    /// Signature did not verify against the embedded key
    #[error("invalid signature")]
    #[diagnostic(code(twill_oauth::signature))]
    InvalidSignature,

    /// `htm` claim does not match the request method
    #[error("htm mismatch: proof is for {actual}, request is {expected}")]
    #[diagnostic(code(twill_oauth::htm))]
    HtmMismatch {
        /// Method the verifier expected
        expected: String,
        /// Method the proof claims
        actual: String,
    },

    /// `htu` claim does not match the request URL
    #[error("htu mismatch: proof is for {actual}, request is {expected}")]
    #[diagnostic(code(twill_oauth::htu))]
    HtuMismatch {
        /// URL the verifier expected
        expected: String,
        /// URL the proof claims
        actual: String,
    },

    /// `iat` is missing or outside the acceptance window
    #[error("invalid timestamp")]
    #[diagnostic(
        code(twill_oauth::timestamp),
        help("iat must be within 60 seconds of the verifier's clock")
    )]
    InvalidTimestamp,

    /// `jti` is missing or empty
    #[error("missing jti")]
    #[diagnostic(code(twill_oauth::jti))]
    MissingJti,

    /// Verifier expected an `ath` claim and found none
    #[error("missing ath")]
    #[diagnostic(code(twill_oauth::missing_ath))]
    MissingAth,

    /// `ath` does not match the presented access token
    #[error("invalid ath")]
    #[diagnostic(code(twill_oauth::ath))]
    InvalidAth,

    /// JSON encoding or decoding failed
    #[error(transparent)]
    #[diagnostic(code(twill_oauth::serde))]
    Serde(#[from] serde_json::Error),
}

/// Result alias for DPoP operations.
pub type Result<T> = core::result::Result<T, DpopError>;
