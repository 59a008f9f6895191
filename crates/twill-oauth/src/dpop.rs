//! DPoP proof construction and verification (RFC 9449).
//!
//! A proof is an ES256 compact JWS whose header embeds the public half of
//! the proving key and whose claims bind the proof to one HTTP request:
//! `htm` (method), `htu` (url), a fresh `jti`, `iat`, an optional
//! server-issued `nonce`, and — when presented alongside an access token —
//! `ath`, the token's SHA-256 thumbprint.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use jose_jwa::{Algorithm, Signing};
use jose_jwk::{Jwk, Key, crypto};
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::RngCore;
use sha2::{Digest, Sha256};
use twill_common::CowStr;

use crate::error::{DpopError, Result};
use crate::jose::{
    create_signed_jwt,
    jws::{self, RegisteredHeader},
    jwt::{Claims, PublicClaims, RegisteredClaims},
};

/// The `typ` every DPoP proof carries.
pub const JWT_HEADER_TYP_DPOP: &str = "dpop+jwt";

/// Acceptance window for `iat`, in seconds, in both directions.
pub const IAT_TOLERANCE_SECS: i64 = 60;

/// Fresh random token id: 16 bytes, base64url.
pub(crate) fn generate_jti() -> CowStr<'static> {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes).into()
}

/// base64url SHA-256 of an access token, the `ath` claim value.
pub fn access_token_hash(token: &str) -> CowStr<'static> {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes())).into()
}

/// The P-256 public key behind a JWK, whether it holds the secret or only
/// the public half.
fn p256_public(key: &Key) -> Result<p256::PublicKey> {
    match crypto::Key::try_from(key).map_err(|_| DpopError::InvalidJwk)? {
        crypto::Key::P256(crypto::Kind::Public(pk)) => Ok(pk),
        crypto::Key::P256(crypto::Kind::Secret(sk)) => Ok(sk.public_key()),
        _ => Err(DpopError::InvalidJwk),
    }
}

/// Build a DPoP proof for one HTTP request.
///
/// `nonce` echoes a server-issued nonce; `access_token` binds the proof to
/// a token by adding the `ath` claim.
pub fn build_proof(
    key: &Key,
    method: &str,
    url: &str,
    nonce: Option<&str>,
    access_token: Option<&str>,
) -> Result<CowStr<'static>> {
    let secret = match crypto::Key::try_from(key).map_err(|_| DpopError::UnsupportedKey)? {
        crypto::Key::P256(crypto::Kind::Secret(sk)) => sk,
        _ => return Err(DpopError::UnsupportedKey),
    };

    let mut header = RegisteredHeader::from(Algorithm::Signing(Signing::Es256));
    header.typ = Some(JWT_HEADER_TYP_DPOP.into());
    header.jwk = Some(Jwk {
        key: Key::from(&crypto::Key::from(secret.public_key())),
        prm: Default::default(),
    });

    let claims = Claims {
        registered: RegisteredClaims {
            jti: Some(generate_jti()),
            iat: Some(Utc::now().timestamp()),
            ..Default::default()
        },
        public: PublicClaims {
            htm: Some(CowStr::Borrowed(method)),
            htu: Some(CowStr::Borrowed(url)),
            ath: access_token.map(access_token_hash),
            nonce: nonce.map(|n| CowStr::Borrowed(n)),
        },
    };

    Ok(create_signed_jwt(
        SigningKey::from(secret.clone()),
        header.into(),
        claims,
    )?)
}

/// Verify a DPoP proof against the request it claims to cover.
///
/// Checks, in order: compact JWS shape, `typ`, the embedded JWK, the ES256
/// signature, `htm`, `htu`, `iat` within the tolerance window, a non-empty
/// `jti`, and — when `access_token` is supplied — the `ath` binding.
///
/// Returns the embedded public JWK so the caller can match it against a
/// token's `jkt` confirmation.
pub fn verify_proof(
    proof: &str,
    method: &str,
    url: &str,
    access_token: Option<&str>,
) -> Result<Jwk> {
    let mut segments = proof.split('.');
    let (Some(header_b64), Some(claims_b64), Some(sig_b64), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(DpopError::InvalidJwtFormat);
    };

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| DpopError::InvalidJwtFormat)?;
    let claims_bytes = URL_SAFE_NO_PAD
        .decode(claims_b64)
        .map_err(|_| DpopError::InvalidJwtFormat)?;

    let header: jws::Header<'_> =
        serde_json::from_slice(&header_bytes).map_err(|_| DpopError::InvalidJwtFormat)?;
    let claims: Claims<'_> =
        serde_json::from_slice(&claims_bytes).map_err(|_| DpopError::InvalidJwtFormat)?;

    if header.registered.typ.as_deref() != Some(JWT_HEADER_TYP_DPOP) {
        return Err(DpopError::InvalidTyp);
    }

    let jwk = header.registered.jwk.ok_or(DpopError::MissingJwk)?;
    let verifying_key = VerifyingKey::from(p256_public(&jwk.key)?);

    let sig_bytes = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| DpopError::InvalidSignature)?;
    let signature =
        Signature::from_slice(&sig_bytes).map_err(|_| DpopError::InvalidSignature)?;
    let signing_input = &proof[..header_b64.len() + 1 + claims_b64.len()];
    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| DpopError::InvalidSignature)?;

    match claims.public.htm.as_deref() {
        Some(htm) if htm == method => {}
        other => {
            return Err(DpopError::HtmMismatch {
                expected: method.to_string(),
                actual: other.unwrap_or_default().to_string(),
            });
        }
    }
    match claims.public.htu.as_deref() {
        Some(htu) if htu == url => {}
        other => {
            return Err(DpopError::HtuMismatch {
                expected: url.to_string(),
                actual: other.unwrap_or_default().to_string(),
            });
        }
    }

    let iat = claims.registered.iat.ok_or(DpopError::InvalidTimestamp)?;
    if (Utc::now().timestamp() - iat).abs() > IAT_TOLERANCE_SECS {
        return Err(DpopError::InvalidTimestamp);
    }

    if claims
        .registered
        .jti
        .as_deref()
        .is_none_or(|jti| jti.is_empty())
    {
        return Err(DpopError::MissingJti);
    }

    if let Some(token) = access_token {
        let expected = access_token_hash(token);
        match &claims.public.ath {
            None => return Err(DpopError::MissingAth),
            Some(ath) if *ath != expected => return Err(DpopError::InvalidAth),
            Some(_) => {}
        }
    }

    Ok(jwk)
}

/// RFC 7638 JWK thumbprint over the canonical `{crv, kty, x, y}` subset,
/// base64url encoded.
pub fn calculate_jkt(key: &Key) -> Result<CowStr<'static>> {
    let public = p256_public(key)?;
    let point = public.to_encoded_point(false);
    let x = URL_SAFE_NO_PAD.encode(point.x().ok_or(DpopError::InvalidJwk)?);
    let y = URL_SAFE_NO_PAD.encode(point.y().ok_or(DpopError::InvalidJwk)?);
    // keys in lexicographic order, no whitespace, per RFC 7638 §3
    let canonical = format!(r#"{{"crv":"P-256","kty":"EC","x":"{x}","y":"{y}"}}"#);
    Ok(URL_SAFE_NO_PAD
        .encode(Sha256::digest(canonical.as_bytes()))
        .into())
}

/// Thumbprint of the JWK embedded in a proof, without verifying anything
/// else about it. Handy for quick token-binding checks before the full
/// verification pass.
pub fn extract_jkt(proof: &str) -> Result<CowStr<'static>> {
    let header_b64 = proof.split('.').next().ok_or(DpopError::InvalidJwtFormat)?;
    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| DpopError::InvalidJwtFormat)?;
    let header: jws::Header<'_> =
        serde_json::from_slice(&header_bytes).map_err(|_| DpopError::InvalidJwtFormat)?;
    let jwk = header.registered.jwk.ok_or(DpopError::MissingJwk)?;
    calculate_jkt(&jwk.key)
}
