//! PKCE material, nonces, and ephemeral key generation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use elliptic_curve::SecretKey;
use jose_jwk::{Key, crypto};
use rand::{CryptoRng, RngCore, rngs::ThreadRng};
use sha2::{Digest, Sha256};
use twill_common::CowStr;

/// Generate a signing key for the first algorithm we support from the
/// server's allowed list.
pub fn generate_key(allowed_algos: &[CowStr]) -> Option<Key> {
    for alg in allowed_algos {
        if alg.as_ref() == "ES256" {
            return Some(Key::from(&crypto::Key::from(
                SecretKey::<p256::NistP256>::random(&mut ThreadRng::default()),
            )));
        }
    }
    None
}

/// Generate an ES256 key without consulting server metadata.
pub fn generate_es256_key() -> Key {
    Key::from(&crypto::Key::from(SecretKey::<p256::NistP256>::random(
        &mut ThreadRng::default(),
    )))
}

/// 16 random bytes, base64url: a state or nonce value.
pub fn generate_nonce() -> CowStr<'static> {
    URL_SAFE_NO_PAD
        .encode(get_random_values::<_, 16>(&mut ThreadRng::default()))
        .into()
}

/// A PKCE code verifier (RFC 7636 §4.1).
pub fn generate_verifier() -> CowStr<'static> {
    URL_SAFE_NO_PAD
        .encode(get_random_values::<_, 43>(&mut ThreadRng::default()))
        .into()
}

/// Fill a fixed-size array from a cryptographic RNG.
pub fn get_random_values<R, const LEN: usize>(rng: &mut R) -> [u8; LEN]
where
    R: RngCore + CryptoRng,
{
    let mut bytes = [0u8; LEN];
    rng.fill_bytes(&mut bytes);
    bytes
}

/// An S256 `(challenge, verifier)` pair (RFC 7636 §4.2).
pub fn generate_pkce() -> (CowStr<'static>, CowStr<'static>) {
    let verifier = generate_verifier();
    (
        URL_SAFE_NO_PAD
            .encode(Sha256::digest(verifier.as_str()))
            .into(),
        verifier,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkce_pair_relates_by_s256() {
        let (challenge, verifier) = generate_pkce();
        let expected = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_str()));
        assert_eq!(challenge.as_ref(), expected);
        assert!(verifier.len() >= 43);
    }

    #[test]
    fn nonces_are_unique() {
        assert_ne!(generate_nonce(), generate_nonce());
    }

    #[test]
    fn key_generation_respects_allowed_list() {
        assert!(generate_key(&[CowStr::Borrowed("ES256")]).is_some());
        assert!(generate_key(&[CowStr::Borrowed("RS256")]).is_none());
        assert!(generate_key(&[]).is_none());
    }
}
