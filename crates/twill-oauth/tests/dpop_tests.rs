//! DPoP proof round-trips and failure modes.

use twill_oauth::dpop::{build_proof, calculate_jkt, extract_jkt, verify_proof};
use twill_oauth::error::DpopError;
use twill_oauth::pkce::generate_es256_key;

const URL: &str = "https://api.example.com/resource";

#[test]
fn proof_roundtrip() {
    let key = generate_es256_key();
    let proof = build_proof(&key, "POST", URL, None, None).unwrap();

    let jwk = verify_proof(&proof, "POST", URL, None).unwrap();
    // the embedded key is the proving key's public half
    assert_eq!(
        calculate_jkt(&jwk.key).unwrap(),
        calculate_jkt(&key).unwrap()
    );
}

#[test]
fn method_mismatch() {
    let key = generate_es256_key();
    let proof = build_proof(&key, "POST", URL, None, None).unwrap();

    assert!(matches!(
        verify_proof(&proof, "GET", URL, None),
        Err(DpopError::HtmMismatch { .. })
    ));
}

#[test]
fn url_mismatch() {
    let key = generate_es256_key();
    let proof = build_proof(&key, "POST", URL, None, None).unwrap();

    assert!(matches!(
        verify_proof(&proof, "POST", "https://api.example.com/other", None),
        Err(DpopError::HtuMismatch { .. })
    ));
}

#[test]
fn tampered_signature_rejected() {
    let key = generate_es256_key();
    let proof = build_proof(&key, "POST", URL, None, None).unwrap();

    // flip the final signature character to a different base64url character
    let mut tampered: String = proof.to_string();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'A' { 'B' } else { 'A' });

    assert!(matches!(
        verify_proof(&tampered, "POST", URL, None),
        Err(DpopError::InvalidSignature)
    ));
}

#[test]
fn tampered_claims_rejected() {
    let key = generate_es256_key();
    let proof = build_proof(&key, "POST", URL, None, None).unwrap();

    // substitute the claims segment wholesale
    let parts: Vec<&str> = proof.split('.').collect();
    use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
    let forged = URL_SAFE_NO_PAD.encode(
        format!(r#"{{"htm":"POST","htu":"{URL}","jti":"forged","iat":{}}}"#, chrono::Utc::now().timestamp()),
    );
    let tampered = format!("{}.{}.{}", parts[0], forged, parts[2]);

    assert!(matches!(
        verify_proof(&tampered, "POST", URL, None),
        Err(DpopError::InvalidSignature)
    ));
}

#[test]
fn malformed_jwt() {
    assert!(matches!(
        verify_proof("notajwt", "POST", URL, None),
        Err(DpopError::InvalidJwtFormat)
    ));
    assert!(matches!(
        verify_proof("a.b", "POST", URL, None),
        Err(DpopError::InvalidJwtFormat)
    ));
    assert!(matches!(
        verify_proof("a.b.c.d", "POST", URL, None),
        Err(DpopError::InvalidJwtFormat)
    ));
}

#[test]
fn access_token_binding() {
    let key = generate_es256_key();
    let token = "an-opaque-access-token";

    // bound proof verifies with the same token
    let bound = build_proof(&key, "POST", URL, None, Some(token)).unwrap();
    assert!(verify_proof(&bound, "POST", URL, Some(token)).is_ok());

    // wrong token
    assert!(matches!(
        verify_proof(&bound, "POST", URL, Some("some-other-token")),
        Err(DpopError::InvalidAth)
    ));

    // token expected but proof carries no ath
    let unbound = build_proof(&key, "POST", URL, None, None).unwrap();
    assert!(matches!(
        verify_proof(&unbound, "POST", URL, Some(token)),
        Err(DpopError::MissingAth)
    ));

    // a bound proof without a token to check against still verifies
    assert!(verify_proof(&bound, "POST", URL, None).is_ok());
}

#[test]
fn nonce_is_carried() {
    let key = generate_es256_key();
    let proof = build_proof(&key, "POST", URL, Some("server-nonce"), None).unwrap();

    // nonce doesn't affect verification, but it must be in the claims
    assert!(verify_proof(&proof, "POST", URL, None).is_ok());
    use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
    let claims_b64 = proof.split('.').nth(1).unwrap();
    let claims: serde_json::Value =
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(claims_b64).unwrap()).unwrap();
    assert_eq!(claims["nonce"], "server-nonce");
    assert_eq!(claims["htm"], "POST");
    assert!(claims["jti"].as_str().is_some_and(|j| !j.is_empty()));
}

#[test]
fn jkt_extraction_matches() {
    let key = generate_es256_key();
    let proof = build_proof(&key, "GET", URL, None, None).unwrap();

    assert_eq!(
        extract_jkt(&proof).unwrap(),
        calculate_jkt(&key).unwrap()
    );

    // distinct keys give distinct thumbprints
    let other = generate_es256_key();
    assert_ne!(
        calculate_jkt(&key).unwrap(),
        calculate_jkt(&other).unwrap()
    );
}

#[test]
fn wrong_typ_rejected() {
    use jose_jwa::{Algorithm, Signing};
    use jose_jwk::{Jwk, crypto};
    use twill_oauth::jose::jws::RegisteredHeader;
    use twill_oauth::jose::jwt::{Claims, PublicClaims, RegisteredClaims};
    use twill_common::CowStr;

    // hand-roll a JWT whose typ is plain `jwt`
    let secret = elliptic_curve::SecretKey::<p256::NistP256>::random(
        &mut rand::rngs::ThreadRng::default(),
    );
    let mut header = RegisteredHeader::from(Algorithm::Signing(Signing::Es256));
    header.typ = Some(CowStr::Borrowed("jwt"));
    header.jwk = Some(Jwk {
        key: jose_jwk::Key::from(&crypto::Key::from(secret.public_key())),
        prm: Default::default(),
    });
    let claims = Claims {
        registered: RegisteredClaims {
            jti: Some(CowStr::Borrowed("x")),
            iat: Some(chrono::Utc::now().timestamp()),
            ..Default::default()
        },
        public: PublicClaims {
            htm: Some(CowStr::Borrowed("POST")),
            htu: Some(CowStr::Borrowed(URL)),
            ath: None,
            nonce: None,
        },
    };
    let jwt = twill_oauth::jose::create_signed_jwt(
        p256::ecdsa::SigningKey::from(secret),
        header.into(),
        claims,
    )
    .unwrap();

    assert!(matches!(
        verify_proof(&jwt, "POST", URL, None),
        Err(DpopError::InvalidTyp)
    ));
}
