use jose_jwa::Algorithm;
use jose_jwk::Jwk;
use serde::{Deserialize, Serialize};
use twill_common::{CowStr, IntoStatic};

/// JWS protected header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header<'a> {
    #[serde(flatten)]
    #[serde(borrow)]
    /// The registered header parameters
    pub registered: RegisteredHeader<'a>,
}

impl<'a> From<Header<'a>> for super::Header<'a> {
    fn from(header: Header<'a>) -> Self {
        super::Header::Jws(header)
    }
}

/// Registered JWS header parameters (RFC 7515 §4.1).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredHeader<'a> {
    /// Signing algorithm
    pub alg: Algorithm,
    /// JWK Set URL
    #[serde(borrow)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jku: Option<CowStr<'a>>,
    /// Embedded public key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk: Option<Jwk>,
    /// Key id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<CowStr<'a>>,
    /// Token type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<CowStr<'a>>,
    /// Content type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cty: Option<CowStr<'a>>,
}

impl From<Algorithm> for RegisteredHeader<'_> {
    fn from(alg: Algorithm) -> Self {
        Self {
            alg,
            jku: None,
            jwk: None,
            kid: None,
            typ: None,
            cty: None,
        }
    }
}

impl<'a> From<RegisteredHeader<'a>> for super::Header<'a> {
    fn from(registered: RegisteredHeader<'a>) -> Self {
        super::Header::Jws(Header { registered })
    }
}

impl IntoStatic for RegisteredHeader<'_> {
    type Output = RegisteredHeader<'static>;

    fn into_static(self) -> Self::Output {
        RegisteredHeader {
            alg: self.alg,
            jku: self.jku.map(IntoStatic::into_static),
            jwk: self.jwk,
            kid: self.kid.map(IntoStatic::into_static),
            typ: self.typ.map(IntoStatic::into_static),
            cty: self.cty.map(IntoStatic::into_static),
        }
    }
}
