use serde::{Deserialize, Serialize};
use twill_common::{CowStr, IntoStatic};

/// JWT claims: the registered set plus the DPoP public claims.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Claims<'a> {
    /// Registered claims (RFC 7519 §4.1)
    #[serde(flatten)]
    pub registered: RegisteredClaims<'a>,
    /// DPoP claims (RFC 9449 §4.2)
    #[serde(flatten)]
    #[serde(borrow)]
    pub public: PublicClaims<'a>,
}

/// Registered JWT claims.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RegisteredClaims<'a> {
    /// Issuer
    #[serde(borrow)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<CowStr<'a>>,
    /// Subject
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<CowStr<'a>>,
    /// Audience
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<CowStr<'a>>,
    /// Expiry, seconds since the epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Not-before, seconds since the epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    /// Issued-at, seconds since the epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Unique token id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<CowStr<'a>>,
}

/// DPoP-specific claims.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PublicClaims<'a> {
    /// HTTP method of the request the proof covers
    #[serde(borrow)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub htm: Option<CowStr<'a>>,
    /// HTTP URL of the request the proof covers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub htu: Option<CowStr<'a>>,
    /// base64url SHA-256 of the bound access token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ath: Option<CowStr<'a>>,
    /// Server-issued nonce
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<CowStr<'a>>,
}

impl<'a> From<RegisteredClaims<'a>> for Claims<'a> {
    fn from(registered: RegisteredClaims<'a>) -> Self {
        Self {
            registered,
            public: PublicClaims::default(),
        }
    }
}

impl IntoStatic for RegisteredClaims<'_> {
    type Output = RegisteredClaims<'static>;

    fn into_static(self) -> Self::Output {
        RegisteredClaims {
            iss: self.iss.map(IntoStatic::into_static),
            sub: self.sub.map(IntoStatic::into_static),
            aud: self.aud.map(IntoStatic::into_static),
            exp: self.exp,
            nbf: self.nbf,
            iat: self.iat,
            jti: self.jti.map(IntoStatic::into_static),
        }
    }
}

impl IntoStatic for PublicClaims<'_> {
    type Output = PublicClaims<'static>;

    fn into_static(self) -> Self::Output {
        PublicClaims {
            htm: self.htm.map(IntoStatic::into_static),
            htu: self.htu.map(IntoStatic::into_static),
            ath: self.ath.map(IntoStatic::into_static),
            nonce: self.nonce.map(IntoStatic::into_static),
        }
    }
}

impl IntoStatic for Claims<'_> {
    type Output = Claims<'static>;

    fn into_static(self) -> Self::Output {
        Claims {
            registered: self.registered.into_static(),
            public: self.public.into_static(),
        }
    }
}
