use crate::types::crypto::{CryptoError, PublicKey};
use crate::types::did::{Did, did_web};
use crate::types::handle::Handle;
use crate::error::AtStrError;
use crate::{CowStr, IntoStatic};
use bon::Builder;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeMap;
use url::Url;

/// Service type of a personal data server entry.
pub const PDS_SERVICE_TYPE: &str = "AtprotoPersonalDataServer";

/// Key type used for atproto verification methods.
pub const MULTIKEY_TYPE: &str = "Multikey";

/// DID Document representation with borrowed data where possible.
///
/// Only the most commonly used fields are modeled explicitly. All other
/// fields are captured in `extra_data` for forward compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(start_fn = new)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument<'a> {
    /// Document identifier (e.g. `did:plc:...` or `did:web:...`)
    #[serde(borrow)]
    pub id: Did<'a>,

    /// Alternate identifiers for the subject, such as `at://<handle>`
    #[serde(borrow, skip_serializing_if = "Option::is_none")]
    pub also_known_as: Option<Vec<CowStr<'a>>>,

    /// Verification methods (keys) for this DID
    #[serde(borrow, skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<Vec<VerificationMethod<'a>>>,

    /// Services associated with this DID (e.g. the PDS)
    #[serde(borrow, skip_serializing_if = "Option::is_none")]
    pub service: Option<Vec<Service<'a>>>,

    /// Forward-compatible capture of unmodeled fields
    #[serde(flatten)]
    #[builder(default)]
    pub extra_data: BTreeMap<SmolStr, serde_json::Value>,
}

/// Verification method (key) entry in a DID Document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(start_fn = new)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod<'a> {
    /// Identifier for this key material within the document
    #[serde(borrow)]
    pub id: CowStr<'a>,
    /// Key type (e.g. `Multikey`)
    #[serde(borrow, rename = "type")]
    pub r#type: CowStr<'a>,
    /// Optional controller DID
    #[serde(borrow, skip_serializing_if = "Option::is_none")]
    pub controller: Option<CowStr<'a>>,
    /// Multikey `publicKeyMultibase` (base58btc)
    #[serde(borrow, skip_serializing_if = "Option::is_none")]
    pub public_key_multibase: Option<CowStr<'a>>,

    /// Forward-compatible capture of unmodeled fields
    #[serde(flatten)]
    #[builder(default)]
    pub extra_data: BTreeMap<SmolStr, serde_json::Value>,
}

/// Service entry in a DID Document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(start_fn = new)]
#[serde(rename_all = "camelCase")]
pub struct Service<'a> {
    /// Service identifier
    #[serde(borrow)]
    pub id: CowStr<'a>,
    /// Service type (e.g. `AtprotoPersonalDataServer`)
    #[serde(borrow, rename = "type")]
    pub r#type: CowStr<'a>,
    /// String or object; preserved as loose JSON
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_endpoint: Option<serde_json::Value>,

    /// Forward-compatible capture of unmodeled fields
    #[serde(flatten)]
    #[builder(default)]
    pub extra_data: BTreeMap<SmolStr, serde_json::Value>,
}

/// Options for assembling a new document.
#[derive(Debug, Clone, Default)]
pub struct DocumentInit<'a> {
    /// Handle to record as the first `at://` alias
    pub handle: Option<Handle<'a>>,
    /// PDS endpoint URL
    pub pds_endpoint: Option<CowStr<'a>>,
    /// Multikey `publicKeyMultibase` for the atproto signing key
    pub signing_key: Option<CowStr<'a>>,
    /// Further aliases, appended after the handle
    pub also_known_as: Vec<CowStr<'a>>,
}

impl<'a> DidDocument<'a> {
    /// Extract validated handles from `alsoKnownAs` entries like
    /// `at://<handle>`.
    pub fn handles(&self) -> Vec<Handle<'static>> {
        self.also_known_as
            .as_ref()
            .map(|v| {
                v.iter()
                    .filter_map(|s| s.strip_prefix("at://"))
                    .filter_map(|h| Handle::new(h).ok())
                    .map(|h| h.into_static())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The document's primary handle: the first `at://` alias.
    pub fn handle(&self) -> Option<Handle<'static>> {
        self.handles().into_iter().next()
    }

    /// The first service entry of the given type.
    pub fn service(&self, r#type: &str) -> Option<&Service<'a>> {
        self.service
            .as_ref()
            .and_then(|services| services.iter().find(|s| s.r#type.as_ref() == r#type))
    }

    /// The AtprotoPersonalDataServer endpoint as a `Url`.
    ///
    /// Accepts the endpoint as a string or as an object with a `url` field
    /// (string preferred).
    pub fn pds_endpoint(&self) -> Option<Url> {
        let endpoint = self.service(PDS_SERVICE_TYPE)?.service_endpoint.as_ref()?;
        match endpoint {
            serde_json::Value::String(s) => Url::parse(s).ok(),
            serde_json::Value::Object(obj) => obj
                .get("url")
                .and_then(|u| u.as_str())
                .and_then(|u| Url::parse(u).ok()),
            _ => None,
        }
    }

    /// The atproto signing key entry: the verification method whose id ends
    /// `#atproto`.
    pub fn signing_key(&self) -> Option<&VerificationMethod<'a>> {
        self.verification_method
            .as_ref()
            .and_then(|methods| methods.iter().find(|m| m.id.ends_with("#atproto")))
    }

    /// Decode the atproto signing key into a typed public key.
    pub fn signing_public_key(&self) -> Result<Option<PublicKey<'static>>, CryptoError> {
        match self
            .signing_key()
            .and_then(|m| m.public_key_multibase.as_deref())
        {
            Some(multibase) => Ok(Some(PublicKey::decode(multibase)?)),
            None => Ok(None),
        }
    }

    /// Append a service entry.
    pub fn add_service(&mut self, service: Service<'a>) {
        self.service.get_or_insert_with(Vec::new).push(service);
    }

    /// Replace the atproto signing key's `publicKeyMultibase`, adding the
    /// verification method if the document has none.
    pub fn update_signing_key(&mut self, key_multibase: impl Into<CowStr<'a>>) {
        let key_multibase = key_multibase.into();
        let methods = self.verification_method.get_or_insert_with(Vec::new);
        if let Some(method) = methods.iter_mut().find(|m| m.id.ends_with("#atproto")) {
            method.public_key_multibase = Some(key_multibase);
        } else {
            methods.push(
                VerificationMethod::new()
                    .id(CowStr::Owned(smol_str::format_smolstr!(
                        "{}#atproto",
                        self.id
                    )))
                    .r#type(CowStr::new_static(MULTIKEY_TYPE))
                    .controller(CowStr::copy_from_str(self.id.as_str()))
                    .public_key_multibase(key_multibase)
                    .build(),
            );
        }
    }
}

/// Assemble a document for a DID from keyword-style options.
pub fn create(did: Did<'_>, init: DocumentInit<'_>) -> DidDocument<'static> {
    let did = did.into_static();

    let mut aliases: Vec<CowStr<'static>> = Vec::new();
    if let Some(handle) = &init.handle {
        aliases.push(CowStr::Owned(smol_str::format_smolstr!(
            "at://{}",
            handle.as_str()
        )));
    }
    aliases.extend(init.also_known_as.into_iter().map(IntoStatic::into_static));

    let mut doc = DidDocument::new()
        .id(did.clone())
        .maybe_also_known_as((!aliases.is_empty()).then_some(aliases))
        .build();

    if let Some(key) = init.signing_key {
        doc.update_signing_key(key.into_static());
    }
    if let Some(endpoint) = init.pds_endpoint {
        doc.add_service(
            Service::new()
                .id(CowStr::new_static("#atproto_pds"))
                .r#type(CowStr::new_static(PDS_SERVICE_TYPE))
                .service_endpoint(serde_json::Value::String(endpoint.to_string()))
                .build(),
        );
    }
    doc
}

/// Assemble a did:web document for a domain.
pub fn create_web(
    domain: &str,
    init: DocumentInit<'_>,
) -> Result<DidDocument<'static>, AtStrError> {
    Ok(create(did_web(domain)?, init))
}

impl IntoStatic for DidDocument<'_> {
    type Output = DidDocument<'static>;

    fn into_static(self) -> Self::Output {
        DidDocument {
            id: self.id.into_static(),
            also_known_as: self.also_known_as.into_static(),
            verification_method: self.verification_method.into_static(),
            service: self.service.into_static(),
            extra_data: self.extra_data,
        }
    }
}

impl IntoStatic for VerificationMethod<'_> {
    type Output = VerificationMethod<'static>;

    fn into_static(self) -> Self::Output {
        VerificationMethod {
            id: self.id.into_static(),
            r#type: self.r#type.into_static(),
            controller: self.controller.into_static(),
            public_key_multibase: self.public_key_multibase.into_static(),
            extra_data: self.extra_data,
        }
    }
}

impl IntoStatic for Service<'_> {
    type Output = Service<'static>;

    fn into_static(self) -> Self::Output {
        Service {
            id: self.id.into_static(),
            r#type: self.r#type.into_static(),
            service_endpoint: self.service_endpoint,
            extra_data: self.extra_data,
        }
    }
}
