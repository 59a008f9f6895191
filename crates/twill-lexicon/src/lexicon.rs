//! Lexicon schema data model.
//!
//! The runtime subset of the lexicon language: primitives, ipld types,
//! objects, arrays, and bare `const` schemas. XRPC bodies and codegen-only
//! shapes are out of scope for validation.

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use serde_with::skip_serializing_none;
use smol_str::SmolStr;
use std::collections::BTreeMap;
use twill_common::CowStr;

/// The lexicon language version.
#[derive(Debug, Serialize_repr, Deserialize_repr, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum Lexicon {
    /// Version 1, the only one so far
    Lexicon1 = 1,
}

/// A full lexicon document: `{lexicon: 1, id, defs}`.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct LexiconDoc<'s> {
    /// Language version
    pub lexicon: Lexicon,
    /// The document's NSID
    #[serde(borrow)]
    pub id: CowStr<'s>,
    /// Optional revision counter
    pub revision: Option<u32>,
    /// Optional prose description
    pub description: Option<CowStr<'s>>,
    /// Named definitions; `main` is the top-level schema
    pub defs: BTreeMap<SmolStr, LexSchema<'s>>,
}

impl<'s> LexiconDoc<'s> {
    /// The `main` definition, the schema a document is loaded for.
    pub fn main(&self) -> Option<&LexSchema<'s>> {
        self.defs.get("main")
    }

    /// Look up any named definition.
    pub fn def(&self, name: &str) -> Option<&LexSchema<'s>> {
        self.defs.get(name)
    }
}

/// A schema node: either a typed definition or a bare `const`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(untagged)]
pub enum LexSchema<'s> {
    /// A definition with a `type` tag
    #[serde(borrow)]
    Typed(LexType<'s>),
    /// A bare `{const: …}` schema with no `type`
    Const(LexConst<'s>),
}

impl<'s> LexSchema<'s> {
    /// The constant value, when this schema is a bare const.
    pub fn const_value(&self) -> Option<&serde_json::Value> {
        match self {
            LexSchema::Const(c) => Some(&c.r#const),
            LexSchema::Typed(_) => None,
        }
    }
}

/// Typed schema definitions, dispatched on `type`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LexType<'s> {
    /// `null`
    Null(LexNull<'s>),
    /// `boolean`
    #[serde(borrow)]
    Boolean(LexBoolean<'s>),
    /// `integer`
    Integer(LexInteger<'s>),
    /// `string`
    String(LexString<'s>),
    /// `object`
    Object(LexObject<'s>),
    /// `array`
    Array(LexArray<'s>),
    /// `unknown` — any value accepted
    Unknown(LexUnknown<'s>),
    /// `bytes` — deep validation out of scope
    Bytes(LexBytes<'s>),
    /// `cid-link` — deep validation out of scope
    CidLink(LexCidLink<'s>),
    /// `blob` — deep validation out of scope
    Blob(LexBlob<'s>),
}

/// The `null` type.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct LexNull<'s> {
    /// Prose description
    #[serde(borrow)]
    pub description: Option<CowStr<'s>>,
}

/// The `boolean` type.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct LexBoolean<'s> {
    /// Prose description
    #[serde(borrow)]
    pub description: Option<CowStr<'s>>,
    /// Default value
    pub default: Option<bool>,
    /// Constant constraint
    pub r#const: Option<bool>,
}

/// The `integer` type.
///
/// Lexicon integers are signed and 64-bit, so every value fits an `i64`.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct LexInteger<'s> {
    /// Prose description
    #[serde(borrow)]
    pub description: Option<CowStr<'s>>,
    /// Default value
    pub default: Option<i64>,
    /// Inclusive lower bound
    pub minimum: Option<i64>,
    /// Inclusive upper bound
    pub maximum: Option<i64>,
    /// Closed set of allowed values
    pub r#enum: Option<Vec<i64>>,
    /// Constant constraint
    pub r#const: Option<i64>,
}

/// String format hints (not enforced by the validator).
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "kebab-case")]
pub enum LexStringFormat {
    /// RFC 3339 datetime
    Datetime,
    /// Generic URI
    Uri,
    /// at:// URI
    AtUri,
    /// DID
    Did,
    /// Handle
    Handle,
    /// DID or handle
    AtIdentifier,
    /// NSID
    Nsid,
    /// CID string
    Cid,
    /// BCP-47 language tag
    Language,
    /// TID
    Tid,
    /// Record key
    RecordKey,
}

/// The `string` type.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LexString<'s> {
    /// Prose description
    #[serde(borrow)]
    pub description: Option<CowStr<'s>>,
    /// Format hint
    pub format: Option<LexStringFormat>,
    /// Default value
    pub default: Option<CowStr<'s>>,
    /// Minimum length in unicode code points
    pub min_length: Option<usize>,
    /// Maximum length in unicode code points
    pub max_length: Option<usize>,
    /// Minimum length in grapheme clusters
    pub min_graphemes: Option<usize>,
    /// Maximum length in grapheme clusters
    pub max_graphemes: Option<usize>,
    /// Closed set of allowed values
    pub r#enum: Option<Vec<CowStr<'s>>>,
    /// Constant constraint
    pub r#const: Option<CowStr<'s>>,
    /// Open set of expected values
    pub known_values: Option<Vec<CowStr<'s>>>,
}

/// The `unknown` type: any value.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct LexUnknown<'s> {
    /// Prose description
    #[serde(borrow)]
    pub description: Option<CowStr<'s>>,
}

/// The `bytes` ipld type.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LexBytes<'s> {
    /// Prose description
    #[serde(borrow)]
    pub description: Option<CowStr<'s>>,
    /// Maximum byte length
    pub max_length: Option<usize>,
    /// Minimum byte length
    pub min_length: Option<usize>,
}

/// The `cid-link` ipld type.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct LexCidLink<'s> {
    /// Prose description
    #[serde(borrow)]
    pub description: Option<CowStr<'s>>,
}

/// The `blob` type.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LexBlob<'s> {
    /// Prose description
    #[serde(borrow)]
    pub description: Option<CowStr<'s>>,
    /// Accepted mime patterns
    pub accept: Option<Vec<CowStr<'s>>>,
    /// Maximum size in bytes
    pub max_size: Option<usize>,
}

/// The `array` type.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LexArray<'s> {
    /// Prose description
    #[serde(borrow)]
    pub description: Option<CowStr<'s>>,
    /// Schema every item must satisfy
    pub items: Box<LexSchema<'s>>,
    /// Minimum item count
    pub min_length: Option<usize>,
    /// Maximum item count
    pub max_length: Option<usize>,
}

/// The `object` type.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct LexObject<'s> {
    /// Prose description
    #[serde(borrow)]
    pub description: Option<CowStr<'s>>,
    /// Property names that must be present
    pub required: Option<Vec<SmolStr>>,
    /// Property names that may be explicitly null
    pub nullable: Option<Vec<SmolStr>>,
    /// Declared properties; undeclared ones are accepted untouched
    #[serde(default)]
    pub properties: BTreeMap<SmolStr, LexSchema<'s>>,
}

/// A bare `const` schema (no `type` tag).
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct LexConst<'s> {
    /// Prose description
    #[serde(borrow)]
    pub description: Option<CowStr<'s>>,
    /// The constant value
    pub r#const: serde_json::Value,
}
