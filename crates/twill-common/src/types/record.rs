use crate::error::AtStrError;
use crate::types::cid::Cid;
use crate::types::nsid::Nsid;
use crate::IntoStatic;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};
use smol_str::SmolStr;
use std::collections::BTreeMap;

/// Errors from record envelope handling.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum RecordError {
    /// No `$type` field
    #[error("record is missing $type")]
    #[diagnostic(code(twill::record::missing_type))]
    MissingType,

    /// `$type` is not a valid NSID
    #[error("record $type is not a valid NSID")]
    #[diagnostic(code(twill::record::invalid_type))]
    InvalidType(#[source] AtStrError),

    /// Record body is not a JSON object
    #[error("record body must be an object")]
    #[diagnostic(code(twill::record::not_an_object))]
    NotAnObject,

    /// DAG-CBOR encoding failed
    #[error("record encoding failed")]
    #[diagnostic(code(twill::record::encode))]
    Encode(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// An open record envelope: a `$type` NSID naming the schema, plus the
/// record's fields.
///
/// Fields are kept as loose JSON so records for any lexicon round-trip
/// without a generated type. Content addressing uses the DAG-CBOR encoding
/// of the full envelope, `$type` included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<'a> {
    /// The record's schema NSID.
    pub r#type: Nsid<'a>,
    /// Everything except `$type`, in key order.
    pub fields: BTreeMap<SmolStr, serde_json::Value>,
}

impl<'a> Record<'a> {
    /// Empty record of the given type.
    pub fn new(r#type: Nsid<'a>) -> Self {
        Self {
            r#type,
            fields: BTreeMap::new(),
        }
    }

    /// Set a field, replacing any previous value. Chainable.
    pub fn with_field(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(SmolStr::new(key), value.into());
        self
    }

    /// Read a field.
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    /// Parse a loose JSON value, requiring a valid `$type`.
    pub fn from_json(value: &serde_json::Value) -> Result<Record<'static>, RecordError> {
        let obj = value.as_object().ok_or(RecordError::NotAnObject)?;
        let ty = obj
            .get("$type")
            .and_then(|t| t.as_str())
            .ok_or(RecordError::MissingType)?;
        let r#type = Nsid::new_owned(ty).map_err(RecordError::InvalidType)?;
        let fields = obj
            .iter()
            .filter(|(k, _)| k.as_str() != "$type")
            .map(|(k, v)| (SmolStr::new(k), v.clone()))
            .collect();
        Ok(Record { r#type, fields })
    }

    /// DAG-CBOR encoding of the envelope.
    pub fn to_dag_cbor(&self) -> Result<Vec<u8>, RecordError> {
        serde_ipld_dagcbor::to_vec(self).map_err(|e| RecordError::Encode(Box::new(e)))
    }

    /// Content-addressed CID of the DAG-CBOR encoding.
    pub fn cid(&self) -> Result<Cid<'static>, RecordError> {
        Ok(Cid::from_dag_cbor(&self.to_dag_cbor()?))
    }
}

impl IntoStatic for Record<'_> {
    type Output = Record<'static>;

    fn into_static(self) -> Self::Output {
        Record {
            r#type: self.r#type.into_static(),
            fields: self.fields,
        }
    }
}

impl Serialize for Record<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry("$type", self.r#type.as_str())?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record<'_> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Record::from_json(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn build_and_read() {
        let record = Record::new(Nsid::raw("app.bsky.feed.post"))
            .with_field("text", "Hello, ATProto!")
            .with_field("createdAt", "2024-01-15T12:00:00Z");
        assert_eq!(record.field("text").unwrap(), "Hello, ATProto!");
        assert_eq!(record.r#type.name(), "post");
    }

    #[test]
    fn json_roundtrip() {
        let record = Record::new(Nsid::raw("app.bsky.feed.post")).with_field("text", "hi");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["$type"], "app.bsky.feed.post");
        let parsed = Record::from_json(&json).unwrap();
        assert_eq!(parsed, record.into_static());
    }

    #[test]
    fn missing_or_invalid_type() {
        assert!(matches!(
            Record::from_json(&json!({"text": "hi"})),
            Err(RecordError::MissingType)
        ));
        assert!(matches!(
            Record::from_json(&json!({"$type": "notansid"})),
            Err(RecordError::InvalidType(_))
        ));
    }

    #[test]
    fn cid_is_stable() {
        let record = Record::new(Nsid::raw("app.bsky.feed.post")).with_field("text", "hi");
        let a = record.cid().unwrap();
        let b = record.cid().unwrap();
        assert_eq!(a, b);

        let other = Record::new(Nsid::raw("app.bsky.feed.post")).with_field("text", "bye");
        assert_ne!(a, other.cid().unwrap());
    }
}
