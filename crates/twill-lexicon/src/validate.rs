//! Runtime validation of JSON data against a schema tree.

use crate::error::{Issue, LexiconError, ValidationErrors};
use crate::lexicon::{
    LexArray, LexInteger, LexObject, LexSchema, LexString, LexType, LexiconDoc,
};
use serde_json::Value;
use unicode_segmentation::UnicodeSegmentation;

/// Validate a value against a schema.
///
/// All problems at a given level are collected before returning; nothing
/// short-circuits, so the caller sees a complete report.
pub fn validate(schema: &LexSchema<'_>, value: &Value) -> Result<(), ValidationErrors> {
    let issues = check(schema, value);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors { issues })
    }
}

/// Validate a value against a document's `main` definition.
pub fn validate_doc(doc: &LexiconDoc<'_>, value: &Value) -> Result<(), LexiconError> {
    let main = doc.main().ok_or(LexiconError::MissingMain)?;
    validate(main, value)?;
    Ok(())
}

fn check(schema: &LexSchema<'_>, value: &Value) -> Vec<Issue> {
    match schema {
        // a bare const accepts anything; the constant is the result
        LexSchema::Const(_) => Vec::new(),
        LexSchema::Typed(typed) => match typed {
            LexType::Null(_) => {
                if value.is_null() {
                    Vec::new()
                } else {
                    vec![Issue::here("must be null")]
                }
            }
            LexType::Boolean(_) => {
                if value.is_boolean() {
                    Vec::new()
                } else {
                    vec![Issue::here("must be a boolean")]
                }
            }
            LexType::Integer(schema) => check_integer(schema, value),
            LexType::String(schema) => check_string(schema, value),
            LexType::Object(schema) => check_object(schema, value),
            LexType::Array(schema) => check_array(schema, value),
            // deep validation of these is out of scope; accept anything
            LexType::Unknown(_) | LexType::Bytes(_) | LexType::CidLink(_) | LexType::Blob(_) => {
                Vec::new()
            }
        },
    }
}

fn check_integer(schema: &LexInteger<'_>, value: &Value) -> Vec<Issue> {
    let Some(n) = value.as_i64() else {
        return vec![Issue::here("must be an integer")];
    };

    let mut issues = Vec::new();
    if let Some(minimum) = schema.minimum {
        if n < minimum {
            issues.push(Issue::here(format!("must be at least {minimum}")));
        }
    }
    if let Some(maximum) = schema.maximum {
        if n > maximum {
            issues.push(Issue::here(format!("must be at most {maximum}")));
        }
    }
    if let Some(allowed) = &schema.r#enum {
        if !allowed.contains(&n) {
            issues.push(Issue::here("is not one of the allowed values"));
        }
    }
    issues
}

fn check_string(schema: &LexString<'_>, value: &Value) -> Vec<Issue> {
    let Some(s) = value.as_str() else {
        return vec![Issue::here("must be a string")];
    };

    let mut issues = Vec::new();
    // lengths are counted in code points, graphemes separately
    let code_points = s.chars().count();
    if let Some(min_length) = schema.min_length {
        if code_points < min_length {
            issues.push(Issue::here(format!(
                "must be at least {min_length} characters"
            )));
        }
    }
    if let Some(max_length) = schema.max_length {
        if code_points > max_length {
            issues.push(Issue::here(format!(
                "must be at most {max_length} characters"
            )));
        }
    }
    if schema.min_graphemes.is_some() || schema.max_graphemes.is_some() {
        let graphemes = s.graphemes(true).count();
        if let Some(min) = schema.min_graphemes {
            if graphemes < min {
                issues.push(Issue::here(format!("must be at least {min} graphemes")));
            }
        }
        if let Some(max) = schema.max_graphemes {
            if graphemes > max {
                issues.push(Issue::here(format!("must be at most {max} graphemes")));
            }
        }
    }
    if let Some(allowed) = &schema.r#enum {
        if !allowed.iter().any(|v| v.as_ref() == s) {
            issues.push(Issue::here("is not one of the allowed values"));
        }
    }
    issues
}

fn check_object(schema: &LexObject<'_>, value: &Value) -> Vec<Issue> {
    let Some(obj) = value.as_object() else {
        return vec![Issue::here("must be an object")];
    };

    let mut issues = Vec::new();

    if let Some(required) = &schema.required {
        for name in required {
            if !obj.contains_key(name.as_str()) {
                issues.push(Issue::at(name, "is required"));
            }
        }
    }

    let nullable = |name: &str| {
        schema
            .nullable
            .as_ref()
            .is_some_and(|list| list.iter().any(|n| n == name))
    };

    for (name, prop_schema) in &schema.properties {
        if let Some(prop_value) = obj.get(name.as_str()) {
            if prop_value.is_null() && nullable(name) {
                continue;
            }
            for issue in check(prop_schema, prop_value) {
                issues.push(issue.under_property(name));
            }
        }
    }

    // unknown properties are accepted untouched
    issues
}

fn check_array(schema: &LexArray<'_>, value: &Value) -> Vec<Issue> {
    let Some(items) = value.as_array() else {
        return vec![Issue::here("must be an array")];
    };

    let mut issues = Vec::new();
    if let Some(min_length) = schema.min_length {
        if items.len() < min_length {
            issues.push(Issue::here(format!("must have at least {min_length} items")));
        }
    }
    if let Some(max_length) = schema.max_length {
        if items.len() > max_length {
            issues.push(Issue::here(format!("must have at most {max_length} items")));
        }
    }

    for (i, item) in items.iter().enumerate() {
        for issue in check(&schema.items, item) {
            issues.push(issue.under_index(i));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PathSegment;
    use serde_json::json;
    use smol_str::SmolStr;

    fn schema(json: serde_json::Value) -> LexSchema<'static> {
        let raw: &'static str = Box::leak(json.to_string().into_boxed_str());
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn post_record_validates() {
        let post = schema(json!({
            "type": "object",
            "properties": {
                "text": {"type": "string", "maxLength": 300},
                "createdAt": {"type": "string"}
            },
            "required": ["text", "createdAt"]
        }));

        let value = json!({
            "text": "Hello, ATProto!",
            "createdAt": "2024-01-15T12:00:00Z"
        });
        assert!(validate(&post, &value).is_ok());
    }

    #[test]
    fn missing_required_reports_every_field() {
        let person = schema(json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer"}
            },
            "required": ["name", "age"]
        }));

        let err = validate(&person, &json!({})).unwrap_err();
        assert_eq!(err.issues.len(), 2);
        assert_eq!(
            err.issues[0].path,
            vec![PathSegment::Property(SmolStr::new("name"))]
        );
        assert_eq!(
            err.issues[1].path,
            vec![PathSegment::Property(SmolStr::new("age"))]
        );
    }

    #[test]
    fn nested_required_path() {
        let outer = schema(json!({
            "type": "object",
            "properties": {
                "profile": {
                    "type": "object",
                    "properties": {"email": {"type": "string"}},
                    "required": ["email"]
                }
            },
            "required": ["profile"]
        }));

        let err = validate(&outer, &json!({"profile": {}})).unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert_eq!(
            err.issues[0].path,
            vec![
                PathSegment::Property(SmolStr::new("profile")),
                PathSegment::Property(SmolStr::new("email")),
            ]
        );
    }

    #[test]
    fn integer_constraints() {
        let bounded = schema(json!({"type": "integer", "minimum": 1, "maximum": 10}));
        assert!(validate(&bounded, &json!(5)).is_ok());
        assert!(validate(&bounded, &json!(0)).is_err());
        assert!(validate(&bounded, &json!(11)).is_err());
        assert!(validate(&bounded, &json!("five")).is_err());
        assert!(validate(&bounded, &json!(5.5)).is_err());

        let enumed = schema(json!({"type": "integer", "enum": [1, 2, 3]}));
        assert!(validate(&enumed, &json!(2)).is_ok());
        assert!(validate(&enumed, &json!(4)).is_err());
    }

    #[test]
    fn string_lengths_are_code_points() {
        let short = schema(json!({"type": "string", "maxLength": 4}));
        // four code points, more than four bytes
        assert!(validate(&short, &json!("héllo")).is_err());
        assert!(validate(&short, &json!("héll")).is_ok());
    }

    #[test]
    fn grapheme_counting() {
        let one = schema(json!({"type": "string", "maxGraphemes": 1}));
        // a single flag emoji is one grapheme but two code points
        assert!(validate(&one, &json!("🇺🇸")).is_ok());
        assert!(validate(&one, &json!("ab")).is_err());
    }

    #[test]
    fn array_items_report_index() {
        let langs = schema(json!({
            "type": "array",
            "items": {"type": "string"},
            "maxLength": 3
        }));

        assert!(validate(&langs, &json!(["en", "pt"])).is_ok());
        assert!(validate(&langs, &json!(["en", "pt", "de", "fr"])).is_err());

        let err = validate(&langs, &json!(["en", 7])).unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert_eq!(err.issues[0].path, vec![PathSegment::Index(1)]);
    }

    #[test]
    fn unknown_properties_accepted() {
        let open = schema(json!({
            "type": "object",
            "properties": {"known": {"type": "string"}}
        }));
        assert!(validate(&open, &json!({"known": "x", "extra": 42})).is_ok());
    }

    #[test]
    fn nullable_properties() {
        let doc = schema(json!({
            "type": "object",
            "properties": {"label": {"type": "string"}},
            "nullable": ["label"]
        }));
        assert!(validate(&doc, &json!({"label": null})).is_ok());

        let strict = schema(json!({
            "type": "object",
            "properties": {"label": {"type": "string"}}
        }));
        assert!(validate(&strict, &json!({"label": null})).is_err());
    }

    #[test]
    fn ipld_types_accept_anything() {
        for ty in ["unknown", "bytes", "cid-link", "blob"] {
            let open = schema(json!({"type": ty}));
            assert!(validate(&open, &json!({"anything": [1, 2, 3]})).is_ok());
            assert!(validate(&open, &json!(42)).is_ok());
        }
    }

    #[test]
    fn bare_const_accepts() {
        let c = schema(json!({"const": 1}));
        assert!(validate(&c, &json!("whatever")).is_ok());
        assert_eq!(c.const_value(), Some(&json!(1)));
    }

    #[test]
    fn document_main_validation() {
        let raw = json!({
            "lexicon": 1,
            "id": "com.example.post",
            "defs": {
                "main": {
                    "type": "object",
                    "required": ["text"],
                    "properties": {"text": {"type": "string"}}
                }
            }
        })
        .to_string();
        let doc: LexiconDoc = serde_json::from_str(&raw).unwrap();

        assert!(validate_doc(&doc, &json!({"text": "hi"})).is_ok());
        assert!(validate_doc(&doc, &json!({})).is_err());
    }
}
