//! JSON codec for documents.
//!
//! Values JSON cannot express natively travel as single-field tagged
//! objects:
//!
//! | Value              | JSON                          |
//! |--------------------|-------------------------------|
//! | binary             | `{"$binary": "<base64>"}`     |
//! | big integer        | `{"$bigint": "<digits>"}`     |
//! | big decimal        | `{"$decimal": "<text>"}`      |
//! | non-finite float   | `{"$double": "NaN"}`, `"Infinity"`, `"-Infinity"` |
//! | tag-shaped document | `{"$doc": {...}}`            |
//!
//! A nested document whose only field is named like a tag is wrapped in
//! `$doc` so it reads back as a document. Objects that look like tags but
//! carry an invalid body decode as plain documents.
//!
//! Integral JSON numbers decode as `Int` when they fit in 32 bits and as
//! `Long` otherwise; all other numbers decode as `Double`. Round trips
//! therefore preserve structural equality, not the exact numeric
//! representation.

use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bigdecimal::num_bigint::BigInt;
use bigdecimal::BigDecimal;
use serde_json::{Map, Number as JsonNumber, Value as Json};
use thiserror::Error;

use crate::{Array, Document, Value};

const BINARY_TAG: &str = "$binary";
const BIGINT_TAG: &str = "$bigint";
const DECIMAL_TAG: &str = "$decimal";
const DOUBLE_TAG: &str = "$double";
const DOCUMENT_TAG: &str = "$doc";

const TAGS: [&str; 5] = [BINARY_TAG, BIGINT_TAG, DECIMAL_TAG, DOUBLE_TAG, DOCUMENT_TAG];

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("INVALID_JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("NOT_A_DOCUMENT")]
    NotADocument,
    #[error("INVALID_FIELD: {0}")]
    InvalidField(String),
}

// ── Encoding ─────────────────────────────────────────────────────────────

pub fn to_json(doc: &Document) -> Json {
    let mut map = Map::with_capacity(doc.len());
    for (name, value) in doc.fields() {
        map.insert(name.to_string(), value_to_json(value));
    }
    Json::Object(map)
}

pub fn array_to_json(array: &Array) -> Json {
    Json::Array(array.iter().map(value_to_json).collect())
}

pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(v) => Json::from(*v),
        Value::Long(v) => Json::from(*v),
        Value::Float(v) => float(f64::from(*v)),
        Value::Double(v) => float(*v),
        Value::BigInt(v) => tagged(BIGINT_TAG, v.to_string()),
        Value::Decimal(v) => tagged(DECIMAL_TAG, v.to_string()),
        Value::Str(s) => Json::String(s.to_string()),
        Value::Binary(b) => tagged(BINARY_TAG, STANDARD.encode(b)),
        Value::Document(d) if looks_tagged(d) => {
            let mut map = Map::with_capacity(1);
            map.insert(DOCUMENT_TAG.to_string(), to_json(d));
            Json::Object(map)
        }
        Value::Document(d) => to_json(d),
        Value::Array(a) => array_to_json(a),
    }
}

fn looks_tagged(doc: &Document) -> bool {
    doc.len() == 1 && doc.fields().all(|(name, _)| TAGS.contains(&name))
}

fn float(v: f64) -> Json {
    match JsonNumber::from_f64(v) {
        Some(n) => Json::Number(n),
        None if v.is_nan() => tagged(DOUBLE_TAG, "NaN".to_string()),
        None if v > 0.0 => tagged(DOUBLE_TAG, "Infinity".to_string()),
        None => tagged(DOUBLE_TAG, "-Infinity".to_string()),
    }
}

fn tagged(tag: &str, text: String) -> Json {
    let mut map = Map::with_capacity(1);
    map.insert(tag.to_string(), Json::String(text));
    Json::Object(map)
}

/// Serializes a document to compact JSON bytes.
pub fn write(doc: &Document) -> Vec<u8> {
    to_json(doc).to_string().into_bytes()
}

/// Serializes a document to indented JSON text.
pub fn write_pretty(doc: &Document) -> Result<String, CodecError> {
    Ok(serde_json::to_string_pretty(&to_json(doc))?)
}

// ── Decoding ─────────────────────────────────────────────────────────────

/// Converts a JSON object to a document.
pub fn from_json(json: &Json) -> Result<Document, CodecError> {
    match json {
        Json::Object(map) => Ok(object(map)),
        _ => Err(CodecError::NotADocument),
    }
}

pub fn value_from_json(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => number(n),
        Json::String(s) => Value::from(s.as_str()),
        Json::Array(items) => Value::Array(items.iter().map(value_from_json).collect()),
        Json::Object(map) => untag(map).unwrap_or_else(|| Value::Document(object(map))),
    }
}

fn object(map: &Map<String, Json>) -> Document {
    map.iter()
        .map(|(name, value)| (name.as_str(), value_from_json(value)))
        .collect()
}

fn number(n: &JsonNumber) -> Value {
    if let Some(v) = n.as_i64() {
        return match i32::try_from(v) {
            Ok(small) => Value::Int(small),
            Err(_) => Value::Long(v),
        };
    }
    if let Some(v) = n.as_u64() {
        return Value::BigInt(BigInt::from(v));
    }
    Value::Double(n.as_f64().unwrap_or(f64::NAN))
}

fn untag(map: &Map<String, Json>) -> Option<Value> {
    if map.len() != 1 {
        return None;
    }
    let (tag, body) = map.iter().next()?;
    if tag == DOCUMENT_TAG {
        return body.as_object().map(|inner| Value::Document(object(inner)));
    }
    let text = body.as_str()?;
    match tag.as_str() {
        BINARY_TAG => STANDARD.decode(text).ok().map(Value::from),
        BIGINT_TAG => BigInt::from_str(text).ok().map(Value::BigInt),
        DECIMAL_TAG => BigDecimal::from_str(text).ok().map(Value::Decimal),
        DOUBLE_TAG => match text {
            "NaN" => Some(Value::Double(f64::NAN)),
            "Infinity" => Some(Value::Double(f64::INFINITY)),
            "-Infinity" => Some(Value::Double(f64::NEG_INFINITY)),
            _ => None,
        },
        _ => None,
    }
}

/// Parses a document from JSON bytes.
pub fn read(bytes: &[u8]) -> Result<Document, CodecError> {
    let json: Json = serde_json::from_slice(bytes)?;
    from_json(&json)
}

/// Parses a document from JSON text.
pub fn read_str(text: &str) -> Result<Document, CodecError> {
    let json: Json = serde_json::from_str(text)?;
    from_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_numbers() {
        let doc = from_json(&json!({
            "small": 7,
            "large": 1_u64 << 40,
            "huge": u64::MAX,
            "frac": 1.25
        }))
        .unwrap();
        assert!(doc.get("small").unwrap().is_integer());
        assert!(doc.get("large").unwrap().is_long());
        assert!(doc.get("huge").unwrap().is_big_integer());
        assert!(doc.get("frac").unwrap().is_double());
    }

    #[test]
    fn tagged_values_roundtrip() {
        let doc = Document::new()
            .with("bin", vec![0u8, 159, 146, 150])
            .with("big", BigInt::from_str("123456789012345678901234567890").unwrap())
            .with("dec", BigDecimal::from_str("3.14159265358979323846").unwrap());
        let json = to_json(&doc);
        assert_eq!(json["bin"], json!({"$binary": "AJ+Slg=="}));
        assert_eq!(from_json(&json).unwrap(), doc);
    }

    #[test]
    fn lookalike_objects_stay_documents() {
        let doc = from_json(&json!({
            "a": {"$binary": 5},
            "b": {"$bigint": "12", "other": 1},
            "c": {"$decimal": "not a number"}
        }))
        .unwrap();
        assert!(doc.get("a").unwrap().is_document());
        assert!(doc.get("b").unwrap().is_document());
        assert!(doc.get("c").unwrap().is_document());
    }

    #[test]
    fn non_finite_floats_are_tagged() {
        let doc = Document::new()
            .with("nan", f64::NAN)
            .with("up", f32::INFINITY)
            .with("down", f64::NEG_INFINITY);
        let json = to_json(&doc);
        assert_eq!(
            json,
            json!({
                "nan": {"$double": "NaN"},
                "up": {"$double": "Infinity"},
                "down": {"$double": "-Infinity"}
            })
        );
        let back = from_json(&json).unwrap();
        assert_eq!(back, doc);
        assert!(back.get("nan").unwrap().is_double());
    }

    #[test]
    fn tag_shaped_documents_are_wrapped() {
        let inner = Document::new().with("$binary", "AA==");
        let doc = Document::new()
            .with("x", inner.clone())
            .with("list", Array::from(vec![Value::from(inner.clone())]))
            .with("nested", Document::new().with("$doc", Document::new().with("$bigint", "1")));
        let json = to_json(&doc);
        assert_eq!(json["x"], json!({"$doc": {"$binary": "AA=="}}));
        let back = from_json(&json).unwrap();
        assert_eq!(back, doc);
        assert!(back.get("x").unwrap().is_document());

        // Top-level fields are never mistaken for a tag.
        let top = Document::new().with("$decimal", "1.5");
        assert_eq!(read(&write(&top)).unwrap(), top);
    }

    #[test]
    fn preserves_field_order() {
        let text = r#"{"z":1,"a":2,"m":3}"#;
        let doc = read_str(text).unwrap();
        assert_eq!(String::from_utf8(write(&doc)).unwrap(), text);
    }

    #[test]
    fn rejects_non_objects() {
        assert!(matches!(read_str("[1,2]"), Err(CodecError::NotADocument)));
        assert!(matches!(read_str("{"), Err(CodecError::Json(_))));
    }
}
