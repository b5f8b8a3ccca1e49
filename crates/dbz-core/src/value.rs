//! The [`Value`] sum type.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use bigdecimal::num_bigint::BigInt;
use bigdecimal::BigDecimal;

use crate::{Array, Document, Number};

/// Discriminant of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Null,
    Boolean,
    Integer,
    Long,
    Float,
    Double,
    BigInteger,
    Decimal,
    String,
    Binary,
    Document,
    Array,
}

impl ValueType {
    pub fn is_number(self) -> bool {
        matches!(
            self,
            ValueType::Integer
                | ValueType::Long
                | ValueType::Float
                | ValueType::Double
                | ValueType::BigInteger
                | ValueType::Decimal
        )
    }

    // Cross-type ordering: null < boolean < number < string < binary <
    // document < array.
    fn rank(self) -> u8 {
        match self {
            ValueType::Null => 0,
            ValueType::Boolean => 1,
            t if t.is_number() => 2,
            ValueType::String => 3,
            ValueType::Binary => 4,
            ValueType::Document => 5,
            _ => 6,
        }
    }
}

/// A single document value.
///
/// Strings and binary payloads are reference counted, so cloning a value
/// only deep-copies nested documents and arrays.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    BigInt(BigInt),
    Decimal(BigDecimal),
    Str(Arc<str>),
    Binary(Arc<[u8]>),
    Document(Document),
    Array(Array),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Boolean,
            Value::Int(_) => ValueType::Integer,
            Value::Long(_) => ValueType::Long,
            Value::Float(_) => ValueType::Float,
            Value::Double(_) => ValueType::Double,
            Value::BigInt(_) => ValueType::BigInteger,
            Value::Decimal(_) => ValueType::Decimal,
            Value::Str(_) => ValueType::String,
            Value::Binary(_) => ValueType::Binary,
            Value::Document(_) => ValueType::Document,
            Value::Array(_) => ValueType::Array,
        }
    }

    pub fn binary(bytes: impl Into<Arc<[u8]>>) -> Value {
        Value::Binary(bytes.into())
    }

    // ── Predicates ───────────────────────────────────────────────────────

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Int(_))
    }

    pub fn is_long(&self) -> bool {
        matches!(self, Value::Long(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }

    pub fn is_double(&self) -> bool {
        matches!(self, Value::Double(_))
    }

    pub fn is_big_integer(&self) -> bool {
        matches!(self, Value::BigInt(_))
    }

    pub fn is_decimal(&self) -> bool {
        matches!(self, Value::Decimal(_))
    }

    /// True for every numeric representation.
    pub fn is_number(&self) -> bool {
        self.value_type().is_number()
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::Str(_))
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Value::Binary(_))
    }

    pub fn is_document(&self) -> bool {
        matches!(self, Value::Document(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    // ── Coercing accessors ───────────────────────────────────────────────
    //
    // None of these fail loudly: an impossible coercion is `None`.

    /// The numeric content of this value.
    ///
    /// Booleans are `1`/`0`; strings are parsed with [`Number::parse`].
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Int(v) => Some(Number::Int(*v)),
            Value::Long(v) => Some(Number::Long(*v)),
            Value::Float(v) => Some(Number::Float(*v)),
            Value::Double(v) => Some(Number::Double(*v)),
            Value::BigInt(v) => Some(Number::BigInt(v.clone())),
            Value::Decimal(v) => Some(Number::Decimal(v.clone())),
            Value::Bool(b) => Some(Number::Int(i32::from(*b))),
            Value::Str(s) => Number::parse(s),
            _ => None,
        }
    }

    /// Booleans as-is; numbers are `false` only when zero; strings must be
    /// `"true"` or `"false"` ignoring ASCII case.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Str(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Value::Str(s) if s.eq_ignore_ascii_case("false") => Some(false),
            Value::Str(_) => None,
            other => other.numeric().map(|n| !n.is_zero()),
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Str(s) => s.parse().ok(),
            other => other.as_number().map(|n| n.to_i32()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Str(s) => s.parse().ok(),
            other => other.as_number().map(|n| n.to_i64()),
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Str(s) => s.parse().ok(),
            other => other.as_number().map(|n| n.to_f32()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Str(s) => s.parse().ok(),
            other => other.as_number().map(|n| n.to_f64()),
        }
    }

    pub fn as_big_int(&self) -> Option<BigInt> {
        match self {
            Value::Str(s) => s.parse().ok(),
            other => other.as_number().and_then(|n| n.to_big_int()),
        }
    }

    pub fn as_decimal(&self) -> Option<BigDecimal> {
        match self {
            Value::Str(s) => s.parse().ok(),
            other => other.as_number().and_then(|n| n.to_big_decimal()),
        }
    }

    /// Borrows string content without coercion.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(&**s),
            _ => None,
        }
    }

    /// String content, rendering scalars and decoding binary as UTF-8.
    /// Containers and null have no string form.
    pub fn as_string(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::Str(s) => Some(Cow::Borrowed(&**s)),
            Value::Binary(b) => std::str::from_utf8(b).ok().map(Cow::Borrowed),
            Value::Bool(b) => Some(Cow::Owned(b.to_string())),
            other => other.numeric().map(|n| Cow::Owned(n.to_string())),
        }
    }

    /// Raw bytes of a binary value or of a string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(&**b),
            Value::Str(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_document_mut(&mut self) -> Option<&mut Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Numeric content without string or boolean coercion.
    fn numeric(&self) -> Option<Number> {
        if self.is_number() {
            self.as_number()
        } else {
            None
        }
    }

    /// Loose equality used by REQUIRE: structural equality, or equality
    /// after coercing `self` to the expected value's type.
    ///
    /// ```
    /// use dbz_core::Value;
    ///
    /// assert!(Value::from("5").matches(&Value::from(5)));
    /// assert!(Value::from(1).matches(&Value::from(true)));
    /// assert!(Value::from(0.1f32).matches(&Value::from(0.1)));
    /// assert!(!Value::from("five").matches(&Value::from(5)));
    /// ```
    pub fn matches(&self, expected: &Value) -> bool {
        if self == expected {
            return true;
        }
        match expected {
            Value::Bool(b) => self.as_bool() == Some(*b),
            Value::Str(s) => self.as_string().is_some_and(|actual| *actual == **s),
            e if e.is_number() => match (self.as_number(), e.as_number()) {
                (Some(a), Some(b)) => {
                    a == b || a.to_big_decimal().is_some_and(|d| Some(d) == b.to_big_decimal())
                }
                _ => false,
            },
            _ => false,
        }
    }
}

// ── Structural ordering ──────────────────────────────────────────────────

impl Ord for Value {
    fn cmp(&self, other: &Value) -> Ordering {
        let (left, right) = (self.value_type(), other.value_type());
        match left.rank().cmp(&right.rank()) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Binary(a), Value::Binary(b)) => a.cmp(b),
            (Value::Document(a), Value::Document(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a.cmp(b),
            (a, b) => match (a.numeric(), b.numeric()) {
                (Some(x), Some(y)) => x.cmp(&y),
                // Only null remains.
                _ => Ordering::Equal,
            },
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Value) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

/// Renders the value as compact JSON.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::codec::value_to_json(self))
    }
}

// ── Conversions ──────────────────────────────────────────────────────────

macro_rules! value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Value {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    BigInt => BigInt,
    BigDecimal => Decimal,
    Document => Document,
    Array => Array,
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::Str(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::Str(Arc::from(v))
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Value {
        Value::Binary(Arc::from(v))
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Value {
        match n {
            Number::Int(v) => Value::Int(v),
            Number::Long(v) => Value::Long(v),
            Number::Float(v) => Value::Float(v),
            Number::Double(v) => Value::Double(v),
            Number::BigInt(v) => Value::BigInt(v),
            Number::Decimal(v) => Value::Decimal(v),
        }
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Value {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn predicates_are_exclusive() {
        let samples = [
            Value::Null,
            Value::from(true),
            Value::from(1),
            Value::from(1i64),
            Value::from(1.0f32),
            Value::from(1.0),
            Value::from("x"),
            Value::from(vec![1u8, 2]),
            Value::from(Document::new()),
            Value::from(Array::new()),
        ];
        for v in &samples {
            let hits = [
                v.is_null(),
                v.is_bool(),
                v.is_integer(),
                v.is_long(),
                v.is_float(),
                v.is_double(),
                v.is_string(),
                v.is_binary(),
                v.is_document(),
                v.is_array(),
            ];
            assert_eq!(hits.iter().filter(|h| **h).count(), 1, "{v:?}");
        }
        assert!(Value::from(1.5).is_number());
        assert!(!Value::from("1.5").is_number());
    }

    #[test]
    fn boolean_coercions() {
        assert_eq!(Value::from(true).as_i32(), Some(1));
        assert_eq!(Value::from(false).as_f64(), Some(0.0));
        assert_eq!(Value::from(0).as_bool(), Some(false));
        assert_eq!(Value::from(-3.5).as_bool(), Some(true));
        assert_eq!(Value::from("TRUE").as_bool(), Some(true));
        assert_eq!(Value::from("False").as_bool(), Some(false));
        assert_eq!(Value::from("yes").as_bool(), None);
        assert_eq!(Value::Null.as_bool(), None);
    }

    #[test]
    fn numeric_coercions() {
        assert_eq!(Value::from(7i64).as_i32(), Some(7));
        assert_eq!(Value::from(7.9).as_i64(), Some(7));
        assert_eq!(Value::from("12").as_i64(), Some(12));
        assert_eq!(Value::from("12.5").as_i64(), None);
        assert_eq!(Value::from("12.5").as_f64(), Some(12.5));
        assert_eq!(
            Value::from("123456789012345678901234567890").as_big_int(),
            BigInt::from_str("123456789012345678901234567890").ok()
        );
        assert_eq!(Value::from(Document::new()).as_i32(), None);
        assert!(matches!(Value::from("0.25").as_number(), Some(Number::Float(_))));
    }

    #[test]
    fn binary_and_string() {
        let bin = Value::from(b"hello".to_vec());
        assert_eq!(bin.as_string().as_deref(), Some("hello"));
        assert_eq!(Value::from("hello").as_bytes(), Some(&b"hello"[..]));
        assert_eq!(Value::from(vec![0xffu8, 0xfe]).as_string(), None);
        assert_eq!(Value::from(42).as_string().as_deref(), Some("42"));
    }

    #[test]
    fn total_order_across_types() {
        let mut values = vec![
            Value::from(Array::new()),
            Value::from("b"),
            Value::from(2.5),
            Value::Null,
            Value::from(vec![0u8]),
            Value::from(true),
            Value::from(Document::new()),
            Value::from(1),
        ];
        values.sort();
        let types: Vec<ValueType> = values.iter().map(Value::value_type).collect();
        assert_eq!(
            types,
            vec![
                ValueType::Null,
                ValueType::Boolean,
                ValueType::Integer,
                ValueType::Double,
                ValueType::String,
                ValueType::Binary,
                ValueType::Document,
                ValueType::Array,
            ]
        );
        assert_eq!(Value::from(2), Value::from(2.0));
        assert_eq!(Value::from(-0.0), Value::from(0));
        assert!(Value::from(1i64 << 60) > Value::from((1i64 << 60) as f64 - 1024.0));
        assert_ne!(Value::from(2), Value::from("2"));
    }

    #[test]
    fn option_converts_to_null() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::from("x"));
    }
}
