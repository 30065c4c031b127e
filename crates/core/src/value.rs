//! Value types for message record fields
//!
//! This module defines:
//! - Value: unified enum for everything a field can hold
//!
//! ## Equality and ordering
//!
//! `Value` carries a **total** order so it can key the ordered `Map` and
//! `Set` containers and so records can hash by value:
//! - Floats compare via `f64::total_cmp` and hash by bit pattern, so
//!   `NaN == NaN` (same payload) and `-0.0 < 0.0`.
//! - Different variants are NEVER equal: `Int(1) != Float(1.0)`,
//!   `Bytes(b"x") != Str("x")`, `Null != Undefined`.
//! - Records compare by type token plus field values; listener state is
//!   ignored.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};
use url::Url;

use crate::record::Record;

/// Unified value type for record fields.
///
/// `Undefined` is representable and distinct from `Null`: an optional field
/// holding `Undefined` is omitted from keyed serialized forms, while `Null`
/// is written out.
#[derive(Debug, Clone)]
pub enum Value {
    /// Explicitly cleared optional field
    Undefined,
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point
    Float(f64),
    /// Arbitrary-precision integer literal (`123n` on the wire)
    BigInt(i128),
    /// UTF-8 string
    Str(String),
    /// Instant in time (`D"..."` on the wire)
    Date(DateTime<Utc>),
    /// Parsed URL (`U"..."` on the wire)
    Url(Url),
    /// Raw bytes (`B"base64"` on the wire)
    Bytes(Vec<u8>),
    /// Ordered sequence of values
    List(Vec<Value>),
    /// Key-ordered map
    Map(BTreeMap<Value, Value>),
    /// Ordered set
    Set(BTreeSet<Value>),
    /// Nested message record
    Record(Record),
}

impl Value {
    /// Get the variant name as a string (used in shape-mismatch errors).
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "Undefined",
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::BigInt(_) => "BigInt",
            Value::Str(_) => "Str",
            Value::Date(_) => "Date",
            Value::Url(_) => "Url",
            Value::Bytes(_) => "Bytes",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Set(_) => "Set",
            Value::Record(_) => "Record",
        }
    }

    /// Check if this is `Undefined`
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Check if this is `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is a structural container (nested record, list,
    /// map, or set). Only structural fields participate in the update
    /// propagator's child-replacement contract.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Value::Record(_) | Value::List(_) | Value::Map(_) | Value::Set(_)
        )
    }

    /// Get as bool if this is a Bool value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i64 if this is an Int value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 if this is a Float value
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as i128 if this is a BigInt value
    pub fn as_bigint(&self) -> Option<i128> {
        match self {
            Value::BigInt(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as &str if this is a Str value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get as a date if this is a Date value
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Get as &Url if this is a Url value
    pub fn as_url(&self) -> Option<&Url> {
        match self {
            Value::Url(u) => Some(u),
            _ => None,
        }
    }

    /// Get as &[u8] if this is a Bytes value
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get as &[Value] if this is a List value
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Get as the backing map if this is a Map value
    pub fn as_map(&self) -> Option<&BTreeMap<Value, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Get as the backing set if this is a Set value
    pub fn as_set(&self) -> Option<&BTreeSet<Value>> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    /// Get as &Record if this is a nested record
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Undefined => 0,
            Value::Null => 1,
            Value::Bool(_) => 2,
            Value::Int(_) => 3,
            Value::Float(_) => 4,
            Value::BigInt(_) => 5,
            Value::Str(_) => 6,
            Value::Date(_) => 7,
            Value::Url(_) => 8,
            Value::Bytes(_) => 9,
            Value::List(_) => 10,
            Value::Map(_) => 11,
            Value::Set(_) => 12,
            Value::Record(_) => 13,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => Ordering::Equal,
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            // Total order so Value can key ordered maps and sets
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::BigInt(a), Value::BigInt(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Url(a), Value::Url(b)) => a.as_str().cmp(b.as_str()),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => a.cmp(b),
            (Value::Map(a), Value::Map(b)) => a.cmp(b),
            (Value::Set(a), Value::Set(b)) => a.cmp(b),
            (Value::Record(a), Value::Record(b)) => a.cmp(b),
            // Different variants are NEVER equal
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Undefined | Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            // Bit-pattern hash, consistent with total_cmp equality
            Value::Float(f) => f.to_bits().hash(state),
            Value::BigInt(i) => i.hash(state),
            Value::Str(s) => s.hash(state),
            Value::Date(d) => d.hash(state),
            Value::Url(u) => u.as_str().hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::List(l) => l.hash(state),
            Value::Map(m) => {
                for (k, v) in m {
                    k.hash(state);
                    v.hash(state);
                }
            }
            Value::Set(s) => {
                for v in s {
                    v.hash(state);
                }
            }
            Value::Record(r) => r.hash(state),
        }
    }
}

// ============================================================================
// From implementations for ergonomic API usage
// ============================================================================

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<i128> for Value {
    fn from(i: i128) -> Self {
        Value::BigInt(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl From<Url> for Value {
    fn from(u: Url) -> Self {
        Value::Url(u)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Value::List(l)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_not_equal_float() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }

    #[test]
    fn bytes_not_equal_str() {
        assert_ne!(Value::Bytes(b"hello".to_vec()), Value::Str("hello".into()));
    }

    #[test]
    fn undefined_not_equal_null() {
        assert_ne!(Value::Undefined, Value::Null);
    }

    #[test]
    fn nan_equals_nan_under_total_order() {
        // Required so records containing NaN stay hash-equal to themselves
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
    }

    #[test]
    fn negative_zero_orders_below_zero() {
        assert!(Value::Float(-0.0) < Value::Float(0.0));
    }

    #[test]
    fn value_keys_an_ordered_map() {
        let mut m = BTreeMap::new();
        m.insert(Value::Str("b".into()), Value::Int(2));
        m.insert(Value::Str("a".into()), Value::Int(1));
        let keys: Vec<_> = m.keys().cloned().collect();
        assert_eq!(keys, vec![Value::Str("a".into()), Value::Str("b".into())]);
    }

    #[test]
    fn hash_consistent_with_eq() {
        use std::collections::hash_map::DefaultHasher;
        fn h(v: &Value) -> u64 {
            let mut s = DefaultHasher::new();
            v.hash(&mut s);
            s.finish()
        }
        let a = Value::List(vec![Value::Int(1), Value::Str("x".into())]);
        let b = Value::List(vec![Value::Int(1), Value::Str("x".into())]);
        assert_eq!(a, b);
        assert_eq!(h(&a), h(&b));
    }

    #[test]
    fn structural_detection() {
        assert!(Value::List(vec![]).is_structural());
        assert!(Value::Map(BTreeMap::new()).is_structural());
        assert!(Value::Set(BTreeSet::new()).is_structural());
        assert!(!Value::Int(1).is_structural());
        assert!(!Value::Str("x".into()).is_structural());
    }

    #[test]
    fn as_wrong_type_returns_none() {
        let v = Value::Int(42);
        assert!(v.as_bool().is_none());
        assert!(v.as_str().is_none());
        assert!(v.as_list().is_none());
        assert!(v.as_record().is_none());
        assert_eq!(v.as_int(), Some(42));
    }

    #[test]
    fn from_conversions() {
        assert_eq!(Value::from(5i64), Value::Int(5));
        assert_eq!(Value::from(5i32), Value::Int(5));
        assert_eq!(Value::from("x"), Value::Str("x".into()));
        assert_eq!(Value::from(7i128), Value::BigInt(7));
        assert_eq!(Value::from(true), Value::Bool(true));
    }
}
