//! Field descriptor tables
//!
//! A `Schema` is the per-type ordered list of field descriptors produced by
//! an external schema compiler. The core never inspects schema source; it
//! only consumes this table.
//!
//! ## Wire mode
//!
//! Computed once at construction: a type serializes positionally (array
//! form) if and only if every field carries a distinct tag and the tags form
//! a dense `1..=N` range. Otherwise it serializes as a keyed object.
//!
//! ## Compact types
//!
//! A type with exactly one untagged field is compact-eligible: it serializes
//! as the bare single value, optionally prefixed by a declared one-character
//! disambiguation tag when written into a union-typed field.

use once_cell::unsync::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::SchemaError;
use crate::record::Record;
use crate::token::TypeToken;
use crate::value::Value;

/// How a message type is laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireMode {
    /// Array form: field values by ascending tag
    Positional,
    /// Object form: numeric keys for tagged fields, name keys otherwise
    Keyed,
}

/// Expected shape of one field value.
#[derive(Debug, Clone)]
pub enum FieldShape {
    /// Boolean
    Bool,
    /// 64-bit integer
    Int,
    /// 64-bit float
    Float,
    /// Arbitrary-precision integer
    BigInt,
    /// UTF-8 string
    Str,
    /// Instant in time
    Date,
    /// Parsed URL
    Url,
    /// Raw bytes
    Bytes,
    /// Ordered sequence with a uniform element shape
    List(Box<FieldShape>),
    /// Key-ordered map with uniform key and value shapes
    Map(Box<FieldShape>, Box<FieldShape>),
    /// Ordered set with a uniform element shape
    Set(Box<FieldShape>),
    /// Nested message of one exact type
    Message(Arc<Schema>),
    /// Closed set of candidate types, tried in declaration order
    Union(Vec<UnionCandidate>),
}

/// One declared candidate of a union-typed field.
#[derive(Debug, Clone)]
pub enum UnionCandidate {
    /// A message-type candidate
    Message(Arc<Schema>),
    /// A non-message fallback (e.g. a raw date or integer)
    Primitive(FieldShape),
}

impl FieldShape {
    /// Check a value against this shape. Returns the mismatch description
    /// on failure.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match (self, value) {
            (FieldShape::Bool, Value::Bool(_))
            | (FieldShape::Int, Value::Int(_))
            | (FieldShape::Float, Value::Float(_))
            | (FieldShape::BigInt, Value::BigInt(_))
            | (FieldShape::Str, Value::Str(_))
            | (FieldShape::Date, Value::Date(_))
            | (FieldShape::Url, Value::Url(_))
            | (FieldShape::Bytes, Value::Bytes(_)) => Ok(()),
            (FieldShape::List(inner), Value::List(items)) => {
                for item in items {
                    inner.check(item)?;
                }
                Ok(())
            }
            (FieldShape::Map(key, val), Value::Map(entries)) => {
                for (k, v) in entries {
                    key.check(k)?;
                    val.check(v)?;
                }
                Ok(())
            }
            (FieldShape::Set(inner), Value::Set(items)) => {
                for item in items {
                    inner.check(item)?;
                }
                Ok(())
            }
            (FieldShape::Message(schema), Value::Record(record)) => {
                if record.token() == schema.token() {
                    Ok(())
                } else {
                    Err(format!(
                        "expected message `{}`, found `{}`",
                        schema.type_name(),
                        record.type_name()
                    ))
                }
            }
            (FieldShape::Union(candidates), value) => {
                for candidate in candidates {
                    let ok = match (candidate, value) {
                        (UnionCandidate::Message(schema), Value::Record(record)) => {
                            record.token() == schema.token()
                        }
                        (UnionCandidate::Primitive(shape), v) => shape.check(v).is_ok(),
                        _ => false,
                    };
                    if ok {
                        return Ok(());
                    }
                }
                Err(format!(
                    "value of type {} matches no union candidate",
                    value.type_name()
                ))
            }
            (expected, found) => Err(format!(
                "expected {}, found {}",
                expected.name(),
                found.type_name()
            )),
        }
    }

    /// Short shape name used in mismatch messages.
    pub fn name(&self) -> &'static str {
        match self {
            FieldShape::Bool => "Bool",
            FieldShape::Int => "Int",
            FieldShape::Float => "Float",
            FieldShape::BigInt => "BigInt",
            FieldShape::Str => "Str",
            FieldShape::Date => "Date",
            FieldShape::Url => "Url",
            FieldShape::Bytes => "Bytes",
            FieldShape::List(_) => "List",
            FieldShape::Map(_, _) => "Map",
            FieldShape::Set(_) => "Set",
            FieldShape::Message(_) => "Message",
            FieldShape::Union(_) => "Union",
        }
    }

    /// The all-defaults value for this shape, used by the empty singleton.
    pub fn default_value(&self) -> Value {
        match self {
            FieldShape::Bool => Value::Bool(false),
            FieldShape::Int => Value::Int(0),
            FieldShape::Float => Value::Float(0.0),
            FieldShape::BigInt => Value::BigInt(0),
            FieldShape::Str => Value::Str(String::new()),
            FieldShape::Date => Value::Date(chrono::DateTime::UNIX_EPOCH),
            FieldShape::Url => {
                // Cannot fail: fixed literal
                Value::Url(url::Url::parse("about:blank").expect("fixed URL literal"))
            }
            FieldShape::Bytes => Value::Bytes(Vec::new()),
            FieldShape::List(_) => Value::List(Vec::new()),
            FieldShape::Map(_, _) => Value::Map(Default::default()),
            FieldShape::Set(_) => Value::Set(Default::default()),
            FieldShape::Message(schema) => Value::Record(Record::empty(schema)),
            FieldShape::Union(candidates) => match candidates.first() {
                Some(UnionCandidate::Message(schema)) => Value::Record(Record::empty(schema)),
                Some(UnionCandidate::Primitive(shape)) => shape.default_value(),
                None => Value::Undefined,
            },
        }
    }
}

/// Schema metadata for one field: name, optional 1-based tag, expected
/// shape, and whether the field may hold `Undefined`.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: String,
    tag: Option<u32>,
    shape: FieldShape,
    optional: bool,
}

impl FieldDescriptor {
    /// Create a required, untagged descriptor.
    pub fn new(name: impl Into<String>, shape: FieldShape) -> Self {
        FieldDescriptor {
            name: name.into(),
            tag: None,
            shape,
            optional: false,
        }
    }

    /// Assign a positive field tag (builder pattern).
    pub fn tag(mut self, tag: u32) -> Self {
        self.tag = Some(tag);
        self
    }

    /// Mark the field optional (builder pattern).
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Field name, unique within its type.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field tag, if assigned.
    pub fn field_tag(&self) -> Option<u32> {
        self.tag
    }

    /// Expected value shape.
    pub fn shape(&self) -> &FieldShape {
        &self.shape
    }

    /// Whether the field may hold `Undefined`.
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Union candidates, when the field is union-typed.
    pub fn union_candidates(&self) -> Option<&[UnionCandidate]> {
        match &self.shape {
            FieldShape::Union(candidates) => Some(candidates),
            _ => None,
        }
    }

    /// Validate a value for this field. `Undefined` passes only when the
    /// field is optional.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        if value.is_undefined() {
            if self.optional {
                return Ok(());
            }
            return Err("required field may not be undefined".to_string());
        }
        self.shape.check(value)
    }
}

/// The field descriptor table for one message type.
pub struct Schema {
    type_name: String,
    token: TypeToken,
    fields: Vec<FieldDescriptor>,
    by_name: HashMap<String, usize>,
    by_tag: HashMap<u32, usize>,
    mode: WireMode,
    compact_tag: Option<char>,
    pub(crate) empty: OnceCell<Record>,
}

impl Schema {
    /// Start building a schema for the given type name.
    pub fn builder(type_name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            type_name: type_name.into(),
            fields: Vec::new(),
            compact_tag: None,
        }
    }

    /// Declared type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Process-wide identity token for this type name.
    pub fn token(&self) -> TypeToken {
        self.token
    }

    /// Ordered field descriptors.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Wire mode computed from the descriptor table.
    pub fn mode(&self) -> WireMode {
        self.mode
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<(usize, &FieldDescriptor)> {
        self.by_name.get(name).map(|&i| (i, &self.fields[i]))
    }

    /// Look up a field by tag.
    pub fn field_by_tag(&self, tag: u32) -> Option<(usize, &FieldDescriptor)> {
        self.by_tag.get(&tag).map(|&i| (i, &self.fields[i]))
    }

    /// True when the type qualifies for single-value (compact)
    /// representation: exactly one field, and that field has no tag.
    pub fn is_compact(&self) -> bool {
        self.fields.len() == 1 && self.fields[0].tag.is_none()
    }

    /// One-character disambiguation tag for compact serialization, if
    /// declared.
    pub fn compact_tag(&self) -> Option<char> {
        self.compact_tag
    }

    /// Field indices in ascending tag order (positional mode only).
    pub fn positional_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.fields.len()).collect();
        order.sort_by_key(|&i| self.fields[i].tag.unwrap_or(u32::MAX));
        order
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("type_name", &self.type_name)
            .field("fields", &self.fields.len())
            .field("mode", &self.mode)
            .finish()
    }
}

/// Builder for `Schema`, validating the descriptor table at `build` time.
pub struct SchemaBuilder {
    type_name: String,
    fields: Vec<FieldDescriptor>,
    compact_tag: Option<char>,
}

impl SchemaBuilder {
    /// Append a field descriptor.
    pub fn field(mut self, descriptor: FieldDescriptor) -> Self {
        self.fields.push(descriptor);
        self
    }

    /// Declare the one-character compact disambiguation tag. Rejected at
    /// `build` time when the type is not compact-eligible.
    pub fn compact_tag(mut self, tag: char) -> Self {
        self.compact_tag = Some(tag);
        self
    }

    /// Validate the table and produce the shared schema.
    pub fn build(self) -> Result<Arc<Schema>, SchemaError> {
        let mut by_name = HashMap::new();
        let mut by_tag = HashMap::new();
        for (i, field) in self.fields.iter().enumerate() {
            if by_name.insert(field.name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateFieldName {
                    type_name: self.type_name,
                    field: field.name.clone(),
                });
            }
            if let Some(tag) = field.tag {
                if tag == 0 {
                    return Err(SchemaError::ZeroFieldTag {
                        type_name: self.type_name,
                        field: field.name.clone(),
                    });
                }
                if by_tag.insert(tag, i).is_some() {
                    return Err(SchemaError::DuplicateFieldTag {
                        type_name: self.type_name,
                        tag,
                    });
                }
            }
        }

        // Positional iff the tags are exactly 1..=N
        let n = self.fields.len();
        let dense = n > 0
            && by_tag.len() == n
            && (1..=n as u32).all(|tag| by_tag.contains_key(&tag));
        let mode = if dense {
            WireMode::Positional
        } else {
            WireMode::Keyed
        };

        let compact_eligible = n == 1 && self.fields[0].tag.is_none();
        if self.compact_tag.is_some() && !compact_eligible {
            return Err(SchemaError::NotCompactEligible {
                type_name: self.type_name,
            });
        }

        let token = TypeToken::for_type(&self.type_name);
        Ok(Arc::new(Schema {
            type_name: self.type_name,
            token,
            fields: self.fields,
            by_name,
            by_tag,
            mode,
            compact_tag: self.compact_tag,
            empty: OnceCell::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_schema() -> Arc<Schema> {
        Schema::builder("schema_test_User")
            .field(FieldDescriptor::new("id", FieldShape::Int).tag(1))
            .field(FieldDescriptor::new("name", FieldShape::Str).tag(2))
            .build()
            .unwrap()
    }

    #[test]
    fn dense_tags_select_positional_mode() {
        assert_eq!(user_schema().mode(), WireMode::Positional);
    }

    #[test]
    fn sparse_tags_select_keyed_mode() {
        let s = Schema::builder("schema_test_Sparse")
            .field(FieldDescriptor::new("a", FieldShape::Int).tag(1))
            .field(FieldDescriptor::new("b", FieldShape::Int).tag(5))
            .build()
            .unwrap();
        assert_eq!(s.mode(), WireMode::Keyed);
    }

    #[test]
    fn untagged_fields_select_keyed_mode() {
        let s = Schema::builder("schema_test_Untagged")
            .field(FieldDescriptor::new("a", FieldShape::Int))
            .build()
            .unwrap();
        assert_eq!(s.mode(), WireMode::Keyed);
    }

    #[test]
    fn duplicate_name_rejected() {
        let err = Schema::builder("schema_test_Dup")
            .field(FieldDescriptor::new("a", FieldShape::Int))
            .field(FieldDescriptor::new("a", FieldShape::Str))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateFieldName { .. }));
    }

    #[test]
    fn duplicate_tag_rejected() {
        let err = Schema::builder("schema_test_DupTag")
            .field(FieldDescriptor::new("a", FieldShape::Int).tag(1))
            .field(FieldDescriptor::new("b", FieldShape::Int).tag(1))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateFieldTag { .. }));
    }

    #[test]
    fn zero_tag_rejected() {
        let err = Schema::builder("schema_test_Zero")
            .field(FieldDescriptor::new("a", FieldShape::Int).tag(0))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::ZeroFieldTag { .. }));
    }

    #[test]
    fn compact_eligibility() {
        let compact = Schema::builder("schema_test_Compact")
            .field(FieldDescriptor::new("value", FieldShape::Str))
            .compact_tag('k')
            .build()
            .unwrap();
        assert!(compact.is_compact());
        assert_eq!(compact.compact_tag(), Some('k'));

        let err = Schema::builder("schema_test_NotCompact")
            .field(FieldDescriptor::new("a", FieldShape::Int).tag(1))
            .compact_tag('x')
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::NotCompactEligible { .. }));
    }

    #[test]
    fn same_type_name_shares_token() {
        let a = user_schema();
        let b = user_schema();
        assert_eq!(a.token(), b.token());
    }

    #[test]
    fn shape_check_mismatch_names_both_sides() {
        let reason = FieldShape::Int.check(&Value::Str("x".into())).unwrap_err();
        assert!(reason.contains("Int"));
        assert!(reason.contains("Str"));
    }

    #[test]
    fn list_shape_checks_elements() {
        let shape = FieldShape::List(Box::new(FieldShape::Int));
        assert!(shape
            .check(&Value::List(vec![Value::Int(1), Value::Int(2)]))
            .is_ok());
        assert!(shape
            .check(&Value::List(vec![Value::Int(1), Value::Str("x".into())]))
            .is_err());
    }

    #[test]
    fn optional_accepts_undefined() {
        let required = FieldDescriptor::new("a", FieldShape::Int);
        let optional = FieldDescriptor::new("a", FieldShape::Int).optional();
        assert!(required.validate(&Value::Undefined).is_err());
        assert!(optional.validate(&Value::Undefined).is_ok());
    }

    #[test]
    fn union_checks_by_token_and_primitive() {
        let user = user_schema();
        let shape = FieldShape::Union(vec![
            UnionCandidate::Message(user.clone()),
            UnionCandidate::Primitive(FieldShape::Int),
        ]);
        assert!(shape.check(&Value::Int(5)).is_ok());
        assert!(shape.check(&Value::Str("no".into())).is_err());
    }
}
