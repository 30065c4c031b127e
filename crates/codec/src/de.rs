//! Entry reconstruction
//!
//! Turns raw parsed trees into typed records against a descriptor table.
//! Reconstruction is tolerant of wire form: a positional array is accepted
//! for a keyed type and vice versa. A sequence is first normalized into a
//! field-tag-keyed entry list (ordinal order stands in for tags when the
//! type declares none), then the common per-field coercion runs, failing
//! with the first missing or invalid field by name.
//!
//! The only cross-type coercion is integer-to-float for float-shaped
//! fields. Everything else must match exactly.

use std::sync::Arc;

use cereal_core::{FieldShape, Record, Schema, Value};

use crate::error::{CodecError, CodecResult};
use crate::parse::parse_document;
use crate::raw::{EntryKey, Raw};
use crate::union;

/// Parse cereal text and reconstruct a record of the given type.
pub fn deserialize(text: &str, schema: &Arc<Schema>) -> CodecResult<Record> {
    let raw = parse_document(text)?;
    let record = reconstruct(schema, &raw)?;
    tracing::trace!(
        target: "cereal::codec",
        type_name = schema.type_name(),
        "deserialized record"
    );
    Ok(record)
}

/// Reconstruct a record of the given type from a raw value tree.
pub fn reconstruct(schema: &Arc<Schema>, raw: &Raw) -> CodecResult<Record> {
    match raw {
        Raw::Tagged { tag, body } => {
            if tag != schema.type_name() {
                return Err(CodecError::UnexpectedTag {
                    tag: tag.clone(),
                    expected: schema.type_name().to_string(),
                });
            }
            reconstruct(schema, body)
        }
        Raw::Entries(entries) => {
            let mut indexed = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                let idx = match key {
                    EntryKey::Tag(tag) => {
                        schema
                            .field_by_tag(*tag)
                            .ok_or(CodecError::UnknownFieldTag {
                                type_name: schema.type_name().to_string(),
                                tag: *tag,
                            })?
                            .0
                    }
                    EntryKey::Name(name) => {
                        schema
                            .field(name)
                            .ok_or_else(|| CodecError::UnknownField {
                                type_name: schema.type_name().to_string(),
                                key: name.clone(),
                            })?
                            .0
                    }
                };
                indexed.push((idx, value));
            }
            from_indexed(schema, indexed)
        }
        Raw::Seq(items) => {
            let indexed = normalize_positional(schema, items)?;
            from_indexed(schema, indexed)
        }
        other if schema.is_compact() => {
            let field = &schema.fields()[0];
            let value = coerce(field.shape(), other).map_err(|e| invalid(schema, field.name(), e))?;
            Record::new(schema, [(field.name().to_string(), value)]).map_err(into_codec)
        }
        other => Err(CodecError::ShapeMismatch {
            expected: format!("object or array for `{}`", schema.type_name()),
            found: other.kind().to_string(),
        }),
    }
}

/// Normalize a positional array into field indices: by field tag when the
/// type declares any, by ordinal otherwise.
fn normalize_positional<'a>(
    schema: &Arc<Schema>,
    items: &'a [Raw],
) -> CodecResult<Vec<(usize, &'a Raw)>> {
    let has_tags = schema.fields().iter().any(|f| f.field_tag().is_some());
    let mut indexed = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let idx = if has_tags {
            let tag = i as u32 + 1;
            schema
                .field_by_tag(tag)
                .ok_or(CodecError::UnknownFieldTag {
                    type_name: schema.type_name().to_string(),
                    tag,
                })?
                .0
        } else {
            if i >= schema.fields().len() {
                return Err(CodecError::PositionalOverflow {
                    type_name: schema.type_name().to_string(),
                    given: items.len(),
                    expected: schema.fields().len(),
                });
            }
            i
        };
        indexed.push((idx, item));
    }
    Ok(indexed)
}

fn from_indexed(schema: &Arc<Schema>, indexed: Vec<(usize, &Raw)>) -> CodecResult<Record> {
    let mut slots: Vec<Option<&Raw>> = vec![None; schema.fields().len()];
    for (idx, raw) in indexed {
        // The parser rejects identical keys, but a tag key and a name key
        // can still address the same field
        if slots[idx].is_some() {
            return Err(CodecError::DuplicateEntry {
                type_name: schema.type_name().to_string(),
                field: schema.fields()[idx].name().to_string(),
            });
        }
        slots[idx] = Some(raw);
    }

    let mut values = Vec::with_capacity(schema.fields().len());
    for (field, slot) in schema.fields().iter().zip(slots) {
        let value = match slot {
            Some(raw) => {
                coerce(field.shape(), raw).map_err(|e| invalid(schema, field.name(), e))?
            }
            None if field.is_optional() => Value::Undefined,
            None => {
                return Err(CodecError::MissingField {
                    type_name: schema.type_name().to_string(),
                    field: field.name().to_string(),
                })
            }
        };
        values.push((field.name().to_string(), value));
    }
    Record::new(schema, values).map_err(into_codec)
}

/// Shape-directed coercion of one raw value.
pub(crate) fn coerce(shape: &FieldShape, raw: &Raw) -> CodecResult<Value> {
    match (shape, raw) {
        (FieldShape::Bool, Raw::Bool(b)) => Ok(Value::Bool(*b)),
        (FieldShape::Int, Raw::Int(i)) => Ok(Value::Int(*i)),
        (FieldShape::Float, Raw::Float(f)) => Ok(Value::Float(*f)),
        (FieldShape::Float, Raw::Int(i)) => Ok(Value::Float(*i as f64)),
        (FieldShape::BigInt, Raw::BigInt(i)) => Ok(Value::BigInt(*i)),
        (FieldShape::Str, Raw::Str(s)) => Ok(Value::Str(s.clone())),
        (FieldShape::Date, Raw::Date(d)) => Ok(Value::Date(*d)),
        (FieldShape::Url, Raw::Url(u)) => Ok(Value::Url(u.clone())),
        (FieldShape::Bytes, Raw::Bytes(b)) => Ok(Value::Bytes(b.clone())),
        (FieldShape::List(inner), Raw::Seq(items)) => {
            let mut list = Vec::with_capacity(items.len());
            for item in items {
                list.push(coerce(inner, item)?);
            }
            Ok(Value::List(list))
        }
        (FieldShape::Map(key_shape, val_shape), Raw::MapLit(pairs)) => {
            let mut map = std::collections::BTreeMap::new();
            for (k, v) in pairs {
                map.insert(coerce(key_shape, k)?, coerce(val_shape, v)?);
            }
            Ok(Value::Map(map))
        }
        (FieldShape::Set(inner), Raw::SetLit(items)) => {
            let mut set = std::collections::BTreeSet::new();
            for item in items {
                set.insert(coerce(inner, item)?);
            }
            Ok(Value::Set(set))
        }
        (FieldShape::Message(schema), raw)
            if raw.is_object_shaped()
                || matches!(raw, Raw::Tagged { .. })
                || schema.is_compact() =>
        {
            reconstruct(schema, raw).map(Value::Record)
        }
        (FieldShape::Union(candidates), raw) => union::resolve(candidates, raw),
        (shape, raw) => Err(CodecError::ShapeMismatch {
            expected: shape.name().to_string(),
            found: raw.kind().to_string(),
        }),
    }
}

fn invalid(schema: &Arc<Schema>, field: &str, source: CodecError) -> CodecError {
    match source {
        // Already field-specific for this type: keep the inner context
        err @ CodecError::Parse(_) => err,
        err => CodecError::InvalidField {
            type_name: schema.type_name().to_string(),
            field: field.to_string(),
            reason: err.to_string(),
        },
    }
}

fn into_codec(err: cereal_core::Error) -> CodecError {
    match err {
        cereal_core::Error::Validation(v) => CodecError::Validation(v),
        cereal_core::Error::Schema(s) => CodecError::InvalidField {
            type_name: String::new(),
            field: String::new(),
            reason: s.to_string(),
        },
    }
}
