//! Cereal serializer
//!
//! Deterministic: the same record always yields the same text. The wire
//! mode is the one computed on the schema: positional array for dense
//! `1..=N` tags, keyed object otherwise. `Undefined` is omitted only for
//! optional fields in keyed mode; in positional mode it must keep its slot.
//!
//! Union-typed fields are where tagging happens: a message value held by a
//! union field is written as `$TypeName{...}` (or through its compact form)
//! so the reader can disambiguate without guessing.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use cereal_core::{FieldShape, Record, UnionCandidate, Value, WireMode};

use crate::error::{CodecError, CodecResult};
use crate::parse::scalar_raw;
use crate::raw::Raw;

/// Serialize a record to cereal text (with the leading `:` sentinel).
pub fn serialize(record: &Record) -> CodecResult<String> {
    let mut out = String::from(":");
    write_record(&mut out, record, false)?;
    tracing::trace!(
        target: "cereal::codec",
        type_name = record.type_name(),
        len = out.len(),
        "serialized record"
    );
    Ok(out)
}

fn write_record(out: &mut String, record: &Record, in_union: bool) -> CodecResult<()> {
    let schema = record.schema();

    if schema.is_compact() {
        if in_union {
            return write_compact_explicit(out, record);
        }
        let field = &schema.fields()[0];
        return write_value(out, &record.values()[0], field.shape());
    }

    if in_union {
        out.push('$');
        out.push_str(schema.type_name());
    }

    match schema.mode() {
        WireMode::Positional => {
            out.push('[');
            for (i, idx) in schema.positional_order().into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let field = &schema.fields()[idx];
                write_value(out, &record.values()[idx], field.shape())?;
            }
            out.push(']');
        }
        WireMode::Keyed => {
            out.push('{');
            let mut first = true;
            for (field, value) in schema.fields().iter().zip(record.values()) {
                if value.is_undefined() {
                    if field.is_optional() {
                        continue;
                    }
                    return Err(CodecError::UndefinedRequired {
                        type_name: schema.type_name().to_string(),
                        field: field.name().to_string(),
                    });
                }
                if !first {
                    out.push(',');
                }
                first = false;
                match field.field_tag() {
                    Some(tag) => out.push_str(&tag.to_string()),
                    None => write_key(out, field.name()),
                }
                out.push(':');
                write_value(out, value, field.shape())?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_value(out: &mut String, value: &Value, shape: &FieldShape) -> CodecResult<()> {
    if let FieldShape::Union(candidates) = shape {
        return write_union(out, value, candidates);
    }
    match value {
        Value::Undefined => out.push_str("undefined"),
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(i) => out.push_str(&i.to_string()),
        Value::Float(f) => out.push_str(&float_literal(*f)?),
        Value::BigInt(i) => {
            out.push_str(&i.to_string());
            out.push('n');
        }
        Value::Str(s) => {
            if is_bare_safe(s) {
                out.push_str(s);
            } else {
                write_quoted(out, s);
            }
        }
        Value::Date(d) => {
            out.push('D');
            write_quoted(out, &d.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string());
        }
        Value::Url(u) => {
            out.push('U');
            write_quoted(out, u.as_str());
        }
        Value::Bytes(b) => {
            out.push('B');
            write_quoted(out, &BASE64.encode(b));
        }
        Value::List(items) => {
            let inner = match shape {
                FieldShape::List(inner) => inner,
                other => return Err(mismatch(other, value)),
            };
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item, inner)?;
            }
            out.push(']');
        }
        Value::Map(entries) => {
            let (key_shape, val_shape) = match shape {
                FieldShape::Map(k, v) => (k, v),
                other => return Err(mismatch(other, value)),
            };
            out.push_str("M[");
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push('[');
                write_value(out, k, key_shape)?;
                out.push(',');
                write_value(out, v, val_shape)?;
                out.push(']');
            }
            out.push(']');
        }
        Value::Set(items) => {
            let inner = match shape {
                FieldShape::Set(inner) => inner,
                other => return Err(mismatch(other, value)),
            };
            out.push_str("S[");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item, inner)?;
            }
            out.push(']');
        }
        Value::Record(record) => {
            if !matches!(shape, FieldShape::Message(_)) {
                return Err(mismatch(shape, value));
            }
            write_record(out, record, false)?;
        }
    }
    Ok(())
}

fn write_union(
    out: &mut String,
    value: &Value,
    candidates: &[UnionCandidate],
) -> CodecResult<()> {
    if let Value::Record(record) = value {
        for (i, candidate) in candidates.iter().enumerate() {
            if let UnionCandidate::Message(schema) = candidate {
                if schema.token() == record.token() {
                    if schema.is_compact() {
                        if let Some(token) = compact_tag_form(record, &candidates[..i]) {
                            out.push_str(&token);
                            return Ok(());
                        }
                        return write_compact_explicit(out, record);
                    }
                    return write_record(out, record, true);
                }
            }
        }
        return Err(CodecError::ShapeMismatch {
            expected: "declared union candidate".to_string(),
            found: record.type_name().to_string(),
        });
    }
    for (i, candidate) in candidates.iter().enumerate() {
        if let UnionCandidate::Primitive(shape) = candidate {
            if shape.check(value).is_ok() {
                // Any string form (bare or quoted) parses to the same raw
                // string, so a string an earlier compact candidate would
                // capture has no unambiguous wire form at all.
                if let Value::Str(s) = value {
                    if let Some((tag, name)) = capturing_compact(&candidates[..i], s) {
                        return Err(CodecError::CompactTagCollision {
                            tag,
                            candidate: name,
                        });
                    }
                }
                return write_value(out, value, shape);
            }
        }
    }
    Err(CodecError::ShapeMismatch {
        expected: "declared union candidate".to_string(),
        found: value.type_name().to_string(),
    })
}

/// `$TypeName` form of a compact record, used in union positions where the
/// bare form would be ambiguous or unreadable.
fn write_compact_explicit(out: &mut String, record: &Record) -> CodecResult<()> {
    let schema = record.schema();
    let field = &schema.fields()[0];
    let value = &record.values()[0];
    out.push('$');
    out.push_str(schema.type_name());
    if let Value::Str(s) = value {
        write_quoted(out, s);
    } else {
        out.push('{');
        write_key(out, field.name());
        out.push(':');
        write_value(out, value, field.shape())?;
        out.push('}');
    }
    Ok(())
}

/// The one-char-tag bare token of a compact record, when that token reads
/// back to this candidate: the full token must scan as one bare string and
/// no candidate declared ahead of this one may claim it first.
fn compact_tag_form(record: &Record, earlier: &[UnionCandidate]) -> Option<String> {
    let schema = record.schema();
    let tag = schema.compact_tag()?;
    let token = bare_token(&record.values()[0])?;
    let mut full = String::with_capacity(tag.len_utf8() + token.len());
    full.push(tag);
    full.push_str(&token);
    match scalar_raw(&full) {
        Some(Raw::Str(s)) if s == full => {}
        _ => return None,
    }
    let captured = earlier.iter().any(|c| match c {
        UnionCandidate::Primitive(FieldShape::Str) => true,
        UnionCandidate::Message(other) => {
            other.is_compact() && other.compact_tag() == Some(tag)
        }
        _ => false,
    });
    if captured {
        None
    } else {
        Some(full)
    }
}

/// The earliest declared compact candidate whose tag char would capture
/// this string on read, if any.
fn capturing_compact(earlier: &[UnionCandidate], s: &str) -> Option<(char, String)> {
    let first = s.chars().next()?;
    earlier.iter().find_map(|c| match c {
        UnionCandidate::Message(schema)
            if schema.is_compact() && schema.compact_tag() == Some(first) =>
        {
            Some((first, schema.type_name().to_string()))
        }
        _ => None,
    })
}

fn mismatch(shape: &FieldShape, value: &Value) -> CodecError {
    CodecError::ShapeMismatch {
        expected: shape.name().to_string(),
        found: value.type_name().to_string(),
    }
}

/// The bare-token rendering of a value, when one exists. Used for the
/// one-char compact tag prefix, which only composes with bare tokens.
fn bare_token(value: &Value) -> Option<String> {
    match value {
        Value::Str(s) if is_bare_safe(s) => Some(s.clone()),
        Value::Int(i) => Some(i.to_string()),
        Value::BigInt(i) => Some(format!("{}n", i)),
        _ => None,
    }
}

/// True when the bare grammar round-trips this exact string.
fn is_bare_safe(s: &str) -> bool {
    if s.is_empty() || s != s.trim() {
        return false;
    }
    matches!(scalar_raw(s), Some(Raw::Str(t)) if t == s)
}

fn float_literal(f: f64) -> CodecResult<String> {
    if !f.is_finite() {
        return Err(CodecError::NonFiniteFloat);
    }
    let mut s = f.to_string();
    // Keep the variant on round trip: a float literal always reads as one
    if !s.contains(['.', 'e', 'E']) {
        s.push_str(".0");
    }
    Ok(s)
}

fn write_key(out: &mut String, name: &str) {
    if is_bare_safe(name) && !name.contains(' ') {
        out.push_str(name);
    } else {
        write_quoted(out, name);
    }
}

fn write_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use cereal_core::{FieldDescriptor, Schema};
    use std::sync::Arc;

    fn positional_point() -> Arc<Schema> {
        Schema::builder("ser_test_Point")
            .field(FieldDescriptor::new("x", FieldShape::Int).tag(1))
            .field(FieldDescriptor::new("y", FieldShape::Int).tag(2))
            .build()
            .unwrap()
    }

    #[test]
    fn positional_type_serializes_as_array() {
        let schema = positional_point();
        let r = Record::new(&schema, [("x", Value::Int(1)), ("y", Value::Int(2))]).unwrap();
        assert_eq!(serialize(&r).unwrap(), ":[1,2]");
    }

    #[test]
    fn keyed_type_serializes_as_object() {
        let schema = Schema::builder("ser_test_Keyed")
            .field(FieldDescriptor::new("name", FieldShape::Str))
            .field(FieldDescriptor::new("note", FieldShape::Str).tag(7))
            .build()
            .unwrap();
        let r = Record::new(
            &schema,
            [("name", Value::from("Ada")), ("note", Value::from("hi"))],
        )
        .unwrap();
        assert_eq!(serialize(&r).unwrap(), ":{name:Ada,7:hi}");
    }

    #[test]
    fn optional_undefined_omitted_in_keyed_mode() {
        let schema = Schema::builder("ser_test_Opt")
            .field(FieldDescriptor::new("a", FieldShape::Int))
            .field(FieldDescriptor::new("b", FieldShape::Str).optional())
            .build()
            .unwrap();
        let r = Record::new(&schema, [("a", Value::Int(1))]).unwrap();
        assert_eq!(serialize(&r).unwrap(), ":{a:1}");
    }

    #[test]
    fn strings_quote_only_when_needed() {
        let schema = Schema::builder("ser_test_Strs")
            .field(FieldDescriptor::new("a", FieldShape::Str))
            .field(FieldDescriptor::new("b", FieldShape::Str))
            .build()
            .unwrap();
        let r = Record::new(
            &schema,
            [
                ("a", Value::from("John Doe")),
                ("b", Value::from("Line\nBreak")),
            ],
        )
        .unwrap();
        assert_eq!(serialize(&r).unwrap(), ":{a:John Doe,b:\"Line\\nBreak\"}");
    }

    #[test]
    fn keywordish_and_numeric_strings_are_quoted() {
        let schema = Schema::builder("ser_test_Quote")
            .field(FieldDescriptor::new("a", FieldShape::Str))
            .field(FieldDescriptor::new("b", FieldShape::Str))
            .build()
            .unwrap();
        let r = Record::new(
            &schema,
            [("a", Value::from("true")), ("b", Value::from("42"))],
        )
        .unwrap();
        assert_eq!(serialize(&r).unwrap(), ":{a:\"true\",b:\"42\"}");
    }

    #[test]
    fn float_literal_keeps_its_variant() {
        assert_eq!(float_literal(10.0).unwrap(), "10.0");
        assert_eq!(float_literal(3.25).unwrap(), "3.25");
        assert!(matches!(
            float_literal(f64::NAN).unwrap_err(),
            CodecError::NonFiniteFloat
        ));
    }

    #[test]
    fn compact_type_serializes_bare() {
        let schema = Schema::builder("ser_test_Label")
            .field(FieldDescriptor::new("text", FieldShape::Str))
            .build()
            .unwrap();
        let r = Record::new(&schema, [("text", Value::from("hello"))]).unwrap();
        assert_eq!(serialize(&r).unwrap(), ":hello");
    }

    #[test]
    fn serialization_is_idempotent() {
        let schema = positional_point();
        let r = Record::new(&schema, [("x", Value::Int(5)), ("y", Value::Int(6))]).unwrap();
        assert_eq!(serialize(&r).unwrap(), serialize(&r).unwrap());
    }
}
