//! Union resolution
//!
//! A union-typed field declares an ordered, closed candidate list. On the
//! wire the variant is disambiguated either explicitly (`$TypeName`) or
//! implicitly (the first candidate whose entry reconstruction succeeds).
//! Candidates are tried as ordered fallible attempts composed by first
//! success; declaration order is the entire ambiguity policy, and a value
//! nothing reconstructs fails hard rather than guessing.

use cereal_core::{FieldShape, UnionCandidate, Value};

use crate::de;
use crate::error::{CodecError, CodecResult};
use crate::parse::scalar_raw;
use crate::raw::Raw;

/// Resolve a raw value against a union's declared candidates.
pub fn resolve(candidates: &[UnionCandidate], raw: &Raw) -> CodecResult<Value> {
    // 1. Explicit tag: must name a declared candidate, no fallback.
    if let Raw::Tagged { tag, .. } = raw {
        for candidate in candidates {
            if let UnionCandidate::Message(schema) = candidate {
                if schema.type_name() == tag {
                    return de::reconstruct(schema, raw).map(Value::Record);
                }
            }
        }
        return Err(CodecError::UnknownUnionTag {
            tag: tag.clone(),
            candidates: message_names(candidates),
        });
    }

    // 2. Untagged object shape: try message candidates in declaration order.
    if raw.is_object_shaped() {
        for candidate in candidates {
            if let UnionCandidate::Message(schema) = candidate {
                match de::reconstruct(schema, raw) {
                    Ok(record) => return Ok(Value::Record(record)),
                    Err(err) => {
                        tracing::trace!(
                            target: "cereal::codec",
                            candidate = schema.type_name(),
                            error = %err,
                            "union candidate did not reconstruct"
                        );
                    }
                }
            }
        }
        return Err(CodecError::NoUnionCandidate {
            found: raw.kind().to_string(),
            tried: message_names(candidates),
        });
    }

    // 3a. Strings resolve in declaration order, because both a string
    // candidate and a compact tag char can claim the same token: the first
    // candidate that is either an exact string match or a compact type
    // whose tag char prefixes the token wins. The serializer refuses to
    // emit strings an earlier compact candidate would capture.
    if let Raw::Str(s) = raw {
        for candidate in candidates {
            match candidate {
                UnionCandidate::Primitive(shape) if primitive_matches(shape, raw) => {
                    return de::coerce(shape, raw);
                }
                UnionCandidate::Message(schema) if schema.is_compact() => {
                    if let Some(tag) = schema.compact_tag() {
                        if s.starts_with(tag) {
                            let rest = &s[tag.len_utf8()..];
                            let inner = scalar_raw(rest)
                                .unwrap_or_else(|| Raw::Str(rest.to_string()));
                            return de::reconstruct(schema, &inner).map(Value::Record);
                        }
                    }
                }
                _ => {}
            }
        }
        return Err(CodecError::NoUnionCandidate {
            found: raw.kind().to_string(),
            tried: all_names(candidates),
        });
    }

    // 3b. Other untagged primitive shapes: exact type match against the
    // declared non-message candidates, no coercion.
    let mut matched: Vec<&FieldShape> = Vec::new();
    for candidate in candidates {
        if let UnionCandidate::Primitive(shape) = candidate {
            if primitive_matches(shape, raw) {
                matched.push(shape);
            }
        }
    }
    match matched.len() {
        // Exact match established, so coercion below is a no-op cast
        1 => de::coerce(matched[0], raw),
        0 => Err(CodecError::NoUnionCandidate {
            found: raw.kind().to_string(),
            tried: all_names(candidates),
        }),
        _ => Err(CodecError::AmbiguousUnion {
            matches: matched.iter().map(|s| s.name()).collect::<Vec<_>>().join(", "),
        }),
    }
}

/// Exact, coercion-free type test for step 3.
fn primitive_matches(shape: &FieldShape, raw: &Raw) -> bool {
    matches!(
        (shape, raw),
        (FieldShape::Bool, Raw::Bool(_))
            | (FieldShape::Int, Raw::Int(_))
            | (FieldShape::Float, Raw::Float(_))
            | (FieldShape::BigInt, Raw::BigInt(_))
            | (FieldShape::Str, Raw::Str(_))
            | (FieldShape::Date, Raw::Date(_))
            | (FieldShape::Url, Raw::Url(_))
            | (FieldShape::Bytes, Raw::Bytes(_))
            | (FieldShape::List(_), Raw::Seq(_))
            | (FieldShape::Map(_, _), Raw::MapLit(_))
            | (FieldShape::Set(_), Raw::SetLit(_))
    )
}

fn message_names(candidates: &[UnionCandidate]) -> String {
    candidates
        .iter()
        .filter_map(|c| match c {
            UnionCandidate::Message(s) => Some(s.type_name().to_string()),
            UnionCandidate::Primitive(_) => None,
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn all_names(candidates: &[UnionCandidate]) -> String {
    candidates
        .iter()
        .map(|c| match c {
            UnionCandidate::Message(s) => s.type_name().to_string(),
            UnionCandidate::Primitive(shape) => shape.name().to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::de::deserialize;
    use cereal_core::{FieldDescriptor, Record, Schema};
    use std::sync::Arc;

    fn user_schema() -> Arc<Schema> {
        Schema::builder("union_test_User")
            .field(FieldDescriptor::new("id", FieldShape::Int))
            .build()
            .unwrap()
    }

    fn group_schema() -> Arc<Schema> {
        Schema::builder("union_test_Group")
            .field(FieldDescriptor::new("members", FieldShape::Int))
            .build()
            .unwrap()
    }

    /// Holder with `who: union_test_User | union_test_Group | Int`
    fn holder_schema() -> Arc<Schema> {
        Schema::builder("union_test_Holder")
            .field(FieldDescriptor::new(
                "who",
                FieldShape::Union(vec![
                    UnionCandidate::Message(user_schema()),
                    UnionCandidate::Message(group_schema()),
                    UnionCandidate::Primitive(FieldShape::Int),
                ]),
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn explicit_tag_selects_candidate() {
        let r = deserialize(":{who:$union_test_Group{members:3}}", &holder_schema()).unwrap();
        let who = r.get("who").unwrap().as_record().unwrap();
        assert_eq!(who.type_name(), "union_test_Group");
    }

    #[test]
    fn unknown_explicit_tag_is_hard_error() {
        let err =
            deserialize(":{who:$Nope{members:3}}", &holder_schema()).unwrap_err();
        assert!(err.to_string().contains("unknown union tag"));
    }

    #[test]
    fn untagged_object_resolves_in_declaration_order() {
        let r = deserialize(":{who:{id:7}}", &holder_schema()).unwrap();
        let who = r.get("who").unwrap().as_record().unwrap();
        assert_eq!(who.type_name(), "union_test_User");

        let r = deserialize(":{who:{members:2}}", &holder_schema()).unwrap();
        let who = r.get("who").unwrap().as_record().unwrap();
        assert_eq!(who.type_name(), "union_test_Group");
    }

    #[test]
    fn untagged_object_matching_nothing_fails_hard() {
        let err = deserialize(":{who:{zzz:1}}", &holder_schema()).unwrap_err();
        assert!(matches!(err, CodecError::NoUnionCandidate { .. }));
    }

    #[test]
    fn untagged_primitive_exact_match() {
        let r = deserialize(":{who:42}", &holder_schema()).unwrap();
        assert_eq!(r.get("who"), Some(&Value::Int(42)));
    }

    #[test]
    fn untagged_primitive_without_candidate_fails() {
        // No Float candidate declared; no coercion is attempted
        let err = deserialize(":{who:4.5}", &holder_schema()).unwrap_err();
        assert!(matches!(
            err,
            CodecError::InvalidField { .. } | CodecError::NoUnionCandidate { .. }
        ));
    }

    /// Compact type `union_test_Label{text: Str}` with tag char `k`
    fn label_schema() -> Arc<Schema> {
        Schema::builder("union_test_Label")
            .field(FieldDescriptor::new("text", FieldShape::Str))
            .compact_tag('k')
            .build()
            .unwrap()
    }

    #[test]
    fn compact_tag_char_routes_to_compact_candidate() {
        let holder = Schema::builder("union_test_TagHolder")
            .field(FieldDescriptor::new(
                "v",
                FieldShape::Union(vec![UnionCandidate::Message(label_schema())]),
            ))
            .build()
            .unwrap();
        let r = deserialize(":{v:khello}", &holder).unwrap();
        let v = r.get("v").unwrap().as_record().unwrap();
        assert_eq!(v.get("text"), Some(&Value::from("hello")));
    }

    #[test]
    fn string_declared_before_compact_candidate_keeps_colliding_strings() {
        let holder = Schema::builder("union_test_StrFirst")
            .field(FieldDescriptor::new(
                "v",
                FieldShape::Union(vec![
                    UnionCandidate::Primitive(FieldShape::Str),
                    UnionCandidate::Message(label_schema()),
                ]),
            ))
            .build()
            .unwrap();
        // "kite" begins with the label's tag char but the string candidate
        // is declared first, so it must come back as the same string
        let r = Record::new(&holder, [("v", Value::from("kite"))]).unwrap();
        let text = crate::ser::serialize(&r).unwrap();
        assert_eq!(text, ":{v:kite}");
        assert_eq!(deserialize(&text, &holder).unwrap(), r);
    }

    #[test]
    fn compact_value_behind_string_candidate_uses_explicit_tag() {
        let holder = Schema::builder("union_test_StrFirst")
            .field(FieldDescriptor::new(
                "v",
                FieldShape::Union(vec![
                    UnionCandidate::Primitive(FieldShape::Str),
                    UnionCandidate::Message(label_schema()),
                ]),
            ))
            .build()
            .unwrap();
        // The tag-char form `kite` would resolve to the string candidate,
        // so the label serializes with its explicit type tag instead
        let label = Record::new(&label_schema(), [("text", Value::from("ite"))]).unwrap();
        let r = Record::new(&holder, [("v", Value::Record(label))]).unwrap();
        let text = crate::ser::serialize(&r).unwrap();
        assert_eq!(text, ":{v:$union_test_Label\"ite\"}");
        assert_eq!(deserialize(&text, &holder).unwrap(), r);
    }

    #[test]
    fn colliding_string_behind_compact_candidate_is_a_serialize_error() {
        let holder = Schema::builder("union_test_CompactFirst")
            .field(FieldDescriptor::new(
                "v",
                FieldShape::Union(vec![
                    UnionCandidate::Message(label_schema()),
                    UnionCandidate::Primitive(FieldShape::Str),
                ]),
            ))
            .build()
            .unwrap();
        // No wire form of "kite" (bare or quoted) can avoid reading back as
        // the label, so serialization refuses rather than misroute
        let r = Record::new(&holder, [("v", Value::from("kite"))]).unwrap();
        let err = crate::ser::serialize(&r).unwrap_err();
        assert!(matches!(err, CodecError::CompactTagCollision { tag: 'k', .. }));

        // Non-colliding strings still pass through the string candidate
        let r = Record::new(&holder, [("v", Value::from("hello"))]).unwrap();
        let text = crate::ser::serialize(&r).unwrap();
        assert_eq!(text, ":{v:hello}");
        assert_eq!(deserialize(&text, &holder).unwrap(), r);
    }

    #[test]
    fn round_trip_through_union_keeps_variant() {
        let holder = holder_schema();
        let group =
            Record::new(&group_schema(), [("members", Value::Int(9))]).unwrap();
        let r = Record::new(&holder, [("who", Value::Record(group))]).unwrap();
        let text = crate::ser::serialize(&r).unwrap();
        assert!(text.contains("$union_test_Group"));
        let back = deserialize(&text, &holder).unwrap();
        assert_eq!(back, r);
    }
}
