//! Raw parsed value trees
//!
//! The parser knows nothing about schemas: it turns cereal text into `Raw`
//! trees, and entry reconstruction (`de`) turns those into typed records.
//! Objects keep their keys as parsed (`Tag` for integer keys, `Name` for
//! string keys) so reconstruction can accept both positional and keyed
//! forms for any type.

use chrono::{DateTime, Utc};
use url::Url;

/// One object key as it appeared on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryKey {
    /// Integer key (explicit or implicit field tag)
    Tag(u32),
    /// String key (field name)
    Name(String),
}

impl std::fmt::Display for EntryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKey::Tag(t) => write!(f, "{}", t),
            EntryKey::Name(n) => write!(f, "{}", n),
        }
    }
}

/// An untyped parsed cereal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Raw {
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// `true` / `false`
    Bool(bool),
    /// Integer literal
    Int(i64),
    /// Real literal
    Float(f64),
    /// `123n` literal
    BigInt(i128),
    /// Bare or quoted string
    Str(String),
    /// `D"..."` literal
    Date(DateTime<Utc>),
    /// `U"..."` literal
    Url(Url),
    /// `B"..."` literal
    Bytes(Vec<u8>),
    /// `[v,v,...]`: positional field values or a plain list
    Seq(Vec<Raw>),
    /// `M[[k,v],...]` literal
    MapLit(Vec<(Raw, Raw)>),
    /// `S[v,...]` literal
    SetLit(Vec<Raw>),
    /// `{k:v,...}` with implicit keys already assigned
    Entries(Vec<(EntryKey, Raw)>),
    /// `$TypeName{...}` / `$TypeName"..."`
    Tagged {
        /// The explicit type tag
        tag: String,
        /// The tagged body
        body: Box<Raw>,
    },
}

impl Raw {
    /// Variant name for shape-mismatch messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Raw::Undefined => "undefined",
            Raw::Null => "null",
            Raw::Bool(_) => "bool",
            Raw::Int(_) => "integer",
            Raw::Float(_) => "float",
            Raw::BigInt(_) => "bigint",
            Raw::Str(_) => "string",
            Raw::Date(_) => "date",
            Raw::Url(_) => "url",
            Raw::Bytes(_) => "bytes",
            Raw::Seq(_) => "array",
            Raw::MapLit(_) => "map",
            Raw::SetLit(_) => "set",
            Raw::Entries(_) => "object",
            Raw::Tagged { .. } => "tagged value",
        }
    }

    /// True for object- or array-shaped values (candidates for entry
    /// reconstruction).
    pub fn is_object_shaped(&self) -> bool {
        matches!(self, Raw::Entries(_) | Raw::Seq(_))
    }
}
