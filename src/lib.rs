//! # cereal
//!
//! Schema-typed immutable message records with a compact text wire format
//! and chained update propagation.
//!
//! The workspace splits into three crates, re-exported here as a single
//! surface:
//!
//! - `cereal-core`: values, field descriptor tables, and immutable
//!   [`Record`] instances with per-key listener slots
//! - `cereal-codec`: the text wire format ([`serialize`] /
//!   [`deserialize`]) and union resolution
//! - `cereal-reactive`: [`Subscription`], which chains node replacements
//!   upward so a set anywhere in a nested tree yields a new root
//!
//! ## Quick start
//!
//! ```
//! use cereal::{FieldDescriptor, FieldShape, Record, Schema, Value};
//!
//! let schema = Schema::builder("Point")
//!     .field(FieldDescriptor::new("x", FieldShape::Int).tag(1))
//!     .field(FieldDescriptor::new("y", FieldShape::Int).tag(2))
//!     .build()?;
//!
//! let p = Record::new(&schema, [("x", Value::Int(3)), ("y", Value::Int(4))])?;
//! let text = cereal::serialize(&p)?;
//! assert_eq!(text, ":[3,4]");
//!
//! let back = cereal::deserialize(&text, &schema)?;
//! assert_eq!(back, p);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use cereal_core::{
    Error, FieldDescriptor, FieldShape, FieldUpdate, Listener, Record, Result,
    Schema, SchemaBuilder, SchemaError, TypeToken, UnionCandidate,
    ValidationError, Value, WireMode,
};

pub use cereal_codec::{
    deserialize, parse_document, serialize, CodecError, CodecResult, EntryKey,
    ParseError, Raw,
};

pub use cereal_reactive::Subscription;
