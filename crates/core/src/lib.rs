//! Core types for cereal message records
//!
//! This crate defines the foundational pieces of the record system:
//! - Value: unified enum for every value a field can hold
//! - TypeToken: process-wide-unique identity for a message type
//! - Schema: the field descriptor table consumed from a schema compiler
//! - FieldDescriptor / FieldShape: per-field metadata and shape checks
//! - Record: immutable, schema-typed value instance
//! - Error: error type hierarchy
//!
//! Records are immutable: every field "set" allocates a new record. The
//! per-instance listener slots consumed by `cereal-reactive` are the only
//! interior mutability, and they never participate in equality or hashing.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod record;
pub mod schema;
pub mod token;
pub mod value;

pub use error::{Error, Result, SchemaError, ValidationError};
pub use record::{FieldUpdate, Listener, Record};
pub use schema::{FieldDescriptor, FieldShape, Schema, SchemaBuilder, UnionCandidate, WireMode};
pub use token::TypeToken;
pub use value::Value;
