//! The cereal wire format
//!
//! A compact, round-trippable, human-inspectable text serialization for
//! schema-typed message records. Two entry points:
//! - [`serialize`]: record to text
//! - [`deserialize`]: text plus a field descriptor table to record
//!
//! The grammar lives in [`parse`], wire emission in [`ser`], typed entry
//! reconstruction in [`de`], and polymorphic-union resolution in [`union`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod de;
pub mod error;
pub mod parse;
pub mod raw;
pub mod ser;
pub mod union;

pub use de::{deserialize, reconstruct};
pub use error::{CodecError, CodecResult, ParseError};
pub use parse::parse_document;
pub use raw::{EntryKey, Raw};
pub use ser::serialize;
