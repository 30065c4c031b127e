//! Codec error types
//!
//! Grammar violations are unrecoverable for the call that hit them: the
//! parser raises immediately with a character position and returns no
//! partial tree. Reconstruction failures name the first offending field.

use thiserror::Error;

/// Result type alias for codec operations
pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// Errors raised while scanning cereal text. Positions are character
/// offsets into the input.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Input did not start with the `:` sentinel
    #[error("missing `:` sentinel at start of input")]
    MissingSentinel,

    /// Nothing after the sentinel
    #[error("unexpected end of input")]
    UnexpectedEnd,

    /// A quoted string never closed
    #[error("unterminated string starting at position {0}")]
    UnterminatedString(usize),

    /// An object never closed
    #[error("unterminated object starting at position {0}")]
    UnterminatedObject(usize),

    /// An array never closed
    #[error("unterminated array starting at position {0}")]
    UnterminatedArray(usize),

    /// Key present but no `:` before the value
    #[error("missing `:` between key and value at position {0}")]
    MissingColon(usize),

    /// Two entries without a separating comma
    #[error("missing `,` between entries at position {0}")]
    MissingComma(usize),

    /// Input continues after a complete value
    #[error("trailing characters after value at position {0}")]
    TrailingCharacters(usize),

    /// `$` with no type name
    #[error("empty type tag at position {0}")]
    EmptyTag(usize),

    /// `$Tag` with no following body
    #[error("incomplete tag `{1}` with no following data at position {0}")]
    IncompleteTag(usize, String),

    /// Unsupported escape sequence in a quoted string
    #[error("invalid escape `\\{1}` at position {0}")]
    InvalidEscape(usize, char),

    /// An object key that is neither a string nor a non-negative integer
    #[error("invalid object key at position {0}")]
    BadKey(usize),

    /// The same explicit or implicit key appeared twice
    #[error("duplicate object key `{1}` at position {0}")]
    DuplicateKey(usize, String),

    /// A character that cannot start or continue any literal form
    #[error("unexpected character `{1}` at position {0}")]
    UnexpectedChar(usize, char),

    /// A token that fits no literal form
    #[error("invalid literal `{1}` at position {0}")]
    InvalidLiteral(usize, String),

    /// Digits that parse as neither integer, float, nor bigint
    #[error("invalid number `{1}` at position {0}")]
    InvalidNumber(usize, String),

    /// A `D"..."` body that is not ISO-8601
    #[error("invalid date literal `{1}` at position {0}")]
    InvalidDate(usize, String),

    /// A `U"..."` body that is not a valid URL
    #[error("invalid URL literal `{1}` at position {0}")]
    InvalidUrl(usize, String),

    /// A `B"..."` body that is not valid base64
    #[error("invalid base64 literal at position {0}")]
    InvalidBase64(usize),

    /// An `M[...]` element that is not a two-element pair
    #[error("malformed map entry at position {0}: expected [key,value] pair")]
    MalformedMapEntry(usize),
}

/// Errors raised by serialization, reconstruction, and union resolution.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Grammar violation
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Record-construction failure surfaced through the codec
    #[error(transparent)]
    Validation(#[from] cereal_core::ValidationError),

    /// A required field had no entry
    #[error("missing required field `{field}` of `{type_name}`")]
    MissingField {
        /// Type being reconstructed
        type_name: String,
        /// First missing field
        field: String,
    },

    /// An entry failed its field's coercion or shape check
    #[error("invalid field `{field}` of `{type_name}`: {reason}")]
    InvalidField {
        /// Type being reconstructed
        type_name: String,
        /// First invalid field
        field: String,
        /// Mismatch description
        reason: String,
    },

    /// A name key matching no descriptor
    #[error("unknown field `{key}` for type `{type_name}`")]
    UnknownField {
        /// Type being reconstructed
        type_name: String,
        /// Offending key
        key: String,
    },

    /// An integer key matching no descriptor
    #[error("unknown field tag {tag} for type `{type_name}`")]
    UnknownFieldTag {
        /// Type being reconstructed
        type_name: String,
        /// Offending tag
        tag: u32,
    },

    /// Two wire entries (e.g. a tag key and a name key) addressed the same
    /// field
    #[error("field `{field}` of `{type_name}` was given more than once")]
    DuplicateEntry {
        /// Type being reconstructed
        type_name: String,
        /// Field addressed twice
        field: String,
    },

    /// A positional array longer than the field list
    #[error("positional value has {given} entries but type `{type_name}` has {expected} fields")]
    PositionalOverflow {
        /// Type being reconstructed
        type_name: String,
        /// Entries on the wire
        given: usize,
        /// Fields in the descriptor table
        expected: usize,
    },

    /// `$Tag` named a type other than the one expected
    #[error("unexpected type tag `{tag}` where `{expected}` was expected")]
    UnexpectedTag {
        /// Tag on the wire
        tag: String,
        /// Expected type name
        expected: String,
    },

    /// `$Tag` named no declared union candidate
    #[error("unknown union tag `{tag}`; declared candidates: {candidates}")]
    UnknownUnionTag {
        /// Tag on the wire
        tag: String,
        /// Comma-joined candidate names
        candidates: String,
    },

    /// No candidate reconstructed an untagged union value
    #[error("no union candidate matched {found}; tried: {tried}")]
    NoUnionCandidate {
        /// Shape of the raw value
        found: String,
        /// Comma-joined candidates tried
        tried: String,
    },

    /// An untagged primitive type-matched more than one declared candidate
    #[error("ambiguous untagged union value; matching candidates: {matches}")]
    AmbiguousUnion {
        /// Comma-joined matching candidates
        matches: String,
    },

    /// Serializing a required field holding `Undefined`
    #[error("required field `{field}` of `{type_name}` is undefined")]
    UndefinedRequired {
        /// Type being serialized
        type_name: String,
        /// Offending field
        field: String,
    },

    /// A plain string union value that would read back as a compact-tagged
    /// candidate declared ahead of the string candidate
    #[error(
        "cannot serialize string beginning with `{tag}`: it is indistinguishable from compact candidate `{candidate}`"
    )]
    CompactTagCollision {
        /// The colliding compact tag character
        tag: char,
        /// The compact candidate that would capture the string on read
        candidate: String,
    },

    /// NaN and infinities have no literal form
    #[error("non-finite float cannot be serialized")]
    NonFiniteFloat,

    /// A value that does not fit the declared field shape at serialize time
    #[error("cannot serialize {found} where {expected} was declared")]
    ShapeMismatch {
        /// Declared shape
        expected: String,
        /// Runtime value kind
        found: String,
    },
}
