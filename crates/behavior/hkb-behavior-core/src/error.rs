//! Error taxonomy shared by every module of the core.

use thiserror::Error;

use crate::value::ValueKind;

/// What a failed lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Type,
    Object,
    Variable,
    Event,
    Animation,
}

impl std::fmt::Display for LookupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LookupKind::Type => "type",
            LookupKind::Object => "object",
            LookupKind::Variable => "variable",
            LookupKind::Event => "event",
            LookupKind::Animation => "animation",
        };
        f.write_str(s)
    }
}

/// A query string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("query parse error at offset {offset}: {message}")]
pub struct QueryParseError {
    /// Byte offset into the query text where parsing failed.
    pub offset: usize,
    pub message: String,
}

impl QueryParseError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum BehaviorError {
    /// A type, object or named table entry does not exist. Recoverable.
    #[error("{kind} not found: {key}")]
    LookupMiss { kind: LookupKind, key: String },

    /// The value could not be coerced into the field's declared kind.
    #[error("type mismatch at '{path}': expected {expected:?}, got {found}")]
    TypeMismatch {
        path: String,
        expected: ValueKind,
        found: String,
    },

    /// A path segment names a field the record does not have.
    #[error("unknown field '{path}'")]
    UnknownField { path: String },

    #[error("invalid field path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("index {index} out of range for '{path}' (len {len})")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("object id already in use: {0}")]
    DuplicateId(String),

    /// The id counter for a prefix ran out of numbers.
    #[error("no ids left for prefix '{0}'")]
    IdsExhausted(String),

    #[error("query failed: {0}")]
    Query(#[from] QueryParseError),

    /// The backing document is malformed.
    #[error("xml error: {0}")]
    Xml(String),

    #[error("undo error: {0}")]
    Undo(String),

    #[error("io error: {0}")]
    Io(String),
}

impl BehaviorError {
    pub fn lookup(kind: LookupKind, key: impl Into<String>) -> Self {
        BehaviorError::LookupMiss {
            kind,
            key: key.into(),
        }
    }

    pub fn unknown_field(path: impl Into<String>) -> Self {
        BehaviorError::UnknownField { path: path.into() }
    }

    /// Lookup misses are expected while editing evolving assets; callers
    /// usually fall back to a default instead of aborting.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BehaviorError::LookupMiss { .. })
    }
}

impl From<std::io::Error> for BehaviorError {
    fn from(err: std::io::Error) -> Self {
        BehaviorError::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BehaviorError>;
