use serde_json::Value;
use thiserror::Error;

use crate::expr::ParseError;

/// Longest rendering of an offending value kept in an error message.
const MAX_DESCRIBED_LEN: usize = 200;

/// Malformed mapping specification or run configuration. Always surfaced
/// before the first fetch.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("mapping declares no fields and does not pass unmapped fields through")]
    EmptyMapping,
    #[error("field `{source_field}`: destination `{destination}` is not a valid field name")]
    InvalidDestination {
        source_field: String,
        destination: String,
    },
    #[error("destination `{0}` is mapped more than once")]
    DuplicateDestination(String),
    #[error("destination `{0}` collides with a reserved field")]
    ReservedDestination(String),
    #[error("field `{source_field}`: invalid enum pattern `{pattern}`: {source}")]
    InvalidPattern {
        source_field: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("{context}: {source}")]
    InvalidExpression {
        context: String,
        #[source]
        source: ParseError,
    },
    #[error("body field `{0}` must be mapped with kind string or richtext")]
    InvalidBody(String),
    #[error("field `{0}`: image embed rule has an empty base url")]
    EmptyEmbedBase(String),
    #[error("field `{field}`: file name field `{name}` is not mapped")]
    UnknownFileNameField { field: String, name: String },
    #[error("fields `{first}` and `{second}` both name downloaded images after `{name}`")]
    SharedFileNameField {
        first: String,
        second: String,
        name: String,
    },
    #[error("failed to read configuration {path}: {message}")]
    Read { path: String, message: String },
    #[error("failed to parse configuration {path}: {message}")]
    Parse { path: String, message: String },
    #[error("unsupported configuration format for {0} (expected .ron or .json)")]
    UnsupportedFormat(String),
}

/// Failure while evaluating a transform expression or locating records in a
/// page payload.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransformError {
    #[error("expression `{expression}` failed on {value}: {message}")]
    Evaluation {
        expression: String,
        value: String,
        message: String,
    },
    #[error("path segment `{segment}` does not exist in {value}")]
    MissingSegment { segment: String, value: String },
    #[error("expected an array of records, got {value}")]
    NotAnArray { value: String },
}

/// A record could not be mapped. Fatal for the run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MappingError {
    #[error("record is not an object: {value}")]
    NotAnObject { value: String },
    #[error("field `{source_field}` -> `{destination}` ({kind}): invalid identifier {value:?}")]
    InvalidIdentifier {
        source_field: String,
        destination: String,
        kind: &'static str,
        value: String,
    },
    #[error("field `{source_field}` -> `{destination}` ({kind}): expected {expected}, found {found}")]
    TypeMismatch {
        source_field: String,
        destination: String,
        kind: &'static str,
        expected: &'static str,
        found: String,
    },
    #[error("field `{source_field}` -> `{destination}`: {source}")]
    Transform {
        source_field: String,
        destination: String,
        #[source]
        source: TransformError,
    },
}

impl MappingError {
    /// Destination field the error refers to.
    pub fn destination(&self) -> Option<&str> {
        match self {
            MappingError::NotAnObject { .. } => None,
            MappingError::InvalidIdentifier { destination, .. }
            | MappingError::TypeMismatch { destination, .. }
            | MappingError::Transform { destination, .. } => Some(destination),
        }
    }
}

/// Serializes `value` for diagnostics, truncated to a readable length.
pub(crate) fn describe(value: &Value) -> String {
    let mut text = value.to_string();
    if text.len() > MAX_DESCRIBED_LEN {
        let mut end = MAX_DESCRIBED_LEN;
        while end > 0 && !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
        text.push_str("...");
    }
    text
}
