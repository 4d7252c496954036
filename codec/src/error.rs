//! Error types for codec operations

use crate::dict::TypeKind;
use thiserror::Error;

/// Error type for codec operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("unexpected end of buffer")]
    EndOfBuffer,
    #[error("extra data found: {0} bytes")]
    ExtraData(usize),
    #[error("invalid bool")]
    InvalidBool,
    #[error("invalid enum value for {0}: {1}")]
    InvalidEnum(&'static str, u32), // type, raw value
    #[error("invalid utf-8")]
    InvalidUtf8,
    #[error("invalid length: {0}")]
    InvalidLength(usize),
    #[error("corrupted stream: {0}")]
    Corrupted(&'static str),
    #[error("invalid data in {0}: {1}")]
    InvalidData(String, String), // context, message
    #[error("missing key: {0}")]
    MissingKey(String),
    #[error("unexpected kind: expected {expected}, found {found}")]
    UnexpectedKind { expected: TypeKind, found: TypeKind },
    #[error("unknown type: {0}")]
    UnknownType(String),
    #[error("key cannot be transformed: {0}")]
    InvalidKey(String),
    #[error("json error at line {line}, column {column}: {message}")]
    Json {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            return Self::Io(err.into());
        }
        Self::Json {
            line: err.line(),
            column: err.column(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_error_position() {
        let err = serde_json::from_str::<serde_json::Value>("{\n  \"a\": ,\n}").unwrap_err();
        match Error::from(err) {
            Error::Json { line, column, .. } => {
                assert_eq!(line, 2);
                assert!(column > 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_display() {
        let err = Error::UnexpectedKind {
            expected: TypeKind::Array,
            found: TypeKind::Null,
        };
        assert_eq!(err.to_string(), "unexpected kind: expected array, found null");
    }
}
