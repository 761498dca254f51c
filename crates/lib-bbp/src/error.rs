//! Error types for reading and writing BBP files.

use lib_types::time::TimeParseError;
use thiserror::Error;

/// Errors that can occur while reading or writing a BBP file.
#[derive(Debug, Error)]
pub enum ParseError {
    /// I/O error reading or writing the file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed data line.
    #[error("Syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// Invalid value for a field.
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    /// File is readable but not a usable seismogram.
    #[error("Invalid BBP format: {0}")]
    InvalidFormat(String),
}

impl ParseError {
    /// Create a syntax error at a specific line (1-based).
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }

    /// Create an invalid value error.
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<TimeParseError> for ParseError {
    fn from(err: TimeParseError) -> Self {
        ParseError::invalid_value("time", err.to_string())
    }
}
