//! Error types for address and ID parsing.

use thiserror::Error;

/// Errors that can occur when parsing or validating addresses and IDs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input string is empty.
    #[error("address cannot be empty")]
    Empty,

    /// The input is not valid base58.
    #[error("invalid base58 address '{input}': {reason}")]
    InvalidBase58 { input: String, reason: String },

    /// The input decodes to the wrong number of bytes.
    #[error("address '{input}' decodes to {actual} bytes, expected {expected}")]
    InvalidLength {
        input: String,
        expected: usize,
        actual: usize,
    },

    /// The ID is missing the underscore separator.
    #[error("ID missing underscore separator")]
    MissingSeparator,

    /// The ID has an invalid prefix.
    #[error("invalid ID prefix: expected '{expected}', got '{actual}'")]
    InvalidPrefix {
        expected: &'static str,
        actual: String,
    },

    /// The ULID portion of the ID is invalid.
    #[error("invalid ULID: {0}")]
    InvalidUlid(String),
}

impl IdError {
    /// Returns true if this error indicates the input was empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, IdError::Empty)
    }

    /// Returns true if the input was not a well-formed base58 address.
    pub fn is_encoding_error(&self) -> bool {
        matches!(
            self,
            IdError::InvalidBase58 { .. } | IdError::InvalidLength { .. }
        )
    }
}
