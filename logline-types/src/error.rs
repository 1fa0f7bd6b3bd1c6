//! Validation errors shared by the small string types in [`crate::core`].

use thiserror::Error;

/// A validation error raised while constructing a validated value
/// (a [`crate::core::CommandId`], a [`crate::core::Verb`], ...).
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ValidationError {
    #[error("must not be empty")]
    Empty,

    #[error("exceeds maximum length of {max} bytes")]
    TooLong { max: usize },

    #[error("invalid byte b'\\x{byte:02x}' at index {at}")]
    InvalidByteAt { byte: u8, at: usize },
}
