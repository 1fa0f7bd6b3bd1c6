//! Error taxonomy (spec §7).

use thiserror::Error;

/// Errors raised while splitting a byte stream into logical lines (spec §4.1).
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum FramingError {
    #[error("logical line exceeds the {max} character ceiling")]
    LineTooLong { max: usize },

    #[error("continuation line was followed by end of stream")]
    InvalidContinuation,

    #[error("line is not valid UTF-8")]
    InvalidUtf8,
}

/// Errors raised while parsing a recognized command's headers/body (spec §7,
/// "ProtocolParse").
///
/// Unrecognized verbs are not a member of this enum: `Verb::from` never
/// fails (unknown tokens become `Verb::Unknown`), so rejecting them is a
/// dispatch-level concern, not a parse failure (spec §4.2).
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ProtocolParseError {
    #[error("malformed command id prefix")]
    MalformedId,

    #[error("`WRITE` is missing its required `text` header")]
    MissingBody,

    #[error("{0}")]
    Detail(String),
}
