//! Small validated string types used throughout the wire protocol.
//!
//! These mirror the role of `imap-types`'s `Atom`/`Tag` family: thin
//! newtypes that make it impossible to construct a protocol value which
//! violates its own framing rules.

use std::fmt;

use crate::error::ValidationError;

const MAX_COMMAND_ID_LEN: usize = 16;

fn is_id_char(b: u8) -> bool {
    b.is_ascii_alphanumeric()
}

/// A command correlation id: a short alphanumeric string, unique within an
/// in-flight window. The empty id is reserved for server-originated lines
/// that are not command responses (see [`CommandId::empty`]).
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct CommandId(String);

impl CommandId {
    /// The reserved empty id used by lines that do not correlate to a
    /// client-issued command.
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn verify(value: &str) -> Result<(), ValidationError> {
        if value.len() > MAX_COMMAND_ID_LEN {
            return Err(ValidationError::TooLong {
                max: MAX_COMMAND_ID_LEN,
            });
        }

        if let Some(at) = value.bytes().position(|b| !is_id_char(b)) {
            return Err(ValidationError::InvalidByteAt {
                byte: value.as_bytes()[at],
                at,
            });
        }

        Ok(())
    }
}

impl TryFrom<&str> for CommandId {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // The empty id is valid (it is the reserved "no id" marker); all
        // other ids must pass `verify`.
        if !value.is_empty() {
            Self::verify(value)?;
        }
        Ok(Self(value.to_owned()))
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A protocol verb. Recognized verbs are named variants; anything else is
/// preserved verbatim so the channel can still reply `NOK (unknown_verb)`
/// without dropping the connection (§4.2).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Verb {
    Hello,
    Info,
    Set,
    Write,
    Heartbeat,
    ClearLogViewer,
    SaveSnapshot,
    Unknown(String),
}

impl Verb {
    pub fn as_str(&self) -> &str {
        match self {
            Verb::Hello => "HELLO",
            Verb::Info => "INFO",
            Verb::Set => "SET",
            Verb::Write => "WRITE",
            Verb::Heartbeat => "HEARTBEAT",
            Verb::ClearLogViewer => "CLEAR_LOG_VIEWER",
            Verb::SaveSnapshot => "SAVE_SNAPSHOT",
            Verb::Unknown(raw) => raw,
        }
    }
}

impl From<&str> for Verb {
    fn from(value: &str) -> Self {
        match value {
            "HELLO" => Verb::Hello,
            "INFO" => Verb::Info,
            "SET" => Verb::Set,
            "WRITE" => Verb::Write,
            "HEARTBEAT" => Verb::Heartbeat,
            "CLEAR_LOG_VIEWER" => Verb::ClearLogViewer,
            "SAVE_SNAPSHOT" => Verb::SaveSnapshot,
            other => Verb::Unknown(other.to_owned()),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
