//! The protocol-level [`Command`] record (spec §3, §4.2).

use crate::core::{CommandId, Verb};

/// One `key: value` header line. Keys are case-sensitive.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Header {
    pub key: String,
    pub value: String,
}

impl Header {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A parsed or to-be-encoded protocol command.
///
/// `headers` preserves wire order; `body` holds the (already dot-unstuffed)
/// multi-line payload for commands whose terminator header (`text` on
/// `WRITE`) was present.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Command {
    pub id: CommandId,
    pub verb: Verb,
    pub headers: Vec<Header>,
    pub body: Option<String>,
}

impl Command {
    pub fn new(id: CommandId, verb: Verb) -> Self {
        Self {
            id,
            verb,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(key, value));
        self
    }

    pub fn with_body(mut self, key: impl Into<String>, body: impl Into<String>) -> Self {
        self.headers.push(Header::new(key, ""));
        self.body = Some(body.into());
        self
    }

    /// Returns the last header value for `key` (last-one-wins, per §4.2's
    /// tie-break policy), or `None` if absent.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|h| h.key == key)
            .map(|h| h.value.as_str())
    }

    /// Returns all values for a header that is allowed to repeat (`tag`).
    pub fn header_all<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a str> {
        self.headers
            .iter()
            .filter(move |h| h.key == key)
            .map(|h| h.value.as_str())
    }
}

/// The server's reply to a command (spec §4.2).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Reply {
    /// `[<id>] OK`
    Ok { id: CommandId },
    /// `[<id>] NOK (<code> <message>)`
    Nok {
        id: CommandId,
        code: String,
        message: String,
    },
    /// `ERROR <message> (<echoed-line>)` — framing-level, carries no id.
    Error { message: String, echoed_line: String },
}

impl Reply {
    pub fn nok(id: CommandId, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Nok {
            id,
            code: code.into(),
            message: message.into(),
        }
    }
}
