//! Command codec (spec §4.2): formats/parses the head line `[<id>] <VERB>
//! ...`, `key: value` header lines, and the multi-line `WRITE` body, and
//! manages id correlation via [`CommandAssembler`].
//!
//! Mirrors the teacher's `codec::{Decoder, Encode}` split: encoding is
//! infallible (`Command` values are already valid by construction),
//! decoding is fallible and distinguishes "need more bytes" state (handled
//! by the line framer, not here) from parse failure.

use nom::{
    bytes::complete::take_while,
    character::complete::char,
    sequence::delimited,
    IResult,
};

use logline_types::{
    command::{Command, Header, Reply},
    core::{CommandId, Verb},
};

use crate::error::ProtocolParseError;
use crate::framer::{stuff_body_line, unstuff_body_line, BODY_TERMINATOR};

/// Parses the `[<id>]` prefix shared by every line the server or client
/// emits that is not an `ERROR` line.
fn id_prefix(input: &str) -> IResult<&str, &str> {
    delimited(char('['), take_while(|c: char| c.is_ascii_alphanumeric()), char(']'))(input)
}

/// Parses `[<id>] <VERB> <rest>` into its three parts. The verb token itself
/// is never rejected here — unrecognized verbs are a dispatch-level concern
/// (§4.2: "Unrecognized verbs must be answered with `NOK (unknown_verb)`"),
/// not a framing failure. Only a malformed `[id]` prefix is a parse error.
pub fn parse_head(line: &str) -> Result<(CommandId, Verb, String), ProtocolParseError> {
    let (rest_after_id, id_str) =
        id_prefix(line).map_err(|_| ProtocolParseError::MalformedId)?;
    let id = CommandId::try_from(id_str).map_err(|_| ProtocolParseError::MalformedId)?;

    let rest_after_id = rest_after_id
        .strip_prefix(' ')
        .ok_or(ProtocolParseError::MalformedId)?;

    let verb_end = rest_after_id
        .find(' ')
        .unwrap_or(rest_after_id.len());
    if verb_end == 0 {
        return Err(ProtocolParseError::MalformedId);
    }
    let (verb_str, tail) = rest_after_id.split_at(verb_end);
    let tail = tail.strip_prefix(' ').unwrap_or(tail);

    Ok((id, Verb::from(verb_str), tail.to_owned()))
}

/// Parses one `key: value` header line.
pub fn parse_header_line(line: &str) -> Result<Header, ProtocolParseError> {
    fn key_and_colon(input: &str) -> IResult<&str, &str> {
        nom::sequence::terminated(take_while(|c: char| c != ':'), char(':'))(input)
    }

    let (value, key) = key_and_colon(line)
        .map_err(|_: nom::Err<nom::error::Error<&str>>| {
            ProtocolParseError::Detail("malformed header line".into())
        })?;
    if key.is_empty() {
        return Err(ProtocolParseError::Detail("empty header key".into()));
    }
    let value = value.strip_prefix(' ').unwrap_or(value);
    Ok(Header::new(key, value))
}

/// A parsed reply line: `[<id>] OK`, `[<id>] NOK (<code> <message>)`, or
/// `ERROR <message> (<echoed-line>)`.
pub fn parse_reply(line: &str) -> Result<Reply, ProtocolParseError> {
    if let Some(rest) = line.strip_prefix("ERROR ") {
        let (message, echoed) = split_parenthesized_suffix(rest)
            .ok_or_else(|| ProtocolParseError::Detail("malformed ERROR line".into()))?;
        return Ok(Reply::Error {
            message: message.to_owned(),
            echoed_line: echoed.to_owned(),
        });
    }

    let (id, verb_like, tail) = parse_head(line)?;
    match verb_like.as_str() {
        "OK" => Ok(Reply::Ok { id }),
        "NOK" => {
            let (code, message) = split_parenthesized_suffix(&tail)
                .ok_or_else(|| ProtocolParseError::Detail("malformed NOK line".into()))?;
            let mut parts = code.splitn(2, ' ');
            let code = parts.next().unwrap_or_default().to_owned();
            let message = parts.next().unwrap_or(message).to_owned();
            Ok(Reply::Nok { id, code, message })
        }
        _ => Err(ProtocolParseError::Detail("not a reply line".into())),
    }
}

/// Splits `"prefix (suffix)"` into `("prefix", "suffix")`, trimming the
/// single space before the opening paren.
fn split_parenthesized_suffix(input: &str) -> Option<(&str, &str)> {
    let open = input.find('(')?;
    let close = input.rfind(')')?;
    if close < open {
        return None;
    }
    let prefix = input[..open].trim_end();
    let inner = &input[open + 1..close];
    Some((prefix, inner))
}

/// Encodes a [`Reply`] as its wire line (without trailing newline; the
/// caller runs it through [`crate::framer::encode_line`] for the ceiling and
/// terminator).
pub fn encode_reply(reply: &Reply) -> String {
    match reply {
        Reply::Ok { id } => format!("[{id}] OK"),
        Reply::Nok { id, code, message } => format!("[{id}] NOK ({code} {message})"),
        Reply::Error {
            message,
            echoed_line,
        } => format!("ERROR {message} ({echoed_line})"),
    }
}

/// Encodes a [`Command`] as the sequence of logical lines that represent it
/// on the wire (head line, any headers, and — for `WRITE` with a multi-line
/// body — the dot-stuffed body plus terminator).
pub fn encode_command(cmd: &Command) -> Vec<String> {
    let mut lines = vec![format!("[{}] {}", cmd.id, cmd.verb)];

    for header in &cmd.headers {
        if header.value.is_empty() && cmd.body.is_some() && header.key == "text" {
            lines.push(format!("{}:", header.key));
        } else {
            lines.push(format!("{}: {}", header.key, header.value));
        }
    }

    if let Some(body) = &cmd.body {
        for content_line in body.split('\n') {
            lines.push(stuff_body_line(content_line));
        }
        lines.push(BODY_TERMINATOR.to_owned());
    }

    lines
}

/// Assembles complete [`Command`]s out of a stream of already-reassembled
/// logical lines (as produced by [`crate::framer::LineDecoder`]).
///
/// Only `WRITE` spans more than one logical line: header lines are consumed
/// until the terminator-marked `text` header, after which body lines are
/// consumed until the lone `.` terminator (spec §3: "the body spans from
/// the line following that header to the single-dot terminator line").
#[derive(Debug)]
pub struct CommandAssembler {
    state: AssemblerState,
}

#[derive(Debug)]
enum AssemblerState {
    AwaitingHead,
    CollectingHeaders {
        id: CommandId,
        verb: Verb,
        headers: Vec<Header>,
    },
    CollectingBody {
        id: CommandId,
        verb: Verb,
        headers: Vec<Header>,
        body_lines: Vec<String>,
    },
}

impl Default for CommandAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandAssembler {
    pub fn new() -> Self {
        Self {
            state: AssemblerState::AwaitingHead,
        }
    }

    /// Feeds one already-reassembled logical line. Returns `Some(Command)`
    /// once a full command has been assembled, `None` if more lines are
    /// still needed.
    pub fn feed_line(&mut self, line: &str) -> Result<Option<Command>, ProtocolParseError> {
        loop {
            match &mut self.state {
                AssemblerState::AwaitingHead => {
                    let (id, verb, tail) = parse_head(line)?;
                    if verb == Verb::Write {
                        self.state = AssemblerState::CollectingHeaders {
                            id,
                            verb,
                            headers: Vec::new(),
                        };
                        // `WRITE` has no inline head-line argument; fall
                        // through to header collection on the next line.
                        let _ = tail;
                        return Ok(None);
                    }
                    // Fold the inline positional argument (HELLO's name,
                    // INFO's text, SET's kind/value, ...) into a
                    // conventional `arg` header so callers have one shape
                    // to match on regardless of verb.
                    let mut headers = Vec::new();
                    if !tail.is_empty() {
                        headers.push(Header::new("arg", tail));
                    }
                    return Ok(Some(Command {
                        id,
                        verb,
                        headers,
                        body: None,
                    }));
                }
                AssemblerState::CollectingHeaders { headers, .. } => {
                    let header = parse_header_line(line)?;
                    let is_text = header.key == "text";
                    let inline_value = header.value.clone();
                    headers.push(header);

                    if !is_text {
                        // More headers may follow; wait for the next line.
                        return Ok(None);
                    }

                    {
                        if inline_value.is_empty() {
                            // Body form: subsequent lines are content until
                            // the terminator.
                            let AssemblerState::CollectingHeaders { id, verb, headers } =
                                std::mem::replace(&mut self.state, AssemblerState::AwaitingHead)
                            else {
                                unreachable!()
                            };
                            self.state = AssemblerState::CollectingBody {
                                id,
                                verb,
                                headers,
                                body_lines: Vec::new(),
                            };
                            return Ok(None);
                        } else {
                            // Single-line form: command is complete now.
                            let AssemblerState::CollectingHeaders { id, verb, headers } =
                                std::mem::replace(&mut self.state, AssemblerState::AwaitingHead)
                            else {
                                unreachable!()
                            };
                            return Ok(Some(Command {
                                id,
                                verb,
                                headers,
                                body: None,
                            }));
                        }
                    }
                }
                AssemblerState::CollectingBody { body_lines, .. } => {
                    if line == BODY_TERMINATOR {
                        let AssemblerState::CollectingBody {
                            id,
                            verb,
                            headers,
                            body_lines,
                        } = std::mem::replace(&mut self.state, AssemblerState::AwaitingHead)
                        else {
                            unreachable!()
                        };
                        return Ok(Some(Command {
                            id,
                            verb,
                            headers,
                            body: Some(body_lines.join("\n")),
                        }));
                    }
                    body_lines.push(unstuff_body_line(line));
                    return Ok(None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_head_line() {
        let (id, verb, tail) = parse_head("[a01] SET PROCESS_ID 1234").unwrap();
        assert_eq!(id.as_str(), "a01");
        assert_eq!(verb, Verb::Set);
        assert_eq!(tail, "PROCESS_ID 1234");
    }

    #[test]
    fn empty_id_is_valid() {
        let (id, verb, _) = parse_head("[] HELLO demo").unwrap();
        assert!(id.is_empty());
        assert_eq!(verb, Verb::Hello);
    }

    #[test]
    fn malformed_id_prefix_is_rejected() {
        assert!(parse_head("a01] SET X").is_err());
        assert!(parse_head("[a-1] SET X").is_err());
        assert!(parse_head("[a01]SET X").is_err());
    }

    #[test]
    fn parses_ok_and_nok_replies() {
        assert_eq!(
            parse_reply("[w1] OK").unwrap(),
            Reply::Ok {
                id: CommandId::try_from("w1").unwrap()
            }
        );
        assert_eq!(
            parse_reply("[w1] NOK (missing_body no text header)").unwrap(),
            Reply::Nok {
                id: CommandId::try_from("w1").unwrap(),
                code: "missing_body".into(),
                message: "no text header".into(),
            }
        );
    }

    #[test]
    fn parses_error_line() {
        assert_eq!(
            parse_reply("ERROR line_too_long (some long line)").unwrap(),
            Reply::Error {
                message: "line_too_long".into(),
                echoed_line: "some long line".into(),
            }
        );
    }

    #[test]
    fn assembles_single_line_write() {
        let mut asm = CommandAssembler::new();
        assert!(asm.feed_line("[w1] WRITE").unwrap().is_none());
        assert!(asm
            .feed_line("timestamp: 2024-02-01T12:34:56.000+00:00")
            .unwrap()
            .is_none());
        assert!(asm.feed_line("ticks: 123456789").unwrap().is_none());
        assert!(asm.feed_line("writer: demo").unwrap().is_none());
        assert!(asm.feed_line("level: Note").unwrap().is_none());
        let cmd = asm.feed_line("text: hello world").unwrap().unwrap();
        assert_eq!(cmd.header("text"), Some("hello world"));
        assert_eq!(cmd.header("writer"), Some("demo"));
    }

    #[test]
    fn assembles_multi_line_write_with_dot_stuffing() {
        let mut asm = CommandAssembler::new();
        asm.feed_line("[w1] WRITE").unwrap();
        asm.feed_line("text:").unwrap();
        assert!(asm.feed_line("..start").unwrap().is_none());
        let cmd = asm.feed_line(".").unwrap().unwrap();
        assert_eq!(cmd.body.as_deref(), Some(".start"));
    }

    #[test]
    fn roundtrips_through_encode_and_assembler() {
        let cmd = Command::new(CommandId::try_from("w9").unwrap(), Verb::Write)
            .with_header("writer", "demo")
            .with_body("text", ".start\nsecond line");
        let lines = encode_command(&cmd);

        let mut asm = CommandAssembler::new();
        let mut result = None;
        for line in &lines {
            result = asm.feed_line(line).unwrap();
        }
        let parsed = result.unwrap();
        assert_eq!(parsed.body.as_deref(), Some(".start\nsecond line"));
        assert_eq!(parsed.header("writer"), Some("demo"));
    }
}
