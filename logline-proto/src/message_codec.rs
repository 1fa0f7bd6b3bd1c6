//! Conversion between [`LogMessage`] and the `WRITE` [`Command`] that
//! carries it on the wire (spec §4.2).

use chrono::{DateTime, FixedOffset};

use logline_types::{
    command::Command,
    core::{CommandId, Verb},
    message::{LogMessage, TagSet},
};

use crate::error::ProtocolParseError;

const DEFAULT_WRITER: &str = "Default";
const DEFAULT_LEVEL: &str = "Note";

/// Builds a `WRITE` [`Command`] for `msg`. Uses the single-line `text:`
/// form when the text has no embedded newline, and the multi-line body form
/// otherwise (spec §4.2).
pub fn write_command(id: CommandId, msg: &LogMessage) -> Command {
    let mut cmd = Command::new(id, Verb::Write)
        .with_header("timestamp", msg.timestamp.to_rfc3339())
        .with_header("ticks", msg.high_precision_timestamp.to_string())
        .with_header("writer", &msg.log_writer_name)
        .with_header("level", &msg.log_level_name);

    if msg.lost_message_count > 0 {
        cmd = cmd.with_header("lost", msg.lost_message_count.to_string());
    }
    if !msg.application_name.is_empty() {
        cmd = cmd.with_header("application", &msg.application_name);
    }
    if !msg.process_name.is_empty() {
        cmd = cmd.with_header("process", &msg.process_name);
    }
    if msg.process_id != 0 {
        cmd = cmd.with_header("pid", msg.process_id.to_string());
    }
    for tag in msg.tags.iter() {
        cmd = cmd.with_header("tag", tag);
    }

    if msg.text.contains('\n') {
        cmd.with_body("text", msg.text.clone())
    } else {
        cmd.with_header("text", msg.text.clone())
    }
}

/// Parses a `WRITE` command into a [`LogMessage`]. `received_at` substitutes
/// for a missing `timestamp` header (spec §4.2).
pub fn parse_write(
    cmd: &Command,
    received_at: DateTime<FixedOffset>,
) -> Result<LogMessage, ProtocolParseError> {
    // The terminator header form ("text" with an empty inline value, body
    // following) always wins over any stray inline value (spec §4.2 tie-break:
    // "WRITE text value provided both on the header line and as a body —
    // header-line form only" — the assembler never produces both at once,
    // so this is simply picking whichever is present).
    let text = match (&cmd.body, cmd.header("text")) {
        (Some(body), _) => body.clone(),
        (None, Some(value)) => value.to_owned(),
        (None, None) => return Err(ProtocolParseError::MissingBody),
    };

    let timestamp = match cmd.header("timestamp") {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map_err(|e| ProtocolParseError::Detail(format!("bad timestamp: {e}")))?,
        None => received_at,
    };

    let ticks = match cmd.header("ticks") {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|e| ProtocolParseError::Detail(format!("bad ticks: {e}")))?,
        None => 0,
    };

    let lost = match cmd.header("lost") {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|e| ProtocolParseError::Detail(format!("bad lost: {e}")))?,
        None => 0,
    };

    let process_id = match cmd.header("pid") {
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|e| ProtocolParseError::Detail(format!("bad pid: {e}")))?,
        None => 0,
    };

    let tags: TagSet = cmd.header_all("tag").map(str::to_owned).collect();

    Ok(LogMessage {
        timestamp,
        high_precision_timestamp: ticks,
        lost_message_count: lost,
        log_writer_name: cmd.header("writer").unwrap_or(DEFAULT_WRITER).to_owned(),
        log_level_name: cmd.header("level").unwrap_or(DEFAULT_LEVEL).to_owned(),
        application_name: cmd.header("application").unwrap_or_default().to_owned(),
        process_name: cmd.header("process").unwrap_or_default().to_owned(),
        process_id,
        tags,
        text,
    })
}
