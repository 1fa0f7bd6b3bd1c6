//! Splits a byte stream into logical text lines, and joins/splits multi-line
//! command bodies via dot-stuffing (spec §4.1).
//!
//! This plays the role the teacher's [`Fragmentizer`] plays for IMAP
//! literals: it separates "do we have a complete unit yet" from "what does
//! the unit mean", so the command codec never has to reason about partial
//! reads.

use crate::error::FramingError;

/// The maximum number of characters a single physical line may contain
/// before its terminator (spec §6: "32 768 UTF-16 code units, approximated
/// as characters").
pub const LINE_CEILING: usize = 32_768;

/// Scans `buf` for the next line terminator (`LF` or `CRLF`).
///
/// Returns:
/// - `Ok(None)` if no terminator has arrived yet and `buf` has not exceeded
///   `max_len`,
/// - `Ok(Some((content_len, consumed_len)))` where `buf[..content_len]` is
///   the physical line's content (terminator stripped) and `consumed_len`
///   is how many bytes (including the terminator) to drop from `buf`,
/// - `Err(FramingError::LineTooLong)` if `max_len` was exceeded without a
///   terminator in sight.
fn find_physical_line(buf: &[u8], max_len: usize) -> Result<Option<(usize, usize)>, FramingError> {
    match buf.iter().position(|&b| b == b'\n') {
        Some(lf_pos) => {
            let content_len = if lf_pos > 0 && buf[lf_pos - 1] == b'\r' {
                lf_pos - 1
            } else {
                lf_pos
            };
            Ok(Some((content_len, lf_pos + 1)))
        }
        None => {
            if buf.len() > max_len {
                Err(FramingError::LineTooLong { max: max_len })
            } else {
                Ok(None)
            }
        }
    }
}

/// How much of an overlong line is kept (lossily-decoded) for the `ERROR`
/// reply's echoed-line field; the rest is discarded along with the bytes
/// that caused the overflow.
const OVERFLOW_PREVIEW_LEN: usize = 200;

/// Decodes a byte stream into logical lines, reassembling backslash
/// continuations (spec §4.1) as it goes.
///
/// Bytes are pushed incrementally with [`LineDecoder::push_bytes`]; complete
/// logical lines are popped with [`LineDecoder::next_line`]. `next_line`
/// returns `Ok(None)` when more bytes are needed, never blocking.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    /// Accumulator for a logical line under construction across
    /// continuations. Empty between logical lines.
    pending: String,
    max_len: usize,
    /// Set after a `LineTooLong` error, until the remainder of the offending
    /// physical line (up to and including its terminator) has been seen and
    /// discarded. Without this, bytes left behind by the error would fail
    /// the same check forever.
    discarding: bool,
    overflow_preview: String,
}

impl LineDecoder {
    pub fn new(max_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            pending: String::new(),
            max_len: if max_len == 0 { LINE_CEILING } else { max_len },
            discarding: false,
            overflow_preview: String::new(),
        }
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Returns (and clears) a best-effort preview of the line that most
    /// recently overflowed `max_len`, suitable for an `ERROR` reply's
    /// echoed-line field.
    pub fn take_overflow_preview(&mut self) -> String {
        std::mem::take(&mut self.overflow_preview)
    }

    /// Pops the next complete logical line, or `None` if more bytes are
    /// required.
    pub fn next_line(&mut self) -> Result<Option<String>, FramingError> {
        loop {
            if self.discarding {
                match self.buffer.iter().position(|&b| b == b'\n') {
                    Some(lf_pos) => {
                        self.buffer.drain(..=lf_pos);
                        self.discarding = false;
                        continue;
                    }
                    None => {
                        self.buffer.clear();
                        return Ok(None);
                    }
                }
            }

            let (content_len, consumed_len) =
                match find_physical_line(&self.buffer, self.max_len) {
                    Ok(Some(found)) => found,
                    Ok(None) => return Ok(None),
                    Err(err) => {
                        self.overflow_preview = String::from_utf8_lossy(
                            &self.buffer[..self.buffer.len().min(OVERFLOW_PREVIEW_LEN)],
                        )
                        .into_owned();
                        self.pending.clear();
                        self.buffer.clear();
                        self.discarding = true;
                        return Err(err);
                    }
                };

            let content = &self.buffer[..content_len];
            let physical =
                std::str::from_utf8(content).map_err(|_| FramingError::InvalidUtf8)?;
            let physical = physical.to_owned();
            self.buffer.drain(..consumed_len);

            if let Some(stripped) = physical.strip_suffix('\\') {
                self.pending.push_str(stripped);
                continue;
            }

            self.pending.push_str(&physical);
            return Ok(Some(std::mem::take(&mut self.pending)));
        }
    }

    /// Call when the stream has ended (EOF / peer closed). Detects a
    /// continuation that was never completed.
    pub fn finish(&self) -> Result<(), FramingError> {
        if !self.pending.is_empty() || !self.buffer.is_empty() {
            Err(FramingError::InvalidContinuation)
        } else {
            Ok(())
        }
    }
}

/// Encodes one logical line for the wire, splitting it into continuation
/// fragments of at most `max_len` characters each, `LF`-terminated (spec
/// §4.1: "producers emit LF").
pub fn encode_line(line: &str, max_len: usize) -> String {
    let max_len = if max_len == 0 { LINE_CEILING } else { max_len };
    let chars: Vec<char> = line.chars().collect();
    if chars.len() <= max_len {
        let mut out = String::with_capacity(line.len() + 1);
        out.push_str(line);
        out.push('\n');
        return out;
    }

    let mut out = String::new();
    let mut consumed = 0;
    for chunk in chars.chunks(max_len) {
        consumed += chunk.len();
        out.extend(chunk.iter());
        if consumed >= chars.len() {
            out.push('\n');
        } else {
            out.push('\\');
            out.push('\n');
        }
    }
    out
}

/// Dot-stuffs a single body content line: a leading `.` is duplicated so the
/// terminator (`.` alone) remains unambiguous (spec §4.1).
pub fn stuff_body_line(line: &str) -> String {
    if line.starts_with('.') {
        format!(".{line}")
    } else {
        line.to_owned()
    }
}

/// Dot-unstuffs a single body line received off the wire (inverse of
/// [`stuff_body_line`]). The terminator line (`.` alone) must be recognized
/// by the caller *before* calling this function.
pub fn unstuff_body_line(line: &str) -> String {
    match line.strip_prefix('.') {
        Some(rest) => rest.to_owned(),
        None => line.to_owned(),
    }
}

/// The single-line body terminator.
pub const BODY_TERMINATOR: &str = ".";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_simple_lines() {
        let mut dec = LineDecoder::new(1024);
        dec.push_bytes(b"hello\nworld\n");
        assert_eq!(dec.next_line().unwrap(), Some("hello".to_owned()));
        assert_eq!(dec.next_line().unwrap(), Some("world".to_owned()));
        assert_eq!(dec.next_line().unwrap(), None);
    }

    #[test]
    fn accepts_crlf_and_lf() {
        let mut dec = LineDecoder::new(1024);
        dec.push_bytes(b"a\r\nb\n");
        assert_eq!(dec.next_line().unwrap(), Some("a".to_owned()));
        assert_eq!(dec.next_line().unwrap(), Some("b".to_owned()));
    }

    #[test]
    fn joins_continuation_lines() {
        let mut dec = LineDecoder::new(1024);
        dec.push_bytes(b"hello \\\nworld\n");
        assert_eq!(dec.next_line().unwrap(), Some("hello world".to_owned()));
    }

    #[test]
    fn partial_reads_return_none_until_complete() {
        let mut dec = LineDecoder::new(1024);
        dec.push_bytes(b"hel");
        assert_eq!(dec.next_line().unwrap(), None);
        dec.push_bytes(b"lo\n");
        assert_eq!(dec.next_line().unwrap(), Some("hello".to_owned()));
    }

    #[test]
    fn line_too_long_without_terminator() {
        let mut dec = LineDecoder::new(4);
        dec.push_bytes(b"abcde");
        assert_eq!(
            dec.next_line().unwrap_err(),
            FramingError::LineTooLong { max: 4 }
        );
        assert_eq!(dec.take_overflow_preview(), "abcde");
    }

    #[test]
    fn recovers_after_line_too_long_instead_of_looping_forever() {
        let mut dec = LineDecoder::new(4);
        dec.push_bytes(b"abcde");
        assert!(dec.next_line().is_err());
        // The rest of the offending line, plus a fresh well-formed one.
        dec.push_bytes(b"fghij\nok\n");
        assert_eq!(dec.next_line().unwrap(), Some("ok".to_owned()));
        assert_eq!(dec.next_line().unwrap(), None);
    }

    #[test]
    fn continuation_at_eof_is_an_error() {
        let mut dec = LineDecoder::new(1024);
        dec.push_bytes(b"partial\\\n");
        assert_eq!(dec.next_line().unwrap(), None);
        assert_eq!(dec.finish().unwrap_err(), FramingError::InvalidContinuation);
    }

    #[test]
    fn encode_line_roundtrips_short_line() {
        let encoded = encode_line("hello world", 1024);
        let mut dec = LineDecoder::new(1024);
        dec.push_bytes(encoded.as_bytes());
        assert_eq!(dec.next_line().unwrap(), Some("hello world".to_owned()));
    }

    #[test]
    fn encode_line_splits_long_line_and_roundtrips() {
        let long = "a".repeat(80_000);
        let encoded = encode_line(&long, LINE_CEILING);
        // Exactly 3 continuation fragments of <= LINE_CEILING chars each.
        assert_eq!(encoded.matches('\\').count(), 2);

        let mut dec = LineDecoder::new(LINE_CEILING);
        dec.push_bytes(encoded.as_bytes());
        assert_eq!(dec.next_line().unwrap(), Some(long));
    }

    #[test]
    fn dot_stuffing_roundtrips() {
        assert_eq!(stuff_body_line(".start"), "..start");
        assert_eq!(unstuff_body_line("..start"), ".start");
        assert_eq!(stuff_body_line("."), "..");
        assert_eq!(unstuff_body_line(".."), ".");
    }

    #[test]
    fn exactly_32768_chars_needs_one_continuation() {
        let text = "a".repeat(LINE_CEILING);
        let encoded = encode_line(&text, LINE_CEILING);
        assert_eq!(encoded.matches('\\').count(), 0);

        let text_plus_one = "a".repeat(LINE_CEILING + 1);
        let encoded = encode_line(&text_plus_one, LINE_CEILING);
        assert_eq!(encoded.matches('\\').count(), 1);
    }
}
