// beacond - A line-oriented directory/tracker service for a peer-to-peer file-sharing overlay
// Copyright (C) 2012  Justin Hill, Gordon Keesler, Matt Layher
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Line framing and command grammar for the directory wire protocol.
//!
//! Frames are LF-terminated lines, sanitized of BS/CR/LF before dispatch, and capped at a
//! configurable maximum length with silent truncation (no error signaled) rather than a
//! rejection, matching the original fixed-buffer server this protocol was distilled from.

use std::fmt;
use std::io;

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Strips BS (0x08), CR (0x0D), and LF (0x0A) from a raw line and decodes it as UTF-8,
/// replacing anything invalid with the replacement character.
fn sanitize(raw: &[u8]) -> String {
    let cleaned: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|&b| b != 0x08 && b != 0x0D && b != 0x0A)
        .collect();

    String::from_utf8_lossy(&cleaned).into_owned()
}

/// A `Decoder`/`Encoder` pair framing a byte stream into sanitized, length-capped lines.
pub struct LineCodec {
    max_length: usize,
}

impl LineCodec {
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<String>> {
        if let Some(lf) = buf.iter().position(|&b| b == b'\n') {
            let mut chunk = buf.split_to(lf + 1);
            chunk.truncate(lf); // drop the LF itself (and any preceding CR is stripped by sanitize)
            chunk.truncate(self.max_length);

            return Ok(Some(sanitize(&chunk)));
        }

        // No terminator yet. If the unterminated buffer has already grown past the cap,
        // keep only the capped prefix so a peer that never sends LF can't grow the buffer
        // without bound; the eventual line is still treated as its own truncated prefix.
        if buf.len() > self.max_length {
            buf.truncate(self.max_length);
        }

        Ok(None)
    }
}

impl Encoder<String> for LineCodec {
    type Error = io::Error;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> io::Result<()> {
        dst.reserve(item.len() + 1);
        dst.put_slice(item.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

/// Coded error replies from the table in the protocol's error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    A0,
    A1,
    A2,
    A3,
    A4,
    D0,
    D1,
    D2,
    L0,
    R0,
    R1,
    C0,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::A0 => "A0",
            ErrorCode::A1 => "A1",
            ErrorCode::A2 => "A2",
            ErrorCode::A3 => "A3",
            ErrorCode::A4 => "A4",
            ErrorCode::D0 => "D0",
            ErrorCode::D1 => "D1",
            ErrorCode::D2 => "D2",
            ErrorCode::L0 => "L0",
            ErrorCode::R0 => "R0",
            ErrorCode::R1 => "R1",
            ErrorCode::C0 => "C0",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of tokenizing a line received while in `AWAIT_CONNECT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectCommand {
    Connect,
    Quit,
    /// Anything else is discarded silently in this phase.
    Noise,
}

pub fn parse_await_connect(line: &str) -> ConnectCommand {
    match line {
        "CONNECT" => ConnectCommand::Connect,
        "QUIT" => ConnectCommand::Quit,
        _ => ConnectCommand::Noise,
    }
}

/// A command recognized in `READY`, with arguments left as `Option` so the caller can
/// report the precise missing-field error the grammar specifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadyCommand {
    Add {
        file: Option<String>,
        hash: Option<String>,
        size: Option<String>,
    },
    Delete {
        file: Option<String>,
        hash: Option<String>,
    },
    List,
    Request {
        file: Option<String>,
    },
    Quit,
    Unknown,
}

/// Tokenizes `line` on spaces and dispatches on the first word.
///
/// ADD/DELETE/REQUEST match on a byte-prefix of the first word (no trailing space
/// required), mirroring the original C server's `strncmp(in, "ADD", 3)`-style dispatch:
/// `"ADDENDUM foo h 1"` is accepted as `ADD` with `file = "foo"`. `LIST`, `QUIT` require
/// exact equality.
pub fn parse_ready(line: &str) -> ReadyCommand {
    let mut words = line.split(' ').filter(|w| !w.is_empty());

    let verb = match words.next() {
        Some(v) => v,
        None => return ReadyCommand::Unknown,
    };

    if verb == "LIST" {
        return ReadyCommand::List;
    }

    if verb == "QUIT" {
        return ReadyCommand::Quit;
    }

    if verb.as_bytes().starts_with(b"REQUEST") {
        return ReadyCommand::Request {
            file: words.next().map(str::to_string),
        };
    }

    if verb.as_bytes().starts_with(b"DELETE") {
        return ReadyCommand::Delete {
            file: words.next().map(str::to_string),
            hash: words.next().map(str::to_string),
        };
    }

    if verb.as_bytes().starts_with(b"ADD") {
        return ReadyCommand::Add {
            file: words.next().map(str::to_string),
            hash: words.next().map(str::to_string),
            size: words.next().map(str::to_string),
        };
    }

    ReadyCommand::Unknown
}

/// Validates a `size` token: non-empty, all ASCII digits (no sign), and small enough to
/// fit in 63 bits.
pub fn parse_size(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let value: u64 = s.parse().ok()?;

    if value > i64::MAX as u64 {
        return None;
    }

    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_control_characters() {
        let raw = b"CONNECT\x08\r";
        assert_eq!(sanitize(raw), "CONNECT");
    }

    #[test]
    fn decode_splits_on_lf() {
        let mut codec = LineCodec::new(512);
        let mut buf = BytesMut::from(&b"CONNECT\nQUIT\n"[..]);

        let first = codec.decode(&mut buf).unwrap();
        assert_eq!(first, Some("CONNECT".to_string()));

        let second = codec.decode(&mut buf).unwrap();
        assert_eq!(second, Some("QUIT".to_string()));

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn decode_tolerates_crlf() {
        let mut codec = LineCodec::new(512);
        let mut buf = BytesMut::from(&b"CONNECT\r\n"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some("CONNECT".to_string()));
    }

    #[test]
    fn decode_truncates_overlong_line_without_error() {
        let mut codec = LineCodec::new(4);
        let mut buf = BytesMut::from(&b"ADD file hash 1\n"[..]);

        let line = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(line.len(), 4);
    }

    #[test]
    fn decode_returns_none_without_terminator() {
        let mut codec = LineCodec::new(512);
        let mut buf = BytesMut::from(&b"CONNE"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn await_connect_ignores_noise() {
        assert_eq!(parse_await_connect("CONNECT"), ConnectCommand::Connect);
        assert_eq!(parse_await_connect("QUIT"), ConnectCommand::Quit);
        assert_eq!(parse_await_connect("whatever"), ConnectCommand::Noise);
    }

    #[test]
    fn ready_parses_add() {
        let cmd = parse_ready("ADD song.mp3 abc123 4096");
        assert_eq!(
            cmd,
            ReadyCommand::Add {
                file: Some("song.mp3".to_string()),
                hash: Some("abc123".to_string()),
                size: Some("4096".to_string()),
            }
        );
    }

    #[test]
    fn ready_add_missing_fields() {
        assert_eq!(
            parse_ready("ADD"),
            ReadyCommand::Add {
                file: None,
                hash: None,
                size: None,
            }
        );

        assert_eq!(
            parse_ready("ADD only"),
            ReadyCommand::Add {
                file: Some("only".to_string()),
                hash: None,
                size: None,
            }
        );
    }

    #[test]
    fn ready_prefix_match_tolerates_extra_suffix() {
        let cmd = parse_ready("ADDENDUM foo h 1");
        assert_eq!(
            cmd,
            ReadyCommand::Add {
                file: Some("foo".to_string()),
                hash: Some("h".to_string()),
                size: Some("1".to_string()),
            }
        );
    }

    #[test]
    fn ready_unknown_command() {
        assert_eq!(parse_ready("FROBNICATE"), ReadyCommand::Unknown);
    }

    #[test]
    fn ready_does_not_panic_on_invalid_utf8_near_prefix_boundary() {
        // sanitize() decodes invalid bytes with from_utf8_lossy, so a verb can contain
        // the 3-byte U+FFFD replacement character straddling where a prefix slice would
        // land; parse_ready must not index into the middle of it.
        let line = sanitize(b"AD\xFFD 1 2");
        let cmd = parse_ready(&line);
        assert_eq!(cmd, ReadyCommand::Unknown);
    }

    #[test]
    fn ready_exact_match_for_list_and_quit() {
        assert_eq!(parse_ready("LIST"), ReadyCommand::List);
        assert_eq!(parse_ready("QUIT"), ReadyCommand::Quit);
    }

    #[test]
    fn size_validation() {
        assert_eq!(parse_size("4096"), Some(4096));
        assert_eq!(parse_size(""), None);
        assert_eq!(parse_size("-1"), None);
        assert_eq!(parse_size("+1"), None);
        assert_eq!(parse_size("notanumber"), None);
    }
}
