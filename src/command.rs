// command.rs - protocol lines and messages
//
// chatircd - simple IRC-like chat server
// Copyright (C) 2022  Mateusz Szpakowski
//
// This library is free software; you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public
// License as published by the Free Software Foundation; either
// version 2.1 of the License, or (at your option) any later version.
//
// This library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this library; if not, write to the Free Software
// Foundation, Inc., 51 Franklin Street, Fifth Floor, Boston, MA  02110-1301  USA

use bytes::{Buf, BufMut, BytesMut};
use std::fmt;
use std::io;
use tokio_util::codec::{Decoder, Encoder};

pub(crate) const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// Item produced by the line framer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Line {
    Text(String),
    // line was longer than allowed and has been dropped
    TooLong,
}

/// Line framer for protocol connections.
///
/// Lines end with LF, an optional CR before the LF is dropped. Bytes that are
/// not valid UTF-8 are replaced instead of failing the connection. When a line
/// grows past the maximum length the decoder yields `Line::TooLong` once, then
/// drops everything up to the next LF and carries on with the following line.
#[derive(Debug)]
pub(crate) struct IRCLinesCodec {
    max_length: usize,
    // index in the buffer where the LF search continues
    next_index: usize,
    discarding: bool,
}

impl IRCLinesCodec {
    pub(crate) fn new() -> IRCLinesCodec {
        IRCLinesCodec::new_with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    pub(crate) fn new_with_max_length(max_length: usize) -> IRCLinesCodec {
        IRCLinesCodec {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }

    fn line_from_bytes(bytes: &[u8]) -> Line {
        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        let mut line = String::from_utf8_lossy(bytes).into_owned();
        // lone CR inside a line must not reach other clients
        if line.contains('\r') {
            line = line.replace('\r', " ");
        }
        Line::Text(line)
    }
}

impl Default for IRCLinesCodec {
    fn default() -> Self {
        IRCLinesCodec::new()
    }
}

impl Decoder for IRCLinesCodec {
    type Item = Line;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Line>, io::Error> {
        loop {
            let read_to = buf.len().min(self.max_length.saturating_add(1));
            let newline = buf[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n')
                .map(|off| self.next_index + off);

            match (self.discarding, newline) {
                (true, Some(pos)) => {
                    // end of the over-long line, resume with the next one.
                    buf.advance(pos + 1);
                    self.discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    buf.advance(read_to);
                    self.next_index = 0;
                    if buf.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(pos)) => {
                    let line = buf.split_to(pos + 1);
                    self.next_index = 0;
                    return Ok(Some(Self::line_from_bytes(&line[..pos])));
                }
                (false, None) if buf.len() > self.max_length => {
                    self.discarding = true;
                    self.next_index = 0;
                    return Ok(Some(Line::TooLong));
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Line>, io::Error> {
        Ok(match self.decode(buf)? {
            Some(line) => Some(line),
            None => {
                if buf.is_empty() || self.discarding {
                    buf.clear();
                    None
                } else {
                    // last line without LF
                    let line = buf.split_to(buf.len());
                    self.next_index = 0;
                    Some(Self::line_from_bytes(&line))
                }
            }
        })
    }
}

impl<T: AsRef<str>> Encoder<T> for IRCLinesCodec {
    type Error = io::Error;

    fn encode(&mut self, line: T, buf: &mut BytesMut) -> Result<(), io::Error> {
        let line = line.as_ref();
        buf.reserve(line.len() + 2);
        buf.put(line.as_bytes());
        buf.put_slice(b"\r\n");
        Ok(())
    }
}

/// One parsed protocol line.
///
/// `command` is always lowercase. Middle parameters borrow from the source
/// line, the trailing parameter keeps everything after its colon verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Message<'a> {
    pub(crate) prefix: Option<&'a str>,
    pub(crate) command: String,
    pub(crate) params: Vec<&'a str>,
    pub(crate) trailing: Option<&'a str>,
}

fn split_token(s: &str) -> (&str, &str) {
    match s.find(|c: char| c.is_ascii_whitespace()) {
        Some(i) => (&s[..i], &s[i + 1..]),
        None => (s, ""),
    }
}

fn skip_spaces(s: &str) -> &str {
    s.trim_start_matches(|c: char| c.is_ascii_whitespace())
}

impl<'a> Message<'a> {
    /// Parse a single line. Returns `None` for empty input and never fails
    /// otherwise: garbage ends up with an empty or unknown command.
    pub(crate) fn parse(line: &'a str) -> Option<Message<'a>> {
        let mut rest = skip_spaces(line.trim_end_matches(['\r', '\n']));
        if rest.is_empty() {
            return None;
        }

        let mut prefix = None;
        if let Some(p) = rest.strip_prefix(':') {
            let (pfx, r) = split_token(p);
            prefix = Some(pfx);
            rest = skip_spaces(r);
        }

        let (cmd, r) = split_token(rest);
        rest = r;
        let mut params = Vec::new();
        let mut trailing = None;
        loop {
            rest = skip_spaces(rest);
            if rest.is_empty() {
                break;
            }
            if let Some(t) = rest.strip_prefix(':') {
                trailing = Some(t);
                break;
            }
            let (param, r) = split_token(rest);
            params.push(param);
            rest = r;
        }

        Some(Message {
            prefix,
            command: cmd.to_ascii_lowercase(),
            params,
            trailing,
        })
    }

    /// Number of parameters, trailing included.
    pub(crate) fn arg_count(&self) -> usize {
        self.params.len() + usize::from(self.trailing.is_some())
    }

    /// Parameter by position, where the trailing parameter follows the middle ones.
    pub(crate) fn arg(&self, i: usize) -> Option<&'a str> {
        if i < self.params.len() {
            Some(self.params[i])
        } else if i == self.params.len() {
            self.trailing
        } else {
            None
        }
    }

    /// Parameter that is present and not empty.
    pub(crate) fn nonempty_arg(&self, i: usize) -> Option<&'a str> {
        self.arg(i).filter(|s| !s.is_empty())
    }

    pub(crate) fn name(&self) -> String {
        self.command.to_ascii_uppercase()
    }
}

impl fmt::Display for Message<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = self.prefix {
            write!(f, ":{} ", prefix)?;
        }
        f.write_str(&self.name())?;
        for p in &self.params {
            write!(f, " {}", p)?;
        }
        if let Some(t) = self.trailing {
            write!(f, " :{}", t)?;
        }
        Ok(())
    }
}
