/*
 * parser.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of khttp, an embeddable HTTP/HTTPS client.
 *
 * khttp is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * khttp is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with khttp.  If not, see <http://www.gnu.org/licenses/>.
 */

//! HTTP/1.1 response push parser: status line, headers, body framed by Content-Length or
//! by connection close. The parser frames the body itself and reports events through
//! `H1ResponseHandler`; it keeps no buffer of its own, so a fresh parser over the same
//! bytes always produces the same events.

use bytes::Buf;
use bytes::BytesMut;
use std::io;

/// Callback for HTTP/1.1 response events.
pub trait H1ResponseHandler {
    fn status(&mut self, code: u16, reason: Option<&str>);
    fn header_field(&mut self, name: &str);
    fn header_value(&mut self, value: &str);
    fn body_chunk(&mut self, data: &[u8]);
    fn message_complete(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    StatusLine,
    Headers,
    /// Content-Length body.
    Body,
    /// No length given: body runs until the peer closes.
    UntilClose,
    /// Message complete; any remaining bytes belong to the next message.
    Complete,
}

/// Push parser for one HTTP/1.1 response. Feed bytes via `receive`; handler is invoked as
/// complete tokens are parsed. Call `reset` before reusing it for another message.
pub struct ResponseParser {
    state: ParseState,
    code: u16,
    content_length: Option<u64>,
    bytes_received: u64,
    chunked: bool,
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            state: ParseState::StatusLine,
            code: 0,
            content_length: None,
            bytes_received: 0,
            chunked: false,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Status code of the current message (0 until the status line is parsed).
    pub fn status_code(&self) -> u16 {
        self.code
    }

    pub fn is_complete(&self) -> bool {
        self.state == ParseState::Complete
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Find CRLF in buf; return number of bytes to the start of CRLF, or None if not found.
    fn find_crlf(buf: &[u8]) -> Option<usize> {
        buf.windows(2).position(|w| w == b"\r\n")
    }

    fn parse_status_line(line: &str) -> io::Result<(u16, Option<&str>)> {
        // HTTP/1.1 200 OK or HTTP/1.1 200
        let mut parts = line.splitn(3, ' ');
        let version = parts.next().unwrap_or("");
        if !version.starts_with("HTTP/1.") {
            return Err(invalid("invalid status line"));
        }
        let code = parts
            .next()
            .filter(|s| s.len() == 3)
            .and_then(|s| s.parse::<u16>().ok())
            .filter(|c| (100..=599).contains(c))
            .ok_or_else(|| invalid("invalid status code"))?;
        let reason = parts.next().filter(|s| !s.is_empty());
        Ok((code, reason))
    }

    fn note_header(&mut self, name: &str, value: &str) -> io::Result<()> {
        if name.eq_ignore_ascii_case("content-length") {
            let len = value
                .parse::<u64>()
                .map_err(|_| invalid("invalid Content-Length"))?;
            if self.content_length.is_some_and(|prev| prev != len) {
                return Err(invalid("conflicting Content-Length headers"));
            }
            self.content_length = Some(len);
        } else if name.eq_ignore_ascii_case("transfer-encoding")
            && value.to_ascii_lowercase().contains("chunked")
        {
            self.chunked = true;
        }
        Ok(())
    }

    /// Decide framing once the blank line after the headers has been seen.
    fn end_of_head<H: H1ResponseHandler>(&mut self, handler: &mut H) -> io::Result<()> {
        let bodiless = (100..200).contains(&self.code) || self.code == 204 || self.code == 304;
        if bodiless {
            self.complete(handler);
        } else if self.chunked {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "chunked transfer-encoding not supported",
            ));
        } else {
            match self.content_length {
                Some(0) => self.complete(handler),
                Some(_) => self.state = ParseState::Body,
                None => self.state = ParseState::UntilClose,
            }
        }
        Ok(())
    }

    fn complete<H: H1ResponseHandler>(&mut self, handler: &mut H) {
        self.state = ParseState::Complete;
        handler.message_complete();
    }

    /// Consume and parse as much as possible from buf. Partial lines stay in buf; bytes
    /// after a complete message are left untouched.
    pub fn receive<H: H1ResponseHandler>(
        &mut self,
        buf: &mut BytesMut,
        handler: &mut H,
    ) -> Result<(), io::Error> {
        while !buf.is_empty() {
            match self.state {
                ParseState::StatusLine => {
                    let line_end = match Self::find_crlf(buf) {
                        Some(n) => n,
                        None => return Ok(()),
                    };
                    let line = buf.split_to(line_end + 2); // include CRLF
                    let line_str = std::str::from_utf8(&line[..line_end])
                        .map_err(|_| invalid("invalid status line UTF-8"))?;
                    let (code, reason) = Self::parse_status_line(line_str)?;
                    self.code = code;
                    handler.status(code, reason);
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let line_end = match Self::find_crlf(buf) {
                        Some(n) => n,
                        None => return Ok(()),
                    };
                    if line_end == 0 {
                        buf.advance(2);
                        self.end_of_head(handler)?;
                        continue;
                    }
                    let line = buf.split_to(line_end + 2);
                    let line_str = std::str::from_utf8(&line[..line_end])
                        .map_err(|_| invalid("invalid header UTF-8"))?;
                    let colon = line_str.find(':').ok_or_else(|| invalid("header without colon"))?;
                    let name = line_str[..colon].trim();
                    if name.is_empty() || line_str.starts_with([' ', '\t']) {
                        return Err(invalid("invalid header name"));
                    }
                    let value = line_str[colon + 1..].trim();
                    self.note_header(name, value)?;
                    handler.header_field(name);
                    handler.header_value(value);
                }
                ParseState::Body => {
                    let content_length = self.content_length.unwrap_or(0);
                    let remaining = (content_length - self.bytes_received) as usize;
                    let to_read = remaining.min(buf.len());
                    if to_read > 0 {
                        let chunk = buf.split_to(to_read);
                        handler.body_chunk(&chunk);
                        self.bytes_received += to_read as u64;
                    }
                    if self.bytes_received >= content_length {
                        self.complete(handler);
                    }
                }
                ParseState::UntilClose => {
                    let chunk = buf.split_to(buf.len());
                    self.bytes_received += chunk.len() as u64;
                    handler.body_chunk(&chunk);
                }
                ParseState::Complete => return Ok(()),
            }
        }
        Ok(())
    }

    /// Signal end of input (peer closed). Completes a close-delimited body; returns whether
    /// the message is now complete.
    pub fn finish<H: H1ResponseHandler>(&mut self, handler: &mut H) -> bool {
        if self.state == ParseState::UntilClose {
            self.complete(handler);
        }
        self.is_complete()
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Events {
        status: Option<(u16, Option<String>)>,
        fields: Vec<String>,
        values: Vec<String>,
        body: Vec<u8>,
        completed: usize,
    }

    impl H1ResponseHandler for Events {
        fn status(&mut self, code: u16, reason: Option<&str>) {
            self.status = Some((code, reason.map(str::to_string)));
        }
        fn header_field(&mut self, name: &str) {
            self.fields.push(name.to_string());
        }
        fn header_value(&mut self, value: &str) {
            self.values.push(value.to_string());
        }
        fn body_chunk(&mut self, data: &[u8]) {
            self.body.extend_from_slice(data);
        }
        fn message_complete(&mut self) {
            self.completed += 1;
        }
    }

    fn parse(input: &[u8]) -> (ResponseParser, Events, BytesMut) {
        let mut parser = ResponseParser::new();
        let mut events = Events::default();
        let mut buf = BytesMut::from(input);
        parser.receive(&mut buf, &mut events).unwrap();
        (parser, events, buf)
    }

    #[test]
    fn content_length_response() {
        let (parser, ev, rest) =
            parse(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nX-A: 1\r\n\r\nhelloEXTRA");
        assert!(parser.is_complete());
        assert_eq!(ev.status, Some((200, Some("OK".to_string()))));
        assert_eq!(ev.fields, vec!["Content-Length", "X-A"]);
        assert_eq!(ev.values, vec!["5", "1"]);
        assert_eq!(ev.body, b"hello");
        assert_eq!(ev.completed, 1);
        assert_eq!(&rest[..], b"EXTRA");
    }

    #[test]
    fn interim_response_completes_without_body() {
        let (parser, ev, rest) = parse(b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\n");
        assert!(parser.is_complete());
        assert_eq!(parser.status_code(), 100);
        assert_eq!(ev.completed, 1);
        assert_eq!(&rest[..], b"HTTP/1.1 200 OK\r\n");
    }

    #[test]
    fn partial_input_waits() {
        let (parser, ev, rest) = parse(b"HTTP/1.1 200 OK\r\nContent-Len");
        assert_eq!(parser.state(), ParseState::Headers);
        assert_eq!(ev.completed, 0);
        assert_eq!(&rest[..], b"Content-Len");
    }

    #[test]
    fn close_delimited_body_completes_on_finish() {
        let mut parser = ResponseParser::new();
        let mut ev = Events::default();
        let mut buf = BytesMut::from(&b"HTTP/1.0 200 OK\r\n\r\nabc"[..]);
        parser.receive(&mut buf, &mut ev).unwrap();
        assert_eq!(parser.state(), ParseState::UntilClose);
        assert!(parser.finish(&mut ev));
        assert_eq!(ev.body, b"abc");
        assert_eq!(ev.completed, 1);
    }

    #[test]
    fn chunked_is_unsupported() {
        let mut parser = ResponseParser::new();
        let mut ev = Events::default();
        let mut buf =
            BytesMut::from(&b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\n"[..]);
        let err = parser.receive(&mut buf, &mut ev).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn malformed_heads_rejected() {
        for input in [
            &b"ICY 200 OK\r\n"[..],
            &b"HTTP/1.1 20 OK\r\n"[..],
            &b"HTTP/1.1 200 OK\r\nno colon here\r\n"[..],
            &b"HTTP/1.1 200 OK\r\nContent-Length: x\r\n"[..],
            &b"HTTP/1.1 200 OK\r\nContent-Length: 1\r\nContent-Length: 2\r\n"[..],
        ] {
            let mut parser = ResponseParser::new();
            let mut ev = Events::default();
            let mut buf = BytesMut::from(input);
            let err = parser.receive(&mut buf, &mut ev).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidData, "{:?}", input);
        }
    }

    #[test]
    fn no_content_is_complete_after_head() {
        let (parser, ev, _) = parse(b"HTTP/1.1 204 No Content\r\nX: y\r\n\r\n");
        assert!(parser.is_complete());
        assert!(ev.body.is_empty());
    }
}
