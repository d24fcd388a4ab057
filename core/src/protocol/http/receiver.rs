/*
 * receiver.rs
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

//! Response receiver: reads into an accumulator until the parser reports a complete
//! message, then replays the parser over the accumulated bytes to collect headers and copy
//! the body into a buffer sized from the first pass.
//!
//! Interim (1xx) heads at the front of the accumulator are stripped as they complete. A 100
//! marks the continuation as pending; if nothing follows it in the bytes read so far, the
//! cycle ends with status 100.

use std::io;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use crate::error::{Error, ErrorKind, Result};

use super::connection::Transport;
use super::h1::{H1ResponseHandler, ResponseParser};
use super::response::Response;

/// First pass: structure only. Headers are not kept.
#[derive(Default)]
struct Measure {
    body_len: usize,
}

impl H1ResponseHandler for Measure {
    fn status(&mut self, _code: u16, _reason: Option<&str>) {}
    fn header_field(&mut self, _name: &str) {}
    fn header_value(&mut self, _value: &str) {}
    fn body_chunk(&mut self, data: &[u8]) {
        self.body_len += data.len();
    }
    fn message_complete(&mut self) {}
}

/// Final pass: headers and body into the response.
struct Collect<'a> {
    response: &'a mut Response,
    field: Option<String>,
}

impl H1ResponseHandler for Collect<'_> {
    fn status(&mut self, code: u16, _reason: Option<&str>) {
        self.response.code = code;
    }
    fn header_field(&mut self, name: &str) {
        self.field = Some(name.to_string());
    }
    fn header_value(&mut self, value: &str) {
        if let Some(name) = self.field.take() {
            self.response.headers.push((name, value.to_string()));
        }
    }
    fn body_chunk(&mut self, data: &[u8]) {
        self.response.body.extend_from_slice(data);
    }
    fn message_complete(&mut self) {}
}

fn parse_error(e: io::Error) -> Error {
    match e.kind() {
        io::ErrorKind::Unsupported => Error::new(ErrorKind::NotSupported, e.to_string()),
        _ => Error::new(ErrorKind::Parse, e.to_string()),
    }
}

pub struct ResponseReceiver {
    read_size: usize,
    wait: Duration,
}

impl ResponseReceiver {
    pub fn new(read_size: usize, wait: Duration) -> Self {
        Self { read_size, wait }
    }

    /// Run one receive cycle into `response`. Headers and body from the previous cycle are
    /// dropped first; transport errors abort the cycle.
    pub async fn receive<T: Transport>(&self, transport: &mut T, response: &mut Response) -> Result<()> {
        response.clear();
        let mut acc = BytesMut::with_capacity(self.read_size);
        // Bytes not yet consumed by the measuring parser; always a suffix of `acc`.
        let mut pending = BytesMut::new();
        let mut parser = ResponseParser::new();
        let mut measure = Measure::default();

        loop {
            let closed = match transport.recv(self.read_size, self.wait).await {
                Ok(chunk) => {
                    acc.extend_from_slice(&chunk);
                    pending.extend_from_slice(&chunk);
                    false
                }
                Err(e) if e.kind() == ErrorKind::Disconnected && !acc.is_empty() => true,
                Err(e) => return Err(e),
            };

            loop {
                parser.receive(&mut pending, &mut measure).map_err(parse_error)?;
                let code = parser.status_code();
                if !(parser.is_complete() && (100..200).contains(&code)) {
                    break;
                }
                let head_len = acc.len() - pending.len();
                acc.advance(head_len);
                debug!(code, head_len, "interim response stripped");
                parser.reset();
                measure = Measure::default();
                if code == 100 {
                    response.continuation_pending = true;
                    if acc.is_empty() {
                        response.code = 100;
                        return Ok(());
                    }
                }
            }

            if closed && !parser.finish(&mut measure) {
                return Err(Error::new(
                    ErrorKind::Disconnected,
                    "connection closed before response was complete",
                ));
            }
            if parser.is_complete() {
                break;
            }
        }

        if !pending.is_empty() {
            debug!(bytes = pending.len(), "discarding bytes after response");
        }
        response.body = Vec::new();
        response
            .body
            .try_reserve_exact(measure.body_len)
            .map_err(|e| Error::new(ErrorKind::OutOfMemory, format!("response body: {}", e)))?;
        let mut replay = ResponseParser::new();
        let mut collect = Collect {
            response,
            field: None,
        };
        replay.receive(&mut acc, &mut collect).map_err(parse_error)?;
        replay.finish(&mut collect);
        trace!(
            code = collect.response.code,
            headers = collect.response.headers.len(),
            body = collect.response.body.len(),
            "response received"
        );
        Ok(())
    }
}
