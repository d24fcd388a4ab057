/*
 * error.rs
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

//! Session, transport and protocol errors.

use std::fmt;
use std::io;

/// Category of a failure. Every error surfaced by `Session::perform` carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid argument (bad URL, method or auth selector out of range).
    Param,
    /// Allocation failure while growing a buffer.
    OutOfMemory,
    /// Multipart file field or certificate path does not exist.
    NoFile,
    /// Short or failed read of a multipart file field.
    FileRead,
    /// Host name resolution failed.
    Dns,
    /// Socket-level connect failure.
    Connect,
    /// Short or failed write.
    Send,
    /// Failed read.
    Recv,
    /// Peer closed the connection (zero-length read or unwritable channel).
    Disconnected,
    /// Bounded wait expired.
    Timeout,
    /// TLS configuration or handshake failure.
    Tls,
    /// Feature not available (HTTPS without TLS, chunked responses, legacy SSL versions).
    NotSupported,
    /// 401 without a usable challenge.
    BadChallenge,
    /// Malformed status line or header.
    Parse,
    /// Session loop bound reached without a final response.
    RetryExhausted,
}

impl ErrorKind {
    /// Stable negative integer for the C ABI (0 is success).
    pub fn code(self) -> i32 {
        match self {
            ErrorKind::Param => -1,
            ErrorKind::OutOfMemory => -2,
            ErrorKind::NoFile => -3,
            ErrorKind::FileRead => -4,
            ErrorKind::Dns => -5,
            ErrorKind::Connect => -6,
            ErrorKind::Send => -7,
            ErrorKind::Recv => -8,
            ErrorKind::Disconnected => -9,
            ErrorKind::Timeout => -10,
            ErrorKind::Tls => -11,
            ErrorKind::NotSupported => -12,
            ErrorKind::BadChallenge => -13,
            ErrorKind::Parse => -14,
            ErrorKind::RetryExhausted => -15,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Param => "invalid parameter",
            ErrorKind::OutOfMemory => "out of memory",
            ErrorKind::NoFile => "no such file",
            ErrorKind::FileRead => "file read error",
            ErrorKind::Dns => "DNS lookup failure",
            ErrorKind::Connect => "connect failure",
            ErrorKind::Send => "send failure",
            ErrorKind::Recv => "receive failure",
            ErrorKind::Disconnected => "disconnected",
            ErrorKind::Timeout => "timed out",
            ErrorKind::Tls => "TLS failure",
            ErrorKind::NotSupported => "not supported",
            ErrorKind::BadChallenge => "bad authentication challenge",
            ErrorKind::Parse => "malformed response",
            ErrorKind::RetryExhausted => "retry limit reached",
        }
    }
}

/// Error with a kind and a human-readable detail.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
        }
    }

    pub fn param(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Param, msg)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Map an I/O error from a socket operation, using `fallback` for anything not
    /// recognisably a timeout or a closed channel.
    pub fn from_io(err: io::Error, fallback: ErrorKind) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ErrorKind::Timeout,
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected => ErrorKind::Disconnected,
            io::ErrorKind::OutOfMemory => ErrorKind::OutOfMemory,
            io::ErrorKind::Unsupported => ErrorKind::NotSupported,
            _ => fallback,
        };
        Self::new(kind, err.to_string())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind.as_str())
        } else {
            write!(f, "{}: {}", self.kind.as_str(), self.message)
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::from_io(err, ErrorKind::Recv)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_to_transport_kinds() {
        let e = Error::from_io(io::Error::new(io::ErrorKind::TimedOut, "t"), ErrorKind::Send);
        assert_eq!(e.kind(), ErrorKind::Timeout);
        let e = Error::from_io(io::Error::new(io::ErrorKind::BrokenPipe, "p"), ErrorKind::Send);
        assert_eq!(e.kind(), ErrorKind::Disconnected);
        let e = Error::from_io(io::Error::new(io::ErrorKind::Other, "x"), ErrorKind::Send);
        assert_eq!(e.kind(), ErrorKind::Send);
    }

    #[test]
    fn codes_are_negative_and_distinct() {
        let kinds = [
            ErrorKind::Param,
            ErrorKind::OutOfMemory,
            ErrorKind::NoFile,
            ErrorKind::FileRead,
            ErrorKind::Dns,
            ErrorKind::Connect,
            ErrorKind::Send,
            ErrorKind::Recv,
            ErrorKind::Disconnected,
            ErrorKind::Timeout,
            ErrorKind::Tls,
            ErrorKind::NotSupported,
            ErrorKind::BadChallenge,
            ErrorKind::Parse,
            ErrorKind::RetryExhausted,
        ];
        let mut seen = std::collections::HashSet::new();
        for k in kinds {
            assert!(k.code() < 0);
            assert!(seen.insert(k.code()));
        }
    }

    #[test]
    fn display_includes_detail() {
        let e = Error::new(ErrorKind::Dns, "example.invalid");
        assert_eq!(e.to_string(), "DNS lookup failure: example.invalid");
    }
}
