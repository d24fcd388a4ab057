/*
 * response.rs
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

//! Last response observed by a session: status, headers in arrival order, body.

use std::fmt::Write as _;

/// Response as seen by the caller after `perform`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    /// Status code; 0 before any response has been received.
    pub code: u16,
    /// Header (name, value) pairs in arrival order; names may repeat.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// A 100 Continue was seen and the announced body has not been sent yet.
    pub continuation_pending: bool,
}

impl Response {
    /// First header whose name matches `name` case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name`, in arrival order.
    pub fn headers_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Drop headers and body ahead of a new receive cycle.
    pub(crate) fn clear(&mut self) {
        self.headers.clear();
        self.body.clear();
    }

    /// Numbered header listing for diagnostics.
    pub fn dump_headers(&self) -> String {
        let mut out = String::new();
        for (i, (name, value)) in self.headers.iter().enumerate() {
            let _ = writeln!(out, "{:02} {:>20}     {}", i, name, value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Response {
        Response {
            code: 200,
            headers: vec![
                ("Set-Cookie".into(), "a=1".into()),
                ("Content-Type".into(), "text/plain".into()),
                ("set-cookie".into(), "b=2".into()),
            ],
            body: b"ok".to_vec(),
            continuation_pending: false,
        }
    }

    #[test]
    fn lookup_is_case_insensitive_and_ordered() {
        let r = sample();
        assert_eq!(r.header("content-type"), Some("text/plain"));
        assert_eq!(r.header("SET-COOKIE"), Some("a=1"));
        assert_eq!(r.headers_named("set-cookie").collect::<Vec<_>>(), vec!["a=1", "b=2"]);
        assert_eq!(r.header("missing"), None);
    }

    #[test]
    fn dump_lists_every_header() {
        let dump = sample().dump_headers();
        assert_eq!(dump.lines().count(), 3);
        assert!(dump.starts_with("00"));
        assert!(dump.contains("text/plain"));
    }
}
