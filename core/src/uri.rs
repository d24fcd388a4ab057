/*
 * uri.rs
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

//! Request target: scheme, host, port and path parsed once from the URL given by the caller.
//! `https://` and `http://` are recognised case-insensitively; anything else is plain HTTP
//! with the whole string taken as host[:port][/path].

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::warn;

use crate::error::{Error, Result};

/// Bytes that cannot appear raw in a request line. `%` is left alone so already-encoded
/// paths pass through unchanged.
const PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    pub fn is_secure(self) -> bool {
        self == Scheme::Https
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    /// Always starts with `/`.
    pub path: String,
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes()) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

impl Target {
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        let (scheme, rest) = if let Some(rest) = strip_prefix_ignore_case(url, "https://") {
            (Scheme::Https, rest)
        } else if let Some(rest) = strip_prefix_ignore_case(url, "http://") {
            (Scheme::Http, rest)
        } else {
            (Scheme::Http, url)
        };

        let (authority, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, "/"),
        };
        let (host, port) = match authority.find(':') {
            Some(i) => {
                let port_str = &authority[i + 1..];
                let port = match port_str.parse::<u32>() {
                    Ok(p) if (1..=65535).contains(&p) => p as u16,
                    _ => {
                        warn!(port = port_str, "port out of range, using scheme default");
                        scheme.default_port()
                    }
                };
                (&authority[..i], port)
            }
            None => (authority, scheme.default_port()),
        };
        if host.is_empty() {
            return Err(Error::param(format!("no host in URL {}", url)));
        }
        if host.contains(|c: char| c.is_whitespace() || c == '@') {
            return Err(Error::param(format!("invalid host {}", host)));
        }

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
            path: utf8_percent_encode(path, PATH).to_string(),
        })
    }

    /// Value of the Host header: port omitted when it is the scheme default.
    pub fn host_header(&self) -> String {
        if self.port == self.scheme.default_port() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_with_port_and_path() {
        let t = Target::parse("HTTPS://api.example.com:8443/v1/items?x=1").unwrap();
        assert_eq!(t.scheme, Scheme::Https);
        assert_eq!(t.host, "api.example.com");
        assert_eq!(t.port, 8443);
        assert_eq!(t.path, "/v1/items?x=1");
        assert_eq!(t.host_header(), "api.example.com:8443");
    }

    #[test]
    fn defaults_without_scheme_or_path() {
        let t = Target::parse("example.com").unwrap();
        assert_eq!(t.scheme, Scheme::Http);
        assert_eq!(t.port, 80);
        assert_eq!(t.path, "/");
        assert_eq!(t.host_header(), "example.com");

        let t = Target::parse("https://example.com").unwrap();
        assert_eq!(t.port, 443);
    }

    #[test]
    fn out_of_range_port_falls_back_to_default() {
        assert_eq!(Target::parse("http://h:0/").unwrap().port, 80);
        assert_eq!(Target::parse("https://h:70000/").unwrap().port, 443);
        assert_eq!(Target::parse("http://h:abc/").unwrap().port, 80);
    }

    #[test]
    fn path_is_escaped_but_percent_kept() {
        let t = Target::parse("http://h/a b/%20c").unwrap();
        assert_eq!(t.path, "/a%20b/%20c");
    }

    #[test]
    fn empty_host_rejected() {
        assert!(Target::parse("http:///path").is_err());
        assert!(Target::parse("").is_err());
    }
}
