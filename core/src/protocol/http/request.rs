/*
 * request.rs
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

//! HTTP request: method, request body, and serialization of the request head.
//!
//! Header order is fixed: Authorization, User-Agent, Host, Accept, then Content-Length and
//! the content headers when a body is present.

use crate::error::{Error, Result};
use crate::uri::Target;

use super::multipart::FormBuilder;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// C-style selector: 0 = GET, 1 = POST, 2 = PUT, 3 = DELETE.
    pub fn from_selector(selector: i32) -> Result<Self> {
        match selector {
            0 => Ok(Method::Get),
            1 => Ok(Method::Post),
            2 => Ok(Method::Put),
            3 => Ok(Method::Delete),
            _ => Err(Error::param(format!("method {} out of range", selector))),
        }
    }

    /// GET never carries a body.
    pub fn allows_body(&self) -> bool {
        *self != Method::Get
    }
}

/// Request body. Raw data and a form are mutually exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Body {
    #[default]
    Empty,
    /// Sent with the head as application/x-www-form-urlencoded.
    Raw(Vec<u8>),
    /// Announced with `Expect: 100-continue`; parts sent once the server agrees.
    Form(FormBuilder),
}

impl Body {
    pub fn is_form(&self) -> bool {
        matches!(self, Body::Form(_))
    }

    pub fn form(&self) -> Option<&FormBuilder> {
        match self {
            Body::Form(form) => Some(form),
            _ => None,
        }
    }
}

/// Serialize the request head, followed by the body if it is raw data.
pub fn build_request(
    method: Method,
    target: &Target,
    authorization: Option<&str>,
    user_agent: &str,
    body: &Body,
) -> Vec<u8> {
    let body = if method.allows_body() { body } else { &Body::Empty };
    let mut head = format!("{} {} HTTP/1.1\r\n", method.as_str(), target.path);
    if let Some(value) = authorization {
        head.push_str(&format!("Authorization: {}\r\n", value));
    }
    head.push_str(&format!("User-Agent: {}\r\n", user_agent));
    head.push_str(&format!("Host: {}\r\n", target.host_header()));
    head.push_str("Accept: */*\r\n");
    match body {
        Body::Empty => {}
        Body::Raw(data) => {
            head.push_str(&format!("Content-Length: {}\r\n", data.len()));
            head.push_str("Content-Type: application/x-www-form-urlencoded\r\n");
        }
        Body::Form(form) => {
            head.push_str(&format!("Content-Length: {}\r\n", form.content_length()));
            head.push_str("Expect: 100-continue\r\n");
            head.push_str(&format!("Content-Type: {}\r\n", form.content_type()));
        }
    }
    head.push_str("\r\n");

    let mut out = head.into_bytes();
    if let Body::Raw(data) = body {
        out.extend_from_slice(data);
    }
    out
}

/// Form parts followed by the closing delimiter, as sent after the server accepts the head.
pub fn form_payload(form: &FormBuilder) -> Vec<u8> {
    let terminal = form.terminal_boundary();
    let mut out = Vec::with_capacity(form.len() + terminal.len());
    out.extend_from_slice(form.as_bytes());
    out.extend_from_slice(terminal.as_bytes());
    out
}

/// Printable copy of a request head for trace logs, credentials masked.
pub fn redacted_head(request: &[u8]) -> String {
    let end = request
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .unwrap_or(request.len());
    String::from_utf8_lossy(&request[..end])
        .lines()
        .map(|line| {
            if line.len() >= 14 && line.as_bytes()[..14].eq_ignore_ascii_case(b"authorization:") {
                "Authorization: <redacted>".to_string()
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
