/*
 * multipart.rs
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

//! multipart/form-data body assembled eagerly, so its length is known before the request
//! head is written. The closing delimiter is not part of the buffer; it is sent after the
//! parts, possibly behind a 100-continue exchange.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use rand::RngCore;
use tracing::debug;

use crate::error::{Error, ErrorKind, Result};

/// 16 random bytes as 32 lowercase hex characters.
pub fn generate_boundary() -> String {
    let mut raw = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut raw);
    raw.iter().map(|b| format!("{:02x}", b)).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormBuilder {
    boundary: String,
    buf: Vec<u8>,
    parts: usize,
}

impl FormBuilder {
    pub fn new(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            buf: Vec::new(),
            parts: 0,
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Bytes of all parts added so far, without the closing delimiter.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts == 0
    }

    pub fn part_count(&self) -> usize {
        self.parts
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// `--{boundary}--\r\n`
    pub fn terminal_boundary(&self) -> String {
        format!("--{}--\r\n", self.boundary)
    }

    /// Value announced in Content-Length: parts plus closing delimiter.
    pub fn content_length(&self) -> usize {
        self.buf.len() + self.boundary.len() + 6
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    fn part_head(&self, name: &str, filename: Option<&str>) -> String {
        match filename {
            Some(filename) => format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                self.boundary, name, filename
            ),
            None => format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n",
                self.boundary, name
            ),
        }
    }

    pub fn add_text(&mut self, name: &str, value: &str) -> Result<()> {
        check_name(name)?;
        let head = self.part_head(name, None);
        let part_len = head.len() + value.len() + 2;
        self.reserve(part_len)?;
        self.buf.extend_from_slice(head.as_bytes());
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.extend_from_slice(b"\r\n");
        self.parts += 1;
        debug!(name, part_len, total = self.buf.len(), "form text part added");
        Ok(())
    }

    /// Append a file part. The payload is copied verbatim; the buffer is left unchanged if
    /// the file is missing or shorter than its reported size.
    pub fn add_file(&mut self, name: &str, path: impl AsRef<Path>) -> Result<()> {
        check_name(name)?;
        let path = path.as_ref();
        let shown = path.display().to_string();
        check_filename(&shown)?;
        let mut file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                Error::new(ErrorKind::NoFile, format!("{}: {}", shown, e))
            }
            _ => Error::new(ErrorKind::FileRead, format!("{}: {}", shown, e)),
        })?;
        let size = file
            .metadata()
            .map_err(|e| Error::new(ErrorKind::FileRead, format!("{}: {}", shown, e)))?
            .len();
        let size = usize::try_from(size)
            .map_err(|_| Error::new(ErrorKind::OutOfMemory, format!("{} too large", shown)))?;

        let head = self.part_head(name, Some(&shown));
        let part_len = head.len() + size + 2;
        self.reserve(part_len)?;
        let start = self.buf.len();
        self.buf.extend_from_slice(head.as_bytes());
        let payload_at = self.buf.len();
        self.buf.resize(payload_at + size, 0);
        if let Err(e) = file.read_exact(&mut self.buf[payload_at..]) {
            self.buf.truncate(start);
            return Err(Error::new(
                ErrorKind::FileRead,
                format!("{}: short read: {}", shown, e),
            ));
        }
        self.buf.extend_from_slice(b"\r\n");
        self.parts += 1;
        debug!(name, file = %shown, part_len, total = self.buf.len(), "form file part added");
        Ok(())
    }

    fn reserve(&mut self, additional: usize) -> Result<()> {
        self.buf.try_reserve_exact(additional).map_err(|e| {
            Error::new(ErrorKind::OutOfMemory, format!("form body: {}", e))
        })
    }
}

/// A quote or line break in a field name would break the part header.
fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['"', '\r', '\n']) {
        return Err(Error::param(format!("invalid form field name {:?}", name)));
    }
    Ok(())
}

fn check_filename(filename: &str) -> Result<()> {
    if filename.contains(['"', '\r', '\n']) {
        return Err(Error::param(format!("file name {:?} cannot be quoted in a part header", filename)));
    }
    Ok(())
}
