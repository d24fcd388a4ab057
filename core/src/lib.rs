/*
 * lib.rs
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

//! khttp core: an HTTP/1.1 client engine for embedding.
//!
//! A [`Session`] holds the target, method, credentials, body and TLS options for one
//! interaction. `perform` connects, sends the request, answers a Digest challenge once,
//! releases a multipart body after `100 Continue`, and returns the final [`Response`].
//!
//! ```no_run
//! # async fn demo() -> khttp_core::Result<()> {
//! use khttp_core::{AuthKind, Method, Session};
//!
//! let mut session = Session::new();
//! session.set_uri("https://example.com/upload")?;
//! session.set_method(Method::Post);
//! session.set_credentials("user", "secret", AuthKind::Digest);
//! session.add_form_text("title", "report")?;
//! let response = session.perform().await?;
//! println!("{} {}", response.code, response.body_text());
//! # Ok(())
//! # }
//! ```

pub mod base64_codec;
pub mod config;
pub mod error;
pub mod net;
pub mod protocol;
pub mod uri;

pub use config::{ClientConfig, TlsOptions, TlsVersion};
pub use error::{Error, ErrorKind, Result};
pub use protocol::http::{AuthKind, Body, FormBuilder, Method, Response, Session, SessionState};
pub use uri::{Scheme, Target};
