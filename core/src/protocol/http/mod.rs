/*
 * mod.rs
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

//! HTTP/1.1 client session with Basic and Digest authentication and multipart uploads.
//!
//! Layers, bottom up:
//! - `connection`: bounded-wait send/recv over TCP or TLS (`Transport`).
//! - `h1`: push parser for one response, reporting through `H1ResponseHandler`.
//! - `receiver`: accumulates a response and runs the parser over it twice.
//! - `auth`, `multipart`, `request`: Authorization values, form bodies, request heads.
//! - `session`: the state machine tying them together.

mod receiver;
mod response;

pub mod auth;
pub mod client;
pub mod connection;
pub mod h1;
pub mod multipart;
pub mod request;
pub mod session;

pub use auth::{AuthKind, Challenge, DigestChallenge};
pub use connection::{Connection, HttpStream, Transport};
pub use h1::H1ResponseHandler;
pub use multipart::FormBuilder;
pub use receiver::ResponseReceiver;
pub use request::{Body, Method};
pub use response::Response;
pub use session::{Session, SessionState};
