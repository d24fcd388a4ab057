/*
 * session.rs
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

//! Session engine: one request/response interaction, including a single Digest retry after
//! a 401 and the deferred multipart body behind `Expect: 100-continue`.
//!
//! Each round decides what to send from the status seen in the previous round, sends it,
//! receives a response, then decides whether the session is over. The loop is bounded by
//! `ClientConfig::max_attempts` and the form body is never sent more than twice, so a server
//! that keeps challenging or keeps answering 100 cannot hold the session forever.

use std::path::Path;

use tracing::{debug, error, trace};

use crate::config::{ClientConfig, TlsOptions};
use crate::error::{Error, ErrorKind, Result};
use crate::uri::Target;

use super::auth::{self, AuthKind, Challenge};
use super::client;
use super::connection::Transport;
use super::multipart::{generate_boundary, FormBuilder};
use super::receiver::ResponseReceiver;
use super::request::{build_request, form_payload, redacted_head, Body, Method};
use super::response::Response;

const MAX_BODY_SENDS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Sending,
    Receiving,
    Authenticating,
    ContinuingBody,
    Done,
    Failed,
}

/// What to send at the top of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outgoing {
    /// Request head (and raw body), with preemptive Basic credentials if configured.
    Plain,
    /// Request head answering the stored Digest challenge.
    Authenticated,
    /// Form parts and closing delimiter, then receive the final response.
    Body,
    /// Form parts and closing delimiter; the 200 already received is final.
    BodyThenFinish,
    /// Nothing; the server owes another response.
    Nothing,
}

fn outgoing(previous: Option<u16>, continuation_pending: bool, has_form: bool) -> Outgoing {
    match previous {
        Some(401) => Outgoing::Authenticated,
        Some(200) if continuation_pending && has_form => Outgoing::BodyThenFinish,
        Some(100) if continuation_pending && has_form => Outgoing::Body,
        Some(100) | Some(200) => Outgoing::Nothing,
        _ => Outgoing::Plain,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
    Finish,
    Retry,
}

/// Decision after a non-401 response.
fn next_after(code: u16, continuation_pending: bool, has_form: bool, attempt: u32) -> Next {
    match code {
        200 if continuation_pending && has_form && attempt == 0 => Next::Retry,
        100 => Next::Retry,
        _ => Next::Finish,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Credentials {
    kind: AuthKind,
    username: String,
    password: String,
}

/// One HTTP(S) client session. Configure it, then call `perform`.
pub struct Session {
    config: ClientConfig,
    target: Option<Target>,
    method: Method,
    credentials: Credentials,
    challenge: Option<Challenge>,
    body: Body,
    boundary: String,
    tls: TlsOptions,
    response: Response,
    state: SessionState,
    attempt_count: u32,
    challenges_seen: u32,
    body_sends: u32,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// TLS options start from `config.tls`. The configuration is checked by `perform`.
    pub fn with_config(config: ClientConfig) -> Self {
        let tls = config.tls.clone();
        Self {
            config,
            target: None,
            method: Method::Get,
            credentials: Credentials::default(),
            challenge: None,
            body: Body::Empty,
            boundary: generate_boundary(),
            tls,
            response: Response::default(),
            state: SessionState::Idle,
            attempt_count: 0,
            challenges_seen: 0,
            body_sends: 0,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn set_uri(&mut self, url: &str) -> Result<()> {
        let target = Target::parse(url)?;
        debug!(scheme = ?target.scheme, host = %target.host, port = target.port, path = %target.path, "target set");
        self.target = Some(target);
        Ok(())
    }

    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// `AuthKind::None` clears the credentials.
    pub fn set_credentials(&mut self, username: &str, password: &str, kind: AuthKind) {
        self.credentials = match kind {
            AuthKind::None => Credentials::default(),
            kind => Credentials {
                kind,
                username: username.to_string(),
                password: password.to_string(),
            },
        };
        self.challenge = None;
    }

    pub fn auth_kind(&self) -> AuthKind {
        self.credentials.kind
    }

    /// Last challenge received, if any.
    pub fn challenge(&self) -> Option<&Challenge> {
        self.challenge.as_ref()
    }

    /// Raw body sent as application/x-www-form-urlencoded; replaces any form.
    pub fn set_post_data(&mut self, data: impl Into<Vec<u8>>) {
        self.body = Body::Raw(data.into());
    }

    /// Add a text field to the multipart form; replaces any raw body.
    pub fn add_form_text(&mut self, name: &str, value: &str) -> Result<()> {
        self.edit_form(|form| form.add_text(name, value))
    }

    /// Add a file field to the multipart form; replaces any raw body.
    pub fn add_form_file(&mut self, name: &str, path: impl AsRef<Path>) -> Result<()> {
        self.edit_form(|form| form.add_file(name, path))
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Multipart boundary, fixed for the life of the session.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// A failed add leaves the previous body in place.
    fn edit_form(&mut self, edit: impl FnOnce(&mut FormBuilder) -> Result<()>) -> Result<()> {
        let (mut form, displaced) = match std::mem::take(&mut self.body) {
            Body::Form(form) => (form, Body::Empty),
            other => (FormBuilder::new(self.boundary.clone()), other),
        };
        let result = edit(&mut form);
        self.body = if form.is_empty() { displaced } else { Body::Form(form) };
        result
    }

    pub fn set_tls(&mut self, tls: TlsOptions) {
        self.tls = tls;
    }

    pub fn tls(&self) -> &TlsOptions {
        &self.tls
    }

    pub fn tls_mut(&mut self) -> &mut TlsOptions {
        &mut self.tls
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Rounds completed by the last `perform`.
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Connect to the target and run the exchange. The connection is closed afterwards.
    pub async fn perform(&mut self) -> Result<&Response> {
        let target = match &self.target {
            Some(target) => target.clone(),
            None => return Err(Error::param("no URI set")),
        };
        self.config.validate()?;
        self.begin();
        self.set_state(SessionState::Connecting);
        let mut connection = match client::connect(&target, &self.tls, self.config.connect_timeout()).await {
            Ok(connection) => connection,
            Err(e) => return Err(self.fail(e)),
        };
        let result = self.run(&mut connection).await;
        connection.close().await;
        result?;
        Ok(&self.response)
    }

    /// Run the exchange over an already-open transport, which is left open.
    pub async fn perform_over<T: Transport>(&mut self, transport: &mut T) -> Result<&Response> {
        if self.target.is_none() {
            return Err(Error::param("no URI set"));
        }
        self.config.validate()?;
        self.begin();
        self.run(transport).await?;
        Ok(&self.response)
    }

    fn begin(&mut self) {
        self.response = Response::default();
        self.challenge = None;
        self.attempt_count = 0;
        self.challenges_seen = 0;
        self.body_sends = 0;
        self.state = SessionState::Idle;
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            trace!(from = ?self.state, to = ?state, "session state");
            self.state = state;
        }
    }

    fn fail(&mut self, e: Error) -> Error {
        error!(error = %e, attempt = self.attempt_count, "session failed");
        self.state = SessionState::Failed;
        e
    }

    async fn run<T: Transport>(&mut self, transport: &mut T) -> Result<()> {
        match self.exchange(transport).await {
            Ok(()) => {
                self.set_state(SessionState::Done);
                debug!(code = self.response.code, attempts = self.attempt_count, "session done");
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn exchange<T: Transport>(&mut self, transport: &mut T) -> Result<()> {
        let receiver = ResponseReceiver::new(self.config.recv_buffer_size, self.config.recv_timeout());
        let mut previous: Option<u16> = None;
        loop {
            if self.attempt_count >= self.config.max_attempts {
                return Err(Error::new(
                    ErrorKind::RetryExhausted,
                    format!(
                        "no final response after {} rounds (last status {})",
                        self.attempt_count, self.response.code
                    ),
                ));
            }

            let has_form = self.body.is_form() && self.method.allows_body();
            match outgoing(previous, self.response.continuation_pending, has_form) {
                Outgoing::Plain => {
                    self.set_state(SessionState::Sending);
                    let authorization = self.preemptive_authorization();
                    self.send_request(transport, authorization.as_deref()).await?;
                }
                Outgoing::Authenticated => {
                    self.set_state(SessionState::Authenticating);
                    let authorization = self.digest_authorization()?;
                    self.send_request(transport, Some(&authorization)).await?;
                }
                Outgoing::Body => {
                    self.set_state(SessionState::ContinuingBody);
                    self.send_form(transport).await?;
                }
                Outgoing::BodyThenFinish => {
                    self.set_state(SessionState::ContinuingBody);
                    self.send_form(transport).await?;
                    return Ok(());
                }
                Outgoing::Nothing => {}
            }

            self.set_state(SessionState::Receiving);
            receiver.receive(transport, &mut self.response).await?;
            let code = self.response.code;
            debug!(code, attempt = self.attempt_count, pending = self.response.continuation_pending, "response");

            let next = if code == 401 {
                self.on_unauthorized()?
            } else {
                next_after(code, self.response.continuation_pending, has_form, self.attempt_count)
            };
            if next == Next::Finish {
                return Ok(());
            }
            previous = Some(code);
            self.attempt_count += 1;
        }
    }

    fn preemptive_authorization(&self) -> Option<String> {
        match self.credentials.kind {
            AuthKind::Basic => Some(auth::basic_authorization(
                &self.credentials.username,
                &self.credentials.password,
            )),
            _ => None,
        }
    }

    fn digest_authorization(&self) -> Result<String> {
        match &self.challenge {
            Some(Challenge::Digest(challenge)) => Ok(auth::digest_authorization(
                &self.credentials.username,
                &self.credentials.password,
                challenge,
                self.method.as_str(),
                self.target.as_ref().map(|t| t.path.as_str()).unwrap_or("/"),
                &auth::generate_cnonce(),
            )),
            _ => Err(Error::new(ErrorKind::BadChallenge, "no Digest challenge to answer")),
        }
    }

    /// Store the challenge and decide whether one authenticated retry is worth it: only for
    /// the first 401, with credentials of either kind and a Digest challenge. Basic
    /// credentials already went out with the first request, so a Basic challenge is final.
    /// A challenge that cannot be parsed fails the session only when a retry was possible.
    fn on_unauthorized(&mut self) -> Result<Next> {
        self.challenges_seen += 1;
        let retry_possible = self.challenges_seen == 1 && self.credentials.kind != AuthKind::None;
        // Digest is the only scheme a retry can answer.
        let selected = auth::select_challenge(
            self.response.headers_named("WWW-Authenticate"),
            AuthKind::Digest,
        );
        match selected {
            Ok(challenge) => {
                let digest = matches!(challenge, Challenge::Digest(_));
                debug!(scheme = challenge.kind().as_str(), seen = self.challenges_seen, "challenge");
                self.challenge = Some(challenge);
                Ok(if retry_possible && digest { Next::Retry } else { Next::Finish })
            }
            Err(e) if retry_possible => Err(e),
            Err(e) => {
                debug!(error = %e, "ignoring unusable challenge");
                Ok(Next::Finish)
            }
        }
    }

    async fn send_request<T: Transport>(&self, transport: &mut T, authorization: Option<&str>) -> Result<()> {
        let Some(target) = self.target.as_ref() else {
            return Err(Error::param("no URI set"));
        };
        let request = build_request(self.method, target, authorization, &self.config.user_agent, &self.body);
        trace!(request = %redacted_head(&request), "request");
        transport.send(&request, self.config.send_timeout()).await
    }

    async fn send_form<T: Transport>(&mut self, transport: &mut T) -> Result<()> {
        let Some(form) = self.body.form() else {
            return Err(Error::param("no form body to send"));
        };
        if self.body_sends >= MAX_BODY_SENDS {
            return Err(Error::new(ErrorKind::RetryExhausted, "form body already sent twice"));
        }
        let payload = form_payload(form);
        debug!(bytes = payload.len(), parts = form.part_count(), "sending form body");
        transport.send(&payload, self.config.send_timeout()).await?;
        self.body_sends += 1;
        self.response.continuation_pending = false;
        Ok(())
    }
}
