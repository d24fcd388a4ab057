/*
 * config.rs
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

//! Client configuration: timeouts, buffer sizes, user agent, retry bound and TLS options.
//! Every field has a default, so a partial JSON document (or none at all) is enough.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};

pub const DEFAULT_USER_AGENT: &str = "khttp/0.1";

fn default_connect_timeout_ms() -> u64 {
    15_000
}

fn default_send_timeout_ms() -> u64 {
    5_000
}

fn default_recv_timeout_ms() -> u64 {
    5_000
}

fn default_recv_buffer_size() -> usize {
    4096
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_max_attempts() -> u32 {
    4
}

/// Per-session settings handed to the transport and the session loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    #[serde(default = "default_recv_timeout_ms")]
    pub recv_timeout_ms: u64,
    /// Upper bound for a single transport read.
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Request/receive rounds allowed in one `perform` before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub tls: TlsOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            send_timeout_ms: default_send_timeout_ms(),
            recv_timeout_ms: default_recv_timeout_ms(),
            recv_buffer_size: default_recv_buffer_size(),
            user_agent: default_user_agent(),
            max_attempts: default_max_attempts(),
            tls: TlsOptions::default(),
        }
    }
}

impl ClientConfig {
    /// Parse a (possibly partial) JSON configuration document.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: ClientConfig = serde_json::from_str(text)
            .map_err(|e| Error::param(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.recv_buffer_size == 0 {
            return Err(Error::param("recv_buffer_size must be positive"));
        }
        if self.max_attempts < 2 {
            return Err(Error::param("max_attempts must allow at least one retry"));
        }
        if self.user_agent.contains(['\r', '\n']) {
            return Err(Error::param("user_agent must be a single line"));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }
}

/// TLS protocol version selector. rustls only speaks TLS 1.2 and 1.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsVersion {
    #[default]
    Any,
    Tls12,
    Tls13,
}

impl TlsVersion {
    /// Map a C-style selector: 0 = any, 1 = SSLv3, 2 = TLSv1, 3 = TLSv1.1, 4 = TLSv1.2, 5 = TLSv1.3.
    pub fn from_selector(selector: i32) -> Result<Self> {
        match selector {
            0 => Ok(TlsVersion::Any),
            1..=3 => Err(Error::new(
                ErrorKind::NotSupported,
                "SSLv3, TLSv1.0 and TLSv1.1 are not supported",
            )),
            4 => Ok(TlsVersion::Tls12),
            5 => Ok(TlsVersion::Tls13),
            _ => Err(Error::param(format!("TLS method {} out of range", selector))),
        }
    }
}

/// Certificate and verification options for HTTPS targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsOptions {
    #[serde(default = "verify_default")]
    pub verify_server: bool,
    /// Extra trust anchors (PEM). Native and Mozilla roots are used otherwise.
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
    #[serde(default)]
    pub client_cert: Option<PathBuf>,
    #[serde(default)]
    pub client_key: Option<PathBuf>,
    #[serde(default)]
    pub version: TlsVersion,
}

fn verify_default() -> bool {
    true
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            verify_server: true,
            ca_file: None,
            client_cert: None,
            client_key: None,
            version: TlsVersion::Any,
        }
    }
}

impl TlsOptions {
    /// Accept any server certificate.
    pub fn skip_server_verification(&mut self) -> &mut Self {
        self.verify_server = false;
        self
    }

    pub fn set_ca_file(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let path = existing_file(path.as_ref())?;
        self.ca_file = Some(path);
        Ok(self)
    }

    /// Client certificate chain and private key (both PEM). Both files must exist.
    pub fn set_client_identity(
        &mut self,
        cert: impl AsRef<Path>,
        key: impl AsRef<Path>,
    ) -> Result<&mut Self> {
        let cert = existing_file(cert.as_ref())?;
        let key = existing_file(key.as_ref())?;
        self.client_cert = Some(cert);
        self.client_key = Some(key);
        Ok(self)
    }
}

fn existing_file(path: &Path) -> Result<PathBuf> {
    match std::fs::metadata(path) {
        Ok(m) if m.is_file() && m.len() > 0 => Ok(path.to_path_buf()),
        _ => Err(Error::new(ErrorKind::NoFile, path.display().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let c = ClientConfig::from_json(r#"{"recv_timeout_ms": 250, "tls": {"verify_server": false}}"#)
            .unwrap();
        assert_eq!(c.recv_timeout(), Duration::from_millis(250));
        assert_eq!(c.send_timeout_ms, 5_000);
        assert_eq!(c.user_agent, DEFAULT_USER_AGENT);
        assert!(!c.tls.verify_server);
        assert_eq!(c.tls.version, TlsVersion::Any);
    }

    #[test]
    fn empty_json_is_default() {
        assert_eq!(ClientConfig::from_json("{}").unwrap(), ClientConfig::default());
    }

    #[test]
    fn invalid_values_rejected() {
        let e = ClientConfig::from_json(r#"{"max_attempts": 1}"#).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Param);
        let e = ClientConfig::from_json(r#"{"user_agent": "a\r\nX-Injected: 1"}"#).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Param);
        let e = ClientConfig::from_json("not json").unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Param);
    }

    #[test]
    fn tls_version_selectors() {
        assert_eq!(TlsVersion::from_selector(4).unwrap(), TlsVersion::Tls12);
        assert_eq!(TlsVersion::from_selector(2).unwrap_err().kind(), ErrorKind::NotSupported);
        assert_eq!(TlsVersion::from_selector(9).unwrap_err().kind(), ErrorKind::Param);
    }

    #[test]
    fn missing_certificate_is_no_file() {
        let mut tls = TlsOptions::default();
        let e = tls
            .set_client_identity("/nonexistent/khttp-cert.pem", "/nonexistent/khttp-key.pem")
            .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::NoFile);
        assert!(tls.client_cert.is_none());
    }
}
