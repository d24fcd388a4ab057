/*
 * client.rs
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

//! Connection setup: resolve, connect to each address in turn, then the TLS handshake for
//! https targets.

use std::time::Duration;

use tokio::net::{lookup_host, TcpStream};
use tokio::time::{timeout, timeout_at, Instant};
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::config::TlsOptions;
use crate::error::{Error, ErrorKind, Result};
use crate::net::{client_config, server_name};
use crate::uri::Target;

use super::connection::{Connection, HttpStream};

/// Open a connection to `target`. The whole setup, handshake included, is bounded by
/// `connect_timeout`.
pub async fn connect(target: &Target, tls: &TlsOptions, connect_timeout: Duration) -> Result<Connection> {
    let deadline = Instant::now() + connect_timeout;
    let peer = format!("{}:{}", target.host, target.port);

    let addrs: Vec<_> = match timeout_at(deadline, lookup_host((target.host.as_str(), target.port))).await {
        Err(_) => return Err(Error::new(ErrorKind::Timeout, format!("resolving {} timed out", target.host))),
        Ok(Err(e)) => return Err(Error::new(ErrorKind::Dns, format!("{}: {}", target.host, e))),
        Ok(Ok(addrs)) => addrs.collect(),
    };
    if addrs.is_empty() {
        return Err(Error::new(ErrorKind::Dns, format!("{}: no addresses", target.host)));
    }

    let mut last_error = None;
    let mut tcp = None;
    for addr in &addrs {
        match timeout_at(deadline, TcpStream::connect(*addr)).await {
            Err(_) => {
                return Err(Error::new(
                    ErrorKind::Timeout,
                    format!("connect to {} timed out", peer),
                ))
            }
            Ok(Err(e)) => {
                debug!(%addr, error = %e, "connect failed");
                last_error = Some(e);
            }
            Ok(Ok(stream)) => {
                tcp = Some(stream);
                break;
            }
        }
    }
    let tcp = match tcp {
        Some(tcp) => tcp,
        None => {
            let detail = last_error.map(|e| e.to_string()).unwrap_or_default();
            return Err(Error::new(ErrorKind::Connect, format!("{}: {}", peer, detail)));
        }
    };
    debug!(peer = %peer, secure = target.scheme.is_secure(), "connected");

    if !target.scheme.is_secure() {
        return Ok(Connection::new(HttpStream::Plain(tcp), peer));
    }

    let name = server_name(&target.host)?;
    let connector = TlsConnector::from(client_config(tls)?);
    let remaining = deadline.saturating_duration_since(Instant::now());
    let stream = match timeout(remaining, connector.connect(name, tcp)).await {
        Err(_) => return Err(Error::new(ErrorKind::Timeout, format!("TLS handshake with {} timed out", peer))),
        Ok(Err(e)) => return Err(Error::new(ErrorKind::Tls, format!("{}: {}", peer, e))),
        Ok(Ok(stream)) => stream,
    };
    if let Some(version) = stream.get_ref().1.protocol_version() {
        debug!(peer = %peer, ?version, "TLS established");
    }
    Ok(Connection::new(HttpStream::Tls(Box::new(stream)), peer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connects_to_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let target = Target::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
        let conn = connect(&target, &TlsOptions::default(), Duration::from_secs(2))
            .await
            .unwrap();
        assert!(conn.is_open());
        assert!(!conn.is_secure());
        assert_eq!(conn.peer(), format!("127.0.0.1:{}", port));
    }

    #[tokio::test]
    async fn refused_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let target = Target::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
        let err = connect(&target, &TlsOptions::default(), Duration::from_secs(2))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Connect);
    }

    #[tokio::test]
    async fn unresolvable_host_is_dns_error() {
        let target = Target::parse("http://nonexistent.invalid/").unwrap();
        let err = connect(&target, &TlsOptions::default(), Duration::from_secs(5))
            .await
            .err()
            .unwrap();
        assert!(matches!(err.kind(), ErrorKind::Dns | ErrorKind::Timeout));
    }
}
