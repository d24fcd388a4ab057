/*
 * net.rs
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

//! TLS client configuration built from `TlsOptions`: trust anchors, optional client
//! identity, protocol version, and the no-verification mode.

use std::sync::{Arc, OnceLock};

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::ClientConfig;
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, RootCertStore, SignatureScheme};
use tracing::{debug, warn};

use crate::config::{TlsOptions, TlsVersion};
use crate::error::{Error, ErrorKind, Result};

/// Build a root certificate store: platform native certs first, then webpki-roots as fallback.
fn build_root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            for cert in certs {
                let _ = root_store.add(cert);
            }
        }
        Err(e) => debug!(error = %e, "native certificate store unavailable"),
    }
    if root_store.is_empty() {
        root_store.roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    }
    root_store
}

static DEFAULT_CONFIG: OnceLock<Arc<ClientConfig>> = OnceLock::new();

fn tls_error(context: &str, e: impl std::fmt::Display) -> Error {
    Error::new(ErrorKind::Tls, format!("{}: {}", context, e))
}

fn load_certs(path: &std::path::Path) -> Result<Vec<CertificateDer<'static>>> {
    let certs = CertificateDer::pem_file_iter(path)
        .map_err(|e| Error::new(ErrorKind::NoFile, format!("{}: {}", path.display(), e)))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| tls_error(&path.display().to_string(), e))?;
    if certs.is_empty() {
        return Err(tls_error(&path.display().to_string(), "no certificates in file"));
    }
    Ok(certs)
}

/// Client configuration for the given options. The all-defaults case is built once and shared.
pub fn client_config(options: &TlsOptions) -> Result<Arc<ClientConfig>> {
    if *options == TlsOptions::default() {
        if let Some(config) = DEFAULT_CONFIG.get() {
            return Ok(config.clone());
        }
    }

    let versions: &[&'static rustls::SupportedProtocolVersion] = match options.version {
        TlsVersion::Any => rustls::DEFAULT_VERSIONS,
        TlsVersion::Tls12 => &[&rustls::version::TLS12],
        TlsVersion::Tls13 => &[&rustls::version::TLS13],
    };
    let builder = ClientConfig::builder_with_protocol_versions(versions);

    let builder = if options.verify_server {
        let mut roots = build_root_store();
        if let Some(ca) = &options.ca_file {
            for cert in load_certs(ca)? {
                roots
                    .add(cert)
                    .map_err(|e| tls_error("invalid CA certificate", e))?;
            }
        }
        builder.with_root_certificates(roots)
    } else {
        warn!("server certificate verification disabled");
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoServerVerification::new()))
    };

    let config = match (&options.client_cert, &options.client_key) {
        (Some(cert), Some(key)) => {
            let chain = load_certs(cert)?;
            let key = PrivateKeyDer::from_pem_file(key)
                .map_err(|e| tls_error(&key.display().to_string(), e))?;
            builder
                .with_client_auth_cert(chain, key)
                .map_err(|e| tls_error("client certificate rejected", e))?
        }
        (None, None) => builder.with_no_client_auth(),
        _ => {
            return Err(Error::param(
                "client certificate and key must be configured together",
            ))
        }
    };

    let config = Arc::new(config);
    if *options == TlsOptions::default() {
        let _ = DEFAULT_CONFIG.set(config.clone());
    }
    Ok(config)
}

/// Server name for SNI and verification.
pub fn server_name(host: &str) -> Result<ServerName<'static>> {
    ServerName::try_from(host.to_string())
        .map_err(|_| Error::new(ErrorKind::Tls, format!("invalid host name {}", host)))
}

/// Accepts any certificate but still checks handshake signatures.
#[derive(Debug)]
struct NoServerVerification {
    provider: Arc<CryptoProvider>,
}

impl NoServerVerification {
    fn new() -> Self {
        let provider = CryptoProvider::get_default()
            .cloned()
            .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()));
        Self { provider }
    }
}

impl ServerCertVerifier for NoServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
