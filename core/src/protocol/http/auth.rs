/*
 * auth.rs
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

//! HTTP authentication: Basic credentials and Digest (RFC 2617, MD5) responses, plus
//! parsing of `WWW-Authenticate` challenges.
//!
//! Digest works on the lowercase hex text of each MD5, never on raw digest bytes:
//! - HA1 = MD5(user:realm:password)
//! - HA2 = MD5(METHOD:uri)
//! - response = MD5(HA1:nonce:nc:cnonce:qop:HA2) with qop=auth, MD5(HA1:nonce:HA2) without.
//!
//! The nonce count is always 00000001: a session retries at most once per challenge.

use md5::{Digest, Md5};
use rand::RngCore;

use crate::base64_codec;
use crate::error::{Error, ErrorKind, Result};

pub const NONCE_COUNT: &str = "00000001";

/// Longest challenge parameter accepted; anything longer is treated as hostile.
const MAX_PARAM_LEN: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthKind {
    #[default]
    None,
    Digest,
    Basic,
}

impl AuthKind {
    /// C-style selector: 0 = none, 1 = Digest, 2 = Basic.
    pub fn from_selector(selector: i32) -> Result<Self> {
        match selector {
            0 => Ok(AuthKind::None),
            1 => Ok(AuthKind::Digest),
            2 => Ok(AuthKind::Basic),
            _ => Err(Error::param(format!("auth type {} out of range", selector))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AuthKind::None => "None",
            AuthKind::Digest => "Digest",
            AuthKind::Basic => "Basic",
        }
    }
}

/// Parameters of a Digest challenge. `qop` is either empty or `auth`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub qop: String,
    pub opaque: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
    Basic { realm: Option<String> },
    Digest(DigestChallenge),
}

impl Challenge {
    pub fn kind(&self) -> AuthKind {
        match self {
            Challenge::Basic { .. } => AuthKind::Basic,
            Challenge::Digest(_) => AuthKind::Digest,
        }
    }
}

fn bad_challenge(msg: impl Into<String>) -> Error {
    Error::new(ErrorKind::BadChallenge, msg)
}

/// Split `k=v, k="quoted, v"` into pairs. Unterminated quotes and bare words fail.
fn parse_params(mut s: &str) -> Result<Vec<(String, String)>> {
    let mut params = Vec::new();
    loop {
        s = s.trim_start_matches(|c: char| c == ',' || c.is_ascii_whitespace());
        if s.is_empty() {
            return Ok(params);
        }
        let eq = s.find('=').ok_or_else(|| bad_challenge("parameter without value"))?;
        let name = s[..eq].trim();
        if name.is_empty() || name.contains(|c: char| c.is_ascii_whitespace() || c == ',' || c == '"') {
            return Err(bad_challenge(format!("invalid parameter name {:?}", name)));
        }
        s = s[eq + 1..].trim_start();
        let value = if let Some(rest) = s.strip_prefix('"') {
            let mut value = String::new();
            let mut chars = rest.char_indices();
            let mut end = None;
            while let Some((i, c)) = chars.next() {
                match c {
                    '\\' => match chars.next() {
                        Some((_, escaped)) => value.push(escaped),
                        None => break,
                    },
                    '"' => {
                        end = Some(i);
                        break;
                    }
                    _ => value.push(c),
                }
            }
            let end = end.ok_or_else(|| bad_challenge("unterminated quoted string"))?;
            s = &rest[end + 1..];
            value
        } else {
            let end = s
                .find(|c: char| c == ',' || c.is_ascii_whitespace())
                .unwrap_or(s.len());
            let value = s[..end].to_string();
            s = &s[end..];
            value
        };
        if value.len() > MAX_PARAM_LEN {
            return Err(bad_challenge(format!("parameter {} too long", name)));
        }
        params.push((name.to_ascii_lowercase(), value));
    }
}

/// Parse a `WWW-Authenticate` value. Fails closed: a Digest challenge without realm or
/// nonce, with a non-MD5 algorithm, or offering only `auth-int` is rejected.
pub fn parse_challenge(header: &str) -> Result<Challenge> {
    let header = header.trim();
    let (scheme, rest) = match header.find(|c: char| c.is_ascii_whitespace()) {
        Some(i) => (&header[..i], &header[i..]),
        None => (header, ""),
    };
    if scheme.eq_ignore_ascii_case("basic") {
        let realm = parse_params(rest)?
            .into_iter()
            .find(|(k, _)| k == "realm")
            .map(|(_, v)| v);
        return Ok(Challenge::Basic { realm });
    }
    if !scheme.eq_ignore_ascii_case("digest") {
        return Err(bad_challenge(format!("unsupported scheme {:?}", scheme)));
    }

    let mut realm = None;
    let mut nonce = None;
    let mut qop_options = None;
    let mut opaque = None;
    for (name, value) in parse_params(rest)? {
        match name.as_str() {
            "realm" => realm = Some(value),
            "nonce" => nonce = Some(value),
            "qop" => qop_options = Some(value),
            "opaque" => opaque = Some(value),
            "algorithm" => {
                if !value.eq_ignore_ascii_case("md5") {
                    return Err(bad_challenge(format!("unsupported algorithm {}", value)));
                }
            }
            _ => {}
        }
    }
    let realm = realm.ok_or_else(|| bad_challenge("Digest challenge without realm"))?;
    let nonce = nonce
        .filter(|n| !n.is_empty())
        .ok_or_else(|| bad_challenge("Digest challenge without nonce"))?;
    let qop = match qop_options {
        None => String::new(),
        Some(options) => {
            if options.split(',').any(|o| o.trim().eq_ignore_ascii_case("auth")) {
                "auth".to_string()
            } else {
                return Err(bad_challenge(format!("unsupported qop {}", options)));
            }
        }
    };
    Ok(Challenge::Digest(DigestChallenge {
        realm,
        nonce,
        qop,
        opaque,
    }))
}

/// Pick the challenge to answer among every `WWW-Authenticate` value of a 401: the first
/// one of the `preferred` kind, else the first that parses.
pub fn select_challenge<'a>(
    values: impl IntoIterator<Item = &'a str>,
    preferred: AuthKind,
) -> Result<Challenge> {
    let mut fallback = None;
    let mut last_error = None;
    for value in values {
        match parse_challenge(value) {
            Ok(challenge) if challenge.kind() == preferred => return Ok(challenge),
            Ok(challenge) => {
                fallback.get_or_insert(challenge);
            }
            Err(e) => last_error = Some(e),
        }
    }
    fallback.ok_or_else(|| last_error.unwrap_or_else(|| bad_challenge("401 without WWW-Authenticate")))
}

/// Lowercase hex MD5 of the input.
pub fn md5_hex(input: &[u8]) -> String {
    let digest = Md5::digest(input);
    let mut hex = String::with_capacity(32);
    for b in digest.iter() {
        hex.push_str(&format!("{:02x}", b));
    }
    hex
}

/// Everything the Digest `response` value depends on.
#[derive(Debug, Clone, Copy)]
pub struct DigestInput<'a> {
    pub username: &'a str,
    pub realm: &'a str,
    pub password: &'a str,
    pub nonce: &'a str,
    /// Empty or `auth`.
    pub qop: &'a str,
    pub method: &'a str,
    pub uri: &'a str,
    pub cnonce: &'a str,
}

pub fn digest_response(input: &DigestInput<'_>) -> String {
    let ha1 = md5_hex(format!("{}:{}:{}", input.username, input.realm, input.password).as_bytes());
    let ha2 = md5_hex(format!("{}:{}", input.method, input.uri).as_bytes());
    if input.qop == "auth" {
        md5_hex(
            format!(
                "{}:{}:{}:{}:{}:{}",
                ha1, input.nonce, NONCE_COUNT, input.cnonce, input.qop, ha2
            )
            .as_bytes(),
        )
    } else {
        md5_hex(format!("{}:{}:{}", ha1, input.nonce, ha2).as_bytes())
    }
}

/// Fresh client nonce: 16 random bytes as hex, base64-encoded.
pub fn generate_cnonce() -> String {
    let mut raw = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut raw);
    let hex: String = raw.iter().map(|b| format!("{:02x}", b)).collect();
    base64_codec::encode(hex.as_bytes())
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// `Authorization` value answering a Digest challenge.
pub fn digest_authorization(
    username: &str,
    password: &str,
    challenge: &DigestChallenge,
    method: &str,
    uri: &str,
    cnonce: &str,
) -> String {
    let response = digest_response(&DigestInput {
        username,
        realm: &challenge.realm,
        password,
        nonce: &challenge.nonce,
        qop: &challenge.qop,
        method,
        uri,
        cnonce,
    });
    let mut value = format!(
        "Digest username={}, realm={}, nonce={}, uri={}",
        quote(username),
        quote(&challenge.realm),
        quote(&challenge.nonce),
        quote(uri)
    );
    if !challenge.qop.is_empty() {
        value.push_str(&format!(
            ", cnonce={}, nc={}, qop={}",
            quote(cnonce),
            NONCE_COUNT,
            challenge.qop
        ));
    }
    value.push_str(&format!(", response={}", quote(&response)));
    if let Some(opaque) = &challenge.opaque {
        value.push_str(&format!(", opaque={}", quote(opaque)));
    }
    value
}

/// `Authorization` value for Basic: base64("user:password").
pub fn basic_authorization(username: &str, password: &str) -> String {
    format!(
        "Basic {}",
        base64_codec::encode(format!("{}:{}", username, password).as_bytes())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const RFC2617_CHALLENGE: &str = r#"Digest realm="testrealm@host.com", qop="auth,auth-int", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#;

    #[test]
    fn rfc2617_worked_example() {
        let response = digest_response(&DigestInput {
            username: "Mufasa",
            realm: "testrealm@host.com",
            password: "Circle Of Life",
            nonce: "dcd98b7102dd2f0e8b11d0f600bfb0c093",
            qop: "auth",
            method: "GET",
            uri: "/dir/index.html",
            cnonce: "0a4f113b",
        });
        assert_eq!(response, "6629fae49393a05397450978507c4ef1");
    }

    #[test]
    fn without_qop_uses_short_form() {
        let input = DigestInput {
            username: "Mufasa",
            realm: "testrealm@host.com",
            password: "Circle Of Life",
            nonce: "dcd98b7102dd2f0e8b11d0f600bfb0c093",
            qop: "",
            method: "GET",
            uri: "/dir/index.html",
            cnonce: "ignored",
        };
        let ha1 = md5_hex(b"Mufasa:testrealm@host.com:Circle Of Life");
        let ha2 = md5_hex(b"GET:/dir/index.html");
        let expected = md5_hex(format!("{}:dcd98b7102dd2f0e8b11d0f600bfb0c093:{}", ha1, ha2).as_bytes());
        assert_eq!(digest_response(&input), expected);
    }

    #[test]
    fn md5_hex_is_lowercase() {
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn parses_rfc2617_challenge() {
        let challenge = parse_challenge(RFC2617_CHALLENGE).unwrap();
        assert_eq!(
            challenge,
            Challenge::Digest(DigestChallenge {
                realm: "testrealm@host.com".into(),
                nonce: "dcd98b7102dd2f0e8b11d0f600bfb0c093".into(),
                qop: "auth".into(),
                opaque: Some("5ccc069c403ebaf9f0171e9517f40e41".into()),
            })
        );
    }

    #[test]
    fn parses_unquoted_and_escaped_values() {
        let challenge =
            parse_challenge(r#"digest realm="a \"quoted\" realm", nonce=abc123, algorithm=MD5"#)
                .unwrap();
        match challenge {
            Challenge::Digest(d) => {
                assert_eq!(d.realm, r#"a "quoted" realm"#);
                assert_eq!(d.nonce, "abc123");
                assert!(d.qop.is_empty());
                assert!(d.opaque.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn basic_challenge() {
        assert_eq!(
            parse_challenge(r#"Basic realm="Users""#).unwrap(),
            Challenge::Basic { realm: Some("Users".into()) }
        );
        assert_eq!(parse_challenge("Basic").unwrap().kind(), AuthKind::Basic);
    }

    #[test]
    fn malformed_challenges_fail_closed() {
        for header in [
            "",
            "Bearer realm=\"x\"",
            r#"Digest realm="x""#,
            r#"Digest nonce="n""#,
            r#"Digest realm="x", nonce="n"#,
            r#"Digest realm="x", nonce="n", qop="auth-int""#,
            r#"Digest realm="x", nonce="n", algorithm=SHA-256"#,
            r#"Digest realm, nonce="n""#,
        ] {
            let err = parse_challenge(header).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::BadChallenge, "{}", header);
        }
        let long = format!(r#"Digest realm="x", nonce="{}""#, "n".repeat(MAX_PARAM_LEN + 1));
        assert_eq!(parse_challenge(&long).unwrap_err().kind(), ErrorKind::BadChallenge);
    }

    #[test]
    fn digest_header_fields() {
        let Challenge::Digest(challenge) = parse_challenge(RFC2617_CHALLENGE).unwrap() else {
            panic!("expected digest");
        };
        let value = digest_authorization(
            "Mufasa",
            "Circle Of Life",
            &challenge,
            "GET",
            "/dir/index.html",
            "0a4f113b",
        );
        assert_eq!(
            value,
            "Digest username=\"Mufasa\", realm=\"testrealm@host.com\", \
             nonce=\"dcd98b7102dd2f0e8b11d0f600bfb0c093\", uri=\"/dir/index.html\", \
             cnonce=\"0a4f113b\", nc=00000001, qop=auth, \
             response=\"6629fae49393a05397450978507c4ef1\", \
             opaque=\"5ccc069c403ebaf9f0171e9517f40e41\""
        );
    }

    #[test]
    fn digest_header_without_qop_omits_client_nonce() {
        let challenge = DigestChallenge {
            realm: "r".into(),
            nonce: "n".into(),
            qop: String::new(),
            opaque: None,
        };
        let value = digest_authorization("u", "p", &challenge, "PUT", "/x", "c");
        assert!(!value.contains("cnonce"));
        assert!(!value.contains("nc="));
        assert!(value.ends_with('"'));
    }

    #[test]
    fn cnonce_is_random_base64_of_hex() {
        let a = generate_cnonce();
        let b = generate_cnonce();
        assert_ne!(a, b);
        let decoded = base64_codec::decode(&a).unwrap();
        assert_eq!(decoded.len(), 32);
        assert!(decoded.iter().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn basic_header() {
        assert_eq!(basic_authorization("Aladdin", "open sesame"), "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    }

    #[test]
    fn prefers_configured_scheme() {
        let values = [r#"Basic realm="r""#, r#"Digest realm="r", nonce="n""#];
        assert_eq!(select_challenge(values, AuthKind::Digest).unwrap().kind(), AuthKind::Digest);
        assert_eq!(select_challenge(values, AuthKind::Basic).unwrap().kind(), AuthKind::Basic);
        let only_basic = [r#"Basic realm="r""#, "Negotiate"];
        assert_eq!(select_challenge(only_basic, AuthKind::Digest).unwrap().kind(), AuthKind::Basic);
        let err = select_challenge(std::iter::empty(), AuthKind::Digest).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadChallenge);
        let err = select_challenge(["Digest realm=\"x\""], AuthKind::Digest).unwrap_err();
        assert!(err.message().contains("nonce"));
    }

    #[test]
    fn selector_out_of_range() {
        assert_eq!(AuthKind::from_selector(1).unwrap(), AuthKind::Digest);
        assert_eq!(AuthKind::from_selector(3).unwrap_err().kind(), ErrorKind::Param);
    }
}
