/*
 * base64_codec.rs
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

//! Base64 (RFC 4648, standard alphabet, padded). Used for Basic credentials and the
//! Digest client nonce.

use std::fmt;
use std::sync::OnceLock;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Marks a byte that is not part of the alphabet.
const INVALID: u8 = 0xFF;

static DECODE_TABLE: OnceLock<[u8; 256]> = OnceLock::new();

#[cfg(test)]
static TABLE_BUILDS: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

/// Reverse lookup table, built on first decode and shared by every thread afterwards.
fn decode_table() -> &'static [u8; 256] {
    DECODE_TABLE.get_or_init(|| {
        #[cfg(test)]
        TABLE_BUILDS.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut table = [INVALID; 256];
        for (i, &c) in ALPHABET.iter().enumerate() {
            table[c as usize] = i as u8;
        }
        table
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Input length is not a multiple of 4.
    InvalidLength(usize),
    /// Byte outside the alphabet, or padding before the final two positions.
    InvalidCharacter { offset: usize, byte: u8 },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::InvalidLength(n) => write!(f, "base64 length {} is not a multiple of 4", n),
            DecodeError::InvalidCharacter { offset, byte } => {
                write!(f, "invalid base64 byte 0x{:02x} at offset {}", byte, offset)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Encode bytes; output length is always `4 * ceil(n / 3)`.
pub fn encode(input: &[u8]) -> String {
    let mut out = String::with_capacity((input.len() + 2) / 3 * 4);
    for chunk in input.chunks(3) {
        let n = (chunk[0] as usize) << 16
            | (chunk.get(1).copied().unwrap_or(0) as usize) << 8
            | chunk.get(2).copied().unwrap_or(0) as usize;
        out.push(ALPHABET[n >> 18] as char);
        out.push(ALPHABET[(n >> 12) & 63] as char);
        out.push(if chunk.len() > 1 {
            ALPHABET[(n >> 6) & 63] as char
        } else {
            '='
        });
        out.push(if chunk.len() > 2 {
            ALPHABET[n & 63] as char
        } else {
            '='
        });
    }
    out
}

/// Decode padded base64 text.
pub fn decode(input: &str) -> Result<Vec<u8>, DecodeError> {
    let data = input.as_bytes();
    if data.len() % 4 != 0 {
        return Err(DecodeError::InvalidLength(data.len()));
    }
    let table = decode_table();
    let mut out = Vec::with_capacity(data.len() / 4 * 3);
    let quads = data.len() / 4;
    for (q, quad) in data.chunks(4).enumerate() {
        let last = q + 1 == quads;
        let mut n = 0u32;
        let mut pad = 0usize;
        for (i, &b) in quad.iter().enumerate() {
            let offset = q * 4 + i;
            let v = if b == b'=' {
                // Padding only in the last one or two positions of the final quad.
                if !last || i < 2 || (i == 2 && quad[3] != b'=') {
                    return Err(DecodeError::InvalidCharacter { offset, byte: b });
                }
                pad += 1;
                0
            } else {
                if pad > 0 {
                    return Err(DecodeError::InvalidCharacter { offset, byte: b });
                }
                match table[b as usize] {
                    INVALID => return Err(DecodeError::InvalidCharacter { offset, byte: b }),
                    v => v as u32,
                }
            };
            n = (n << 6) | v;
        }
        out.push((n >> 16) as u8);
        if pad < 2 {
            out.push((n >> 8) as u8);
        }
        if pad < 1 {
            out.push(n as u8);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    #[test]
    fn rfc4648_vectors() {
        let vectors = [
            ("", ""),
            ("f", "Zg=="),
            ("fo", "Zm8="),
            ("foo", "Zm9v"),
            ("foob", "Zm9vYg=="),
            ("fooba", "Zm9vYmE="),
            ("foobar", "Zm9vYmFy"),
        ];
        for (plain, encoded) in vectors {
            assert_eq!(encode(plain.as_bytes()), encoded);
            assert_eq!(decode(encoded).unwrap(), plain.as_bytes());
        }
    }

    #[test]
    fn basic_credentials() {
        assert_eq!(encode(b"Aladdin:open sesame"), "QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    }

    #[test]
    fn random_inputs_match_reference_and_roundtrip() {
        let mut rng = StdRng::seed_from_u64(0x6b68_7474_70);
        for len in 0..200usize {
            let mut data = vec![0u8; len];
            rng.fill_bytes(&mut data);
            let ours = encode(&data);
            assert_eq!(ours.len(), 4 * ((len + 2) / 3));
            assert_eq!(ours, STANDARD.encode(&data));
            assert_eq!(decode(&ours).unwrap(), data);
        }
    }

    #[test]
    fn rejects_length_not_multiple_of_four() {
        assert_eq!(decode("Zm9vY"), Err(DecodeError::InvalidLength(5)));
        assert_eq!(decode("Zg="), Err(DecodeError::InvalidLength(3)));
    }

    #[test]
    fn rejects_misplaced_padding_and_foreign_bytes() {
        assert!(matches!(decode("Z=9v"), Err(DecodeError::InvalidCharacter { offset: 1, .. })));
        assert!(matches!(decode("Zg==Zm9v"), Err(DecodeError::InvalidCharacter { offset: 2, .. })));
        assert!(matches!(decode("Zm9=v==="), Err(DecodeError::InvalidCharacter { .. })));
        assert!(matches!(decode("Zm9-"), Err(DecodeError::InvalidCharacter { offset: 3, byte: b'-' })));
    }

    #[test]
    fn decode_table_is_built_once_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| decode("Zm9vYmFy").unwrap()))
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), b"foobar");
        }
        decode("Zg==").unwrap();
        assert_eq!(TABLE_BUILDS.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
