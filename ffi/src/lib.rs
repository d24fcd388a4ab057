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

//! C FFI for khttp core. A session is an opaque handle from khttp_new, released with
//! khttp_destroy. Functions returning int give 0 on success or a negative error code
//! (see khttp_last_error for the message). All string parameters are UTF-8 NUL-terminated.
//! khttp_perform blocks the calling thread; do not call it from inside a tokio runtime.

use libc::{c_char, c_int, size_t};
use std::ffi::{CStr, CString};
use std::ptr;

use khttp_core::{AuthKind, Error, ErrorKind, Method, Session, TlsVersion};

pub const KHTTP_OK: c_int = 0;

/// Form field types for khttp_set_post_form.
pub const KHTTP_FORM_STRING: c_int = 0;
pub const KHTTP_FORM_FILE: c_int = 1;

/// Auth type for khttp_set_username_password. Anything else means Basic.
pub const KHTTP_AUTH_DIGEST: c_int = 1;
pub const KHTTP_AUTH_BASIC: c_int = 2;

/// Hosts the shared tokio runtime that drives every perform.
struct Registry {
    runtime: tokio::runtime::Runtime,
}

fn registry() -> Result<&'static Registry, Error> {
    static REGISTRY: once_cell::sync::OnceCell<Registry> = once_cell::sync::OnceCell::new();
    REGISTRY.get_or_try_init(|| {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(|e| Error::new(ErrorKind::OutOfMemory, format!("tokio runtime: {}", e)))?;
        Ok(Registry { runtime })
    })
}

/// Opaque session handle.
pub struct KhttpCtx {
    session: Session,
    /// Backing store for the last string handed out by khttp_find_header.
    header_value: Option<CString>,
}

thread_local! {
    static LAST_ERROR: std::cell::RefCell<Option<CString>> = const { std::cell::RefCell::new(None) };
}

fn set_last_error(err: &Error) {
    let msg = CString::new(err.to_string().replace('\0', " ")).unwrap_or_default();
    LAST_ERROR.with(|e| *e.borrow_mut() = Some(msg));
}

fn clear_last_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
}

fn ptr_to_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string()) }
}

fn ctx_mut<'a>(ctx: *mut KhttpCtx) -> Result<&'a mut KhttpCtx, Error> {
    unsafe { ctx.as_mut() }.ok_or_else(|| Error::param("null session"))
}

fn arg(ptr: *const c_char, what: &str) -> Result<String, Error> {
    ptr_to_str(ptr).ok_or_else(|| Error::param(format!("{} missing or not UTF-8", what)))
}

/// Map a result to the C convention, recording the error message.
fn status(result: Result<(), Error>) -> c_int {
    match result {
        Ok(()) => {
            clear_last_error();
            KHTTP_OK
        }
        Err(e) => {
            tracing::debug!(error = %e, "khttp call failed");
            let code = e.kind().code();
            set_last_error(&e);
            code
        }
    }
}

/// New session with default configuration. Free with khttp_destroy.
#[no_mangle]
pub extern "C" fn khttp_new() -> *mut KhttpCtx {
    Box::into_raw(Box::new(KhttpCtx {
        session: Session::new(),
        header_value: None,
    }))
}

/// Release a session. No-op if ctx is NULL.
#[no_mangle]
pub unsafe extern "C" fn khttp_destroy(ctx: *mut KhttpCtx) {
    if !ctx.is_null() {
        drop(Box::from_raw(ctx));
    }
}

/// Last error message on this thread. Valid until the next failing call. Do not free.
#[no_mangle]
pub extern "C" fn khttp_last_error() -> *const c_char {
    LAST_ERROR.with(|e| e.borrow().as_ref().map(|s| s.as_ptr()).unwrap_or(ptr::null()))
}

#[no_mangle]
pub unsafe extern "C" fn khttp_set_uri(ctx: *mut KhttpCtx, uri: *const c_char) -> c_int {
    status((|| {
        let ctx = ctx_mut(ctx)?;
        ctx.session.set_uri(&arg(uri, "uri")?)
    })())
}

/// 0 = GET, 1 = POST, 2 = PUT, 3 = DELETE.
#[no_mangle]
pub unsafe extern "C" fn khttp_set_method(ctx: *mut KhttpCtx, method: c_int) -> c_int {
    status((|| {
        let ctx = ctx_mut(ctx)?;
        ctx.session.set_method(Method::from_selector(method)?);
        Ok(())
    })())
}

#[no_mangle]
pub unsafe extern "C" fn khttp_set_username_password(
    ctx: *mut KhttpCtx,
    username: *const c_char,
    password: *const c_char,
    auth_type: c_int,
) -> c_int {
    status((|| {
        let ctx = ctx_mut(ctx)?;
        let username = arg(username, "username")?;
        let password = arg(password, "password")?;
        let kind = match AuthKind::from_selector(auth_type) {
            Ok(AuthKind::Digest) => AuthKind::Digest,
            _ => AuthKind::Basic,
        };
        ctx.session.set_credentials(&username, &password, kind);
        Ok(())
    })())
}

/// Raw urlencoded body; replaces any form.
#[no_mangle]
pub unsafe extern "C" fn khttp_set_post_data(ctx: *mut KhttpCtx, data: *const c_char) -> c_int {
    status((|| {
        let ctx = ctx_mut(ctx)?;
        ctx.session.set_post_data(arg(data, "data")?);
        Ok(())
    })())
}

/// Add a form field. type KHTTP_FORM_STRING: value is the text; KHTTP_FORM_FILE: value is a
/// path whose contents are uploaded.
#[no_mangle]
pub unsafe extern "C" fn khttp_set_post_form(
    ctx: *mut KhttpCtx,
    key: *const c_char,
    value: *const c_char,
    form_type: c_int,
) -> c_int {
    status((|| {
        let ctx = ctx_mut(ctx)?;
        let key = arg(key, "key")?;
        let value = arg(value, "value")?;
        match form_type {
            KHTTP_FORM_STRING => ctx.session.add_form_text(&key, &value),
            KHTTP_FORM_FILE => ctx.session.add_form_file(&key, &value),
            other => Err(Error::param(format!("form type {} out of range", other))),
        }
    })())
}

/// Accept any server certificate.
#[no_mangle]
pub unsafe extern "C" fn khttp_ssl_skip_auth(ctx: *mut KhttpCtx) -> c_int {
    status((|| {
        ctx_mut(ctx)?.session.tls_mut().skip_server_verification();
        Ok(())
    })())
}

/// 0 = any, 4 = TLS 1.2, 5 = TLS 1.3; 1-3 (SSLv2/3, TLS 1.0, TLS 1.1) are not supported.
#[no_mangle]
pub unsafe extern "C" fn khttp_ssl_set_method(ctx: *mut KhttpCtx, method: c_int) -> c_int {
    status((|| {
        let ctx = ctx_mut(ctx)?;
        ctx.session.tls_mut().version = TlsVersion::from_selector(method)?;
        Ok(())
    })())
}

/// Client certificate chain and unencrypted private key, both PEM.
#[no_mangle]
pub unsafe extern "C" fn khttp_ssl_set_cert_key(
    ctx: *mut KhttpCtx,
    cert: *const c_char,
    key: *const c_char,
) -> c_int {
    status((|| {
        let ctx = ctx_mut(ctx)?;
        let cert = arg(cert, "cert")?;
        let key = arg(key, "key")?;
        ctx.session.tls_mut().set_client_identity(cert, key)?;
        Ok(())
    })())
}

/// Additional trust anchors (PEM bundle).
#[no_mangle]
pub unsafe extern "C" fn khttp_ssl_set_ca(ctx: *mut KhttpCtx, ca_file: *const c_char) -> c_int {
    status((|| {
        let ctx = ctx_mut(ctx)?;
        ctx.session.tls_mut().set_ca_file(arg(ca_file, "ca_file")?)?;
        Ok(())
    })())
}

/// Run the request to completion on the shared runtime.
#[no_mangle]
pub unsafe extern "C" fn khttp_perform(ctx: *mut KhttpCtx) -> c_int {
    status((|| {
        let ctx = ctx_mut(ctx)?;
        ctx.header_value = None;
        let runtime = &registry()?.runtime;
        runtime.block_on(ctx.session.perform()).map(|_| ())
    })())
}

/// Status code of the last response; 0 before any response.
#[no_mangle]
pub unsafe extern "C" fn khttp_status_code(ctx: *const KhttpCtx) -> c_int {
    match ctx.as_ref() {
        Some(ctx) => c_int::from(ctx.session.response().code),
        None => 0,
    }
}

/// Body of the last response. Sets *len (if not NULL) to its length. The pointer stays valid
/// until the next khttp_perform or khttp_destroy. NULL if there is no body.
#[no_mangle]
pub unsafe extern "C" fn khttp_body(ctx: *const KhttpCtx, len: *mut size_t) -> *const u8 {
    let body: &[u8] = match ctx.as_ref() {
        Some(ctx) => ctx.session.response().body.as_slice(),
        None => &[],
    };
    if !len.is_null() {
        *len = body.len();
    }
    if body.is_empty() {
        ptr::null()
    } else {
        body.as_ptr()
    }
}

/// Value of the first header named `name` (case-insensitive), or NULL. Valid until the next
/// khttp_find_header, khttp_perform or khttp_destroy on this session. Do not free.
#[no_mangle]
pub unsafe extern "C" fn khttp_find_header(ctx: *mut KhttpCtx, name: *const c_char) -> *const c_char {
    let Ok(ctx) = ctx_mut(ctx) else {
        return ptr::null();
    };
    let Some(name) = ptr_to_str(name) else {
        return ptr::null();
    };
    let value = ctx
        .session
        .response()
        .header(&name)
        .and_then(|v| CString::new(v).ok());
    ctx.header_value = value;
    ctx.header_value.as_ref().map(|v| v.as_ptr()).unwrap_or(ptr::null())
}

#[no_mangle]
pub unsafe extern "C" fn khttp_header_count(ctx: *const KhttpCtx) -> size_t {
    match ctx.as_ref() {
        Some(ctx) => ctx.session.response().headers.len(),
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    fn last_error() -> String {
        let p = khttp_last_error();
        assert!(!p.is_null());
        unsafe { CStr::from_ptr(p) }.to_string_lossy().into_owned()
    }

    /// Read one request head (and `body_len` body bytes) from a blocking stream.
    fn read_request(reader: &mut BufReader<std::net::TcpStream>, body_len: usize) -> (String, Vec<u8>) {
        let mut head = String::new();
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if line == "\r\n" || line.is_empty() {
                break;
            }
            head.push_str(&line);
        }
        let mut body = vec![0u8; body_len];
        std::io::Read::read_exact(reader, &mut body).unwrap();
        (head, body)
    }

    #[test]
    fn argument_errors_use_negative_codes() {
        unsafe {
            let ctx = khttp_new();
            assert_eq!(khttp_set_method(ctx, 9), ErrorKind::Param.code());
            assert!(last_error().contains("method"));
            assert_eq!(khttp_set_uri(ctx, ptr::null()), ErrorKind::Param.code());
            assert_eq!(khttp_set_uri(ptr::null_mut(), c("http://h/").as_ptr()), ErrorKind::Param.code());
            assert_eq!(khttp_ssl_set_method(ctx, 2), ErrorKind::NotSupported.code());
            assert_eq!(
                khttp_set_post_form(ctx, c("f").as_ptr(), c("/nonexistent/khttp").as_ptr(), KHTTP_FORM_FILE),
                ErrorKind::NoFile.code()
            );
            assert_eq!(
                khttp_set_post_form(ctx, c("f").as_ptr(), c("v").as_ptr(), 7),
                ErrorKind::Param.code()
            );
            assert_eq!(khttp_set_uri(ctx, c("http://h/").as_ptr()), KHTTP_OK);
            assert!(khttp_last_error().is_null());
            assert_eq!(khttp_perform(ptr::null_mut()), ErrorKind::Param.code());
            khttp_destroy(ctx);
        }
    }

    #[test]
    fn perform_against_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let request = read_request(&mut reader, 7);
            reader
                .get_mut()
                .write_all(b"HTTP/1.1 200 OK\r\nX-Echo: yes\r\nContent-Length: 4\r\n\r\ndone")
                .unwrap();
            request
        });

        unsafe {
            let ctx = khttp_new();
            let uri = c(&format!("http://{}/submit", addr));
            assert_eq!(khttp_set_uri(ctx, uri.as_ptr()), KHTTP_OK);
            assert_eq!(khttp_set_method(ctx, 1), KHTTP_OK);
            assert_eq!(khttp_set_post_data(ctx, c("a=1&b=2").as_ptr()), KHTTP_OK);
            assert_eq!(
                khttp_set_username_password(ctx, c("u").as_ptr(), c("p").as_ptr(), 0),
                KHTTP_OK
            );
            assert_eq!(khttp_perform(ctx), KHTTP_OK);
            assert_eq!(khttp_status_code(ctx), 200);
            assert_eq!(khttp_header_count(ctx), 2);

            let mut len: size_t = 0;
            let body = khttp_body(ctx, &mut len);
            assert_eq!(std::slice::from_raw_parts(body, len), b"done");

            let value = khttp_find_header(ctx, c("x-echo").as_ptr());
            assert_eq!(CStr::from_ptr(value).to_str().unwrap(), "yes");
            assert!(khttp_find_header(ctx, c("missing").as_ptr()).is_null());
            khttp_destroy(ctx);
        }

        let (head, body) = server.join().unwrap();
        assert!(head.starts_with("POST /submit HTTP/1.1\r\n"));
        assert!(head.contains("Authorization: Basic dTpw\r\n"));
        assert_eq!(body, b"a=1&b=2");
    }

    #[test]
    fn unspecified_auth_type_answers_digest_challenge() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            read_request(&mut reader, 0);
            reader
                .get_mut()
                .write_all(
                    b"HTTP/1.1 401 Unauthorized\r\n\
                      WWW-Authenticate: Digest realm=\"r\", nonce=\"n\", qop=\"auth\"\r\n\
                      Content-Length: 0\r\n\r\n",
                )
                .unwrap();
            let (retry, _) = read_request(&mut reader, 0);
            reader
                .get_mut()
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n")
                .unwrap();
            retry
        });

        unsafe {
            let ctx = khttp_new();
            let uri = c(&format!("http://{}/secret", addr));
            assert_eq!(khttp_set_uri(ctx, uri.as_ptr()), KHTTP_OK);
            assert_eq!(
                khttp_set_username_password(ctx, c("u").as_ptr(), c("p").as_ptr(), 0),
                KHTTP_OK
            );
            assert_eq!(khttp_perform(ctx), KHTTP_OK);
            assert_eq!(khttp_status_code(ctx), 200);
            khttp_destroy(ctx);
        }

        let retry = server.join().unwrap();
        assert!(retry.contains("Authorization: Digest username=\"u\", realm=\"r\", nonce=\"n\""));
    }
}
