/*
 * connection.rs
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

//! HTTP connection: one TCP or TLS stream with bounded-wait send and receive.
//!
//! Every operation is one wait bounded by a timeout. A timeout is reported, never retried
//! here; retry policy belongs to the session.

use std::future::Future;
use std::io::{self, Read};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream as TokioTlsStream;
use tracing::{debug, trace};

use crate::error::{Error, ErrorKind, Result};

/// Byte channel the session talks through.
pub trait Transport {
    /// Write all of `data`, each write bounded by `wait`.
    fn send(&mut self, data: &[u8], wait: Duration) -> impl Future<Output = Result<()>> + Send;

    /// One bounded wait, then one read of at most `max_len` bytes. A zero-length read is
    /// `Disconnected`.
    fn recv(&mut self, max_len: usize, wait: Duration)
        -> impl Future<Output = Result<Vec<u8>>> + Send;

    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Unified stream: plain TCP or TLS. Implements AsyncRead + AsyncWrite.
pub enum HttpStream {
    Plain(TcpStream),
    Tls(Box<TokioTlsStream<TcpStream>>),
}

impl AsyncRead for HttpStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for HttpStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_flush(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

impl HttpStream {
    /// Plaintext the TLS layer has already decrypted; it is returned without touching the
    /// socket, which may have nothing more to say.
    fn read_buffered(&mut self, buf: &mut [u8]) -> usize {
        match self {
            HttpStream::Plain(_) => 0,
            HttpStream::Tls(tls) => match tls.get_mut().1.reader().read(buf) {
                Ok(n) => n,
                // WouldBlock: nothing buffered.
                Err(_) => 0,
            },
        }
    }
}

/// Open connection to one peer, exclusively owned by a session.
pub struct Connection {
    stream: HttpStream,
    peer: String,
    open: bool,
}

impl Connection {
    pub fn new(stream: HttpStream, peer: String) -> Self {
        Self {
            stream,
            peer,
            open: true,
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn is_secure(&self) -> bool {
        matches!(self.stream, HttpStream::Tls(_))
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    fn closed_error(&self) -> Error {
        Error::new(ErrorKind::Disconnected, format!("connection to {} closed", self.peer))
    }
}

impl Transport for Connection {
    async fn send(&mut self, data: &[u8], wait: Duration) -> Result<()> {
        if !self.open {
            return Err(self.closed_error());
        }
        let mut written = 0;
        while written < data.len() {
            match timeout(wait, self.stream.write(&data[written..])).await {
                Err(_) => {
                    return Err(Error::new(
                        ErrorKind::Timeout,
                        format!("send to {} timed out after {} of {} bytes", self.peer, written, data.len()),
                    ))
                }
                Ok(Err(e)) => {
                    self.open = false;
                    return Err(Error::from_io(e, ErrorKind::Send));
                }
                Ok(Ok(0)) => {
                    self.open = false;
                    return Err(self.closed_error());
                }
                Ok(Ok(n)) => written += n,
            }
        }
        match timeout(wait, self.stream.flush()).await {
            Err(_) => Err(Error::new(ErrorKind::Timeout, "flush timed out")),
            Ok(Err(e)) => Err(Error::from_io(e, ErrorKind::Send)),
            Ok(Ok(())) => {
                trace!(peer = %self.peer, bytes = data.len(), "sent");
                Ok(())
            }
        }
    }

    async fn recv(&mut self, max_len: usize, wait: Duration) -> Result<Vec<u8>> {
        if !self.open {
            return Err(self.closed_error());
        }
        let mut buf = vec![0u8; max_len.max(1)];
        let buffered = self.stream.read_buffered(&mut buf);
        if buffered > 0 {
            buf.truncate(buffered);
            trace!(peer = %self.peer, bytes = buffered, "read buffered TLS plaintext");
            return Ok(buf);
        }
        match timeout(wait, self.stream.read(&mut buf)).await {
            Err(_) => Err(Error::new(
                ErrorKind::Timeout,
                format!("no data from {} within {:?}", self.peer, wait),
            )),
            Ok(Err(e)) => {
                self.open = false;
                Err(Error::from_io(e, ErrorKind::Recv))
            }
            Ok(Ok(0)) => {
                self.open = false;
                Err(self.closed_error())
            }
            Ok(Ok(n)) => {
                buf.truncate(n);
                trace!(peer = %self.peer, bytes = n, "received");
                Ok(buf)
            }
        }
    }

    async fn close(&mut self) {
        if self.open {
            self.open = false;
            match timeout(Duration::from_secs(1), self.stream.shutdown()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(peer = %self.peer, error = %e, "shutdown failed"),
                Err(_) => debug!(peer = %self.peer, "shutdown timed out"),
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn pair() -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (Connection::new(HttpStream::Plain(client), addr.to_string()), server)
    }

    #[tokio::test]
    async fn send_and_recv_plain() {
        let (mut conn, mut server) = pair().await;
        conn.send(b"ping", Duration::from_secs(1)).await.unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        server.write_all(b"pong!").await.unwrap();
        let got = conn.recv(3, Duration::from_secs(1)).await.unwrap();
        assert_eq!(got, b"pon");
        assert!(!conn.is_secure());
    }

    #[tokio::test]
    async fn recv_times_out() {
        let (mut conn, _server) = pair().await;
        let err = conn.recv(16, Duration::from_millis(50)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(conn.is_open());
    }

    #[tokio::test]
    async fn peer_close_is_disconnected() {
        let (mut conn, server) = pair().await;
        drop(server);
        let err = conn.recv(16, Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Disconnected);
        assert!(!conn.is_open());
        let err = conn.send(b"x", Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Disconnected);
    }
}
