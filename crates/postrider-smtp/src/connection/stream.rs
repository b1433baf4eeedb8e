//! SMTP transport streams and buffered line I/O.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::BytesMut;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::{
    TlsConnector,
    rustls::{ClientConfig, RootCertStore},
};

use crate::error::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum reply line length accepted from a server.
const MAX_LINE_LENGTH: usize = 4096;

/// A stream that can be either plaintext or TLS.
#[derive(Debug)]
pub enum SmtpStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl SmtpStream {
    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl AsyncRead for SmtpStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for SmtpStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Connects to an SMTP server over plain TCP.
///
/// # Errors
///
/// Returns an error if the connection fails.
pub async fn connect(hostname: &str, port: u16) -> Result<SmtpStream> {
    let addr = format!("{hostname}:{port}");
    let stream = TcpStream::connect(&addr).await?;
    Ok(SmtpStream::Plain(stream))
}

/// Connects to an SMTP server over implicit TLS (port 465 style).
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails.
pub async fn connect_tls(hostname: &str, port: u16) -> Result<SmtpStream> {
    let addr = format!("{hostname}:{port}");
    let tcp_stream = TcpStream::connect(&addr).await?;

    let connector = create_tls_connector();
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::InvalidHostname(hostname.to_string()))?;

    let tls_stream = connector.connect(server_name, tcp_stream).await?;
    Ok(SmtpStream::Tls(Box::new(tls_stream)))
}

/// Creates a TLS connector with system root certificates.
fn create_tls_connector() -> TlsConnector {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

/// Buffered line-oriented channel over a duplex byte stream.
///
/// Reads are line-buffered; writes are staged in a small reusable buffer and
/// issued as a single write followed by a flush. This is the "connected
/// duplex text channel" the protocol engine runs on, generic so tests can
/// drive it with in-memory streams.
pub struct TextStream<S> {
    reader: BufReader<S>,
    write_buf: BytesMut,
}

impl<S> TextStream<S>
where
    S: AsyncRead + Unpin,
{
    /// Creates a new channel over the given stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buf: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
        }
    }

    /// Reads one line, terminator stripped.
    ///
    /// Returns `Ok(None)` on end-of-stream. A trailing partial line (data
    /// with no terminator before end-of-stream) is returned as a line.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails, if the line exceeds the accepted
    /// maximum length, or if the line is not valid UTF-8.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        let mut raw = Vec::new();
        let n = self.reader.read_until(b'\n', &mut raw).await?;
        if n == 0 {
            return Ok(None);
        }
        if raw.len() > MAX_LINE_LENGTH {
            return Err(Error::MalformedReply(format!(
                "reply line exceeds {MAX_LINE_LENGTH} bytes"
            )));
        }

        let mut line = String::from_utf8(raw)
            .map_err(|_| Error::MalformedReply("reply line is not valid UTF-8".to_string()))?;
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }
}

impl<S> TextStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Writes a fully terminated line with a single write and a flush.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or the flush fails.
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        self.write_buf.clear();
        self.write_buf.extend_from_slice(line.as_bytes());

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buf).await?;
        stream.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_line_strips_crlf() {
        let mut channel = TextStream::new(&b"250 OK\r\n"[..]);
        assert_eq!(channel.read_line().await.unwrap().as_deref(), Some("250 OK"));
        assert_eq!(channel.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn read_line_accepts_bare_lf() {
        let mut channel = TextStream::new(&b"250 OK\n"[..]);
        assert_eq!(channel.read_line().await.unwrap().as_deref(), Some("250 OK"));
    }

    #[tokio::test]
    async fn read_line_returns_trailing_partial_line() {
        let mut channel = TextStream::new(&b"220 hi\r\n250 trunc"[..]);
        assert_eq!(channel.read_line().await.unwrap().as_deref(), Some("220 hi"));
        assert_eq!(
            channel.read_line().await.unwrap().as_deref(),
            Some("250 trunc")
        );
        assert_eq!(channel.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn read_line_rejects_oversized_lines() {
        let mut input = vec![b'2'; MAX_LINE_LENGTH + 10];
        input.extend_from_slice(b"\r\n");
        let mut channel = TextStream::new(&input[..]);
        let err = channel.read_line().await.unwrap_err();
        assert!(err.is_malformed_reply());
    }

    #[tokio::test]
    async fn read_line_rejects_invalid_utf8() {
        let mut channel = TextStream::new(&b"250 \xff\xfe\r\n"[..]);
        let err = channel.read_line().await.unwrap_err();
        assert!(err.is_malformed_reply());
    }

    #[tokio::test]
    async fn write_line_is_written_whole() {
        let mut channel = TextStream::new(tokio_test::io::Builder::new()
            .write(b"NOOP\r\n")
            .build());
        channel.write_line("NOOP\r\n").await.unwrap();
    }
}
