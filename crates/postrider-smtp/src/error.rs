//! Error types for SMTP operations.

use std::io;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
///
/// SMTP-level rejections are not errors at this layer. A `5xx` reply is
/// returned to the caller as an ordinary [`crate::ReplyCode`]; only protocol
/// failures (`ConnectionClosed`, `MalformedReply`) and transport failures
/// surface through this type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error, propagated unchanged from the transport.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// The server closed the connection, either by ending the stream
    /// mid-reply or by sending reply code 421.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The server reply could not be interpreted: first line too short,
    /// or the reply-code prefix was not all decimal digits.
    ///
    /// Protocol framing may be desynchronized after this; disconnecting
    /// is recommended.
    #[error("malformed server reply: {0}")]
    MalformedReply(String),

    /// A command was issued while no channel was attached.
    #[error("not connected")]
    NotConnected,

    /// The hostname could not be used as a TLS server name.
    #[error("invalid hostname: {0}")]
    InvalidHostname(String),
}

impl Error {
    /// Returns true if the server ended the session, requiring a disconnect.
    #[must_use]
    pub const fn is_connection_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed(_))
    }

    /// Returns true if the server reply deviated from the protocol grammar.
    #[must_use]
    pub const fn is_malformed_reply(&self) -> bool {
        matches!(self, Self::MalformedReply(_))
    }
}
