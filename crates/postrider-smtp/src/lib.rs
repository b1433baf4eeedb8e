//! # postrider-smtp
//!
//! An asynchronous SMTP client protocol engine implementing the RFC 821
//! command/reply core.
//!
//! ## Features
//!
//! - **Reply parsing**: single- and multi-line reply aggregation with the
//!   lenient termination rule real-world servers need
//! - **Premature-disconnect detection**: end-of-stream mid-reply and the
//!   reserved 421 reply both surface as [`Error::ConnectionClosed`]
//! - **Command events**: observe every command line sent and reply
//!   received, with per-listener failure isolation
//! - **Verb facade**: one method per RFC 821 verb, each returning the
//!   numeric reply code
//! - **Transport helpers**: plain TCP and implicit TLS connectors; the
//!   engine itself runs over any `AsyncRead + AsyncWrite` stream
//!
//! ## Quick Start
//!
//! ```ignore
//! use postrider_smtp::{DEFAULT_PORT, SmtpSession, connect};
//!
//! #[tokio::main]
//! async fn main() -> postrider_smtp::Result<()> {
//!     let stream = connect("mail.example.com", DEFAULT_PORT).await?;
//!
//!     let mut session = SmtpSession::new();
//!     session.connect_stream(stream).await?;
//!
//!     session.helo("client.example.com").await?;
//!     session.mail("<alice@example.com>").await?;
//!     session.rcpt("<bob@example.com>").await?;
//!
//!     let code = session.data().await?;
//!     println!("DATA reply: {code}, full text: {:?}", session.last_reply_text());
//!
//!     session.quit().await?;
//!     session.disconnect();
//!     Ok(())
//! }
//! ```
//!
//! ## Session lifecycle
//!
//! ```text
//! Disconnected ── connect_stream() ──→ AwaitingGreeting
//!                                            │ greeting parsed
//!                                            ▼
//!        ┌──── send/reply cycles ────── Ready
//!        └──────────────────────────────→ │
//!                                         │ disconnect() or ConnectionClosed
//!                                         ▼
//!                                    Disconnected
//! ```
//!
//! A reply code in the 4xx/5xx range is an SMTP-level rejection, not an
//! engine error: the verb methods still return it as an ordinary
//! [`ReplyCode`]. Only protocol failures ([`Error::ConnectionClosed`],
//! [`Error::MalformedReply`]) and transport I/O errors are `Err` outcomes.
//!
//! ## Modules
//!
//! - [`connection`]: session engine and transport streams
//! - [`event`]: command/reply listeners
//! - [`parser`]: logical-reply parser
//! - [`types`]: core SMTP types (commands, replies)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod connection;
mod error;
pub mod event;
pub mod parser;
pub mod types;

pub use connection::{SmtpSession, SmtpStream, TextStream, connect, connect_tls};
pub use error::{Error, Result};
pub use event::{CommandEvents, CommandListener, ListenerId};
pub use types::{Command, Reply, ReplyCode, Verb};

/// The default SMTP port (25).
pub const DEFAULT_PORT: u16 = 25;
