//! SMTP session engine.
//!
//! [`SmtpSession`] drives the command/reply protocol over an attached
//! channel: it serializes one command line, reads one logical reply, records
//! it, notifies listeners, and hands the numeric reply code back to the
//! caller. The per-verb convenience methods are thin formatting wrappers
//! over the same send path.

use std::cell::OnceCell;

use tokio::io::{AsyncRead, AsyncWrite};

use super::stream::TextStream;
use crate::error::{Error, Result};
use crate::event::{CommandEvents, CommandListener, ListenerId};
use crate::parser;
use crate::types::{Command, Reply, ReplyCode, Verb};

/// Mutable per-connection reply state.
///
/// The formatted reply text is cached lazily; most callers only look at the
/// numeric code and never pay for the join.
#[derive(Default)]
struct SessionState {
    connected: bool,
    last_reply: Option<Reply>,
    reply_text: OnceCell<String>,
}

impl SessionState {
    /// Replaces the last reply and invalidates the cached formatted text.
    fn record_reply(&mut self, reply: Reply) {
        self.last_reply = Some(reply);
        self.reply_text = OnceCell::new();
    }

    /// Clears connection flag, reply and cache. Idempotent.
    fn reset(&mut self) {
        self.connected = false;
        self.last_reply = None;
        self.reply_text = OnceCell::new();
    }

    fn reply_text(&self) -> Option<&str> {
        self.last_reply
            .as_ref()
            .map(|reply| self.reply_text.get_or_init(|| reply.to_wire_string()).as_str())
    }
}

/// An SMTP client session over a duplex text channel.
///
/// The protocol is strictly half-duplex request/reply, so every exchange
/// takes `&mut self` and runs to completion before the next one can start;
/// no internal locking exists. Callers sharing a session across threads must
/// serialize access around the whole send-then-receive cycle, not just the
/// write, because the reply state is shared. If an exchange is abandoned
/// mid-cycle (an externally imposed timeout, cancellation of the future),
/// the connection cannot be resynchronized and must be disconnected.
///
/// A session object is reusable: [`disconnect`](Self::disconnect) clears all
/// reply state, and a later [`connect_stream`](Self::connect_stream) starts
/// a fresh protocol session on a new channel.
pub struct SmtpSession<S> {
    channel: Option<TextStream<S>>,
    state: SessionState,
    events: CommandEvents,
}

impl<S> SmtpSession<S> {
    /// Creates a detached session.
    #[must_use]
    pub fn new() -> Self {
        Self {
            channel: None,
            state: SessionState::default(),
            events: CommandEvents::new(),
        }
    }

    /// Returns true if a channel is attached and the greeting was read.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.state.connected
    }

    /// Returns the code of the last reply, if any reply has been received
    /// on the current connection.
    #[must_use]
    pub fn last_reply_code(&self) -> Option<ReplyCode> {
        self.state.last_reply.as_ref().map(Reply::code)
    }

    /// Returns the raw lines of the last reply, terminators stripped.
    /// Empty if no reply has been received on the current connection.
    #[must_use]
    pub fn last_reply_lines(&self) -> &[String] {
        self.state
            .last_reply
            .as_ref()
            .map_or(&[], |reply| reply.lines())
    }

    /// Returns the last reply formatted as it appeared on the wire, each
    /// line followed by CRLF. Computed lazily and cached until the next
    /// reply arrives or the session disconnects.
    #[must_use]
    pub fn last_reply_text(&self) -> Option<&str> {
        self.state.reply_text()
    }

    /// Returns the last reply record.
    #[must_use]
    pub const fn last_reply(&self) -> Option<&Reply> {
        self.state.last_reply.as_ref()
    }

    /// Registers a command listener and returns its handle.
    pub fn add_listener(&mut self, listener: Box<dyn CommandListener>) -> ListenerId {
        self.events.add(listener)
    }

    /// Removes a command listener. No-op if the handle was never registered
    /// or was already removed.
    pub fn remove_listener(&mut self, id: ListenerId) {
        self.events.remove(id);
    }

    /// Detaches the channel and clears all reply state so nothing stale can
    /// leak into a later connection reusing this session object.
    ///
    /// Dropping the channel closes the underlying socket. Call this after
    /// any [`Error::ConnectionClosed`] or abandoned exchange; the protocol
    /// has no way to resynchronize.
    pub fn disconnect(&mut self) {
        self.channel = None;
        self.state.reset();
    }
}

impl<S> Default for SmtpSession<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> SmtpSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Attaches a connected stream and reads the server greeting (the
    /// server speaks first). Any previous connection state is cleared.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails, or
    /// [`Error::ConnectionClosed`] if the greeting is reply code 421.
    /// The session is left attached either way; the caller decides whether
    /// to [`disconnect`](Self::disconnect).
    pub async fn connect_stream(&mut self, stream: S) -> Result<ReplyCode> {
        self.state.reset();
        self.channel = Some(TextStream::new(stream));
        self.state.connected = true;

        let code = self.receive_reply().await?;
        tracing::debug!(code = code.as_u16(), "server greeting received");
        Ok(code)
    }

    /// Sends a command and returns the reply code. The full reply is
    /// available afterwards through the `last_reply` accessors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if no channel is attached, I/O errors
    /// from the channel unchanged, and [`Error::ConnectionClosed`] or
    /// [`Error::MalformedReply`] from the reply (see [`read_reply`](Self::read_reply)).
    pub async fn send_command(&mut self, verb: Verb, argument: Option<&str>) -> Result<ReplyCode> {
        self.transmit(&Command::new(verb, argument)).await
    }

    /// Sends a command with an arbitrary token, separating the argument
    /// with a space. For the standard verb set prefer
    /// [`send_command`](Self::send_command) which knows each verb's
    /// separator policy.
    ///
    /// # Errors
    ///
    /// Same as [`send_command`](Self::send_command).
    pub async fn send_raw(&mut self, token: &str, argument: Option<&str>) -> Result<ReplyCode> {
        self.transmit(&Command::raw(token, argument, true)).await
    }

    /// Reads a reply without sending a command first, for the second reply
    /// of a two-step exchange such as the completion reply after a message
    /// payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] on end-of-stream or reply code
    /// 421, [`Error::MalformedReply`] if the reply violates the grammar,
    /// and I/O errors unchanged.
    pub async fn read_reply(&mut self) -> Result<ReplyCode> {
        self.receive_reply().await
    }

    async fn transmit(&mut self, command: &Command) -> Result<ReplyCode> {
        let channel = self.channel.as_mut().ok_or(Error::NotConnected)?;
        let line = command.to_wire_line();

        // A failed write propagates before any reply state changes.
        channel.write_line(&line).await?;
        tracing::trace!(command = command.token(), "command sent");

        if !self.events.is_empty() {
            self.events.notify_command_sent(command.token(), &line);
        }

        self.receive_reply().await
    }

    async fn receive_reply(&mut self) -> Result<ReplyCode> {
        let channel = self.channel.as_mut().ok_or(Error::NotConnected)?;
        let reply = parser::read_reply(channel).await?;
        let code = reply.code();
        tracing::debug!(code = code.as_u16(), lines = reply.lines().len(), "reply received");

        self.state.record_reply(reply);

        if !self.events.is_empty() {
            if let Some(text) = self.state.reply_text() {
                self.events.notify_reply_received(code, text);
            }
        }

        // 421 is a syntactically valid reply carrying a protocol-level
        // close. It is recorded and delivered to listeners like any reply,
        // then surfaced to the caller as a closed connection.
        if code == ReplyCode::SERVICE_UNAVAILABLE {
            tracing::warn!("SMTP reply 421 received, server is closing the connection");
            return Err(Error::ConnectionClosed(
                "SMTP reply 421 received".to_string(),
            ));
        }

        Ok(code)
    }
}

/// Per-verb convenience methods.
///
/// Each sends the verb with the argument formatted per the command table
/// and returns the reply code.
impl<S> SmtpSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Sends `HELO hostname`.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub async fn helo(&mut self, hostname: &str) -> Result<ReplyCode> {
        self.send_command(Verb::Helo, Some(hostname)).await
    }

    /// Sends `MAIL FROM:<reverse-path>`. The path argument is joined
    /// directly to the token, so pass it bracketed: `mail("<a@b.com>")`
    /// puts `MAIL FROM:<a@b.com>` on the wire.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub async fn mail(&mut self, reverse_path: &str) -> Result<ReplyCode> {
        self.send_command(Verb::Mail, Some(reverse_path)).await
    }

    /// Sends `RCPT TO:<forward-path>`. The path argument is joined directly
    /// to the token, like [`mail`](Self::mail).
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub async fn rcpt(&mut self, forward_path: &str) -> Result<ReplyCode> {
        self.send_command(Verb::Rcpt, Some(forward_path)).await
    }

    /// Sends `DATA`. A 354 reply invites the message payload; after the
    /// payload is delivered by the transport, fetch the completion reply
    /// with [`read_reply`](Self::read_reply).
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub async fn data(&mut self) -> Result<ReplyCode> {
        self.send_command(Verb::Data, None).await
    }

    /// Sends `SEND FROM: <reverse-path>`.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub async fn send_from(&mut self, reverse_path: &str) -> Result<ReplyCode> {
        self.send_command(Verb::Send, Some(reverse_path)).await
    }

    /// Sends `SOML FROM: <reverse-path>`.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub async fn soml(&mut self, reverse_path: &str) -> Result<ReplyCode> {
        self.send_command(Verb::Soml, Some(reverse_path)).await
    }

    /// Sends `SAML FROM: <reverse-path>`.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub async fn saml(&mut self, reverse_path: &str) -> Result<ReplyCode> {
        self.send_command(Verb::Saml, Some(reverse_path)).await
    }

    /// Sends `RSET`, aborting the current mail transaction.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub async fn rset(&mut self) -> Result<ReplyCode> {
        self.send_command(Verb::Rset, None).await
    }

    /// Sends `VRFY user`.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub async fn vrfy(&mut self, user: &str) -> Result<ReplyCode> {
        self.send_command(Verb::Vrfy, Some(user)).await
    }

    /// Sends `EXPN name`.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub async fn expn(&mut self, name: &str) -> Result<ReplyCode> {
        self.send_command(Verb::Expn, Some(name)).await
    }

    /// Sends `HELP`.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub async fn help(&mut self) -> Result<ReplyCode> {
        self.send_command(Verb::Help, None).await
    }

    /// Sends `HELP command`, requesting help on one command.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub async fn help_on(&mut self, command: &str) -> Result<ReplyCode> {
        self.send_command(Verb::Help, Some(command)).await
    }

    /// Sends `NOOP`.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub async fn noop(&mut self) -> Result<ReplyCode> {
        self.send_command(Verb::Noop, None).await
    }

    /// Sends `TURN`.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub async fn turn(&mut self) -> Result<ReplyCode> {
        self.send_command(Verb::Turn, None).await
    }

    /// Sends `QUIT`. From the engine's point of view this is an ordinary
    /// command; closing the socket afterwards is the transport's job, via
    /// [`disconnect`](Self::disconnect) or dropping the session.
    ///
    /// # Errors
    ///
    /// See [`send_command`](Self::send_command).
    pub async fn quit(&mut self) -> Result<ReplyCode> {
        self.send_command(Verb::Quit, None).await
    }
}
