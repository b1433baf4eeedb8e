//! SMTP command types.
//!
//! Commands are built as short-lived values per exchange and serialized to a
//! single CRLF-terminated wire line.

use super::CRLF;
use std::borrow::Cow;

/// SMTP command verbs.
///
/// Each verb maps to its wire token. The path-taking transaction verbs carry
/// the argument syntax marker inside the token (`MAIL FROM:`, `RCPT TO:`),
/// and [`Verb::separates_argument`] controls whether a space is inserted
/// before the argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// HELO - Identify the client
    Helo,
    /// MAIL FROM: - Start a mail transaction
    Mail,
    /// RCPT TO: - Add a recipient
    Rcpt,
    /// DATA - Begin message data
    Data,
    /// SEND FROM: - Deliver to terminal
    Send,
    /// SOML FROM: - Deliver to terminal or mailbox
    Soml,
    /// SAML FROM: - Deliver to terminal and mailbox
    Saml,
    /// RSET - Reset the transaction
    Rset,
    /// VRFY - Verify an address
    Vrfy,
    /// EXPN - Expand a mailing list
    Expn,
    /// HELP - Request help text
    Help,
    /// NOOP - No operation
    Noop,
    /// TURN - Reverse the roles of sender and receiver
    Turn,
    /// QUIT - Close the session
    Quit,
}

impl Verb {
    /// Returns the wire token for this verb.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Helo => "HELO",
            Self::Mail => "MAIL FROM:",
            Self::Rcpt => "RCPT TO:",
            Self::Data => "DATA",
            Self::Send => "SEND FROM:",
            Self::Soml => "SOML FROM:",
            Self::Saml => "SAML FROM:",
            Self::Rset => "RSET",
            Self::Vrfy => "VRFY",
            Self::Expn => "EXPN",
            Self::Help => "HELP",
            Self::Noop => "NOOP",
            Self::Turn => "TURN",
            Self::Quit => "QUIT",
        }
    }

    /// Returns true if a space separates the token from its argument.
    ///
    /// MAIL and RCPT join the bracketed path directly to the token, so
    /// `MAIL FROM:` + `<a@b.com>` yields `MAIL FROM:<a@b.com>` with no
    /// space. The path argument syntax forbids one.
    #[must_use]
    pub const fn separates_argument(self) -> bool {
        !matches!(self, Self::Mail | Self::Rcpt)
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// One SMTP command, built transiently per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    token: Cow<'static, str>,
    argument: Option<String>,
    separator: bool,
}

impl Command {
    /// Creates a command from a verb and an optional argument, using the
    /// verb's separator policy.
    #[must_use]
    pub fn new(verb: Verb, argument: Option<&str>) -> Self {
        Self {
            token: Cow::Borrowed(verb.token()),
            argument: argument.map(str::to_string),
            separator: verb.separates_argument(),
        }
    }

    /// Creates a command from an arbitrary token.
    #[must_use]
    pub fn raw(token: impl Into<String>, argument: Option<&str>, separator: bool) -> Self {
        Self {
            token: Cow::Owned(token.into()),
            argument: argument.map(str::to_string),
            separator,
        }
    }

    /// Returns the command token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Serializes the command to its wire line, CRLF terminator included.
    #[must_use]
    pub fn to_wire_line(&self) -> String {
        let arg_len = self.argument.as_ref().map_or(0, |a| a.len() + 1);
        let mut line = String::with_capacity(self.token.len() + arg_len + 2);
        line.push_str(&self.token);
        if let Some(argument) = &self.argument {
            if self.separator {
                line.push(' ');
            }
            line.push_str(argument);
        }
        line.push_str(CRLF);
        line
    }
}
