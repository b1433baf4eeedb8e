//! SMTP reply parser.
//!
//! Reads one logical reply from the channel, aggregating multi-line replies:
//!
//! - Single: `250 OK\r\n`
//! - Multi: `250-First line\r\n250-Second line\r\n250 Last line\r\n`
//!
//! The reply code always comes from the first line. Later lines are not
//! required to repeat it; requiring a matching code would reject replies
//! from some non-conforming servers that otherwise parse fine, so the
//! terminator check only asks for a leading digit.
//!
//! The parser carries no protocol policy. Reply code 421 parses like any
//! other reply; converting it into a closed-connection outcome is the
//! session's job.

use tokio::io::AsyncRead;

use crate::connection::TextStream;
use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// Message used whenever the stream ends before a logical reply does.
const CLOSED_WITHOUT_INDICATION: &str = "end of stream before a complete reply";

/// Reads one logical reply from the channel.
///
/// # Errors
///
/// Returns [`Error::ConnectionClosed`] if the channel reaches end-of-stream
/// before the reply is complete, and [`Error::MalformedReply`] if the first
/// line is shorter than three characters or does not start with three
/// decimal digits.
pub async fn read_reply<S>(channel: &mut TextStream<S>) -> Result<Reply>
where
    S: AsyncRead + Unpin,
{
    let first = channel
        .read_line()
        .await?
        .ok_or_else(|| Error::ConnectionClosed(CLOSED_WITHOUT_INDICATION.to_string()))?;

    let code = parse_code(&first)?;
    let continued = is_continued(&first);
    let mut lines = vec![first];

    if continued {
        loop {
            let line = channel
                .read_line()
                .await?
                .ok_or_else(|| Error::ConnectionClosed(CLOSED_WITHOUT_INDICATION.to_string()))?;
            let done = is_final_line(&line);
            lines.push(line);
            if done {
                break;
            }
        }
    }

    Ok(Reply::new(code, lines))
}

/// Parses the three-digit reply code prefixing the first line.
fn parse_code(line: &str) -> Result<ReplyCode> {
    let bytes = line.as_bytes();
    if bytes.len() < 3 {
        return Err(Error::MalformedReply(format!(
            "truncated server reply: {line}"
        )));
    }
    if !bytes[..3].iter().all(u8::is_ascii_digit) {
        return Err(Error::MalformedReply(format!(
            "could not parse reply code: {line}"
        )));
    }

    let code = u16::from(bytes[0] - b'0') * 100
        + u16::from(bytes[1] - b'0') * 10
        + u16::from(bytes[2] - b'0');
    Ok(ReplyCode::new(code))
}

/// Returns true if the first line announces continuation lines.
fn is_continued(line: &str) -> bool {
    let bytes = line.as_bytes();
    bytes.len() > 3 && bytes[3] == b'-'
}

/// Returns true if this line terminates a multi-line reply.
///
/// The length check guards against short anomaly lines a buffered reader can
/// hand back, e.g. after a naked CR.
fn is_final_line(line: &str) -> bool {
    let bytes = line.as_bytes();
    bytes.len() >= 4 && bytes[3] != b'-' && bytes[0].is_ascii_digit()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    async fn reply_from(input: &[u8]) -> Result<Reply> {
        let mut channel = TextStream::new(input);
        read_reply(&mut channel).await
    }

    #[tokio::test]
    async fn single_line_reply() {
        let reply = reply_from(b"250 OK\r\n").await.unwrap();
        assert_eq!(reply.code().as_u16(), 250);
        assert_eq!(reply.lines(), ["250 OK"]);
    }

    #[tokio::test]
    async fn multi_line_reply_keeps_every_line() {
        let reply = reply_from(b"250-line1\r\n250-line2\r\n250 done\r\n")
            .await
            .unwrap();
        assert_eq!(reply.code().as_u16(), 250);
        assert_eq!(reply.lines(), ["250-line1", "250-line2", "250 done"]);
    }

    #[tokio::test]
    async fn code_comes_from_first_line_only() {
        // A non-conforming server terminates with a different code. Accepted.
        let reply = reply_from(b"250-hello\r\n399 bye\r\n").await.unwrap();
        assert_eq!(reply.code().as_u16(), 250);
        assert_eq!(reply.lines(), ["250-hello", "399 bye"]);
    }

    #[tokio::test]
    async fn short_and_non_digit_lines_do_not_terminate() {
        let reply = reply_from(b"250-a\r\n\r\nx\r\n-50 b\r\n250 ok\r\n")
            .await
            .unwrap();
        assert_eq!(reply.lines().len(), 5);
        assert_eq!(reply.lines()[4], "250 ok");
    }

    #[tokio::test]
    async fn truncated_first_line_is_malformed() {
        let err = reply_from(b"25\r\n").await.unwrap_err();
        assert!(err.is_malformed_reply());
    }

    #[tokio::test]
    async fn short_code_prefix_is_malformed() {
        let err = reply_from(b"25 x\r\n").await.unwrap_err();
        assert!(err.is_malformed_reply());
    }

    #[tokio::test]
    async fn non_digit_code_prefix_is_malformed() {
        let err = reply_from(b"25A OK\r\n").await.unwrap_err();
        assert!(err.is_malformed_reply());
    }

    #[tokio::test]
    async fn end_of_stream_before_first_line_is_connection_closed() {
        let err = reply_from(b"").await.unwrap_err();
        assert!(err.is_connection_closed());
    }

    #[tokio::test]
    async fn end_of_stream_mid_continuation_is_connection_closed() {
        let err = reply_from(b"250-part one\r\n250-part two\r\n")
            .await
            .unwrap_err();
        assert!(err.is_connection_closed());
    }

    #[tokio::test]
    async fn service_unavailable_parses_like_any_reply() {
        let reply = reply_from(b"421 closing\r\n").await.unwrap();
        assert_eq!(reply.code(), ReplyCode::SERVICE_UNAVAILABLE);
    }

    proptest! {
        #[test]
        fn any_three_digit_prefix_parses(code in 0u16..=999, text in "[ -~]{0,40}") {
            let line = format!("{code:03} {text}");
            let parsed = parse_code(&line).unwrap();
            prop_assert_eq!(parsed.as_u16(), code);
        }

        #[test]
        fn non_digit_prefixes_are_rejected(prefix in "[A-Za-z]{1,3}", text in "[ -~]{0,20}") {
            let line = format!("{prefix}{text}");
            prop_assert!(parse_code(&line).is_err());
        }
    }
}
