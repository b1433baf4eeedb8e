//! Example: speak raw SMTP to a server and watch the exchange.
//!
//! Connects, identifies the client, starts a mail transaction, then aborts
//! it with RSET and quits. A wire listener prints every command line sent
//! and every reply received.
//!
//! ## Running
//!
//! ```bash
//! cargo run --package postrider-smtp --example send_message -- mail.example.com
//! ```

use postrider_smtp::{CommandListener, DEFAULT_PORT, ReplyCode, SmtpSession, connect};

struct WireLog;

impl CommandListener for WireLog {
    fn on_command_sent(&self, _token: &str, line: &str) {
        print!("C: {line}");
    }

    fn on_reply_received(&self, _code: ReplyCode, text: &str) {
        print!("S: {text}");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let host = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "localhost".to_string());

    println!("Connecting to {host}:{DEFAULT_PORT}...");
    let stream = connect(&host, DEFAULT_PORT).await?;

    let mut session = SmtpSession::new();
    session.add_listener(Box::new(WireLog));

    let greeting = session.connect_stream(stream).await?;
    if greeting != ReplyCode::SERVICE_READY {
        println!("unexpected greeting {greeting}, continuing anyway");
    }

    session.helo("client.local").await?;
    session.mail("<alice@example.com>").await?;
    session.rcpt("<bob@example.com>").await?;

    // Abort the transaction instead of sending a payload.
    session.rset().await?;
    session.quit().await?;
    session.disconnect();

    println!("Done.");
    Ok(())
}
