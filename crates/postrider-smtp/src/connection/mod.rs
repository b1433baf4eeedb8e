//! SMTP connection management.

mod session;
mod stream;

pub use session::SmtpSession;
pub use stream::{SmtpStream, TextStream, connect, connect_tls};
