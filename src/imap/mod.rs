//! IMAP transport and command layer
//!
//! - `connection` -- TCP connect, TLS / STARTTLS, greeting and login
//! - `session` -- one authenticated connection and its typed commands
//! - `response` -- lenient scraping of untagged and tagged responses
//! - `fetch` -- messages returned by FETCH

mod connection;
mod fetch;
pub mod response;
mod session;

pub use connection::connect;
pub use fetch::RemoteMessage;
pub use response::MailboxEntry;
pub use session::{CmsSession, ImapStream, Reply};
