//! mailbot watches an IMAP mailbox for newly arrived messages, decomposes
//! each message's MIME structure into a normalized [`Message`] and hands it
//! to registered handlers. It also sends mail over SMTP, either as a flat
//! header+body payload or through a plain-text convenience path.
//!
//! ```no_run
//! use mailbot::{Config, Daemon};
//!
//! # async fn run() -> Result<(), mailbot::Error> {
//! let config = Config::load(None)?;
//! let mut daemon = Daemon::new(config);
//! daemon.register_handler(|message: &mailbot::Message| {
//!     println!("{}: {}", message.seq, message.subject);
//! });
//! daemon.serve().await
//! # }
//! ```

pub mod body;
pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod encoding;
pub mod error;
pub mod imap;
pub mod message;
pub mod normalize;
pub mod send;
pub mod smtp;

pub use crate::config::Config;
pub use crate::daemon::{Daemon, Shutdown};
pub use crate::error::Error;
pub use crate::imap::{ImapError, MailboxInfo, MailboxSession, WaitOutcome};
pub use crate::message::{Address, HeaderMap, Message, Part};
pub use crate::normalize::Normalizer;
pub use crate::send::{build_mail, generate_message_id};
pub use crate::smtp::{MailTransmitter, SmtpError, SmtpTransmitter};
