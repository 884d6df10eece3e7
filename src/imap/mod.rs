//! Mailbox session capability: the abstract interface the watch loop
//! consumes, plus the async-imap backed implementation.

pub mod error;
pub mod session;

pub use error::ImapError;
pub use session::{ImapSession, MailboxInfo, MailboxSession, WaitOutcome};
