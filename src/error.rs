use thiserror::Error;

use crate::imap::ImapError;
use crate::smtp::SmtpError;

/// Terminal results of the daemon's serving entry points.
///
/// Connection, authentication, select, search and fetch failures are fatal
/// for the run. `Interrupted` signals a clean shutdown request and is
/// distinct from failure. Per-message parse errors never surface here; those
/// messages are skipped with best-effort fields.
#[derive(Debug, Error)]
pub enum Error {
    /// The serve loop was interrupted by a shutdown signal.
    #[error("interrupted")]
    Interrupted,

    #[error("IMAP error: {0}")]
    Imap(#[from] ImapError),

    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
