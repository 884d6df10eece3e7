use thiserror::Error;
use tokio_native_tls::native_tls;

/// Errors surfaced by the mailbox session capability.
#[derive(Debug, Error)]
pub enum ImapError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("invalid endpoint address: {0}")]
    InvalidAddress(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("operation failed: {0}")]
    Operation(String),

    #[error("missing data: {0}")]
    MissingData(String),

    #[error("session closed")]
    SessionClosed,
}

impl From<async_imap::error::Error> for ImapError {
    fn from(err: async_imap::error::Error) -> Self {
        match err {
            async_imap::error::Error::Io(e) => ImapError::Connection(e.to_string()),
            async_imap::error::Error::Parse(e) => ImapError::Parse(e.to_string()),
            async_imap::error::Error::Validate(e) => ImapError::Parse(e.to_string()),
            async_imap::error::Error::No(msg) => ImapError::Operation(msg),
            async_imap::error::Error::Bad(msg) => ImapError::BadResponse(msg),
            other => ImapError::Operation(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ImapError {
    fn from(err: std::io::Error) -> Self {
        ImapError::Connection(err.to_string())
    }
}

impl From<native_tls::Error> for ImapError {
    fn from(err: native_tls::Error) -> Self {
        ImapError::Tls(err.to_string())
    }
}
