use std::path::Path;

use config::{Environment, File};
use serde::{Deserialize, Serialize};

/// Daemon configuration, immutable for the lifetime of one run.
///
/// Endpoint addresses are `host:port` pairs. The three watch-policy flags
/// control which existing messages are eligible (`ignore_existing`), whether
/// fetching marks messages seen (`mark_seen`) and whether polling only looks
/// at unseen messages (`unseen_only`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub imap_address: String,
    pub imap_use_tls: bool,

    pub smtp_address: String,
    pub smtp_use_tls: bool,

    pub user: String,
    pub pass: String,

    /// Mailbox to watch.
    pub mailbox: String,

    /// Start watching after the current highest sequence number instead of
    /// from the beginning of the mailbox.
    pub ignore_existing: bool,
    /// Mark fetched messages seen.
    pub mark_seen: bool,
    /// Search for unseen messages only.
    pub unseen_only: bool,
}

impl Config {
    /// Loads configuration from defaults, an optional file and `MAILBOT_*`
    /// environment variables (e.g. `MAILBOT_IMAP_ADDRESS`), in that order of
    /// precedence.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("imap_use_tls", true)?
            .set_default("smtp_use_tls", true)?
            .set_default("mailbox", "INBOX")?
            .set_default("ignore_existing", false)?
            .set_default("mark_seen", false)?
            .set_default("unseen_only", false)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("MAILBOT")
                .try_parsing(true)
                .ignore_empty(true),
        );

        builder.build()?.try_deserialize()
    }

    pub fn imap_endpoint(&self) -> Option<(&str, u16)> {
        split_endpoint(&self.imap_address)
    }

    pub fn smtp_endpoint(&self) -> Option<(&str, u16)> {
        split_endpoint(&self.smtp_address)
    }
}

fn split_endpoint(address: &str) -> Option<(&str, u16)> {
    let (host, port) = address.rsplit_once(':')?;
    if host.is_empty() {
        return None;
    }
    Some((host, port.parse().ok()?))
}
