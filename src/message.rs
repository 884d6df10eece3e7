//! Normalized in-memory representation of a fetched mail message.

use chrono::{DateTime, FixedOffset};

/// An ordered, case-insensitive, multi-valued header map.
///
/// Lookup ignores ASCII case; iteration and serialization preserve insertion
/// order. Values are stored raw (RFC 2047 words undecoded) with folding
/// whitespace already collapsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a header map from `mailparse` headers, unfolding each raw value.
    pub fn from_mail_headers(headers: &[mailparse::MailHeader<'_>]) -> Self {
        let mut map = Self::new();
        for h in headers {
            let raw = String::from_utf8_lossy(h.get_value_raw());
            map.append(h.get_key(), unfold(&raw));
        }
        map
    }

    /// Appends a value, keeping any existing values for the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replaces all values for `name` with a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.entries.push((name, value.into()));
    }

    /// First value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Removes every value stored under `name`.
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Collapses folded continuation lines into a single-line value.
fn unfold(raw: &str) -> String {
    let unfolded: String = raw.chars().filter(|&c| c != '\r' && c != '\n').collect();
    unfolded.trim().to_string()
}

/// A single parsed mailbox address with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub name: Option<String>,
    pub address: String,
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

/// One non-text leaf of a message's content tree.
///
/// Data is fully transfer-decoded but never charset-decoded; multipart
/// containers are always expanded, so a part never contains structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub header: HeaderMap,
    pub data: Vec<u8>,
}

/// The normalized representation of one mailbox entry.
///
/// Constructed once by the dispatch engine and handed to every registered
/// handler by reference; handlers that need independent state clone it.
#[derive(Debug, Clone)]
pub struct Message {
    /// Raw header map of the top-level entity.
    pub header: HeaderMap,
    /// Mailbox sequence number the message was fetched under.
    pub seq: u32,
    /// Original byte payload as fetched, so handlers can re-derive anything
    /// the normalizer dropped.
    pub raw: Vec<u8>,
    pub message_id: String,
    pub in_reply_to: String,
    pub from: Option<Address>,
    pub subject: String,
    pub date: Option<DateTime<FixedOffset>>,
    /// Plain-text segments in depth-first traversal order.
    pub texts: Vec<String>,
    /// Opaque leaves in depth-first traversal order.
    pub parts: Vec<Part>,
}
