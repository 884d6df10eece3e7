//! Address and header normalization: RFC 2047 word decoding, structured
//! address lists, and tolerant date parsing.

use chrono::{DateTime, FixedOffset};
use mailparse::MailAddr;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::message::Address;

/// Strips trailing parenthesized zone names like `(GMT+08:00)` that some
/// senders append after the numeric offset.
static PAREN_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r" \(.*\)").expect("valid regex"));

/// Stateless header normalizer, constructed once by the daemon and shared
/// with the dispatch engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Decodes RFC 2047 encoded words in a header value.
    ///
    /// Falls back to the raw value when decoding fails; a missing header
    /// normalizes to the empty string.
    pub fn decode_words(&self, raw: &str) -> String {
        // mailparse decodes encoded words while parsing a full header line,
        // so synthesize one around the value.
        let mut line = b"Subject: ".to_vec();
        line.extend_from_slice(raw.as_bytes());
        line.extend_from_slice(b"\r\n");
        match mailparse::parse_header(&line) {
            Ok((header, _)) => header.get_value(),
            Err(_) => raw.to_string(),
        }
    }

    /// Parses a header value as a single address, taking the first mailbox
    /// when the value holds a list. Returns `None` on any parse failure.
    pub fn parse_address(&self, raw: &str) -> Option<Address> {
        self.parse_address_list(raw).into_iter().next()
    }

    /// Parses a header value as an address list, flattening groups.
    /// Any parse failure yields an empty list rather than an error.
    pub fn parse_address_list(&self, raw: &str) -> Vec<Address> {
        let decoded = self.decode_words(raw);
        let parsed = match mailparse::addrparse(&decoded) {
            Ok(list) => list,
            Err(_) => return Vec::new(),
        };
        let mut out = Vec::new();
        for addr in parsed.iter() {
            match addr {
                MailAddr::Single(single) => out.push(convert(single)),
                MailAddr::Group(group) => out.extend(group.addrs.iter().map(convert)),
            }
        }
        out
    }

    /// Parses a `Date` header as an internet date, tolerating a trailing
    /// parenthesized zone-name suffix by stripping it first.
    pub fn parse_date(&self, raw: &str) -> Option<DateTime<FixedOffset>> {
        let stripped = PAREN_SUFFIX.replace_all(raw, "");
        DateTime::parse_from_rfc2822(stripped.trim()).ok()
    }
}

fn convert(single: &mailparse::SingleInfo) -> Address {
    Address {
        name: single.display_name.clone(),
        address: single.addr.clone(),
    }
}
