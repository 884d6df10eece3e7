//! Dispatch engine: turns raw fetch batches into normalized messages and
//! invokes the registered handlers.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::body;
use crate::message::{HeaderMap, Message};
use crate::normalize::Normalizer;

/// A registered message handler. Handlers receive each message by reference
/// and clone what they need to keep.
pub type Handler = Arc<dyn Fn(&Message) + Send + Sync>;

/// Per-batch message assembly and handler fan-out.
///
/// Handlers for one message run sequentially in registration order within the
/// dispatching task; distinct batches run in distinct tasks and may
/// interleave with each other.
pub struct Dispatcher {
    normalizer: Normalizer,
    handlers: Vec<Handler>,
    header_only: bool,
}

impl Dispatcher {
    pub fn new(normalizer: Normalizer, handlers: Vec<Handler>, header_only: bool) -> Self {
        Self {
            normalizer,
            handlers,
            header_only,
        }
    }

    /// Processes one fetched batch. A malformed entry is skipped and never
    /// aborts the rest of the batch.
    pub fn dispatch(&self, batch: HashMap<u32, Vec<u8>>) {
        for (seq, raw) in batch {
            match self.build_message(seq, raw) {
                Ok(message) => {
                    debug!(
                        "received seq {} message-id {:?} subject {:?}",
                        message.seq, message.message_id, message.subject
                    );
                    for handler in &self.handlers {
                        handler(&message);
                    }
                }
                Err(err) => {
                    debug!("skipping unparsable message at seq {}: {}", seq, err);
                }
            }
        }
    }

    /// Parses raw message bytes into a normalized `Message` with best-effort
    /// fields. Only envelope framing failures are errors; every sub-decode
    /// failure leaves its field absent or raw.
    pub fn build_message(
        &self,
        seq: u32,
        raw: Vec<u8>,
    ) -> Result<Message, mailparse::MailParseError> {
        let (headers, body_offset) = mailparse::parse_headers(&raw)?;
        let header = HeaderMap::from_mail_headers(&headers);

        let message_id = header.get("Message-ID").unwrap_or_default().to_string();
        let in_reply_to = header.get("In-Reply-To").unwrap_or_default().to_string();

        let from = header
            .get("From")
            .and_then(|raw| self.normalizer.parse_address(raw));
        if from.is_none() {
            debug!("seq {}: no parsable From address", seq);
        }

        let date = header
            .get("Date")
            .and_then(|raw| self.normalizer.parse_date(raw));

        let subject = header
            .get("Subject")
            .map(|raw| self.normalizer.decode_words(raw))
            .unwrap_or_default();

        let (texts, parts) = if self.header_only {
            (Vec::new(), Vec::new())
        } else {
            body::decompose(&header, &raw[body_offset..])
        };

        Ok(Message {
            header,
            seq,
            raw,
            message_id,
            in_reply_to,
            from,
            subject,
            date,
            texts,
            parts,
        })
    }
}
