//! Outbound composition: flat header+body payloads and the plain-text
//! convenience path.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use uuid::Uuid;

use crate::daemon::Daemon;
use crate::error::Error;
use crate::message::HeaderMap;
use crate::normalize::Normalizer;
use crate::smtp::{MailTransmitter, SmtpError, SmtpTransmitter};

/// Serializes header fields as `Name: value` lines in map order, followed by
/// a blank line and the raw body bytes.
pub fn build_mail(header: &HeaderMap, body: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(body.len() + 256);
    for (name, value) in header.iter() {
        payload.extend_from_slice(name.as_bytes());
        payload.extend_from_slice(b": ");
        payload.extend_from_slice(value.as_bytes());
        payload.extend_from_slice(b"\r\n");
    }
    payload.extend_from_slice(b"\r\n");
    payload.extend_from_slice(body);
    payload
}

/// Generates a unique `Message-ID` value for the given user.
pub fn generate_message_id(user: &str) -> String {
    format!("<{}-{}>", Uuid::new_v4(), user)
}

/// Composes and submits one message through a transmitter: collects
/// recipients from To/Cc/Bcc (a list that fails to parse contributes no
/// recipients), strips Bcc from the transmitted header block and streams the
/// flat payload.
pub(crate) async fn deliver(
    transmitter: &dyn MailTransmitter,
    normalizer: &Normalizer,
    sender: &str,
    mut header: HeaderMap,
    body: &[u8],
) -> Result<(), SmtpError> {
    let mut recipients = Vec::new();
    for field in ["To", "Cc", "Bcc"] {
        for value in header.get_all(field) {
            recipients.extend(
                normalizer
                    .parse_address_list(value)
                    .into_iter()
                    .map(|a| a.address),
            );
        }
    }
    header.remove("Bcc");

    let payload = build_mail(&header, body);
    transmitter.transmit(sender, &recipients, &payload).await
}

impl Daemon {
    /// Sends an email with the given header block and raw body bytes. Opens
    /// an independent SMTP connection for this send.
    pub async fn send_mail(&self, header: HeaderMap, body: &[u8]) -> Result<(), Error> {
        let transmitter = SmtpTransmitter::from_config(self.config())?;
        deliver(
            &transmitter,
            &Normalizer::new(),
            &self.config().user,
            header,
            body,
        )
        .await
        .map_err(Error::from)
    }

    /// Sends a plain-text email: sets `Content-Type` and a base64
    /// `Content-Transfer-Encoding`, encodes the text and delegates to
    /// `send_mail`.
    pub async fn send_plain_text_mail(
        &self,
        mut header: HeaderMap,
        text: &str,
    ) -> Result<(), Error> {
        header.set("Content-Transfer-Encoding", "base64");
        header.set("Content-Type", "text/plain; charset=utf-8");
        let body = STANDARD.encode(text.as_bytes());
        self.send_mail(header, body.as_bytes()).await
    }
}
