//! Mail transmitter capability and its lettre-backed SMTP implementation.

use async_trait::async_trait;
use lettre::address::Envelope;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use thiserror::Error;

use crate::config::Config;

/// Errors surfaced by the mail transmitter capability.
#[derive(Debug, Error)]
pub enum SmtpError {
    #[error("invalid endpoint address: {0}")]
    InvalidAddress(String),

    #[error("invalid mailbox address: {0}")]
    Mailbox(#[from] lettre::address::AddressError),

    #[error("invalid envelope: {0}")]
    Envelope(#[from] lettre::error::Error),

    #[error("transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Abstract outbound mail transmitter.
///
/// One call covers the whole submission: connect, authenticate, declare the
/// sender and every recipient, stream the payload and finalize. Any failure
/// aborts the send; recipients already declared server-side are not rolled
/// back.
#[async_trait]
pub trait MailTransmitter: Send + Sync {
    async fn transmit(
        &self,
        sender: &str,
        recipients: &[String],
        payload: &[u8],
    ) -> Result<(), SmtpError>;
}

/// Transmitter submitting over SMTP with PLAIN credentials.
///
/// Opens an independent connection per send, so concurrent sends never share
/// mutable state. With `smtp_use_tls` the connection is TLS from the start;
/// otherwise it is upgraded opportunistically when the server advertises
/// STARTTLS.
pub struct SmtpTransmitter {
    host: String,
    port: u16,
    use_tls: bool,
    credentials: Credentials,
}

impl SmtpTransmitter {
    pub fn from_config(config: &Config) -> Result<Self, SmtpError> {
        let (host, port) = config
            .smtp_endpoint()
            .ok_or_else(|| SmtpError::InvalidAddress(config.smtp_address.clone()))?;
        Ok(Self {
            host: host.to_string(),
            port,
            use_tls: config.smtp_use_tls,
            credentials: Credentials::new(config.user.clone(), config.pass.clone()),
        })
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, SmtpError> {
        let params = TlsParameters::new(self.host.clone())?;
        let tls = if self.use_tls {
            Tls::Wrapper(params)
        } else {
            Tls::Opportunistic(params)
        };
        Ok(
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.host)
                .port(self.port)
                .tls(tls)
                .credentials(self.credentials.clone())
                .build(),
        )
    }
}

#[async_trait]
impl MailTransmitter for SmtpTransmitter {
    async fn transmit(
        &self,
        sender: &str,
        recipients: &[String],
        payload: &[u8],
    ) -> Result<(), SmtpError> {
        let from: Address = sender.parse()?;
        let to: Vec<Address> = recipients
            .iter()
            .map(|r| r.parse())
            .collect::<Result<_, _>>()?;
        let envelope = Envelope::new(Some(from), to)?;
        self.transport()?.send_raw(&envelope, payload).await?;
        Ok(())
    }
}
