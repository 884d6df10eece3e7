use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;

use async_imap::extensions::idle::IdleResponse;
use async_trait::async_trait;
use futures_util::stream::TryStreamExt;
use log::debug;
use tokio::net::TcpStream;
use tokio_native_tls::{native_tls, TlsConnector};

use crate::config::Config;
use crate::imap::error::ImapError;

/// Summary of the selected mailbox returned by `select_mailbox`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxInfo {
    /// Number of messages currently in the mailbox.
    pub exists: u32,
}

/// Why a long-poll wait returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The server surfaced a change notification.
    Changed,
    /// The wait timeout elapsed without a change.
    TimedOut,
}

/// Abstract mailbox session consumed by the watch loop.
///
/// The session handle is owned exclusively by the watch loop task; none of
/// these operations are issued concurrently. Cancelling an outstanding
/// `wait_for_change` is done by dropping its future.
#[async_trait]
pub trait MailboxSession: Send {
    async fn authenticate(&mut self, user: &str, pass: &str) -> Result<(), ImapError>;

    async fn select_mailbox(&mut self, name: &str) -> Result<MailboxInfo, ImapError>;

    /// Runs a sequence-number search; results are sorted ascending.
    async fn search(&mut self, criterion: &str) -> Result<Vec<u32>, ImapError>;

    /// Fetches raw message bytes for the given sequence numbers. When
    /// `leave_unseen` is set the fetch must not mark the messages seen as a
    /// side effect.
    async fn fetch(
        &mut self,
        seqs: &[u32],
        leave_unseen: bool,
    ) -> Result<HashMap<u32, Vec<u8>>, ImapError>;

    /// Blocks until the mailbox changes or `timeout` elapses.
    async fn wait_for_change(&mut self, timeout: Duration) -> Result<WaitOutcome, ImapError>;
}

/// Stream type usable by async-imap: TLS-wrapped or plain TCP.
trait ImapStream: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + Debug {}
impl<T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + Debug> ImapStream for T {}

type BoxedStream = Box<dyn ImapStream>;
type Session = async_imap::Session<BoxedStream>;
type Client = async_imap::Client<BoxedStream>;

/// Mailbox session backed by async-imap over TCP or TLS.
pub struct ImapSession {
    /// Present between connect and authenticate.
    client: Option<Client>,
    // IDLE consumes the session, so it lives in an Option while a wait is in
    // flight. A failed wait leaves it empty and the session unusable.
    session: Option<Session>,
    has_idle: bool,
}

impl ImapSession {
    /// Connects per the daemon configuration. Authentication is a separate
    /// step.
    pub async fn connect(config: &Config) -> Result<Self, ImapError> {
        let (host, port) = config
            .imap_endpoint()
            .ok_or_else(|| ImapError::InvalidAddress(config.imap_address.clone()))?;

        let tcp = TcpStream::connect((host, port)).await?;
        let stream: BoxedStream = if config.imap_use_tls {
            let connector = TlsConnector::from(native_tls::TlsConnector::new()?);
            let tls = connector
                .connect(host, tcp)
                .await
                .map_err(|e| ImapError::Tls(e.to_string()))?;
            Box::new(tls)
        } else {
            Box::new(tcp)
        };

        Ok(Self {
            client: Some(async_imap::Client::new(stream)),
            session: None,
            has_idle: false,
        })
    }

    fn session(&mut self) -> Result<&mut Session, ImapError> {
        self.session.as_mut().ok_or(ImapError::SessionClosed)
    }
}

#[async_trait]
impl MailboxSession for ImapSession {
    async fn authenticate(&mut self, user: &str, pass: &str) -> Result<(), ImapError> {
        let client = self.client.take().ok_or(ImapError::SessionClosed)?;
        let mut session = client
            .login(user, pass)
            .await
            .map_err(|(e, _)| ImapError::Auth(e.to_string()))?;
        let capabilities = session.capabilities().await?;
        self.has_idle = capabilities.has_str("IDLE");
        if !self.has_idle {
            debug!("server does not advertise IDLE; waits will fall back to sleeping");
        }
        self.session = Some(session);
        Ok(())
    }

    async fn select_mailbox(&mut self, name: &str) -> Result<MailboxInfo, ImapError> {
        let mailbox = self.session()?.select(name).await?;
        Ok(MailboxInfo {
            exists: mailbox.exists,
        })
    }

    async fn search(&mut self, criterion: &str) -> Result<Vec<u32>, ImapError> {
        let seqs = self.session()?.search(criterion).await?;
        let mut seqs: Vec<u32> = seqs.into_iter().collect();
        seqs.sort_unstable();
        Ok(seqs)
    }

    async fn fetch(
        &mut self,
        seqs: &[u32],
        leave_unseen: bool,
    ) -> Result<HashMap<u32, Vec<u8>>, ImapError> {
        let set = seqs
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let query = if leave_unseen { "BODY.PEEK[]" } else { "BODY[]" };
        let session = self.session()?;
        let mut results = HashMap::new();
        // A message expunged between search and fetch simply yields no body;
        // the cycle carries on without it.
        let mut stream = session.fetch(&set, query).await?;
        while let Some(fetch) = stream.try_next().await? {
            if let Some(body) = fetch.body() {
                results.insert(fetch.message, body.to_vec());
            }
        }
        Ok(results)
    }

    async fn wait_for_change(&mut self, timeout: Duration) -> Result<WaitOutcome, ImapError> {
        if !self.has_idle {
            tokio::time::sleep(timeout).await;
            return Ok(WaitOutcome::TimedOut);
        }

        let session = self.session.take().ok_or(ImapError::SessionClosed)?;
        let mut handle = session.idle();
        handle.init().await?;
        let (wait, _interrupt) = handle.wait_with_timeout(timeout);
        let response = wait.await?;
        self.session = Some(handle.done().await?);

        Ok(match response {
            IdleResponse::NewData(_) => WaitOutcome::Changed,
            IdleResponse::Timeout | IdleResponse::ManualInterrupt => WaitOutcome::TimedOut,
        })
    }
}
