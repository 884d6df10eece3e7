//! The watch loop: sequence-watermark bookkeeping, search/fetch polling and
//! long-poll waiting coordinated with shutdown.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::{watch, Semaphore};

use crate::config::Config;
use crate::dispatch::{Dispatcher, Handler};
use crate::error::Error;
use crate::imap::{ImapSession, MailboxSession};
use crate::message::Message;
use crate::normalize::Normalizer;

/// How long one long-poll wait lasts before re-polling anyway.
const WAIT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Upper bound on fetch batches being parsed and dispatched concurrently.
/// The polling cycle blocks once the gate is full.
const MAX_IN_FLIGHT_BATCHES: usize = 10;

/// Handle used to request a clean shutdown of a serving daemon.
///
/// The signal is observed while the loop is waiting for mailbox changes; a
/// poll or fetch already in flight is allowed to finish first.
#[derive(Debug, Clone)]
pub struct Shutdown(watch::Sender<bool>);

impl Shutdown {
    pub fn trigger(&self) {
        let _ = self.0.send(true);
    }
}

/// Mailbox watch daemon.
///
/// Handlers are registered before serving begins; `serve` then connects,
/// authenticates, selects the configured mailbox and runs the polling/waiting
/// loop until a fatal error or a shutdown request.
pub struct Daemon {
    config: Config,
    normalizer: Normalizer,
    handlers: Vec<Handler>,
    watermark: u32,
    shutdown: watch::Sender<bool>,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            normalizer: Normalizer::new(),
            handlers: Vec::new(),
            watermark: 1,
            shutdown,
        }
    }

    /// Registers a handler. Append-only; call before `serve`.
    pub fn register_handler<F>(&mut self, handler: F)
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        Shutdown(self.shutdown.clone())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Lowest mailbox sequence number not yet known to have been searched.
    /// Read and advanced only by the serving task.
    pub fn watermark(&self) -> u32 {
        self.watermark
    }

    /// Connects to the configured IMAP endpoint and serves the watch loop.
    ///
    /// Returns `Error::Interrupted` on a shutdown request; any other return
    /// is a fatal error.
    pub async fn serve(&mut self) -> Result<(), Error> {
        let session = ImapSession::connect(&self.config).await?;
        info!("connected to {}", self.config.imap_address);
        self.serve_with_session(session).await
    }

    /// Serves the watch loop over an already-connected mailbox session.
    pub async fn serve_with_session<S: MailboxSession>(
        &mut self,
        mut session: S,
    ) -> Result<(), Error> {
        let mut shutdown = self.shutdown.subscribe();

        session
            .authenticate(&self.config.user, &self.config.pass)
            .await?;
        let info = session.select_mailbox(&self.config.mailbox).await?;
        info!(
            "selected {} ({} messages)",
            self.config.mailbox, info.exists
        );

        self.watermark = if self.config.ignore_existing {
            info.exists + 1
        } else {
            1
        };

        let gate = Arc::new(Semaphore::new(MAX_IN_FLIGHT_BATCHES));
        let dispatcher = Arc::new(Dispatcher::new(
            self.normalizer,
            self.handlers.clone(),
            false,
        ));

        loop {
            let criterion = if self.config.unseen_only {
                format!("{}:* UNSEEN", self.watermark)
            } else {
                format!("{}:*", self.watermark)
            };
            let seqs = session.search(&criterion).await?;
            debug!("search {:?} matched {} messages", criterion, seqs.len());

            let max_seq = seqs.last().copied();
            for &seq in &seqs {
                let batch = session.fetch(&[seq], !self.config.mark_seen).await?;
                // Forward progress: the watermark moves to the top of the
                // search result once its messages are in dispatch's hands.
                self.watermark = max_seq.unwrap_or(self.watermark);

                let permit = gate
                    .clone()
                    .acquire_owned()
                    .await
                    .expect("dispatch gate closed");
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    dispatcher.dispatch(batch);
                    drop(permit);
                });
            }

            tokio::select! {
                outcome = session.wait_for_change(WAIT_TIMEOUT) => {
                    debug!("wait returned: {:?}", outcome? );
                }
                _ = shutdown.changed() => {
                    // Dropping the wait future cancels the outstanding
                    // long-poll.
                    info!("shutdown requested, leaving watch loop");
                    return Err(Error::Interrupted);
                }
            }
        }
    }
}
