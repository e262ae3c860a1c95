//! Relay Session
//!
//! Per-connection state machine that replays a run's log from the start of
//! its stream and then tails it. Both phases go through the same forwarding
//! routine, so a record is handled identically whether it was already in
//! the store when the client connected or arrived later.

use std::time::Duration;

use evolve_core::domain::run::RunId;
use tokio_util::sync::CancellationToken;

use super::codec;
use super::store::{EntryId, LogRecord, LogStoreClient, ReadOutcome, StoreError};
use super::transport::{EventTransport, EventWriter, SseFrame, TransportError};

const DONE_IN_HISTORY: &str = "Stream ended (found in history).";
const DONE_LIVE: &str = "Stream ended.";

/// Tunables of a relay session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Maximum records per store read
    pub batch_size: usize,
    /// How long one live-tail read waits for new records
    pub block_timeout: Duration,
    /// Minimum delay after each data frame
    pub pacing: Duration,
    /// Reconnect delay announced to the client
    pub retry: Duration,
    /// Pause before retrying after a live-tail store error
    pub error_cooldown: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            block_timeout: Duration::from_secs(5),
            pacing: Duration::from_millis(256),
            retry: Duration::from_secs(3),
            error_cooldown: Duration::from_secs(1),
        }
    }
}

/// How a session ended
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    /// The end-of-stream marker was relayed as a done event
    Completed,
    /// Disconnect or server shutdown
    Cancelled,
    /// A write found the peer gone
    Disconnected,
    /// A write failed for a reason other than disconnect
    TransportFailed(String),
    /// The store failed while replaying history
    StoreFailed(StoreError),
}

#[derive(Debug, Clone)]
enum Phase {
    Replay,
    LiveTail,
    Terminated(SessionOutcome),
}

/// Replay-then-tail relay for one run and one peer
pub struct RelaySession<W> {
    run_id: RunId,
    cursor: EntryId,
    store: LogStoreClient,
    transport: EventTransport<W>,
    config: RelayConfig,
    cancel: CancellationToken,
}

impl<W: EventWriter> RelaySession<W> {
    pub fn new(
        run_id: RunId,
        store: LogStoreClient,
        writer: W,
        config: RelayConfig,
        cancel: CancellationToken,
    ) -> Self {
        let transport = EventTransport::new(writer, config.pacing, run_id.clone());
        Self {
            run_id,
            cursor: EntryId::stream_start(),
            store,
            transport,
            config,
            cancel,
        }
    }

    /// Drive the session until it terminates
    pub async fn run(mut self) -> SessionOutcome {
        tracing::info!(run_id = %self.run_id, "Starting log relay");

        let mut phase = match self
            .transport
            .write(&SseFrame::Retry(self.config.retry), &self.cancel)
            .await
        {
            Ok(()) => Phase::Replay,
            Err(err) => Phase::Terminated(transport_outcome(err)),
        };

        loop {
            phase = match phase {
                Phase::Replay => self.replay_step().await,
                Phase::LiveTail => self.tail_step().await,
                Phase::Terminated(outcome) => {
                    self.log_outcome(&outcome);
                    return outcome;
                }
            };
        }
    }

    fn log_outcome(&self, outcome: &SessionOutcome) {
        let run_id = &self.run_id;
        let cursor = &self.cursor;
        match outcome {
            SessionOutcome::Completed => {
                tracing::info!(run_id = %run_id, cursor = %cursor, "Log relay completed")
            }
            SessionOutcome::Cancelled => {
                tracing::info!(run_id = %run_id, cursor = %cursor, "Log relay cancelled")
            }
            SessionOutcome::Disconnected => {
                tracing::info!(run_id = %run_id, cursor = %cursor, "Log relay peer went away")
            }
            SessionOutcome::TransportFailed(msg) => tracing::warn!(
                run_id = %run_id,
                cursor = %cursor,
                "Log relay aborted after write failure: {}",
                msg
            ),
            SessionOutcome::StoreFailed(err) => tracing::error!(
                run_id = %run_id,
                cursor = %cursor,
                "Failed to replay log history: {}",
                err
            ),
        }
    }

    async fn replay_step(&mut self) -> Phase {
        let outcome = self
            .store
            .read_batch(
                &self.run_id,
                &self.cursor,
                self.config.batch_size,
                &self.cancel,
            )
            .await;

        match outcome {
            Ok(ReadOutcome::Records(records)) => {
                let short = records.len() < self.config.batch_size;
                if let Some(end) = self.forward_batch(records, DONE_IN_HISTORY).await {
                    return Phase::Terminated(end);
                }
                if short {
                    tracing::debug!(run_id = %self.run_id, cursor = %self.cursor, "Replay caught up");
                    Phase::LiveTail
                } else {
                    Phase::Replay
                }
            }
            Ok(ReadOutcome::Empty) | Ok(ReadOutcome::Timeout) => {
                tracing::debug!(run_id = %self.run_id, cursor = %self.cursor, "No more history, tailing");
                Phase::LiveTail
            }
            Ok(ReadOutcome::Cancelled) => Phase::Terminated(SessionOutcome::Cancelled),
            Err(err) => Phase::Terminated(SessionOutcome::StoreFailed(err)),
        }
    }

    async fn tail_step(&mut self) -> Phase {
        if self.cancel.is_cancelled() {
            return Phase::Terminated(SessionOutcome::Cancelled);
        }

        let outcome = self
            .store
            .read_batch_blocking(
                &self.run_id,
                &self.cursor,
                self.config.batch_size,
                self.config.block_timeout,
                &self.cancel,
            )
            .await;

        match outcome {
            Ok(ReadOutcome::Records(records)) => {
                match self.forward_batch(records, DONE_LIVE).await {
                    Some(end) => Phase::Terminated(end),
                    None => Phase::LiveTail,
                }
            }
            Ok(ReadOutcome::Timeout) | Ok(ReadOutcome::Empty) => Phase::LiveTail,
            Ok(ReadOutcome::Cancelled) => Phase::Terminated(SessionOutcome::Cancelled),
            Err(err) => {
                tracing::error!(
                    run_id = %self.run_id,
                    "Failed to read live log, retrying in {:?}: {}",
                    self.config.error_cooldown,
                    err
                );
                tokio::select! {
                    _ = tokio::time::sleep(self.config.error_cooldown) => Phase::LiveTail,
                    _ = self.cancel.cancelled() => Phase::Terminated(SessionOutcome::Cancelled),
                }
            }
        }
    }

    /// Forward records in order, stopping at the end-of-stream marker
    ///
    /// The marker is not relayed as data; it only triggers the done event.
    /// Returns `Some` when the session must end.
    async fn forward_batch(
        &mut self,
        records: Vec<LogRecord>,
        done_message: &str,
    ) -> Option<SessionOutcome> {
        for record in records {
            if self.cancel.is_cancelled() {
                return Some(SessionOutcome::Cancelled);
            }

            let decoded = match codec::decode(record) {
                Ok(decoded) => decoded,
                Err(err) => {
                    tracing::warn!(run_id = %self.run_id, "Skipping log record: {}", err);
                    // Re-reading a bad record would loop forever.
                    self.cursor = err.record_id().clone();
                    continue;
                }
            };

            if codec::is_terminal(&decoded) {
                tracing::info!(
                    run_id = %self.run_id,
                    record_id = %decoded.id,
                    "End of stream marker found"
                );
                self.cursor = decoded.id;
                return Some(
                    match self
                        .transport
                        .write(&SseFrame::done(done_message), &self.cancel)
                        .await
                    {
                        Ok(()) => SessionOutcome::Completed,
                        Err(err) => transport_outcome(err),
                    },
                );
            }

            if let Err(err) = self
                .transport
                .send(&SseFrame::Data(decoded.payload), &self.cancel)
                .await
            {
                return Some(transport_outcome(err));
            }
            self.cursor = decoded.id;
        }

        None
    }
}

fn transport_outcome(err: TransportError) -> SessionOutcome {
    match err {
        TransportError::Disconnected => SessionOutcome::Disconnected,
        TransportError::Cancelled => SessionOutcome::Cancelled,
        TransportError::Failed(msg) => SessionOutcome::TransportFailed(msg),
    }
}
