//! Log Store
//!
//! Read-only access to the per-run, append-only log streams the worker
//! writes. The `LogStore` trait is the seam implemented by Redis in
//! production and by an in-memory store in tests; `LogStoreClient` layers
//! cancellation and response deadlines on top of it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use evolve_core::domain::run::RunId;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Extra time a store gets to answer beyond the wait it was asked for
const RESPONSE_GRACE: Duration = Duration::from_secs(3);

/// Store-assigned identifier of a record within its stream
///
/// Opaque to the relay; only ever handed back to the store as a cursor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryId(String);

impl EntryId {
    /// Cursor value that reads a stream from its first record
    pub fn stream_start() -> Self {
        Self("0-0".to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value of a single record field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    /// Binary or structured value that is not valid text
    Other,
}

/// One record of a run's log stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub id: EntryId,
    pub fields: HashMap<String, FieldValue>,
}

impl LogRecord {
    pub fn new(id: EntryId, fields: HashMap<String, FieldValue>) -> Self {
        Self { id, fields }
    }

    /// Record carrying a single text field
    pub fn with_text(id: EntryId, field: &str, value: impl Into<String>) -> Self {
        let mut fields = HashMap::new();
        fields.insert(field.to_string(), FieldValue::Text(value.into()));
        Self { id, fields }
    }
}

/// Hard failures of the log store
///
/// "No data yet" is never an error; it is reported through `ReadOutcome`.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("log store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid stream key '{0}'")]
    InvalidKey(String),

    #[error("log store did not answer within {0:?}")]
    Unresponsive(Duration),
}

/// Result of a read that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Records strictly after the cursor, in stream order
    Records(Vec<LogRecord>),
    /// Non-blocking read found no stream or nothing newer than the cursor
    Empty,
    /// Blocking read waited the full interval without new records
    Timeout,
    /// The cancellation signal fired before the store answered
    Cancelled,
}

/// Ordered per-run log storage
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Read up to `count` records after `cursor` without waiting
    ///
    /// A stream that does not exist yet yields an empty list.
    async fn read_after(
        &self,
        stream: &RunId,
        cursor: &EntryId,
        count: usize,
    ) -> Result<Vec<LogRecord>, StoreError>;

    /// Read up to `count` records after `cursor`, waiting up to `max_wait`
    /// for at least one to appear
    ///
    /// An empty list means the wait elapsed.
    async fn read_after_blocking(
        &self,
        stream: &RunId,
        cursor: &EntryId,
        count: usize,
        max_wait: Duration,
    ) -> Result<Vec<LogRecord>, StoreError>;
}

/// Shared handle used by relay sessions to read from the store
#[derive(Clone)]
pub struct LogStoreClient {
    store: Arc<dyn LogStore>,
}

impl LogStoreClient {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self { store }
    }

    /// Non-blocking batch read
    ///
    /// # Arguments
    /// * `stream` - The run whose log is read
    /// * `cursor` - Last record already consumed
    /// * `max_count` - Upper bound on returned records
    /// * `cancel` - Signal that abandons the read
    pub async fn read_batch(
        &self,
        stream: &RunId,
        cursor: &EntryId,
        max_count: usize,
        cancel: &CancellationToken,
    ) -> Result<ReadOutcome, StoreError> {
        let read = self.store.read_after(stream, cursor, max_count);
        let outcome = with_deadline(read, RESPONSE_GRACE, cancel).await?;

        Ok(match outcome {
            Some(records) if records.is_empty() => ReadOutcome::Empty,
            Some(records) => ReadOutcome::Records(records),
            None => ReadOutcome::Cancelled,
        })
    }

    /// Blocking batch read bounded by `max_wait`
    ///
    /// # Arguments
    /// * `stream` - The run whose log is read
    /// * `cursor` - Last record already consumed
    /// * `max_count` - Upper bound on returned records
    /// * `max_wait` - How long the store may wait for new records
    /// * `cancel` - Signal that abandons the read
    pub async fn read_batch_blocking(
        &self,
        stream: &RunId,
        cursor: &EntryId,
        max_count: usize,
        max_wait: Duration,
        cancel: &CancellationToken,
    ) -> Result<ReadOutcome, StoreError> {
        let read = self
            .store
            .read_after_blocking(stream, cursor, max_count, max_wait);
        let outcome = with_deadline(read, max_wait + RESPONSE_GRACE, cancel).await?;

        Ok(match outcome {
            Some(records) if records.is_empty() => ReadOutcome::Timeout,
            Some(records) => ReadOutcome::Records(records),
            None => ReadOutcome::Cancelled,
        })
    }
}

/// Run a store read until it answers, the deadline passes, or `cancel` fires.
/// `None` means cancelled.
async fn with_deadline<F>(
    read: F,
    deadline: Duration,
    cancel: &CancellationToken,
) -> Result<Option<Vec<LogRecord>>, StoreError>
where
    F: std::future::Future<Output = Result<Vec<LogRecord>, StoreError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(None),
        result = tokio::time::timeout(deadline, read) => match result {
            Ok(records) => records.map(Some),
            Err(_) => Err(StoreError::Unresponsive(deadline)),
        },
    }
}
