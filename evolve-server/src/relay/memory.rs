//! In-memory log store used by relay tests

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use evolve_core::domain::log::LogEntry;
use evolve_core::domain::run::RunId;
use tokio::sync::Notify;

use super::codec::LOG_DATA_FIELD;
use super::store::{EntryId, FieldValue, LogRecord, LogStore, StoreError};

#[derive(Default)]
pub struct MemoryLogStore {
    streams: Mutex<HashMap<String, Vec<LogRecord>>>,
    next_seq: AtomicUsize,
    appended: Notify,
    failures: Mutex<VecDeque<StoreError>>,
    blocking_failures: Mutex<VecDeque<StoreError>>,
    reads: AtomicUsize,
    blocking_reads: AtomicUsize,
    blocking_cursors: Mutex<Vec<EntryId>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_record(&self, stream: &str, fields: HashMap<String, FieldValue>) -> EntryId {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let id = EntryId::new(format!("{}-0", seq));
        self.streams
            .lock()
            .unwrap()
            .entry(stream.to_string())
            .or_default()
            .push(LogRecord::new(id.clone(), fields));
        self.appended.notify_waiters();
        id
    }

    /// Append a raw `log_data` payload
    pub fn append_text(&self, stream: &str, payload: &str) -> EntryId {
        let mut fields = HashMap::new();
        fields.insert(
            LOG_DATA_FIELD.to_string(),
            FieldValue::Text(payload.to_string()),
        );
        self.append_record(stream, fields)
    }

    pub fn append_entry(&self, stream: &str, entry: &LogEntry) -> EntryId {
        let payload = serde_json::to_string(entry).unwrap();
        self.append_text(stream, &payload)
    }

    /// Make the next non-blocking read fail
    pub fn fail_next_read(&self, err: StoreError) {
        self.failures.lock().unwrap().push_back(err);
    }

    /// Make the next blocking read fail
    pub fn fail_next_blocking_read(&self, err: StoreError) {
        self.blocking_failures.lock().unwrap().push_back(err);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn blocking_reads(&self) -> usize {
        self.blocking_reads.load(Ordering::SeqCst)
    }

    pub fn total_reads(&self) -> usize {
        self.reads() + self.blocking_reads()
    }

    /// Cursors passed to blocking reads, in call order
    pub fn blocking_cursors(&self) -> Vec<EntryId> {
        self.blocking_cursors.lock().unwrap().clone()
    }

    fn collect_after(&self, stream: &RunId, cursor: &EntryId, count: usize) -> Vec<LogRecord> {
        let streams = self.streams.lock().unwrap();
        let Some(records) = streams.get(stream.as_str()) else {
            return Vec::new();
        };

        let start = if *cursor == EntryId::stream_start() {
            0
        } else {
            records
                .iter()
                .position(|r| r.id == *cursor)
                .map(|i| i + 1)
                .unwrap_or(records.len())
        };

        records.iter().skip(start).take(count).cloned().collect()
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn read_after(
        &self,
        stream: &RunId,
        cursor: &EntryId,
        count: usize,
    ) -> Result<Vec<LogRecord>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self.collect_after(stream, cursor, count))
    }

    async fn read_after_blocking(
        &self,
        stream: &RunId,
        cursor: &EntryId,
        count: usize,
        max_wait: Duration,
    ) -> Result<Vec<LogRecord>, StoreError> {
        self.blocking_reads.fetch_add(1, Ordering::SeqCst);
        self.blocking_cursors.lock().unwrap().push(cursor.clone());
        if let Some(err) = self.blocking_failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        let deadline = tokio::time::Instant::now() + max_wait;
        loop {
            let appended = self.appended.notified();
            let records = self.collect_after(stream, cursor, count);
            if !records.is_empty() {
                return Ok(records);
            }
            if tokio::time::timeout_at(deadline, appended).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }
}
