//! Redis Streams log store
//!
//! Each run's log is a stream keyed by the run id. Non-blocking reads share
//! one `ConnectionManager`; a blocking `XREAD` holds its connection for the
//! whole wait, so it checks out a connection of its own from an idle pool
//! and never delays other sessions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use evolve_core::domain::run::RunId;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, RedisError, Value};

use super::store::{EntryId, FieldValue, LogRecord, LogStore, StoreError};

const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Idle blocking-read connections kept for reuse
const MAX_IDLE_BLOCKING: usize = 32;

/// `LogStore` backed by Redis Streams
#[derive(Clone)]
pub struct RedisLogStore {
    client: redis::Client,
    conn: ConnectionManager,
    blocking: Arc<IdleConnections<MultiplexedConnection>>,
}

/// Connections that are not in use by any blocking read
struct IdleConnections<C> {
    idle: Mutex<Vec<C>>,
    max_idle: usize,
}

impl<C> IdleConnections<C> {
    fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    fn take(&self) -> Option<C> {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
    }

    /// Return a connection; it is dropped when the pool is full
    fn put(&self, conn: C) {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(conn);
        }
    }
}

impl RedisLogStore {
    /// Open the client, establish the shared connection and verify it
    /// answers `PING`
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(store_error)?;
        let conn = tokio::time::timeout(PING_TIMEOUT, client.get_connection_manager())
            .await
            .map_err(|_| StoreError::Unresponsive(PING_TIMEOUT))?
            .map_err(store_error)?;

        let store = Self {
            client,
            conn,
            blocking: Arc::new(IdleConnections::new(MAX_IDLE_BLOCKING)),
        };
        store.ping().await?;
        Ok(store)
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let reply: String = tokio::time::timeout(
            PING_TIMEOUT,
            redis::cmd("PING").query_async(&mut conn),
        )
        .await
        .map_err(|_| StoreError::Unresponsive(PING_TIMEOUT))?
        .map_err(store_error)?;

        tracing::debug!("Redis answered PING with {}", reply);
        Ok(())
    }
}

#[async_trait]
impl LogStore for RedisLogStore {
    async fn read_after(
        &self,
        stream: &RunId,
        cursor: &EntryId,
        count: usize,
    ) -> Result<Vec<LogRecord>, StoreError> {
        let mut conn = self.conn.clone();
        let opts = StreamReadOptions::default().count(count);

        let reply: Option<StreamReadReply> = conn
            .xread_options(&[stream.as_str()], &[cursor.as_str()], &opts)
            .await
            .map_err(store_error)?;

        Ok(records_from_reply(reply))
    }

    async fn read_after_blocking(
        &self,
        stream: &RunId,
        cursor: &EntryId,
        count: usize,
        max_wait: Duration,
    ) -> Result<Vec<LogRecord>, StoreError> {
        let mut conn = match self.blocking.take() {
            Some(conn) => conn,
            None => self
                .client
                .get_multiplexed_tokio_connection()
                .await
                .map_err(store_error)?,
        };
        let opts = StreamReadOptions::default()
            .count(count)
            .block(max_wait.as_millis() as usize);

        // Only a connection whose read completed goes back to the pool. An
        // abandoned or failed read drops it along with any pending reply.
        let reply: Option<StreamReadReply> = conn
            .xread_options(&[stream.as_str()], &[cursor.as_str()], &opts)
            .await
            .map_err(store_error)?;
        self.blocking.put(conn);

        Ok(records_from_reply(reply))
    }
}

/// Flatten an `XREAD` reply; a nil reply means no stream or nothing new
fn records_from_reply(reply: Option<StreamReadReply>) -> Vec<LogRecord> {
    let Some(reply) = reply else {
        return Vec::new();
    };

    reply
        .keys
        .into_iter()
        .flat_map(|key| key.ids)
        .map(|entry| {
            let fields: HashMap<String, FieldValue> = entry
                .map
                .into_iter()
                .map(|(name, value)| (name, field_value(value)))
                .collect();
            LogRecord::new(EntryId::new(entry.id), fields)
        })
        .collect()
}

fn field_value(value: Value) -> FieldValue {
    match value {
        Value::Data(bytes) => match String::from_utf8(bytes) {
            Ok(text) => FieldValue::Text(text),
            Err(_) => FieldValue::Other,
        },
        Value::Status(text) => FieldValue::Text(text),
        _ => FieldValue::Other,
    }
}

fn store_error(err: RedisError) -> StoreError {
    if err.code() == Some("WRONGTYPE") {
        StoreError::InvalidKey(err.to_string())
    } else {
        StoreError::Unavailable(err.to_string())
    }
}
