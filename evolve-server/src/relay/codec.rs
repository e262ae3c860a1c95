//! Log Entry Codec
//!
//! Turns a stored record into a relayable payload. Any textual payload is
//! relayed byte-for-byte; parsing it as a log entry only serves to spot the
//! end-of-stream marker.

use evolve_core::domain::log::LogEntry;
use thiserror::Error;

use super::store::{EntryId, FieldValue, LogRecord};

/// Record field holding the payload. Must match what the worker writes.
pub const LOG_DATA_FIELD: &str = "log_data";

/// A record that decoded successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRecord {
    pub id: EntryId,
    /// Payload exactly as stored
    pub payload: String,
    /// Parsed payload, `None` when it is not a JSON log entry
    pub entry: Option<LogEntry>,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("record {0} has no 'log_data' field")]
    MissingField(EntryId),

    #[error("record {0} field 'log_data' is not text")]
    NotText(EntryId),
}

/// Decode a stored record
pub fn decode(record: LogRecord) -> Result<DecodedRecord, DecodeError> {
    let LogRecord { id, mut fields } = record;

    let payload = match fields.remove(LOG_DATA_FIELD) {
        Some(FieldValue::Text(text)) => text,
        Some(FieldValue::Other) => return Err(DecodeError::NotText(id)),
        None => return Err(DecodeError::MissingField(id)),
    };

    let entry = serde_json::from_str::<LogEntry>(&payload).ok();
    Ok(DecodedRecord { id, payload, entry })
}

/// Whether a record ends the run's stream
pub fn is_terminal(record: &DecodedRecord) -> bool {
    record.entry.as_ref().is_some_and(LogEntry::is_terminal)
}

impl DecodeError {
    /// Id of the record that failed to decode
    pub fn record_id(&self) -> &EntryId {
        match self {
            DecodeError::MissingField(id) | DecodeError::NotText(id) => id,
        }
    }
}
