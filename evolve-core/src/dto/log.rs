//! Live log stream protocol
//!
//! Names shared by the relay endpoint and its consumers.

use serde::{Deserialize, Serialize};

/// Query parameter naming the run to stream. Takes precedence over the header.
pub const RUN_ID_QUERY_PARAM: &str = "runId";

/// Header naming the run to stream
pub const RUN_ID_HEADER: &str = "X-RUN-ID";

/// SSE event name of the terminal frame
pub const DONE_EVENT: &str = "done";

/// Body of the terminal `done` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoneEvent {
    pub message: String,
}

impl DoneEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
