//! Live Log API Handler
//!
//! Opens a Server-Sent Events stream for one run and hands it to a relay
//! session running on its own task.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, header},
    response::{
        IntoResponse,
        sse::{KeepAlive, Sse},
    },
};
use evolve_core::domain::run::RunId;
use evolve_core::dto::log::{RUN_ID_HEADER, RUN_ID_QUERY_PARAM};
use serde::Deserialize;

use crate::api::error::{ApiError, ApiResult};
use crate::relay::{ChannelWriter, RelaySession};
use crate::state::AppState;

/// Frames buffered between the session and the connection
const FRAME_BUFFER: usize = 16;

/// Headers sent on top of the ones `Sse` sets
fn stream_headers() -> [(HeaderName, HeaderValue); 2] {
    [
        (header::CONNECTION, HeaderValue::from_static("keep-alive")),
        // Stops reverse proxies from buffering the event stream
        (
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        ),
    ]
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(rename = "runId")]
    pub run_id: Option<String>,
}

/// GET /api/runs/logs, GET /api/logs
/// Stream a run's log as Server-Sent Events
pub async fn stream_run_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let run_id = requested_run_id(query, &headers)?;
    tracing::info!(run_id = %run_id, "Log stream requested");

    let (writer, events) = ChannelWriter::channel(FRAME_BUFFER);
    let cancel = state.shutdown.child_token();
    writer.watch_disconnect(cancel.clone());

    let session = RelaySession::new(
        run_id,
        state.log_store.clone(),
        writer,
        state.relay.clone(),
        cancel.clone(),
    );
    tokio::spawn(async move {
        let _guard = cancel.drop_guard();
        session.run().await;
    });

    Ok((
        stream_headers(),
        Sse::new(events).keep_alive(KeepAlive::default()),
    ))
}

/// Run id from the query string, falling back to the `X-RUN-ID` header
fn requested_run_id(query: LogsQuery, headers: &HeaderMap) -> ApiResult<RunId> {
    let raw = query
        .run_id
        .filter(|id| !id.is_empty())
        .or_else(|| {
            headers
                .get(RUN_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        })
        .ok_or_else(|| {
            ApiError::BadRequest(format!(
                "{} query parameter or {} header is required",
                RUN_ID_QUERY_PARAM, RUN_ID_HEADER
            ))
        })?;

    RunId::parse(&raw).map_err(|e| ApiError::BadRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn query(run_id: Option<&str>) -> LogsQuery {
        LogsQuery {
            run_id: run_id.map(str::to_string),
        }
    }

    #[test]
    fn test_query_wins_over_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-run-id", HeaderValue::from_static("from-header"));

        let run_id = requested_run_id(query(Some("from-query")), &headers).unwrap();
        assert_eq!(run_id.as_str(), "from-query");

        let run_id = requested_run_id(query(None), &headers).unwrap();
        assert_eq!(run_id.as_str(), "from-header");
    }

    #[test]
    fn test_missing_run_id() {
        let result = requested_run_id(query(Some("")), &HeaderMap::new());
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_forbidden_characters() {
        for bad in ["run*", "run?", "a\rb"] {
            let result = requested_run_id(query(Some(bad)), &HeaderMap::new());
            assert!(matches!(result, Err(ApiError::BadRequest(_))), "{:?}", bad);
        }
    }
}
