//! Live log following

use std::pin::Pin;

use bytes::Bytes;
use eventsource_stream::{Event, EventStreamError, Eventsource};
use evolve_core::domain::log::LogEntry;
use evolve_core::domain::run::RunId;
use evolve_core::dto::log::{DONE_EVENT, DoneEvent, RUN_ID_QUERY_PARAM};
use futures::{Stream, StreamExt, future};
use reqwest::{Method, header};

use crate::EvolveClient;
use crate::error::{ClientError, Result};

/// One relayed log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Payload exactly as the worker wrote it
    pub raw: String,
    /// Parsed entry, `None` for payloads that are not JSON log entries
    pub entry: Option<LogEntry>,
}

impl LogLine {
    fn parse(raw: String) -> Self {
        let entry = serde_json::from_str(&raw).ok();
        Self { raw, entry }
    }
}

/// One item of a followed log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    Log(LogLine),
    /// The run finished; carries the server's closing message
    Done(String),
}

pub type LogStream = Pin<Box<dyn Stream<Item = Result<LogEvent>> + Send>>;

impl EvolveClient {
    /// Follow a run's log from the beginning
    ///
    /// The stream replays the output written so far, then yields new lines
    /// as they are produced. It ends after `LogEvent::Done`, or when the
    /// server closes the connection. There is no automatic reconnect: the
    /// server replays from the start, so a reconnect would repeat lines.
    pub async fn follow_run_logs(&self, run_id: &RunId) -> Result<LogStream> {
        let response = self
            .request(Method::GET, "/api/runs/logs")
            .query(&[(RUN_ID_QUERY_PARAM, run_id.as_str())])
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        tracing::debug!("Following logs of run {}", run_id);
        Ok(log_events(response.bytes_stream()))
    }
}

/// Turn a raw SSE byte stream into log events
///
/// The stream stops after the done event or the first error.
pub(crate) fn log_events<S>(bytes: S) -> LogStream
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + 'static,
{
    let stream = bytes
        .eventsource()
        .filter_map(|item| {
            future::ready(match item {
                Ok(event) => to_log_event(event),
                Err(EventStreamError::Transport(err)) => Some(Err(ClientError::from(err))),
                Err(err) => Some(Err(ClientError::ParseError(format!(
                    "Invalid event stream: {}",
                    err
                )))),
            })
        })
        .scan(false, |finished, item| {
            if *finished {
                return future::ready(None);
            }
            *finished = item.is_err() || matches!(item, Ok(LogEvent::Done(_)));
            future::ready(Some(item))
        });

    Box::pin(stream)
}

/// Map an SSE event to a log event
///
/// Unknown event names and frames without data (the retry preamble,
/// keep-alives) are ignored.
fn to_log_event(event: Event) -> Option<Result<LogEvent>> {
    match event.event.as_str() {
        "" | "message" if event.data.is_empty() => None,
        "" | "message" => Some(Ok(LogEvent::Log(LogLine::parse(event.data)))),
        DONE_EVENT => Some(
            serde_json::from_str::<DoneEvent>(&event.data)
                .map(|done| LogEvent::Done(done.message))
                .map_err(|e| ClientError::ParseError(format!("Invalid done event: {}", e))),
        ),
        other => {
            tracing::debug!("Ignoring SSE event '{}'", other);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evolve_core::domain::log::SourceStream;

    fn chunks(parts: &[&str]) -> LogStream {
        let items: Vec<std::result::Result<Bytes, reqwest::Error>> = parts
            .iter()
            .map(|p| Ok(Bytes::from(p.to_string())))
            .collect();
        log_events(futures::stream::iter(items))
    }

    fn entries(events: &[LogEvent]) -> Vec<Option<LogEntry>> {
        events
            .iter()
            .filter_map(|e| match e {
                LogEvent::Log(line) => Some(line.entry.clone()),
                LogEvent::Done(_) => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_lines_then_done() {
        let stream = chunks(&[
            "retry: 3000\n\n",
            "data: {\"stream\":\"stdout\",\"line\":\"a\",\"status\":\"\"}\n\n",
            "data: {\"stream\":\"stderr\",\"line\":\"b\",\"status\":\"\"}\n\nevent: done\n",
            "data: {\"message\":\"Stream ended.\"}\n\n",
            "data: {\"stream\":\"stdout\",\"line\":\"after\",\"status\":\"\"}\n\n",
        ]);

        let events: Vec<LogEvent> = stream.map(|e| e.unwrap()).collect().await;
        assert_eq!(events.len(), 3);
        assert_eq!(
            entries(&events),
            vec![
                Some(LogEntry::line(SourceStream::Stdout, "a")),
                Some(LogEntry::line(SourceStream::Stderr, "b")),
            ]
        );
        assert_eq!(events[2], LogEvent::Done("Stream ended.".to_string()));
    }

    #[tokio::test]
    async fn test_frame_split_across_chunks() {
        let stream = chunks(&[
            ": keep-alive\n\nda",
            "ta: {\"line\":\"a\",\"sta",
            "tus\":\"\"}\r\n\r\n",
        ]);
        let events: Vec<LogEvent> = stream.map(|e| e.unwrap()).collect().await;
        assert_eq!(entries(&events).len(), 1);
        assert_eq!(entries(&events)[0].as_ref().unwrap().line, "a");
    }

    #[tokio::test]
    async fn test_stream_ends_without_done() {
        let stream = chunks(&["data: {\"line\":\"a\",\"status\":\"\"}\n\n"]);
        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_raw_payload_is_kept() {
        let payload = r#"{"stream":"stdout","line":"a","status":"","host":"w1"}"#;
        let body = format!("data: {}\n\ndata: plain text\n\n", payload);
        let events: Vec<LogEvent> = chunks(&[&body]).map(|e| e.unwrap()).collect().await;

        let LogEvent::Log(first) = &events[0] else {
            panic!("expected a log line");
        };
        assert_eq!(first.raw, payload);
        assert_eq!(first.entry.as_ref().unwrap().line, "a");

        let LogEvent::Log(second) = &events[1] else {
            panic!("expected a log line");
        };
        assert_eq!(second.raw, "plain text");
        assert!(second.entry.is_none());
    }

    #[tokio::test]
    async fn test_invalid_done_event_is_reported() {
        let mut stream = chunks(&["event: done\ndata: nope\n\n"]);
        let first = stream.next().await.unwrap();
        assert!(matches!(first, Err(ClientError::ParseError(_))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_events_are_ignored() {
        let stream = chunks(&["event: ping\ndata: {}\n\n"]);
        let events: Vec<_> = stream.collect().await;
        assert!(events.is_empty());
    }
}
