//! Event Transport
//!
//! Pushes relay output toward the peer as Server-Sent Events.
//!
//! `EventWriter` is the raw write seam. `ChannelWriter` implements it over a
//! bounded channel drained by axum's `Sse` response, so a slow consumer
//! applies backpressure rather than growing memory, and a stalled one can
//! still be abandoned through the session's cancellation token.
//! `EventTransport` adds the pacing delay and the logging policy for failures.

use std::convert::Infallible;
use std::time::Duration;

use async_trait::async_trait;
use axum::response::sse::Event;
use evolve_core::domain::run::RunId;
use evolve_core::dto::log::{DONE_EVENT, DoneEvent};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

/// One SSE record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// Reconnection delay suggested to the client
    Retry(Duration),
    /// Unnamed frame carrying a raw payload
    Data(String),
    /// Named frame
    Event { name: String, data: String },
}

impl SseFrame {
    /// Terminal frame announcing the end of a run's output
    pub fn done(message: &str) -> Self {
        let data = serde_json::to_string(&DoneEvent::new(message))
            .unwrap_or_else(|_| "{}".to_string());
        SseFrame::Event {
            name: DONE_EVENT.to_string(),
            data,
        }
    }

    /// The frame as an axum SSE event
    ///
    /// CRLF inside a payload becomes a single line break, so each payload
    /// line maps to exactly one `data:` line.
    pub fn to_event(&self) -> Event {
        match self {
            SseFrame::Retry(delay) => Event::default().retry(*delay),
            SseFrame::Data(data) => Event::default().data(data.replace("\r\n", "\n")),
            SseFrame::Event { name, data } => Event::default()
                .event(name)
                .data(data.replace("\r\n", "\n")),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer went away
    #[error("peer disconnected")]
    Disconnected,

    /// The session was cancelled while the write waited on the peer
    #[error("write abandoned on cancellation")]
    Cancelled,

    #[error("transport failure: {0}")]
    Failed(String),
}

/// Writes frames to a single peer
#[async_trait]
pub trait EventWriter: Send {
    /// Deliver one frame, giving up with `TransportError::Cancelled` once
    /// `cancel` fires
    async fn write_frame(
        &mut self,
        frame: &SseFrame,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError>;
}

/// Item type of the SSE response stream
pub type EventItem = Result<Event, Infallible>;

/// Stream fed by a `ChannelWriter`, to be wrapped in `axum::response::sse::Sse`
pub type EventStream = ReceiverStream<EventItem>;

/// `EventWriter` backed by a bounded channel drained by the HTTP body
pub struct ChannelWriter {
    tx: mpsc::Sender<EventItem>,
}

impl ChannelWriter {
    /// Create a writer and the event stream it feeds
    ///
    /// # Arguments
    /// * `capacity` - Frames buffered before writes wait on the peer
    pub fn channel(capacity: usize) -> (Self, EventStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, ReceiverStream::new(rx))
    }

    /// Cancel `cancel` as soon as the event stream is dropped by the
    /// server, which is how a peer disconnect surfaces.
    ///
    /// The watcher exits once `cancel` fires for any reason.
    pub fn watch_disconnect(&self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tx.closed() => cancel.cancel(),
                _ = cancel.cancelled() => {}
            }
        })
    }
}

#[async_trait]
impl EventWriter for ChannelWriter {
    async fn write_frame(
        &mut self,
        frame: &SseFrame,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        let event = frame.to_event();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            sent = self.tx.send(Ok(event)) => sent.map_err(|_| TransportError::Disconnected),
        }
    }
}

/// Paced, logged frame delivery for one relay session
pub struct EventTransport<W> {
    writer: W,
    pacing: Duration,
    run_id: RunId,
}

impl<W: EventWriter> EventTransport<W> {
    pub fn new(writer: W, pacing: Duration, run_id: RunId) -> Self {
        Self {
            writer,
            pacing,
            run_id,
        }
    }

    /// Write one frame, then hold for the pacing delay
    ///
    /// The delay ends early if `cancel` fires.
    pub async fn send(
        &mut self,
        frame: &SseFrame,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        self.write(frame, cancel).await?;

        if !self.pacing.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.pacing) => {}
                _ = cancel.cancelled() => {}
            }
        }

        Ok(())
    }

    /// Write one frame without pacing
    pub async fn write(
        &mut self,
        frame: &SseFrame,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        match self.writer.write_frame(frame, cancel).await {
            Ok(()) => Ok(()),
            Err(TransportError::Disconnected) => {
                tracing::debug!(run_id = %self.run_id, "SSE peer disconnected during write");
                Err(TransportError::Disconnected)
            }
            Err(TransportError::Cancelled) => {
                tracing::debug!(run_id = %self.run_id, "SSE write abandoned, session cancelled");
                Err(TransportError::Cancelled)
            }
            Err(err) => {
                tracing::error!(run_id = %self.run_id, "SSE write failed: {}", err);
                Err(err)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingWriter;
    use super::*;
    use axum::response::IntoResponse;
    use axum::response::sse::Sse;
    use http_body_util::BodyExt;
    use tokio_stream::StreamExt;

    fn run_id() -> RunId {
        RunId::parse("run-1").unwrap()
    }

    /// Bytes axum writes for `frames`
    async fn wire(frames: &[SseFrame]) -> String {
        let events: Vec<EventItem> = frames.iter().map(|f| Ok(f.to_event())).collect();
        let response = Sse::new(tokio_stream::iter(events)).into_response();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_data_frame_on_the_wire() {
        let body = wire(&[SseFrame::Data(r#"{"line":"a"}"#.to_string())]).await;
        assert_eq!(body, "data: {\"line\":\"a\"}\n\n");
    }

    #[tokio::test]
    async fn test_multiline_payload_on_the_wire() {
        let body = wire(&[SseFrame::Data("one\r\ntwo".to_string())]).await;
        assert_eq!(body, "data: one\ndata: two\n\n");
    }

    #[tokio::test]
    async fn test_done_and_retry_on_the_wire() {
        let body = wire(&[
            SseFrame::Retry(Duration::from_secs(3)),
            SseFrame::done("Stream ended."),
        ])
        .await;
        assert_eq!(
            body,
            "retry: 3000\n\nevent: done\ndata: {\"message\":\"Stream ended.\"}\n\n"
        );
    }

    #[tokio::test]
    async fn test_channel_writer_feeds_stream() {
        let (mut writer, mut events) = ChannelWriter::channel(4);
        let cancel = CancellationToken::new();
        writer
            .write_frame(&SseFrame::Data("x".to_string()), &cancel)
            .await
            .unwrap();
        drop(writer);

        assert!(events.next().await.unwrap().is_ok());
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_channel_writer_reports_disconnect() {
        let (mut writer, events) = ChannelWriter::channel(1);
        drop(events);

        let result = writer
            .write_frame(&SseFrame::Data("x".to_string()), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(TransportError::Disconnected)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_channel_write_gives_up_on_cancel() {
        let (mut writer, _events) = ChannelWriter::channel(1);
        let cancel = CancellationToken::new();
        writer
            .write_frame(&SseFrame::Data("a".to_string()), &cancel)
            .await
            .unwrap();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            canceller.cancel();
        });

        let result = writer
            .write_frame(&SseFrame::Data("b".to_string()), &cancel)
            .await;
        assert!(matches!(result, Err(TransportError::Cancelled)));
    }

    #[tokio::test]
    async fn test_watch_disconnect_cancels_token() {
        let (writer, events) = ChannelWriter::channel(1);
        let cancel = CancellationToken::new();
        let watcher = writer.watch_disconnect(cancel.clone());

        drop(events);
        watcher.await.unwrap();
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_watch_disconnect_exits_on_cancel() {
        let (writer, _events) = ChannelWriter::channel(1);
        let cancel = CancellationToken::new();
        let watcher = writer.watch_disconnect(cancel.clone());

        cancel.cancel();
        watcher.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_waits_for_pacing() {
        let writer = RecordingWriter::default();
        let mut transport =
            EventTransport::new(writer.clone(), Duration::from_millis(256), run_id());
        let cancel = CancellationToken::new();

        let start = tokio::time::Instant::now();
        transport
            .send(&SseFrame::Data("a".to_string()), &cancel)
            .await
            .unwrap();
        transport
            .send(&SseFrame::Data("b".to_string()), &cancel)
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_millis(512));
        assert_eq!(writer.data(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_interrupted_by_cancel() {
        let mut transport = EventTransport::new(
            RecordingWriter::default(),
            Duration::from_secs(60),
            run_id(),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let start = tokio::time::Instant::now();
        transport
            .send(&SseFrame::Data("a".to_string()), &cancel)
            .await
            .unwrap();
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_send_surfaces_write_failure() {
        let mut transport = EventTransport::new(
            RecordingWriter::failing_after(0),
            Duration::ZERO,
            run_id(),
        );
        let cancel = CancellationToken::new();

        let result = transport
            .send(&SseFrame::Data("a".to_string()), &cancel)
            .await;
        assert!(matches!(result, Err(TransportError::Disconnected)));
    }
}
