//! Incremental document transport over a chunked HTTP response.
//!
//! DESIGN
//! ======
//! `HtmlStream` is a small state machine (`NotStarted → Streaming → Closed`)
//! over a `ChunkSink`. Every write goes straight to the sink and is flushed
//! before returning, so the browser renders each fragment as it arrives.
//! The document prefix is valid HTML left open; `end` closes it.
//!
//! The same machine drives Server-Sent Events: only the framing of preamble,
//! fragment, heartbeat and trailer changes.
//!
//! ERROR HANDLING
//! ==============
//! A failed write means the peer is gone. The stream moves to `Closed` and
//! refuses further writes; the caller is expected to stop.

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::render::escape_html;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("streaming is not enabled")]
    Disabled,
    #[error("transport cannot flush incrementally")]
    Unsupported,
    #[error("invalid transport transition: {op} while {state:?}")]
    InvalidState { op: &'static str, state: TransportState },
    #[error("client disconnected")]
    Disconnected,
}

impl StreamError {
    /// Streaming is not possible on this request; serve a static rendering.
    #[must_use]
    pub fn requires_fallback(&self) -> bool {
        matches!(self, Self::Disabled | Self::Unsupported)
    }
}

/// The peer stopped accepting bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("sink closed")]
pub struct SinkClosed;

// =============================================================================
// SINK
// =============================================================================

/// Outbound byte channel of one long-lived response.
#[async_trait]
pub trait ChunkSink: Send + Sync {
    /// Whether writes reach the peer without waiting for the response to end.
    fn supports_incremental_flush(&self) -> bool;

    /// Write one chunk and push it to the peer.
    async fn write_and_flush(&mut self, chunk: Bytes) -> Result<(), SinkClosed>;

    /// Resolves once the peer has gone away.
    async fn disconnected(&self);
}

/// `ChunkSink` feeding an axum streaming body.
///
/// The body holds the receiver; hyper drops it when the client disconnects,
/// which closes the channel and resolves `disconnected`.
pub struct ChannelSink {
    tx: mpsc::Sender<Result<Bytes, std::convert::Infallible>>,
}

impl ChannelSink {
    /// Create a sink and the response body it writes into.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, Body) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, Body::from_stream(ReceiverStream::new(rx)))
    }
}

#[async_trait]
impl ChunkSink for ChannelSink {
    fn supports_incremental_flush(&self) -> bool {
        true
    }

    async fn write_and_flush(&mut self, chunk: Bytes) -> Result<(), SinkClosed> {
        self.tx.send(Ok(chunk)).await.map_err(|_| SinkClosed)
    }

    async fn disconnected(&self) {
        self.tx.closed().await;
    }
}

// =============================================================================
// ENCODING
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEncoding {
    /// An open HTML document, one fragment appended per write.
    Html,
    /// `text/event-stream`, one `data:` event per fragment.
    EventStream,
}

impl StreamEncoding {
    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Html => "text/html; charset=utf-8",
            Self::EventStream => "text/event-stream",
        }
    }

    fn preamble(self, title: &str, head: &str) -> String {
        match self {
            Self::Html => format!(
                "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n\
                 <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n{head}\n</head>\n<body>\n",
                escape_html(title)
            ),
            Self::EventStream => "retry: 3000\n\n".to_owned(),
        }
    }

    fn fragment(self, markup: &str) -> String {
        match self {
            Self::Html => format!("{markup}\n"),
            Self::EventStream => {
                let mut event = String::with_capacity(markup.len() + 16);
                // CR, LF and CRLF all end an SSE line.
                for line in markup.split(['\n', '\r']).filter(|l| !l.is_empty()) {
                    event.push_str("data: ");
                    event.push_str(line);
                    event.push('\n');
                }
                if event.is_empty() {
                    event.push_str("data: \n");
                }
                event.push('\n');
                event
            }
        }
    }

    fn heartbeat(self) -> &'static str {
        match self {
            Self::Html => "<!-- keepalive -->\n",
            Self::EventStream => ": keepalive\n\n",
        }
    }

    fn trailer(self) -> &'static str {
        match self {
            Self::Html => "</body>\n</html>\n",
            Self::EventStream => "event: close\ndata: \n\n",
        }
    }
}

// =============================================================================
// STREAM
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    NotStarted,
    Streaming,
    Closed,
}

pub struct HtmlStream<S> {
    sink: S,
    encoding: StreamEncoding,
    state: TransportState,
}

impl<S: ChunkSink> HtmlStream<S> {
    /// Wrap `sink` after checking that streaming is both enabled and
    /// supported by the transport.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Disabled`] or [`StreamError::Unsupported`]; both
    /// mean the caller should fall back to a static rendering.
    pub fn open(sink: S, encoding: StreamEncoding, streaming_enabled: bool) -> Result<Self, StreamError> {
        if !streaming_enabled {
            return Err(StreamError::Disabled);
        }
        if !sink.supports_incremental_flush() {
            return Err(StreamError::Unsupported);
        }
        Ok(Self { sink, encoding, state: TransportState::NotStarted })
    }

    #[must_use]
    pub fn state(&self) -> TransportState {
        self.state
    }

    #[must_use]
    pub fn encoding(&self) -> StreamEncoding {
        self.encoding
    }

    /// Write the document prefix. `head` is raw markup placed inside `<head>`.
    ///
    /// # Errors
    ///
    /// Fails if already started, or if the peer is gone.
    pub async fn begin(&mut self, title: &str, head: &str) -> Result<(), StreamError> {
        if self.state != TransportState::NotStarted {
            return Err(StreamError::InvalidState { op: "begin", state: self.state });
        }
        let preamble = self.encoding.preamble(title, head);
        self.state = TransportState::Streaming;
        self.write(preamble.into()).await
    }

    /// Append markup and flush it.
    ///
    /// # Errors
    ///
    /// Fails unless streaming, or if the peer is gone.
    pub async fn write_fragment(&mut self, markup: &str) -> Result<(), StreamError> {
        self.expect_streaming("write_fragment")?;
        let chunk = self.encoding.fragment(markup);
        self.write(chunk.into()).await
    }

    /// Write a no-op comment to keep intermediaries from timing out.
    ///
    /// # Errors
    ///
    /// Fails unless streaming, or if the peer is gone.
    pub async fn keep_alive(&mut self) -> Result<(), StreamError> {
        self.expect_streaming("keep_alive")?;
        let chunk = Bytes::from_static(self.encoding.heartbeat().as_bytes());
        self.write(chunk).await
    }

    /// Close the document. The stream is `Closed` afterwards even if the
    /// trailer could not be delivered.
    ///
    /// # Errors
    ///
    /// Fails unless streaming, or if the peer is gone.
    pub async fn end(&mut self) -> Result<(), StreamError> {
        self.expect_streaming("end")?;
        let chunk = Bytes::from_static(self.encoding.trailer().as_bytes());
        let result = self.write(chunk).await;
        self.state = TransportState::Closed;
        result
    }

    /// Terminate without a trailer.
    pub fn abort(&mut self) {
        self.state = TransportState::Closed;
    }

    /// Resolves once the peer has gone away.
    pub async fn disconnected(&self) {
        self.sink.disconnected().await;
    }

    fn expect_streaming(&self, op: &'static str) -> Result<(), StreamError> {
        if self.state == TransportState::Streaming {
            Ok(())
        } else {
            Err(StreamError::InvalidState { op, state: self.state })
        }
    }

    async fn write(&mut self, chunk: Bytes) -> Result<(), StreamError> {
        if self.sink.write_and_flush(chunk).await.is_err() {
            self.state = TransportState::Closed;
            return Err(StreamError::Disconnected);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
