//! Live delivery pump: one task per streaming connection.
//!
//! LIFECYCLE
//! =========
//! 1. Register with the subscriber registry (before the snapshot, so nothing
//!    appended in between is missed).
//! 2. Begin the document and write the current snapshot.
//! 3. `select!` until cancelled:
//!    - fragment from the queue → write it (skipping ids the snapshot covered)
//!    - keep-alive interval with no traffic → heartbeat
//!    - server shutdown or client disconnect → trailer, exit
//! 4. The subscription guard unregisters on every exit path.
//!
//! ERROR HANDLING
//! ==============
//! A failed write ends the pump with `StreamError::Disconnected`. Nothing is
//! retried; the client reconnects if it wants more.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::transport::{ChunkSink, HtmlStream, StreamError};
use crate::render::render_fragment;
use crate::services::chat::ChatService;
use crate::services::registry::Fragment;
use crate::services::store::MessageId;

/// Per-connection pump settings.
#[derive(Debug, Clone)]
pub struct PumpSettings {
    pub title: String,
    /// Raw markup for the document head.
    pub head: String,
    pub keepalive: Duration,
}

/// Why a pump stopped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// Server shutdown.
    Cancelled,
    /// The client went away.
    ClientGone,
    /// The registry dropped this subscriber.
    Unsubscribed,
}

/// Run a pump to completion on a spawned task.
pub fn spawn<S>(
    stream: HtmlStream<S>,
    chat: Arc<ChatService>,
    cancel: CancellationToken,
    settings: PumpSettings,
) -> JoinHandle<Result<PumpExit, StreamError>>
where
    S: ChunkSink + 'static,
{
    tokio::spawn(async move {
        let mut stream = stream;
        run(&mut stream, &chat, &cancel, &settings).await
    })
}

/// Serve one connection until it is cancelled, disconnects or fails.
///
/// # Errors
///
/// Returns the transport error that ended the stream early.
pub async fn run<S: ChunkSink>(
    stream: &mut HtmlStream<S>,
    chat: &ChatService,
    cancel: &CancellationToken,
    settings: &PumpSettings,
) -> Result<PumpExit, StreamError> {
    let (subscription, mut rx) = chat.subscribe();
    let subscriber_id = subscription.id();

    let result = pump(stream, chat, &mut rx, cancel, settings).await;
    match &result {
        Ok(exit) => info!(%subscriber_id, ?exit, "chat: stream ended"),
        Err(e) => warn!(%subscriber_id, error = %e, "chat: stream failed"),
    }

    drop(subscription);
    result
}

async fn pump<S: ChunkSink>(
    stream: &mut HtmlStream<S>,
    chat: &ChatService,
    rx: &mut mpsc::Receiver<Fragment>,
    cancel: &CancellationToken,
    settings: &PumpSettings,
) -> Result<PumpExit, StreamError> {
    stream.begin(&settings.title, &settings.head).await?;

    // Fixed after the snapshot. Live fragments arrive in broadcast order,
    // which need not be id order.
    let mut snapshot_last: Option<MessageId> = None;
    for message in chat.snapshot() {
        stream.write_fragment(&render_fragment(&message)).await?;
        snapshot_last = Some(message.id);
    }

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                return close(stream, PumpExit::Cancelled).await;
            }
            () = stream.disconnected() => {
                return close(stream, PumpExit::ClientGone).await;
            }
            fragment = rx.recv() => {
                let Some(fragment) = fragment else {
                    return close(stream, PumpExit::Unsubscribed).await;
                };
                if snapshot_last.is_some_and(|last| fragment.message_id <= last) {
                    debug!(message_id = %fragment.message_id, "chat: fragment already in snapshot");
                    continue;
                }
                stream.write_fragment(&fragment.markup).await?;
            }
            () = tokio::time::sleep(settings.keepalive) => {
                stream.keep_alive().await?;
            }
        }
    }
}

/// Write the trailer. A peer that is already gone is not an error here.
async fn close<S: ChunkSink>(stream: &mut HtmlStream<S>, exit: PumpExit) -> Result<PumpExit, StreamError> {
    match stream.end().await {
        Ok(()) | Err(StreamError::Disconnected) => Ok(exit),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[path = "pump_test.rs"]
mod tests;
