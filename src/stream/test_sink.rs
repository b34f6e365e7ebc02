//! In-memory `ChunkSink` for transport and pump tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Bytes;
use tokio_util::sync::CancellationToken;

use super::transport::{ChunkSink, SinkClosed};

/// Records every chunk. Clones share the same record.
#[derive(Clone)]
pub struct RecordingSink {
    chunks: Arc<Mutex<Vec<String>>>,
    gone: CancellationToken,
    fail_after: Option<usize>,
    incremental: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self { chunks: Arc::new(Mutex::new(Vec::new())), gone: CancellationToken::new(), fail_after: None, incremental: true }
    }

    /// Accept `n` chunks, then fail every later write.
    pub fn failing_after(n: usize) -> Self {
        Self { fail_after: Some(n), ..Self::new() }
    }

    pub fn buffered_only() -> Self {
        Self { incremental: false, ..Self::new() }
    }

    /// Simulate the client going away.
    pub fn disconnect(&self) {
        self.gone.cancel();
    }

    pub fn chunks(&self) -> Vec<String> {
        self.chunks.lock().expect("sink mutex").clone()
    }

    pub fn output(&self) -> String {
        self.chunks().concat()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.chunks().iter().filter(|c| c.contains(needle)).count()
    }
}

#[async_trait]
impl ChunkSink for RecordingSink {
    fn supports_incremental_flush(&self) -> bool {
        self.incremental
    }

    async fn write_and_flush(&mut self, chunk: Bytes) -> Result<(), SinkClosed> {
        if self.gone.is_cancelled() {
            return Err(SinkClosed);
        }
        let mut chunks = self.chunks.lock().expect("sink mutex");
        if self.fail_after.is_some_and(|n| chunks.len() >= n) {
            return Err(SinkClosed);
        }
        chunks.push(String::from_utf8_lossy(&chunk).into_owned());
        Ok(())
    }

    async fn disconnected(&self) {
        self.gone.cancelled().await;
    }
}
