//! Message store: append-only in-memory chat log.
//!
//! DESIGN
//! ======
//! Messages live in a `Vec` behind a `RwLock`. Writers take the exclusive
//! lock only long enough to stamp an id and push; readers copy the recent
//! tail under the shared lock. Nothing is ever removed. Retention is a read
//! concern: `snapshot` returns at most `retention` trailing messages.
//!
//! Ids are a sequence counter assigned under the write lock, so append order,
//! id order and log order are the same thing.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use serde::Serialize;
use time::OffsetDateTime;

use crate::services::identity::Author;

// =============================================================================
// TYPES
// =============================================================================

/// Monotonic message identifier. Starts at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub author: Author,
    /// Stored verbatim. Escaping happens at render time.
    pub text: String,
    pub created_at: OffsetDateTime,
}

impl Message {
    /// Creation time as milliseconds since Unix epoch.
    #[must_use]
    pub fn created_at_ms(&self) -> i64 {
        i64::try_from(self.created_at.unix_timestamp_nanos() / 1_000_000).unwrap_or(0)
    }
}

struct Log {
    next_id: u64,
    messages: Vec<Message>,
}

// =============================================================================
// STORE
// =============================================================================

pub struct MessageStore {
    log: RwLock<Log>,
    retention: usize,
}

impl MessageStore {
    /// Create an empty store whose snapshots return at most `retention`
    /// messages.
    #[must_use]
    pub fn new(retention: usize) -> Self {
        Self { log: RwLock::new(Log { next_id: 1, messages: Vec::new() }), retention: retention.max(1) }
    }

    /// Append a message and return the stored copy.
    pub fn append(&self, author: Author, text: impl Into<String>) -> Message {
        let mut log = self.log.write().unwrap_or_else(PoisonError::into_inner);
        let message = Message {
            id: MessageId(log.next_id),
            author,
            text: text.into(),
            created_at: OffsetDateTime::now_utc(),
        };
        log.next_id += 1;
        log.messages.push(message.clone());
        message
    }

    /// Copy of the most recent messages, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        let log = self.log.read().unwrap_or_else(PoisonError::into_inner);
        let start = log.messages.len().saturating_sub(self.retention);
        log.messages[start..].to_vec()
    }

    /// Total messages ever appended.
    #[must_use]
    pub fn len(&self) -> usize {
        self.log.read().unwrap_or_else(PoisonError::into_inner).messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn retention(&self) -> usize {
        self.retention
    }
}

#[cfg(test)]
pub(crate) fn test_message_id(raw: u64) -> MessageId {
    MessageId(raw)
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
