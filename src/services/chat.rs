//! Chat service: submit, snapshot and subscribe.
//!
//! DESIGN
//! ======
//! Composes the message store, identity resolver and subscriber registry.
//! Each owns its own lock and `submit` touches them strictly one after the
//! other: identity, then append, then render, then broadcast. No lock is held
//! while another is taken, and none is held across I/O.
//!
//! ERROR HANDLING
//! ==============
//! Validation happens here, before the store. A broadcast that reaches
//! nobody (or drops for full queues) is still a successful submit.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::config::ChatConfig;
use crate::render::render_fragment;
use crate::services::identity::{IdentityResolver, author_key};
use crate::services::registry::{Fragment, SubscriberRegistry, Subscription};
use crate::services::store::{Message, MessageStore};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("author name is required")]
    EmptyAuthor,
    #[error("message text is required")]
    EmptyText,
}

pub struct ChatService {
    store: MessageStore,
    identities: IdentityResolver,
    registry: Arc<SubscriberRegistry>,
}

impl ChatService {
    #[must_use]
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            store: MessageStore::new(config.snapshot_limit),
            identities: IdentityResolver::new(),
            registry: Arc::new(SubscriberRegistry::new(config.subscriber_capacity)),
        }
    }

    /// Validate, store and broadcast one message from `name` in `session`.
    ///
    /// # Errors
    ///
    /// Returns a [`SubmitError`] if the name or text is blank. Nothing is
    /// stored in that case.
    pub fn submit(&self, name: &str, session: &str, text: &str) -> Result<Message, SubmitError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SubmitError::EmptyAuthor);
        }
        if text.trim().is_empty() {
            return Err(SubmitError::EmptyText);
        }

        let author = self.identities.resolve(&author_key(name, session), name);
        let message = self.store.append(author, text);

        let fragment = Fragment::new(message.id, render_fragment(&message));
        let delivered = self.registry.broadcast(&fragment);
        info!(
            message_id = %message.id,
            author = %message.author.name,
            delivered,
            subscribers = self.registry.len(),
            "chat: message posted"
        );
        Ok(message)
    }

    /// Recent messages, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.store.snapshot()
    }

    /// Register a live subscriber.
    pub fn subscribe(&self) -> (Subscription, mpsc::Receiver<Fragment>) {
        self.registry.register()
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    #[must_use]
    pub fn message_count(&self) -> usize {
        self.store.len()
    }

    #[must_use]
    pub fn author_count(&self) -> usize {
        self.identities.known_authors()
    }
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
