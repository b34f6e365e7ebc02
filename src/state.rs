//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. The
//! chat service (store, identities, registry) is built once at startup and
//! shared by `Arc`; there are no process globals. The shutdown token is the
//! parent of every live stream's cancellation token.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::ChatConfig;
use crate::services::chat::ChatService;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub config: Arc<ChatConfig>,
    /// Cancelled on server shutdown.
    pub shutdown: CancellationToken,
}

impl AppState {
    #[must_use]
    pub fn new(config: ChatConfig) -> Self {
        Self { chat: Arc::new(ChatService::new(&config)), config: Arc::new(config), shutdown: CancellationToken::new() }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
