//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Binds the chat page, form endpoint, streaming endpoints and JSON views
//! under a single Axum router. `/static` is served from disk only when a
//! directory is configured.

pub mod chat;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full application router.
pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(chat::chat_page))
        .route("/send", get(chat::send_redirect).post(chat::send_message))
        .route("/messages", get(chat::messages_stream))
        .route("/messages/static", get(chat::messages_static))
        .route("/events", get(chat::events_stream))
        .route("/api/messages", get(chat::messages_json))
        .route("/api/stats", get(chat::stats))
        .route("/healthz", get(healthz));

    if let Some(dir) = state.config.static_dir.as_ref() {
        router = router.nest_service("/static", ServeDir::new(dir));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
