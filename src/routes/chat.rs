//! Chat routes: page, form post, live streams and snapshots.
//!
//! DESIGN
//! ======
//! Handlers translate HTTP into chat service calls and back. Streaming
//! handlers build a `ChannelSink`, hand the `HtmlStream` to a spawned pump and
//! return the body immediately; the pump writes into it until cancelled.
//! When streaming is disabled or the transport cannot flush, `/messages`
//! falls back to a complete static document.

use std::sync::Arc;

use axum::Form;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use axum::response::{Html, IntoResponse, Json, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::render::{MESSAGE_STYLES, render_chat_page, render_static_messages};
use crate::services::store::{Message, MessageId};
use crate::state::AppState;
use crate::stream::pump::{self, PumpSettings};
use crate::stream::transport::{ChannelSink, HtmlStream, StreamEncoding, StreamError};

const SESSION_COOKIE: &str = "chat_session";
const USERNAME_COOKIE: &str = "chat_username";
const COOKIE_MAX_AGE_DAYS: i64 = 30;
const MESSAGES_TITLE: &str = "Messages";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SendMessageForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub text: String,
}

/// JSON shape of one message.
#[derive(Debug, Serialize)]
pub struct MessageView {
    pub id: MessageId,
    pub name: String,
    pub tag: String,
    pub color: &'static str,
    pub text: String,
    /// Milliseconds since Unix epoch.
    pub ts: i64,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            name: message.author.name.clone(),
            tag: message.author.tag.clone(),
            color: message.author.color,
            text: message.text.clone(),
            ts: message.created_at_ms(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatStats {
    pub messages: usize,
    pub subscribers: usize,
    pub authors: usize,
}

// =============================================================================
// PAGE + FORM
// =============================================================================

/// `GET /`: chat page with the message frame and post form.
pub async fn chat_page(State(state): State<AppState>, jar: CookieJar) -> Html<String> {
    let username = jar.get(USERNAME_COOKIE).map(Cookie::value);
    Html(render_chat_page(&state.config.title, username, "/messages"))
}

/// `GET /send`: nothing to do, go back to the page.
pub async fn send_redirect() -> Redirect {
    Redirect::to("/")
}

/// `POST /send`: validate, post and redirect back to the page.
pub async fn send_message(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<SendMessageForm>,
) -> (CookieJar, Redirect) {
    if form.username.trim().is_empty() || form.text.trim().is_empty() {
        debug!("chat: empty submission ignored");
        return (jar, Redirect::to("/"));
    }

    let secure = state.config.cookie_secure;
    let (jar, session) = match jar.get(SESSION_COOKIE).map(|c| c.value().to_owned()) {
        Some(session) if !session.is_empty() => (jar, session),
        _ => {
            let session = Uuid::new_v4().simple().to_string();
            let jar = jar.add(persistent_cookie(SESSION_COOKIE, session.clone(), secure));
            (jar, session)
        }
    };
    let jar = jar.add(persistent_cookie(USERNAME_COOKIE, form.username.trim().to_owned(), secure));

    if let Err(e) = state.chat.submit(&form.username, &session, &form.text) {
        warn!(error = %e, "chat: submission rejected");
    }
    (jar, Redirect::to("/"))
}

fn persistent_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::days(COOKIE_MAX_AGE_DAYS))
        .build()
}

// =============================================================================
// STREAMS
// =============================================================================

/// `GET /messages`: live HTML document, or the static one as fallback.
pub async fn messages_stream(State(state): State<AppState>) -> Response {
    match start_stream(&state, StreamEncoding::Html, MESSAGE_STYLES) {
        Ok(response) => response,
        Err(e) if e.requires_fallback() => {
            debug!(reason = %e, "chat: serving static messages");
            static_messages_response(&state)
        }
        Err(e) => stream_error_to_status(&e).into_response(),
    }
}

/// `GET /events`: Server-Sent Events carrying rendered fragments.
pub async fn events_stream(State(state): State<AppState>) -> Response {
    match start_stream(&state, StreamEncoding::EventStream, "") {
        Ok(response) => response,
        Err(e) => (stream_error_to_status(&e), e.to_string()).into_response(),
    }
}

/// `GET /messages/static`: complete, non-streaming document.
pub async fn messages_static(State(state): State<AppState>) -> Response {
    static_messages_response(&state)
}

fn static_messages_response(state: &AppState) -> Response {
    let messages = state.chat.snapshot();
    Html(render_static_messages(MESSAGES_TITLE, &messages)).into_response()
}

fn start_stream(state: &AppState, encoding: StreamEncoding, head: &str) -> Result<Response, StreamError> {
    let (sink, body) = ChannelSink::new(state.config.body_capacity);
    let stream = HtmlStream::open(sink, encoding, state.config.streaming_enabled)?;
    let settings = PumpSettings { title: MESSAGES_TITLE.to_owned(), head: head.to_owned(), keepalive: state.config.keepalive };

    // Detached: the pump ends on shutdown or when the body is dropped.
    let _pump = pump::spawn(stream, Arc::clone(&state.chat), state.shutdown.child_token(), settings);

    Ok((
        [
            (CONTENT_TYPE, encoding.content_type()),
            (CACHE_CONTROL, "no-cache"),
            (X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        body,
    )
        .into_response())
}

pub(crate) fn stream_error_to_status(err: &StreamError) -> StatusCode {
    match err {
        StreamError::Disabled | StreamError::Unsupported => StatusCode::SERVICE_UNAVAILABLE,
        StreamError::InvalidState { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        StreamError::Disconnected => StatusCode::BAD_GATEWAY,
    }
}

// =============================================================================
// JSON
// =============================================================================

/// `GET /api/messages`: current snapshot as JSON.
pub async fn messages_json(State(state): State<AppState>) -> Json<Vec<MessageView>> {
    Json(state.chat.snapshot().iter().map(MessageView::from).collect())
}

/// `GET /api/stats`: live counters.
pub async fn stats(State(state): State<AppState>) -> Json<ChatStats> {
    Json(ChatStats {
        messages: state.chat.message_count(),
        subscribers: state.chat.subscriber_count(),
        authors: state.chat.author_count(),
    })
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
