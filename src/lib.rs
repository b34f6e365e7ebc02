//! Streaming chat server.
//!
//! SYSTEM CONTEXT
//! ==============
//! Messages are posted through a plain HTML form and delivered to every open
//! reader over a long-lived response: an HTML document that is never closed
//! until shutdown, or a Server-Sent Events stream. All state is in memory.

pub mod config;
pub mod render;
pub mod routes;
pub mod services;
pub mod state;
pub mod stream;
