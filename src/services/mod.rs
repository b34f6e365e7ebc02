//! Domain services used by the HTTP and streaming routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own chat state so route handlers can stay focused on
//! protocol translation and cookie plumbing. Each service guards its own
//! data; `chat` is the only one that composes the others.

pub mod chat;
pub mod identity;
pub mod registry;
pub mod store;
