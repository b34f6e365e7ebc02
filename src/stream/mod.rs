//! Long-lived streaming responses.
//!
//! ARCHITECTURE
//! ============
//! `transport` owns the byte-level contract with the HTTP response (document
//! framing, flush, disconnect signal). `pump` owns the per-connection event
//! loop that feeds it from the subscriber registry.

pub mod pump;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_sink;
