//! Identity resolver: display color and tag per author key.
//!
//! DESIGN
//! ======
//! Two memo maps, each behind its own mutex. The locks are never held at the
//! same time. Colors are handed out round-robin from a fixed palette in
//! first-seen order, so replaying the same sequence of new keys reproduces
//! the same colors. Tags are a random four-digit number fixed on first use.
//!
//! TRADE-OFFS
//! ==========
//! Neither map is ever evicted. Memory grows with the number of distinct
//! keys seen over the life of the process.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use rand::Rng;

/// Default palette. The ninth distinct key reuses the first color.
pub const DEFAULT_PALETTE: &[&str] =
    &["#FF6B6B", "#4ECDC4", "#45B7D1", "#F7B731", "#5F27CD", "#00D2D3", "#FF9FF3", "#54A0FF"];

const TAG_MODULUS: u32 = 10_000;

/// Build the author key for a display name within a browser session.
#[must_use]
pub fn author_key(name: &str, session: &str) -> String {
    format!("{name}:{session}")
}

/// Resolved presentation attributes for one message author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub key: String,
    pub name: String,
    pub color: &'static str,
    pub tag: String,
}

pub struct IdentityResolver {
    palette: &'static [&'static str],
    colors: Mutex<HashMap<String, &'static str>>,
    tags: Mutex<HashMap<String, String>>,
}

impl IdentityResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::with_palette(DEFAULT_PALETTE)
    }

    /// Use a custom palette. An empty palette falls back to the default.
    #[must_use]
    pub fn with_palette(palette: &'static [&'static str]) -> Self {
        let palette = if palette.is_empty() { DEFAULT_PALETTE } else { palette };
        Self { palette, colors: Mutex::new(HashMap::new()), tags: Mutex::new(HashMap::new()) }
    }

    /// Color for `key`, assigned on first call.
    pub fn color_for(&self, key: &str) -> &'static str {
        let mut colors = self.colors.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(&color) = colors.get(key) {
            return color;
        }
        let color = self.palette[colors.len() % self.palette.len()];
        colors.insert(key.to_owned(), color);
        color
    }

    /// Four-digit tag for `key`, assigned on first call.
    pub fn tag_for(&self, key: &str) -> String {
        let mut tags = self.tags.lock().unwrap_or_else(PoisonError::into_inner);
        tags.entry(key.to_owned())
            .or_insert_with(|| format!("{:04}", rand::rng().random_range(0..TAG_MODULUS)))
            .clone()
    }

    /// Resolve both attributes for an author. Each lock is taken and released
    /// in turn.
    pub fn resolve(&self, key: &str, name: &str) -> Author {
        let tag = self.tag_for(key);
        let color = self.color_for(key);
        Author { key: key.to_owned(), name: name.to_owned(), color, tag }
    }

    /// Number of keys with an assigned color.
    #[must_use]
    pub fn known_authors(&self) -> usize {
        self.colors.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
