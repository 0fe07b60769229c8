//! Collision category allocation
//!
//! Nails that are alive at the same time must not share a collision category,
//! otherwise the physics engine filters their contacts the same way. The pool
//! hands out tokens from a fixed universe of 15 bitmasks.
//!
//! The pool knows nothing about which nail holds which token. Erasing a nail
//! does not give its token back; clients release it explicitly, and a level
//! reset restores the whole universe while the session clears the registry
//! in the same step.

use shared::{Category, CATEGORY_UNIVERSE};
use std::collections::BTreeSet;

/// Available collision categories, handed out lowest bit first
#[derive(Debug, Clone)]
pub struct CategoryPool {
    available: BTreeSet<Category>,
}

impl CategoryPool {
    /// Creates a pool holding the full 15-token universe
    pub fn new() -> Self {
        Self::with_universe(&CATEGORY_UNIVERSE)
    }

    pub fn with_universe(universe: &[Category]) -> Self {
        Self {
            available: universe.iter().copied().collect(),
        }
    }

    /// Returns the token `acquire` would hand out next without removing it
    ///
    /// Only meant as a preview for clients; another client may take the
    /// token before the caller registers a nail.
    pub fn peek(&self) -> Option<Category> {
        self.available.first().copied()
    }

    /// Removes and returns an available token, or None when exhausted
    pub fn acquire(&mut self) -> Option<Category> {
        self.available.pop_first()
    }

    /// Makes a token available again
    ///
    /// Idempotent. Tokens outside the universe are accepted as-is and will be
    /// handed out like any other.
    pub fn release(&mut self, category: Category) {
        self.available.insert(category);
    }

    /// Replaces the available set with `universe`
    pub fn reset(&mut self, universe: &[Category]) {
        self.available = universe.iter().copied().collect();
    }

    pub fn is_available(&self, category: Category) -> bool {
        self.available.contains(&category)
    }

    pub fn available_count(&self) -> usize {
        self.available.len()
    }
}

impl Default for CategoryPool {
    fn default() -> Self {
        Self::new()
    }
}
