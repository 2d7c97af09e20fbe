use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tagbid_core::Targeting;

/// Creative markup keyed by ad slot id and size (`"300x250"`).
///
/// Filled from every bid response, read when the ad server asks the module to
/// render an ad it won. A later response for the same key replaces the markup.
#[derive(Debug, Default)]
pub struct CreativeStore {
    inner: Mutex<HashMap<String, HashMap<String, String>>>,
}

impl CreativeStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `markup` for `ad_slot_id` at `size`.
    pub fn insert(&self, ad_slot_id: &str, size: &str, markup: String) {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard
            .entry(ad_slot_id.to_string())
            .or_default()
            .insert(size.to_string(), markup);
    }

    /// Markup stored for `ad_slot_id` at `size`.
    #[must_use]
    pub fn get(&self, ad_slot_id: &str, size: &str) -> Option<String> {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.get(ad_slot_id)?.get(size).cloned()
    }

    /// Number of stored creatives across all ad slots.
    #[must_use]
    pub fn len(&self) -> usize {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.values().map(HashMap::len).sum()
    }

    /// True if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up the creative for a won slot.
    ///
    /// `targeting` is the slot's targeting as set by the ad server; the ad
    /// slot id is read from `id_key`. Returns `None` when either the id or the
    /// `{width}x{height}` creative is unknown.
    #[must_use]
    pub fn render(&self, targeting: &Targeting, id_key: &str, width: u32, height: u32) -> Option<String> {
        if width == 0 || height == 0 {
            return None;
        }
        let id = targeting.get(id_key)?;
        self.get(id, &format!("{width}x{height}"))
    }
}
