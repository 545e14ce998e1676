//! Draft persistence for content the user has not submitted yet.

use std::collections::HashMap;

use crate::doc::RichText;
use crate::import_export;

/// Key/value store surviving navigation (browser local storage in production).
pub trait DraftStore {
    fn load(&self, key: &str) -> Option<String>;
    fn save(&mut self, key: &str, value: &str);
    fn clear(&mut self, key: &str);
}

#[derive(Debug, Default, Clone)]
pub struct MemoryDraftStore {
    entries: HashMap<String, String>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DraftStore for MemoryDraftStore {
    fn load(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn save(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn clear(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

/// Restores a stored draft; unreadable drafts are discarded.
pub fn load_draft<D: DraftStore + ?Sized>(store: &D, key: &str) -> Option<RichText> {
    let raw = store.load(key)?;
    match import_export::from_json(&raw) {
        Ok(content) => Some(content),
        Err(e) => {
            log::warn!("discarding unreadable draft {}: {}", key, e);
            None
        }
    }
}

/// Mirrors `content` into the store; blank content removes the draft.
pub fn store_draft<D: DraftStore + ?Sized>(store: &mut D, key: &str, content: &RichText) -> serde_json::Result<()> {
    if content.is_blank() && content.images().next().is_none() {
        store.clear(key);
        return Ok(());
    }
    let raw = import_export::to_json(content)?;
    store.save(key, &raw);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_and_load_round_trip() {
        let mut store = MemoryDraftStore::new();
        store_draft(&mut store, "k", &RichText::paragraph("draft")).unwrap();
        assert_eq!(load_draft(&store, "k"), Some(RichText::paragraph("draft")));
    }

    #[test]
    fn blank_content_clears_draft() {
        let mut store = MemoryDraftStore::new();
        store.save("k", "{}");
        store_draft(&mut store, "k", &RichText::paragraph("   ")).unwrap();
        assert_eq!(store.load("k"), None);
    }

    #[test]
    fn garbage_draft_is_ignored() {
        let mut store = MemoryDraftStore::new();
        store.save("k", "not json");
        assert_eq!(load_draft(&store, "k"), None);
    }
}
