//! Draft store over `window.localStorage`.

use doc_collab_core::DraftStore;

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorageDrafts;

impl LocalStorageDrafts {
    fn storage() -> Option<web_sys::Storage> {
        web_sys::window().and_then(|w| w.local_storage().ok().flatten())
    }
}

impl DraftStore for LocalStorageDrafts {
    fn load(&self, key: &str) -> Option<String> {
        Self::storage()?.get_item(key).ok().flatten()
    }

    fn save(&mut self, key: &str, value: &str) {
        let Some(storage) = Self::storage() else {
            log::warn!("localStorage unavailable, draft {} not saved", key);
            return;
        };
        if storage.set_item(key, value).is_err() {
            log::warn!("failed to write draft {}", key);
        }
    }

    fn clear(&mut self, key: &str) {
        let Some(storage) = Self::storage() else {
            log::warn!("localStorage unavailable, draft {} not cleared", key);
            return;
        };
        if storage.remove_item(key).is_err() {
            log::warn!("failed to clear draft {}", key);
        }
    }
}
