//! Tunables for the editing widgets.

use serde::{Deserialize, Serialize};

pub const DEFAULT_AUTOSAVE_DELAY_MS: u64 = 3_000;
pub const DEFAULT_DRAFT_KEY: &str = "doc_collab.comment_draft";
pub const DEFAULT_TOPIC_WILDCARD: &str = "*";
pub const DEFAULT_UPLOAD_ERROR_LINK: &str = "ERROR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Idle window after the last edit before a field autosaves.
    pub autosave_delay_ms: u64,
    /// Draft-store key holding the in-progress new comment.
    pub draft_key: String,
    /// Topic filter value that matches every comment.
    pub topic_wildcard: String,
    /// Link handed back to the editor when an upload has no matching attachment.
    pub upload_error_link: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            autosave_delay_ms: DEFAULT_AUTOSAVE_DELAY_MS,
            draft_key: DEFAULT_DRAFT_KEY.to_string(),
            topic_wildcard: DEFAULT_TOPIC_WILDCARD.to_string(),
            upload_error_link: DEFAULT_UPLOAD_ERROR_LINK.to_string(),
        }
    }
}

impl UiConfig {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn is_wildcard(&self, topic: &str) -> bool {
        topic == self.topic_wildcard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = UiConfig::from_json(r#"{"autosave_delay_ms": 500}"#).unwrap();
        assert_eq!(cfg.autosave_delay_ms, 500);
        assert_eq!(cfg.draft_key, DEFAULT_DRAFT_KEY);
        assert!(cfg.is_wildcard("*"));
        assert_eq!(UiConfig::from_json("{}").unwrap(), UiConfig::default());
    }
}
