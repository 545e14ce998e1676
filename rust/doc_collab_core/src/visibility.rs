//! Who may see and change which comments.

use serde::{Deserialize, Serialize};

use crate::model::Comment;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Viewer {
    pub name: String,
    pub email: String,
    /// Reviewer/edit privilege: sees and may change every comment.
    #[serde(default)]
    pub reviewer: bool,
}

impl Viewer {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self { name: name.into(), email: email.into(), reviewer: false }
    }

    pub fn reviewer(mut self, reviewer: bool) -> Self {
        self.reviewer = reviewer;
        self
    }

    pub fn is_author_of(&self, comment: &Comment) -> bool {
        !self.email.is_empty() && self.email.eq_ignore_ascii_case(&comment.author.email)
    }

    /// Name recorded in a comment's edit history.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

pub fn can_modify(viewer: &Viewer, comment: &Comment) -> bool {
    viewer.reviewer || viewer.is_author_of(comment)
}

/// Public or modifiable by the viewer, and, with a non-blank search, matching
/// the body text or author name case-insensitively. The search is matched as
/// given, surrounding spaces included.
pub fn show_comment(comment: &Comment, viewer: &Viewer, search: Option<&str>) -> bool {
    if comment.private && !can_modify(viewer, comment) {
        return false;
    }
    match search.filter(|s| !s.trim().is_empty()) {
        None => true,
        Some(needle) => {
            let needle = needle.to_lowercase();
            comment.author.name.to_lowercase().contains(&needle)
                || comment.body().plain_text().to_lowercase().contains(&needle)
        }
    }
}

/// No filter, the wildcard, or an exact topic match.
pub fn topic_matches(comment_topic: &str, filter: Option<&str>, wildcard: &str) -> bool {
    match filter {
        None => true,
        Some(f) if f == wildcard => true,
        Some(f) => f == comment_topic,
    }
}
