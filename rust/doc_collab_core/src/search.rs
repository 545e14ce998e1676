//! Search box state for filtering a comment thread.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentSearch {
    query: String,
}

impl CommentSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn clear(&mut self) {
        self.query.clear();
    }

    /// The filter to hand to the thread; `None` while the box is blank.
    /// Anything else is passed on as typed.
    pub fn active(&self) -> Option<&str> {
        if self.query.trim().is_empty() {
            None
        } else {
            Some(&self.query)
        }
    }
}
