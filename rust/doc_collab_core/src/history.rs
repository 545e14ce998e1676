//! Bounded undo/redo history for one editor instance.

use crate::doc::RichText;

const DEFAULT_DEPTH: usize = 100;

#[derive(Debug, Clone)]
pub struct History {
    pub undo_stack: Vec<RichText>,
    pub redo_stack: Vec<RichText>,
    depth: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_depth(DEFAULT_DEPTH)
    }
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_depth(depth: usize) -> Self {
        Self { undo_stack: Vec::new(), redo_stack: Vec::new(), depth: depth.max(1) }
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Record the current state before making a change.
    pub fn record_before_change(&mut self, current: &RichText) {
        if self.undo_stack.len() == self.depth {
            self.undo_stack.remove(0);
        }
        self.undo_stack.push(current.clone());
        self.redo_stack.clear();
    }

    /// Undo into the provided content. Returns true if a change occurred.
    pub fn undo(&mut self, content: &mut RichText) -> bool {
        if let Some(prev) = self.undo_stack.pop() {
            self.redo_stack.push(std::mem::replace(content, prev));
            true
        } else {
            false
        }
    }

    /// Redo into the provided content. Returns true if a change occurred.
    pub fn redo(&mut self, content: &mut RichText) -> bool {
        if let Some(next) = self.redo_stack.pop() {
            self.undo_stack.push(std::mem::replace(content, next));
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_redo_restores_snapshots() {
        let mut h = History::new();
        let mut current = RichText::paragraph("one");
        h.record_before_change(&current);
        current = RichText::paragraph("two");

        assert!(h.undo(&mut current));
        assert_eq!(current, RichText::paragraph("one"));
        assert!(!h.undo(&mut current));
        assert!(h.redo(&mut current));
        assert_eq!(current, RichText::paragraph("two"));
    }

    #[test]
    fn depth_drops_oldest_snapshot() {
        let mut h = History::with_depth(2);
        for t in ["a", "b", "c"] {
            h.record_before_change(&RichText::paragraph(t));
        }
        assert_eq!(h.undo_stack, vec![RichText::paragraph("b"), RichText::paragraph("c")]);
    }
}
