//! In-process document service: applies each call to the document it is given
//! and answers the way the remote service would.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{Error, Result};
use crate::model::{Attachment, Author, Comment, CommentPatch, Document, Upload};
use crate::service::DocService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceCall {
    AddComment,
    UpdateComment,
    DeleteComment,
    SaveField,
    UploadAttachment,
}

#[derive(Debug)]
pub struct MemoryDocService {
    author: Author,
    next_id: Cell<u64>,
    reject_next: Cell<bool>,
    calls: RefCell<Vec<ServiceCall>>,
    attachments: RefCell<HashMap<String, Vec<Attachment>>>,
    url_base: String,
}

impl MemoryDocService {
    /// `author` is the session identity stamped on comments this service creates.
    pub fn new(author: Author) -> Self {
        Self {
            author,
            next_id: Cell::new(1),
            reject_next: Cell::new(false),
            calls: RefCell::new(Vec::new()),
            attachments: RefCell::new(HashMap::new()),
            url_base: "memory://files".to_string(),
        }
    }

    /// The next call answers with an empty response.
    pub fn reject_next(&self) {
        self.reject_next.set(true);
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self, call: ServiceCall) -> usize {
        self.calls.borrow().iter().filter(|c| **c == call).count()
    }

    fn enter(&self, call: ServiceCall, op: &'static str) -> Result<()> {
        self.calls.borrow_mut().push(call);
        if self.reject_next.replace(false) {
            log::warn!("memory service rejecting {}", op);
            return Err(Error::Rejected(op));
        }
        Ok(())
    }

    fn comment_position(doc: &Document, id: &str) -> Result<usize> {
        doc.comments
            .iter()
            .position(|c| c.id.as_deref() == Some(id))
            .ok_or_else(|| Error::Service(format!("comment {} not found", id)))
    }
}

#[async_trait(?Send)]
impl DocService for MemoryDocService {
    async fn add_comment(&self, doc: &Document, html: &str, topic: &str, private: bool) -> Result<Document> {
        self.enter(ServiceCall::AddComment, "add_comment")?;
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let mut updated = doc.clone();
        updated.comments.push(Comment {
            id: Some(format!("c{}", id)),
            author: self.author.clone(),
            timestamp: Utc::now(),
            text: html.to_string(),
            private,
            topic: topic.to_string(),
            edits: Vec::new(),
        });
        Ok(updated)
    }

    async fn update_comment(&self, doc: &Document, id: &str, patch: &CommentPatch) -> Result<Document> {
        self.enter(ServiceCall::UpdateComment, "update_comment")?;
        let mut updated = doc.clone();
        let pos = Self::comment_position(&updated, id)?;
        patch.apply(&mut updated.comments[pos]);
        Ok(updated)
    }

    async fn delete_comment(&self, doc: &Document, id: &str) -> Result<Document> {
        self.enter(ServiceCall::DeleteComment, "delete_comment")?;
        let mut updated = doc.clone();
        let pos = Self::comment_position(&updated, id)?;
        updated.comments.remove(pos);
        Ok(updated)
    }

    async fn save_field(&self, doc: &Document, _field: &str) -> Result<Document> {
        self.enter(ServiceCall::SaveField, "save_field")?;
        Ok(doc.clone())
    }

    async fn upload_attachment(&self, doc_id: &str, upload: &Upload) -> Result<Vec<Attachment>> {
        self.enter(ServiceCall::UploadAttachment, "upload_attachment")?;
        let mut store = self.attachments.borrow_mut();
        let list = store.entry(doc_id.to_string()).or_default();
        let url = format!("{}/{}/{}", self.url_base, doc_id, upload.name);
        match list.iter_mut().find(|a| a.name == upload.name) {
            Some(existing) => existing.url = url,
            None => list.push(Attachment { name: upload.name.clone(), url }),
        }
        Ok(list.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn service() -> MemoryDocService {
        MemoryDocService::new(Author { name: "Ann".into(), email: "ann@example.com".into() })
    }

    #[test]
    fn add_then_delete_round_trip() {
        let svc = service();
        let doc = Document::new("d1");
        let doc = block_on(svc.add_comment(&doc, "<p>x</p>", "t1", true)).unwrap();
        assert_eq!(doc.comments[0].id.as_deref(), Some("c1"));
        assert_eq!(doc.comments[0].topic, "t1");
        assert!(doc.comments[0].private);
        let doc = block_on(svc.delete_comment(&doc, "c1")).unwrap();
        assert!(doc.comments.is_empty());
        assert_eq!(svc.calls(), vec![ServiceCall::AddComment, ServiceCall::DeleteComment]);
    }

    #[test]
    fn rejection_applies_to_one_call() {
        let svc = service();
        svc.reject_next();
        let doc = Document::new("d1");
        assert!(matches!(block_on(svc.save_field(&doc, "f")), Err(Error::Rejected("save_field"))));
        assert!(block_on(svc.save_field(&doc, "f")).is_ok());
        assert_eq!(svc.call_count(ServiceCall::SaveField), 2);
    }

    #[test]
    fn uploads_accumulate_per_document() {
        let svc = service();
        let up = |n: &str| Upload::new(n, "image/png", vec![1, 2, 3]);
        block_on(svc.upload_attachment("d1", &up("a.png"))).unwrap();
        let list = block_on(svc.upload_attachment("d1", &up("b.png"))).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].url, "memory://files/d1/b.png");
        assert_eq!(block_on(svc.upload_attachment("d2", &up("a.png"))).unwrap().len(), 1);
    }
}
