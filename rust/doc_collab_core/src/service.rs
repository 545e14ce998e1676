//! Contract with the remote document service.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Attachment, CommentPatch, Document, Upload, UploadLink};

/// Every call returns the service's view of the document afterwards; the
/// caller replaces its cached copy wholesale.
#[async_trait(?Send)]
pub trait DocService {
    async fn add_comment(&self, doc: &Document, html: &str, topic: &str, private: bool) -> Result<Document>;

    async fn update_comment(&self, doc: &Document, id: &str, patch: &CommentPatch) -> Result<Document>;

    async fn delete_comment(&self, doc: &Document, id: &str) -> Result<Document>;

    /// Persist the value currently stored under `field` in `doc`.
    async fn save_field(&self, doc: &Document, field: &str) -> Result<Document>;

    /// Returns the document's attachment list after the upload.
    async fn upload_attachment(&self, doc_id: &str, upload: &Upload) -> Result<Vec<Attachment>>;
}

#[async_trait(?Send)]
impl<S: DocService + ?Sized> DocService for std::rc::Rc<S> {
    async fn add_comment(&self, doc: &Document, html: &str, topic: &str, private: bool) -> Result<Document> {
        (**self).add_comment(doc, html, topic, private).await
    }

    async fn update_comment(&self, doc: &Document, id: &str, patch: &CommentPatch) -> Result<Document> {
        (**self).update_comment(doc, id, patch).await
    }

    async fn delete_comment(&self, doc: &Document, id: &str) -> Result<Document> {
        (**self).delete_comment(doc, id).await
    }

    async fn save_field(&self, doc: &Document, field: &str) -> Result<Document> {
        (**self).save_field(doc, field).await
    }

    async fn upload_attachment(&self, doc_id: &str, upload: &Upload) -> Result<Vec<Attachment>> {
        (**self).upload_attachment(doc_id, upload).await
    }
}

/// Link for the attachment named like the upload, or `placeholder` when the
/// service did not return one.
pub fn resolve_upload_link(attachments: &[Attachment], name: &str, placeholder: &str) -> UploadLink {
    match attachments.iter().find(|a| a.name == name) {
        Some(a) => UploadLink::new(a.url.clone()),
        None => {
            log::warn!("upload of {} returned no matching attachment", name);
            UploadLink::new(placeholder)
        }
    }
}

/// Merge the attachment list returned for `upload` into `doc` and resolve
/// the upload's link.
pub fn merge_upload(doc: &mut Document, upload: &Upload, attachments: Vec<Attachment>, placeholder: &str) -> UploadLink {
    let link = resolve_upload_link(&attachments, &upload.name, placeholder);
    doc.merge_attachments(attachments);
    log::debug!("uploaded {} to document {}", upload.name, doc.id);
    link
}

/// Upload through the service and merge the returned attachments into `doc`.
pub async fn upload_into<S: DocService + ?Sized>(
    service: &S,
    doc: &mut Document,
    upload: &Upload,
    placeholder: &str,
) -> Result<UploadLink> {
    let attachments = service.upload_attachment(&doc.id, upload).await?;
    Ok(merge_upload(doc, upload, attachments, placeholder))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_matching_name_or_placeholder() {
        let list = vec![
            Attachment { name: "b.png".into(), url: "https://files/b.png".into() },
            Attachment { name: "a.png".into(), url: "https://files/a.png".into() },
        ];
        assert_eq!(resolve_upload_link(&list, "a.png", "ERROR").link(), "https://files/a.png");
        assert_eq!(resolve_upload_link(&list, "c.png", "ERROR").link(), "ERROR");
        assert_eq!(resolve_upload_link(&[], "a.png", "ERROR").link(), "ERROR");
    }

    #[test]
    fn merge_upload_upserts_and_links() {
        let mut doc = Document::new("d1");
        doc.attachments.push(Attachment { name: "a.png".into(), url: "old".into() });
        let upload = Upload::new("a.png", "image/png", vec![]);
        let link = merge_upload(
            &mut doc,
            &upload,
            vec![Attachment { name: "a.png".into(), url: "https://files/a.png".into() }],
            "ERROR",
        );
        assert_eq!(link.link(), "https://files/a.png");
        assert_eq!(doc.attachments, vec![Attachment { name: "a.png".into(), url: "https://files/a.png".into() }]);
    }
}
