//! Rich-text editor wrapper: owns the live content of one editing surface and
//! forwards validation, blur and image uploads to its host.

use async_trait::async_trait;

use crate::doc::RichText;
use crate::error::{Result, ValidationError};
use crate::history::History;
use crate::model::{Upload, UploadLink};

/// Capabilities the owner of an editor provides.
#[async_trait(?Send)]
pub trait EditorHost {
    /// `Some` raises a validation error for `field`, `None` clears it.
    fn report_error(&mut self, _field: &str, _error: Option<&ValidationError>) {}

    async fn on_blur(&mut self, content: &RichText) -> Result<()>;

    async fn upload_image(&mut self, upload: &Upload) -> Result<UploadLink>;
}

#[derive(Debug, Clone)]
pub struct RichTextEditor {
    field: String,
    required: bool,
    content: RichText,
    plain_text: String,
    history: History,
    error: Option<ValidationError>,
}

impl RichTextEditor {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            required: false,
            content: RichText::empty(),
            plain_text: String::new(),
            history: History::default(),
            error: None,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn data(&self) -> &RichText {
        &self.content
    }

    pub fn plain_text(&self) -> &str {
        &self.plain_text
    }

    pub fn error(&self) -> Option<&ValidationError> {
        self.error.as_ref()
    }

    /// Replace the content as a user edit (undoable).
    pub fn set_data<H: EditorHost + ?Sized>(&mut self, content: RichText, host: &mut H) {
        self.history.record_before_change(&self.content);
        self.content = content;
        self.revalidate(host);
    }

    /// Replace the content without recording history.
    pub fn load<H: EditorHost + ?Sized>(&mut self, content: RichText, host: &mut H) {
        self.history.clear();
        self.content = content;
        self.revalidate(host);
    }

    pub fn undo<H: EditorHost + ?Sized>(&mut self, host: &mut H) -> bool {
        let changed = self.history.undo(&mut self.content);
        if changed {
            self.revalidate(host);
        }
        changed
    }

    pub fn redo<H: EditorHost + ?Sized>(&mut self, host: &mut H) -> bool {
        let changed = self.history.redo(&mut self.content);
        if changed {
            self.revalidate(host);
        }
        changed
    }

    pub async fn blur<H: EditorHost + ?Sized>(&self, host: &mut H) -> Result<()> {
        host.on_blur(&self.content).await
    }

    /// Uploads through the host, appends the image, then forces a blur so the
    /// content that now references the upload gets persisted.
    pub async fn upload_image<H: EditorHost + ?Sized>(&mut self, upload: &Upload, host: &mut H) -> Result<UploadLink> {
        let link = host.upload_image(upload).await?;
        self.insert_image(&link, &upload.name, host);
        self.blur(host).await?;
        Ok(link)
    }

    /// Appends an already uploaded image as a user edit.
    pub fn insert_image<H: EditorHost + ?Sized>(&mut self, link: &UploadLink, alt: &str, host: &mut H) {
        let mut next = self.content.clone();
        next.push_image(link.link(), alt);
        self.set_data(next, host);
    }

    fn revalidate<H: EditorHost + ?Sized>(&mut self, host: &mut H) {
        self.plain_text = self.content.plain_text();
        if self.required && self.plain_text.trim().is_empty() {
            let err = ValidationError::Required { field: self.field.clone() };
            host.report_error(&self.field, Some(&err));
            self.error = Some(err);
        } else if self.error.take().is_some() {
            host.report_error(&self.field, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[derive(Default)]
    struct RecordingHost {
        errors: Vec<(String, Option<ValidationError>)>,
        blurs: Vec<RichText>,
        uploads: Vec<String>,
    }

    #[async_trait(?Send)]
    impl EditorHost for RecordingHost {
        fn report_error(&mut self, field: &str, error: Option<&ValidationError>) {
            self.errors.push((field.to_string(), error.cloned()));
        }

        async fn on_blur(&mut self, content: &RichText) -> Result<()> {
            self.blurs.push(content.clone());
            Ok(())
        }

        async fn upload_image(&mut self, upload: &Upload) -> Result<UploadLink> {
            self.uploads.push(upload.name.clone());
            Ok(UploadLink::new(format!("https://files/{}", upload.name)))
        }
    }

    #[test]
    fn required_field_reports_and_clears() {
        let mut host = RecordingHost::default();
        let mut ed = RichTextEditor::new("summary").required(true);

        ed.set_data(RichText::paragraph(" "), &mut host);
        ed.set_data(RichText::empty(), &mut host);
        assert_eq!(host.errors.len(), 2);
        assert_eq!(host.errors[0].1, Some(ValidationError::Required { field: "summary".into() }));
        assert!(ed.error().is_some());

        ed.set_data(RichText::paragraph("ok"), &mut host);
        assert_eq!(host.errors.last(), Some(&("summary".to_string(), None)));
        assert!(ed.error().is_none());
        assert_eq!(ed.plain_text(), "ok");

        // non-empty to non-empty does not report again
        ed.set_data(RichText::paragraph("still ok"), &mut host);
        assert_eq!(host.errors.len(), 3);
    }

    #[test]
    fn optional_field_never_reports() {
        let mut host = RecordingHost::default();
        let mut ed = RichTextEditor::new("notes");
        ed.set_data(RichText::empty(), &mut host);
        assert!(host.errors.is_empty());
    }

    #[test]
    fn undo_revalidates() {
        let mut host = RecordingHost::default();
        let mut ed = RichTextEditor::new("summary").required(true);
        ed.load(RichText::paragraph("text"), &mut host);
        ed.set_data(RichText::empty(), &mut host);
        assert!(ed.error().is_some());
        assert!(ed.undo(&mut host));
        assert!(ed.error().is_none());
        assert_eq!(ed.data(), &RichText::paragraph("text"));
        assert!(!ed.undo(&mut host));
    }

    #[test]
    fn upload_inserts_image_then_blurs() {
        let mut host = RecordingHost::default();
        let mut ed = RichTextEditor::new("body");
        ed.load(RichText::paragraph("see"), &mut host);

        let link = block_on(ed.upload_image(&Upload::new("a.png", "image/png", vec![0]), &mut host)).unwrap();
        assert_eq!(link.link(), "https://files/a.png");
        assert_eq!(host.uploads, vec!["a.png".to_string()]);
        assert_eq!(host.blurs.len(), 1);
        assert_eq!(host.blurs[0].images().collect::<Vec<_>>(), vec!["https://files/a.png"]);
    }
}
