//! Editor bound to one named field of a document, with autosave on blur and
//! after an idle window.

use async_trait::async_trait;
use serde::Serialize;

use crate::config::UiConfig;
use crate::debounce::Debouncer;
use crate::doc::RichText;
use crate::editor::{EditorHost, RichTextEditor};
use crate::error::{Error, Result, ValidationError};
use crate::import_export;
use crate::model::{Attachment, Document, Upload, UploadLink};
use crate::service::{merge_upload, upload_into, DocService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    Saved,
    /// Serialized content equals the last persisted value; nothing was sent.
    Unchanged,
    /// The idle window has not closed yet.
    NotDue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FieldView {
    Editing { content: RichText },
    ReadOnly { html: String },
}

/// A field save taken out of the editor, so the service call can run while
/// the editor keeps accepting edits.
#[derive(Debug, Clone)]
pub struct PendingSave {
    pub document: Document,
    pub field: String,
    serialized: String,
}

type SavedCallback = Box<dyn FnMut(&Document, &str)>;
type ErrorCallback = Box<dyn FnMut(&str, Option<&ValidationError>)>;

struct FieldContext<S> {
    service: S,
    document: Document,
    field: String,
    last_saved: String,
    in_flight: Option<String>,
    upload_error_link: String,
    last_outcome: Option<SaveOutcome>,
    last_error: Option<String>,
    on_saved: Option<SavedCallback>,
    on_error: Option<ErrorCallback>,
}

impl<S: DocService> FieldContext<S> {
    fn prepare(&mut self, content: &RichText) -> Result<Option<PendingSave>> {
        let serialized = import_export::to_json(content)?;
        if serialized == self.last_saved || self.in_flight.as_deref() == Some(serialized.as_str()) {
            return Ok(None);
        }
        let mut document = self.document.clone();
        document.set_field_raw(&self.field, serialized.clone());
        self.in_flight = Some(serialized.clone());
        Ok(Some(PendingSave { document, field: self.field.clone(), serialized }))
    }

    fn commit(&mut self, pending: PendingSave, result: Result<Document>) -> Result<SaveOutcome> {
        if self.in_flight.as_deref() == Some(pending.serialized.as_str()) {
            self.in_flight = None;
        }
        match result {
            Ok(updated) => {
                self.document = updated;
                self.last_saved = pending.serialized;
                self.last_error = None;
                log::debug!("saved field {} of document {}", self.field, self.document.id);
                if let Some(cb) = self.on_saved.as_mut() {
                    cb(&self.document, &self.field);
                }
                Ok(SaveOutcome::Saved)
            }
            Err(e) => {
                log::warn!("saving field {} failed: {}", self.field, e);
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn save(&mut self, content: &RichText) -> Result<SaveOutcome> {
        let Some(pending) = self.prepare(content)? else {
            return Ok(SaveOutcome::Unchanged);
        };
        let result = self.service.save_field(&pending.document, &pending.field).await;
        self.commit(pending, result)
    }

    fn upload_failed(&mut self, upload: &Upload, e: Error) -> Error {
        log::warn!("upload of {} failed: {}", upload.name, e);
        self.last_error = Some(e.to_string());
        e
    }
}

#[async_trait(?Send)]
impl<S: DocService> EditorHost for FieldContext<S> {
    fn report_error(&mut self, field: &str, error: Option<&ValidationError>) {
        if let Some(cb) = self.on_error.as_mut() {
            cb(field, error);
        }
    }

    async fn on_blur(&mut self, content: &RichText) -> Result<()> {
        self.last_outcome = Some(self.save(content).await?);
        Ok(())
    }

    async fn upload_image(&mut self, upload: &Upload) -> Result<UploadLink> {
        match upload_into(&self.service, &mut self.document, upload, &self.upload_error_link).await {
            Ok(link) => Ok(link),
            Err(e) => Err(self.upload_failed(upload, e)),
        }
    }
}

pub struct FieldEditorBuilder {
    field: String,
    required: bool,
    editing: bool,
    on_saved: Option<SavedCallback>,
    on_error: Option<ErrorCallback>,
}

impl FieldEditorBuilder {
    pub fn new(field: impl Into<String>) -> Self {
        Self { field: field.into(), required: false, editing: true, on_saved: None, on_error: None }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn editing(mut self, editing: bool) -> Self {
        self.editing = editing;
        self
    }

    /// Called with the server's document after every successful save.
    pub fn on_saved(mut self, cb: impl FnMut(&Document, &str) + 'static) -> Self {
        self.on_saved = Some(Box::new(cb));
        self
    }

    pub fn on_error(mut self, cb: impl FnMut(&str, Option<&ValidationError>) + 'static) -> Self {
        self.on_error = Some(Box::new(cb));
        self
    }

    /// Loads the field's stored content (empty when absent).
    pub fn build<S: DocService>(self, service: S, document: Document, config: &UiConfig) -> Result<FieldEditor<S>> {
        let initial = document.field_content(&self.field)?.unwrap_or_default();
        let last_saved = import_export::to_json(&initial)?;
        let mut ctx = FieldContext {
            service,
            document,
            field: self.field.clone(),
            last_saved,
            in_flight: None,
            upload_error_link: config.upload_error_link.clone(),
            last_outcome: None,
            last_error: None,
            on_saved: self.on_saved,
            on_error: self.on_error,
        };
        let mut editor = RichTextEditor::new(self.field).required(self.required);
        editor.load(initial, &mut ctx);
        Ok(FieldEditor {
            editor,
            ctx,
            debounce: Debouncer::new(config.autosave_delay_ms),
            initialized: false,
            editing: self.editing,
        })
    }
}

pub struct FieldEditor<S> {
    editor: RichTextEditor,
    ctx: FieldContext<S>,
    debounce: Debouncer,
    initialized: bool,
    editing: bool,
}

impl<S: DocService> FieldEditor<S> {
    pub fn field(&self) -> &str {
        &self.ctx.field
    }

    pub fn document(&self) -> &Document {
        &self.ctx.document
    }

    pub fn service(&self) -> &S {
        &self.ctx.service
    }

    pub fn content(&self) -> &RichText {
        self.editor.data()
    }

    pub fn validation_error(&self) -> Option<&ValidationError> {
        self.editor.error()
    }

    /// Message of the most recent failed save or upload, cleared by the next successful save.
    pub fn last_error(&self) -> Option<&str> {
        self.ctx.last_error.as_deref()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn autosave_deadline(&self) -> Option<u64> {
        self.debounce.deadline()
    }

    /// Applies an edit and restarts the autosave window. The first change
    /// echoing the loaded content (editor mount) does not schedule a save.
    pub fn edit(&mut self, content: RichText, now_ms: u64) {
        let mount_echo = !self.initialized && &content == self.editor.data();
        self.initialized = true;
        self.editor.set_data(content, &mut self.ctx);
        if !mount_echo {
            self.debounce.trigger(now_ms);
        }
    }

    pub fn undo(&mut self, now_ms: u64) -> bool {
        let changed = self.editor.undo(&mut self.ctx);
        if changed {
            self.debounce.trigger(now_ms);
        }
        changed
    }

    pub fn redo(&mut self, now_ms: u64) -> bool {
        let changed = self.editor.redo(&mut self.ctx);
        if changed {
            self.debounce.trigger(now_ms);
        }
        changed
    }

    /// Saves once the idle window has closed.
    pub async fn tick(&mut self, now_ms: u64) -> Result<SaveOutcome> {
        if !self.autosave_due(now_ms) {
            return Ok(SaveOutcome::NotDue);
        }
        self.ctx.save(self.editor.data()).await
    }

    /// True once per idle window, when `now_ms` has reached its end.
    pub fn autosave_due(&mut self, now_ms: u64) -> bool {
        self.debounce.fire(now_ms)
    }

    pub fn cancel_autosave(&mut self) {
        self.debounce.cancel();
    }

    /// Snapshot of the document carrying the current content, or `None` when
    /// that content is already saved or on its way.
    pub fn prepare_save(&mut self) -> Result<Option<PendingSave>> {
        self.ctx.prepare(self.editor.data())
    }

    /// Applies the service's answer to a prepared save. Edits made while the
    /// call was in flight stay in the editor and keep their autosave window.
    pub fn finish_save(&mut self, pending: PendingSave, result: Result<Document>) -> Result<SaveOutcome> {
        self.ctx.commit(pending, result)
    }

    pub async fn blur(&mut self) -> Result<SaveOutcome> {
        self.debounce.cancel();
        self.ctx.last_outcome = None;
        self.editor.blur(&mut self.ctx).await?;
        Ok(self.ctx.last_outcome.take().unwrap_or(SaveOutcome::Unchanged))
    }

    pub async fn upload_image(&mut self, upload: &Upload) -> Result<UploadLink> {
        let link = self.editor.upload_image(upload, &mut self.ctx).await?;
        self.debounce.cancel();
        Ok(link)
    }

    /// Merges the attachments returned for `upload`, inserts the image and
    /// drops the pending autosave. The content still has to be saved.
    pub fn apply_upload(&mut self, upload: &Upload, result: Result<Vec<Attachment>>) -> Result<UploadLink> {
        let attachments = result.map_err(|e| self.ctx.upload_failed(upload, e))?;
        let link = merge_upload(&mut self.ctx.document, upload, attachments, &self.ctx.upload_error_link);
        self.editor.insert_image(&link, &upload.name, &mut self.ctx);
        self.debounce.cancel();
        Ok(link)
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn set_editing(&mut self, editing: bool) {
        self.editing = editing;
    }

    pub fn render(&self) -> FieldView {
        if self.editing {
            FieldView::Editing { content: self.editor.data().clone() }
        } else {
            FieldView::ReadOnly { html: import_export::to_html(self.editor.data()) }
        }
    }
}
