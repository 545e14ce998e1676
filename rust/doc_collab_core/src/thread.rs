//! Comment thread: list, compose, edit and delete comments on a document.
//!
//! At most one comment is edited at a time. The thread owns a single edit
//! editor that is reloaded with whichever comment is selected, and a separate
//! composer whose content is mirrored into a [`DraftStore`] on blur so an
//! abandoned comment survives navigation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::UiConfig;
use crate::doc::RichText;
use crate::draft::{self, DraftStore};
use crate::editor::{EditorHost, RichTextEditor};
use crate::error::{Error, Result};
use crate::import_export;
use crate::model::{Attachment, Comment, CommentPatch, Document, EditRecord, Upload, UploadLink};
use crate::service::{merge_upload, upload_into, DocService};
use crate::visibility::{can_modify, show_comment, topic_matches, Viewer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The comment has no server identifier; positional deletion is disabled.
    Skipped,
}

/// Render model for one comment row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentView {
    pub index: usize,
    pub id: Option<String>,
    pub author_name: String,
    pub timestamp: DateTime<Utc>,
    pub html: String,
    pub private: bool,
    pub topic: String,
    pub can_edit: bool,
    pub editing: bool,
    pub edited: bool,
}

/// An edit save taken out of the thread while the service call runs.
#[derive(Debug, Clone)]
pub struct PendingUpdate {
    pub index: usize,
    pub id: String,
    pub document: Document,
    pub patch: CommentPatch,
}

/// A new comment taken out of the composer while the service call runs.
#[derive(Debug, Clone)]
pub struct PendingComment {
    pub document: Document,
    pub html: String,
    pub topic: String,
    pub private: bool,
}

#[derive(Debug, Clone)]
pub struct PendingDelete {
    pub id: String,
    pub document: Document,
}

struct ThreadContext<S, D> {
    service: S,
    drafts: D,
    document: Document,
    viewer: Viewer,
    config: UiConfig,
}

impl<S: DocService, D: DraftStore> ThreadContext<S, D> {
    async fn upload(&mut self, upload: &Upload) -> Result<UploadLink> {
        upload_into(&self.service, &mut self.document, upload, &self.config.upload_error_link).await
    }

    fn attach(&mut self, upload: &Upload, result: Result<Vec<Attachment>>) -> Result<UploadLink> {
        let attachments = result.map_err(|e| {
            log::warn!("upload of {} failed: {}", upload.name, e);
            e
        })?;
        Ok(merge_upload(&mut self.document, upload, attachments, &self.config.upload_error_link))
    }

    fn store_draft(&mut self, content: &RichText) -> Result<()> {
        let key = self.config.draft_key.clone();
        Ok(draft::store_draft(&mut self.drafts, &key, content)?)
    }
}

/// Host for the new-comment composer: blur mirrors the draft.
struct ComposerHost<'a, S, D>(&'a mut ThreadContext<S, D>);

#[async_trait(?Send)]
impl<'a, S: DocService, D: DraftStore> EditorHost for ComposerHost<'a, S, D> {
    async fn on_blur(&mut self, content: &RichText) -> Result<()> {
        self.0.store_draft(content)
    }

    async fn upload_image(&mut self, upload: &Upload) -> Result<UploadLink> {
        self.0.upload(upload).await
    }
}

/// Host for the shared edit editor: edits persist only on explicit save.
struct EditHost<'a, S, D>(&'a mut ThreadContext<S, D>);

#[async_trait(?Send)]
impl<'a, S: DocService, D: DraftStore> EditorHost for EditHost<'a, S, D> {
    async fn on_blur(&mut self, _content: &RichText) -> Result<()> {
        Ok(())
    }

    async fn upload_image(&mut self, upload: &Upload) -> Result<UploadLink> {
        self.0.upload(upload).await
    }
}

pub struct CommentThread<S, D> {
    ctx: ThreadContext<S, D>,
    topic: Option<String>,
    editing: Option<usize>,
    edit_editor: RichTextEditor,
    composer: RichTextEditor,
}

impl<S: DocService, D: DraftStore> CommentThread<S, D> {
    /// Mounts the thread, restoring any stored composer draft.
    pub fn new(service: S, drafts: D, document: Document, viewer: Viewer, topic: Option<String>, config: UiConfig) -> Self {
        let mut ctx = ThreadContext { service, drafts, document, viewer, config };
        let mut composer = RichTextEditor::new("comment");
        if let Some(saved) = draft::load_draft(&ctx.drafts, &ctx.config.draft_key) {
            composer.load(saved, &mut ComposerHost(&mut ctx));
        }
        Self { ctx, topic, editing: None, edit_editor: RichTextEditor::new("comment_edit"), composer }
    }

    pub fn document(&self) -> &Document {
        &self.ctx.document
    }

    pub fn viewer(&self) -> &Viewer {
        &self.ctx.viewer
    }

    pub fn service(&self) -> &S {
        &self.ctx.service
    }

    pub fn drafts(&self) -> &D {
        &self.ctx.drafts
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn set_topic(&mut self, topic: Option<String>) {
        self.topic = topic;
    }

    pub fn editing_index(&self) -> Option<usize> {
        self.editing
    }

    /// While a comment is edited, only its editor is shown.
    pub fn focus_mode(&self) -> bool {
        self.editing.is_some()
    }

    pub fn can_edit(&self, index: usize) -> bool {
        self.ctx.document.comments.get(index).map_or(false, |c| can_modify(&self.ctx.viewer, c))
    }

    fn in_topic(&self, comment: &Comment) -> bool {
        topic_matches(&comment.topic, self.topic.as_deref(), &self.ctx.config.topic_wildcard)
    }

    /// Indices of comments passing the topic filter and visibility rules.
    pub fn visible(&self, search: Option<&str>) -> Vec<usize> {
        self.ctx
            .document
            .comments
            .iter()
            .enumerate()
            .filter(|(_, c)| self.in_topic(c) && show_comment(c, &self.ctx.viewer, search))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn render(&self, search: Option<&str>) -> Vec<CommentView> {
        let indices = match self.editing {
            Some(index) => vec![index],
            None => self.visible(search),
        };
        indices
            .into_iter()
            .filter_map(|index| {
                let c = self.ctx.document.comments.get(index)?;
                Some(CommentView {
                    index,
                    id: c.id.clone(),
                    author_name: c.author.name.clone(),
                    timestamp: c.timestamp,
                    html: import_export::to_html(&c.body()),
                    private: c.private,
                    topic: c.topic.clone(),
                    can_edit: can_modify(&self.ctx.viewer, c),
                    editing: self.editing == Some(index),
                    edited: !c.edits.is_empty(),
                })
            })
            .collect()
    }

    fn editable(&self, index: usize) -> Result<&Comment> {
        let comment = self.ctx.document.comments.get(index).ok_or(Error::NoSuchComment(index))?;
        if !can_modify(&self.ctx.viewer, comment) {
            return Err(Error::NotPermitted(index));
        }
        Ok(comment)
    }

    /// Loads the comment into the edit editor; switches away from any other
    /// comment being edited.
    pub fn begin_edit(&mut self, index: usize) -> Result<()> {
        let body = self.editable(index)?.body();
        self.edit_editor.load(body, &mut EditHost(&mut self.ctx));
        self.editing = Some(index);
        Ok(())
    }

    pub fn edit_content(&self) -> &RichText {
        self.edit_editor.data()
    }

    pub fn set_edit_content(&mut self, content: RichText) -> Result<()> {
        if self.editing.is_none() {
            return Err(Error::NotEditing);
        }
        self.edit_editor.set_data(content, &mut EditHost(&mut self.ctx));
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Persists the edit editor's content into the selected comment and
    /// appends an edit record. Comments without an identifier cannot be
    /// updated: nothing is sent and the edit stays open.
    pub async fn save_edit(&mut self) -> Result<()> {
        let pending = self.prepare_edit()?;
        let result = self.ctx.service.update_comment(&pending.document, &pending.id, &pending.patch).await;
        self.finish_edit(pending, result)
    }

    pub fn prepare_edit(&self) -> Result<PendingUpdate> {
        let index = self.editing.ok_or(Error::NotEditing)?;
        let comment = self.editable(index)?;
        let Some(id) = comment.id.clone() else {
            log::warn!("comment {} has no identifier, edit not saved", index);
            return Err(Error::MissingCommentId { index });
        };
        let mut edits = comment.edits.clone();
        edits.push(EditRecord { editor: self.ctx.viewer.display_name().to_string(), timestamp: Utc::now() });
        let patch = CommentPatch {
            text: Some(import_export::to_html(self.edit_editor.data())),
            edits: Some(edits),
            ..Default::default()
        };
        Ok(PendingUpdate { index, id, document: self.ctx.document.clone(), patch })
    }

    /// Applies the service's answer to a prepared edit. The edit closes only
    /// if the same comment is still open with the content that was sent.
    pub fn finish_edit(&mut self, pending: PendingUpdate, result: Result<Document>) -> Result<()> {
        let updated = result.map_err(|e| {
            log::warn!("updating comment {} failed: {}", pending.id, e);
            e
        })?;
        self.ctx.document = updated;
        let sent = pending.patch.text.as_deref();
        if self.editing == Some(pending.index) && sent == Some(import_export::to_html(self.edit_editor.data()).as_str()) {
            self.editing = None;
        }
        log::debug!("updated comment {}", pending.id);
        Ok(())
    }

    pub async fn upload_to_edit(&mut self, upload: &Upload) -> Result<UploadLink> {
        if self.editing.is_none() {
            return Err(Error::NotEditing);
        }
        self.edit_editor.upload_image(upload, &mut EditHost(&mut self.ctx)).await
    }

    /// Merges the attachments returned for `upload` and inserts the image
    /// into the comment being edited.
    pub fn apply_edit_upload(&mut self, upload: &Upload, result: Result<Vec<Attachment>>) -> Result<UploadLink> {
        let link = self.ctx.attach(upload, result)?;
        if self.editing.is_none() {
            return Err(Error::NotEditing);
        }
        self.edit_editor.insert_image(&link, &upload.name, &mut EditHost(&mut self.ctx));
        Ok(link)
    }

    pub fn composer_content(&self) -> &RichText {
        self.composer.data()
    }

    pub fn set_composer_content(&mut self, content: RichText) {
        self.composer.set_data(content, &mut ComposerHost(&mut self.ctx));
    }

    /// Mirrors the composer into the draft store.
    pub async fn composer_blur(&mut self) -> Result<()> {
        self.composer.blur(&mut ComposerHost(&mut self.ctx)).await
    }

    /// Same as [`composer_blur`](Self::composer_blur), without going through the editor.
    pub fn save_draft(&mut self) -> Result<()> {
        self.ctx.store_draft(self.composer.data())
    }

    pub async fn upload_to_composer(&mut self, upload: &Upload) -> Result<UploadLink> {
        self.composer.upload_image(upload, &mut ComposerHost(&mut self.ctx)).await
    }

    /// Merges the attachments returned for `upload`, inserts the image into
    /// the composer and refreshes the draft.
    pub fn apply_composer_upload(&mut self, upload: &Upload, result: Result<Vec<Attachment>>) -> Result<UploadLink> {
        let link = self.ctx.attach(upload, result)?;
        self.composer.insert_image(&link, &upload.name, &mut ComposerHost(&mut self.ctx));
        self.save_draft()?;
        Ok(link)
    }

    /// Topic new comments are tagged with; the wildcard tags nothing.
    pub fn submit_topic(&self) -> &str {
        match self.topic.as_deref() {
            Some(t) if !self.ctx.config.is_wildcard(t) => t,
            _ => "",
        }
    }

    /// Adds the composer's content as a new comment, then clears the composer
    /// and its stored draft.
    pub async fn submit(&mut self, private: bool) -> Result<()> {
        let pending = self.prepare_submit(private)?;
        let result =
            self.ctx.service.add_comment(&pending.document, &pending.html, &pending.topic, pending.private).await;
        self.finish_submit(pending, result)
    }

    pub fn prepare_submit(&self, private: bool) -> Result<PendingComment> {
        let content = self.composer.data();
        if content.is_blank() && content.images().next().is_none() {
            return Err(Error::EmptyComment);
        }
        Ok(PendingComment {
            document: self.ctx.document.clone(),
            html: import_export::to_html(content),
            topic: self.submit_topic().to_string(),
            private,
        })
    }

    /// Applies the service's answer to a prepared comment. The composer and
    /// draft are cleared only if nothing was typed while the call ran.
    pub fn finish_submit(&mut self, pending: PendingComment, result: Result<Document>) -> Result<()> {
        let updated = result.map_err(|e| {
            log::warn!("adding comment failed: {}", e);
            e
        })?;
        self.ctx.document = updated;
        if import_export::to_html(self.composer.data()) == pending.html {
            let mut host = ComposerHost(&mut self.ctx);
            self.composer.load(RichText::empty(), &mut host);
            let key = host.0.config.draft_key.clone();
            host.0.drafts.clear(&key);
        }
        log::debug!("added comment to document {}", self.ctx.document.id);
        Ok(())
    }

    /// Deletes by server identifier. A comment without one is left in place.
    pub async fn delete(&mut self, index: usize) -> Result<DeleteOutcome> {
        let Some(pending) = self.prepare_delete(index)? else {
            return Ok(DeleteOutcome::Skipped);
        };
        let result = self.ctx.service.delete_comment(&pending.document, &pending.id).await;
        self.finish_delete(pending, result)
    }

    /// `None` when the comment has no identifier.
    pub fn prepare_delete(&self, index: usize) -> Result<Option<PendingDelete>> {
        let comment = self.editable(index)?;
        let Some(id) = comment.id.clone() else {
            log::warn!("comment {} has no identifier; delete by position is disabled", index);
            return Ok(None);
        };
        Ok(Some(PendingDelete { id, document: self.ctx.document.clone() }))
    }

    /// Indices shift after a delete, so any open edit is closed.
    pub fn finish_delete(&mut self, pending: PendingDelete, result: Result<Document>) -> Result<DeleteOutcome> {
        let updated = result.map_err(|e| {
            log::warn!("deleting comment {} failed: {}", pending.id, e);
            e
        })?;
        self.ctx.document = updated;
        self.editing = None;
        Ok(DeleteOutcome::Deleted)
    }
}
