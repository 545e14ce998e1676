pub mod doc;
pub mod history;
pub mod import_export;
pub mod model;
pub mod error;
pub mod config;
pub mod service;
pub mod memory;
pub mod draft;
pub mod debounce;
pub mod editor;
pub mod field;
pub mod visibility;
pub mod thread;
pub mod search;

pub use config::UiConfig;
pub use doc::{Block, InlineSpan, InlineStyle, RichText};
pub use draft::{DraftStore, MemoryDraftStore};
pub use editor::{EditorHost, RichTextEditor};
pub use error::{Error, Result, ValidationError};
pub use field::{FieldEditor, FieldEditorBuilder, FieldView, PendingSave, SaveOutcome};
pub use memory::{MemoryDocService, ServiceCall};
pub use model::{Attachment, Author, Comment, CommentPatch, Document, EditRecord, Upload, UploadLink};
pub use search::CommentSearch;
pub use service::DocService;
pub use thread::{CommentThread, CommentView, DeleteOutcome, PendingComment, PendingDelete, PendingUpdate};
pub use visibility::{show_comment, Viewer};
