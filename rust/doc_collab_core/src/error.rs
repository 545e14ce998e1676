//! Error types shared by the editor, field and thread components.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },
}

#[derive(Debug, Error)]
pub enum Error {
    /// The document service answered with an empty/falsy response.
    #[error("document service rejected {0}")]
    Rejected(&'static str),
    #[error("document service error: {0}")]
    Service(String),
    #[error("comment {index} has no server identifier")]
    MissingCommentId { index: usize },
    #[error("no comment at index {0}")]
    NoSuchComment(usize),
    #[error("viewer may not modify comment {0}")]
    NotPermitted(usize),
    #[error("no comment is being edited")]
    NotEditing,
    #[error("comment body is empty")]
    EmptyComment,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("invalid rich-text payload: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("another operation is still in flight")]
    Busy,
}

pub type Result<T> = std::result::Result<T, Error>;
