//! Document, comment and attachment records as exchanged with the document service.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::doc::RichText;
use crate::error::Result;
use crate::import_export;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Named fields holding serialized rich text (plus anything else the service sends).
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EditRecord {
    pub editor: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    /// Assigned by the service; comments created before persistence may lack one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub author: Author,
    pub timestamp: DateTime<Utc>,
    /// Body as HTML.
    pub text: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub edits: Vec<EditRecord>,
}

impl Comment {
    pub fn body(&self) -> RichText {
        import_export::from_html(&self.text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub url: String,
}

/// Partial update for a comment; `None` members are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CommentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edits: Option<Vec<EditRecord>>,
}

impl CommentPatch {
    pub fn apply(&self, comment: &mut Comment) {
        if let Some(text) = &self.text {
            comment.text = text.clone();
        }
        if let Some(private) = self.private {
            comment.private = private;
        }
        if let Some(edits) = &self.edits {
            comment.edits = edits.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), content_type: content_type.into(), bytes }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkData {
    pub link: String,
}

/// `{ "data": { "link": ... } }`, the shape image-upload handlers resolve to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadLink {
    pub data: LinkData,
}

impl UploadLink {
    pub fn new(link: impl Into<String>) -> Self {
        Self { data: LinkData { link: link.into() } }
    }

    pub fn link(&self) -> &str {
        &self.data.link
    }
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), ..Default::default() }
    }

    /// Stored content of a rich-text field. Fields may hold the serialized
    /// JSON as a string or embed the object directly.
    pub fn field_content(&self, field: &str) -> Result<Option<RichText>> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(raw)) if raw.trim().is_empty() => Ok(None),
            Some(Value::String(raw)) => Ok(Some(import_export::from_json(raw)?)),
            Some(other) => Ok(Some(serde_json::from_value(other.clone())?)),
        }
    }

    pub fn set_field_raw(&mut self, field: &str, serialized: String) {
        self.fields.insert(field.to_string(), Value::String(serialized));
    }

    /// Upsert by attachment name.
    pub fn merge_attachments(&mut self, incoming: Vec<Attachment>) {
        for attachment in incoming {
            match self.attachments.iter_mut().find(|a| a.name == attachment.name) {
                Some(existing) => *existing = attachment,
                None => self.attachments.push(attachment),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_members_land_in_fields() {
        let doc: Document = serde_json::from_value(json!({
            "id": "d1",
            "comments": [],
            "summary": "{\"blocks\":[{\"type\":\"Paragraph\",\"text\":\"hi\"}]}",
            "notes": {"blocks": [{"type": "Paragraph", "text": "inline"}]},
            "title": ""
        }))
        .unwrap();
        assert_eq!(doc.field_content("summary").unwrap(), Some(RichText::paragraph("hi")));
        assert_eq!(doc.field_content("notes").unwrap(), Some(RichText::paragraph("inline")));
        assert_eq!(doc.field_content("title").unwrap(), None);
        assert_eq!(doc.field_content("missing").unwrap(), None);
    }

    #[test]
    fn malformed_field_is_an_error() {
        let mut doc = Document::new("d1");
        doc.set_field_raw("summary", "{not json".into());
        assert!(doc.field_content("summary").is_err());
    }

    #[test]
    fn merge_attachments_upserts_by_name() {
        let mut doc = Document::new("d1");
        doc.attachments.push(Attachment { name: "a.png".into(), url: "old".into() });
        doc.merge_attachments(vec![
            Attachment { name: "a.png".into(), url: "new".into() },
            Attachment { name: "b.png".into(), url: "b".into() },
        ]);
        assert_eq!(doc.attachments.len(), 2);
        assert_eq!(doc.attachments[0].url, "new");
    }

    #[test]
    fn upload_link_serializes_as_descriptor() {
        let v = serde_json::to_value(UploadLink::new("https://x/a.png")).unwrap();
        assert_eq!(v, json!({"data": {"link": "https://x/a.png"}}));
    }
}
