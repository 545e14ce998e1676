//! Rich-text content structures and helpers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RichText {
    #[serde(default)]
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Block {
    Paragraph { text: String, #[serde(default, skip_serializing_if = "Option::is_none")] spans: Option<Vec<InlineSpan>> },
    Heading { level: u8, text: String, #[serde(default, skip_serializing_if = "Option::is_none")] spans: Option<Vec<InlineSpan>> },
    ListItem { #[serde(default)] ordered: bool, text: String, #[serde(default, skip_serializing_if = "Option::is_none")] spans: Option<Vec<InlineSpan>> },
    Image { src: String, #[serde(default)] alt: String },
}

impl Default for Block {
    fn default() -> Self {
        Block::Paragraph { text: String::new(), spans: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct InlineStyle {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl InlineStyle {
    pub fn is_plain(&self) -> bool {
        *self == InlineStyle::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct InlineSpan {
    pub text: String,
    #[serde(default)]
    pub style: InlineStyle,
}

impl Block {
    /// Text of a block as the reader sees it. Spans win over `text` when both are present.
    pub fn plain_text(&self) -> String {
        match self {
            Block::Paragraph { text, spans }
            | Block::Heading { text, spans, .. }
            | Block::ListItem { text, spans, .. } => match spans {
                Some(sp) => sp.iter().map(|s| s.text.as_str()).collect(),
                None => text.clone(),
            },
            Block::Image { .. } => String::new(),
        }
    }

    pub fn is_text(&self) -> bool {
        !matches!(self, Block::Image { .. })
    }
}

impl RichText {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self { blocks: vec![Block::Paragraph { text: text.into(), spans: None }] }
    }

    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .filter(|b| b.is_text())
            .map(Block::plain_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whitespace-only text counts as blank; images do not make content non-blank.
    pub fn is_blank(&self) -> bool {
        self.plain_text().trim().is_empty()
    }

    pub fn push_paragraph(&mut self, text: impl Into<String>) {
        self.blocks.push(Block::Paragraph { text: text.into(), spans: None });
    }

    pub fn push_image(&mut self, src: impl Into<String>, alt: impl Into<String>) {
        self.blocks.push(Block::Image { src: src.into(), alt: alt.into() });
    }

    pub fn images(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Image { src, .. } => Some(src.as_str()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_prefers_spans_and_skips_images() {
        let mut rt = RichText::paragraph("first");
        rt.push_image("https://x/a.png", "a");
        rt.blocks.push(Block::Heading {
            level: 2,
            text: "ignored".into(),
            spans: Some(vec![
                InlineSpan { text: "Bold ".into(), style: InlineStyle { bold: true, ..Default::default() } },
                InlineSpan { text: "tail".into(), style: InlineStyle::default() },
            ]),
        });
        assert_eq!(rt.plain_text(), "first\nBold tail");
    }

    #[test]
    fn image_only_content_is_blank() {
        let mut rt = RichText::empty();
        assert!(rt.is_blank());
        rt.push_image("a.png", "");
        assert!(rt.is_blank());
        rt.push_paragraph("  \n ");
        assert!(rt.is_blank());
        rt.push_paragraph("x");
        assert!(!rt.is_blank());
    }
}
