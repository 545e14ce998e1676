//! HTML/JSON import/export for rich text.

use crate::doc::{Block, InlineSpan, InlineStyle, RichText};

pub fn to_json(content: &RichText) -> serde_json::Result<String> {
    serde_json::to_string(content)
}

pub fn from_json(json: &str) -> serde_json::Result<RichText> {
    serde_json::from_str(json)
}

/// Renders sanitized HTML. Every text run and attribute is escaped and unsafe
/// URLs are dropped, so the output can be injected as-is in read-only views.
pub fn to_html(content: &RichText) -> String {
    let mut out = String::new();
    let mut open_list: Option<bool> = None;
    for block in &content.blocks {
        let ordered = match block {
            Block::ListItem { ordered, .. } => Some(*ordered),
            _ => None,
        };
        if open_list != ordered {
            if let Some(prev) = open_list {
                out.push_str(if prev { "</ol>" } else { "</ul>" });
            }
            if let Some(next) = ordered {
                out.push_str(if next { "<ol>" } else { "<ul>" });
            }
            open_list = ordered;
        }
        match block {
            Block::Paragraph { text, spans } => {
                out.push_str("<p>");
                out.push_str(&render_inline(text, spans.as_deref()));
                out.push_str("</p>");
            }
            Block::Heading { level, text, spans } => {
                let lvl = (*level).clamp(1, 6);
                out.push_str(&format!("<h{}>", lvl));
                out.push_str(&render_inline(text, spans.as_deref()));
                out.push_str(&format!("</h{}>", lvl));
            }
            Block::ListItem { text, spans, .. } => {
                out.push_str("<li>");
                out.push_str(&render_inline(text, spans.as_deref()));
                out.push_str("</li>");
            }
            Block::Image { src, alt } => {
                if let Some(src) = sanitize_url(src) {
                    out.push_str(&format!(
                        "<img src=\"{}\" alt=\"{}\"/>",
                        html_escape::encode_double_quoted_attribute(&src),
                        html_escape::encode_double_quoted_attribute(alt)
                    ));
                }
            }
        }
    }
    if let Some(prev) = open_list {
        out.push_str(if prev { "</ol>" } else { "</ul>" });
    }
    out
}

fn render_inline(text: &str, spans: Option<&[InlineSpan]>) -> String {
    match spans {
        Some(sp) => render_spans_html(sp),
        None => encode_text_with_breaks(text),
    }
}

fn encode_text_with_breaks(text: &str) -> String {
    html_escape::encode_text(text).replace('\n', "<br/>").replace('\u{a0}', "&nbsp;")
}

fn render_spans_html(spans: &[InlineSpan]) -> String {
    let mut s = String::new();
    for span in spans {
        let mut inner = encode_text_with_breaks(&span.text);
        if span.style.code {
            inner = format!("<code>{}</code>", inner);
        }
        if span.style.underline {
            inner = format!("<u>{}</u>", inner);
        }
        if span.style.italic {
            inner = format!("<em>{}</em>", inner);
        }
        if span.style.bold {
            inner = format!("<strong>{}</strong>", inner);
        }
        if let Some(href) = span.style.link.as_deref().and_then(sanitize_url) {
            inner = format!(
                "<a href=\"{}\">{}</a>",
                html_escape::encode_double_quoted_attribute(&href),
                inner
            );
        }
        s.push_str(&inner);
    }
    s
}

/// Accepts http(s), mailto, inline images and relative URLs.
pub fn sanitize_url(url: &str) -> Option<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }
    let compact: String = trimmed
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    let scheme_end = match compact.find(':') {
        None => return Some(trimmed.to_string()),
        Some(i) => i,
    };
    if compact.find(['/', '?', '#']).map_or(false, |i| i < scheme_end) {
        return Some(trimmed.to_string());
    }
    let allowed = ["http:", "https:", "mailto:", "data:image/"];
    if allowed.iter().any(|p| compact.starts_with(p)) {
        Some(trimmed.to_string())
    } else {
        None
    }
}

/// Tolerant importer for the HTML comment bodies are stored as.
pub fn from_html(html: &str) -> RichText {
    let mut importer = HtmlImporter::default();
    let mut rest = html;
    while !rest.is_empty() {
        match rest.find('<') {
            Some(lt) => {
                if lt > 0 {
                    importer.text(&rest[..lt]);
                }
                let after = &rest[lt..];
                match after.find('>') {
                    Some(gt) => {
                        importer.tag(&after[1..gt]);
                        rest = &after[gt + 1..];
                    }
                    None => {
                        importer.text(after);
                        break;
                    }
                }
            }
            None => {
                importer.text(rest);
                break;
            }
        }
    }
    importer.finish()
}

enum PendingKind {
    Paragraph,
    Heading(u8),
    ListItem(bool),
}

struct PendingBlock {
    kind: PendingKind,
    spans: Vec<InlineSpan>,
}

#[derive(Default)]
struct HtmlImporter {
    blocks: Vec<Block>,
    current: Option<PendingBlock>,
    lists: Vec<bool>,
    bold: u32,
    italic: u32,
    underline: u32,
    code: u32,
    links: Vec<Option<String>>,
}

impl HtmlImporter {
    fn style(&self) -> InlineStyle {
        InlineStyle {
            bold: self.bold > 0,
            italic: self.italic > 0,
            underline: self.underline > 0,
            code: self.code > 0,
            link: self.links.last().cloned().flatten(),
        }
    }

    fn open(&mut self, kind: PendingKind) {
        self.flush();
        self.current = Some(PendingBlock { kind, spans: Vec::new() });
    }

    fn push_run(&mut self, run: &str) {
        let style = self.style();
        let block = self
            .current
            .get_or_insert_with(|| PendingBlock { kind: PendingKind::Paragraph, spans: Vec::new() });
        match block.spans.last_mut() {
            Some(last) if last.style == style => last.text.push_str(run),
            _ => block.spans.push(InlineSpan { text: run.to_string(), style }),
        }
    }

    fn text(&mut self, raw: &str) {
        let decoded = html_escape::decode_html_entities(raw);
        let collapsed = collapse_whitespace(&decoded);
        if collapsed.trim_matches(' ').is_empty() && self.current.is_none() {
            return;
        }
        let at_block_start = self
            .current
            .as_ref()
            .map_or(true, |b| b.spans.iter().all(|s| s.text.is_empty() || s.text.ends_with('\n')));
        let run = if at_block_start { collapsed.trim_start_matches(' ') } else { collapsed.as_str() };
        if !run.is_empty() {
            self.push_run(run);
        }
    }

    fn tag(&mut self, raw: &str) {
        let Some(tag) = parse_tag(raw) else { return };
        let name = tag.name.as_str();
        if tag.closing {
            match name {
                "p" | "div" | "blockquote" | "li" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => self.flush(),
                "ul" | "ol" => {
                    self.flush();
                    self.lists.pop();
                }
                "strong" | "b" => self.bold = self.bold.saturating_sub(1),
                "em" | "i" => self.italic = self.italic.saturating_sub(1),
                "u" => self.underline = self.underline.saturating_sub(1),
                "code" => self.code = self.code.saturating_sub(1),
                "a" => {
                    self.links.pop();
                }
                _ => {}
            }
            return;
        }
        match name {
            "p" | "div" | "blockquote" => self.open(PendingKind::Paragraph),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse().unwrap_or(1);
                self.open(PendingKind::Heading(level));
            }
            "ul" | "ol" => {
                self.flush();
                self.lists.push(name == "ol");
            }
            "li" => {
                let ordered = self.lists.last().copied().unwrap_or(false);
                self.open(PendingKind::ListItem(ordered));
            }
            "br" => {
                if self.current.is_some() {
                    self.push_run("\n");
                }
            }
            "img" => {
                self.flush();
                if let Some(src) = attr(tag.attrs, "src").as_deref().and_then(sanitize_url) {
                    let alt = attr(tag.attrs, "alt").unwrap_or_default();
                    self.blocks.push(Block::Image { src, alt });
                }
            }
            "strong" | "b" => self.bold += 1,
            "em" | "i" => self.italic += 1,
            "u" => self.underline += 1,
            "code" => self.code += 1,
            "a" => {
                let href = attr(tag.attrs, "href").as_deref().and_then(sanitize_url);
                self.links.push(href);
            }
            _ => {}
        }
    }

    fn flush(&mut self) {
        let Some(mut pending) = self.current.take() else { return };
        while let Some(last) = pending.spans.last_mut() {
            let trimmed_len = last.text.trim_end_matches(' ').len();
            last.text.truncate(trimmed_len);
            if last.text.is_empty() {
                pending.spans.pop();
            } else {
                break;
            }
        }
        let text: String = pending.spans.iter().map(|s| s.text.as_str()).collect();
        let spans = if pending.spans.iter().all(|s| s.style.is_plain()) { None } else { Some(pending.spans) };
        self.blocks.push(match pending.kind {
            PendingKind::Paragraph => Block::Paragraph { text, spans },
            PendingKind::Heading(level) => Block::Heading { level, text, spans },
            PendingKind::ListItem(ordered) => Block::ListItem { ordered, text, spans },
        });
    }

    fn finish(mut self) -> RichText {
        self.flush();
        RichText { blocks: self.blocks }
    }
}

/// Collapses runs of markup whitespace. Non-breaking spaces are content.
fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_ws = false;
    for ch in s.chars() {
        if ch.is_ascii_whitespace() {
            if !in_ws {
                out.push(' ');
            }
            in_ws = true;
        } else {
            out.push(ch);
            in_ws = false;
        }
    }
    out
}

struct Tag<'a> {
    name: String,
    closing: bool,
    attrs: &'a str,
}

fn parse_tag(raw: &str) -> Option<Tag<'_>> {
    let raw = raw.trim();
    if raw.starts_with('!') || raw.starts_with('?') {
        return None;
    }
    let closing = raw.starts_with('/');
    let body = raw.trim_start_matches('/').trim_end_matches('/');
    let name_end = body.find(|c: char| !c.is_ascii_alphanumeric()).unwrap_or(body.len());
    if name_end == 0 {
        return None;
    }
    Some(Tag { name: body[..name_end].to_ascii_lowercase(), closing, attrs: &body[name_end..] })
}

fn attr(attrs: &str, key: &str) -> Option<String> {
    let mut s = attrs;
    loop {
        s = s.trim_start();
        if s.is_empty() {
            return None;
        }
        let name_end = s.find(|c: char| c.is_whitespace() || c == '=').unwrap_or(s.len());
        if name_end == 0 {
            // stray '=' without a name
            s = &s[1..];
            continue;
        }
        let name = &s[..name_end];
        s = s[name_end..].trim_start();
        let mut value = "";
        if let Some(after_eq) = s.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            match after_eq.chars().next() {
                Some(q @ ('"' | '\'')) => {
                    let inner = &after_eq[1..];
                    let end = inner.find(q).unwrap_or(inner.len());
                    value = &inner[..end];
                    s = inner.get(end + 1..).unwrap_or("");
                }
                _ => {
                    let end = after_eq.find(char::is_whitespace).unwrap_or(after_eq.len());
                    value = &after_eq[..end];
                    s = &after_eq[end..];
                }
            }
        }
        if name.eq_ignore_ascii_case(key) {
            return Some(html_escape::decode_html_entities(value).into_owned());
        }
    }
}
