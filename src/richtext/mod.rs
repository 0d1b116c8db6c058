//! Rich text rendering
//!
//! Structured-text nodes are translated into pulldown-cmark events and
//! written out with its HTML serializer, which escapes text content and
//! link targets. Raw HTML only enters the output for label spans (whose class
//! names are validated) and, when explicitly trusted, oEmbed payloads.

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, HeadingLevel, LinkType, Tag, TagEnd};

use crate::content::{RichTextNode, Span};

/// Turns a sequence of rich-text nodes into an HTML fragment
pub trait RichTextRenderer: Send + Sync {
    fn as_html(&self, nodes: &[RichTextNode]) -> String;
}

/// Default HTML serializer for structured text
#[derive(Debug, Clone)]
pub struct HtmlSerializer {
    trust_embeds: bool,
    /// Route prefix for links to other documents
    document_prefix: String,
}

impl Default for HtmlSerializer {
    fn default() -> Self {
        Self {
            trust_embeds: false,
            document_prefix: "/post/".to_string(),
        }
    }
}

impl HtmlSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit provider HTML for embeds instead of a link
    pub fn trust_embeds(mut self, trust: bool) -> Self {
        self.trust_embeds = trust;
        self
    }

    fn push_node(&self, node: &RichTextNode, events: &mut Vec<Event<'static>>) {
        match node.kind.as_str() {
            "paragraph" => {
                events.push(Event::Start(Tag::Paragraph));
                self.push_inline(node, events);
                events.push(Event::End(TagEnd::Paragraph));
            }
            "preformatted" => {
                events.push(Event::Start(Tag::CodeBlock(CodeBlockKind::Indented)));
                events.push(Event::Text(CowStr::from(node.text.clone())));
                events.push(Event::End(TagEnd::CodeBlock));
            }
            "list-item" | "o-list-item" => {
                events.push(Event::Start(Tag::Item));
                self.push_inline(node, events);
                events.push(Event::End(TagEnd::Item));
            }
            "image" => self.push_image(node, events),
            "embed" => self.push_embed(node, events),
            kind => match heading_level(kind) {
                Some(level) => {
                    events.push(Event::Start(Tag::Heading {
                        level,
                        id: None,
                        classes: Vec::new(),
                        attrs: Vec::new(),
                    }));
                    self.push_inline(node, events);
                    events.push(Event::End(TagEnd::Heading(level)));
                }
                None => {
                    tracing::debug!("Rendering unknown rich-text node `{}` as paragraph", kind);
                    events.push(Event::Start(Tag::Paragraph));
                    self.push_inline(node, events);
                    events.push(Event::End(TagEnd::Paragraph));
                }
            },
        }
    }

    fn push_image(&self, node: &RichTextNode, events: &mut Vec<Event<'static>>) {
        let Some(url) = node.url.as_deref().filter(|u| is_safe_image_url(u)) else {
            if node.url.is_some() {
                tracing::debug!("Dropping image with unsupported URL");
            }
            return;
        };
        events.push(Event::Html(CowStr::from("<p class=\"block-img\">")));
        events.push(Event::Start(Tag::Image {
            link_type: LinkType::Inline,
            dest_url: CowStr::from(url.to_string()),
            title: CowStr::from(""),
            id: CowStr::from(""),
        }));
        if let Some(alt) = node.alt.as_deref().filter(|a| !a.is_empty()) {
            events.push(Event::Text(CowStr::from(alt.to_string())));
        }
        events.push(Event::End(TagEnd::Image));
        events.push(Event::Html(CowStr::from("</p>\n")));
    }

    fn push_embed(&self, node: &RichTextNode, events: &mut Vec<Event<'static>>) {
        let Some(embed) = &node.oembed else {
            return;
        };

        if self.trust_embeds {
            if let Some(markup) = embed.html.as_deref() {
                events.push(Event::Html(CowStr::from(format!(
                    "<div class=\"embed\">{}</div>\n",
                    markup
                ))));
                return;
            }
        }

        let Some(url) = embed.embed_url.as_deref().filter(|u| is_safe_link_url(u)) else {
            return;
        };
        let label = embed
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| url.to_string());
        events.push(Event::Start(Tag::Paragraph));
        events.push(Event::Start(link_tag(url.to_string())));
        events.push(Event::Text(CowStr::from(label)));
        events.push(Event::End(TagEnd::Link));
        events.push(Event::End(TagEnd::Paragraph));
    }

    /// Text with spans, kept well nested even when spans overlap
    fn push_inline(&self, node: &RichTextNode, events: &mut Vec<Event<'static>>) {
        let text = node.text.as_str();
        let mut marks: Vec<(usize, usize, Mark)> = node
            .spans
            .iter()
            .filter_map(|span| {
                let mark = self.mark_for(span)?;
                let start = utf16_to_byte(text, span.start);
                let end = utf16_to_byte(text, span.end);
                (start < end).then_some((start, end, mark))
            })
            .collect();
        // Outer spans first at equal starts
        marks.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

        let mut boundaries: Vec<usize> = marks
            .iter()
            .flat_map(|(start, end, _)| [*start, *end])
            .chain([0, text.len()])
            .collect();
        boundaries.sort_unstable();
        boundaries.dedup();

        let mut open: Vec<usize> = Vec::new();
        for window in boundaries.windows(2) {
            let (pos, next) = (window[0], window[1]);

            // Close marks ending here, reopening any inner mark that continues
            if open.iter().any(|&i| marks[i].1 <= pos) {
                let mut reopen = Vec::new();
                while open.iter().any(|&i| marks[i].1 <= pos) {
                    let Some(top) = open.pop() else { break };
                    events.push(marks[top].2.end());
                    if marks[top].1 > pos {
                        reopen.push(top);
                    }
                }
                for idx in reopen.into_iter().rev() {
                    events.push(marks[idx].2.start());
                    open.push(idx);
                }
            }

            for (idx, (start, _, mark)) in marks.iter().enumerate() {
                if *start == pos {
                    events.push(mark.start());
                    open.push(idx);
                }
            }

            push_text(&text[pos..next], events);
        }

        while let Some(top) = open.pop() {
            events.push(marks[top].2.end());
        }
    }

    fn mark_for(&self, span: &Span) -> Option<Mark> {
        match span.kind.as_str() {
            "strong" => Some(Mark::Strong),
            "em" => Some(Mark::Emphasis),
            "hyperlink" => {
                let data = span.data.as_ref()?;
                match (&data.url, &data.uid) {
                    (Some(url), _) if is_safe_link_url(url) => Some(Mark::Link(url.clone())),
                    (Some(url), _) if !url.is_empty() => {
                        tracing::debug!("Dropping link with unsupported URL scheme");
                        None
                    }
                    (_, Some(uid)) if !uid.is_empty() => {
                        Some(Mark::Link(format!("{}{}", self.document_prefix, uid)))
                    }
                    _ => None,
                }
            }
            "label" => {
                let label = span.data.as_ref()?.label.clone()?;
                is_class_name(&label).then_some(Mark::Label(label))
            }
            _ => None,
        }
    }
}

impl RichTextRenderer for HtmlSerializer {
    fn as_html(&self, nodes: &[RichTextNode]) -> String {
        let mut events: Vec<Event<'static>> = Vec::new();
        let mut list: Option<bool> = None;

        for node in nodes {
            let ordered = match node.kind.as_str() {
                "list-item" => Some(false),
                "o-list-item" => Some(true),
                _ => None,
            };

            if list != ordered {
                if let Some(was_ordered) = list.take() {
                    events.push(Event::End(TagEnd::List(was_ordered)));
                }
                if let Some(is_ordered) = ordered {
                    events.push(Event::Start(Tag::List(is_ordered.then_some(1))));
                    list = Some(is_ordered);
                }
            }

            self.push_node(node, &mut events);
        }

        if let Some(was_ordered) = list {
            events.push(Event::End(TagEnd::List(was_ordered)));
        }

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());
        html_output
    }
}

/// Inline formatting carried by a span
#[derive(Debug, Clone, PartialEq)]
enum Mark {
    Strong,
    Emphasis,
    Link(String),
    Label(String),
}

impl Mark {
    fn start(&self) -> Event<'static> {
        match self {
            Mark::Strong => Event::Start(Tag::Strong),
            Mark::Emphasis => Event::Start(Tag::Emphasis),
            Mark::Link(url) => Event::Start(link_tag(url.clone())),
            Mark::Label(label) => {
                Event::InlineHtml(CowStr::from(format!("<span class=\"{}\">", label)))
            }
        }
    }

    fn end(&self) -> Event<'static> {
        match self {
            Mark::Strong => Event::End(TagEnd::Strong),
            Mark::Emphasis => Event::End(TagEnd::Emphasis),
            Mark::Link(_) => Event::End(TagEnd::Link),
            Mark::Label(_) => Event::InlineHtml(CowStr::from("</span>")),
        }
    }
}

fn link_tag(url: String) -> Tag<'static> {
    Tag::Link {
        link_type: LinkType::Inline,
        dest_url: CowStr::from(url),
        title: CowStr::from(""),
        id: CowStr::from(""),
    }
}

/// Text with `\n` rendered as line breaks
fn push_text(text: &str, events: &mut Vec<Event<'static>>) {
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            events.push(Event::HardBreak);
        }
        if !line.is_empty() {
            events.push(Event::Text(CowStr::from(line.to_string())));
        }
    }
}

fn heading_level(kind: &str) -> Option<HeadingLevel> {
    match kind {
        "heading1" => Some(HeadingLevel::H1),
        "heading2" => Some(HeadingLevel::H2),
        "heading3" => Some(HeadingLevel::H3),
        "heading4" => Some(HeadingLevel::H4),
        "heading5" => Some(HeadingLevel::H5),
        "heading6" => Some(HeadingLevel::H6),
        _ => None,
    }
}

/// Scheme of an absolute URL, lowercased, ignoring the whitespace and
/// control characters browsers skip while parsing it
fn url_scheme(url: &str) -> Option<String> {
    let cleaned: String = url
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .collect();
    let end = cleaned.find(|c| matches!(c, ':' | '/' | '?' | '#'))?;
    if !cleaned[end..].starts_with(':') {
        return None;
    }
    Some(cleaned[..end].to_ascii_lowercase())
}

/// Links may be web, mail or relative
fn is_safe_link_url(url: &str) -> bool {
    if url.trim().is_empty() {
        return false;
    }
    match url_scheme(url) {
        Some(scheme) => matches!(scheme.as_str(), "http" | "https" | "mailto"),
        None => true,
    }
}

/// Images must be absolute web URLs
fn is_safe_image_url(url: &str) -> bool {
    matches!(url_scheme(url).as_deref(), Some("http" | "https"))
}

fn is_class_name(label: &str) -> bool {
    !label.is_empty()
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Map a UTF-16 code unit offset to a byte offset, clamped to the text and
/// rounded up to the next char boundary.
fn utf16_to_byte(text: &str, offset: usize) -> usize {
    let mut units = 0;
    for (byte, c) in text.char_indices() {
        if units >= offset {
            return byte;
        }
        units += c.len_utf16();
    }
    text.len()
}
