//! Post pages: loading a post by slug and preparing it for its template

use serde::Serialize;

use crate::content::{normalize_detail, normalize_post, PostDetail, ReadingTime};
use crate::helpers::{date_xml, DateFormatter};
use crate::richtext::{HtmlSerializer, RichTextRenderer};
use crate::source::{ContentSource, QueryOptions, SourceError, MAX_PAGE_SIZE};

/// A content block with its body already rendered to HTML
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedBlock {
    pub heading: String,
    pub html: String,
}

/// Everything the post template shows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostPage {
    pub uid: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    /// Display date, e.g. `15 mar 2024`
    pub date: String,
    /// Machine readable date for `<time datetime>`
    pub datetime: String,
    pub banner_url: String,
    pub banner_alt: String,
    /// Minutes, rounded up
    pub reading_time: usize,
    pub blocks: Vec<RenderedBlock>,
}

/// Fetch a post by slug and normalize it
pub fn load_post(
    source: &dyn ContentSource,
    doc_type: &str,
    slug: &str,
) -> Result<PostDetail, SourceError> {
    let raw = source.get_by_uid(doc_type, slug)?;
    Ok(normalize_detail(&raw).into_logged(&format!("post `{}`", slug)))
}

/// Every slug of a content type, across all pages
pub fn known_slugs(source: &dyn ContentSource, doc_type: &str) -> Result<Vec<String>, SourceError> {
    let options = QueryOptions {
        page_size: MAX_PAGE_SIZE,
        ..Default::default()
    };

    let slugs = source
        .get_all_by_type(doc_type, &options)?
        .iter()
        .filter_map(|doc| {
            let post = normalize_post(doc);
            if post.value.uid.is_empty() {
                tracing::warn!("Skipping document `{}` without uid", doc.id);
                None
            } else {
                Some(post.value.uid)
            }
        })
        .collect();
    Ok(slugs)
}

/// Turns a [`PostDetail`] into a [`PostPage`]
pub struct DetailRenderer {
    renderer: Box<dyn RichTextRenderer>,
    reading: ReadingTime,
}

impl Default for DetailRenderer {
    fn default() -> Self {
        Self::new(Box::new(HtmlSerializer::new()), ReadingTime::default())
    }
}

impl DetailRenderer {
    pub fn new(renderer: Box<dyn RichTextRenderer>, reading: ReadingTime) -> Self {
        Self { renderer, reading }
    }

    pub fn present(&self, detail: &PostDetail, dates: &DateFormatter) -> PostPage {
        let post = &detail.post;
        let blocks = detail
            .content
            .iter()
            .map(|block| RenderedBlock {
                heading: block.heading.clone(),
                html: self.renderer.as_html(&block.body),
            })
            .collect();

        PostPage {
            uid: post.uid.clone(),
            title: post.title.clone(),
            subtitle: post.subtitle.clone(),
            author: post.author.clone(),
            date: dates.display(post),
            datetime: post
                .first_publication_date
                .as_ref()
                .map(date_xml)
                .unwrap_or_default(),
            banner_url: detail.banner.url.clone(),
            banner_alt: detail
                .banner
                .alt
                .clone()
                .unwrap_or_else(|| post.title.clone()),
            reading_time: self.reading.estimate(&detail.content),
            blocks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{PostData, RawContentBlock, RawDocument, RawImage, RichTextNode, TextField};
    use crate::source::MemorySource;
    use chrono::{TimeZone, Utc};

    fn post_document(uid: Option<&str>, words: usize) -> RawDocument {
        let body = vec!["palavra"; words].join(" ");
        RawDocument {
            id: format!("id-{}", uid.unwrap_or("none")),
            uid: uid.map(str::to_string),
            doc_type: "posts".to_string(),
            first_publication_date: Some(Utc.with_ymd_and_hms(2021, 3, 25, 19, 25, 28).unwrap()),
            data: PostData {
                title: TextField::Plain("Como utilizar Hooks".to_string()),
                subtitle: TextField::Plain("Pensando em sincronização".to_string()),
                author: TextField::Plain("Joseph Oliveira".to_string()),
                banner: Some(RawImage {
                    url: Some("https://images.prismic.io/banner.png".to_string()),
                    alt: None,
                }),
                content: vec![RawContentBlock {
                    heading: TextField::Plain("Intro".to_string()),
                    body: vec![RichTextNode::paragraph(body)],
                }],
            },
            ..Default::default()
        }
    }

    fn formatter() -> DateFormatter {
        DateFormatter::new("dd MMM yyyy", "pt_BR", "America/Sao_Paulo").unwrap()
    }

    #[test]
    fn test_load_and_present_post() {
        let source = MemorySource::new(vec![post_document(Some("como-utilizar-hooks"), 399)]);
        let detail = load_post(&source, "posts", "como-utilizar-hooks").unwrap();
        let page = DetailRenderer::default().present(&detail, &formatter());

        assert_eq!(page.title, "Como utilizar Hooks");
        assert_eq!(page.date, "25 mar 2021");
        assert_eq!(page.datetime, "2021-03-25T19:25:28+00:00");
        assert_eq!(page.banner_alt, "Como utilizar Hooks");
        // 1 heading word + 399 body words
        assert_eq!(page.reading_time, 2);
        assert_eq!(page.blocks.len(), 1);
        assert_eq!(page.blocks[0].heading, "Intro");
        assert!(page.blocks[0].html.starts_with("<p>palavra palavra"));
    }

    #[test]
    fn test_unknown_slug_is_not_found() {
        let source = MemorySource::new(vec![post_document(Some("a"), 1)]);
        let err = load_post(&source, "posts", "missing").unwrap_err();
        assert!(err.is_missing());
    }

    #[test]
    fn test_known_slugs_skip_documents_without_uid() {
        let source = MemorySource::new(vec![
            post_document(Some("a"), 1),
            post_document(None, 1),
            post_document(Some("b"), 1),
        ]);
        let mut slugs = known_slugs(&source, "posts").unwrap();
        slugs.sort();
        assert_eq!(slugs, vec!["a", "b"]);
    }

    struct Plain;

    impl RichTextRenderer for Plain {
        fn as_html(&self, nodes: &[RichTextNode]) -> String {
            nodes.iter().map(|n| n.text.as_str()).collect::<Vec<_>>().join("|")
        }
    }

    #[test]
    fn test_renderer_is_pluggable() {
        let source = MemorySource::new(vec![post_document(Some("a"), 2)]);
        let detail = load_post(&source, "posts", "a").unwrap();
        let renderer = DetailRenderer::new(Box::new(Plain), ReadingTime::new(1));
        let page = renderer.present(&detail, &formatter());
        assert_eq!(page.blocks[0].html, "palavra palavra");
        assert_eq!(page.reading_time, 3);
    }
}
