//! Document normalization: raw API documents to canonical posts
//!
//! Text fields are flattened here and nowhere else. A field that cannot be
//! flattened (empty run sequence, missing value) becomes an empty string and
//! is reported in [`Normalized::issues`]; normalization itself never fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::raw::{RawDocument, RichTextNode, TextField};

/// A post as shown in listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub uid: String,
    pub first_publication_date: Option<DateTime<Utc>>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    /// Preformatted date, only set when dates are formatted at fetch time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_date: Option<String>,
}

/// Banner image of a post
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Banner {
    pub url: String,
    pub alt: Option<String>,
}

/// A heading plus its rich-text body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub heading: String,
    pub body: Vec<RichTextNode>,
}

/// A post with everything its own page needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub banner: Banner,
    pub content: Vec<ContentBlock>,
}

/// A recoverable normalization problem
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    #[error("field `{field}` is an empty rich-text sequence")]
    EmptyRuns { field: String },

    #[error("field `{field}` is missing")]
    Missing { field: String },

    #[error("document `{id}` has no uid")]
    MissingUid { id: String },

    #[error("post `{uid}` has no banner image")]
    MissingBanner { uid: String },
}

/// A normalized value plus whatever had to be papered over to produce it
#[derive(Debug, Clone)]
pub struct Normalized<T> {
    pub value: T,
    pub issues: Vec<NormalizeError>,
}

impl<T> Normalized<T> {
    #[cfg(test)]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Log every issue and return the value
    pub fn into_logged(self, context: &str) -> T {
        for issue in &self.issues {
            tracing::warn!("{}: {}", context, issue);
        }
        self.value
    }
}

/// Flatten one text field, recording why it came out empty
fn flatten(field: &TextField, name: &str, issues: &mut Vec<NormalizeError>) -> String {
    match field {
        TextField::Plain(s) => s.clone(),
        TextField::Runs(runs) => match runs.first() {
            Some(run) => run.text.clone(),
            None => {
                issues.push(NormalizeError::EmptyRuns {
                    field: name.to_string(),
                });
                String::new()
            }
        },
        TextField::Missing => {
            issues.push(NormalizeError::Missing {
                field: name.to_string(),
            });
            String::new()
        }
    }
}

fn post_fields(raw: &RawDocument, issues: &mut Vec<NormalizeError>) -> Post {
    let uid = match &raw.uid {
        Some(uid) if !uid.is_empty() => uid.clone(),
        _ => {
            issues.push(NormalizeError::MissingUid { id: raw.id.clone() });
            String::new()
        }
    };

    Post {
        uid,
        first_publication_date: raw.first_publication_date,
        title: flatten(&raw.data.title, "title", issues),
        subtitle: flatten(&raw.data.subtitle, "subtitle", issues),
        author: flatten(&raw.data.author, "author", issues),
        display_date: None,
    }
}

/// Normalize a document into a listing post
pub fn normalize_post(raw: &RawDocument) -> Normalized<Post> {
    let mut issues = Vec::new();
    let value = post_fields(raw, &mut issues);
    Normalized { value, issues }
}

/// Normalize a document into a full post, keeping block bodies verbatim
pub fn normalize_detail(raw: &RawDocument) -> Normalized<PostDetail> {
    let mut issues = Vec::new();
    let post = post_fields(raw, &mut issues);

    let banner = match &raw.data.banner {
        Some(image) if image.url.as_deref().is_some_and(|u| !u.is_empty()) => Banner {
            url: image.url.clone().unwrap_or_default(),
            alt: image.alt.clone(),
        },
        _ => {
            issues.push(NormalizeError::MissingBanner {
                uid: post.uid.clone(),
            });
            Banner::default()
        }
    };

    let content = raw
        .data
        .content
        .iter()
        .enumerate()
        .map(|(i, block)| ContentBlock {
            heading: flatten(&block.heading, &format!("content[{}].heading", i), &mut issues),
            body: block.body.clone(),
        })
        .collect();

    Normalized {
        value: PostDetail {
            post,
            banner,
            content,
        },
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::raw::{PostData, RawContentBlock, RawImage};

    fn runs(texts: &[&str]) -> TextField {
        TextField::Runs(texts.iter().map(|t| RichTextNode::paragraph(*t)).collect())
    }

    fn document(data: PostData) -> RawDocument {
        RawDocument {
            id: "doc-1".to_string(),
            uid: Some("hello-world".to_string()),
            doc_type: "posts".to_string(),
            data,
            ..Default::default()
        }
    }

    #[test]
    fn test_plain_strings_are_kept() {
        let raw = document(PostData {
            title: TextField::Plain("Título".to_string()),
            subtitle: TextField::Plain("  spaced  ".to_string()),
            author: TextField::Plain(String::new()),
            ..Default::default()
        });

        let post = normalize_post(&raw);
        assert!(post.is_clean());
        assert_eq!(post.value.title, "Título");
        assert_eq!(post.value.subtitle, "  spaced  ");
        assert_eq!(post.value.author, "");
        assert_eq!(post.value.uid, "hello-world");
    }

    #[test]
    fn test_first_run_wins() {
        let raw = document(PostData {
            title: runs(&["first", "second"]),
            subtitle: runs(&["sub"]),
            author: runs(&["Danilo"]),
            ..Default::default()
        });

        let post = normalize_post(&raw).value;
        assert_eq!(post.title, "first");
        assert_eq!(post.subtitle, "sub");
        assert_eq!(post.author, "Danilo");
    }

    #[test]
    fn test_empty_runs_degrade_to_empty_string() {
        let raw = document(PostData {
            title: runs(&[]),
            subtitle: TextField::Plain("ok".to_string()),
            author: TextField::Missing,
            ..Default::default()
        });

        let post = normalize_post(&raw);
        assert_eq!(post.value.title, "");
        assert_eq!(post.value.author, "");
        assert_eq!(
            post.issues,
            vec![
                NormalizeError::EmptyRuns {
                    field: "title".to_string()
                },
                NormalizeError::Missing {
                    field: "author".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_missing_uid_is_reported() {
        let mut raw = document(PostData {
            title: TextField::Plain("t".to_string()),
            subtitle: TextField::Plain("s".to_string()),
            author: TextField::Plain("a".to_string()),
            ..Default::default()
        });
        raw.uid = None;

        let post = normalize_post(&raw);
        assert_eq!(post.value.uid, "");
        assert_eq!(
            post.issues,
            vec![NormalizeError::MissingUid {
                id: "doc-1".to_string()
            }]
        );
    }

    #[test]
    fn test_detail_keeps_bodies_and_flattens_headings() {
        let body = vec![RichTextNode::paragraph("one two three")];
        let raw = document(PostData {
            title: TextField::Plain("t".to_string()),
            subtitle: TextField::Plain("s".to_string()),
            author: TextField::Plain("a".to_string()),
            banner: Some(RawImage {
                url: Some("https://images.prismic.io/banner.png".to_string()),
                alt: None,
            }),
            content: vec![
                RawContentBlock {
                    heading: TextField::Plain("Intro".to_string()),
                    body: body.clone(),
                },
                RawContentBlock {
                    heading: runs(&["Second"]),
                    body: Vec::new(),
                },
            ],
        });

        let detail = normalize_detail(&raw);
        assert!(detail.is_clean());
        let detail = detail.value;
        assert_eq!(detail.banner.url, "https://images.prismic.io/banner.png");
        assert_eq!(detail.content[0].heading, "Intro");
        assert_eq!(detail.content[0].body, body);
        assert_eq!(detail.content[1].heading, "Second");
    }

    #[test]
    fn test_detail_reports_block_and_banner_issues() {
        let raw = document(PostData {
            title: TextField::Plain("t".to_string()),
            subtitle: TextField::Plain("s".to_string()),
            author: TextField::Plain("a".to_string()),
            banner: Some(RawImage::default()),
            content: vec![RawContentBlock {
                heading: runs(&[]),
                body: Vec::new(),
            }],
        });

        let detail = normalize_detail(&raw);
        assert_eq!(detail.value.banner, Banner::default());
        assert_eq!(detail.issues.len(), 2);
        assert!(detail.issues.contains(&NormalizeError::EmptyRuns {
            field: "content[0].heading".to_string()
        }));
    }
}
