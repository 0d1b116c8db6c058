//! Raw documents as returned by the content API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A text field the CMS may encode either as a plain string or as a
/// sequence of rich-text runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextField {
    Plain(String),
    Runs(Vec<RichTextNode>),
    /// `null` or absent
    #[default]
    Missing,
}

impl TextField {
    /// The flat text: the string itself, or the first run's text
    pub fn first_text(&self) -> Option<&str> {
        match self {
            TextField::Plain(s) => Some(s),
            TextField::Runs(runs) => runs.first().map(|r| r.text.as_str()),
            TextField::Missing => None,
        }
    }
}

/// A structured-text node: a paragraph, heading, list item, image or embed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichTextNode {
    #[serde(rename = "type", default = "default_node_type")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub spans: Vec<Span>,
    /// Image source (image nodes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    /// Provider payload (embed nodes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oembed: Option<Embed>,
}

impl RichTextNode {
    /// A paragraph node with no formatting
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self {
            kind: default_node_type(),
            text: text.into(),
            spans: Vec::new(),
            url: None,
            alt: None,
            oembed: None,
        }
    }
}

fn default_node_type() -> String {
    "paragraph".to_string()
}

/// Inline formatting over a range of a node's text.
///
/// `start`/`end` are UTF-16 code unit offsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SpanData>,
}

/// Payload of `hyperlink` and `label` spans
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Target document uid for links to other documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// oEmbed payload of an embed node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
}

/// A document as returned by the API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(rename = "type", default)]
    pub doc_type: String,
    #[serde(default, with = "timestamp")]
    pub first_publication_date: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub last_publication_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: PostData,
}

/// The custom fields of a post document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostData {
    #[serde(default)]
    pub title: TextField,
    #[serde(default)]
    pub subtitle: TextField,
    #[serde(default)]
    pub author: TextField,
    #[serde(default)]
    pub banner: Option<RawImage>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: Vec<RawContentBlock>,
}

/// Image field; an unset image arrives as `{}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawImage {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub alt: Option<String>,
}

/// One entry of the `content` group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawContentBlock {
    #[serde(default)]
    pub heading: TextField,
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: Vec<RichTextNode>,
}

/// Treat an explicit `null` like an absent field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse a publication timestamp.
///
/// The API emits `2021-03-25T19:25:28+0000`, which is not RFC 3339 because of
/// the colon-less offset; both forms are accepted.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    let formats = ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z"];
    formats
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Serde adapter for optional API timestamps
mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => super::parse_timestamp(&s)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid timestamp `{}`", s))),
        }
    }
}
