//! In-memory content source
//!
//! Serves a fixed set of documents with the same paging contract as the
//! remote API. Used for offline previews (`--fixtures`) and in tests.

use std::fs;
use std::path::Path;

use super::{
    validate_uid, ContentSource, Direction, DocumentPage, Ordering, QueryOptions, SourceError,
};
use crate::content::RawDocument;

const CURSOR_SCHEME: &str = "memory://";

/// A content source backed by a vector of documents
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    documents: Vec<RawDocument>,
}

impl MemorySource {
    pub fn new(documents: Vec<RawDocument>) -> Self {
        Self { documents }
    }

    /// Load documents from a JSON file holding either an array of documents
    /// or a search response (`{"results": [...]}`).
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let content = fs::read_to_string(path.as_ref())?;
        let value: serde_json::Value = serde_json::from_str(&content)?;

        let documents: Vec<RawDocument> = if value.is_array() {
            serde_json::from_value(value)?
        } else {
            serde_json::from_value::<DocumentPage>(value)?.results
        };

        tracing::info!(
            "Loaded {} fixture documents from {:?}",
            documents.len(),
            path.as_ref()
        );
        Ok(Self::new(documents))
    }

    pub fn documents(&self) -> &[RawDocument] {
        &self.documents
    }

    fn query(
        &self,
        doc_type: &str,
        page: u32,
        page_size: u32,
        ordering: Option<&Ordering>,
    ) -> DocumentPage {
        let page_size = page_size.max(1);
        let mut matching: Vec<&RawDocument> = self
            .documents
            .iter()
            .filter(|d| d.doc_type == doc_type)
            .collect();

        if let Some(ordering) = ordering {
            let key = |d: &RawDocument| match ordering.field.as_str() {
                "document.first_publication_date" => d.first_publication_date,
                "document.last_publication_date" => d.last_publication_date,
                _ => None,
            };
            matching.sort_by(|a, b| match ordering.direction {
                Direction::Asc => key(*a).cmp(&key(*b)),
                Direction::Desc => key(*b).cmp(&key(*a)),
            });
        }

        let total = matching.len() as u32;
        let total_pages = total.div_ceil(page_size);
        let start = (page.saturating_sub(1) as usize).saturating_mul(page_size as usize);
        let results: Vec<RawDocument> = matching
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .collect();

        let next_page = if page < total_pages {
            Some(encode_cursor(doc_type, page + 1, page_size, ordering))
        } else {
            None
        };

        DocumentPage {
            page,
            results_per_page: page_size,
            total_results_size: total,
            total_pages,
            next_page,
            results,
        }
    }
}

impl ContentSource for MemorySource {
    fn get_by_type(
        &self,
        doc_type: &str,
        options: &QueryOptions,
    ) -> Result<DocumentPage, SourceError> {
        Ok(self.query(
            doc_type,
            1,
            options.page_size,
            options.orderings.as_ref(),
        ))
    }

    fn get_by_uid(&self, doc_type: &str, uid: &str) -> Result<RawDocument, SourceError> {
        validate_uid(uid)?;
        self.documents
            .iter()
            .find(|d| d.doc_type == doc_type && d.uid.as_deref() == Some(uid))
            .cloned()
            .ok_or_else(|| SourceError::NotFound {
                doc_type: doc_type.to_owned(),
                uid: uid.to_owned(),
            })
    }

    fn fetch_page(&self, cursor: &str) -> Result<DocumentPage, SourceError> {
        let (doc_type, page, page_size, ordering) = decode_cursor(cursor)
            .ok_or_else(|| SourceError::ForeignCursor(cursor.to_owned()))?;
        Ok(self.query(&doc_type, page, page_size, ordering.as_ref()))
    }
}

/// `memory://<type>/<page>/<page_size>/<field>:<asc|desc>` (`-` when unordered)
fn encode_cursor(doc_type: &str, page: u32, page_size: u32, ordering: Option<&Ordering>) -> String {
    let order = match ordering {
        Some(o) => format!(
            "{}:{}",
            o.field,
            match o.direction {
                Direction::Asc => "asc",
                Direction::Desc => "desc",
            }
        ),
        None => "-".to_owned(),
    };
    format!("{CURSOR_SCHEME}{doc_type}/{page}/{page_size}/{order}")
}

fn decode_cursor(cursor: &str) -> Option<(String, u32, u32, Option<Ordering>)> {
    let rest = cursor.strip_prefix(CURSOR_SCHEME)?;
    let mut parts = rest.splitn(4, '/');
    let doc_type = parts.next()?.to_owned();
    let page: u32 = parts.next()?.parse().ok()?;
    let page_size: u32 = parts.next()?.parse().ok()?;
    let order = parts.next()?;

    if page == 0 || page_size == 0 {
        return None;
    }

    let ordering = if order == "-" {
        None
    } else {
        let (field, direction) = order.rsplit_once(':')?;
        let direction = match direction {
            "asc" => Direction::Asc,
            "desc" => Direction::Desc,
            _ => return None,
        };
        Some(Ordering {
            field: field.to_owned(),
            direction,
        })
    };

    Some((doc_type, page, page_size, ordering))
}
