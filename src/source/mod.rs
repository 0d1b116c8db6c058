//! Content sources - remote or in-memory document stores
//!
//! A source answers three questions: "give me the first page of documents of
//! this type", "give me the document with this uid" and "give me the page
//! behind this cursor". Cursors are opaque: whatever the source returned as
//! `next_page` is handed back verbatim.

mod error;
pub mod memory;
pub mod prismic;

use serde::{Deserialize, Serialize};

use crate::content::RawDocument;

pub use error::SourceError;
pub use memory::MemorySource;
pub use prismic::PrismicClient;

/// Largest page size the content API accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Sort direction for a query ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

/// A single query ordering, e.g. `document.last_publication_date desc`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ordering {
    pub field: String,
    pub direction: Direction,
}

/// Options for a by-type query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Field paths to fetch (`posts.title`); empty fetches everything
    pub fetch: Vec<String>,
    pub page_size: u32,
    pub orderings: Option<Ordering>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            fetch: Vec::new(),
            page_size: 20,
            orderings: None,
        }
    }
}

/// One page of query results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPage {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub results_per_page: u32,
    #[serde(default)]
    pub total_results_size: u32,
    #[serde(default)]
    pub total_pages: u32,
    /// Opaque cursor for the next page; `None` on the last page
    #[serde(default)]
    pub next_page: Option<String>,
    #[serde(default)]
    pub results: Vec<RawDocument>,
}

fn first_page() -> u32 {
    1
}

/// A remote (or fake) document store
pub trait ContentSource: Send + Sync {
    /// First page of documents of a content type
    fn get_by_type(
        &self,
        doc_type: &str,
        options: &QueryOptions,
    ) -> Result<DocumentPage, SourceError>;

    /// A single document by uid
    fn get_by_uid(&self, doc_type: &str, uid: &str) -> Result<RawDocument, SourceError>;

    /// The page behind a cursor previously returned as `next_page`
    fn fetch_page(&self, cursor: &str) -> Result<DocumentPage, SourceError>;

    /// Every document of a content type, following cursors until exhausted
    fn get_all_by_type(
        &self,
        doc_type: &str,
        options: &QueryOptions,
    ) -> Result<Vec<RawDocument>, SourceError> {
        let mut page = self.get_by_type(doc_type, options)?;
        let mut documents = std::mem::take(&mut page.results);

        while let Some(cursor) = page.next_page.take() {
            page = self.fetch_page(&cursor)?;
            if page.results.is_empty() {
                break;
            }
            documents.append(&mut page.results);
        }

        tracing::debug!("Fetched {} `{}` documents", documents.len(), doc_type);
        Ok(documents)
    }
}

/// Check that a uid is safe to embed in a query and in an output path.
///
/// Document uids are slugs: ASCII letters, digits, `-`, `_` and `.`, never
/// starting with a dot.
pub fn validate_uid(uid: &str) -> Result<(), SourceError> {
    let valid = !uid.is_empty()
        && !uid.starts_with('.')
        && uid
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(SourceError::InvalidUid(uid.to_string()))
    }
}
