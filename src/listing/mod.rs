//! Home page listing with cursor pagination
//!
//! A [`Listing`] starts from the first page fetched at generation time and
//! grows one page per "load more" step by following the opaque `next_page`
//! cursor returned by the content source.

use crate::content::{normalize_post, Post, RawDocument};
use crate::helpers::DateFormatter;
use crate::source::{ContentSource, DocumentPage, QueryOptions, SourceError};

/// Result of a single "load more" step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No cursor left, nothing was fetched
    Exhausted,
    /// `count` posts were appended
    Appended { count: usize },
}

/// Accumulated listing state
#[derive(Debug, Clone, Default)]
pub struct Listing {
    posts: Vec<Post>,
    next_page: Option<String>,
    current_page: u32,
    last_error: Option<String>,
    /// Set when dates are stamped on posts as they are fetched
    formatter: Option<DateFormatter>,
}

impl Listing {
    /// Fetch the first page of a content type
    pub fn seed(
        source: &dyn ContentSource,
        doc_type: &str,
        options: &QueryOptions,
    ) -> Result<Self, SourceError> {
        let page = source.get_by_type(doc_type, options)?;
        tracing::debug!(
            "Seeded listing with {} of {} `{}` documents",
            page.results.len(),
            page.total_results_size,
            doc_type
        );
        Ok(Self::from_page(page))
    }

    /// Build a listing from an already fetched first page
    pub fn from_page(page: DocumentPage) -> Self {
        let mut listing = Self {
            current_page: page.page,
            next_page: page.next_page,
            ..Default::default()
        };
        listing.posts = listing.normalize_all(&page.results);
        listing
    }

    /// An empty listing positioned at `cursor`, as a page that already shows
    /// `page` pages would hold it.
    pub fn resume(cursor: impl Into<String>, page: u32) -> Self {
        Self {
            next_page: Some(cursor.into()),
            current_page: page,
            ..Default::default()
        }
    }

    /// Stamp `display_date` on every post, present and future
    pub fn format_dates_with(mut self, formatter: DateFormatter) -> Self {
        for post in &mut self.posts {
            stamp(post, &formatter);
        }
        self.formatter = Some(formatter);
        self
    }

    /// Follow the cursor once and append the page's posts.
    ///
    /// On failure the error is returned and remembered in
    /// [`Listing::last_error`]; posts, cursor and page are left as they were.
    pub fn load_next_page(
        &mut self,
        source: &dyn ContentSource,
    ) -> Result<LoadOutcome, SourceError> {
        let Some(cursor) = self.next_page.as_deref() else {
            return Ok(LoadOutcome::Exhausted);
        };

        let page = match source.fetch_page(cursor) {
            Ok(page) => page,
            Err(err) => {
                tracing::warn!("Failed to load next page: {}", err);
                self.last_error = Some(err.to_string());
                return Err(err);
            }
        };

        let mut fetched = self.normalize_all(&page.results);
        let count = fetched.len();
        self.posts.append(&mut fetched);
        self.next_page = page.next_page;
        self.current_page = page.page;
        self.last_error = None;

        tracing::debug!(
            "Loaded page {} ({} posts, more: {})",
            self.current_page,
            count,
            self.next_page.is_some()
        );
        Ok(LoadOutcome::Appended { count })
    }

    /// Keep loading until the cursor runs out or `max_pages` steps were taken
    pub fn drain(
        &mut self,
        source: &dyn ContentSource,
        max_pages: Option<usize>,
    ) -> Result<usize, SourceError> {
        let mut steps = 0;
        while self.has_more() && max_pages.map_or(true, |max| steps < max) {
            match self.load_next_page(source)? {
                LoadOutcome::Appended { count: 0 } | LoadOutcome::Exhausted => break,
                LoadOutcome::Appended { .. } => steps += 1,
            }
        }
        Ok(steps)
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn into_posts(self) -> Vec<Post> {
        self.posts
    }

    pub fn next_page(&self) -> Option<&str> {
        self.next_page.as_deref()
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn has_more(&self) -> bool {
        self.next_page.is_some()
    }

    /// Message of the last failed "load more", cleared by the next success
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn normalize_all(&self, documents: &[RawDocument]) -> Vec<Post> {
        documents
            .iter()
            .map(|doc| {
                let mut post = normalize_post(doc).into_logged(&format!("document `{}`", doc.id));
                if let Some(formatter) = &self.formatter {
                    stamp(&mut post, formatter);
                }
                post
            })
            .collect()
    }
}

fn stamp(post: &mut Post, formatter: &DateFormatter) {
    if post.display_date.is_none() {
        post.display_date = Some(formatter.display(post));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{PostData, TextField};
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    fn doc(uid: &str) -> RawDocument {
        RawDocument {
            id: format!("id-{}", uid),
            uid: Some(uid.to_string()),
            doc_type: "posts".to_string(),
            first_publication_date: Some(Utc.with_ymd_and_hms(2021, 3, 15, 12, 0, 0).unwrap()),
            data: PostData {
                title: TextField::Plain(format!("Title {}", uid)),
                subtitle: TextField::Plain("Sub".to_string()),
                author: TextField::Plain("Author".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn page(number: u32, uids: &[&str], next: Option<&str>) -> DocumentPage {
        DocumentPage {
            page: number,
            results_per_page: 1,
            total_results_size: 2,
            total_pages: 2,
            next_page: next.map(str::to_string),
            results: uids.iter().map(|u| doc(u)).collect(),
        }
    }

    /// Answers cursors from a fixed table and records every request
    struct FakeSource {
        pages: Vec<(&'static str, DocumentPage)>,
        requested: Mutex<Vec<String>>,
        fail: bool,
    }

    impl FakeSource {
        fn new(pages: Vec<(&'static str, DocumentPage)>) -> Self {
            Self {
                pages,
                requested: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(Vec::new())
            }
        }

        fn requests(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    impl ContentSource for FakeSource {
        fn get_by_type(
            &self,
            _doc_type: &str,
            _options: &QueryOptions,
        ) -> Result<DocumentPage, SourceError> {
            self.fetch_page("first")
        }

        fn get_by_uid(&self, doc_type: &str, uid: &str) -> Result<RawDocument, SourceError> {
            Err(SourceError::NotFound {
                doc_type: doc_type.to_string(),
                uid: uid.to_string(),
            })
        }

        fn fetch_page(&self, cursor: &str) -> Result<DocumentPage, SourceError> {
            self.requested.lock().unwrap().push(cursor.to_string());
            if self.fail {
                return Err(SourceError::Status {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            self.pages
                .iter()
                .find(|(c, _)| *c == cursor)
                .map(|(_, p)| p.clone())
                .ok_or_else(|| SourceError::ForeignCursor(cursor.to_string()))
        }
    }

    #[test]
    fn test_load_more_appends_and_exhausts() {
        let source = FakeSource::new(vec![
            ("first", page(1, &["a"], Some("url2"))),
            ("url2", page(2, &["b"], None)),
        ]);

        let mut listing = Listing::seed(&source, "posts", &QueryOptions::default()).unwrap();
        assert_eq!(listing.posts().len(), 1);
        assert_eq!(listing.next_page(), Some("url2"));
        assert_eq!(listing.current_page(), 1);

        let outcome = listing.load_next_page(&source).unwrap();
        assert_eq!(outcome, LoadOutcome::Appended { count: 1 });
        let uids: Vec<&str> = listing.posts().iter().map(|p| p.uid.as_str()).collect();
        assert_eq!(uids, vec!["a", "b"]);
        assert_eq!(listing.next_page(), None);
        assert_eq!(listing.current_page(), 2);
        assert!(!listing.has_more());

        // The cursor is passed through untouched
        assert_eq!(source.requests(), vec!["first", "url2"]);
    }

    #[test]
    fn test_exhausted_listing_is_a_no_op() {
        let source = FakeSource::new(Vec::new());
        let mut listing = Listing::from_page(page(1, &["a"], None));

        assert_eq!(listing.load_next_page(&source).unwrap(), LoadOutcome::Exhausted);
        assert_eq!(listing.posts().len(), 1);
        assert_eq!(listing.current_page(), 1);
        assert!(source.requests().is_empty());
    }

    #[test]
    fn test_failure_leaves_state_untouched() {
        let source = FakeSource::failing();
        let mut listing = Listing::from_page(page(1, &["a"], Some("url2")));
        let before = listing.posts().to_vec();

        assert!(listing.load_next_page(&source).is_err());
        assert_eq!(listing.posts(), before.as_slice());
        assert_eq!(listing.next_page(), Some("url2"));
        assert_eq!(listing.current_page(), 1);
        assert!(listing.last_error().is_some_and(|e| e.contains("500")));
    }

    #[test]
    fn test_appending_keeps_existing_prefix() {
        let source = FakeSource::new(vec![("next", page(2, &["c", "d", "e"], None))]);
        let mut listing = Listing::from_page(page(1, &["a", "b"], Some("next")));
        let prefix = listing.posts().to_vec();

        let outcome = listing.load_next_page(&source).unwrap();
        assert_eq!(outcome, LoadOutcome::Appended { count: 3 });
        assert_eq!(listing.posts().len(), prefix.len() + 3);
        assert_eq!(&listing.posts()[..prefix.len()], prefix.as_slice());
    }

    #[test]
    fn test_resume_and_drain() {
        let source = FakeSource::new(vec![
            ("p2", page(2, &["b"], Some("p3"))),
            ("p3", page(3, &["c"], None)),
        ]);
        let mut listing = Listing::resume("p2", 1);
        assert!(listing.posts().is_empty());

        let steps = listing.drain(&source, None).unwrap();
        assert_eq!(steps, 2);
        assert_eq!(listing.current_page(), 3);
        assert_eq!(listing.into_posts().len(), 2);
    }

    #[test]
    fn test_drain_respects_limit() {
        let source = FakeSource::new(vec![
            ("p2", page(2, &["b"], Some("p3"))),
            ("p3", page(3, &["c"], None)),
        ]);
        let mut listing = Listing::resume("p2", 1);
        assert_eq!(listing.drain(&source, Some(1)).unwrap(), 1);
        assert_eq!(listing.next_page(), Some("p3"));
    }

    #[test]
    fn test_fetch_stage_stamps_dates() {
        let formatter = DateFormatter::new("dd MMM yyyy", "pt_BR", "America/Sao_Paulo").unwrap();
        let source = FakeSource::new(vec![("next", page(2, &["b"], None))]);
        let mut listing =
            Listing::from_page(page(1, &["a"], Some("next"))).format_dates_with(formatter);
        listing.load_next_page(&source).unwrap();

        for post in listing.posts() {
            assert_eq!(post.display_date.as_deref(), Some("15 mar 2021"));
        }
    }

    #[test]
    fn test_render_stage_keeps_model_unformatted() {
        let listing = Listing::from_page(page(1, &["a"], None));
        assert!(listing.posts()[0].display_date.is_none());
        assert!(listing.posts()[0].first_publication_date.is_some());
    }
}
