//! Prismic REST API (v2) client.
//!
//! Provides a sync HTTP client for the documents search endpoint. Every
//! query first resolves the repository's master ref from the API root so
//! that newly published content is visible to long-running processes.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use ureq::typestate::WithoutBody;
use ureq::{Agent, RequestBuilder};

use super::{ContentSource, Direction, DocumentPage, QueryOptions, SourceError};
use crate::config::PrismicConfig;
use crate::content::RawDocument;

/// Default HTTP timeout in seconds.
pub const DEFAULT_TIMEOUT: u64 = 30;

/// API root response, only the parts we need.
#[derive(Debug, Deserialize)]
struct ApiRoot {
    #[serde(default)]
    refs: Vec<ApiRef>,
}

#[derive(Debug, Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(rename = "isMasterRef", default)]
    is_master_ref: bool,
}

/// Prismic content API client.
pub struct PrismicClient {
    agent: Agent,
    endpoint: String,
    access_token: Option<String>,
}

impl PrismicClient {
    /// Create a client for an API endpoint such as
    /// `https://my-repo.cdn.prismic.io/api/v2`.
    pub fn new(endpoint: &str, access_token: Option<&str>, timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            access_token: access_token
                .filter(|t| !t.is_empty())
                .map(ToOwned::to_owned),
        }
    }

    /// Create client from config values.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::NotConfigured`] when no endpoint is set.
    pub fn from_config(config: &PrismicConfig) -> Result<Self, SourceError> {
        if config.endpoint.trim().is_empty() {
            return Err(SourceError::NotConfigured(
                "set prismic.endpoint in _config.yml or PRISMIC_ENDPOINT".to_owned(),
            ));
        }
        let timeout = if config.timeout == 0 {
            DEFAULT_TIMEOUT
        } else {
            config.timeout
        };
        Ok(Self::new(
            &config.endpoint,
            config.access_token.as_deref(),
            Duration::from_secs(timeout),
        ))
    }

    /// Get the API endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether a cursor points back at this repository.
    fn owns_cursor(&self, cursor: &str) -> bool {
        cursor
            .strip_prefix(&self.endpoint)
            .is_some_and(|rest| rest.starts_with('/') || rest.starts_with('?'))
    }

    /// Resolve the current master ref.
    fn master_ref(&self) -> Result<String, SourceError> {
        let request = self.authorize(self.agent.get(self.endpoint.as_str()));
        let root: ApiRoot = self.call_json(request)?;
        root.refs
            .into_iter()
            .find(|r| r.is_master_ref)
            .map(|r| r.reference)
            .ok_or(SourceError::MissingRef)
    }

    fn authorize(&self, request: RequestBuilder<WithoutBody>) -> RequestBuilder<WithoutBody> {
        match &self.access_token {
            Some(token) => request.query("access_token", token),
            None => request,
        }
    }

    fn search(&self, params: &[(&str, String)]) -> Result<DocumentPage, SourceError> {
        let reference = self.master_ref()?;
        let url = format!("{}/documents/search", self.endpoint);

        let mut request = self.agent.get(url.as_str()).query("ref", &reference);
        for (key, value) in params {
            request = request.query(key, value);
        }

        self.call_json(self.authorize(request))
    }

    fn call_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder<WithoutBody>,
    ) -> Result<T, SourceError> {
        let response = request.header("Accept", "application/json").call()?;

        let status = response.status().as_u16();
        let mut body_reader = response.into_body();

        if status >= 400 {
            let error_body = body_reader
                .read_to_string()
                .unwrap_or_else(|_| "(unable to read error body)".to_owned());
            return Err(SourceError::Status {
                status,
                body: error_body,
            });
        }

        Ok(body_reader.read_json()?)
    }
}

impl ContentSource for PrismicClient {
    fn get_by_type(
        &self,
        doc_type: &str,
        options: &QueryOptions,
    ) -> Result<DocumentPage, SourceError> {
        tracing::debug!("Querying `{}` documents (pageSize={})", doc_type, options.page_size);

        let mut params = vec![
            ("q", type_predicate(doc_type)),
            ("pageSize", options.page_size.to_string()),
        ];
        if !options.fetch.is_empty() {
            params.push(("fetch", options.fetch.join(",")));
        }
        if let Some(ordering) = &options.orderings {
            let direction = match ordering.direction {
                Direction::Asc => "",
                Direction::Desc => " desc",
            };
            params.push(("orderings", format!("[{}{}]", ordering.field, direction)));
        }

        let page = self.search(&params)?;
        tracing::debug!(
            "Got {} of {} `{}` documents",
            page.results.len(),
            page.total_results_size,
            doc_type
        );
        Ok(page)
    }

    fn get_by_uid(&self, doc_type: &str, uid: &str) -> Result<RawDocument, SourceError> {
        super::validate_uid(uid)?;
        tracing::debug!("Fetching `{}` document {}", doc_type, uid);

        let params = [
            ("q", format!("[[at(my.{}.uid,\"{}\")]]", doc_type, uid)),
            ("pageSize", "1".to_owned()),
        ];
        let page = self.search(&params)?;

        page.results
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::NotFound {
                doc_type: doc_type.to_owned(),
                uid: uid.to_owned(),
            })
    }

    fn fetch_page(&self, cursor: &str) -> Result<DocumentPage, SourceError> {
        if !self.owns_cursor(cursor) {
            return Err(SourceError::ForeignCursor(cursor.to_owned()));
        }
        tracing::debug!("Following cursor {}", cursor);

        let request = self.agent.get(cursor);
        let request = if cursor.contains("access_token=") {
            request
        } else {
            self.authorize(request)
        };
        self.call_json(request)
    }
}

fn type_predicate(doc_type: &str) -> String {
    format!("[[at(document.type,\"{}\")]]", doc_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> PrismicClient {
        PrismicClient::new(
            "https://spacetraveling.cdn.prismic.io/api/v2/",
            Some("token"),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn test_endpoint_is_normalized() {
        assert_eq!(
            client().endpoint(),
            "https://spacetraveling.cdn.prismic.io/api/v2"
        );
    }

    #[test]
    fn test_owns_cursor() {
        let client = client();
        assert!(client.owns_cursor(
            "https://spacetraveling.cdn.prismic.io/api/v2/documents/search?ref=X&page=2"
        ));
        assert!(!client.owns_cursor("https://evil.example/api/v2/documents/search"));
        assert!(!client.owns_cursor(
            "https://spacetraveling.cdn.prismic.io/api/v2.evil.example/documents"
        ));
    }

    #[test]
    fn test_foreign_cursor_is_rejected_without_network() {
        let err = client()
            .fetch_page("http://169.254.169.254/latest/meta-data")
            .unwrap_err();
        assert!(matches!(err, SourceError::ForeignCursor(_)));
    }

    #[test]
    fn test_invalid_uid_is_rejected_without_network() {
        let err = client().get_by_uid("posts", "x\")]] [[any").unwrap_err();
        assert!(matches!(err, SourceError::InvalidUid(_)));
    }

    #[test]
    fn test_from_config_requires_endpoint() {
        let config = PrismicConfig::default();
        assert!(matches!(
            PrismicClient::from_config(&config),
            Err(SourceError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_type_predicate() {
        assert_eq!(type_predicate("posts"), r#"[[at(document.type,"posts")]]"#);
    }

    #[test]
    fn test_parse_api_root() {
        let json = r#"{"refs":[{"id":"preview","ref":"P1","isMasterRef":false},{"id":"master","ref":"M1","isMasterRef":true}]}"#;
        let root: ApiRoot = serde_json::from_str(json).unwrap();
        let master = root.refs.into_iter().find(|r| r.is_master_ref).unwrap();
        assert_eq!(master.reference, "M1");
    }
}
