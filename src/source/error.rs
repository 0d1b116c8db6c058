//! Error types for content sources.

/// Error from a content source query.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed (network error, timeout, etc).
    #[error("HTTP request failed: {0}")]
    Http(#[from] ureq::Error),

    /// HTTP response error (server returned error status).
    #[error("HTTP error: {status} - {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (may contain error details).
        body: String,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// No document of the given type carries the requested uid.
    #[error("no `{doc_type}` document with uid `{uid}`")]
    NotFound {
        /// Content type that was queried.
        doc_type: String,
        /// Requested uid.
        uid: String,
    },

    /// The uid contains characters a document uid can never have.
    #[error("invalid uid `{0}`")]
    InvalidUid(String),

    /// A next-page cursor that was not issued by this source.
    #[error("cursor does not belong to this content source: {0}")]
    ForeignCursor(String),

    /// The API root did not advertise a master ref.
    #[error("content API exposes no master ref")]
    MissingRef,

    /// The source cannot be built from the current configuration.
    #[error("content source is not configured: {0}")]
    NotConfigured(String),
}

impl SourceError {
    /// Whether the error means "this document does not exist" rather than
    /// "the source could not be reached".
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::InvalidUid(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_keeps_cause() {
        let err = SourceError::from(ureq::Error::ConnectionFailed);
        assert_eq!(
            err.to_string(),
            format!("HTTP request failed: {}", ureq::Error::ConnectionFailed)
        );
    }
}
