use http::{HeaderMap, StatusCode};

/// A completed HTTP reply
///
/// Any reply that reaches the caller is carried verbatim, including non-2xx
/// statuses; interpreting application-level errors in the body is left to
/// the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    /// The status code of the reply
    pub status: StatusCode,
    /// The reply headers
    pub headers: HeaderMap,
    /// The reply body, as text
    pub body: String,
}

impl HttpResponse {
    /// Constructs a response with no headers
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Replaces the response headers
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Whether the status code is in the 2xx range
    #[inline]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
