use http::HeaderMap;
use url::Url;

use crate::{
    retry::{Outcome, RequestError, RetryPolicy},
    HttpRequest, HttpResponse, HttpTransport, Parameters,
};

/// Builds wire requests and drives them through a bounded retry policy
///
/// The pipeline holds no per-call state; concurrent calls each run their own
/// retry loop. Callers only ever observe a reply, a
/// [`RetryExhausted`](RequestError::RetryExhausted) error, or a
/// [`Fatal`](RequestError::Fatal) error, never an intermediate attempt.
#[derive(Clone, Debug)]
pub struct HttpRequestPipeline<T> {
    transport: T,
    retry_policy: RetryPolicy,
}

impl<T> HttpRequestPipeline<T> {
    /// Constructs a pipeline over `transport` with the default retry policy
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// The underlying transport
    #[inline]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The retry policy in use
    #[inline]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }
}

impl<T: HttpTransport> HttpRequestPipeline<T> {
    /// Sends a `GET` request with optional query parameters and headers
    pub async fn send_get(
        &self,
        uri: Url,
        query: Option<&Parameters>,
        headers: Option<&HeaderMap>,
    ) -> Result<HttpResponse, RequestError> {
        self.send(HttpRequest::get(uri, query, headers)).await
    }

    /// Sends a `POST` request with optional query parameters, form-encoded
    /// body parameters and headers
    pub async fn send_post(
        &self,
        uri: Url,
        query: Option<&Parameters>,
        body: Option<&Parameters>,
        headers: Option<&HeaderMap>,
    ) -> Result<HttpResponse, RequestError> {
        self.send(HttpRequest::post(uri, query, body, headers)).await
    }

    /// Sends an already built request
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, RequestError> {
        self.execute(&request).await.into_result()
    }

    /// Sends an already built request, returning the tagged outcome
    #[tracing::instrument(
        skip(self, request),
        fields(
            http.method = %request.method(),
            http.url = %request.url(),
            http.status_code = tracing::field::Empty,
        ),
    )]
    pub async fn execute(&self, request: &HttpRequest) -> Outcome {
        let outcome = self
            .retry_policy
            .run(|attempt| {
                tracing::trace!(attempt, "sending request");
                self.transport.send(request)
            })
            .await;

        match &outcome {
            Outcome::Success(response) => {
                tracing::Span::current().record("http.status_code", response.status.as_u16());
                tracing::debug!("received reply");
            }
            Outcome::RetryExhausted { attempts, .. } => {
                tracing::warn!(attempts, "request failed after exhausting retries");
            }
            Outcome::Fatal(error) => {
                tracing::warn!(
                    error = (error as &dyn std::error::Error),
                    "request failed fatally"
                );
            }
        }

        outcome
    }
}
