//! A scripted transport for tests
//!
//! [`MockTransport`] replays an ordered queue of expected exchanges. Each
//! request pops the next exchange, checks it against the exchange's
//! expectations, and returns the scripted reply. After the code under test
//! has run, [`MockTransport::assert_drained`] verifies that every queued
//! exchange was consumed.
//!
//! ```
//! use http::StatusCode;
//! use sigil_http::{mock::{MockExchange, MockTransport}, HttpRequestPipeline};
//! # #[tokio::main(flavor = "current_thread")] async fn main() {
//!
//! let mock = MockTransport::new();
//! mock.push(MockExchange::get().respond_with(StatusCode::OK, "{}"));
//!
//! let pipeline = HttpRequestPipeline::new(&mock);
//! let response = pipeline
//!     .send_get("https://example.com/".parse().unwrap(), None, None)
//!     .await
//!     .unwrap();
//!
//! assert_eq!(response.body, "{}");
//! mock.assert_drained();
//! # }
//! ```

use std::{collections::VecDeque, fmt};

use async_trait::async_trait;
use http::{Method, StatusCode};
use parking_lot::Mutex;

use crate::{HttpRequest, HttpResponse, HttpTransport, Parameters, TransportError};

enum Reply {
    Response(HttpResponse),
    Failure(TransportError),
}

/// One expected request and its scripted reply
pub struct MockExchange {
    method: Method,
    query: Option<Parameters>,
    body: Option<Parameters>,
    headers: Vec<(String, String)>,
    reply: Reply,
}

impl MockExchange {
    /// Expects a request with the given method
    ///
    /// Unless configured otherwise, the reply is an empty `200 OK`.
    pub fn new(method: Method) -> Self {
        Self {
            method,
            query: None,
            body: None,
            headers: Vec::new(),
            reply: Reply::Response(HttpResponse::new(StatusCode::OK, "")),
        }
    }

    /// Expects a `GET` request
    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    /// Expects a `POST` request
    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    /// Expects every one of these parameters in the query string
    #[must_use]
    pub fn expect_query(mut self, query: Parameters) -> Self {
        self.query = Some(query);
        self
    }

    /// Expects every one of these parameters in the form body
    #[must_use]
    pub fn expect_body(mut self, body: Parameters) -> Self {
        self.body = Some(body);
        self
    }

    /// Expects a header with exactly this value
    #[must_use]
    pub fn expect_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replies with the given status and body
    #[must_use]
    pub fn respond_with(self, status: StatusCode, body: impl Into<String>) -> Self {
        self.respond_with_response(HttpResponse::new(status, body))
    }

    /// Replies with the given response
    #[must_use]
    pub fn respond_with_response(mut self, response: HttpResponse) -> Self {
        self.reply = Reply::Response(response);
        self
    }

    /// Fails with the given transport error
    #[must_use]
    pub fn fail_with(mut self, error: TransportError) -> Self {
        self.reply = Reply::Failure(error);
        self
    }

    /// Fails as though the request timed out
    #[must_use]
    pub fn time_out(self) -> Self {
        self.fail_with(TransportError::timed_out())
    }

    #[track_caller]
    fn verify(&self, request: &HttpRequest) {
        assert_eq!(
            request.method(),
            &self.method,
            "unexpected method for {request}"
        );

        if let Some(expected) = &self.query {
            let actual: Parameters = request.url().query_pairs().collect();
            for (key, value) in expected.iter() {
                assert_eq!(
                    actual.get(key),
                    Some(value),
                    "query parameter `{key}` mismatch for {request}"
                );
            }
        }

        if let Some(expected) = &self.body {
            for (key, value) in expected.iter() {
                assert_eq!(
                    request.body().get(key),
                    Some(value),
                    "body parameter `{key}` mismatch for {request}"
                );
            }
        }

        for (name, value) in &self.headers {
            let actual = request
                .headers()
                .get(name.as_str())
                .and_then(|v| v.to_str().ok());
            assert_eq!(
                actual,
                Some(value.as_str()),
                "header `{name}` mismatch for {request}"
            );
        }
    }
}

impl fmt::Debug for MockExchange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let reply = match &self.reply {
            Reply::Response(r) => format!("{}", r.status),
            Reply::Failure(e) => e.to_string(),
        };
        f.debug_struct("MockExchange")
            .field("method", &self.method)
            .field("query", &self.query)
            .field("body", &self.body)
            .field("headers", &self.headers)
            .field("reply", &reply)
            .finish()
    }
}

/// A transport that replays queued exchanges in order
///
/// # Panics
///
/// Sending a request panics if no exchange is queued or if the request does
/// not meet the next exchange's expectations.
#[derive(Debug, Default)]
pub struct MockTransport {
    exchanges: Mutex<VecDeque<MockExchange>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    /// Constructs a transport with nothing queued
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an exchange behind any already queued
    pub fn push(&self, exchange: MockExchange) -> &Self {
        self.exchanges.lock().push_back(exchange);
        self
    }

    /// Whether every queued exchange has been consumed
    pub fn is_drained(&self) -> bool {
        self.exchanges.lock().is_empty()
    }

    /// Asserts that every queued exchange has been consumed
    #[track_caller]
    pub fn assert_drained(&self) {
        let remaining = self.exchanges.lock();
        assert!(
            remaining.is_empty(),
            "all mock exchanges should have been consumed; {} remain: {:?}",
            remaining.len(),
            *remaining
        );
    }

    /// The requests received so far, in order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// The number of requests received so far
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Discards any queued exchanges and recorded requests
    pub fn reset(&self) {
        self.exchanges.lock().clear();
        self.requests.lock().clear();
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(request.clone());

        let next = self.exchanges.lock().pop_front();
        let exchange = match next {
            Some(exchange) => exchange,
            None => panic!("unexpected request {request}: no mock exchange queued"),
        };

        exchange.verify(request);

        match exchange.reply {
            Reply::Response(response) => Ok(response),
            Reply::Failure(error) => Err(error),
        }
    }
}
