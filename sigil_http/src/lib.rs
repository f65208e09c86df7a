//! A resilient request pipeline for OAuth2 token endpoints
//!
//! Token endpoints sit behind load balancers and gateways that occasionally
//! time out or shed load. This crate shields callers from those transient
//! conditions with a small, deterministic retry loop, while passing every
//! other reply through untouched for higher layers to interpret.
//!
//! A request flows through three pieces:
//!
//! * [`HttpRequestPipeline`] builds the wire request (query string, form
//!   body, headers) and hands it to the retry policy.
//! * [`RetryPolicy`] re-sends the same request while attempts remain and
//!   the previous attempt was classified as transient. By default two
//!   attempts are made in total.
//! * [`classify`](classify::classify) decides, for each attempt, whether the
//!   reply is final, transient (timeouts, cancellations, connection resets,
//!   and HTTP 500/502/503/504), or fatal.
//!
//! The network itself is behind the [`HttpTransport`] trait. The `reqwest`
//! feature (enabled by default) provides [`ReqwestTransport`]; the `mock`
//! feature provides a scripted `mock::MockTransport` for tests.
//!
//! ```
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! use async_trait::async_trait;
//! use http::StatusCode;
//! use sigil_http::{
//!     HttpRequest, HttpRequestPipeline, HttpResponse, HttpTransport, Parameters, TransportError,
//! };
//!
//! /// Sheds load on the first request only
//! #[derive(Debug, Default)]
//! struct Overloaded(AtomicU32);
//!
//! #[async_trait]
//! impl HttpTransport for Overloaded {
//!     async fn send(&self, _: &HttpRequest) -> Result<HttpResponse, TransportError> {
//!         if self.0.fetch_add(1, Ordering::Relaxed) == 0 {
//!             Ok(HttpResponse::new(StatusCode::SERVICE_UNAVAILABLE, ""))
//!         } else {
//!             Ok(HttpResponse::new(StatusCode::OK, r#"{"access_token":"abc"}"#))
//!         }
//!     }
//! }
//! # #[tokio::main(flavor = "current_thread")] async fn main() {
//!
//! let pipeline = HttpRequestPipeline::new(Overloaded::default());
//! let body = Parameters::from([("grant_type", "client_credentials")]);
//!
//! let response = pipeline
//!     .send_post(
//!         "https://login.example.com/common/oauth2/token".parse().unwrap(),
//!         None,
//!         Some(&body),
//!         None,
//!     )
//!     .await
//!     .unwrap();
//!
//! assert_eq!(response.status, StatusCode::OK);
//! assert_eq!(pipeline.transport().0.load(Ordering::Relaxed), 2);
//! # }
//! ```
//!
//! # Feature flags
//!
//! The `reqwest` feature does not enable TLS support in `reqwest` itself.
//! If your application already uses `reqwest` with some TLS settings, those
//! are used automatically. Otherwise, enable the `default-tls` or
//! `rustls-tls` feature to call out to HTTPS endpoints.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

pub mod classify;
#[cfg(any(test, feature = "mock"))]
#[cfg_attr(docsrs, doc(cfg(feature = "mock")))]
pub mod mock;
mod pipeline;
mod request;
#[cfg(feature = "reqwest")]
mod reqwest_transport;
mod response;
pub mod retry;
mod transport;

pub use pipeline::HttpRequestPipeline;
pub use request::{HttpRequest, Parameters};
#[cfg(feature = "reqwest")]
#[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
pub use reqwest_transport::{ReqwestTransport, ReqwestTransportBuilder};
pub use response::HttpResponse;
pub use retry::{BackoffConfig, Outcome, RequestError, RetryPolicy, RetryableFailure};
pub use transport::{BoxError, HttpTransport, TransportError};

pub use http;
pub use url::Url;
