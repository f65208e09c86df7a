//! OAuth2 token acquisition backed by a shared credential cache
//!
//! Applications often ask for the same credential many times over. This crate
//! turns each request into a cache lookup first and only goes to the
//! authority's token endpoint when no usable credential is cached, so that
//! repeated requests for the same client, authority, scopes, tenant and user
//! reuse a credential that was already issued.
//!
//! # General flow
//!
//! A [`TokenAcquisitionFlow`] is built from three things:
//!
//! * the client ID credentials are requested for,
//! * a [`sigil_http::HttpRequestPipeline`], which retries transient network
//!   and gateway failures once before giving up, and
//! * a [`TokenCacheStore`], shared behind an [`Arc`](std::sync::Arc) with any
//!   other flow that should see the same credentials.
//!
//! Each [`TokenRequest`] is first looked up in the cache. On a miss the flow
//! posts the request to `<authority>/oauth2/token`, turns the reply into an
//! [`AuthenticationResult`], stores it, and returns it.
//!
//! ```
//! use std::sync::Arc;
//!
//! use sigil_http::{
//!     http::StatusCode,
//!     mock::{MockExchange, MockTransport},
//!     HttpRequestPipeline, Url,
//! };
//! use sigil_tokens::{ClientSecret, ScopeSet, TokenAcquisitionFlow, TokenCacheStore, TokenRequest};
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!
//! let transport = MockTransport::new();
//! transport.push(MockExchange::post().respond_with(
//!     StatusCode::OK,
//!     r#"{"token_type":"Bearer","access_token":"abc123","expires_in":3599}"#,
//! ));
//!
//! let cache = Arc::new(TokenCacheStore::new());
//! let flow = TokenAcquisitionFlow::new("my-client", HttpRequestPipeline::new(&transport), cache);
//!
//! let request = TokenRequest::client_credentials(
//!     Url::parse("https://login.example.com/my-tenant")?,
//!     ScopeSet::new().and("https://api.example.com/.default"),
//!     &ClientSecret::from_static("my-secret"),
//! );
//!
//! let first = flow.acquire_token(&request).await?;
//! let second = flow.acquire_token(&request).await?;
//!
//! assert_eq!(second.create_authorization_header(), "Bearer abc123");
//! assert_eq!(first, second);
//! transport.assert_drained();
//! # Ok(())
//! # }
//! ```
//!
//! Applications that want one cache per process can use the stores from
//! [`TokenCaches::process_default`] instead of constructing their own.
//!
//! # Secrets
//!
//! Access tokens, refresh tokens and client secrets do not print their
//! contents through `Debug` or `Display`. Use the alternate flag to reveal a
//! short prefix (`{:#?}`), or the whole value (`{:#}`).
//!
//! # Features
//!
//! * `reqwest` (default): enables [`sigil_http::ReqwestTransport`].
//! * `default-tls`, `rustls-tls`: select the TLS implementation used by
//!   `reqwest`.

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

mod braids;
pub mod cache;
pub mod dto;
mod flow;
mod id_token;
mod result;
pub mod scope;
mod user;

pub use braids::*;
pub use cache::{CacheKey, TokenCacheStore, TokenCaches, UserFallback};
pub use flow::{AcquireError, TokenAcquisitionFlow, TokenRequest};
pub use id_token::{IdTokenClaims, IdTokenError};
pub use result::AuthenticationResult;
pub use scope::{Scope, ScopeRef, ScopeSet};
pub use user::User;
