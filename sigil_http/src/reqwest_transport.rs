use std::{error, io, time::Duration};

use async_trait::async_trait;
use http::{header, HeaderValue, Method};

use crate::{HttpRequest, HttpResponse, HttpTransport, TransportError};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A transport backed by a [`reqwest::Client`]
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Constructs a transport with the default configuration
    ///
    /// See [`ReqwestTransportBuilder`] for the defaults.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    /// Starts configuring a transport
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    /// Wraps an existing client
    ///
    /// The client's own timeout and redirect settings are used as-is.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Configuration for a [`ReqwestTransport`]
#[derive(Clone, Debug)]
pub struct ReqwestTransportBuilder {
    timeout: Duration,
    user_agent: String,
}

impl Default for ReqwestTransportBuilder {
    /// Default transport configuration
    ///
    /// A 30 second timeout per attempt and a `sigil_http/<version>` user
    /// agent. Redirects are never followed.
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("sigil_http/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl ReqwestTransportBuilder {
    /// Sets the timeout applied to each attempt
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Builds the transport
    pub fn build(self) -> Result<ReqwestTransport, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(self.user_agent)
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(ReqwestTransport { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method().clone(), request.url().clone())
            .headers(request.headers().clone());

        if *request.method() == Method::POST {
            builder = builder
                .header(header::CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE))
                .body(request.encoded_body());
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout {
            source: error.into(),
        }
    } else if was_reset(&error) {
        TransportError::ConnectionReset {
            source: error.into(),
        }
    } else if error.is_connect() {
        TransportError::Connect {
            source: error.into(),
        }
    } else if error.is_builder() {
        TransportError::InvalidRequest {
            message: error.to_string(),
        }
    } else {
        TransportError::Other {
            source: error.into(),
        }
    }
}

fn was_reset(error: &(dyn error::Error + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(io_error) = err.downcast_ref::<io::Error>() {
            if matches!(
                io_error.kind(),
                io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
            ) {
                return true;
            }
        }
        current = err.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("wrapped")]
    struct Wrapped(#[source] io::Error);

    #[test]
    fn resets_are_found_in_the_source_chain() {
        let wrapped = Wrapped(io::Error::from(io::ErrorKind::ConnectionReset));
        assert!(was_reset(&wrapped));
    }

    #[test]
    fn other_io_errors_are_not_resets() {
        let wrapped = Wrapped(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert!(!was_reset(&wrapped));
    }

    #[test]
    fn default_builder_produces_a_transport() {
        let transport = ReqwestTransport::builder()
            .timeout(Duration::from_secs(5))
            .user_agent("sigil-test")
            .build();
        assert!(transport.is_ok());
    }
}
