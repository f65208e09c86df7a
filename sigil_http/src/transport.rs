//! The seam between the pipeline and the network

use std::{error, io, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use crate::{HttpRequest, HttpResponse};

/// A boxed error that can be sent between threads
pub type BoxError = Box<dyn error::Error + Send + Sync + 'static>;

/// A transport-level failure: no HTTP reply was obtained
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request did not complete before its deadline
    #[error("request timed out")]
    Timeout {
        /// The underlying error
        source: BoxError,
    },
    /// The request was cancelled before a reply arrived
    #[error("request was cancelled")]
    Cancelled,
    /// The connection was reset or aborted by the remote end
    #[error("connection reset by remote host")]
    ConnectionReset {
        /// The underlying error
        source: BoxError,
    },
    /// A connection to the remote host could not be established
    #[error("unable to connect to remote host")]
    Connect {
        /// The underlying error
        source: BoxError,
    },
    /// The request could not be built or sent as described
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// A description of the problem
        message: String,
    },
    /// Any other transport failure
    #[error("transport failure")]
    Other {
        /// The underlying error
        source: BoxError,
    },
}

impl TransportError {
    /// Constructs a timeout error with a generic cause
    pub fn timed_out() -> Self {
        Self::Timeout {
            source: io::Error::new(io::ErrorKind::TimedOut, "request timed out").into(),
        }
    }

    /// Whether the failure is transient and worth another attempt
    ///
    /// Timeouts, cancellations and connection resets are transient. Every
    /// other transport failure is fatal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Cancelled | Self::ConnectionReset { .. }
        )
    }
}

/// Sends a single HTTP request and returns the reply
///
/// Implementations perform exactly one network exchange per call and never
/// retry on their own.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends the request
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for &T {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Box<T> {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}
