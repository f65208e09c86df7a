//! Classification of a completed attempt

use http::StatusCode;

use crate::{HttpResponse, TransportError};

/// How a single attempt should be treated by the retry loop
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    /// A reply was obtained that should be handed to the caller as-is
    ///
    /// This includes non-2xx statuses that are not transient; those carry
    /// application-level errors for the caller to interpret.
    Success,
    /// A transient failure; another attempt may succeed
    Retryable,
    /// A failure that another attempt would not fix
    Fatal,
}

/// Classifies the outcome of a single attempt
pub fn classify(outcome: &Result<HttpResponse, TransportError>) -> Classification {
    match outcome {
        Ok(response) => classify_status(response.status),
        Err(error) if error.is_retryable() => Classification::Retryable,
        Err(_) => Classification::Fatal,
    }
}

/// Classifies a reply by its status code alone
///
/// Only the infrastructure failures 500, 502, 503 and 504 are retryable.
pub fn classify_status(status: StatusCode) -> Classification {
    match status {
        StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => Classification::Retryable,
        _ => Classification::Success,
    }
}
