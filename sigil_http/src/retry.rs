//! Bounded retries around a single send attempt

use std::{future::Future, time::Duration};

use thiserror::Error;

use crate::{
    classify::{classify, Classification},
    HttpResponse, TransportError,
};

/// Configuration for the delay inserted between attempts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackoffConfig {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: u32,
}

impl Default for BackoffConfig {
    /// Default backoff configuration
    ///
    /// No delay at all, so that retries are immediate and deterministic.
    /// The multiplier is 2 and the cap is 15 seconds should a non-zero initial
    /// delay be configured later.
    fn default() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::from_secs(15),
            multiplier: 2,
        }
    }
}

impl BackoffConfig {
    /// Constructs a new backoff configuration
    ///
    /// The first retry waits `initial_delay`. Each subsequent retry multiplies
    /// the previous delay by `multiplier`, capped at `max_delay`.
    pub fn new(initial_delay: Duration, max_delay: Duration, multiplier: u32) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier,
        }
    }

    /// The delay to wait before the given retry (1-based)
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let factor = self.multiplier.saturating_pow(exponent);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// A transient failure observed on the final permitted attempt
#[derive(Debug, Error)]
pub enum RetryableFailure {
    /// The server replied with a transient infrastructure status
    #[error("transient server failure: HTTP {}", .0.status)]
    Status(HttpResponse),
    /// The transport failed transiently
    #[error("transient network failure")]
    Transport(#[source] TransportError),
}

/// The terminal error of a request that did not produce a reply
#[derive(Debug, Error)]
pub enum RequestError {
    /// Every permitted attempt failed transiently
    #[error("request failed after {attempts} attempts")]
    RetryExhausted {
        /// The number of attempts made
        attempts: u32,
        /// The failure observed on the last attempt
        #[source]
        last: RetryableFailure,
    },
    /// The request failed in a way that retrying would not fix
    #[error("request failed")]
    Fatal(#[from] TransportError),
}

impl RequestError {
    /// Whether the retry budget was spent on transient failures
    #[inline]
    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, Self::RetryExhausted { .. })
    }

    /// Whether the request failed fatally
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// The tagged terminal outcome of a retried request
#[derive(Debug)]
#[must_use]
pub enum Outcome {
    /// A reply to hand to the caller
    Success(HttpResponse),
    /// Every permitted attempt failed transiently
    RetryExhausted {
        /// The number of attempts made
        attempts: u32,
        /// The failure observed on the last attempt
        last: RetryableFailure,
    },
    /// An attempt failed fatally; no further attempts were made
    Fatal(TransportError),
}

impl Outcome {
    /// Converts the outcome into the caller-facing result
    pub fn into_result(self) -> Result<HttpResponse, RequestError> {
        match self {
            Self::Success(response) => Ok(response),
            Self::RetryExhausted { attempts, last } => {
                Err(RequestError::RetryExhausted { attempts, last })
            }
            Self::Fatal(error) => Err(RequestError::Fatal(error)),
        }
    }
}

enum State {
    Attempting { attempt: u32 },
    Retrying { attempt: u32, failure: RetryableFailure },
}

/// A bounded retry policy
///
/// Attempts are made sequentially. A transient outcome leads to another
/// attempt while the budget allows; a reply or a fatal failure ends the loop
/// immediately.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: BackoffConfig,
}

impl Default for RetryPolicy {
    /// Default retry policy
    ///
    /// Two attempts in total (one retry) with no delay between them.
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: BackoffConfig::default(),
        }
    }
}

impl RetryPolicy {
    /// Constructs a policy allowing `max_attempts` attempts in total
    ///
    /// At least one attempt is always made.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: BackoffConfig::default(),
        }
    }

    /// Sets the delay inserted between attempts
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// The total number of attempts permitted
    #[inline]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The backoff configuration
    #[inline]
    pub fn backoff(&self) -> &BackoffConfig {
        &self.backoff
    }

    /// Drives `send` until it yields a terminal outcome
    ///
    /// `send` receives the 1-based attempt number and must re-send the same,
    /// already built request each time.
    pub async fn run<F, Fut>(&self, mut send: F) -> Outcome
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<HttpResponse, TransportError>>,
    {
        let mut state = State::Attempting { attempt: 1 };

        loop {
            state = match state {
                State::Attempting { attempt } => {
                    let result = send(attempt).await;
                    let failure = match (classify(&result), result) {
                        (Classification::Retryable, Ok(response)) => {
                            RetryableFailure::Status(response)
                        }
                        (Classification::Retryable, Err(error)) => {
                            RetryableFailure::Transport(error)
                        }
                        (_, Ok(response)) => {
                            tracing::trace!(
                                attempt,
                                http.status_code = response.status.as_u16(),
                                "attempt produced a reply"
                            );
                            break Outcome::Success(response);
                        }
                        (_, Err(error)) => {
                            tracing::debug!(
                                attempt,
                                error = (&error as &dyn std::error::Error),
                                "attempt failed fatally"
                            );
                            break Outcome::Fatal(error);
                        }
                    };

                    if attempt < self.max_attempts {
                        State::Retrying { attempt, failure }
                    } else {
                        tracing::warn!(
                            attempts = attempt,
                            error = (&failure as &dyn std::error::Error),
                            "retry budget exhausted"
                        );
                        break Outcome::RetryExhausted {
                            attempts: attempt,
                            last: failure,
                        };
                    }
                }
                State::Retrying { attempt, failure } => {
                    let delay = self.backoff.delay_before_retry(attempt);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = (&failure as &dyn std::error::Error),
                        "transient failure, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    State::Attempting {
                        attempt: attempt + 1,
                    }
                }
            };
        }
    }
}
