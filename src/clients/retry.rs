//! Bounded retry with a fixed delay table.
//!
//! Every catalog call goes through [`retry_with_delays`]. The operation reports
//! each attempt as a [`RetryAction`], so classification stays with the caller
//! while the loop owns attempt counting, sleeping and cancellation.

use std::future::Future;
use std::io;
use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::ClientError;

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Retry bound plus the delays slept between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Delay before retry `n` is `delays[min(n, len - 1)]`.
    pub delays: Vec<Duration>,
}

impl RetryPolicy {
    #[must_use]
    pub fn from_millis(max_retries: u32, delays_ms: &[u64]) -> Self {
        Self {
            max_retries,
            delays: delays_ms.iter().copied().map(Duration::from_millis).collect(),
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            delays: Vec::new(),
        }
    }

    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let Some(last) = self.delays.len().checked_sub(1) else {
            return Duration::ZERO;
        };
        let index = usize::try_from(attempt).unwrap_or(usize::MAX).min(last);
        self.delays[index]
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_millis(
            crate::constants::retry::MAX_RETRIES,
            crate::constants::retry::DELAYS_MS,
        )
    }
}

/// Outcome of a single attempt.
pub enum RetryAction<T> {
    Success(T),
    /// Transient failure; try again if attempts remain.
    Retry(ClientError),
    /// Permanent failure; surface immediately.
    Fail(ClientError),
}

/// Runs `operation` until it succeeds, fails permanently, runs out of retries
/// or the token is cancelled.
///
/// The closure receives the zero-based attempt number. Cancellation is checked
/// before each attempt and raced against both the attempt and the delay, and
/// never counts as an attempt.
pub async fn retry_with_delays<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    token: &CancellationToken,
    mut operation: F,
) -> Result<T, ClientError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = RetryAction<T>>,
{
    let max_attempts = policy.max_retries.saturating_add(1);

    for attempt in 0..max_attempts {
        if token.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        debug!(
            operation = operation_name,
            attempt = attempt + 1,
            max_attempts,
            "Executing operation"
        );

        let action = tokio::select! {
            biased;
            () = token.cancelled() => return Err(ClientError::Cancelled),
            action = operation(attempt) => action,
        };

        match action {
            RetryAction::Success(value) => return Ok(value),
            RetryAction::Fail(err) => return Err(err),
            RetryAction::Retry(err) => {
                if attempt + 1 >= max_attempts {
                    error!(
                        operation = operation_name,
                        attempts = max_attempts,
                        error = %err,
                        "Operation failed after exhausting retries"
                    );
                    return Err(ClientError::RetriesExhausted {
                        operation: operation_name.to_string(),
                        attempts: max_attempts,
                        last: Box::new(err),
                    });
                }

                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    operation = operation_name,
                    retry = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Transient failure, retrying"
                );

                tokio::select! {
                    biased;
                    () = token.cancelled() => return Err(ClientError::Cancelled),
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    Err(ClientError::InvalidRequest(format!(
        "{operation_name}: retry loop exited without result"
    )))
}

/// Sends the request built by `build` under `policy`.
///
/// Success statuses are returned. Statuses in `retry_on` and transient
/// transport errors are retried; anything else fails on the spot.
pub async fn send_with_retry<F>(
    policy: &RetryPolicy,
    operation_name: &str,
    token: &CancellationToken,
    retry_on: &[StatusCode],
    build: F,
) -> Result<Response, ClientError>
where
    F: Fn() -> RequestBuilder,
{
    retry_with_delays(policy, operation_name, token, |_| {
        let request = build();
        async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => RetryAction::Success(response),
                Ok(response) => {
                    let status = response.status();
                    let retryable = retry_on.contains(&status);
                    let body = if retryable {
                        String::new()
                    } else {
                        truncate_body(response.text().await.unwrap_or_default())
                    };
                    let err = ClientError::Status {
                        operation: operation_name.to_string(),
                        status,
                        body,
                    };
                    if retryable {
                        RetryAction::Retry(err)
                    } else {
                        RetryAction::Fail(err)
                    }
                }
                Err(e) if is_transient(&e) => {
                    RetryAction::Retry(ClientError::transport(operation_name, e))
                }
                Err(e) => RetryAction::Fail(ClientError::transport(operation_name, e)),
            }
        }
    })
    .await
}

/// Connect failures, timeouts, and I/O errors that usually clear on their own.
#[must_use]
pub fn is_transient(err: &reqwest::Error) -> bool {
    if err.is_timeout() || err.is_connect() {
        return true;
    }

    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>()
            && is_transient_io_kind(io_err.kind())
        {
            return true;
        }
        source = cause.source();
    }

    false
}

#[must_use]
pub const fn is_transient_io_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::NetworkUnreachable
            | io::ErrorKind::WouldBlock
    )
}

fn truncate_body(body: String) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body;
    }
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
