use std::fmt;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::clients::ClientError;

/// Why a link was judged unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    /// The probe ended up on the provider's error host.
    ErrorRedirect { final_url: String },
    Status(u16),
    TimedOut,
    Transport(String),
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ErrorRedirect { final_url } => write!(f, "redirected to error page {final_url}"),
            Self::Status(code) => write!(f, "status {code}"),
            Self::TimedOut => f.write_str("timed out"),
            Self::Transport(message) => write!(f, "transport error: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    Valid,
    Invalid(InvalidReason),
}

impl LinkStatus {
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    const fn metric_label(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Invalid(InvalidReason::ErrorRedirect { .. }) => "error_redirect",
            Self::Invalid(InvalidReason::Status(_)) => "bad_status",
            Self::Invalid(InvalidReason::TimedOut) => "timeout",
            Self::Invalid(InvalidReason::Transport(_)) => "transport",
        }
    }
}

/// Probes whether a stream link currently resolves.
///
/// Invalid links are an expected outcome, never an error. The only error is
/// [`ClientError::Cancelled`].
#[async_trait::async_trait]
pub trait StreamValidator: Send + Sync {
    async fn validate(&self, url: &str, token: &CancellationToken)
    -> Result<LinkStatus, ClientError>;
}

#[derive(Debug, Clone)]
pub struct LinkValidator {
    client: Client,
    timeout: Duration,
    error_marker: String,
    enabled: bool,
}

impl LinkValidator {
    /// `client` must follow redirects; the final URL is checked for `error_marker`.
    #[must_use]
    pub fn new(client: Client, timeout: Duration, error_marker: impl Into<String>) -> Self {
        Self {
            client,
            timeout,
            error_marker: error_marker.into(),
            enabled: true,
        }
    }

    /// A validator that reports every link as valid without probing it.
    #[must_use]
    pub fn disabled(client: Client) -> Self {
        Self {
            client,
            timeout: Duration::ZERO,
            error_marker: String::new(),
            enabled: false,
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn probe(&self, url: &str) -> LinkStatus {
        let response = match tokio::time::timeout(self.timeout, self.client.head(url).send()).await
        {
            Err(_) => return LinkStatus::Invalid(InvalidReason::TimedOut),
            Ok(Err(e)) if e.is_timeout() => return LinkStatus::Invalid(InvalidReason::TimedOut),
            Ok(Err(e)) => return LinkStatus::Invalid(InvalidReason::Transport(e.to_string())),
            Ok(Ok(response)) => response,
        };

        let final_url = response.url().as_str();
        if !self.error_marker.is_empty() && final_url.contains(&self.error_marker) {
            return LinkStatus::Invalid(InvalidReason::ErrorRedirect {
                final_url: final_url.to_string(),
            });
        }

        let status = response.status();
        if status.is_success() {
            LinkStatus::Valid
        } else {
            LinkStatus::Invalid(InvalidReason::Status(status.as_u16()))
        }
    }
}

#[async_trait::async_trait]
impl StreamValidator for LinkValidator {
    async fn validate(
        &self,
        url: &str,
        token: &CancellationToken,
    ) -> Result<LinkStatus, ClientError> {
        if !self.enabled {
            return Ok(LinkStatus::Valid);
        }
        if token.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        let status = tokio::select! {
            biased;
            () = token.cancelled() => return Err(ClientError::Cancelled),
            status = self.probe(url) => status,
        };

        metrics::counter!("strmarr_links_checked_total", "result" => status.metric_label())
            .increment(1);

        match &status {
            LinkStatus::Valid => debug!("Stream link is valid"),
            LinkStatus::Invalid(reason) => warn!(
                reason = %reason,
                timeout_secs = self.timeout.as_secs(),
                "Stream link is not valid"
            ),
        }

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_validator_never_probes() {
        let validator = LinkValidator::disabled(Client::new());
        let token = CancellationToken::new();
        let status = validator
            .validate("http://127.0.0.1:9/never", &token)
            .await
            .unwrap();
        assert!(status.is_valid());
    }

    #[tokio::test]
    async fn cancelled_token_is_an_error_not_an_invalid_link() {
        let validator =
            LinkValidator::new(Client::new(), Duration::from_secs(1), "error.example");
        let token = CancellationToken::new();
        token.cancel();
        let result = validator.validate("http://127.0.0.1:9/", &token).await;
        assert!(matches!(result, Err(ClientError::Cancelled)));
    }

    #[test]
    fn reasons_render_for_logs() {
        assert_eq!(InvalidReason::Status(404).to_string(), "status 404");
        assert_eq!(InvalidReason::TimedOut.to_string(), "timed out");
    }
}
