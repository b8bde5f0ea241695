//! Shared HTTP plumbing for the Sonarr and Radarr v3 APIs.

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use super::ClientError;
use super::retry::{RetryPolicy, send_with_retry};

const API_KEY_HEADER: &str = "X-Api-Key";

/// Connection settings for one *arr instance.
#[derive(Debug, Clone)]
pub struct ArrSettings {
    pub base_url: String,
    pub api_key: String,
    pub retry: RetryPolicy,
    /// Statuses retried on reads. Writes use the same set minus 404.
    pub retry_statuses: Vec<u16>,
}

#[derive(Debug, Clone)]
pub struct ArrClient {
    service: &'static str,
    base_url: Url,
    api_key: String,
    client: Client,
    retry: RetryPolicy,
    read_retry_on: Vec<StatusCode>,
    write_retry_on: Vec<StatusCode>,
}

impl ArrClient {
    /// Fails fast when the URL or API key is missing so no sweep ever starts
    /// against a half-configured instance.
    pub fn new(
        service: &'static str,
        settings: ArrSettings,
        client: Client,
    ) -> Result<Self, ClientError> {
        if settings.base_url.trim().is_empty() {
            return Err(ClientError::InvalidRequest(format!(
                "{service} url is not configured"
            )));
        }
        if settings.api_key.trim().is_empty() {
            return Err(ClientError::InvalidRequest(format!(
                "{service} api key is not configured"
            )));
        }

        let mut base_url = Url::parse(settings.base_url.trim()).map_err(|e| {
            ClientError::InvalidRequest(format!("{service} url is invalid: {e}"))
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let read_retry_on: Vec<StatusCode> = settings
            .retry_statuses
            .iter()
            .filter_map(|code| StatusCode::from_u16(*code).ok())
            .collect();
        let write_retry_on = read_retry_on
            .iter()
            .copied()
            .filter(|status| *status != StatusCode::NOT_FOUND)
            .collect();

        Ok(Self {
            service,
            base_url,
            api_key: settings.api_key,
            client,
            retry: settings.retry,
            read_retry_on,
            write_retry_on,
        })
    }

    #[must_use]
    pub const fn service(&self) -> &'static str {
        self.service
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::InvalidRequest(format!("bad endpoint {path}: {e}")))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(API_KEY_HEADER, &self.api_key)
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, String)],
        token: &CancellationToken,
    ) -> Result<T, ClientError> {
        let url = self.endpoint(path)?;
        debug!(service = self.service, method = "GET", path, "Sending request");

        let response = send_with_retry(&self.retry, operation, token, &self.read_retry_on, || {
            self.request(Method::GET, url.clone()).query(query)
        })
        .await?;

        let bytes = tokio::select! {
            biased;
            () = token.cancelled() => return Err(ClientError::Cancelled),
            bytes = response.bytes() => bytes.map_err(|e| ClientError::transport(operation, e))?,
        };

        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode {
            operation: operation.to_string(),
            message: e.to_string(),
        })
    }

    /// Sends a write request. Not-found responses are never retried here.
    pub async fn send<B: Serialize + Sync>(
        &self,
        method: Method,
        operation: &str,
        path: &str,
        body: Option<&B>,
        token: &CancellationToken,
    ) -> Result<(), ClientError> {
        let url = self.endpoint(path)?;
        debug!(service = self.service, method = %method, path, "Sending request");

        send_with_retry(&self.retry, operation, token, &self.write_retry_on, || {
            let request = self.request(method.clone(), url.clone());
            match body {
                Some(body) => request.json(body),
                None => request,
            }
        })
        .await?;

        Ok(())
    }

    /// `POST /api/v3/command` with `{"name": ..}` merged into `args`.
    pub async fn post_command(
        &self,
        name: &str,
        args: Value,
        token: &CancellationToken,
    ) -> Result<(), ClientError> {
        let mut body = json!({ "name": name });
        if let (Some(target), Value::Object(extra)) = (body.as_object_mut(), args) {
            target.extend(extra);
        }

        let operation = format!("{} command {name}", self.service);
        self.send(Method::POST, &operation, "api/v3/command", Some(&body), token)
            .await
    }
}
