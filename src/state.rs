use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::clients::{ArrClient, RadarrClient, SonarrClient};
use crate::config::Config;
use crate::library::{FileStore, LocalFileStore};
use crate::services::scheduler::ScheduleBook;
use crate::services::{
    CatalogBackends, LinkValidator, Reconciler, StreamSettings, StreamUrlTemplate,
    StreamValidator, SweepOptions, SweepService, WebhookOrchestrator,
};

/// Build a shared HTTP client with reasonable defaults for API calls.
/// Reused by every catalog client talking to the same service so
/// connections are pooled.
pub fn build_shared_http_client(timeout_seconds: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(concat!("strmarr/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build shared HTTP client: {e}"))
}

/// Client for HEAD probes. Redirects are followed so the final URL can be
/// checked for the provider's error host.
fn build_probe_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(10))
        .user_agent(concat!("strmarr/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build probe HTTP client: {e}"))
}

pub fn build_validator(config: &Config) -> anyhow::Result<LinkValidator> {
    let client = build_probe_client()?;
    Ok(if config.stream.validate_urls {
        LinkValidator::new(
            client,
            config.stream.validation_timeout(),
            config.stream.error_marker.clone(),
        )
    } else {
        LinkValidator::disabled(client)
    })
}

fn build_catalogs(config: &Config) -> anyhow::Result<CatalogBackends> {
    let sonarr_http = build_shared_http_client(config.sonarr.request_timeout_seconds)?;
    let series: Arc<dyn crate::clients::SeriesCatalog> = Arc::new(SonarrClient::new(
        ArrClient::new("sonarr", config.sonarr.settings(), sonarr_http)?,
    ));

    if !config.radarr.enabled {
        return Ok(CatalogBackends::SeriesOnly { series });
    }

    let radarr_http = build_shared_http_client(config.radarr.request_timeout_seconds)?;
    let movies: Arc<dyn crate::clients::MovieCatalog> = Arc::new(RadarrClient::new(
        ArrClient::new("radarr", config.radarr.settings(), radarr_http)?,
    ));

    Ok(CatalogBackends::SeriesAndMovies { series, movies })
}

fn stream_settings(config: &Config) -> anyhow::Result<StreamSettings> {
    Ok(StreamSettings {
        username: config.stream.username.clone(),
        password: config.stream.password.clone(),
        series_template: StreamUrlTemplate::parse(&config.stream.series_template)?,
        movie_template: StreamUrlTemplate::parse(&config.stream.movie_template)?,
    })
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub sweeps: Arc<SweepService>,

    pub webhooks: Arc<WebhookOrchestrator>,

    pub validator: Arc<dyn StreamValidator>,

    pub schedule: Arc<ScheduleBook>,

    /// Root token; HTTP-triggered work runs on child tokens.
    pub shutdown: CancellationToken,
}

impl SharedState {
    /// Wires the real clients. `config` must already be validated.
    pub fn new(config: Config, shutdown: CancellationToken) -> anyhow::Result<Self> {
        let catalogs = build_catalogs(&config)?;
        let stream = stream_settings(&config)?;
        let validator: Arc<dyn StreamValidator> = Arc::new(build_validator(&config)?);
        let files: Arc<dyn FileStore> = Arc::new(LocalFileStore::new());

        Ok(Self::from_parts(
            config, catalogs, files, validator, stream, shutdown,
        ))
    }

    /// Wires pre-built collaborators.
    #[must_use]
    pub fn from_parts(
        config: Config,
        catalogs: CatalogBackends,
        files: Arc<dyn FileStore>,
        validator: Arc<dyn StreamValidator>,
        stream: StreamSettings,
        shutdown: CancellationToken,
    ) -> Self {
        let reconciler = Arc::new(Reconciler::new(
            catalogs,
            files,
            Arc::clone(&validator),
            stream,
        ));

        let sweeps = Arc::new(SweepService::new(
            reconciler,
            SweepOptions {
                parallelism: config.sweep.parallelism,
                page_size: config.sweep.page_size,
            },
        ));

        let webhooks = Arc::new(WebhookOrchestrator::new(
            Arc::clone(&sweeps),
            config.radarr.quality_profile.clone(),
        ));

        Self {
            config: Arc::new(config),
            sweeps,
            webhooks,
            validator,
            schedule: Arc::new(ScheduleBook::new()),
            shutdown,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Token for work that must stop on shutdown but not cancel siblings.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.sonarr.api_key = "key".to_string();
        config.stream.username = "u".to_string();
        config.stream.password = "p".to_string();
        config
    }

    #[test]
    fn series_only_without_radarr() {
        let state = SharedState::new(valid_config(), CancellationToken::new()).unwrap();
        assert!(!state.sweeps.has_movies());
    }

    #[test]
    fn radarr_enabled_adds_movies() {
        let mut config = valid_config();
        config.radarr.enabled = true;
        config.radarr.api_key = "key".to_string();
        let state = SharedState::new(config, CancellationToken::new()).unwrap();
        assert!(state.sweeps.has_movies());
    }

    #[test]
    fn missing_api_key_fails_to_wire() {
        let mut config = valid_config();
        config.sonarr.api_key.clear();
        assert!(SharedState::new(config, CancellationToken::new()).is_err());
    }
}
