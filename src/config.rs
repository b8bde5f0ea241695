use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::clients::{ArrSettings, RetryPolicy};
use crate::constants;
use crate::services::scheduler::{Cadence, CadenceId, Trigger};
use crate::services::stream_url::StreamUrlTemplate;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub sonarr: ArrConfig,

    pub radarr: ArrConfig,

    pub stream: StreamConfig,

    pub sweep: SweepConfig,

    pub scheduler: SchedulerConfig,

    pub server: ServerConfig,

    pub observability: ObservabilityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            sonarr: ArrConfig::with_url("http://localhost:8989", true),
            radarr: ArrConfig::with_url("http://localhost:7878", false),
            stream: StreamConfig::default(),
            sweep: SweepConfig::default(),
            scheduler: SchedulerConfig::default(),
            server: ServerConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            worker_threads: 2,
        }
    }
}

/// Connection settings for a Sonarr or Radarr instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrConfig {
    pub enabled: bool,

    pub url: String,

    pub api_key: String,

    pub request_timeout_seconds: u64,

    pub max_retries: u32,

    pub retry_delays_ms: Vec<u64>,

    /// Statuses retried on reads. Writes never retry 404.
    pub retry_statuses: Vec<u16>,

    /// Radarr only: profile assigned to movies added through the webhook.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_profile: Option<String>,
}

impl ArrConfig {
    fn with_url(url: &str, enabled: bool) -> Self {
        Self {
            enabled,
            url: url.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn settings(&self) -> ArrSettings {
        ArrSettings {
            base_url: self.url.clone(),
            api_key: self.api_key.clone(),
            retry: RetryPolicy::from_millis(self.max_retries, &self.retry_delays_ms),
            retry_statuses: self.retry_statuses.clone(),
        }
    }

    fn validate(&self, service: &str) -> Result<()> {
        if self.url.trim().is_empty() {
            anyhow::bail!("{service} URL cannot be empty when enabled");
        }
        url::Url::parse(self.url.trim())
            .with_context(|| format!("{service} URL is invalid: {}", self.url))?;
        if self.api_key.trim().is_empty() {
            anyhow::bail!("{service} API key cannot be empty when enabled");
        }
        if let Some(code) = self
            .retry_statuses
            .iter()
            .find(|code| !(100..=599).contains(*code))
        {
            anyhow::bail!("{service} retry status {code} is not an HTTP status");
        }
        Ok(())
    }
}

impl Default for ArrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: String::new(),
            api_key: String::new(),
            request_timeout_seconds: constants::retry::REQUEST_TIMEOUT_SECS,
            max_retries: constants::retry::MAX_RETRIES,
            retry_delays_ms: constants::retry::DELAYS_MS.to_vec(),
            retry_statuses: constants::retry::RETRY_STATUSES.to_vec(),
            quality_profile: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub username: String,

    pub password: String,

    pub series_template: String,

    pub movie_template: String,

    /// When false every link is treated as valid without probing.
    pub validate_urls: bool,

    pub validation_timeout_seconds: u64,

    /// Substring of the provider's error host; a redirect there means "no stream".
    pub error_marker: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            series_template: constants::stream::SERIES_TEMPLATE.to_string(),
            movie_template: constants::stream::MOVIE_TEMPLATE.to_string(),
            validate_urls: true,
            validation_timeout_seconds: constants::stream::VALIDATION_TIMEOUT_SECS,
            error_marker: constants::stream::ERROR_MARKER.to_string(),
        }
    }
}

impl StreamConfig {
    #[must_use]
    pub const fn validation_timeout(&self) -> Duration {
        Duration::from_secs(self.validation_timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Series processed concurrently during a full sweep.
    pub parallelism: usize,

    pub page_size: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            parallelism: constants::sweep::PARALLELISM,
            page_size: constants::sweep::PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,

    pub full_sweep: FullSweepConfig,

    pub wanted: WantedConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            full_sweep: FullSweepConfig::default(),
            wanted: WantedConfig::default(),
        }
    }
}

impl SchedulerConfig {
    #[must_use]
    pub fn cadences(&self) -> Vec<Cadence> {
        vec![
            Cadence {
                id: CadenceId::FullSweep,
                enabled: self.enabled && self.full_sweep.enabled,
                trigger: self.full_sweep.trigger,
                run_on_startup: self.full_sweep.run_on_startup,
            },
            Cadence {
                id: CadenceId::WantedSweep,
                enabled: self.enabled && self.wanted.enabled,
                trigger: Trigger::Interval {
                    minutes: self.wanted.interval_minutes.max(1),
                },
                run_on_startup: self.wanted.run_on_startup,
            },
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FullSweepConfig {
    pub enabled: bool,

    pub trigger: Trigger,

    pub only_monitored: bool,

    pub run_on_startup: bool,
}

impl Default for FullSweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger: Trigger::HourlyAt {
                minute: constants::scheduler::FULL_SWEEP_MINUTE,
            },
            only_monitored: true,
            run_on_startup: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WantedConfig {
    pub enabled: bool,

    pub interval_minutes: u32,

    pub run_on_startup: bool,
}

impl Default for WantedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: constants::scheduler::WANTED_INTERVAL_MINUTES,
            run_on_startup: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8282,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = HashMap::new();
        labels.insert("app".to_string(), "strmarr".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Config {
    /// Loads `.env`, the first config file found, then environment overrides.
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded environment from: {}", path.display());
        }

        let mut config = Self::load_file()?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        for path in &Self::config_paths() {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Non-empty values from `lookup` replace file values.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| lookup(key).filter(|v| !v.trim().is_empty()))
        };

        if let Some(v) = get(&["SONARR_URL"]) {
            self.sonarr.url = v;
        }
        if let Some(v) = get(&["SONARR_API_KEY"]) {
            self.sonarr.api_key = v;
        }
        if let Some(v) = get(&["RADARR_URL"]) {
            self.radarr.url = v;
        }
        if let Some(v) = get(&["RADARR_API_KEY"]) {
            self.radarr.api_key = v;
        }
        if let Some(v) = get(&["STREAM_USERNAME", "APOLLO_USERNAME"]) {
            self.stream.username = v;
        }
        if let Some(v) = get(&["STREAM_PASSWORD", "APOLLO_PASSWORD"]) {
            self.stream.password = v;
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::default_config_path();
        self.save_to_path(&path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("strmarr").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".strmarr").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    /// Everything a sweep needs must be present before the first sweep runs.
    pub fn validate(&self) -> Result<()> {
        if !self.sonarr.enabled {
            anyhow::bail!("Sonarr must be enabled");
        }
        self.sonarr.validate("Sonarr")?;

        if self.radarr.enabled {
            self.radarr.validate("Radarr")?;
        }

        if self.stream.username.trim().is_empty() || self.stream.password.trim().is_empty() {
            anyhow::bail!("Stream provider username and password are required");
        }

        StreamUrlTemplate::parse(&self.stream.series_template)
            .context("Invalid stream.series_template")?;
        if self.radarr.enabled {
            StreamUrlTemplate::parse(&self.stream.movie_template)
                .context("Invalid stream.movie_template")?;
        }

        if self.stream.validate_urls && self.stream.validation_timeout_seconds == 0 {
            anyhow::bail!("stream.validation_timeout_seconds must be > 0");
        }

        match self.scheduler.full_sweep.trigger {
            Trigger::HourlyAt { minute } if minute > 59 => {
                anyhow::bail!("Full sweep minute must be between 0 and 59");
            }
            Trigger::DailyAt { hour, minute } if hour > 23 || minute > 59 => {
                anyhow::bail!("Full sweep time must be a valid HH:MM");
            }
            _ => {}
        }

        Ok(())
    }
}
