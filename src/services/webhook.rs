//! "Item added" events from Sonarr and Radarr.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::sweep::{SweepCounters, SweepError, SweepService, SweepSummary};
use crate::clients::MovieCatalog;
use crate::models::{RadarrWebhook, SonarrWebhook};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSummary {
    pub event_type: String,
    /// False when the event type needs no work.
    pub handled: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Movie only: whether the movie was left monitored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitored: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SweepSummary>,
}

impl WebhookSummary {
    fn acknowledged(event_type: &str) -> Self {
        Self {
            event_type: event_type.to_string(),
            handled: false,
            message: format!("Event '{event_type}' acknowledged, nothing to do"),
            id: None,
            title: None,
            monitored: None,
            summary: None,
        }
    }
}

fn require_event_type(event_type: &str) -> Result<&str, SweepError> {
    let trimmed = event_type.trim();
    if trimmed.is_empty() {
        return Err(SweepError::InvalidPayload("eventType is required".to_string()));
    }
    Ok(trimmed)
}

pub struct WebhookOrchestrator {
    sweeps: Arc<SweepService>,
    quality_profile: Option<String>,
}

impl WebhookOrchestrator {
    /// `quality_profile` is the Radarr profile name assigned to added movies.
    #[must_use]
    pub fn new(sweeps: Arc<SweepService>, quality_profile: Option<String>) -> Self {
        Self {
            sweeps,
            quality_profile: quality_profile.filter(|name| !name.trim().is_empty()),
        }
    }

    /// `seriesAdd`: latest-season policy, then one reconciliation pass.
    pub async fn handle_sonarr(
        &self,
        payload: SonarrWebhook,
        token: &CancellationToken,
    ) -> Result<WebhookSummary, SweepError> {
        let event_type = require_event_type(&payload.event_type)?;
        if !payload.is_series_add() {
            info!(service = "sonarr", event_type, "Ignoring webhook event");
            return Ok(WebhookSummary::acknowledged(event_type));
        }

        let target = payload.series.as_ref().ok_or_else(|| {
            SweepError::InvalidPayload("series is required for seriesAdd".to_string())
        })?;

        let start = Instant::now();
        info!(
            event = "webhook_received",
            service = "sonarr",
            series_id = target.id.value(),
            title = %target.title,
            "Processing added series"
        );

        let reconciler = self.sweeps.reconciler();
        let catalog = reconciler.catalogs().series();
        let counters = SweepCounters::default();

        let mut series = catalog.get_series(target.id, token).await?;
        let mut episodes = catalog.get_episodes(target.id, token).await?;
        counters.record_series();

        let writes = reconciler
            .enforce_latest_season(&mut series, &mut episodes, token)
            .await?;
        counters.add_monitoring_updates(writes);

        let created = reconciler
            .process_series_episodes(&series, &mut episodes, &counters, token)
            .await?;
        if created {
            self.sweeps.rescan_series(series.id, &counters, token).await?;
        }

        let summary = counters.summary();
        info!(
            event = "webhook_processed",
            service = "sonarr",
            series_id = series.id.value(),
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            artifacts_created = summary.artifacts_created,
            "Added series processed"
        );

        Ok(WebhookSummary {
            event_type: event_type.to_string(),
            handled: true,
            message: format!(
                "Processed {} episodes, created {} artifacts",
                summary.items_processed, summary.artifacts_created
            ),
            id: Some(series.id.value()),
            title: Some(series.title),
            monitored: None,
            summary: Some(summary),
        })
    }

    /// `movieAdd`: monitor (and optionally re-profile) the movie, reconcile it,
    /// and unmonitor it again once a valid link is in place.
    pub async fn handle_radarr(
        &self,
        payload: RadarrWebhook,
        token: &CancellationToken,
    ) -> Result<WebhookSummary, SweepError> {
        let event_type = require_event_type(&payload.event_type)?;
        if !payload.is_movie_add() {
            info!(service = "radarr", event_type, "Ignoring webhook event");
            return Ok(WebhookSummary::acknowledged(event_type));
        }

        let target = payload.movie.as_ref().ok_or_else(|| {
            SweepError::InvalidPayload("movie is required for movieAdd".to_string())
        })?;

        let reconciler = self.sweeps.reconciler();
        let catalog = reconciler.catalogs().movies()?;

        let start = Instant::now();
        info!(
            event = "webhook_received",
            service = "radarr",
            movie_id = target.id.value(),
            title = %target.title,
            "Processing added movie"
        );

        let counters = SweepCounters::default();
        let mut movie = catalog.get_movie(target.id, token).await?;
        counters.record_movie();

        movie.monitored = true;
        if let Some(name) = &self.quality_profile {
            match resolve_quality_profile(catalog, name, token).await? {
                Some(profile_id) => movie.quality_profile_id = profile_id,
                None => warn!(profile = %name, "Quality profile not found, keeping current"),
            }
        }
        catalog.update_movie(&movie, token).await?;
        counters.add_monitoring_updates(1);

        let outcome = reconciler.reconcile_movie(&mut movie, token).await?;
        counters.record(outcome);

        let still_monitored = if outcome.has_valid_link() {
            // Re-read so the write carries whatever the catalog changed meanwhile.
            let mut fresh = catalog.get_movie(movie.id, token).await?;
            fresh.monitored = false;
            catalog.update_movie(&fresh, token).await?;
            counters.add_monitoring_updates(1);
            false
        } else {
            info!(movie_id = movie.id.value(), "No valid stream link, movie stays monitored");
            true
        };

        if outcome.is_created() {
            self.sweeps.rescan_movie(movie.id, &counters, token).await?;
        }

        let summary = counters.summary();
        info!(
            event = "webhook_processed",
            service = "radarr",
            movie_id = movie.id.value(),
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            outcome = ?outcome,
            "Added movie processed"
        );

        Ok(WebhookSummary {
            event_type: event_type.to_string(),
            handled: true,
            message: if still_monitored {
                "No valid stream link, movie left monitored".to_string()
            } else {
                "Stream link in place, movie unmonitored".to_string()
            },
            id: Some(movie.id.value()),
            title: Some(movie.title),
            monitored: Some(still_monitored),
            summary: Some(summary),
        })
    }
}

async fn resolve_quality_profile(
    catalog: &dyn MovieCatalog,
    name: &str,
    token: &CancellationToken,
) -> Result<Option<i32>, SweepError> {
    let name = name.trim();
    let profiles = catalog.quality_profiles(token).await?;
    Ok(profiles
        .into_iter()
        .find(|p| p.name.trim().eq_ignore_ascii_case(name))
        .map(|p| p.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_event_type_is_rejected() {
        assert!(matches!(
            require_event_type("  "),
            Err(SweepError::InvalidPayload(_))
        ));
        assert_eq!(require_event_type(" Test ").unwrap(), "Test");
    }

    #[test]
    fn acknowledged_summary_has_no_work() {
        let summary = WebhookSummary::acknowledged("Test");
        assert!(!summary.handled);
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["eventType"], "Test");
        assert!(value.get("summary").is_none());
    }
}
