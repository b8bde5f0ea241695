//! Per-item reconciliation between catalog, filesystem and stream provider.
//!
//! Every item is decided fresh on each pass:
//!
//! | identifier | link    | artifact | action                                   | outcome   |
//! |------------|---------|----------|------------------------------------------|-----------|
//! | missing    | -       | -        | none                                     | `NoIdentifier` |
//! | present    | invalid | any      | delete artifact if present               | `Missing` |
//! | present    | valid   | present  | none                                     | `Present` |
//! | present    | valid   | absent   | delete catalog file, write artifact      | `Created` |
//!
//! Episode artifacts written under an earlier title (same `S{ss}E{ee}` tag,
//! different name) are removed whenever the identifier is present.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::stream_url::{StreamParams, StreamUrlTemplate};
use super::sweep::{SweepCounters, SweepError};
use super::validator::{LinkStatus, StreamValidator};
use crate::clients::{MovieCatalog, SeriesCatalog};
use crate::domain::ItemKind;
use crate::library::{FileStore, naming};
use crate::models::{Episode, Movie, Series};

/// Catalog backends, fixed when the engine is built.
#[derive(Clone)]
pub enum CatalogBackends {
    SeriesOnly {
        series: Arc<dyn SeriesCatalog>,
    },
    SeriesAndMovies {
        series: Arc<dyn SeriesCatalog>,
        movies: Arc<dyn MovieCatalog>,
    },
}

impl CatalogBackends {
    #[must_use]
    pub fn series(&self) -> &dyn SeriesCatalog {
        match self {
            Self::SeriesOnly { series } | Self::SeriesAndMovies { series, .. } => series.as_ref(),
        }
    }

    pub fn movies(&self) -> Result<&dyn MovieCatalog, SweepError> {
        match self {
            Self::SeriesOnly { .. } => Err(SweepError::MoviesNotConfigured),
            Self::SeriesAndMovies { movies, .. } => Ok(movies.as_ref()),
        }
    }

    #[must_use]
    pub const fn has_movies(&self) -> bool {
        matches!(self, Self::SeriesAndMovies { .. })
    }
}

/// Provider credentials and the two URL templates.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub username: String,
    pub password: String,
    pub series_template: StreamUrlTemplate,
    pub movie_template: StreamUrlTemplate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// No IMDb id, nothing to link to.
    NoIdentifier,
    Missing { stale_deleted: bool },
    Present,
    Created,
}

impl ItemOutcome {
    #[must_use]
    pub const fn has_valid_link(&self) -> bool {
        matches!(self, Self::Present | Self::Created)
    }

    #[must_use]
    pub const fn is_created(&self) -> bool {
        matches!(self, Self::Created)
    }
}

/// Result of applying the latest-season monitoring policy in memory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MonitoringPlan {
    pub latest_season: Option<i32>,
    pub series_changed: bool,
    /// Indices into the episode slice whose `monitored` flag flipped.
    pub changed_episodes: Vec<usize>,
}

/// Forces the series monitored and keeps only the highest season above 0
/// monitored, at both season and episode level.
pub fn plan_latest_season_only(series: &mut Series, episodes: &mut [Episode]) -> MonitoringPlan {
    let latest_season = series.latest_season();
    let mut series_changed = false;

    if !series.monitored {
        series.monitored = true;
        series_changed = true;
    }

    for season in &mut series.seasons {
        let desired = Some(season.season_number) == latest_season && !season.is_specials();
        if season.monitored != desired {
            season.monitored = desired;
            series_changed = true;
        }
    }

    let mut changed_episodes = Vec::new();
    for (index, episode) in episodes.iter_mut().enumerate() {
        let desired = episode.season_number > 0 && Some(episode.season_number) == latest_season;
        if episode.monitored != desired {
            episode.monitored = desired;
            changed_episodes.push(index);
        }
    }

    MonitoringPlan {
        latest_season,
        series_changed,
        changed_episodes,
    }
}

pub struct Reconciler {
    catalogs: CatalogBackends,
    files: Arc<dyn FileStore>,
    validator: Arc<dyn StreamValidator>,
    stream: StreamSettings,
}

impl Reconciler {
    #[must_use]
    pub fn new(
        catalogs: CatalogBackends,
        files: Arc<dyn FileStore>,
        validator: Arc<dyn StreamValidator>,
        stream: StreamSettings,
    ) -> Self {
        Self {
            catalogs,
            files,
            validator,
            stream,
        }
    }

    #[must_use]
    pub const fn catalogs(&self) -> &CatalogBackends {
        &self.catalogs
    }

    #[must_use]
    pub fn episode_stream_url(&self, imdb_id: &str, season: i32, episode: i32) -> String {
        self.stream.series_template.render(&StreamParams {
            username: &self.stream.username,
            password: &self.stream.password,
            imdb_id,
            season: Some(season),
            episode: Some(episode),
        })
    }

    #[must_use]
    pub fn movie_stream_url(&self, imdb_id: &str) -> String {
        self.stream.movie_template.render(&StreamParams {
            username: &self.stream.username,
            password: &self.stream.password,
            imdb_id,
            season: None,
            episode: None,
        })
    }

    /// Applies [`plan_latest_season_only`] and writes back only what changed.
    ///
    /// Returns the number of catalog writes that were accepted.
    pub async fn enforce_latest_season(
        &self,
        series: &mut Series,
        episodes: &mut [Episode],
        token: &CancellationToken,
    ) -> Result<usize, SweepError> {
        let plan = plan_latest_season_only(series, episodes);
        let catalog = self.catalogs.series();
        let mut writes = 0;

        if plan.series_changed {
            catalog.update_series(series, token).await?;
            writes += 1;
        }

        for index in &plan.changed_episodes {
            if token.is_cancelled() {
                return Err(SweepError::Cancelled);
            }
            let episode = &episodes[*index];
            if catalog.update_episode(episode, token).await? {
                writes += 1;
            }
        }

        debug!(
            series_id = series.id.value(),
            latest_season = plan.latest_season,
            series_changed = plan.series_changed,
            episode_updates = plan.changed_episodes.len(),
            writes,
            "Applied latest-season monitoring"
        );

        Ok(writes)
    }

    pub async fn reconcile_episode(
        &self,
        series: &Series,
        episode: &mut Episode,
        token: &CancellationToken,
    ) -> Result<ItemOutcome, SweepError> {
        let Some(imdb_id) = series.imdb_id() else {
            debug!(
                series_id = series.id.value(),
                season = episode.season_number,
                episode = episode.episode_number,
                "Series has no IMDb id, skipping episode"
            );
            return Ok(ItemOutcome::NoIdentifier);
        };

        let path = naming::episode_artifact_path(
            Path::new(&series.path),
            &series.title,
            episode.season_number,
            episode.episode_number,
            episode.title.as_deref(),
        );
        let url = self.episode_stream_url(imdb_id, episode.season_number, episode.episode_number);
        let retitled = self
            .retitled_artifacts(&path, episode.season_number, episode.episode_number)
            .await?;

        let catalog = self.catalogs.series();
        let file_id = episode.registered_file();
        let outcome = self
            .reconcile_artifact(ItemKind::Episode, &path, &retitled, &url, token, || async move {
                match file_id {
                    Some(file_id) => catalog.delete_episode_file(file_id, token).await.map(Some),
                    None => Ok(None),
                }
            })
            .await?;

        if outcome.is_created() {
            episode.clear_file();
        }
        Ok(outcome)
    }

    pub async fn reconcile_movie(
        &self,
        movie: &mut Movie,
        token: &CancellationToken,
    ) -> Result<ItemOutcome, SweepError> {
        let catalog = self.catalogs.movies()?;

        let Some(imdb_id) = movie.imdb_id() else {
            debug!(movie_id = movie.id.value(), "Movie has no IMDb id, skipping");
            return Ok(ItemOutcome::NoIdentifier);
        };

        let path = naming::movie_artifact_path(Path::new(&movie.path), &movie.title, movie.year);
        let url = self.movie_stream_url(imdb_id);

        let file_id = movie.registered_file();
        let outcome = self
            .reconcile_artifact(ItemKind::Movie, &path, &[], &url, token, || async move {
                match file_id {
                    Some(file_id) => catalog.delete_movie_file(file_id, token).await.map(Some),
                    None => Ok(None),
                }
            })
            .await?;

        if outcome.is_created() {
            movie.clear_file();
        }
        Ok(outcome)
    }

    /// Artifacts in `path`'s directory for the same episode under another title.
    async fn retitled_artifacts(
        &self,
        path: &Path,
        season: i32,
        episode: i32,
    ) -> Result<Vec<PathBuf>, SweepError> {
        let Some(dir) = path.parent() else {
            return Ok(Vec::new());
        };
        let files = self
            .files
            .list_files(dir, naming::ARTIFACT_EXTENSION)
            .await
            .map_err(|e| SweepError::io(dir, e))?;

        Ok(files
            .into_iter()
            .filter(|file| file != path)
            .filter(|file| {
                file.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| naming::is_episode_artifact(name, season, episode))
            })
            .collect())
    }

    async fn remove_retitled(
        &self,
        kind: ItemKind,
        retitled: &[PathBuf],
    ) -> Result<(), SweepError> {
        for path in retitled {
            self.files
                .delete(path)
                .await
                .map_err(|e| SweepError::io(path, e))?;
            info!(
                item = %kind,
                path = %path.display(),
                "Removed artifact left under a previous title"
            );
        }
        Ok(())
    }

    async fn reconcile_artifact<F, Fut>(
        &self,
        kind: ItemKind,
        path: &Path,
        retitled: &[PathBuf],
        url: &str,
        token: &CancellationToken,
        delete_catalog_file: F,
    ) -> Result<ItemOutcome, SweepError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<bool>, crate::clients::ClientError>>,
    {
        if token.is_cancelled() {
            return Err(SweepError::Cancelled);
        }

        let exists = self
            .files
            .exists(path)
            .await
            .map_err(|e| SweepError::io(path, e))?;

        let status = self.validator.validate(url, token).await?;
        self.remove_retitled(kind, retitled).await?;

        if let LinkStatus::Invalid(reason) = status {
            if exists {
                self.files
                    .delete(path)
                    .await
                    .map_err(|e| SweepError::io(path, e))?;
                info!(
                    item = %kind,
                    path = %path.display(),
                    reason = %reason,
                    "Removed stale artifact"
                );
            }
            return Ok(ItemOutcome::Missing {
                stale_deleted: exists || !retitled.is_empty(),
            });
        }

        if exists {
            return Ok(ItemOutcome::Present);
        }

        if let Some(deleted) = delete_catalog_file().await? {
            debug!(item = %kind, deleted, "Cleared catalog file before writing artifact");
        }

        if let Some(dir) = path.parent() {
            self.files
                .create_dir_all(dir)
                .await
                .map_err(|e| SweepError::io(dir, e))?;
        }
        self.files
            .write_text(path, url)
            .await
            .map_err(|e| SweepError::io(path, e))?;

        metrics::counter!("strmarr_artifacts_created_total", "kind" => kind.as_str())
            .increment(1);
        info!(item = %kind, path = %path.display(), "Created artifact");

        Ok(ItemOutcome::Created)
    }

    /// Reconciles the monitored, non-special episodes of one series in order.
    ///
    /// Item failures are logged and counted; only cancellation escapes.
    /// Returns true when at least one artifact was created.
    pub async fn process_series_episodes(
        &self,
        series: &Series,
        episodes: &mut [Episode],
        counters: &SweepCounters,
        token: &CancellationToken,
    ) -> Result<bool, SweepError> {
        let mut created_any = false;

        for episode in episodes
            .iter_mut()
            .filter(|e| e.monitored && e.season_number > 0)
        {
            if token.is_cancelled() {
                return Err(cancelled_after(series, created_any));
            }

            match self.reconcile_episode(series, episode, token).await {
                Ok(outcome) => {
                    created_any |= outcome.is_created();
                    counters.record(outcome);
                }
                Err(SweepError::Cancelled) => return Err(cancelled_after(series, created_any)),
                Err(e) => {
                    error!(
                        series_id = series.id.value(),
                        episode_id = episode.id.value(),
                        season = episode.season_number,
                        episode = episode.episode_number,
                        error = %e,
                        "Episode reconciliation failed"
                    );
                    counters.record_item_failure();
                }
            }
        }

        Ok(created_any)
    }

    /// Reconciles one movie, folding failures into the counters like
    /// [`Self::process_series_episodes`]. Returns the outcome when there was one.
    pub async fn process_movie(
        &self,
        movie: &mut Movie,
        counters: &SweepCounters,
        token: &CancellationToken,
    ) -> Result<Option<ItemOutcome>, SweepError> {
        match self.reconcile_movie(movie, token).await {
            Ok(outcome) => {
                counters.record(outcome);
                Ok(Some(outcome))
            }
            Err(e @ (SweepError::Cancelled | SweepError::MoviesNotConfigured)) => Err(e),
            Err(e) => {
                warn!(movie_id = movie.id.value(), error = %e, "Movie reconciliation failed");
                counters.record_item_failure();
                Ok(None)
            }
        }
    }
}

/// The rescan for artifacts already written in this pass will not happen, and
/// later passes see them as present, so say so.
fn cancelled_after(series: &Series, created_any: bool) -> SweepError {
    if created_any {
        warn!(
            series_id = series.id.value(),
            title = %series.title,
            "Cancelled after creating artifacts, series needs a manual rescan"
        );
    }
    SweepError::Cancelled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EpisodeId, FileId, SeriesId};
    use crate::models::Season;

    fn season(number: i32, monitored: bool) -> Season {
        Season {
            season_number: number,
            monitored,
            statistics: None,
            extra: serde_json::Map::new(),
        }
    }

    fn episode(id: i32, season: i32, monitored: bool) -> Episode {
        Episode {
            id: EpisodeId::new(id),
            series_id: SeriesId::new(1),
            episode_file_id: FileId::new(0),
            season_number: season,
            episode_number: 1,
            title: None,
            has_file: false,
            monitored,
            extra: serde_json::Map::new(),
        }
    }

    fn series(seasons: Vec<Season>, monitored: bool) -> Series {
        Series {
            id: SeriesId::new(1),
            title: "Show".to_string(),
            path: "/tv/Show".to_string(),
            imdb_id: Some("tt1".to_string()),
            year: 2020,
            monitored,
            seasons,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn only_latest_season_stays_monitored() {
        let mut s = series(
            vec![
                season(0, true),
                season(1, true),
                season(2, false),
                season(3, false),
            ],
            false,
        );
        let mut eps = vec![
            episode(1, 0, true),
            episode(2, 1, true),
            episode(3, 3, false),
            episode(4, 3, true),
        ];

        let plan = plan_latest_season_only(&mut s, &mut eps);

        assert_eq!(plan.latest_season, Some(3));
        assert!(plan.series_changed);
        assert!(s.monitored);
        let monitored: Vec<i32> = s
            .seasons
            .iter()
            .filter(|x| x.monitored)
            .map(|x| x.season_number)
            .collect();
        assert_eq!(monitored, vec![3]);
        assert_eq!(plan.changed_episodes, vec![0, 1, 2]);
        assert!(eps[2].monitored && eps[3].monitored);
        assert!(!eps[0].monitored && !eps[1].monitored);
    }

    #[test]
    fn compliant_series_needs_no_writes() {
        let mut s = series(vec![season(0, false), season(1, false), season(2, true)], true);
        let mut eps = vec![episode(1, 1, false), episode(2, 2, true)];
        let plan = plan_latest_season_only(&mut s, &mut eps);
        assert!(!plan.series_changed);
        assert!(plan.changed_episodes.is_empty());
    }

    #[test]
    fn specials_only_series_monitors_nothing() {
        let mut s = series(vec![season(0, true)], true);
        let mut eps = vec![episode(1, 0, true)];
        let plan = plan_latest_season_only(&mut s, &mut eps);
        assert_eq!(plan.latest_season, None);
        assert!(!s.seasons[0].monitored);
        assert!(!eps[0].monitored);
    }

    #[test]
    fn outcome_flags() {
        assert!(ItemOutcome::Created.has_valid_link());
        assert!(ItemOutcome::Present.has_valid_link());
        assert!(!ItemOutcome::Present.is_created());
        assert!(!ItemOutcome::Missing { stale_deleted: true }.has_valid_link());
        assert!(!ItemOutcome::NoIdentifier.has_valid_link());
    }
}
