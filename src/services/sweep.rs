//! Sweeps: full-catalog and wanted/missing passes over the reconciler.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use futures::StreamExt;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::reconcile::{ItemOutcome, Reconciler};
use crate::clients::ClientError;
use crate::domain::{MovieId, SeriesId};
use crate::models::{Episode, Page, Series};

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("sweep cancelled")]
    Cancelled,

    #[error(transparent)]
    Catalog(ClientError),

    #[error("filesystem error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("movie support is not configured")]
    MoviesNotConfigured,
}

impl SweepError {
    pub fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<ClientError> for SweepError {
    fn from(err: ClientError) -> Self {
        if err.is_cancelled() {
            Self::Cancelled
        } else {
            Self::Catalog(err)
        }
    }
}

/// Aggregate result of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepSummary {
    pub series_processed: usize,
    pub movies_processed: usize,
    pub items_processed: usize,
    pub valid_links: usize,
    pub missing: usize,
    pub artifacts_created: usize,
    pub rescans_triggered: usize,
    pub monitoring_updates: usize,
    pub errors: usize,
}

/// Shared counters for a sweep whose parents may run in parallel.
#[derive(Debug, Default)]
pub struct SweepCounters {
    series_processed: AtomicUsize,
    movies_processed: AtomicUsize,
    items_processed: AtomicUsize,
    valid_links: AtomicUsize,
    missing: AtomicUsize,
    artifacts_created: AtomicUsize,
    rescans_triggered: AtomicUsize,
    monitoring_updates: AtomicUsize,
    errors: AtomicUsize,
}

impl SweepCounters {
    pub fn record(&self, outcome: ItemOutcome) {
        self.items_processed.fetch_add(1, Ordering::Relaxed);
        match outcome {
            ItemOutcome::NoIdentifier => {}
            ItemOutcome::Missing { .. } => {
                self.missing.fetch_add(1, Ordering::Relaxed);
            }
            ItemOutcome::Present => {
                self.valid_links.fetch_add(1, Ordering::Relaxed);
            }
            ItemOutcome::Created => {
                self.valid_links.fetch_add(1, Ordering::Relaxed);
                self.artifacts_created.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// An item that failed unexpectedly counts as processed, missing and an error.
    pub fn record_item_failure(&self) {
        self.items_processed.fetch_add(1, Ordering::Relaxed);
        self.missing.fetch_add(1, Ordering::Relaxed);
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_series(&self) {
        self.series_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_movie(&self) {
        self.movies_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rescan(&self) {
        self.rescans_triggered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_monitoring_updates(&self, count: usize) {
        self.monitoring_updates.fetch_add(count, Ordering::Relaxed);
    }

    #[must_use]
    pub fn summary(&self) -> SweepSummary {
        SweepSummary {
            series_processed: self.series_processed.load(Ordering::Relaxed),
            movies_processed: self.movies_processed.load(Ordering::Relaxed),
            items_processed: self.items_processed.load(Ordering::Relaxed),
            valid_links: self.valid_links.load(Ordering::Relaxed),
            missing: self.missing.load(Ordering::Relaxed),
            artifacts_created: self.artifacts_created.load(Ordering::Relaxed),
            rescans_triggered: self.rescans_triggered.load(Ordering::Relaxed),
            monitoring_updates: self.monitoring_updates.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Both halves of a wanted/missing sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WantedSummary {
    pub episodes: SweepSummary,
    /// Absent when movie support is not configured.
    pub movies: Option<SweepSummary>,
}

/// Fetches 1-based pages until one comes back empty or the reported total is
/// covered. Never requests a page past that boundary.
pub async fn collect_pages<T, F, Fut>(
    page_size: u32,
    token: &CancellationToken,
    mut fetch: F,
) -> Result<Vec<T>, SweepError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, ClientError>>,
{
    let page_size = page_size.max(1);
    let mut items = Vec::new();
    let mut page = 1;

    loop {
        if token.is_cancelled() {
            return Err(SweepError::Cancelled);
        }

        let batch = fetch(page).await?;
        if batch.records.is_empty() {
            break;
        }

        let last = batch.is_last(page, page_size);
        items.extend(batch.records);
        if last {
            break;
        }
        page += 1;
    }

    Ok(items)
}

#[derive(Debug, Clone, Copy)]
pub struct SweepOptions {
    pub parallelism: usize,
    pub page_size: u32,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            parallelism: crate::constants::sweep::PARALLELISM,
            page_size: crate::constants::sweep::PAGE_SIZE,
        }
    }
}

/// Drives the reconciler over the catalog.
pub struct SweepService {
    reconciler: Arc<Reconciler>,
    options: SweepOptions,
}

impl SweepService {
    #[must_use]
    pub fn new(reconciler: Arc<Reconciler>, options: SweepOptions) -> Self {
        Self {
            reconciler,
            options,
        }
    }

    #[must_use]
    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    #[must_use]
    pub fn has_movies(&self) -> bool {
        self.reconciler.catalogs().has_movies()
    }

    /// Every series (optionally only monitored ones) gets the latest-season
    /// policy and a reconciliation pass. Series run `parallelism` at a time.
    pub async fn run_full_sweep(
        &self,
        only_monitored: bool,
        token: &CancellationToken,
    ) -> Result<SweepSummary, SweepError> {
        let start = Instant::now();
        info!(
            event = "sweep_started",
            job_name = "full_sweep",
            only_monitored,
            "Starting full series sweep"
        );

        let result = self.full_sweep_inner(only_monitored, token).await;
        finish("full_sweep", start, result)
    }

    async fn full_sweep_inner(
        &self,
        only_monitored: bool,
        token: &CancellationToken,
    ) -> Result<SweepSummary, SweepError> {
        let catalog = self.reconciler.catalogs().series();
        let series: Vec<Series> = catalog
            .list_series(token)
            .await?
            .into_iter()
            .filter(|s| !only_monitored || s.monitored)
            .collect();

        let counters = SweepCounters::default();
        let counters_ref = &counters;

        let mut runs = futures::stream::iter(series)
            .map(|s| {
                let id = s.id.value();
                guard_parent(id, counters_ref, self.sync_full_series(s, counters_ref, token))
            })
            .buffer_unordered(self.options.parallelism.max(1));

        while let Some(result) = runs.next().await {
            result?;
        }
        drop(runs);

        Ok(counters.summary())
    }

    async fn sync_full_series(
        &self,
        mut series: Series,
        counters: &SweepCounters,
        token: &CancellationToken,
    ) -> Result<(), SweepError> {
        if token.is_cancelled() {
            return Err(SweepError::Cancelled);
        }
        counters.record_series();

        let catalog = self.reconciler.catalogs().series();
        let mut episodes = catalog.get_episodes(series.id, token).await?;

        let writes = self
            .reconciler
            .enforce_latest_season(&mut series, &mut episodes, token)
            .await?;
        counters.add_monitoring_updates(writes);

        let created = self
            .reconciler
            .process_series_episodes(&series, &mut episodes, counters, token)
            .await?;

        if created {
            self.rescan_series(series.id, counters, token).await?;
        }
        Ok(())
    }

    /// Wanted/missing episodes, grouped by series. Each series is fetched once
    /// and rescanned only if an artifact was created for it.
    pub async fn run_wanted_episodes(
        &self,
        token: &CancellationToken,
    ) -> Result<SweepSummary, SweepError> {
        let start = Instant::now();
        info!(
            event = "sweep_started",
            job_name = "wanted_episodes",
            "Starting wanted/missing episode sweep"
        );

        let result = self.wanted_episodes_inner(token).await;
        finish("wanted_episodes", start, result)
    }

    async fn wanted_episodes_inner(
        &self,
        token: &CancellationToken,
    ) -> Result<SweepSummary, SweepError> {
        let catalog = self.reconciler.catalogs().series();
        let page_size = self.options.page_size;

        let wanted = collect_pages(page_size, token, |page| {
            catalog.wanted_missing(page, page_size, token)
        })
        .await?;

        let mut by_series: BTreeMap<SeriesId, Vec<Episode>> = BTreeMap::new();
        for episode in wanted.into_iter().filter(|e| e.monitored) {
            by_series.entry(episode.series_id).or_default().push(episode);
        }

        info!(
            series = by_series.len(),
            episodes = by_series.values().map(Vec::len).sum::<usize>(),
            "Fetched wanted/missing episodes"
        );

        let counters = SweepCounters::default();
        for (series_id, episodes) in by_series {
            if token.is_cancelled() {
                return Err(SweepError::Cancelled);
            }
            guard_parent(
                series_id.value(),
                &counters,
                self.sync_wanted_series(series_id, episodes, &counters, token),
            )
            .await?;
        }

        Ok(counters.summary())
    }

    async fn sync_wanted_series(
        &self,
        series_id: SeriesId,
        mut episodes: Vec<Episode>,
        counters: &SweepCounters,
        token: &CancellationToken,
    ) -> Result<(), SweepError> {
        let series = self
            .reconciler
            .catalogs()
            .series()
            .get_series(series_id, token)
            .await?;
        counters.record_series();

        let created = self
            .reconciler
            .process_series_episodes(&series, &mut episodes, counters, token)
            .await?;

        if created {
            self.rescan_series(series_id, counters, token).await?;
        }
        Ok(())
    }

    /// Wanted/missing movies. Every movie is its own parent.
    pub async fn run_wanted_movies(
        &self,
        token: &CancellationToken,
    ) -> Result<SweepSummary, SweepError> {
        let start = Instant::now();
        info!(
            event = "sweep_started",
            job_name = "wanted_movies",
            "Starting wanted/missing movie sweep"
        );

        let result = self.wanted_movies_inner(token).await;
        finish("wanted_movies", start, result)
    }

    async fn wanted_movies_inner(
        &self,
        token: &CancellationToken,
    ) -> Result<SweepSummary, SweepError> {
        let catalog = self.reconciler.catalogs().movies()?;
        let page_size = self.options.page_size;

        let wanted = collect_pages(page_size, token, |page| {
            catalog.wanted_missing_movies(page, page_size, token)
        })
        .await?;

        let counters = SweepCounters::default();
        for mut movie in wanted.into_iter().filter(|m| m.monitored) {
            if token.is_cancelled() {
                return Err(SweepError::Cancelled);
            }
            counters.record_movie();

            let outcome = self
                .reconciler
                .process_movie(&mut movie, &counters, token)
                .await?;
            if outcome.is_some_and(|o| o.is_created()) {
                guard_parent(
                    movie.id.value(),
                    &counters,
                    self.rescan_movie(movie.id, &counters, token),
                )
                .await?;
            }
        }

        Ok(counters.summary())
    }

    /// Runs the episode and movie halves concurrently and waits for both.
    pub async fn run_wanted(&self, token: &CancellationToken) -> Result<WantedSummary, SweepError> {
        if !self.has_movies() {
            let episodes = self.run_wanted_episodes(token).await?;
            return Ok(WantedSummary {
                episodes,
                movies: None,
            });
        }

        let (episodes, movies) =
            tokio::join!(self.run_wanted_episodes(token), self.run_wanted_movies(token));

        if matches!(episodes, Err(SweepError::Cancelled))
            || matches!(movies, Err(SweepError::Cancelled))
        {
            return Err(SweepError::Cancelled);
        }

        Ok(WantedSummary {
            episodes: episodes?,
            movies: Some(movies?),
        })
    }

    pub(crate) async fn rescan_series(
        &self,
        id: SeriesId,
        counters: &SweepCounters,
        token: &CancellationToken,
    ) -> Result<(), SweepError> {
        self.reconciler
            .catalogs()
            .series()
            .rescan_series(id, token)
            .await
            .inspect_err(|e| {
                warn!(
                    series_id = id.value(),
                    error = %e,
                    "Rescan not issued for new artifacts, series needs a manual rescan"
                );
            })?;
        counters.record_rescan();
        metrics::counter!("strmarr_rescans_total", "kind" => "series").increment(1);
        info!(series_id = id.value(), "Triggered series rescan");
        Ok(())
    }

    pub(crate) async fn rescan_movie(
        &self,
        id: MovieId,
        counters: &SweepCounters,
        token: &CancellationToken,
    ) -> Result<(), SweepError> {
        self.reconciler
            .catalogs()
            .movies()?
            .rescan_movie(id, token)
            .await
            .inspect_err(|e| {
                warn!(
                    movie_id = id.value(),
                    error = %e,
                    "Rescan not issued for new artifact, movie needs a manual rescan"
                );
            })?;
        counters.record_rescan();
        metrics::counter!("strmarr_rescans_total", "kind" => "movie").increment(1);
        info!(movie_id = id.value(), "Triggered movie rescan");
        Ok(())
    }
}

/// Error boundary for one parent: anything but cancellation is logged,
/// counted and swallowed.
async fn guard_parent<F>(
    parent_id: i32,
    counters: &SweepCounters,
    work: F,
) -> Result<(), SweepError>
where
    F: Future<Output = Result<(), SweepError>>,
{
    match work.await {
        Ok(()) => Ok(()),
        Err(SweepError::Cancelled) => Err(SweepError::Cancelled),
        Err(e) => {
            error!(parent_id, error = %e, "Parent processing failed, continuing sweep");
            counters.record_error();
            Ok(())
        }
    }
}

fn finish<T: std::fmt::Debug>(
    job_name: &'static str,
    start: Instant,
    result: Result<T, SweepError>,
) -> Result<T, SweepError> {
    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    match &result {
        Ok(summary) => {
            metrics::counter!("strmarr_sweeps_total", "cadence" => job_name, "result" => "success")
                .increment(1);
            info!(
                event = "sweep_finished",
                job_name,
                duration_ms,
                summary = ?summary,
                "Sweep completed"
            );
        }
        Err(SweepError::Cancelled) => {
            metrics::counter!("strmarr_sweeps_total", "cadence" => job_name, "result" => "cancelled")
                .increment(1);
            warn!(event = "sweep_cancelled", job_name, duration_ms, "Sweep cancelled");
        }
        Err(e) => {
            metrics::counter!("strmarr_sweeps_total", "cadence" => job_name, "result" => "failure")
                .increment(1);
            error!(
                event = "sweep_failed",
                job_name,
                duration_ms,
                error = %e,
                "Sweep failed"
            );
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn page(page: u32, total: u32, count: usize) -> Page<u32> {
        Page {
            page,
            page_size: 2,
            total_records: total,
            records: (0..count).map(|i| u32::try_from(i).unwrap()).collect(),
        }
    }

    #[tokio::test]
    async fn pagination_stops_at_reported_total() {
        let requested = Mutex::new(Vec::new());
        let token = CancellationToken::new();

        let items = collect_pages(2, &token, |p| {
            requested.lock().unwrap().push(p);
            async move { Ok(page(p, 5, if p < 3 { 2 } else { 1 })) }
        })
        .await
        .unwrap();

        assert_eq!(items.len(), 5);
        assert_eq!(*requested.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn pagination_stops_on_empty_page() {
        let requested = Mutex::new(Vec::new());
        let token = CancellationToken::new();

        let items = collect_pages(2, &token, |p| {
            requested.lock().unwrap().push(p);
            // Server claims more than it delivers.
            async move { Ok(page(p, 100, if p == 1 { 2 } else { 0 })) }
        })
        .await
        .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(*requested.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn pagination_honours_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let result = collect_pages(2, &token, |p| async move { Ok(page(p, 4, 2)) }).await;
        assert!(matches!(result, Err(SweepError::Cancelled)));
    }

    #[test]
    fn counters_fold_outcomes() {
        let counters = SweepCounters::default();
        counters.record(ItemOutcome::Created);
        counters.record(ItemOutcome::Present);
        counters.record(ItemOutcome::Missing {
            stale_deleted: false,
        });
        counters.record(ItemOutcome::NoIdentifier);
        counters.record_item_failure();

        let summary = counters.summary();
        assert_eq!(summary.items_processed, 5);
        assert_eq!(summary.valid_links, 2);
        assert_eq!(summary.artifacts_created, 1);
        assert_eq!(summary.missing, 2);
        assert_eq!(summary.errors, 1);
    }

    #[test]
    fn cancelled_client_error_becomes_cancelled_sweep() {
        assert!(SweepError::from(ClientError::Cancelled).is_cancelled());
        assert!(!SweepError::from(ClientError::InvalidRequest("x".into())).is_cancelled());
    }
}
