pub mod arr;
pub mod error;
pub mod radarr;
pub mod retry;
pub mod sonarr;

pub use arr::{ArrClient, ArrSettings};
pub use error::ClientError;
pub use radarr::RadarrClient;
pub use retry::RetryPolicy;
pub use sonarr::SonarrClient;

use tokio_util::sync::CancellationToken;

use crate::domain::{EpisodeId, FileId, MovieId, SeriesId};
use crate::models::{Episode, Movie, Page, QualityProfile, Series};

/// Read/write access to the series side of the catalog.
#[async_trait::async_trait]
pub trait SeriesCatalog: Send + Sync {
    async fn get_series(
        &self,
        id: SeriesId,
        token: &CancellationToken,
    ) -> Result<Series, ClientError>;

    async fn list_series(&self, token: &CancellationToken) -> Result<Vec<Series>, ClientError>;

    async fn get_episodes(
        &self,
        series_id: SeriesId,
        token: &CancellationToken,
    ) -> Result<Vec<Episode>, ClientError>;

    /// One page (1-based) of monitored episodes without a file.
    async fn wanted_missing(
        &self,
        page: u32,
        page_size: u32,
        token: &CancellationToken,
    ) -> Result<Page<Episode>, ClientError>;

    async fn update_series(
        &self,
        series: &Series,
        token: &CancellationToken,
    ) -> Result<(), ClientError>;

    /// Returns `false` when the catalog rejected the update.
    async fn update_episode(
        &self,
        episode: &Episode,
        token: &CancellationToken,
    ) -> Result<bool, ClientError>;

    /// Returns `false` when the file was already gone.
    async fn delete_episode_file(
        &self,
        file_id: FileId,
        token: &CancellationToken,
    ) -> Result<bool, ClientError>;

    async fn rescan_series(
        &self,
        id: SeriesId,
        token: &CancellationToken,
    ) -> Result<(), ClientError>;
}

/// Read/write access to the movie side of the catalog.
#[async_trait::async_trait]
pub trait MovieCatalog: Send + Sync {
    async fn get_movie(&self, id: MovieId, token: &CancellationToken)
    -> Result<Movie, ClientError>;

    async fn wanted_missing_movies(
        &self,
        page: u32,
        page_size: u32,
        token: &CancellationToken,
    ) -> Result<Page<Movie>, ClientError>;

    async fn update_movie(
        &self,
        movie: &Movie,
        token: &CancellationToken,
    ) -> Result<(), ClientError>;

    async fn delete_movie_file(
        &self,
        file_id: FileId,
        token: &CancellationToken,
    ) -> Result<bool, ClientError>;

    async fn rescan_movie(&self, id: MovieId, token: &CancellationToken)
    -> Result<(), ClientError>;

    async fn quality_profiles(
        &self,
        token: &CancellationToken,
    ) -> Result<Vec<QualityProfile>, ClientError>;
}

/// Maps a failed delete to `Ok(false)` unless it was a cancellation or a
/// transport problem worth surfacing.
pub(crate) fn tolerate_missing_file(
    service: &str,
    file_id: FileId,
    result: Result<(), ClientError>,
) -> Result<bool, ClientError> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.status().is_some() => {
            tracing::warn!(
                service,
                file_id = file_id.value(),
                error = %e,
                "Catalog file could not be deleted, treating as already gone"
            );
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Same idea for episode updates: a rejected update is reported, not raised.
pub(crate) fn tolerate_rejected_update(
    episode_id: EpisodeId,
    result: Result<(), ClientError>,
) -> Result<bool, ClientError> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.status().is_some() => {
            tracing::warn!(
                episode_id = episode_id.value(),
                error = %e,
                "Episode update rejected"
            );
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
