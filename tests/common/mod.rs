#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use strmarr::clients::{ClientError, MovieCatalog, SeriesCatalog};
use strmarr::config::Config;
use strmarr::domain::{EpisodeId, FileId, MovieId, SeriesId};
use strmarr::library::LocalFileStore;
use strmarr::models::{Episode, Movie, MovieFile, Page, QualityProfile, Season, Series};
use strmarr::services::stream_url::StreamUrlTemplate;
use strmarr::services::validator::{InvalidReason, LinkStatus, StreamValidator};
use strmarr::services::{CatalogBackends, StreamSettings};
use strmarr::state::SharedState;

pub const SERIES_TEMPLATE: &str = "https://stream.test/{username}/{password}/tv/{imdbId}/{season}/{episode}";
pub const MOVIE_TEMPLATE: &str = "https://stream.test/{username}/{password}/movie/{imdbId}";

fn server_error(operation: &str) -> ClientError {
    ClientError::Status {
        operation: operation.to_string(),
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: String::new(),
    }
}

fn not_found(operation: &str) -> ClientError {
    ClientError::Status {
        operation: operation.to_string(),
        status: StatusCode::NOT_FOUND,
        body: String::new(),
    }
}

fn page_of<T: Clone>(items: &[T], page: u32, page_size: u32) -> Page<T> {
    let start = ((page.max(1) - 1) * page_size) as usize;
    let records = items
        .iter()
        .skip(start)
        .take(page_size as usize)
        .cloned()
        .collect();
    Page {
        page,
        page_size,
        total_records: u32::try_from(items.len()).unwrap(),
        records,
    }
}

/// In-memory Sonarr that records every write.
#[derive(Default)]
pub struct FakeSeriesCatalog {
    pub series: Mutex<BTreeMap<SeriesId, Series>>,
    pub episodes: Mutex<BTreeMap<SeriesId, Vec<Episode>>>,
    pub wanted: Mutex<Vec<Episode>>,
    pub failing_series: Mutex<HashSet<SeriesId>>,
    pub calls: Mutex<Vec<String>>,
    pub wanted_pages_requested: Mutex<Vec<u32>>,
    pub rescans_fail: AtomicBool,
}

impl FakeSeriesCatalog {
    pub fn add_series(&self, series: Series, episodes: Vec<Episode>) {
        self.episodes.lock().unwrap().insert(series.id, episodes);
        self.series.lock().unwrap().insert(series.id, series);
    }

    pub fn set_wanted(&self, episodes: Vec<Episode>) {
        *self.wanted.lock().unwrap() = episodes;
    }

    pub fn fail_series(&self, id: SeriesId) {
        self.failing_series.lock().unwrap().insert(id);
    }

    pub fn fail_rescans(&self) {
        self.rescans_fail.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_failing(&self, id: SeriesId, operation: &str) -> Result<(), ClientError> {
        if self.failing_series.lock().unwrap().contains(&id) {
            return Err(server_error(operation));
        }
        Ok(())
    }
}

#[async_trait]
impl SeriesCatalog for FakeSeriesCatalog {
    async fn get_series(
        &self,
        id: SeriesId,
        token: &CancellationToken,
    ) -> Result<Series, ClientError> {
        if token.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        self.check_failing(id, "get_series")?;
        self.series
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("get_series"))
    }

    async fn list_series(&self, _token: &CancellationToken) -> Result<Vec<Series>, ClientError> {
        Ok(self.series.lock().unwrap().values().cloned().collect())
    }

    async fn get_episodes(
        &self,
        series_id: SeriesId,
        _token: &CancellationToken,
    ) -> Result<Vec<Episode>, ClientError> {
        self.check_failing(series_id, "get_episodes")?;
        Ok(self
            .episodes
            .lock()
            .unwrap()
            .get(&series_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn wanted_missing(
        &self,
        page: u32,
        page_size: u32,
        _token: &CancellationToken,
    ) -> Result<Page<Episode>, ClientError> {
        self.wanted_pages_requested.lock().unwrap().push(page);
        Ok(page_of(&self.wanted.lock().unwrap(), page, page_size))
    }

    async fn update_series(
        &self,
        series: &Series,
        _token: &CancellationToken,
    ) -> Result<(), ClientError> {
        self.record(format!("update_series {}", series.id));
        self.series.lock().unwrap().insert(series.id, series.clone());
        Ok(())
    }

    async fn update_episode(
        &self,
        episode: &Episode,
        _token: &CancellationToken,
    ) -> Result<bool, ClientError> {
        self.record(format!(
            "update_episode {} monitored={}",
            episode.id, episode.monitored
        ));
        if let Some(list) = self.episodes.lock().unwrap().get_mut(&episode.series_id)
            && let Some(stored) = list.iter_mut().find(|e| e.id == episode.id)
        {
            stored.monitored = episode.monitored;
        }
        Ok(true)
    }

    async fn delete_episode_file(
        &self,
        file_id: FileId,
        _token: &CancellationToken,
    ) -> Result<bool, ClientError> {
        self.record(format!("delete_episode_file {file_id}"));
        Ok(true)
    }

    async fn rescan_series(
        &self,
        id: SeriesId,
        _token: &CancellationToken,
    ) -> Result<(), ClientError> {
        self.record(format!("rescan_series {id}"));
        if self.rescans_fail.load(Ordering::SeqCst) {
            return Err(server_error("rescan_series"));
        }
        Ok(())
    }
}

/// In-memory Radarr that records every write.
#[derive(Default)]
pub struct FakeMovieCatalog {
    pub movies: Mutex<BTreeMap<MovieId, Movie>>,
    pub wanted: Mutex<Vec<Movie>>,
    pub profiles: Mutex<Vec<QualityProfile>>,
    pub calls: Mutex<Vec<String>>,
    pub updates: Mutex<Vec<Movie>>,
}

impl FakeMovieCatalog {
    pub fn add_movie(&self, movie: Movie) {
        self.movies.lock().unwrap().insert(movie.id, movie);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<Movie> {
        self.updates.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MovieCatalog for FakeMovieCatalog {
    async fn get_movie(
        &self,
        id: MovieId,
        _token: &CancellationToken,
    ) -> Result<Movie, ClientError> {
        self.movies
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("get_movie"))
    }

    async fn wanted_missing_movies(
        &self,
        page: u32,
        page_size: u32,
        _token: &CancellationToken,
    ) -> Result<Page<Movie>, ClientError> {
        Ok(page_of(&self.wanted.lock().unwrap(), page, page_size))
    }

    async fn update_movie(
        &self,
        movie: &Movie,
        _token: &CancellationToken,
    ) -> Result<(), ClientError> {
        self.record(format!(
            "update_movie {} monitored={}",
            movie.id, movie.monitored
        ));
        self.updates.lock().unwrap().push(movie.clone());
        self.movies.lock().unwrap().insert(movie.id, movie.clone());
        Ok(())
    }

    async fn delete_movie_file(
        &self,
        file_id: FileId,
        _token: &CancellationToken,
    ) -> Result<bool, ClientError> {
        self.record(format!("delete_movie_file {file_id}"));
        Ok(true)
    }

    async fn rescan_movie(
        &self,
        id: MovieId,
        _token: &CancellationToken,
    ) -> Result<(), ClientError> {
        self.record(format!("rescan_movie {id}"));
        Ok(())
    }

    async fn quality_profiles(
        &self,
        _token: &CancellationToken,
    ) -> Result<Vec<QualityProfile>, ClientError> {
        Ok(self.profiles.lock().unwrap().clone())
    }
}

/// Valid unless the URL contains one of the configured fragments.
#[derive(Default)]
pub struct ScriptedValidator {
    invalid_fragments: Mutex<Vec<String>>,
    checks: AtomicUsize,
    /// Cancels this token once `cancel_after` checks have happened.
    cancel: Mutex<Option<(usize, CancellationToken)>>,
}

impl ScriptedValidator {
    pub fn reject(&self, fragment: &str) {
        self.invalid_fragments
            .lock()
            .unwrap()
            .push(fragment.to_string());
    }

    pub fn accept_all(&self) {
        self.invalid_fragments.lock().unwrap().clear();
    }

    pub fn cancel_after(&self, checks: usize, token: CancellationToken) {
        *self.cancel.lock().unwrap() = Some((checks, token));
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamValidator for ScriptedValidator {
    async fn validate(
        &self,
        url: &str,
        token: &CancellationToken,
    ) -> Result<LinkStatus, ClientError> {
        if token.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        let seen = self.checks.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, cancel)) = self.cancel.lock().unwrap().as_ref()
            && seen >= *limit
        {
            cancel.cancel();
        }

        let invalid = self
            .invalid_fragments
            .lock()
            .unwrap()
            .iter()
            .any(|f| url.contains(f.as_str()));
        Ok(if invalid {
            LinkStatus::Invalid(InvalidReason::Status(404))
        } else {
            LinkStatus::Valid
        })
    }
}

/// Collects formatted log lines for the current thread while installed.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn season(number: i32, monitored: bool) -> Season {
    Season {
        season_number: number,
        monitored,
        ..Season::default()
    }
}

pub fn series(id: i32, title: &str, root: &Path, seasons: Vec<Season>) -> Series {
    Series {
        id: SeriesId::new(id),
        title: title.to_string(),
        path: root.join(title).to_string_lossy().into_owned(),
        imdb_id: Some(format!("tt{id:07}")),
        year: 2020,
        monitored: true,
        seasons,
        ..Series::default()
    }
}

pub fn episode(id: i32, series_id: i32, season: i32, number: i32, monitored: bool) -> Episode {
    Episode {
        id: EpisodeId::new(id),
        series_id: SeriesId::new(series_id),
        season_number: season,
        episode_number: number,
        title: Some(format!("Chapter {number}")),
        monitored,
        ..Episode::default()
    }
}

/// An episode that already has a real media file registered in the catalog.
pub fn episode_with_file(
    id: i32,
    series_id: i32,
    season: i32,
    number: i32,
    file_id: i32,
) -> Episode {
    Episode {
        has_file: true,
        episode_file_id: FileId::new(file_id),
        ..episode(id, series_id, season, number, true)
    }
}

pub fn movie(id: i32, title: &str, year: i32, root: &Path) -> Movie {
    Movie {
        id: MovieId::new(id),
        title: title.to_string(),
        year,
        path: root.join(format!("{title} ({year})")).to_string_lossy().into_owned(),
        imdb_id: Some(format!("tt{:07}", 9_000_000 + id)),
        monitored: true,
        quality_profile_id: 1,
        ..Movie::default()
    }
}

pub fn movie_with_file(id: i32, title: &str, year: i32, root: &Path, file_id: i32) -> Movie {
    Movie {
        has_file: true,
        movie_file: Some(MovieFile {
            id: FileId::new(file_id),
            ..MovieFile::default()
        }),
        ..movie(id, title, year, root)
    }
}

pub fn episode_artifact(series: &Series, season: i32, number: i32) -> PathBuf {
    strmarr::library::naming::episode_artifact_path(
        Path::new(&series.path),
        &series.title,
        season,
        number,
        Some(&format!("Chapter {number}")),
    )
}

pub fn movie_artifact(movie: &Movie) -> PathBuf {
    strmarr::library::naming::movie_artifact_path(Path::new(&movie.path), &movie.title, movie.year)
}

pub fn stream_settings() -> StreamSettings {
    StreamSettings {
        username: "user".to_string(),
        password: "pass".to_string(),
        series_template: StreamUrlTemplate::parse(SERIES_TEMPLATE).unwrap(),
        movie_template: StreamUrlTemplate::parse(MOVIE_TEMPLATE).unwrap(),
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.sonarr.api_key = "test".to_string();
    config.stream.username = "user".to_string();
    config.stream.password = "pass".to_string();
    config.sweep.parallelism = 2;
    config.sweep.page_size = 2;
    config
}

/// Everything a test needs: fakes, a temp library root and the wired state.
pub struct Harness {
    pub root: TempDir,
    pub series: Arc<FakeSeriesCatalog>,
    pub movies: Arc<FakeMovieCatalog>,
    pub validator: Arc<ScriptedValidator>,
    pub state: Arc<SharedState>,
}

impl Harness {
    pub fn new(with_movies: bool) -> Self {
        Self::with_config(test_config(), with_movies, CancellationToken::new())
    }

    pub fn with_config(config: Config, with_movies: bool, shutdown: CancellationToken) -> Self {
        let root = tempfile::tempdir().unwrap();
        let series = Arc::new(FakeSeriesCatalog::default());
        let movies = Arc::new(FakeMovieCatalog::default());
        let validator = Arc::new(ScriptedValidator::default());

        let catalogs = if with_movies {
            CatalogBackends::SeriesAndMovies {
                series: series.clone(),
                movies: movies.clone(),
            }
        } else {
            CatalogBackends::SeriesOnly {
                series: series.clone(),
            }
        };

        let state = Arc::new(SharedState::from_parts(
            config,
            catalogs,
            Arc::new(LocalFileStore::new()),
            validator.clone(),
            stream_settings(),
            shutdown,
        ));

        Self {
            root,
            series,
            movies,
            validator,
            state,
        }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }
}
