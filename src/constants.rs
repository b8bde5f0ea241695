pub mod retry {

    pub const MAX_RETRIES: u32 = 5;

    pub const DELAYS_MS: &[u64] = &[2000, 3000, 5000, 8000, 10000];

    /// Statuses retried on reads. Writes drop 404.
    pub const RETRY_STATUSES: &[u16] = &[404, 503];

    pub const REQUEST_TIMEOUT_SECS: u64 = 30;
}

pub mod stream {

    pub const SERIES_TEMPLATE: &str =
        "https://starlite.best/api/stream/{username}/{password}/tvshow/{imdbId}/{season}/{episode}";

    pub const MOVIE_TEMPLATE: &str =
        "https://starlite.best/api/stream/{username}/{password}/movie/{imdbId}";

    pub const ERROR_MARKER: &str = "error.starlite.best";

    pub const VALIDATION_TIMEOUT_SECS: u64 = 10;
}

pub mod sweep {

    pub const PARALLELISM: usize = 4;

    pub const PAGE_SIZE: u32 = 100;
}

pub mod scheduler {
    use std::time::Duration;

    pub const POLL_INTERVAL: Duration = Duration::from_secs(60);

    pub const FULL_SWEEP_MINUTE: u32 = 5;

    pub const WANTED_INTERVAL_MINUTES: u32 = 15;
}
