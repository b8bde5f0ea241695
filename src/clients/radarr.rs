use reqwest::Method;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::sonarr::wanted_query;
use super::{ArrClient, ClientError, MovieCatalog, tolerate_missing_file};
use crate::domain::{FileId, MovieId};
use crate::models::{Movie, Page, QualityProfile};

/// Radarr v3 catalog client.
#[derive(Debug, Clone)]
pub struct RadarrClient {
    api: ArrClient,
}

impl RadarrClient {
    #[must_use]
    pub const fn new(api: ArrClient) -> Self {
        Self { api }
    }
}

#[async_trait::async_trait]
impl MovieCatalog for RadarrClient {
    async fn get_movie(
        &self,
        id: MovieId,
        token: &CancellationToken,
    ) -> Result<Movie, ClientError> {
        self.api
            .get_json(
                &format!("get movie {id}"),
                &format!("api/v3/movie/{id}"),
                &[],
                token,
            )
            .await
    }

    async fn wanted_missing_movies(
        &self,
        page: u32,
        page_size: u32,
        token: &CancellationToken,
    ) -> Result<Page<Movie>, ClientError> {
        self.api
            .get_json(
                &format!("get wanted/missing movies page {page}"),
                "api/v3/wanted/missing",
                &wanted_query(page, page_size, "physicalRelease"),
                token,
            )
            .await
    }

    async fn update_movie(
        &self,
        movie: &Movie,
        token: &CancellationToken,
    ) -> Result<(), ClientError> {
        self.api
            .send(
                Method::PUT,
                &format!("update movie {}", movie.id),
                &format!("api/v3/movie/{}", movie.id),
                Some(movie),
                token,
            )
            .await
    }

    async fn delete_movie_file(
        &self,
        file_id: FileId,
        token: &CancellationToken,
    ) -> Result<bool, ClientError> {
        let result = self
            .api
            .send::<()>(
                Method::DELETE,
                &format!("delete movie file {file_id}"),
                &format!("api/v3/moviefile/{file_id}"),
                None,
                token,
            )
            .await;
        tolerate_missing_file(self.api.service(), file_id, result)
    }

    async fn rescan_movie(
        &self,
        id: MovieId,
        token: &CancellationToken,
    ) -> Result<(), ClientError> {
        self.api
            .post_command("RescanMovie", json!({ "movieId": id }), token)
            .await
    }

    async fn quality_profiles(
        &self,
        token: &CancellationToken,
    ) -> Result<Vec<QualityProfile>, ClientError> {
        self.api
            .get_json("list quality profiles", "api/v3/qualityprofile", &[], token)
            .await
    }
}
