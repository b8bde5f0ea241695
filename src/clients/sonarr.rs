use reqwest::Method;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::{
    ArrClient, ClientError, SeriesCatalog, tolerate_missing_file, tolerate_rejected_update,
};
use crate::domain::{FileId, SeriesId};
use crate::models::{Episode, Page, Series};

/// Sonarr v3 catalog client.
#[derive(Debug, Clone)]
pub struct SonarrClient {
    api: ArrClient,
}

impl SonarrClient {
    #[must_use]
    pub const fn new(api: ArrClient) -> Self {
        Self { api }
    }
}

#[async_trait::async_trait]
impl SeriesCatalog for SonarrClient {
    async fn get_series(
        &self,
        id: SeriesId,
        token: &CancellationToken,
    ) -> Result<Series, ClientError> {
        self.api
            .get_json(
                &format!("get series {id}"),
                &format!("api/v3/series/{id}"),
                &[],
                token,
            )
            .await
    }

    async fn list_series(&self, token: &CancellationToken) -> Result<Vec<Series>, ClientError> {
        self.api
            .get_json("list series", "api/v3/series", &[], token)
            .await
    }

    async fn get_episodes(
        &self,
        series_id: SeriesId,
        token: &CancellationToken,
    ) -> Result<Vec<Episode>, ClientError> {
        self.api
            .get_json(
                &format!("get episodes for series {series_id}"),
                "api/v3/episode",
                &[("seriesId", series_id.to_string())],
                token,
            )
            .await
    }

    async fn wanted_missing(
        &self,
        page: u32,
        page_size: u32,
        token: &CancellationToken,
    ) -> Result<Page<Episode>, ClientError> {
        self.api
            .get_json(
                &format!("get wanted/missing page {page}"),
                "api/v3/wanted/missing",
                &wanted_query(page, page_size, "airDateUtc"),
                token,
            )
            .await
    }

    async fn update_series(
        &self,
        series: &Series,
        token: &CancellationToken,
    ) -> Result<(), ClientError> {
        self.api
            .send(
                Method::PUT,
                &format!("update series {}", series.id),
                &format!("api/v3/series/{}", series.id),
                Some(series),
                token,
            )
            .await
    }

    async fn update_episode(
        &self,
        episode: &Episode,
        token: &CancellationToken,
    ) -> Result<bool, ClientError> {
        let result = self
            .api
            .send(
                Method::PUT,
                &format!("update episode {}", episode.id),
                &format!("api/v3/episode/{}", episode.id),
                Some(episode),
                token,
            )
            .await;
        tolerate_rejected_update(episode.id, result)
    }

    async fn delete_episode_file(
        &self,
        file_id: FileId,
        token: &CancellationToken,
    ) -> Result<bool, ClientError> {
        let result = self
            .api
            .send::<()>(
                Method::DELETE,
                &format!("delete episode file {file_id}"),
                &format!("api/v3/episodefile/{file_id}"),
                None,
                token,
            )
            .await;
        tolerate_missing_file(self.api.service(), file_id, result)
    }

    async fn rescan_series(
        &self,
        id: SeriesId,
        token: &CancellationToken,
    ) -> Result<(), ClientError> {
        self.api
            .post_command("RescanSeries", json!({ "seriesId": id }), token)
            .await
    }
}

pub(crate) fn wanted_query(
    page: u32,
    page_size: u32,
    sort_key: &str,
) -> Vec<(&'static str, String)> {
    vec![
        ("page", page.to_string()),
        ("pageSize", page_size.to_string()),
        ("sortKey", sort_key.to_string()),
        ("sortDirection", "descending".to_string()),
        ("monitored", "true".to_string()),
    ]
}
