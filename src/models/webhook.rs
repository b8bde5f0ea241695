use serde::{Deserialize, Serialize};

use crate::domain::{MovieId, SeriesId};

pub const SERIES_ADD_EVENT: &str = "seriesAdd";
pub const MOVIE_ADD_EVENT: &str = "movieAdd";

/// Payload Sonarr posts to a "Connect → Webhook" target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SonarrWebhook {
    #[serde(default)]
    pub event_type: String,

    #[serde(default)]
    pub series: Option<WebhookSeries>,
}

impl SonarrWebhook {
    #[must_use]
    pub fn is_series_add(&self) -> bool {
        self.event_type.eq_ignore_ascii_case(SERIES_ADD_EVENT)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSeries {
    pub id: SeriesId,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub imdb_id: Option<String>,

    #[serde(default)]
    pub tvdb_id: i32,
}

/// Payload Radarr posts to a "Connect → Webhook" target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadarrWebhook {
    #[serde(default)]
    pub event_type: String,

    #[serde(default)]
    pub movie: Option<WebhookMovie>,
}

impl RadarrWebhook {
    #[must_use]
    pub fn is_movie_add(&self) -> bool {
        self.event_type.eq_ignore_ascii_case(MOVIE_ADD_EVENT)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookMovie {
    pub id: MovieId,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub imdb_id: Option<String>,

    #[serde(default)]
    pub tmdb_id: i32,

    #[serde(default)]
    pub year: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_matching_is_case_insensitive() {
        let hook: SonarrWebhook =
            serde_json::from_str(r#"{"eventType":"SeriesAdd","series":{"id":1,"title":"X"}}"#)
                .unwrap();
        assert!(hook.is_series_add());
        assert_eq!(hook.series.unwrap().id, SeriesId::new(1));

        let test_hook: RadarrWebhook = serde_json::from_str(r#"{"eventType":"Test"}"#).unwrap();
        assert!(!test_hook.is_movie_add());
        assert!(test_hook.movie.is_none());
    }
}
