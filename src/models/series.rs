use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{EpisodeId, FileId, SeriesId};

/// A Sonarr series as returned by `/api/v3/series`.
///
/// Only the fields the reconciler reads are modelled; everything else is kept
/// in `extra` so that a read-modify-write `PUT` sends it back untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub id: SeriesId,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub imdb_id: Option<String>,

    #[serde(default)]
    pub year: i32,

    #[serde(default)]
    pub monitored: bool,

    #[serde(default)]
    pub seasons: Vec<Season>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Series {
    /// IMDb id usable for link construction, if the catalog has one.
    #[must_use]
    pub fn imdb_id(&self) -> Option<&str> {
        non_blank(self.imdb_id.as_deref())
    }

    /// Highest season number above zero, if any regular season exists.
    #[must_use]
    pub fn latest_season(&self) -> Option<i32> {
        self.seasons
            .iter()
            .map(|s| s.season_number)
            .filter(|n| *n > 0)
            .max()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub season_number: i32,

    #[serde(default)]
    pub monitored: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<SeasonStatistics>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Season {
    #[must_use]
    pub const fn is_specials(&self) -> bool {
        self.season_number == 0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonStatistics {
    #[serde(default)]
    pub episode_file_count: u32,

    #[serde(default)]
    pub episode_count: u32,

    #[serde(default)]
    pub total_episode_count: u32,

    #[serde(default)]
    pub size_on_disk: u64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: EpisodeId,

    pub series_id: SeriesId,

    #[serde(default)]
    pub episode_file_id: FileId,

    pub season_number: i32,

    pub episode_number: i32,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub has_file: bool,

    #[serde(default)]
    pub monitored: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Episode {
    /// The catalog-registered file backing this episode, if any.
    #[must_use]
    pub fn registered_file(&self) -> Option<FileId> {
        if self.has_file {
            self.episode_file_id.registered()
        } else {
            None
        }
    }

    /// Marks the episode as having no file, mirroring a successful delete.
    pub fn clear_file(&mut self) {
        self.has_file = false;
        self.episode_file_id = FileId::default();
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_fields_survive_round_trip() {
        let json = r#"{
            "id": 5,
            "title": "Show",
            "path": "/tv/Show",
            "imdbId": "tt123",
            "monitored": true,
            "qualityProfileId": 4,
            "seasons": [{"seasonNumber": 1, "monitored": true, "images": []}]
        }"#;

        let series: Series = serde_json::from_str(json).unwrap();
        assert_eq!(series.imdb_id(), Some("tt123"));

        let value = serde_json::to_value(&series).unwrap();
        assert_eq!(value["qualityProfileId"], 4);
        assert!(value["seasons"][0]["images"].is_array());
    }

    #[test]
    fn blank_imdb_id_is_treated_as_missing() {
        let series = Series {
            imdb_id: Some("  ".to_string()),
            ..Series::default()
        };
        assert_eq!(series.imdb_id(), None);
    }

    #[test]
    fn latest_season_ignores_specials() {
        let series = Series {
            seasons: [0, 2, 1]
                .into_iter()
                .map(|n| Season {
                    season_number: n,
                    ..Season::default()
                })
                .collect(),
            ..Series::default()
        };
        assert_eq!(series.latest_season(), Some(2));

        let only_specials = Series {
            seasons: vec![Season::default()],
            ..Series::default()
        };
        assert_eq!(only_specials.latest_season(), None);
    }

    #[test]
    fn registered_file_requires_has_file() {
        let mut episode = Episode {
            episode_file_id: FileId::new(9),
            has_file: true,
            ..Episode::default()
        };
        assert_eq!(episode.registered_file(), Some(FileId::new(9)));

        episode.clear_file();
        assert_eq!(episode.registered_file(), None);
        assert_eq!(episode.episode_file_id, FileId::new(0));
    }
}
