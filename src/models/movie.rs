use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{FileId, MovieId};
use crate::models::series::non_blank;

/// A Radarr movie as returned by `/api/v3/movie`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: MovieId,

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
    pub has_file: bool,

    #[serde(default)]
    pub quality_profile_id: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movie_file: Option<MovieFile>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Movie {
    #[must_use]
    pub fn imdb_id(&self) -> Option<&str> {
        non_blank(self.imdb_id.as_deref())
    }

    #[must_use]
    pub fn registered_file(&self) -> Option<FileId> {
        if !self.has_file {
            return None;
        }
        self.movie_file.as_ref().and_then(|f| f.id.registered())
    }

    pub fn clear_file(&mut self) {
        self.has_file = false;
        self.movie_file = None;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieFile {
    pub id: FileId,

    #[serde(default)]
    pub relative_path: Option<String>,

    #[serde(default)]
    pub size: u64,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityProfile {
    pub id: i32,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub upgrade_allowed: bool,

    #[serde(default)]
    pub cutoff: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_file_comes_from_movie_file() {
        let json = r#"{
            "id": 3,
            "title": "Film",
            "year": 1999,
            "hasFile": true,
            "movieFile": {"id": 41, "relativePath": "Film (1999).mkv", "quality": {}}
        }"#;
        let movie: Movie = serde_json::from_str(json).unwrap();
        assert_eq!(movie.registered_file(), Some(FileId::new(41)));
        assert_eq!(movie.imdb_id(), None);
    }

    #[test]
    fn clear_file_drops_movie_file() {
        let mut movie = Movie {
            has_file: true,
            movie_file: Some(MovieFile {
                id: FileId::new(2),
                ..MovieFile::default()
            }),
            ..Movie::default()
        };
        movie.clear_file();
        assert_eq!(movie.registered_file(), None);
        let value = serde_json::to_value(&movie).unwrap();
        assert!(value.get("movieFile").is_none());
    }
}
