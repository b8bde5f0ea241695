//! Deterministic artifact paths.
//!
//! The same catalog item must always map to the same file, across sweeps and
//! across processes, otherwise a sweep would create duplicates instead of
//! finding the artifact it wrote last time.

use std::path::{Path, PathBuf};

pub const ARTIFACT_EXTENSION: &str = "strm";

const PLACEHOLDER_TITLES: &[&str] = &["TBA", "TBD"];

/// Episode title used in the file name, falling back to `Episode {n}`.
#[must_use]
pub fn episode_title(title: Option<&str>, episode_number: i32) -> String {
    let fallback = || format!("Episode {episode_number}");

    let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) else {
        return fallback();
    };

    let is_placeholder = PLACEHOLDER_TITLES
        .iter()
        .any(|p| title.eq_ignore_ascii_case(p));
    let is_generic = title
        .get(..8)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("episode "));

    if is_placeholder || is_generic {
        fallback()
    } else {
        title.to_string()
    }
}

/// `S{ss}E{ee}`, the part of an episode file name that survives a retitle.
#[must_use]
pub fn episode_tag(season: i32, episode: i32) -> String {
    format!("S{season:02}E{episode:02}")
}

/// Whether `file_name` is an artifact for this episode under any title.
#[must_use]
pub fn is_episode_artifact(file_name: &str, season: i32, episode: i32) -> bool {
    let has_extension = Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ARTIFACT_EXTENSION));
    has_extension && file_name.contains(&format!(" - {} - ", episode_tag(season, episode)))
}

#[must_use]
pub fn episode_file_name(
    series_title: &str,
    season: i32,
    episode: i32,
    title: Option<&str>,
) -> String {
    sanitize_file_name(&format!(
        "{series_title} - {} - {}.{ARTIFACT_EXTENSION}",
        episode_tag(season, episode),
        episode_title(title, episode)
    ))
}

#[must_use]
pub fn season_dir(series_path: &Path, season: i32) -> PathBuf {
    series_path.join(format!("Season {season:02}"))
}

/// `{series_path}/Season {ss}/{series} - S{ss}E{ee} - {title}.strm`
#[must_use]
pub fn episode_artifact_path(
    series_path: &Path,
    series_title: &str,
    season: i32,
    episode: i32,
    title: Option<&str>,
) -> PathBuf {
    season_dir(series_path, season).join(episode_file_name(series_title, season, episode, title))
}

/// `{movie_path}/{title} ({year}).strm`
#[must_use]
pub fn movie_artifact_path(movie_path: &Path, title: &str, year: i32) -> PathBuf {
    movie_path.join(sanitize_file_name(&format!(
        "{title} ({year}).{ARTIFACT_EXTENSION}"
    )))
}

fn is_invalid_file_name_char(c: char) -> bool {
    matches!(c, '/' | '\\' | '\0') || c.is_control()
}

/// Makes `name` safe to use as a single path component.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let joined = name
        .split(is_invalid_file_name_char)
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    let mut replaced = String::with_capacity(joined.len());
    for c in joined.chars() {
        match c {
            ':' => replaced.push_str(" -"),
            '"' => replaced.push('\''),
            '?' | '*' | '<' | '>' => {}
            '|' => replaced.push('-'),
            other => replaced.push(other),
        }
    }

    let mut collapsed = String::with_capacity(replaced.len());
    let mut previous_space = false;
    for c in replaced.chars() {
        if c == ' ' {
            if !previous_space {
                collapsed.push(c);
            }
            previous_space = true;
        } else {
            collapsed.push(c);
            previous_space = false;
        }
    }

    collapsed.trim().trim_end_matches('.').to_string()
}
