//! Parsed stream URL templates.
//!
//! Templates are split into literal and placeholder segments once, then
//! rendered in a single pass. A value that happens to contain `{season}` is
//! written out as-is and never substituted a second time.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    Username,
    Password,
    ImdbId,
    Season,
    Episode,
}

impl Placeholder {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "username" => Some(Self::Username),
            "password" => Some(Self::Password),
            "imdbId" => Some(Self::ImdbId),
            "season" => Some(Self::Season),
            "episode" => Some(Self::Episode),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Value(Placeholder),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("stream url template is empty")]
    Empty,

    #[error("stream url template must contain {{imdbId}}")]
    MissingImdbId,
}

/// Values substituted into a template.
#[derive(Debug, Clone, Copy)]
pub struct StreamParams<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub imdb_id: &'a str,
    pub season: Option<i32>,
    pub episode: Option<i32>,
}

/// A stream URL template such as
/// `https://host/{username}/{password}/tvshow/{imdbId}/{season}/{episode}`.
///
/// # Examples
///
/// ```
/// use strmarr::services::stream_url::{StreamParams, StreamUrlTemplate};
///
/// let template = StreamUrlTemplate::parse("https://host/{imdbId}/{season}/{episode}").unwrap();
/// let url = template.render(&StreamParams {
///     username: "u",
///     password: "p",
///     imdb_id: "tt0903747",
///     season: Some(1),
///     episode: Some(2),
/// });
/// assert_eq!(url, "https://host/tt0903747/1/2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamUrlTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl StreamUrlTemplate {
    /// Unknown `{names}` and unbalanced braces are kept as literal text.
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let template = template.trim();
        if template.is_empty() {
            return Err(TemplateError::Empty);
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after_open = &rest[open + 1..];

            let Some(close) = after_open.find('}') else {
                literal.push_str(&rest[open..]);
                rest = "";
                break;
            };

            let name = &after_open[..close];
            if let Some(placeholder) = Placeholder::parse(name) {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Value(placeholder));
            } else {
                literal.push('{');
                literal.push_str(name);
                literal.push('}');
            }
            rest = &after_open[close + 1..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        if !segments.contains(&Segment::Value(Placeholder::ImdbId)) {
            return Err(TemplateError::MissingImdbId);
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// Renders the URL. Missing season/episode values render as empty text.
    #[must_use]
    pub fn render(&self, params: &StreamParams<'_>) -> String {
        let mut url = String::with_capacity(self.source.len() + 32);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => url.push_str(text),
                Segment::Value(Placeholder::Username) => url.push_str(params.username),
                Segment::Value(Placeholder::Password) => url.push_str(params.password),
                Segment::Value(Placeholder::ImdbId) => url.push_str(params.imdb_id),
                Segment::Value(Placeholder::Season) => {
                    if let Some(season) = params.season {
                        url.push_str(&season.to_string());
                    }
                }
                Segment::Value(Placeholder::Episode) => {
                    if let Some(episode) = params.episode {
                        url.push_str(&episode.to_string());
                    }
                }
            }
        }
        url
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for StreamUrlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
