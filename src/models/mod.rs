pub mod movie;
pub mod paging;
pub mod series;
pub mod webhook;

pub use movie::{Movie, MovieFile, QualityProfile};
pub use paging::Page;
pub use series::{Episode, Season, SeasonStatistics, Series};
pub use webhook::{RadarrWebhook, SonarrWebhook, WebhookMovie, WebhookSeries};
