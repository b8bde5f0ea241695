//! Strongly typed identifiers for catalog entities.
//!
//! Sonarr and Radarr both hand out plain integers for series, episodes,
//! movies and files. Wrapping them keeps a `FileId` from ever being passed
//! where a `SeriesId` is expected (a mix-up that would delete the wrong
//! thing on the remote side).

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! catalog_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn value(&self) -> i32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self::new(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

catalog_id!(
    /// Sonarr series identifier.
    SeriesId
);
catalog_id!(
    /// Sonarr episode identifier.
    EpisodeId
);
catalog_id!(
    /// Radarr movie identifier.
    MovieId
);
catalog_id!(
    /// Identifier of a file registered in the catalog (episode file or movie file).
    ///
    /// Sonarr reports `0` for episodes without a file.
    FileId
);

impl FileId {
    /// Returns `Some` only for ids that reference a real file.
    #[must_use]
    pub const fn registered(self) -> Option<Self> {
        if self.0 > 0 { Some(self) } else { None }
    }
}

/// The two kinds of catalog item that can be backed by an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Episode,
    Movie,
}

impl ItemKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Episode => "episode",
            Self::Movie => "movie",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
