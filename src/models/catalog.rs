use serde::{Deserialize, Serialize};

/// Placeholder until the video prober enriches a stored item
pub const UNKNOWN_METADATA: &str = "Unknown";

/// Target collection in the catalog store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Movies,
    Series,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Movies => "movies",
            Collection::Series => "series",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry of `movies.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieDocument {
    pub name: String,
    pub logo: Option<String>,
    pub url: String,
    /// Directory containing the movie's reference file
    pub path: String,
    pub duration: String,
    pub resolution: String,
}

/// Episode inside a season of `series.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeDocument {
    pub name: String,
    pub logo: Option<String>,
    pub url: String,
    /// Reference file path
    pub path: String,
    pub season: String,
    pub episode: String,
    pub duration: String,
    pub resolution: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonDocument {
    pub season: String,
    pub path: String,
    pub episodes: Vec<EpisodeDocument>,
}

/// Entry of `series.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesDocument {
    pub name: String,
    pub path: String,
    /// Logo of the first S01E01 seen for this show
    pub image: Option<String>,
    pub seasons: Vec<SeasonDocument>,
}

/// Movies and series built from one playlist
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub movies: Vec<MovieDocument>,
    pub series: Vec<SeriesDocument>,
}

impl CatalogSnapshot {
    pub fn is_empty(&self) -> bool {
        self.movies.is_empty() && self.series.is_empty()
    }

    pub fn episode_count(&self) -> usize {
        self.series
            .iter()
            .flat_map(|s| s.seasons.iter())
            .map(|season| season.episodes.len())
            .sum()
    }
}
