//! Movies list and series tree built from one classified playlist, plus the
//! `movies.json` / `series.json` files that persist them

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use crate::error::IngestError;
use crate::models::{
    CatalogSnapshot, ClassifiedItem, EpisodeDocument, EpisodeInfo, MovieDocument, SeasonDocument,
    SeriesDocument, UNKNOWN_METADATA,
};

pub const MOVIES_FILE: &str = "movies.json";
pub const SERIES_FILE: &str = "series.json";

struct SeasonAggregate {
    season: String,
    path: String,
    episodes: Vec<EpisodeDocument>,
}

struct SeriesAggregate {
    name: String,
    path: String,
    image: Option<String>,
    seasons: Vec<SeasonAggregate>,
    season_index: HashMap<String, usize>,
}

impl SeriesAggregate {
    fn new(name: &str, path: String) -> Self {
        Self {
            name: name.to_string(),
            path,
            image: None,
            seasons: Vec::new(),
            season_index: HashMap::new(),
        }
    }

    fn season_mut(&mut self, season: &str, path: impl FnOnce() -> String) -> &mut SeasonAggregate {
        let idx = match self.season_index.get(season) {
            Some(&idx) => idx,
            None => {
                self.seasons.push(SeasonAggregate {
                    season: season.to_string(),
                    path: path(),
                    episodes: Vec::new(),
                });
                self.season_index.insert(season.to_string(), self.seasons.len() - 1);
                self.seasons.len() - 1
            }
        };
        &mut self.seasons[idx]
    }

    fn into_document(self) -> SeriesDocument {
        SeriesDocument {
            name: self.name,
            path: self.path,
            image: self.image,
            seasons: self
                .seasons
                .into_iter()
                .map(|s| SeasonDocument {
                    season: s.season,
                    path: s.path,
                    episodes: s.episodes,
                })
                .collect(),
        }
    }
}

/// Single-pass aggregation of classified items.
///
/// Movies keep scan order. Series, and seasons within a series, keep the order
/// in which they were first seen. Episodes are not deduplicated.
pub struct SnapshotBuilder {
    output_dir: PathBuf,
    movies: Vec<MovieDocument>,
    series: Vec<SeriesAggregate>,
    series_index: HashMap<String, usize>,
}

impl SnapshotBuilder {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            movies: Vec::new(),
            series: Vec::new(),
            series_index: HashMap::new(),
        }
    }

    fn display_path(&self, relative: &Path) -> String {
        self.output_dir.join(relative).to_string_lossy().into_owned()
    }

    pub fn push(&mut self, item: &ClassifiedItem) {
        match item.episode() {
            None => {
                let doc = MovieDocument {
                    name: item.name.clone(),
                    logo: item.logo.clone(),
                    url: item.url.clone(),
                    path: self.display_path(item.relative_dir()),
                    duration: UNKNOWN_METADATA.to_string(),
                    resolution: UNKNOWN_METADATA.to_string(),
                };
                self.movies.push(doc);
            }
            Some(info) => self.push_episode(item, info),
        }
    }

    fn push_episode(&mut self, item: &ClassifiedItem, info: &EpisodeInfo) {
        let season_dir = self.display_path(item.relative_dir());
        let series_dir = item
            .relative_dir()
            .parent()
            .map(|p| self.display_path(p))
            .unwrap_or_else(|| season_dir.clone());
        let episode = EpisodeDocument {
            name: item.name.clone(),
            logo: item.logo.clone(),
            url: item.url.clone(),
            path: self.display_path(&item.relative_path),
            season: info.season.clone(),
            episode: info.episode.clone(),
            duration: UNKNOWN_METADATA.to_string(),
            resolution: UNKNOWN_METADATA.to_string(),
        };

        let idx = match self.series_index.get(&info.show) {
            Some(&idx) => idx,
            None => {
                self.series.push(SeriesAggregate::new(&info.show, series_dir));
                self.series_index.insert(info.show.clone(), self.series.len() - 1);
                self.series.len() - 1
            }
        };
        let series = &mut self.series[idx];

        // First pilot with a logo decides the series image
        if series.image.is_none() && info.is_pilot() {
            series.image = item.logo.clone();
        }

        series.season_mut(&info.season, || season_dir).episodes.push(episode);
    }

    pub fn finish(self) -> CatalogSnapshot {
        CatalogSnapshot {
            movies: self.movies,
            series: self.series.into_iter().map(SeriesAggregate::into_document).collect(),
        }
    }
}

/// Build a snapshot from a complete classified batch
pub fn build_snapshot<'a, I>(output_dir: &Path, items: I) -> CatalogSnapshot
where
    I: IntoIterator<Item = &'a ClassifiedItem>,
{
    let mut builder = SnapshotBuilder::new(output_dir);
    for item in items {
        builder.push(item);
    }
    builder.finish()
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}

async fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), IngestError> {
    let content = to_pretty_json(value)?;
    let tmp_path = path.with_extension("json.tmp");
    let io_err = |source| IngestError::WriteSnapshot {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::create(&tmp_path).await.map_err(io_err)?;
    file.write_all(&content).await.map_err(io_err)?;
    file.sync_all().await.map_err(io_err)?;
    drop(file);

    // Atomic replace so readers never see a partial snapshot
    fs::rename(&tmp_path, path).await.map_err(io_err)?;
    Ok(())
}

/// Write `movies.json` and `series.json` into `dir`
pub async fn write_snapshot(dir: &Path, snapshot: &CatalogSnapshot) -> Result<(), IngestError> {
    write_json_file(&dir.join(MOVIES_FILE), &snapshot.movies).await?;
    write_json_file(&dir.join(SERIES_FILE), &snapshot.series).await?;
    tracing::info!(
        "Snapshot written to {}: {} movies, {} series",
        dir.display(),
        snapshot.movies.len(),
        snapshot.series.len()
    );
    Ok(())
}

async fn read_json_list<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, IngestError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(IngestError::ReadSnapshot {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Read a snapshot previously written by [`write_snapshot`]; missing files are empty
pub async fn load_snapshot(dir: &Path) -> Result<CatalogSnapshot, IngestError> {
    Ok(CatalogSnapshot {
        movies: read_json_list(&dir.join(MOVIES_FILE)).await?,
        series: read_json_list(&dir.join(SERIES_FILE)).await?,
    })
}
