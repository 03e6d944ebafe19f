use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One completed playlist record: `#EXTINF` attributes plus its media URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub attributes: HashMap<String, String>,
    /// Display name (text after the attribute list)
    pub name: String,
    pub url: String,
}

impl Entry {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|s| s.as_str())
    }

    /// `group-title`, or a bare `title` attribute
    pub fn group_title(&self) -> &str {
        self.attr("group-title")
            .or_else(|| self.attr("title"))
            .unwrap_or("")
    }

    /// `tvg-logo`, or a bare `logo` attribute
    pub fn logo(&self) -> Option<&str> {
        self.attr("tvg-logo").or_else(|| self.attr("logo"))
    }
}

/// Season/episode identity of a classified episode.
/// `season` and `episode` are zero-padded to at least two digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeInfo {
    pub show: String,
    pub season: String,
    pub episode: String,
}

impl EpisodeInfo {
    /// True for the first episode of the first season (`1`, `01`, `001`, ...)
    pub fn is_pilot(&self) -> bool {
        self.season.parse::<u64>() == Ok(1) && self.episode.parse::<u64>() == Ok(1)
    }

    pub fn season_dir(&self) -> String {
        format!("Season {}", self.season)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    Movie,
    Episode(EpisodeInfo),
}

/// An entry resolved into movie or episode form with filesystem-safe names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedItem {
    /// Sanitized display name (also the reference file stem)
    pub name: String,
    pub url: String,
    /// Reference file path relative to the output directory
    pub relative_path: PathBuf,
    pub logo: Option<String>,
    pub kind: ItemKind,
}

impl ClassifiedItem {
    pub fn episode(&self) -> Option<&EpisodeInfo> {
        match &self.kind {
            ItemKind::Episode(info) => Some(info),
            ItemKind::Movie => None,
        }
    }

    pub fn is_movie(&self) -> bool {
        matches!(self.kind, ItemKind::Movie)
    }

    /// Directory holding the reference file, relative to the output directory
    pub fn relative_dir(&self) -> &Path {
        self.relative_path.parent().unwrap_or_else(|| Path::new(""))
    }
}
