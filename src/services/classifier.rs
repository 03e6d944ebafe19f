use lazy_static::lazy_static;
use regex::Regex;
use std::path::PathBuf;

use crate::models::{ClassifiedItem, EpisodeInfo, Entry, ItemKind};

/// Group-title marker that flags an entry as a series episode
pub const SERIES_MARKER: &str = "Series";

lazy_static! {
    // ============ EPISODE DETECTION ============
    /// S01E02 / s1.e2 / S_01-E_02 anywhere in the name
    static ref SEASON_EPISODE_MARKER: Regex =
        Regex::new(r"(?i)\bS[._-]?\s*(\d{1,10})[._-]?\s*E\s*(\d{1,10})\b").unwrap();
    /// Whole name = show + optional [tag] + SxxEyy suffix
    static ref STRICT_SUFFIX: Regex =
        Regex::new(r"(?i)^(.*?)(?:\s*\[.*\])?\s*S[._-]?\s*(\d{1,10})[._-]?\s*E(\d{1,10})$").unwrap();

    // ============ SHOW NAME CLEANERS ============
    static ref SEASON_EPISODE_WORD: Regex = Regex::new(r"\b[Ss][._-]?\d{1,10}[._-]?E\d{1,10}\b").unwrap();
    static ref SEASON_WORD: Regex = Regex::new(r"\b[Ss][._-]?\d{1,10}\b").unwrap();
    static ref SEASON_EPISODE_TAIL: Regex =
        Regex::new(r".[._-]?[Ss][._-]?\d{1,10}[._-]?[Ee][._-]?\d{1,10}.*").unwrap();
    static ref SEASON_TAIL: Regex = Regex::new(r".[._-]?[Ss][._-]?\d{1,10}.*").unwrap();
    static ref EPISODE_TAIL: Regex = Regex::new(r".[._-]?[Ee][._-]?\d{1,10}.*").unwrap();

    // ============ FILESYSTEM ============
    static ref UNSAFE_CHARS: Regex = Regex::new(r#"[\\/*?:"<>|]"#).unwrap();
}

/// Make a single path component safe to create on any common filesystem
pub fn sanitize_filename(name: &str) -> String {
    let cleaned = UNSAFE_CHARS.replace_all(name, "");
    let cleaned = cleaned.trim().replace("...", "…").replace("..", "…");
    let cleaned = cleaned.replace(['\t', '\n', '\r'], "");
    cleaned.trim().trim_end_matches(['.', ' ']).to_string()
}

/// Remove embedded season/episode fragments from a show name
/// (used on the show part of a strict suffix match)
pub fn strip_season_episode(name: &str) -> String {
    let result = SEASON_EPISODE_WORD.replace_all(name, "");
    let result = SEASON_WORD.replace_all(&result, "");
    let result = SEASON_TAIL.replace_all(&result, "");
    let result = EPISODE_TAIL.replace_all(&result, "");
    result.trim().to_string()
}

/// Cut a full entry name at its first season/episode-looking fragment
pub fn strip_season_episode_full(name: &str) -> String {
    let result = SEASON_EPISODE_TAIL.replace_all(name, "");
    let result = SEASON_TAIL.replace_all(&result, "");
    let result = EPISODE_TAIL.replace_all(&result, "");
    result.trim().to_string()
}

/// Left-pad a digit string with zeros to at least two characters
pub fn zero_pad(digits: &str) -> String {
    format!("{:0>2}", digits)
}

/// Result of one episode-extraction strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched(EpisodeInfo),
    NoMatch,
}

trait EpisodeMatcher {
    fn name(&self) -> &'static str;
    fn try_match(&self, name: &str) -> MatchOutcome;
}

fn episode_fields(show: String, season: &str, episode: &str) -> MatchOutcome {
    if show.is_empty() {
        return MatchOutcome::NoMatch;
    }
    MatchOutcome::Matched(EpisodeInfo {
        show,
        season: zero_pad(season),
        episode: zero_pad(episode),
    })
}

/// `Show [tag] S01E02` where the suffix ends the name
struct StrictSuffix;

impl EpisodeMatcher for StrictSuffix {
    fn name(&self) -> &'static str {
        "strict"
    }

    fn try_match(&self, name: &str) -> MatchOutcome {
        let Some(caps) = STRICT_SUFFIX.captures(name) else {
            return MatchOutcome::NoMatch;
        };
        let show = sanitize_filename(&strip_season_episode(&caps[1]));
        episode_fields(show, &caps[2], &caps[3])
    }
}

/// Season/episode marker anywhere; show name is everything before it.
/// Bracketed tags are kept in the show name on this path.
struct LooseMarker;

impl EpisodeMatcher for LooseMarker {
    fn name(&self) -> &'static str {
        "loose"
    }

    fn try_match(&self, name: &str) -> MatchOutcome {
        let Some(caps) = SEASON_EPISODE_MARKER.captures(name) else {
            return MatchOutcome::NoMatch;
        };
        let show = sanitize_filename(&strip_season_episode_full(name));
        episode_fields(show, &caps[1], &caps[2])
    }
}

/// Tried in order; the first match wins
const EPISODE_MATCHERS: [&dyn EpisodeMatcher; 2] = [&StrictSuffix, &LooseMarker];

/// An entry that looks like an episode but yields no show/season/episode
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not classify {name:?}")]
pub struct Unclassifiable {
    pub name: String,
}

/// Resolves playlist entries into movies or episodes with on-disk paths
#[derive(Debug, Clone)]
pub struct MediaClassifier {
    reference_extension: String,
}

impl MediaClassifier {
    pub fn new(reference_extension: &str) -> Self {
        Self {
            reference_extension: reference_extension.trim_start_matches('.').to_string(),
        }
    }

    /// Series marker in the group title, or a season/episode pattern in the name
    pub fn is_episode_candidate(entry: &Entry) -> bool {
        entry.group_title().contains(SERIES_MARKER) || SEASON_EPISODE_MARKER.is_match(&entry.name)
    }

    /// Run the episode matchers in priority order
    pub fn match_episode(name: &str) -> MatchOutcome {
        for matcher in EPISODE_MATCHERS {
            if let MatchOutcome::Matched(info) = matcher.try_match(name) {
                tracing::trace!(matcher = matcher.name(), name = %name, "Episode matched");
                return MatchOutcome::Matched(info);
            }
        }
        MatchOutcome::NoMatch
    }

    /// Classify one entry. Pure: logging of drops is left to the caller.
    pub fn classify(&self, entry: &Entry) -> Result<ClassifiedItem, Unclassifiable> {
        if !Self::is_episode_candidate(entry) {
            return self.movie_item(entry);
        }

        match Self::match_episode(&entry.name) {
            MatchOutcome::Matched(info) => Ok(self.episode_item(entry, info)),
            MatchOutcome::NoMatch => Err(Unclassifiable {
                name: entry.name.clone(),
            }),
        }
    }

    fn movie_item(&self, entry: &Entry) -> Result<ClassifiedItem, Unclassifiable> {
        let name = sanitize_filename(&entry.name);
        if name.is_empty() {
            return Err(Unclassifiable {
                name: entry.name.clone(),
            });
        }

        let relative_path = PathBuf::from("movies")
            .join(&name)
            .join(format!("{}.{}", name, self.reference_extension));

        Ok(ClassifiedItem {
            name,
            url: entry.url.clone(),
            relative_path,
            logo: entry.logo().map(str::to_string),
            kind: ItemKind::Movie,
        })
    }

    fn episode_item(&self, entry: &Entry, info: EpisodeInfo) -> ClassifiedItem {
        let name = sanitize_filename(&format!("{} S{} E{}", info.show, info.season, info.episode));
        let relative_path = PathBuf::from("series")
            .join(&info.show)
            .join(sanitize_filename(&info.season_dir()))
            .join(format!("{}.{}", name, self.reference_extension));

        ClassifiedItem {
            name,
            url: entry.url.clone(),
            relative_path,
            logo: entry.logo().map(str::to_string),
            kind: ItemKind::Episode(info),
        }
    }
}

impl Default for MediaClassifier {
    fn default() -> Self {
        Self::new("strm")
    }
}
