use async_stream::try_stream;
use futures::Stream;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use url::Url;

use crate::models::Entry;
use crate::services::metrics;

/// Metadata marker that opens a playlist entry
pub const EXTINF_MARKER: &str = "#EXTINF:";

/// URL suffixes that mark a line as on-demand media (compared lowercase)
pub const MEDIA_EXTENSIONS: [&str; 8] = [
    ".mp4", ".mkv", ".avi", ".mov", ".wmv", ".flv", ".webm", ".mpg",
];

lazy_static! {
    /// Regex to parse EXTINF attributes (tvg-logo="...", group-title='...', etc)
    static ref ATTR_REGEX: Regex =
        Regex::new(r#"(\w+(?:-\w+)*)=(?:"([^"]*)"|'([^']*)')"#).unwrap();
}

/// Parsed EXTINF line data, waiting for its URL line
#[derive(Debug, Default)]
struct ExtinfData {
    attributes: HashMap<String, String>,
    title: String,
}

/// Parse an EXTINF line
/// Format: #EXTINF:-1 tvg-id="..." tvg-logo="..." group-title="...",Title
///
/// The title is whatever follows the first comma after the last attribute.
/// Returns None when the line has no title.
fn parse_extinf(line: &str) -> Option<ExtinfData> {
    let content = line.strip_prefix(EXTINF_MARKER)?;

    let mut attributes = HashMap::new();
    let mut header_end = 0;
    for caps in ATTR_REGEX.captures_iter(content) {
        let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str()).unwrap_or("");
        attributes.insert(key.as_str().to_string(), value.trim().to_string());
        header_end = whole.end();
    }

    let rest = &content[header_end..];
    let comma = rest.find(',')?;
    let title = rest[comma + 1..].trim();
    if title.is_empty() {
        return None;
    }

    Some(ExtinfData {
        attributes,
        title: title.to_string(),
    })
}

/// True for an absolute http(s) URL ending in a media extension
pub fn is_media_url(line: &str) -> bool {
    let Ok(url) = Url::parse(line) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }

    let lower = line.to_ascii_lowercase();
    MEDIA_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Line-driven playlist state machine.
///
/// An `#EXTINF:` line opens a pending entry (replacing any earlier one that never
/// got a URL); the next media URL line completes it. Everything else is ignored.
#[derive(Debug, Default)]
pub struct EntryParser {
    pending: Option<ExtinfData>,
    skipped: usize,
}

impl EntryParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw line; returns an entry when this line completes one
    pub fn push_line(&mut self, raw: &str) -> Option<Entry> {
        let line = raw.trim();
        if line.is_empty() {
            return None;
        }

        if line.starts_with(EXTINF_MARKER) {
            self.pending = parse_extinf(line);
            if self.pending.is_none() {
                self.skipped += 1;
                metrics::MALFORMED_LINES.inc();
                tracing::debug!(line = %line, "Skipping malformed EXTINF line");
            }
            return None;
        }

        if line.starts_with('#') || !is_media_url(line) {
            return None;
        }

        let extinf = self.pending.take()?;
        Some(Entry {
            attributes: extinf.attributes,
            name: extinf.title,
            url: line.to_string(),
        })
    }

    /// Number of metadata lines skipped as malformed so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

/// Lazily parse playlist text into completed entries.
///
/// The reader is consumed once, line by line; nothing is buffered beyond the
/// pending entry. Lines that are not valid UTF-8 (Latin-1 titles are common)
/// are decoded lossily. I/O errors end the stream.
pub fn entries<R>(reader: R) -> impl Stream<Item = io::Result<Entry>>
where
    R: AsyncBufRead + Unpin,
{
    try_stream! {
        let mut lines = reader.split(b'\n');
        let mut parser = EntryParser::new();

        while let Some(bytes) = lines.next_segment().await? {
            let line = match String::from_utf8(bytes) {
                Ok(line) => line,
                Err(e) => {
                    tracing::debug!("Decoding non-UTF-8 playlist line lossily");
                    String::from_utf8_lossy(e.as_bytes()).into_owned()
                }
            };
            if let Some(entry) = parser.push_line(&line) {
                metrics::ENTRIES_PARSED.inc();
                yield entry;
            }
        }

        if parser.skipped() > 0 {
            tracing::info!("Skipped {} malformed EXTINF lines", parser.skipped());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    async fn collect(text: &str) -> Vec<Entry> {
        let stream = entries(text.as_bytes());
        tokio::pin!(stream);
        let mut out = Vec::new();
        while let Some(entry) = stream.next().await {
            out.push(entry.unwrap());
        }
        out
    }

    #[test]
    fn test_parse_extinf() {
        let line = r#"#EXTINF:-1 tvg-id="matrix" tvg-name="Matrix" tvg-logo="http://logo.com/m.png" group-title="Movies",The Matrix"#;
        let extinf = parse_extinf(line).unwrap();

        assert_eq!(extinf.title, "The Matrix");
        assert_eq!(extinf.attributes.get("tvg-id"), Some(&"matrix".to_string()));
        assert_eq!(extinf.attributes.get("tvg-logo"), Some(&"http://logo.com/m.png".to_string()));
        assert_eq!(extinf.attributes.get("group-title"), Some(&"Movies".to_string()));
    }

    #[test]
    fn test_parse_extinf_minimal() {
        let extinf = parse_extinf("#EXTINF:-1,Canal Teste").unwrap();

        assert_eq!(extinf.title, "Canal Teste");
        assert!(extinf.attributes.is_empty());
    }

    #[test]
    fn test_parse_extinf_title_with_commas() {
        let extinf = parse_extinf(r#"#EXTINF:-1 group-title="A, B",Hello, World"#).unwrap();
        assert_eq!(extinf.attributes.get("group-title"), Some(&"A, B".to_string()));
        assert_eq!(extinf.title, "Hello, World");
    }

    #[test]
    fn test_parse_extinf_single_quotes() {
        let extinf = parse_extinf("#EXTINF:-1 tvg-logo='x.png',Name").unwrap();
        assert_eq!(extinf.attributes.get("tvg-logo"), Some(&"x.png".to_string()));
    }

    #[test]
    fn test_parse_extinf_malformed() {
        assert!(parse_extinf(r#"#EXTINF:-1 tvg-logo="x.png""#).is_none());
        assert!(parse_extinf(r#"#EXTINF:-1 tvg-logo="x.png",   "#).is_none());
    }

    #[test]
    fn test_is_media_url() {
        assert!(is_media_url("http://host/movie/1.mp4"));
        assert!(is_media_url("https://host/series/2.MKV"));
        assert!(!is_media_url("http://host/live/3.ts"));
        assert!(!is_media_url("http://host/live/3"));
        assert!(!is_media_url("ftp://host/a.mp4"));
        assert!(!is_media_url("not a url.mp4"));
    }

    #[test]
    fn test_parser_drops_entries_without_media_url() {
        let mut parser = EntryParser::new();
        assert!(parser.push_line("#EXTINF:-1,Live Channel").is_none());
        assert!(parser.push_line("http://host/live/1.ts").is_none());
        assert!(parser.push_line("#EXTINF:-1,Movie").is_none());
        let entry = parser.push_line("http://host/movie/1.mp4").unwrap();
        assert_eq!(entry.name, "Movie");

        // URL with no pending entry is ignored
        assert!(parser.push_line("http://host/movie/2.mp4").is_none());
    }

    #[test]
    fn test_parser_counts_skipped_lines() {
        let mut parser = EntryParser::new();
        parser.push_line("#EXTINF:-1 broken");
        parser.push_line("http://host/movie/1.mp4");
        assert_eq!(parser.skipped(), 1);
    }

    #[tokio::test]
    async fn test_entries_stream() {
        let text = "#EXTM3U\n\
            #EXTINF:-1 tvg-logo=\"a.png\" group-title=\"Movies\",Random Movie Title\n\
            http://host/movie/1.mp4\n\
            #EXTINF:-1 broken line without title\n\
            http://host/movie/x.mp4\n\
            #EXTINF:-1 group-title=\"Series\",Show Name S01E02\n\
            #EXTVLCOPT:http-user-agent=VLC\n\
            http://host/series/2.mkv\n";

        let parsed = collect(text).await;
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].name, "Random Movie Title");
        assert_eq!(parsed[0].logo(), Some("a.png"));
        assert_eq!(parsed[1].name, "Show Name S01E02");
        assert_eq!(parsed[1].group_title(), "Series");
        assert_eq!(parsed[1].url, "http://host/series/2.mkv");
    }

    #[tokio::test]
    async fn test_non_utf8_line_does_not_abort_playlist() {
        let bytes: &[u8] = b"#EXTM3U\r\n\
            #EXTINF:-1,Good Movie\r\n\
            http://host/movie/1.mp4\r\n\
            #EXTINF:-1,Caf\xe9 Latin1\r\n\
            http://host/movie/2.mp4\r\n\
            #EXTINF:-1,Other Movie\r\n\
            http://host/movie/3.mp4\r\n";

        let stream = entries(bytes);
        tokio::pin!(stream);
        let mut names = Vec::new();
        while let Some(entry) = stream.next().await {
            names.push(entry.unwrap().name);
        }

        assert_eq!(names, vec!["Good Movie", "Caf\u{FFFD} Latin1", "Other Movie"]);
    }
}
