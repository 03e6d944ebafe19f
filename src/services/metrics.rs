//! Prometheus counters for the ingestion pipeline, exposed on `/metrics`

use lazy_static::lazy_static;
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

lazy_static! {
    pub static ref ENTRIES_PARSED: IntCounter = register_int_counter!(
        "strm_entries_parsed_total",
        "Playlist entries completed by the parser"
    )
    .unwrap();

    pub static ref MALFORMED_LINES: IntCounter = register_int_counter!(
        "strm_malformed_lines_total",
        "EXTINF lines skipped because they could not be split into attributes and title"
    )
    .unwrap();

    pub static ref CLASSIFICATION_DROPS: IntCounter = register_int_counter!(
        "strm_classification_drops_total",
        "Series-looking entries that could not be resolved into show/season/episode"
    )
    .unwrap();

    /// outcome = written | unchanged | superseded | failed
    pub static ref REFERENCE_FILES: IntCounterVec = register_int_counter_vec!(
        "strm_reference_files_total",
        "Reference files processed by the writer",
        &["outcome"]
    )
    .unwrap();

    /// result = ok | error
    pub static ref INGESTED_FILES: IntCounterVec = register_int_counter_vec!(
        "strm_ingested_playlists_total",
        "Playlist files processed by the pipeline",
        &["result"]
    )
    .unwrap();
}
