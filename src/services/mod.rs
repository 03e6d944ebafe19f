pub mod catalog_store;
pub mod classifier;
pub mod m3u_parser;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod reference_writer;
pub mod snapshot;
