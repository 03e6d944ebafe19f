//! Concurrent, idempotent writer for `.strm`-style reference files
//!
//! Every item owns exactly one file under the output directory whose content is
//! the item's URL. Writes fan out over a bounded pool; completions are counted
//! by the single loop that drains the pool, which is also the only place that
//! reports progress.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::models::ClassifiedItem;
use crate::services::metrics;

/// What happened to one reference file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// File already held the same URL
    Unchanged,
}

/// Per-batch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub written: usize,
    pub unchanged: usize,
    /// Items whose path was already claimed earlier in the batch
    pub superseded: usize,
    pub failed: usize,
}

impl WriteReport {
    pub fn attempted(&self) -> usize {
        self.written + self.unchanged + self.superseded + self.failed
    }
}

/// Writes reference files below one output directory
#[derive(Debug, Clone)]
pub struct ReferenceWriter {
    root: PathBuf,
}

impl ReferenceWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Ensure every item's reference file exists with its URL as content.
    ///
    /// Runs at most `workers` writes at once and returns after every item was
    /// attempted. `on_progress(attempted, total)` is called once per item in
    /// completion order with a strictly increasing `attempted`. Failures are
    /// logged and counted, never returned.
    pub async fn write_batch<F>(
        &self,
        items: &[ClassifiedItem],
        workers: usize,
        mut on_progress: F,
    ) -> WriteReport
    where
        F: FnMut(usize, usize),
    {
        let total = items.len();
        let mut report = WriteReport::default();
        let mut attempted = 0usize;

        // First claimant of a path owns it; later duplicates are not written
        let mut claimed: HashSet<&Path> = HashSet::with_capacity(total);
        let mut unique: Vec<&ClassifiedItem> = Vec::with_capacity(total);
        for item in items {
            if claimed.insert(item.relative_path.as_path()) {
                unique.push(item);
            } else {
                tracing::warn!(
                    path = %item.relative_path.display(),
                    url = %item.url,
                    "Reference path already claimed in this batch, skipping"
                );
                metrics::REFERENCE_FILES.with_label_values(&["superseded"]).inc();
                report.superseded += 1;
                attempted += 1;
                on_progress(attempted, total);
            }
        }

        // Each worker owns its item
        let mut pending = stream::iter(unique.into_iter().cloned())
            .map(|item| {
                let root = self.root.clone();
                async move {
                    let result = write_reference(&root, &item).await;
                    (item, result)
                }
            })
            .buffer_unordered(workers.max(1));

        while let Some((item, result)) = pending.next().await {
            match result {
                Ok(WriteOutcome::Written) => {
                    metrics::REFERENCE_FILES.with_label_values(&["written"]).inc();
                    report.written += 1;
                }
                Ok(WriteOutcome::Unchanged) => {
                    metrics::REFERENCE_FILES.with_label_values(&["unchanged"]).inc();
                    report.unchanged += 1;
                }
                Err(e) => {
                    metrics::REFERENCE_FILES.with_label_values(&["failed"]).inc();
                    tracing::warn!(
                        path = %item.relative_path.display(),
                        error = %e,
                        "Failed to write reference file"
                    );
                    report.failed += 1;
                }
            }
            attempted += 1;
            on_progress(attempted, total);
        }

        tracing::info!(
            "Reference files: {} written, {} unchanged, {} superseded, {} failed",
            report.written,
            report.unchanged,
            report.superseded,
            report.failed
        );

        report
    }
}

/// Create the parent directory, then write unless the file already holds the URL
pub async fn write_reference(root: &Path, item: &ClassifiedItem) -> io::Result<WriteOutcome> {
    let path = root.join(&item.relative_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::read_to_string(&path).await {
        Ok(existing) if existing.trim() == item.url.trim() => return Ok(WriteOutcome::Unchanged),
        Ok(_) => {}
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::InvalidData) => {}
        Err(e) => return Err(e),
    }

    fs::write(&path, item.url.as_bytes()).await?;
    Ok(WriteOutcome::Written)
}
