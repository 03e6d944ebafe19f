//! Ingestion orchestrator
//!
//! Drives each playlist file through parse, reference-write, snapshot and
//! persist, one file at a time, reporting every stage to the progress registry.

use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs;
use tokio::io::BufReader;
use tokio_util::io::InspectReader;

use crate::error::IngestError;
use crate::models::{CatalogSnapshot, ClassifiedItem, PipelineState, Stage};
use crate::services::catalog_store::CatalogStore;
use crate::services::classifier::MediaClassifier;
use crate::services::m3u_parser;
use crate::services::metrics;
use crate::services::progress::ProgressRegistry;
use crate::services::reference_writer::{ReferenceWriter, WriteReport};
use crate::services::snapshot::{self, SnapshotBuilder};

/// Parse progress is published every this many entries
const PARSE_REPORT_EVERY: usize = 500;
/// Snapshot building is reported in this many coarse steps before the files are written
const SNAPSHOT_STEPS: usize = 10;

/// Outcome of one playlist file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSummary {
    pub output_dir: PathBuf,
    pub entries: usize,
    pub dropped: usize,
    pub movies: usize,
    pub series: usize,
    pub episodes: usize,
    pub references: WriteReport,
    pub inserted: u64,
}

/// Outcome of a whole task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSummary {
    pub files: Vec<FileSummary>,
}

impl TaskSummary {
    pub fn inserted(&self) -> u64 {
        self.files.iter().map(|f| f.inserted).sum()
    }
}

/// Result of re-inserting stored snapshots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReinsertReport {
    pub directories: usize,
    pub documents: u64,
    pub failed: usize,
}

/// `<root>/Result_<name up to its first dot>`
pub fn output_dir_for(root: &Path, playlist: &Path) -> PathBuf {
    let file_name = playlist
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = file_name.split('.').next().unwrap_or_default();
    root.join(format!("Result_{}", stem))
}

/// Maps one file's stage percentages into the task's range.
/// File `index` of `count` occupies `[index * 100 / count, (index + 1) * 100 / count]`.
struct FileScope<'a> {
    progress: &'a ProgressRegistry,
    task_id: &'a str,
    index: usize,
    count: usize,
}

impl FileScope<'_> {
    fn update(&self, stage: Stage, percent: f64) {
        let scaled = (self.index as f64 * 100.0 + percent.clamp(0.0, 100.0)) / self.count as f64;
        tracing::trace!(task_id = %self.task_id, stage = %stage, percent = scaled, "Stage progress");
        self.progress.update_stage(self.task_id, stage, scaled);
    }

    fn enter(&self, state: PipelineState) {
        let label = if self.count > 1 {
            format!("{} ({}/{})", state.label(), self.index + 1, self.count)
        } else {
            state.label().to_string()
        };
        self.progress.set_status_label(self.task_id, &label);
    }
}

#[derive(Clone)]
pub struct IngestPipeline {
    store: Arc<dyn CatalogStore>,
    progress: ProgressRegistry,
    classifier: MediaClassifier,
    output_root: PathBuf,
    workers: usize,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        progress: ProgressRegistry,
        classifier: MediaClassifier,
        output_root: impl Into<PathBuf>,
        workers: usize,
    ) -> Self {
        Self {
            store,
            progress,
            classifier,
            output_root: output_root.into(),
            workers: workers.max(1),
        }
    }

    pub fn progress(&self) -> &ProgressRegistry {
        &self.progress
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Register a task and run it in the background; returns the task id at once
    pub fn start(&self, files: Vec<PathBuf>) -> String {
        let task_id = self.progress.create();
        let pipeline = self.clone();
        let id = task_id.clone();

        tokio::spawn(async move {
            match pipeline.run(&id, &files).await {
                Ok(summary) => tracing::info!(
                    task_id = %id,
                    "Ingestion finished: {} files, {} documents inserted",
                    summary.files.len(),
                    summary.inserted()
                ),
                Err(e) => tracing::error!(task_id = %id, "Ingestion failed: {}", e),
            }
        });

        task_id
    }

    /// Process `files` in order under an existing task id.
    ///
    /// A failing file does not stop the next one. The task stays incomplete
    /// until every file was attempted; the most recent failure is then recorded
    /// as the task error and returned.
    pub async fn run(&self, task_id: &str, files: &[PathBuf]) -> Result<TaskSummary, IngestError> {
        if files.is_empty() {
            let err = IngestError::NoInput;
            self.progress.set_error(task_id, &err.to_string());
            return Err(err);
        }

        let mut summary = TaskSummary::default();
        let mut last_error = None;

        for (index, path) in files.iter().enumerate() {
            let scope = FileScope {
                progress: &self.progress,
                task_id,
                index,
                count: files.len(),
            };

            tracing::info!(task_id = %task_id, "Ingesting {}", path.display());
            match self.process_file(&scope, path).await {
                Ok(file) => {
                    metrics::INGESTED_FILES.with_label_values(&["ok"]).inc();
                    summary.files.push(file);
                }
                Err(e) => {
                    metrics::INGESTED_FILES.with_label_values(&["error"]).inc();
                    tracing::error!(task_id = %task_id, "Failed to ingest {}: {}", path.display(), e);
                    scope.enter(PipelineState::Errored);
                    last_error = Some((format!("{}: {}", path.display(), e), e));
                }
            }
        }

        match last_error {
            Some((message, e)) => {
                self.progress
                    .set_status_label(task_id, PipelineState::Errored.label());
                self.progress.set_error(task_id, &message);
                Err(e)
            }
            None => {
                self.progress
                    .set_status_label(task_id, PipelineState::Complete.label());
                self.progress.complete(task_id);
                Ok(summary)
            }
        }
    }

    async fn process_file(&self, scope: &FileScope<'_>, path: &Path) -> Result<FileSummary, IngestError> {
        let output_dir = output_dir_for(&self.output_root, path);

        // Parsing
        scope.enter(PipelineState::Parsing);
        scope.update(Stage::Parse, 0.0);
        let (items, entries, dropped) = self.parse_file(scope, path).await?;
        scope.update(Stage::Parse, 100.0);
        tracing::info!(
            "Parsed {}: {} entries, {} classified, {} dropped",
            path.display(),
            entries,
            items.len(),
            dropped
        );

        // WritingReferences
        scope.enter(PipelineState::WritingReferences);
        fs::create_dir_all(&output_dir)
            .await
            .map_err(|source| IngestError::PrepareOutput {
                path: output_dir.clone(),
                source,
            })?;
        scope.update(Stage::ReferenceWrite, 0.0);
        let references = ReferenceWriter::new(&output_dir)
            .write_batch(&items, self.workers, |done, total| {
                scope.update(Stage::ReferenceWrite, done as f64 * 100.0 / total as f64);
            })
            .await;
        scope.update(Stage::ReferenceWrite, 100.0);

        // BuildingSnapshot
        scope.enter(PipelineState::BuildingSnapshot);
        let catalog = self.build_snapshot(scope, &output_dir, &items);
        snapshot::write_snapshot(&output_dir, &catalog).await?;
        scope.update(Stage::Snapshot, 100.0);

        // Persisting
        scope.enter(PipelineState::Persisting);
        scope.update(Stage::Persist, 0.0);
        let inserted = self.store.insert_snapshot(&catalog).await?;
        scope.update(Stage::Persist, 100.0);

        Ok(FileSummary {
            output_dir,
            entries,
            dropped,
            movies: catalog.movies.len(),
            series: catalog.series.len(),
            episodes: catalog.episode_count(),
            references,
            inserted,
        })
    }

    /// Stream and classify one playlist; parse progress follows bytes consumed
    async fn parse_file(
        &self,
        scope: &FileScope<'_>,
        path: &Path,
    ) -> Result<(Vec<ClassifiedItem>, usize, usize), IngestError> {
        let read_err = |source| IngestError::ReadPlaylist {
            path: path.to_path_buf(),
            source,
        };

        let file = fs::File::open(path).await.map_err(read_err)?;
        let size = file.metadata().await.map_err(read_err)?.len().max(1);

        let consumed = Arc::new(AtomicU64::new(0));
        let counter = consumed.clone();
        let reader = InspectReader::new(file, move |bytes: &[u8]| {
            counter.fetch_add(bytes.len() as u64, Ordering::Relaxed);
        });

        let stream = m3u_parser::entries(BufReader::new(reader));
        tokio::pin!(stream);

        let mut items = Vec::new();
        let mut entries = 0usize;
        let mut dropped = 0usize;

        while let Some(entry) = stream.next().await {
            let entry = entry.map_err(read_err)?;
            entries += 1;

            match self.classifier.classify(&entry) {
                Ok(item) => items.push(item),
                Err(e) => {
                    metrics::CLASSIFICATION_DROPS.inc();
                    tracing::warn!("Dropping entry: {}", e);
                    dropped += 1;
                }
            }

            if entries % PARSE_REPORT_EVERY == 0 {
                let read = consumed.load(Ordering::Relaxed).min(size);
                scope.update(Stage::Parse, read as f64 * 100.0 / size as f64);
            }
        }

        Ok((items, entries, dropped))
    }

    fn build_snapshot(
        &self,
        scope: &FileScope<'_>,
        output_dir: &Path,
        items: &[ClassifiedItem],
    ) -> CatalogSnapshot {
        scope.update(Stage::Snapshot, 0.0);
        let step = (items.len() / SNAPSHOT_STEPS).max(1);
        let mut builder = SnapshotBuilder::new(output_dir);

        for (i, item) in items.iter().enumerate() {
            builder.push(item);
            if (i + 1) % step == 0 {
                // Leave the last 10% for writing the JSON files
                scope.update(Stage::Snapshot, (i + 1) as f64 * 90.0 / items.len() as f64);
            }
        }

        scope.update(Stage::Snapshot, 90.0);
        builder.finish()
    }

    /// Insert the snapshot stored in one result directory
    pub async fn reinsert_dir(&self, dir: &Path) -> Result<u64, IngestError> {
        let catalog = snapshot::load_snapshot(dir).await?;
        let inserted = self.store.insert_snapshot(&catalog).await?;
        tracing::info!("Re-inserted {} documents from {}", inserted, dir.display());
        Ok(inserted)
    }

    /// Re-insert every result directory under the output root
    pub async fn reinsert_all(&self) -> Result<ReinsertReport, IngestError> {
        let mut report = ReinsertReport::default();

        let mut dirs = match fs::read_dir(&self.output_root).await {
            Ok(dirs) => dirs,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(source) => {
                return Err(IngestError::ReadSnapshot {
                    path: self.output_root.clone(),
                    source,
                })
            }
        };

        let mut paths = Vec::new();
        while let Some(entry) = dirs.next_entry().await.map_err(|source| IngestError::ReadSnapshot {
            path: self.output_root.clone(),
            source,
        })? {
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                paths.push(entry.path());
            }
        }
        paths.sort();

        for dir in paths {
            match self.reinsert_dir(&dir).await {
                Ok(count) => {
                    report.directories += 1;
                    report.documents += count;
                }
                Err(e) => {
                    tracing::warn!("Failed to re-insert {}: {}", dir.display(), e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Collection;
    use crate::services::catalog_store::memory::MemoryCatalogStore;
    use tempfile::tempdir;

    const PLAYLIST: &str = "#EXTM3U\n\
        #EXTINF:-1 tvg-logo=\"m.png\" group-title=\"Movies\",Random Movie Title\n\
        http://host/movie/1.mp4\n\
        #EXTINF:-1 tvg-logo=\"x.png\" group-title=\"Series | Drama\",Show S1E1\n\
        http://host/series/1.mkv\n\
        #EXTINF:-1 tvg-logo=\"y.png\" group-title=\"Series | Drama\",Show S01E01\n\
        http://host/series/2.mkv\n\
        #EXTINF:-1 group-title=\"Series | Drama\",Show Name S01E02\n\
        http://host/series/3.mkv\n\
        #EXTINF:-1 group-title=\"Series | Docs\",Documentary Without Numbers\n\
        http://host/series/4.mkv\n\
        #EXTINF:-1,Live Channel\n\
        http://host/live/1.ts\n";

    fn pipeline(store: Arc<MemoryCatalogStore>, root: &Path) -> IngestPipeline {
        IngestPipeline::new(store, ProgressRegistry::new(), MediaClassifier::default(), root, 2)
    }

    fn write_playlist(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_output_dir_for() {
        assert_eq!(
            output_dir_for(Path::new("/out"), Path::new("/in/provider.m3u")),
            PathBuf::from("/out/Result_provider")
        );
        assert_eq!(
            output_dir_for(Path::new("/out"), Path::new("/in/a.b.m3u8")),
            PathBuf::from("/out/Result_a")
        );
    }

    #[tokio::test]
    async fn test_run_success() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let playlist = write_playlist(input.path(), "list.m3u", PLAYLIST);
        let store = Arc::new(MemoryCatalogStore::new());
        let pipeline = pipeline(store.clone(), output.path());
        let task_id = pipeline.progress().create();

        let summary = pipeline.run(&task_id, &[playlist]).await.unwrap();

        let file = &summary.files[0];
        assert_eq!(file.entries, 5);
        assert_eq!(file.dropped, 1);
        assert_eq!(file.movies, 1);
        assert_eq!(file.series, 2);
        assert_eq!(file.references.attempted(), 4);

        let result_dir = output.path().join("Result_list");
        assert!(result_dir.join("movies.json").exists());
        assert!(result_dir.join("series.json").exists());
        let reference = result_dir.join("series/Show/Season 01/Show S01 E01.strm");
        // Same path claimed twice: the first entry in scan order wins
        assert_eq!(std::fs::read_to_string(reference).unwrap(), "http://host/series/1.mkv");

        let series = store.documents(Collection::Series);
        let show = series.iter().find(|s| s["name"] == "Show").unwrap();
        assert_eq!(show["image"], "x.png");
        assert_eq!(store.documents(Collection::Movies).len(), 1);

        let progress = pipeline.progress().get(&task_id).unwrap();
        assert!(progress.is_complete);
        assert!(progress.error.is_none());
        assert_eq!(progress.overall_percent, 100.0);
        assert_eq!(progress.stage_label, "Complete");
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent_on_disk() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let playlist = write_playlist(input.path(), "list.m3u", PLAYLIST);
        let pipeline = pipeline(Arc::new(MemoryCatalogStore::new()), output.path());

        let first = pipeline.run(&pipeline.progress().create(), &[playlist.clone()]).await.unwrap();
        let second = pipeline.run(&pipeline.progress().create(), &[playlist]).await.unwrap();

        assert_eq!(first.files[0].references.written, 3);
        assert_eq!(second.files[0].references.written, 0);
        assert_eq!(second.files[0].references.unchanged, 3);
    }

    #[tokio::test]
    async fn test_store_failure_sets_error() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let playlist = write_playlist(input.path(), "list.m3u", PLAYLIST);
        let store = Arc::new(MemoryCatalogStore::failing());
        let pipeline = pipeline(store.clone(), output.path());
        let task_id = pipeline.progress().create();

        let err = pipeline.run(&task_id, &[playlist]).await.unwrap_err();
        assert!(matches!(err, IngestError::Store(_)));

        let progress = pipeline.progress().get(&task_id).unwrap();
        assert!(progress.is_complete);
        assert!(progress.error.unwrap().contains("catalog store insert failed"));
        assert_eq!(progress.stage_label, "Failed");
        assert!(store.inserts().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_playlist_persists_nothing() {
        let output = tempdir().unwrap();
        let store = Arc::new(MemoryCatalogStore::new());
        let pipeline = pipeline(store.clone(), output.path());
        let task_id = pipeline.progress().create();

        let err = pipeline
            .run(&task_id, &[output.path().join("missing.m3u")])
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::ReadPlaylist { .. }));
        assert!(store.inserts().is_empty());
        assert!(!output.path().join("Result_missing").exists());
        assert!(pipeline.progress().get(&task_id).unwrap().error.is_some());
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_files() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let good = write_playlist(input.path(), "good.m3u", PLAYLIST);
        let store = Arc::new(MemoryCatalogStore::new());
        let pipeline = pipeline(store.clone(), output.path());
        let task_id = pipeline.progress().create();

        let files = vec![input.path().join("first.m3u"), good, input.path().join("third.m3u")];
        let err = pipeline.run(&task_id, &files).await.unwrap_err();

        assert!(matches!(err, IngestError::ReadPlaylist { .. }));
        // The good file in the middle was still persisted
        assert_eq!(store.documents(Collection::Movies).len(), 1);
        assert!(output.path().join("Result_good/movies.json").exists());

        let error = pipeline.progress().get(&task_id).unwrap().error.unwrap();
        assert!(error.contains("third.m3u"));
    }

    #[tokio::test]
    async fn test_latin1_title_keeps_neighbouring_entries() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let playlist = input.path().join("latin.m3u");
        std::fs::write(
            &playlist,
            b"#EXTM3U\n\
              #EXTINF:-1,Good Movie\nhttp://host/a.mp4\n\
              #EXTINF:-1,Caf\xe9 Latin1\nhttp://host/b.mp4\n\
              #EXTINF:-1,Other Movie\nhttp://host/c.mp4\n",
        )
        .unwrap();
        let store = Arc::new(MemoryCatalogStore::new());
        let pipeline = pipeline(store.clone(), output.path());
        let task_id = pipeline.progress().create();

        let summary = pipeline.run(&task_id, &[playlist]).await.unwrap();

        assert_eq!(summary.files[0].movies, 3);
        assert_eq!(store.documents(Collection::Movies).len(), 3);
        assert!(output.path().join("Result_latin/movies/Good Movie/Good Movie.strm").exists());
    }

    /// Records the task's progress each time the pipeline persists
    struct ProgressRecordingStore {
        progress: ProgressRegistry,
        task_id: String,
        seen: std::sync::Mutex<Vec<crate::models::ProgressSnapshot>>,
    }

    #[async_trait::async_trait]
    impl CatalogStore for ProgressRecordingStore {
        async fn insert(
            &self,
            _collection: Collection,
            documents: Vec<serde_json::Value>,
        ) -> Result<u64, crate::error::StoreError> {
            if let Some(snapshot) = self.progress.get(&self.task_id) {
                self.seen.lock().unwrap().push(snapshot);
            }
            Ok(documents.len() as u64)
        }
    }

    #[tokio::test]
    async fn test_earlier_failure_keeps_task_running() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let good = write_playlist(input.path(), "good.m3u", PLAYLIST);
        let progress = ProgressRegistry::new();
        let task_id = progress.create();
        let store = Arc::new(ProgressRecordingStore {
            progress: progress.clone(),
            task_id: task_id.clone(),
            seen: std::sync::Mutex::new(Vec::new()),
        });
        let pipeline = IngestPipeline::new(
            store.clone(),
            progress.clone(),
            MediaClassifier::default(),
            output.path(),
            2,
        );

        let files = vec![input.path().join("missing.m3u"), good];
        pipeline.run(&task_id, &files).await.unwrap_err();

        let seen = store.seen.lock().unwrap().clone();
        assert!(!seen.is_empty());
        for snapshot in &seen {
            assert!(!snapshot.is_complete);
            assert!(snapshot.error.is_none());
            assert_eq!(snapshot.stages.reference_write, 100.0);
            assert!(snapshot.stage_label.starts_with("Saving to catalog"));
        }

        let last = progress.get(&task_id).unwrap();
        assert!(last.is_complete);
        assert!(last.error.unwrap().contains("missing.m3u"));
        assert_eq!(last.stages.persist, 100.0);
        assert_eq!(last.stage_label, "Failed");
    }

    #[tokio::test]
    async fn test_empty_input_is_an_error() {
        let output = tempdir().unwrap();
        let pipeline = pipeline(Arc::new(MemoryCatalogStore::new()), output.path());
        let task_id = pipeline.progress().create();

        let err = pipeline.run(&task_id, &[]).await.unwrap_err();
        assert!(matches!(err, IngestError::NoInput));
        assert!(pipeline.progress().get(&task_id).unwrap().is_complete);
    }

    #[tokio::test]
    async fn test_reinsert_all() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let a = write_playlist(input.path(), "a.m3u", PLAYLIST);
        let b = write_playlist(input.path(), "b.m3u", PLAYLIST);
        let store = Arc::new(MemoryCatalogStore::new());
        let pipeline = pipeline(store.clone(), output.path());
        pipeline.run(&pipeline.progress().create(), &[a, b]).await.unwrap();
        let before = store.documents(Collection::Movies).len();

        let report = pipeline.reinsert_all().await.unwrap();

        assert_eq!(report.directories, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(store.documents(Collection::Movies).len(), before + 2);
    }

    #[tokio::test]
    async fn test_start_runs_in_background() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let playlist = write_playlist(input.path(), "list.m3u", PLAYLIST);
        let pipeline = pipeline(Arc::new(MemoryCatalogStore::new()), output.path());

        let task_id = pipeline.start(vec![playlist]);
        for _ in 0..200 {
            if pipeline.progress().get(&task_id).unwrap().is_complete {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let progress = pipeline.progress().get(&task_id).unwrap();
        assert!(progress.is_complete);
        assert!(progress.error.is_none());
    }
}
