use std::{
    fmt, io,
    path::Path,
    time::Duration,
};

use catalog::{CatalogError, LabelIndex, SampleStore, SegmentCatalog, SegmentRecord};
use tracing::{debug, info, instrument, warn};

pub mod metadata;
pub mod selector;
pub mod tools;

pub use selector::{CatalogSelector, UnknownSelector};
pub use tools::{SourceResolver, ToolError, Transcoder};

/// Errors that abort a whole download run.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Pause after every record that contacted the remote service.
    pub rate_limit: Duration,
    /// Comment lines at the top of each segment catalog.
    pub header_lines: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            rate_limit: Duration::from_secs(2),
            header_lines: catalog::segments::SEGMENT_HEADER_LINES,
        }
    }
}

/// Terminal state of one catalog row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    SkippedExisting,
    Malformed,
    UnknownLabel,
    ResolveFailed,
    TranscodeFailed,
    Completed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogReport {
    pub catalog: String,
    pub skipped_existing: usize,
    pub malformed: usize,
    pub unknown_label: usize,
    pub resolve_failed: usize,
    pub transcode_failed: usize,
    pub completed: usize,
}

impl CatalogReport {
    fn new(catalog: String) -> Self {
        Self {
            catalog,
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: RecordOutcome) {
        let counter = match outcome {
            RecordOutcome::SkippedExisting => &mut self.skipped_existing,
            RecordOutcome::Malformed => &mut self.malformed,
            RecordOutcome::UnknownLabel => &mut self.unknown_label,
            RecordOutcome::ResolveFailed => &mut self.resolve_failed,
            RecordOutcome::TranscodeFailed => &mut self.transcode_failed,
            RecordOutcome::Completed => &mut self.completed,
        };
        *counter += 1;
    }

    pub fn total(&self) -> usize {
        self.skipped_existing
            + self.malformed
            + self.unknown_label
            + self.resolve_failed
            + self.transcode_failed
            + self.completed
    }
}

impl fmt::Display for CatalogReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} completed, {} already present, {} resolve failures, {} transcode failures, {} unknown labels, {} malformed",
            self.catalog,
            self.completed,
            self.skipped_existing,
            self.resolve_failed,
            self.transcode_failed,
            self.unknown_label,
            self.malformed,
        )
    }
}

/// Walks segment catalogs one record at a time and materializes each clip
/// into a [`SampleStore`] under `save_root/<catalog stem>/`.
///
/// Records whose sidecar already exists are skipped, so an interrupted run can
/// simply be started again.
pub struct DownloadOrchestrator<R, T> {
    resolver: R,
    transcoder: T,
    labels: LabelIndex,
    config: DownloadConfig,
}

impl<R: SourceResolver, T: Transcoder> DownloadOrchestrator<R, T> {
    pub fn new(resolver: R, transcoder: T, labels: LabelIndex, config: DownloadConfig) -> Self {
        Self {
            resolver,
            transcoder,
            labels,
            config,
        }
    }

    /// Processes each selected catalog in order, stopping at the first fatal error.
    pub async fn run_all(
        &self,
        selectors: &[CatalogSelector],
        metadata_root: &Path,
        save_root: &Path,
    ) -> Result<Vec<CatalogReport>, DownloadError> {
        let mut reports = Vec::with_capacity(selectors.len());
        for selector in selectors {
            reports.push(self.run(selector.file_name(), metadata_root, save_root).await?);
        }
        Ok(reports)
    }

    #[instrument(skip(self), level = "trace")]
    pub async fn run(
        &self,
        catalog_file: &str,
        metadata_root: &Path,
        save_root: &Path,
    ) -> Result<CatalogReport, DownloadError> {
        let catalog = SegmentCatalog::open(metadata_root.join(catalog_file), self.config.header_lines)?;
        for line in catalog.header() {
            info!("{line}");
        }

        let store = SampleStore::create(save_root.join(catalog.stem()))?;
        let mut report = CatalogReport::new(catalog.stem());
        let start = std::time::Instant::now();

        for (position, record) in catalog.records().enumerate() {
            let outcome = match record {
                Ok(record) => self.process_record(&store, &record).await?,
                Err(err) => {
                    warn!(%err, "skipping malformed catalog row");
                    RecordOutcome::Malformed
                }
            };
            report.record(outcome);
            debug!(progress = position + 1, total = catalog.len(), ?outcome, "record finished");
        }

        let elapsed = start.elapsed();
        info!(?elapsed, "{report}");
        Ok(report)
    }

    /// Runs one record through the resumability check, the external tools and
    /// the sidecar write. Only failures writing to the local store are fatal.
    #[instrument(skip_all, fields(video_id = %record.video_id), level = "trace")]
    async fn process_record(
        &self,
        store: &SampleStore,
        record: &SegmentRecord,
    ) -> Result<RecordOutcome, DownloadError> {
        if store.is_complete(&record.video_id) {
            return Ok(RecordOutcome::SkippedExisting);
        }

        if let Some(unknown) = record.label_ids.iter().find(|id| !self.labels.contains(id)) {
            warn!(label = %unknown, "skipping record with unknown label");
            return Ok(RecordOutcome::UnknownLabel);
        }

        let outcome = self.acquire(store, record).await;
        tokio::time::sleep(self.config.rate_limit).await;
        outcome
    }

    async fn acquire(
        &self,
        store: &SampleStore,
        record: &SegmentRecord,
    ) -> Result<RecordOutcome, DownloadError> {
        let source = match self.resolver.resolve(record).await {
            Ok(source) => source,
            Err(err) => {
                warn!(%err, "could not resolve source");
                return Ok(RecordOutcome::ResolveFailed);
            }
        };

        let partial = store.partial_audio_path(&record.video_id);
        let transcoded = self
            .transcoder
            .transcode(&source, record.start_time, record.end_time, &partial)
            .await;
        if let Err(err) = transcoded {
            warn!(%err, "transcode failed");
            discard_partial(&partial).await;
            return Ok(RecordOutcome::TranscodeFailed);
        }
        if !partial.is_file() {
            warn!(path = %partial.display(), "transcoder reported success without writing output");
            return Ok(RecordOutcome::TranscodeFailed);
        }

        store.commit(&record.video_id, &record.label_ids)?;
        debug!(labels = ?record.label_ids, "sample stored");
        Ok(RecordOutcome::Completed)
    }
}

async fn discard_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial download"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(%err, path = %path.display(), "could not remove partial download"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_each_outcome() {
        let mut report = CatalogReport::new("eval_segments".to_string());
        for outcome in [
            RecordOutcome::Completed,
            RecordOutcome::Completed,
            RecordOutcome::SkippedExisting,
            RecordOutcome::ResolveFailed,
            RecordOutcome::Malformed,
        ] {
            report.record(outcome);
        }

        assert_eq!(report.completed, 2);
        assert_eq!(report.skipped_existing, 1);
        assert_eq!(report.resolve_failed, 1);
        assert_eq!(report.malformed, 1);
        assert_eq!(report.total(), 5);
        assert!(report.to_string().starts_with("eval_segments: 2 completed"));
    }

    #[test]
    fn default_config_waits_two_seconds() {
        let config = DownloadConfig::default();
        assert_eq!(config.rate_limit, Duration::from_secs(2));
        assert_eq!(config.header_lines, 3);
    }
}
