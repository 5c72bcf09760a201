use std::{
    io,
    path::{Path, PathBuf},
};

use catalog::{store, CatalogError, LabelIndex, SampleStore};
use rand::Rng;
use tracing::{debug, instrument};

pub mod audio;
pub mod splits;

pub use audio::{load_waveform, Waveform};
pub use splits::SplitRoots;

/// Upper bound on samples used from one split unless configured otherwise.
pub const DEFAULT_CAP: usize = 99_999;

/// A decoded clip and the display names of its labels.
pub type Sample = (Waveform, Vec<String>);

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("data root not found: {}", path.display())]
    DataRootNotFound { path: PathBuf },
    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("could not resolve labels of {}: {source}", path.display())]
    LabelResolution {
        path: PathBuf,
        #[source]
        source: CatalogError,
    },
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: symphonia::core::errors::Error,
    },
    #[error("{} has no audio track", path.display())]
    NoAudioTrack { path: PathBuf },
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct DatasetConfig {
    /// Maximum number of samples exposed.
    pub cap: usize,
    /// Sort enumerated files by path so indices are stable across runs.
    pub sorted: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            cap: DEFAULT_CAP,
            sorted: false,
        }
    }
}

/// Random-access view over a materialized split.
///
/// Holds only the file list and the label index captured at construction;
/// every lookup reads its own files, so a provider can be shared between
/// threads or cloned into worker processes freely.
#[derive(Debug, Clone)]
pub struct PairedDatasetProvider {
    files: Vec<PathBuf>,
    labels: LabelIndex,
}

impl PairedDatasetProvider {
    pub fn build(
        data_root: impl AsRef<Path>,
        metadata_root: impl AsRef<Path>,
        cap: usize,
    ) -> Result<Self, DatasetError> {
        Self::with_config(
            data_root,
            metadata_root,
            &DatasetConfig {
                cap,
                ..Default::default()
            },
        )
    }

    #[instrument(level = "trace", skip_all, fields(data_root = %data_root.as_ref().display()))]
    pub fn with_config(
        data_root: impl AsRef<Path>,
        metadata_root: impl AsRef<Path>,
        config: &DatasetConfig,
    ) -> Result<Self, DatasetError> {
        let data_root = data_root.as_ref();
        let mut files = SampleStore::new(data_root)
            .audio_files()
            .map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => DatasetError::DataRootNotFound {
                    path: data_root.to_path_buf(),
                },
                _ => DatasetError::Io(err),
            })?;
        if config.sorted {
            files.sort();
        }
        let labels = LabelIndex::from_meta_root(metadata_root)?;

        let provider = Self::from_parts(files, labels, config.cap);
        debug!(len = provider.len(), "dataset ready");
        Ok(provider)
    }

    /// Wraps an already enumerated file list, keeping at most `cap` entries.
    pub fn from_parts(mut files: Vec<PathBuf>, labels: LabelIndex, cap: usize) -> Self {
        files.truncate(cap);
        Self { files, labels }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn path(&self, index: usize) -> Result<&Path, DatasetError> {
        self.files
            .get(index)
            .map(PathBuf::as_path)
            .ok_or(DatasetError::IndexOutOfRange {
                index,
                len: self.len(),
            })
    }

    /// Display names for the raw ids stored in the sample's sidecar.
    pub fn label_names(&self, index: usize) -> Result<Vec<String>, DatasetError> {
        let path = self.path(index)?;
        let tokens = store::read_sidecar(&store::sidecar_for(path))?;

        tokens
            .iter()
            .map(|token| {
                self.labels
                    .resolve_name(token)
                    .map(str::to_string)
                    .map_err(|source| DatasetError::LabelResolution {
                        path: path.to_path_buf(),
                        source,
                    })
            })
            .collect()
    }

    #[instrument(skip(self), level = "trace")]
    pub fn get(&self, index: usize) -> Result<Sample, DatasetError> {
        let names = self.label_names(index)?;
        let waveform = load_waveform(self.path(index)?)?;
        Ok((waveform, names))
    }

    /// `get(index)` plus a second sample at a randomly drawn companion index.
    pub fn get_paired(&self, index: usize) -> Result<(Sample, Sample), DatasetError> {
        self.get_paired_with(index, &mut rand::rng())
    }

    /// Like [`get_paired`](Self::get_paired) with the companion drawn from `rng`.
    pub fn get_paired_with<R: Rng + ?Sized>(
        &self,
        index: usize,
        rng: &mut R,
    ) -> Result<(Sample, Sample), DatasetError> {
        let first = self.get(index)?;
        let companion = companion_index(index, self.len(), rng);
        let second = self.get(companion)?;
        Ok((first, second))
    }
}

/// `(uniform(1..=len) + index) mod len`. May return `index` itself.
///
/// Panics if `len` is zero.
pub fn companion_index<R: Rng + ?Sized>(index: usize, len: usize, rng: &mut R) -> usize {
    (rng.random_range(1..=len) + index) % len
}
