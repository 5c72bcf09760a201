use std::path::PathBuf;

use crate::{DatasetError, PairedDatasetProvider, DEFAULT_CAP};

/// Where the training and validation splits and their shared metadata live.
#[derive(Debug, Clone)]
pub struct SplitRoots {
    pub train_data_root: PathBuf,
    pub valid_data_root: PathBuf,
    pub meta_data_root: PathBuf,
}

impl Default for SplitRoots {
    fn default() -> Self {
        Self {
            train_data_root: PathBuf::from("data/samples"),
            valid_data_root: PathBuf::from("data/eval_segments"),
            meta_data_root: PathBuf::from("meta_data"),
        }
    }
}

impl SplitRoots {
    pub fn training_dataset(&self) -> Result<PairedDatasetProvider, DatasetError> {
        PairedDatasetProvider::build(&self.train_data_root, &self.meta_data_root, DEFAULT_CAP)
    }

    pub fn validation_dataset(&self) -> Result<PairedDatasetProvider, DatasetError> {
        PairedDatasetProvider::build(&self.valid_data_root, &self.meta_data_root, DEFAULT_CAP)
    }
}
