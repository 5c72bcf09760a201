//! On-disk layout of a materialized split.
//!
//! Every sample is `audioset<video_id>.wav` plus a sidecar `audioset<video_id>.txt`
//! holding the raw machine ids of its labels. The sidecar is the completion
//! marker: it is only written once the audio file is in place.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::{info, trace};

pub const SAMPLE_PREFIX: &str = "audioset";
pub const AUDIO_EXTENSION: &str = "wav";
pub const SIDECAR_EXTENSION: &str = "txt";
pub const PARTIAL_EXTENSION: &str = "wav.part";
pub const LABEL_DELIMITER: &str = ",";

#[derive(Debug, Clone)]
pub struct SampleStore {
    root: PathBuf,
}

impl SampleStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Opens the store, creating its directory when missing.
    pub fn create(root: impl Into<PathBuf>) -> io::Result<Self> {
        let store = Self::new(root);
        if !store.root.is_dir() {
            fs::create_dir_all(&store.root)?;
            info!(root = %store.root.display(), "created sample directory");
        }
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn basename(video_id: &str) -> String {
        format!("{SAMPLE_PREFIX}{video_id}")
    }

    pub fn audio_path(&self, video_id: &str) -> PathBuf {
        self.sample_path(video_id, AUDIO_EXTENSION)
    }

    pub fn sidecar_path(&self, video_id: &str) -> PathBuf {
        self.sample_path(video_id, SIDECAR_EXTENSION)
    }

    /// Where the transcoder writes before the audio is moved into place.
    pub fn partial_audio_path(&self, video_id: &str) -> PathBuf {
        self.sample_path(video_id, PARTIAL_EXTENSION)
    }

    fn sample_path(&self, video_id: &str, extension: &str) -> PathBuf {
        self.root
            .join(format!("{}.{extension}", Self::basename(video_id)))
    }

    /// A sample counts as downloaded once its sidecar exists.
    pub fn is_complete(&self, video_id: &str) -> bool {
        self.sidecar_path(video_id).is_file()
    }

    /// Moves a finished partial download into place and writes its sidecar.
    pub fn commit(&self, video_id: &str, label_ids: &[String]) -> io::Result<()> {
        fs::rename(self.partial_audio_path(video_id), self.audio_path(video_id))?;
        write_sidecar(&self.sidecar_path(video_id), label_ids)
    }

    /// All audio files directly under the store root, in directory order.
    pub fn audio_files(&self) -> io::Result<Vec<PathBuf>> {
        enumerate_audio(&self.root)
    }
}

pub fn sidecar_for(audio_path: &Path) -> PathBuf {
    audio_path.with_extension(SIDECAR_EXTENSION)
}

pub fn write_sidecar(path: &Path, label_ids: &[String]) -> io::Result<()> {
    fs::write(path, label_ids.join(LABEL_DELIMITER))
}

/// Reads the first line of a sidecar as trimmed raw tokens.
pub fn read_sidecar(path: &Path) -> io::Result<Vec<String>> {
    let contents = fs::read_to_string(path)?;
    let first_line = contents.lines().next().unwrap_or_default();

    Ok(first_line
        .split(LABEL_DELIMITER)
        .map(|token| token.replace(' ', ""))
        .filter(|token| !token.is_empty())
        .collect())
}

fn enumerate_audio(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == AUDIO_EXTENSION) {
            files.push(path);
        }
    }
    trace!(count = files.len(), root = %root.display(), "enumerated audio files");
    Ok(files)
}
