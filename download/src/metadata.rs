//! Fetches the published AudioSet catalogs into a metadata root.

use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
    sync::OnceLock,
    time::Duration,
};

use catalog::labels::CLASS_CATALOG_FILE;
use tracing::{info, instrument};

use crate::{CatalogSelector, DownloadError};

const BASE_URL: &str = "http://storage.googleapis.com/us_audioset/youtube_corpus/v1/csv";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(60);

fn agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .build()
    })
}

/// Every catalog file a complete metadata root holds.
pub fn metadata_files() -> Vec<&'static str> {
    CatalogSelector::ALL
        .into_iter()
        .map(CatalogSelector::file_name)
        .chain([CLASS_CATALOG_FILE])
        .collect()
}

pub fn metadata_url(file_name: &str) -> String {
    format!("{BASE_URL}/{file_name}")
}

/// Downloads every missing catalog into `meta_root`, returning the files written.
///
/// Existing files are left alone. Blocking; call from `spawn_blocking` inside a runtime.
#[instrument(level = "trace")]
pub fn fetch_metadata(meta_root: &Path) -> Result<Vec<PathBuf>, DownloadError> {
    fs::create_dir_all(meta_root)?;

    let mut fetched = Vec::new();
    for file_name in metadata_files() {
        let destination = meta_root.join(file_name);
        if destination.is_file() {
            info!("{file_name} already exists");
            continue;
        }

        let url = metadata_url(file_name);
        let bytes = fetch_to(&url, &destination)?;
        info!(bytes, "fetched {file_name}");
        fetched.push(destination);
    }

    Ok(fetched)
}

fn fetch_to(url: &str, destination: &Path) -> Result<u64, DownloadError> {
    let response = agent().get(url).call().map_err(|err| DownloadError::Fetch {
        url: url.to_string(),
        reason: err.to_string(),
    })?;

    let partial = destination.with_extension("csv.part");
    let mut file = File::create(&partial)?;
    let bytes = io::copy(&mut response.into_reader(), &mut file)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&partial, destination)?;

    Ok(bytes)
}
