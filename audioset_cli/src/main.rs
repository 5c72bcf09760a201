use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use catalog::LabelIndex;
use clap::Parser;
use dataset::{DatasetConfig, PairedDatasetProvider, Sample, DEFAULT_CAP};
use download::{
    tools::{Ffmpeg, YoutubeDl},
    CatalogSelector, DownloadConfig, DownloadOrchestrator,
};
use tracing::{info, instrument};

#[derive(Debug, clap::Parser)]
#[command(version, about = "Build and inspect a local AudioSet corpus")]
enum Command {
    /// Download the clips listed in the segment catalogs.
    Download {
        /// One of eval_segments.csv, balanced_train_segments.csv,
        /// unbalanced_train_segments.csv. All three when omitted.
        #[arg(long)]
        meta: Option<CatalogSelector>,
        #[arg(long, default_value = "meta_data")]
        meta_root: PathBuf,
        #[arg(long, default_value = "data")]
        save_root: PathBuf,
        /// Pause after each attempted record, in milliseconds.
        #[arg(long, default_value_t = 2000)]
        rate_limit_ms: u64,
        #[arg(long, default_value_t = 60)]
        resolve_timeout_secs: u64,
        #[arg(long, default_value_t = 300)]
        transcode_timeout_secs: u64,
        #[arg(long, default_value = "youtube-dl")]
        youtube_dl: PathBuf,
        #[arg(long, default_value = "ffmpeg")]
        ffmpeg: PathBuf,
        /// Do not fetch missing catalogs before downloading.
        #[arg(long)]
        skip_metadata_fetch: bool,
    },
    /// Print one sample (or pair) from a downloaded split.
    Inspect {
        data_root: PathBuf,
        #[arg(long, default_value = "meta_data")]
        meta_root: PathBuf,
        #[arg(short, long, default_value_t = 0)]
        index: usize,
        #[arg(long)]
        paired: bool,
        #[arg(long, default_value_t = DEFAULT_CAP)]
        cap: usize,
        #[arg(long)]
        sorted: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    {
        use tracing_subscriber::prelude::*;

        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(tracing_subscriber::EnvFilter::from_default_env())
            .init()
    }

    match Command::parse() {
        Command::Download {
            meta,
            meta_root,
            save_root,
            rate_limit_ms,
            resolve_timeout_secs,
            transcode_timeout_secs,
            youtube_dl,
            ffmpeg,
            skip_metadata_fetch,
        } => {
            if !skip_metadata_fetch {
                fetch_metadata(meta_root.clone()).await?;
            }

            let resolver = YoutubeDl {
                program: youtube_dl,
                timeout: Duration::from_secs(resolve_timeout_secs),
            };
            let transcoder = Ffmpeg {
                program: ffmpeg,
                timeout: Duration::from_secs(transcode_timeout_secs),
            };
            let config = DownloadConfig {
                rate_limit: Duration::from_millis(rate_limit_ms),
                ..Default::default()
            };
            download_catalogs(
                CatalogSelector::selected(meta),
                resolver,
                transcoder,
                config,
                &meta_root,
                &save_root,
            )
            .await
        }
        Command::Inspect {
            data_root,
            meta_root,
            index,
            paired,
            cap,
            sorted,
        } => inspect(data_root, meta_root, index, paired, &DatasetConfig { cap, sorted }),
    }
}

async fn fetch_metadata(meta_root: PathBuf) -> anyhow::Result<()> {
    info!("fetching metadata");
    let fetched =
        tokio::task::spawn_blocking(move || download::metadata::fetch_metadata(&meta_root))
            .await??;
    info!(fetched = fetched.len(), "metadata ready");
    Ok(())
}

#[instrument(skip_all, level = "trace")]
async fn download_catalogs(
    selectors: Vec<CatalogSelector>,
    resolver: YoutubeDl,
    transcoder: Ffmpeg,
    config: DownloadConfig,
    meta_root: &Path,
    save_root: &Path,
) -> anyhow::Result<()> {
    let labels = LabelIndex::from_meta_root(meta_root).context("failed to load class catalog")?;
    let orchestrator = DownloadOrchestrator::new(resolver, transcoder, labels, config);

    let start = std::time::Instant::now();
    let reports = orchestrator
        .run_all(&selectors, meta_root, save_root)
        .await?;
    let elapsed = start.elapsed();
    info!(?elapsed, "completed download");

    for report in reports {
        println!("{report}");
    }
    Ok(())
}

fn inspect(
    data_root: PathBuf,
    meta_root: PathBuf,
    index: usize,
    paired: bool,
    config: &DatasetConfig,
) -> anyhow::Result<()> {
    let provider = PairedDatasetProvider::with_config(&data_root, &meta_root, config)
        .with_context(|| format!("failed to open dataset at {}", data_root.display()))?;
    println!("{} samples in {}", provider.len(), data_root.display());

    if paired {
        let (first, second) = provider.get_paired(index)?;
        describe("first", &first);
        describe("second", &second);
    } else {
        describe("sample", &provider.get(index)?);
    }
    Ok(())
}

fn describe(name: &str, (waveform, labels): &Sample) {
    println!(
        "{name}: {} channels x {} frames @ {} Hz, labels: {}",
        waveform.channel_count(),
        waveform.frames(),
        waveform.sample_rate,
        labels.join(", ")
    );
}
