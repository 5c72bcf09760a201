//! External collaborators of the download loop.
//!
//! Both seams are traits so the orchestrator can be driven by fakes; the
//! default implementations shell out to `youtube-dl` and `ffmpeg`.

use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
    process::{ExitStatus, Output, Stdio},
    time::Duration,
};

use async_trait::async_trait;
use catalog::SegmentRecord;
use tokio::process::Command;
use tracing::{instrument, trace};

/// How much of a failing tool's stderr is kept in the error.
const STDERR_TAIL: usize = 512;

/// A single external tool invocation that did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} timed out after {limit:?}")]
    Timeout { program: String, limit: Duration },
    #[error("{program} exited with {status}: {stderr}")]
    ExitStatus {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("{program} produced no output")]
    EmptyOutput { program: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Turns a segment reference into a playable media location.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn resolve(&self, segment: &SegmentRecord) -> Result<String, ToolError>;
}

/// Cuts `[start_time, end_time]` out of `source` into a stereo WAV at `destination`.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(
        &self,
        source: &str,
        start_time: f64,
        end_time: f64,
        destination: &Path,
    ) -> Result<(), ToolError>;
}

#[derive(Debug, Clone)]
pub struct YoutubeDl {
    pub program: PathBuf,
    pub timeout: Duration,
}

impl Default for YoutubeDl {
    fn default() -> Self {
        Self {
            program: PathBuf::from("youtube-dl"),
            timeout: Duration::from_secs(60),
        }
    }
}

impl YoutubeDl {
    pub fn watch_url(segment: &SegmentRecord) -> String {
        format!(
            "http://www.youtube.com/v/{}?start={}&end={}&version=3",
            segment.video_id, segment.start_time, segment.end_time
        )
    }
}

#[async_trait]
impl SourceResolver for YoutubeDl {
    #[instrument(skip_all, fields(video_id = %segment.video_id), level = "trace")]
    async fn resolve(&self, segment: &SegmentRecord) -> Result<String, ToolError> {
        let args = ["-x", "--extract-audio", "--audio-format", "wav", "-g"]
            .into_iter()
            .map(OsString::from)
            .chain([OsString::from(Self::watch_url(segment))]);
        let output = run_tool(&self.program, args, self.timeout).await?;

        // -g may print several urls, the first is the audio stream
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ToolError::EmptyOutput {
                program: display_name(&self.program),
            })
    }
}

#[derive(Debug, Clone)]
pub struct Ffmpeg {
    pub program: PathBuf,
    pub timeout: Duration,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            timeout: Duration::from_secs(300),
        }
    }
}

#[async_trait]
impl Transcoder for Ffmpeg {
    #[instrument(skip(self, source), level = "trace")]
    async fn transcode(
        &self,
        source: &str,
        start_time: f64,
        end_time: f64,
        destination: &Path,
    ) -> Result<(), ToolError> {
        let args: Vec<OsString> = vec![
            "-y".into(),
            "-v".into(),
            "quiet".into(),
            "-i".into(),
            source.into(),
            "-ss".into(),
            start_time.to_string().into(),
            "-to".into(),
            end_time.to_string().into(),
            "-ac".into(),
            "2".into(),
            "-f".into(),
            "wav".into(),
            destination.into(),
        ];
        run_tool(&self.program, args, self.timeout).await?;
        Ok(())
    }
}

/// Runs a program to completion, failing on spawn errors, timeouts and
/// non-zero exit codes. The child is killed if the timeout elapses.
pub async fn run_tool(
    program: &Path,
    args: impl IntoIterator<Item = OsString>,
    limit: Duration,
) -> Result<Output, ToolError> {
    let name = display_name(program);
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ToolError::Spawn {
            program: name.clone(),
            source,
        })?;

    let output = tokio::time::timeout(limit, child.wait_with_output())
        .await
        .map_err(|_| ToolError::Timeout {
            program: name.clone(),
            limit,
        })??;
    trace!(program = %name, status = %output.status, "tool exited");

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail = stderr_tail(&stderr);
        return Err(ToolError::ExitStatus {
            program: name,
            status: output.status,
            stderr: tail,
        });
    }

    Ok(output)
}

/// Last `STDERR_TAIL` bytes of `stderr`, widened to start on a char boundary.
fn stderr_tail(stderr: &str) -> String {
    let mut start = stderr.len().saturating_sub(STDERR_TAIL);
    while !stderr.is_char_boundary(start) {
        start += 1;
    }
    stderr[start..].trim().to_string()
}

fn display_name(program: &Path) -> String {
    program.display().to_string()
}
