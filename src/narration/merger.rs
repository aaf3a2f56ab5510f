//! Ordered, lossless merge of per-segment audio.
//!
//! Successful artifacts are concatenated in ascending segment index (the
//! order [`OrderedResults`] already guarantees) with stream copy, never
//! re-encoding.  The merge either produces one file or reports why not;
//! it never fails the caller.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use super::OrderedResults;
use super::provider::short_id;
use crate::utils::safe_truncate;

/// Maximum bytes of ffmpeg stderr carried into an error message.
const MAX_STDERR_BYTES: usize = 1000;

// ── Report ───────────────────────────────────────────────────────

/// What a merge produced and which segments it left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Merged track; absent when nothing could be merged.
    pub output_path: Option<PathBuf>,
    /// Segments in the merged track, in merge order (ascending).
    pub included_indices: Vec<usize>,
    /// Segments left out, with the reason.
    pub skipped_indices: BTreeMap<usize, String>,
    /// Set when the concatenation tool itself failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_error: Option<String>,
}

impl MergeReport {
    pub fn has_output(&self) -> bool {
        self.output_path.is_some()
    }

    /// True when every segment made it into the merged track.
    pub fn is_complete(&self) -> bool {
        self.has_output() && self.skipped_indices.is_empty()
    }
}

// ── Concatenation tools ──────────────────────────────────────────

/// Joins audio files, in the given order, into one file without re-encoding.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Concatenator: Send + Sync {
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<()>;
}

/// Concatenation through ffmpeg's concat demuxer with `-c copy`.
pub struct FfmpegConcatenator {
    program: String,
}

impl FfmpegConcatenator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, manifest: &Path, output: &Path) -> Result<()> {
        let result = Command::new(&self.program)
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(manifest)
            .args(["-c", "copy"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        let out = match result {
            Ok(out) => out,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                bail!("'{}' command not found; install FFmpeg", self.program)
            }
            Err(e) => return Err(e).with_context(|| format!("failed to run {}", self.program)),
        };

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            bail!(
                "{} exited with {}: {}",
                self.program,
                out.status,
                safe_truncate(stderr.trim(), MAX_STDERR_BYTES)
            );
        }
        Ok(())
    }
}

impl Default for FfmpegConcatenator {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl Concatenator for FfmpegConcatenator {
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        if inputs.is_empty() {
            bail!("nothing to concatenate");
        }
        for input in inputs {
            if !tokio::fs::try_exists(input).await.unwrap_or(false) {
                bail!("missing input {}", input.display());
            }
        }

        let manifest_dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let manifest = manifest_dir.join(format!("mergelist_{}.txt", short_id()));
        tokio::fs::write(&manifest, build_manifest(inputs)?)
            .await
            .with_context(|| format!("failed to write {}", manifest.display()))?;

        let result = self.run(&manifest, output).await;

        if let Err(e) = tokio::fs::remove_file(&manifest).await {
            debug!(path = %manifest.display(), error = %e, "Failed to remove merge manifest");
        }
        result?;

        let size = tokio::fs::metadata(output)
            .await
            .with_context(|| format!("{} produced no output", self.program))?
            .len();
        if size == 0 {
            bail!("{} produced an empty output", self.program);
        }
        Ok(())
    }
}

/// Concat-demuxer manifest: one `file '<absolute path>'` line per input.
///
/// Deterministic for a given input list.
pub fn build_manifest(inputs: &[PathBuf]) -> Result<String> {
    let mut manifest = String::new();
    for input in inputs {
        let absolute = std::path::absolute(input)
            .with_context(|| format!("cannot resolve {}", input.display()))?;
        let escaped = absolute.to_string_lossy().replace('\'', r"'\''");
        manifest.push_str(&format!("file '{}'\n", escaped));
    }
    Ok(manifest)
}

/// Direct copy of the inputs into one file, no external tool needed.
///
/// Frame-based formats such as MP3 are appended byte for byte.  RIFF/WAV
/// inputs carry a length-bearing header, so their PCM samples are copied
/// into a single new container instead; every input must share one format.
#[derive(Debug, Default)]
pub struct CopyConcatenator;

#[async_trait]
impl Concatenator for CopyConcatenator {
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        if inputs.is_empty() {
            bail!("nothing to concatenate");
        }

        let mut riff = Vec::with_capacity(inputs.len());
        for input in inputs {
            riff.push(is_riff(input).await?);
        }
        if riff.iter().all(|&r| r) {
            let inputs = inputs.to_vec();
            let output = output.to_path_buf();
            return tokio::task::spawn_blocking(move || concat_wav(&inputs, &output))
                .await
                .context("WAV merge task panicked")?;
        }
        if let Some(pos) = riff.iter().position(|&r| r) {
            bail!(
                "cannot append WAV input {} to non-WAV audio",
                inputs[pos].display()
            );
        }

        let mut out = tokio::fs::File::create(output)
            .await
            .with_context(|| format!("failed to create {}", output.display()))?;
        for input in inputs {
            let mut file = tokio::fs::File::open(input)
                .await
                .with_context(|| format!("missing input {}", input.display()))?;
            tokio::io::copy(&mut file, &mut out)
                .await
                .with_context(|| format!("failed to copy {}", input.display()))?;
        }
        out.flush().await.context("failed to flush merged output")?;
        Ok(())
    }
}

/// Whether `path` starts with a RIFF header.
async fn is_riff(path: &Path) -> Result<bool> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("missing input {}", path.display()))?;
    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic).await {
        Ok(_) => Ok(&magic == b"RIFF"),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

/// Copy the samples of every WAV input, in order, into one WAV file.
fn concat_wav(inputs: &[PathBuf], output: &Path) -> Result<()> {
    let first = hound::WavReader::open(&inputs[0])
        .with_context(|| format!("failed to read WAV {}", inputs[0].display()))?;
    let spec = first.spec();
    drop(first);

    let mut writer = hound::WavWriter::create(output, spec)
        .with_context(|| format!("failed to create {}", output.display()))?;
    for input in inputs {
        let mut reader = hound::WavReader::open(input)
            .with_context(|| format!("failed to read WAV {}", input.display()))?;
        if reader.spec() != spec {
            bail!(
                "WAV format of {} differs from {}",
                input.display(),
                inputs[0].display()
            );
        }
        match spec.sample_format {
            hound::SampleFormat::Float => {
                for sample in reader.samples::<f32>() {
                    writer.write_sample(sample?)?;
                }
            }
            hound::SampleFormat::Int => {
                for sample in reader.samples::<i32>() {
                    writer.write_sample(sample?)?;
                }
            }
        }
    }
    writer.finalize().context("failed to finalize merged WAV")?;
    Ok(())
}

// ── Merger ───────────────────────────────────────────────────────

/// Merges the successful outcomes of a run into one audio file.
pub struct Merger {
    concatenator: Arc<dyn Concatenator>,
    output_dir: PathBuf,
    output_name: Option<String>,
}

impl Merger {
    pub fn new(concatenator: Arc<dyn Concatenator>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            concatenator,
            output_dir: output_dir.into(),
            output_name: None,
        }
    }

    /// Use a fixed file name for the merged track instead of a generated one.
    pub fn with_output_name(mut self, name: Option<String>) -> Self {
        self.output_name = name;
        self
    }

    fn output_path(&self, first_input: &Path) -> PathBuf {
        let name = match &self.output_name {
            Some(name) => name.clone(),
            None => {
                let ext = first_input
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("mp3");
                format!("audio_merge_{}.{}", short_id(), ext)
            }
        };
        self.output_dir.join(name)
    }

    /// Concatenate every successful outcome, in index order, into one file.
    pub async fn merge(&self, results: &OrderedResults) -> MergeReport {
        let mut skipped: BTreeMap<usize, String> = results
            .failures()
            .map(|o| (o.index, o.error_reason().unwrap_or_default().to_string()))
            .collect();

        let (included, inputs): (Vec<usize>, Vec<PathBuf>) = results
            .successes()
            .filter_map(|o| o.artifact().map(|p| (o.index, p.to_path_buf())))
            .unzip();

        let Some(first) = inputs.first() else {
            warn!(
                segments = results.len(),
                "Audio merge skipped: no synthesized segments"
            );
            return MergeReport {
                skipped_indices: skipped,
                ..Default::default()
            };
        };

        let output = self.output_path(first);
        info!(
            files = inputs.len(),
            output = %output.display(),
            "Merging audio segments"
        );

        match self.concat(&inputs, &output).await {
            Ok(()) => {
                info!(
                    output = %output.display(),
                    included = included.len(),
                    skipped = skipped.len(),
                    "Merge complete"
                );
                MergeReport {
                    output_path: Some(output),
                    included_indices: included,
                    skipped_indices: skipped,
                    merge_error: None,
                }
            }
            Err(e) => {
                let message = format!("{e:#}");
                error!(error = %message, "Audio merge failed");
                let reason = format!("merge failed: {}", message);
                for index in included {
                    skipped.insert(index, reason.clone());
                }
                MergeReport {
                    output_path: None,
                    included_indices: Vec::new(),
                    skipped_indices: skipped,
                    merge_error: Some(message),
                }
            }
        }
    }

    /// Concatenate into a staging sibling and move it over `output` only on
    /// success, so a failed merge never touches an existing file.
    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("failed to create {}", self.output_dir.display()))?;

        let staging = staging_path(output);
        let result = match self.concatenator.concat(inputs, &staging).await {
            Ok(()) => tokio::fs::rename(&staging, output)
                .await
                .with_context(|| format!("failed to move merged audio to {}", output.display())),
            Err(e) => Err(e),
        };
        if result.is_err() {
            if let Err(e) = tokio::fs::remove_file(&staging).await {
                debug!(path = %staging.display(), error = %e, "No staged merge output to remove");
            }
        }
        result
    }
}

/// Hidden sibling of `output` that keeps its extension, since ffmpeg picks
/// the muxer from it.
fn staging_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!(".partial_{}_{}", short_id(), name))
}
