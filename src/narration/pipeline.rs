//! End-to-end narration run: synthesize, merge, apply retention.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::coordinator::SynthesisCoordinator;
use super::merger::{Concatenator, CopyConcatenator, FfmpegConcatenator, MergeReport, Merger};
use super::provider::SynthesisClient;
use super::provider::aivis_speech::AivisSpeechClient;
use super::provider::command::CommandSynthesisClient;
use super::provider::mock::MockSynthesisClient;
use super::voice::Voice;
use super::{OrderedResults, Segment};
use crate::config::{Config, MergeConfig, TtsConfig};

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct NarrationRun {
    pub results: OrderedResults,
    pub report: MergeReport,
}

/// Synthesis coordinator and merger wired together.
pub struct Narrator {
    coordinator: SynthesisCoordinator,
    merger: Merger,
    keep_segments: bool,
}

impl Narrator {
    pub fn new(coordinator: SynthesisCoordinator, merger: Merger) -> Self {
        Self {
            coordinator,
            merger,
            keep_segments: true,
        }
    }

    /// Build from configuration: backend, merge tool, work dir, limits.
    pub fn from_config(config: &Config) -> Result<Self> {
        let work_dir = config.narration.work_dir_path();
        std::fs::create_dir_all(&work_dir)
            .with_context(|| format!("failed to create work dir {}", work_dir.display()))?;

        let client = build_client(&config.tts)?;
        let concatenator = build_concatenator(&config.merge)?;

        let coordinator =
            SynthesisCoordinator::new(client, &work_dir, config.narration.max_concurrent)
                .with_task_timeout(config.narration.task_timeout);
        let merger = Merger::new(concatenator, &work_dir)
            .with_output_name(config.narration.output_name.clone());

        Ok(Self::new(coordinator, merger).keep_segments(config.narration.keep_segments))
    }

    /// Whether per-segment files survive a successful merge.
    pub fn keep_segments(mut self, keep: bool) -> Self {
        self.keep_segments = keep;
        self
    }

    pub async fn run(&self, segments: &[Segment], voice: Voice) -> Result<NarrationRun> {
        self.run_with_cancel(segments, voice, CancellationToken::new())
            .await
    }

    /// Synthesize and merge.  Errors only on an invalid segment list.
    pub async fn run_with_cancel(
        &self,
        segments: &[Segment],
        voice: Voice,
        cancel: CancellationToken,
    ) -> Result<NarrationRun> {
        info!(
            segments = segments.len(),
            voice = voice.backend_name(),
            work_dir = %self.coordinator.work_dir().display(),
            "Narration run started"
        );

        let results = self
            .coordinator
            .synthesize_all_with_cancel(segments, voice, cancel)
            .await?;
        let report = self.merger.merge(&results).await;

        if !self.keep_segments && report.has_output() {
            self.discard_segments(&results).await;
        }

        match &report.output_path {
            Some(path) => info!(
                output = %path.display(),
                included = report.included_indices.len(),
                skipped = report.skipped_indices.len(),
                "Narration run finished"
            ),
            None => warn!(
                skipped = report.skipped_indices.len(),
                "Narration run finished without a merged file"
            ),
        }

        Ok(NarrationRun { results, report })
    }

    async fn discard_segments(&self, results: &OrderedResults) {
        for path in results.successes().filter_map(|o| o.artifact()) {
            if let Err(e) = tokio::fs::remove_file(path).await {
                debug!(path = %path.display(), error = %e, "Failed to remove segment audio");
            }
        }
    }
}

/// Synthesis backend named by `[tts].provider`.
pub fn build_client(config: &TtsConfig) -> Result<Arc<dyn SynthesisClient>> {
    let client: Arc<dyn SynthesisClient> = match config.provider.as_str() {
        "command" => Arc::new(CommandSynthesisClient::new(config.command.clone())),
        "aivis-speech" => Arc::new(AivisSpeechClient::new(config.aivis_speech.clone())),
        "mock" => Arc::new(MockSynthesisClient::default()),
        other => bail!("unknown TTS provider '{}'", other),
    };
    Ok(client)
}

/// Concatenation tool named by `[merge].tool`.
pub fn build_concatenator(config: &MergeConfig) -> Result<Arc<dyn Concatenator>> {
    let concatenator: Arc<dyn Concatenator> = match config.tool.as_str() {
        "ffmpeg" => Arc::new(FfmpegConcatenator::new(config.ffmpeg_path.clone())),
        "copy" => Arc::new(CopyConcatenator),
        other => bail!("unknown merge tool '{}'", other),
    };
    Ok(concatenator)
}
