//! Parallel synthesis with an ordered result set.
//!
//! Every segment is dispatched to its own `tokio::spawn` task, bounded by a
//! semaphore.  Tasks finish in arbitrary order and report index-tagged
//! outcomes over a channel; the coordinator writes each one into a slot
//! addressed by its index.  Completion order never reaches the result.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::provider::{SynthesisClient, artifact_file_name};
use super::sanitize::sanitize;
use super::voice::Voice;
use super::{NarrationError, OrderedResults, Segment, SynthesisOutcome, validate_indices};
use crate::config::DEFAULT_MAX_CONCURRENT;
use crate::utils::preview;

pub const EMPTY_NARRATION: &str = "empty narration";
pub const CANCELLED: &str = "cancelled";
const UNREPORTED: &str = "synthesis task ended without reporting an outcome";

/// Fans synthesis out across tasks and gathers the outcomes in index order.
pub struct SynthesisCoordinator {
    client: Arc<dyn SynthesisClient>,
    work_dir: PathBuf,
    semaphore: Arc<Semaphore>,
    task_timeout: Option<Duration>,
}

impl SynthesisCoordinator {
    /// Create a coordinator writing artifacts into `work_dir`, with at most
    /// `max_concurrent` synthesis calls in flight (minimum 1).
    pub fn new(
        client: Arc<dyn SynthesisClient>,
        work_dir: impl Into<PathBuf>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            client,
            work_dir: work_dir.into(),
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            task_timeout: None,
        }
    }

    /// Create a coordinator with the default concurrency (3).
    pub fn with_defaults(client: Arc<dyn SynthesisClient>, work_dir: impl Into<PathBuf>) -> Self {
        Self::new(client, work_dir, DEFAULT_MAX_CONCURRENT)
    }

    /// Fail any single synthesis call that runs longer than `timeout`.
    pub fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Synthesize every segment and return one outcome per segment, sorted
    /// by index.
    ///
    /// Only an invalid index set is an error; synthesis failures become
    /// failure outcomes.
    pub async fn synthesize_all(
        &self,
        segments: &[Segment],
        voice: Voice,
    ) -> Result<OrderedResults, NarrationError> {
        self.synthesize_all_with_cancel(segments, voice, CancellationToken::new())
            .await
    }

    /// Like [`synthesize_all`](Self::synthesize_all), but stops early when
    /// `cancel` fires.  Unfinished segments are recorded as cancelled; the
    /// call still waits for every task before returning.
    pub async fn synthesize_all_with_cancel(
        &self,
        segments: &[Segment],
        voice: Voice,
        cancel: CancellationToken,
    ) -> Result<OrderedResults, NarrationError> {
        validate_indices(segments)?;

        let mut slots: Vec<Option<SynthesisOutcome>> = vec![None; segments.len()];
        let (tx, mut rx) = mpsc::unbounded_channel::<SynthesisOutcome>();
        let mut dispatched = 0usize;

        for seg in segments {
            let text = sanitize(&seg.text);
            if text.is_empty() {
                warn!(index = seg.index, "Empty narration, skipping synthesis");
                slots[seg.index] = Some(SynthesisOutcome::failure(seg.index, EMPTY_NARRATION));
                continue;
            }

            let destination = self
                .work_dir
                .join(artifact_file_name(seg.index, self.client.file_extension()));
            let index = seg.index;
            let client = Arc::clone(&self.client);
            let sem = Arc::clone(&self.semaphore);
            let cancel = cancel.clone();
            let timeout = self.task_timeout;
            let tx = tx.clone();

            debug!(
                index,
                section = %preview(&seg.section, 60),
                title = %preview(&seg.title, 60),
                "Dispatching synthesis"
            );

            tokio::spawn(async move {
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => SynthesisOutcome::failure(index, CANCELLED),
                    outcome = async {
                        let _permit = match sem.acquire_owned().await {
                            Ok(p) => p,
                            Err(_) => return SynthesisOutcome::failure(index, "synthesis pool closed"),
                        };
                        synthesize_segment(&*client, index, &text, voice, destination.clone(), timeout).await
                    } => outcome,
                };
                if !outcome.is_success() {
                    // Drop anything a failed or cancelled call left behind.
                    let _ = tokio::fs::remove_file(&destination).await;
                }
                let _ = tx.send(outcome);
            });
            dispatched += 1;
        }
        drop(tx);

        info!(
            total = segments.len(),
            dispatched,
            provider = self.client.name(),
            voice = voice.backend_name(),
            "Synthesis dispatched"
        );

        // Barrier: the channel closes once every task has dropped its sender.
        while let Some(outcome) = rx.recv().await {
            let index = outcome.index;
            debug_assert!(slots[index].is_none(), "slot {index} written twice");
            slots[index] = Some(outcome);
        }

        let outcomes: Vec<SynthesisOutcome> = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    warn!(index, "Synthesis task vanished");
                    SynthesisOutcome::failure(index, UNREPORTED)
                })
            })
            .collect();

        let results = OrderedResults::new(outcomes)?;
        let failed: Vec<usize> = results.failures().map(|o| o.index).collect();
        info!(
            succeeded = results.success_count(),
            total = results.len(),
            ?failed,
            "Synthesis complete"
        );
        Ok(results)
    }
}

/// Run one synthesis call and turn its result into an outcome.
async fn synthesize_segment(
    client: &dyn SynthesisClient,
    index: usize,
    text: &str,
    voice: Voice,
    destination: PathBuf,
    timeout: Option<Duration>,
) -> SynthesisOutcome {
    debug!(index, chars = text.chars().count(), "Synthesis started");

    let call = client.synthesize(text, voice, &destination);
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(r) => r,
            Err(_) => Err(anyhow!("synthesis timed out after {}s", limit.as_secs_f64())),
        },
        None => call.await,
    };

    let result = match result {
        Ok(()) => verify_artifact(&destination).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(bytes) => {
            debug!(index, bytes, path = %destination.display(), "Synthesis completed");
            SynthesisOutcome::success(index, destination)
        }
        Err(e) => {
            warn!(index, error = %format!("{e:#}"), "Synthesis failed");
            SynthesisOutcome::failure(index, format!("{e:#}"))
        }
    }
}

/// Size of the produced file; missing or empty files are failures.
async fn verify_artifact(path: &Path) -> anyhow::Result<u64> {
    let len = tokio::fs::metadata(path)
        .await
        .map_err(|_| anyhow!("generated file is missing"))?
        .len();
    if len == 0 {
        anyhow::bail!("generated file is empty");
    }
    Ok(len)
}
