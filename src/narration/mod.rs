//! Narration audio pipeline.
//!
//! Turns an ordered list of narration segments into one audio track:
//! Segments → sanitize → parallel synthesis → ordered outcomes → merge

pub mod coordinator;
pub mod merger;
pub mod pipeline;
pub mod provider;
pub mod sanitize;
pub mod segments;
pub mod voice;

#[cfg(test)]
mod e2e_test;

use std::ops::Deref;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use coordinator::SynthesisCoordinator;
pub use merger::{Concatenator, CopyConcatenator, FfmpegConcatenator, MergeReport, Merger};
pub use pipeline::{NarrationRun, Narrator};
pub use sanitize::sanitize;
pub use segments::load_segments;
pub use voice::Voice;

/// Contract violations.  These abort a run before any work is dispatched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NarrationError {
    #[error("segment index {index} is outside 0..{len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("segment index {0} appears more than once")]
    DuplicateIndex(usize),

    #[error("outcome at position {position} carries index {index}")]
    MisorderedOutcome { position: usize, index: usize },

    #[error("unknown voice '{0}'")]
    UnknownVoice(String),
}

// ── Segment ──────────────────────────────────────────────────────

/// One ordered unit of narration text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Zero-based position in the document.
    pub index: usize,
    pub section: String,
    pub title: String,
    /// Narration content to be spoken.
    pub text: String,
}

impl Segment {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            section: String::new(),
            title: String::new(),
            text: text.into(),
        }
    }

    pub fn with_labels(mut self, section: impl Into<String>, title: impl Into<String>) -> Self {
        self.section = section.into();
        self.title = title.into();
        self
    }
}

/// Check that segment indices form the dense range `0..len`.
///
/// Any permutation is accepted; gaps and duplicates are not.
pub fn validate_indices(segments: &[Segment]) -> Result<(), NarrationError> {
    let len = segments.len();
    let mut seen = vec![false; len];
    for seg in segments {
        let slot = seen
            .get_mut(seg.index)
            .ok_or(NarrationError::IndexOutOfRange {
                index: seg.index,
                len,
            })?;
        if *slot {
            return Err(NarrationError::DuplicateIndex(seg.index));
        }
        *slot = true;
    }
    Ok(())
}

// ── Outcomes ─────────────────────────────────────────────────────

/// Result of attempting to synthesize one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success { artifact: PathBuf },
    Failure { reason: String },
}

/// Per-segment outcome, tagged with the originating segment index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesisOutcome {
    pub index: usize,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl SynthesisOutcome {
    pub fn success(index: usize, artifact: PathBuf) -> Self {
        Self {
            index,
            status: OutcomeStatus::Success { artifact },
        }
    }

    pub fn failure(index: usize, reason: impl Into<String>) -> Self {
        Self {
            index,
            status: OutcomeStatus::Failure {
                reason: reason.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Success { .. })
    }

    /// Location of the synthesized audio, present iff successful.
    pub fn artifact(&self) -> Option<&Path> {
        match &self.status {
            OutcomeStatus::Success { artifact } => Some(artifact),
            OutcomeStatus::Failure { .. } => None,
        }
    }

    /// Failure reason, present iff unsuccessful.
    pub fn error_reason(&self) -> Option<&str> {
        match &self.status {
            OutcomeStatus::Success { .. } => None,
            OutcomeStatus::Failure { reason } => Some(reason),
        }
    }
}

/// Outcomes for every input segment, sorted by segment index.
///
/// Invariant: `results[i].index == i` for every position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OrderedResults(Vec<SynthesisOutcome>);

impl OrderedResults {
    /// Wrap outcomes that are already in index order.
    pub fn new(outcomes: Vec<SynthesisOutcome>) -> Result<Self, NarrationError> {
        if let Some((position, outcome)) = outcomes
            .iter()
            .enumerate()
            .find(|(position, outcome)| outcome.index != *position)
        {
            return Err(NarrationError::MisorderedOutcome {
                position,
                index: outcome.index,
            });
        }
        Ok(Self(outcomes))
    }

    pub fn successes(&self) -> impl Iterator<Item = &SynthesisOutcome> {
        self.0.iter().filter(|o| o.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &SynthesisOutcome> {
        self.0.iter().filter(|o| !o.is_success())
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    pub fn into_inner(self) -> Vec<SynthesisOutcome> {
        self.0
    }
}

impl Deref for OrderedResults {
    type Target = [SynthesisOutcome];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
