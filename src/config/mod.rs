//! Configuration loading.
//!
//! `config.toml` is split into three tables:
//!
//! ```toml
//! [narration]
//! voice = "male_narrator"
//! work_dir = "~/narrate/audio"
//! max_concurrent = 3
//! task_timeout = "90s"
//!
//! [tts]
//! provider = "command"
//!
//! [merge]
//! tool = "ffmpeg"
//! ```
//!
//! Every field has a default, so an empty or missing file is valid.

pub mod schema;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::narration::Voice;

/// Default maximum number of concurrent synthesis requests.
pub const DEFAULT_MAX_CONCURRENT: usize = 3;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub narration: NarrationConfig,
    pub tts: TtsConfig,
    pub merge: MergeConfig,
}

impl Config {
    /// Load from an explicit path, or from the per-user config file when
    /// `path` is `None`.  A missing default file yields defaults; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from(p),
            None => match default_config_path() {
                Some(p) if p.exists() => Self::load_from(&p),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("failed to parse config TOML")
    }
}

/// `<config dir>/narrate/config.toml` for the current user.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "narrate").map(|d| d.config_dir().join("config.toml"))
}

// ── [narration] ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    pub voice: Voice,
    /// Directory for per-segment audio and the merged track.
    pub work_dir: String,
    pub max_concurrent: usize,
    /// Per-segment synthesis timeout; unset means wait indefinitely.
    #[serde(with = "schema::optional_duration")]
    pub task_timeout: Option<Duration>,
    /// Keep per-segment files after a successful merge.
    pub keep_segments: bool,
    /// File name for the merged track; generated when unset.
    pub output_name: Option<String>,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            voice: Voice::default(),
            work_dir: "outputs/audio".to_string(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            task_timeout: None,
            keep_segments: true,
            output_name: None,
        }
    }
}

impl NarrationConfig {
    /// `work_dir` with `~` and environment variables expanded.
    pub fn work_dir_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::full(&self.work_dir).map_or_else(
            |_| self.work_dir.clone(),
            |expanded| expanded.into_owned(),
        ))
    }
}

// ── [tts] ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// "command", "aivis-speech" or "mock".
    pub provider: String,
    pub command: TtsCommandConfig,
    pub aivis_speech: TtsAivisSpeechConfig,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            provider: "command".to_string(),
            command: TtsCommandConfig::default(),
            aivis_speech: TtsAivisSpeechConfig::default(),
        }
    }
}

/// External TTS command (edge-tts compatible flags).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsCommandConfig {
    pub program: String,
    pub rate: String,
    pub pitch: String,
    pub extension: String,
}

impl Default for TtsCommandConfig {
    fn default() -> Self {
        Self {
            program: "edge-tts".to_string(),
            rate: "+0%".to_string(),
            pitch: "+0Hz".to_string(),
            extension: "mp3".to_string(),
        }
    }
}

/// AivisSpeech / VOICEVOX-compatible REST backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsAivisSpeechConfig {
    pub endpoint: String,
    /// Style used when a voice has no entry in `style_ids`.
    pub style_id: i64,
    /// Voice key (`female_narrator`, ...) → style id.
    pub style_ids: HashMap<String, i64>,
    pub speed_scale: f64,
    pub pitch_scale: f64,
    pub intonation_scale: f64,
    pub volume_scale: f64,
}

impl Default for TtsAivisSpeechConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:10101".to_string(),
            style_id: 888753760,
            style_ids: HashMap::new(),
            speed_scale: 1.0,
            pitch_scale: 0.0,
            intonation_scale: 1.0,
            volume_scale: 1.0,
        }
    }
}

// ── [merge] ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// "ffmpeg" or "copy".
    pub tool: String,
    pub ffmpeg_path: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            tool: "ffmpeg".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}
