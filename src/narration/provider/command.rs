//! TTS via an external command-line synthesizer.
//!
//! Defaults to `edge-tts`:
//!
//! ```text
//! edge-tts --voice en-US-EricNeural --rate=+0% --pitch=+0Hz \
//!          --text="..." --write-media /path/audio_0003_ab12cd34.mp3
//! ```

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::TtsCommandConfig;
use crate::narration::provider::SynthesisClient;
use crate::narration::voice::Voice;
use crate::utils::safe_truncate;

/// Maximum bytes of child stderr carried into an error message.
const MAX_STDERR_BYTES: usize = 500;

pub struct CommandSynthesisClient {
    config: TtsCommandConfig,
}

impl CommandSynthesisClient {
    pub fn new(config: TtsCommandConfig) -> Self {
        Self { config }
    }

    fn args(&self, text: &str, voice: Voice, destination: &Path) -> Vec<String> {
        vec![
            "--voice".to_string(),
            voice.backend_name().to_string(),
            // `=` form: values may start with '+' or '-'.
            format!("--rate={}", self.config.rate),
            format!("--pitch={}", self.config.pitch),
            format!("--text={}", text),
            "--write-media".to_string(),
            destination.to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl SynthesisClient for CommandSynthesisClient {
    async fn synthesize(&self, text: &str, voice: Voice, destination: &Path) -> Result<()> {
        let output = Command::new(&self.config.program)
            .args(self.args(text, voice, destination))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.config.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} exited with {}: {}",
                self.config.program,
                output.status,
                safe_truncate(stderr.trim(), MAX_STDERR_BYTES)
            );
        }

        let size = tokio::fs::metadata(destination)
            .await
            .with_context(|| format!("{} produced no file", self.config.program))?
            .len();
        if size == 0 {
            bail!("{} produced an empty file", self.config.program);
        }

        debug!(
            voice = voice.backend_name(),
            bytes = size,
            "command synthesis complete"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "command"
    }

    fn file_extension(&self) -> &str {
        &self.config.extension
    }
}
