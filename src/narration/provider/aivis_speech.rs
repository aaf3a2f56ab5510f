//! AivisSpeech (VOICEVOX-compatible) synthesis backend.
//!
//! Communicates via REST API: `/audio_query` → `/synthesis`.
//!
//! Flow:
//! 1. POST `/audio_query?text=X&speaker=ID` → JSON query parameters
//! 2. Apply speed/pitch/intonation/volume scales from config
//! 3. POST `/synthesis?speaker=ID` with JSON body → WAV audio
//! 4. Reject WAVs without samples, write the bytes to the destination

use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tracing::debug;

use crate::config::TtsAivisSpeechConfig;
use crate::narration::provider::SynthesisClient;
use crate::narration::voice::Voice;

/// AivisSpeech client using the VOICEVOX-compatible REST API.
pub struct AivisSpeechClient {
    config: TtsAivisSpeechConfig,
    client: reqwest::Client,
}

impl AivisSpeechClient {
    pub fn new(config: TtsAivisSpeechConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Speaker style for a voice, falling back to the configured default.
    fn style_for(&self, voice: Voice) -> i64 {
        self.config
            .style_ids
            .get(voice.key())
            .copied()
            .unwrap_or(self.config.style_id)
    }

    /// Apply configured voice parameters to the audio_query JSON.
    fn apply_scales(&self, query: &mut serde_json::Value) {
        if let Some(obj) = query.as_object_mut() {
            obj.insert(
                "speedScale".to_string(),
                serde_json::json!(self.config.speed_scale),
            );
            obj.insert(
                "pitchScale".to_string(),
                serde_json::json!(self.config.pitch_scale),
            );
            obj.insert(
                "intonationScale".to_string(),
                serde_json::json!(self.config.intonation_scale),
            );
            obj.insert(
                "volumeScale".to_string(),
                serde_json::json!(self.config.volume_scale),
            );
        }
    }

    /// Number of samples in a WAV payload.
    fn wav_sample_count(wav_bytes: &[u8]) -> Result<u32> {
        let reader =
            hound::WavReader::new(Cursor::new(wav_bytes)).context("failed to parse WAV response")?;
        Ok(reader.len())
    }
}

#[async_trait]
impl SynthesisClient for AivisSpeechClient {
    async fn synthesize(&self, text: &str, voice: Voice, destination: &Path) -> Result<()> {
        let base = self.config.endpoint.trim_end_matches('/');
        let speaker = self.style_for(voice).to_string();

        // Step 1: POST /audio_query to get synthesis parameters
        let mut query: serde_json::Value = self
            .client
            .post(format!("{}/audio_query", base))
            .query(&[("text", text), ("speaker", speaker.as_str())])
            .send()
            .await
            .context("audio_query request failed")?
            .error_for_status()
            .context("audio_query returned error status")?
            .json()
            .await
            .context("failed to parse audio_query response as JSON")?;

        // Step 2: Apply voice parameter overrides from config
        self.apply_scales(&mut query);

        // Step 3: POST /synthesis with modified query → WAV audio
        let wav_bytes = self
            .client
            .post(format!("{}/synthesis", base))
            .query(&[("speaker", speaker.as_str())])
            .json(&query)
            .send()
            .await
            .context("synthesis request failed")?
            .error_for_status()
            .context("synthesis returned error status")?
            .bytes()
            .await
            .context("failed to read synthesis response body")?;

        // Step 4: Validate and persist
        let samples = Self::wav_sample_count(&wav_bytes)?;
        if samples == 0 {
            bail!("synthesis returned empty audio");
        }

        tokio::fs::write(destination, &wav_bytes)
            .await
            .with_context(|| format!("failed to write {}", destination.display()))?;

        debug!(
            speaker = %speaker,
            samples,
            bytes = wav_bytes.len(),
            "AivisSpeech synthesis complete"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "aivis-speech"
    }

    fn file_extension(&self) -> &str {
        "wav"
    }
}
