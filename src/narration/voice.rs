//! Fixed narration voice selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::NarrationError;

/// The narration voices a run may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Voice {
    MaleProfessional,
    FemaleProfessional,
    #[default]
    MaleNarrator,
    FemaleNarrator,
}

impl Voice {
    pub const ALL: [Voice; 4] = [
        Voice::MaleProfessional,
        Voice::FemaleProfessional,
        Voice::MaleNarrator,
        Voice::FemaleNarrator,
    ];

    /// Configuration key, e.g. `male_narrator`.
    pub fn key(&self) -> &'static str {
        match self {
            Voice::MaleProfessional => "male_professional",
            Voice::FemaleProfessional => "female_professional",
            Voice::MaleNarrator => "male_narrator",
            Voice::FemaleNarrator => "female_narrator",
        }
    }

    /// Neural voice name understood by edge-tts style backends.
    pub fn backend_name(&self) -> &'static str {
        match self {
            Voice::MaleProfessional => "en-US-GuyNeural",
            Voice::FemaleProfessional => "en-US-JennyNeural",
            Voice::MaleNarrator => "en-US-EricNeural",
            Voice::FemaleNarrator => "en-US-AriaNeural",
        }
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Voice {
    type Err = NarrationError;

    /// Accepts either the key (`female_narrator`) or the backend name
    /// (`en-US-AriaNeural`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Voice::ALL
            .into_iter()
            .find(|v| v.key() == wanted || v.backend_name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| NarrationError::UnknownVoice(wanted.to_string()))
    }
}

impl TryFrom<String> for Voice {
    type Error = NarrationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
