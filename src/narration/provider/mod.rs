//! Synthesis backend trait and implementations.

pub mod aivis_speech;
pub mod command;
pub mod mock;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use super::voice::Voice;

/// Text-to-speech backend that writes one audio file per call.
#[async_trait]
pub trait SynthesisClient: Send + Sync {
    /// Synthesize `text` with `voice` into `destination`.
    ///
    /// Returning `Ok` with a missing or zero-byte file is still treated as a
    /// failure by the caller.
    async fn synthesize(&self, text: &str, voice: Voice, destination: &Path) -> Result<()>;

    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Extension of the files this backend produces (without the dot).
    fn file_extension(&self) -> &str {
        "mp3"
    }
}

/// File name for one segment's audio: `audio_0007_1a2b3c4d.mp3`.
///
/// The index prefix keeps artifacts sortable; the random suffix keeps
/// concurrent runs sharing a directory from colliding.
pub fn artifact_file_name(index: usize, extension: &str) -> String {
    format!("audio_{:04}_{}.{}", index, short_id(), extension)
}

/// Recover the segment index from an artifact file name.
pub fn artifact_index(path: &Path) -> Option<usize> {
    let name = path.file_name()?.to_str()?;
    let rest = name.strip_prefix("audio_")?;
    let (digits, _) = rest.split_once('_')?;
    digits.parse().ok()
}

/// Eight hex characters of a fresh v4 UUID.
pub(crate) fn short_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn artifact_name_encodes_index() {
        let name = artifact_file_name(7, "mp3");
        assert!(name.starts_with("audio_0007_"), "got {name}");
        assert!(name.ends_with(".mp3"));
        assert_eq!(artifact_index(Path::new(&name)), Some(7));
    }

    #[test]
    fn artifact_names_are_unique() {
        assert_ne!(artifact_file_name(0, "wav"), artifact_file_name(0, "wav"));
    }

    #[test]
    fn artifact_index_large_values() {
        let name = artifact_file_name(12345, "wav");
        assert_eq!(artifact_index(&PathBuf::from("/tmp").join(name)), Some(12345));
    }

    #[test]
    fn artifact_index_rejects_foreign_names() {
        assert_eq!(artifact_index(Path::new("audio_merge_abcd1234.mp3")), None);
        assert_eq!(artifact_index(Path::new("track.mp3")), None);
        assert_eq!(artifact_index(Path::new("/")), None);
    }

    #[test]
    fn short_id_is_eight_hex_chars() {
        let id = short_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
