//! Narration segment loading.
//!
//! Accepts the JSON produced by the narration-script generator, either
//! wrapped (`{"result": [...]}`) or as a bare array.  Entries carry
//! `section`, `title` and `narration_script` (or `text`); their position in
//! the array becomes the segment index.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use super::Segment;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SegmentFile {
    Wrapped {
        #[serde(alias = "results")]
        result: Vec<RawSegment>,
    },
    Bare(Vec<RawSegment>),
}

#[derive(Debug, Deserialize)]
struct RawSegment {
    #[serde(default = "default_section")]
    section: String,
    #[serde(default = "default_title")]
    title: String,
    #[serde(default, alias = "narration_script")]
    text: String,
}

fn default_section() -> String {
    "Unknown".to_string()
}

fn default_title() -> String {
    "Untitled".to_string()
}

/// Parse segments from a JSON string.
pub fn parse_segments(raw: &str) -> Result<Vec<Segment>> {
    let file: SegmentFile =
        serde_json::from_str(raw).context("segment JSON is neither a list nor {\"result\": [...]}")?;
    let entries = match file {
        SegmentFile::Wrapped { result } => result,
        SegmentFile::Bare(entries) => entries,
    };
    Ok(entries
        .into_iter()
        .enumerate()
        .map(|(index, raw)| Segment {
            index,
            section: raw.section,
            title: raw.title,
            text: raw.text,
        })
        .collect())
}

/// Load segments from a JSON file.
pub fn load_segments(path: &Path) -> Result<Vec<Segment>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read segments from {}", path.display()))?;
    let segments =
        parse_segments(&raw).with_context(|| format!("invalid segment file {}", path.display()))?;
    info!(count = segments.len(), path = %path.display(), "Loaded narration segments");
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wrapped_generator_output() {
        let raw = r#"{
            "result": [
                {"section": "1.1", "title": "Scope", "narration_script": "Let's take a look."},
                {"section": "1.2", "title": "Materials", "narration_script": "Essentially..."}
            ]
        }"#;
        let segments = parse_segments(raw).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].index, 0);
        assert_eq!(segments[0].section, "1.1");
        assert_eq!(segments[0].title, "Scope");
        assert_eq!(segments[0].text, "Let's take a look.");
        assert_eq!(segments[1].index, 1);
    }

    #[test]
    fn parses_bare_array_with_text_field() {
        let raw = r#"[{"text": "A"}, {"text": "B"}]"#;
        let segments = parse_segments(raw).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].text, "B");
    }

    #[test]
    fn missing_labels_get_defaults() {
        let segments = parse_segments(r#"[{"narration_script": "hi"}]"#).unwrap();
        assert_eq!(segments[0].section, "Unknown");
        assert_eq!(segments[0].title, "Untitled");
    }

    #[test]
    fn missing_text_is_empty() {
        let segments = parse_segments(r#"[{"title": "Blank"}]"#).unwrap();
        assert_eq!(segments[0].text, "");
    }

    #[test]
    fn empty_result_list() {
        assert!(parse_segments(r#"{"result": []}"#).unwrap().is_empty());
        assert!(parse_segments("[]").unwrap().is_empty());
    }

    #[test]
    fn invalid_json_is_err() {
        assert!(parse_segments("not json").is_err());
        assert!(parse_segments(r#"{"other": 1}"#).is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("narration.json");
        std::fs::write(&path, r#"[{"narration_script": "one"}]"#).unwrap();
        let segments = load_segments(&path).unwrap();
        assert_eq!(segments, vec![Segment {
            index: 0,
            section: "Unknown".to_string(),
            title: "Untitled".to_string(),
            text: "one".to_string(),
        }]);
    }

    #[test]
    fn load_missing_file_is_err() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_segments(&dir.path().join("nope.json")).is_err());
    }
}
