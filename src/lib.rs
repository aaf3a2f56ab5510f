//! narrate - turn ordered narration segments into one narrated audio track
//!
//! This crate provides:
//! - Text sanitization for speech backends
//! - Parallel, bounded synthesis with an index-ordered result set
//! - Ordered stream-copy merge (ffmpeg concat demuxer or direct byte copy)
//! - TOML configuration and a `narrate` CLI

pub mod config;
pub mod narration;
pub mod utils;

pub use config::Config;
pub use narration::{MergeReport, NarrationRun, Narrator, Segment, Voice};
