//! # Lottie Player
//!
//! Loads a composition description, plays it on an [`AnimationClock`] and
//! rasterizes frames through Skia.
//!
//! The heavy lifting lives in the workspace crates:
//! - `lottie-data`: serde descriptors for compositions and layers.
//! - `lottie-core`: keyframes, the layer graph and the playback clock.
//! - `lottie-skia`: the Skia drawing backend.
//!
//! [`AnimationClock`]: lottie_core::AnimationClock

pub mod export;

pub use export::{export_frames, export_still, render_png, ExportError, ExportOptions};

use anyhow::{Context, Result};
use lottie_data::model::CompositionData;
use std::path::Path;

/// Reads and parses a composition JSON file.
pub fn load_composition(path: &Path) -> Result<CompositionData> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading composition {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing composition {}", path.display()))
}
