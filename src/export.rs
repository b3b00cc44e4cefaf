//! # Frame Export
//!
//! Steps a [`LottiePlayer`] on a manual clock and writes one PNG per tick.
//!
//! The clock advances by exactly one frame interval between renders, so
//! output is deterministic regardless of how long rasterizing takes.

use anyhow::{Context, Result};
use lottie_core::{LottiePlayer, ManualScheduler, ManualTimeSource, PlayerConfig};
use lottie_data::model::CompositionData;
use lottie_skia::{LottieContext, SkiaRenderer};
use skia_safe::{Color, EncodedImageFormat, Rect, Surface};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Output size must be positive, got {0}x{1}")]
    InvalidSize(i32, i32),
    #[error("Failed to create surface")]
    SurfaceFailure,
    #[error("Failed to encode frame as PNG")]
    EncodeFailure,
}

#[derive(Clone, Debug)]
pub struct ExportOptions {
    /// Output width in pixels. Defaults to the composition width.
    pub width: Option<i32>,
    /// Output height in pixels. Defaults to the composition height.
    pub height: Option<i32>,
    pub config: PlayerConfig,
    /// Stops an infinitely repeating clock.
    pub max_frames: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            config: PlayerConfig::default(),
            max_frames: 600,
        }
    }
}

/// Rasterizes the player's current frame into PNG bytes.
pub fn render_png(
    player: &LottiePlayer,
    width: i32,
    height: i32,
    ctx: &dyn LottieContext,
) -> Result<Vec<u8>, ExportError> {
    if width <= 0 || height <= 0 {
        return Err(ExportError::InvalidSize(width, height));
    }
    let mut surface =
        Surface::new_raster_n32_premul((width, height)).ok_or(ExportError::SurfaceFailure)?;
    let canvas = surface.canvas();
    canvas.clear(Color::TRANSPARENT);
    SkiaRenderer::draw(
        canvas,
        player.composition(),
        Rect::from_wh(width as f32, height as f32),
        1.0,
        ctx,
    );

    let image = surface.image_snapshot();
    let data = image
        .encode(None, EncodedImageFormat::PNG, 100)
        .ok_or(ExportError::EncodeFailure)?;
    Ok(data.as_bytes().to_vec())
}

/// Seeks to `progress` without running the clock and writes `still.png`.
pub fn export_still(
    data: &CompositionData,
    options: &ExportOptions,
    progress: f32,
    out_dir: &Path,
) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let mut player = LottiePlayer::with_drivers(
        data,
        options.config.clone(),
        Box::new(ManualTimeSource::new()),
        Box::new(ManualScheduler::new()),
    )?;
    player.set_progress(progress);
    let width = options.width.unwrap_or(player.width().round() as i32);
    let height = options.height.unwrap_or(player.height().round() as i32);

    let path = out_dir.join("still.png");
    let png = render_png(&player, width, height, &())?;
    fs::write(&path, png).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

/// Plays `data` from the start and writes `frame_NNNN.png` files into
/// `out_dir` until the clock ends or `max_frames` is reached.
#[instrument(level = "info", skip(data, options), fields(out_dir = %out_dir.display()))]
pub fn export_frames(
    data: &CompositionData,
    options: &ExportOptions,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let time = ManualTimeSource::new();
    let mut player = LottiePlayer::with_drivers(
        data,
        options.config.clone(),
        Box::new(time.clone()),
        Box::new(ManualScheduler::new()),
    )?;
    let width = options.width.unwrap_or(player.width().round() as i32);
    let height = options.height.unwrap_or(player.height().round() as i32);
    let interval = player.clock().frame_interval();

    player.play()?;
    let mut written = Vec::new();
    while written.len() < options.max_frames {
        let path = out_dir.join(format!("frame_{:04}.png", written.len()));
        let png = render_png(&player, width, height, &())?;
        fs::write(&path, png).with_context(|| format!("writing {}", path.display()))?;
        debug!(frame = written.len(), progress = player.progress(), "frame written");
        written.push(path);

        if !player.is_playing() {
            break;
        }
        time.advance(interval);
        player.pump();
    }
    player.dispose();

    info!(frames = written.len(), width, height, "export complete");
    Ok(written)
}
