use crate::geometry::is_empty_rect;
use glam::Vec4;
use kurbo::{Affine, BezPath, Rect, Shape as _};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipMode {
    Intersect,
    /// Keeps everything outside the path.
    Difference,
}

/// How a layer opened with [`Canvas::save_layer`] composites onto what is below it on restore.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerBlend {
    Normal,
    /// Keeps the destination where the layer has alpha.
    DstIn,
    /// Keeps the destination where the layer has no alpha.
    DstOut,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub font_family: String,
    pub size: f32,
    pub color: Vec4,
}

/// The drawing capability the layer tree paints through.
///
/// Geometry arrives in layer space together with the affine that maps it to
/// device space; clip rectangles arrive already in device space. `restore`
/// closes the most recent `save` or `save_layer`.
pub trait Canvas {
    fn save(&mut self);
    fn restore(&mut self);
    /// Intersects the clip. Returns `false` when the resulting clip is empty.
    fn clip_rect(&mut self, rect: Rect) -> bool;
    fn clip_path(&mut self, path: &BezPath, transform: Affine, mode: ClipMode);
    /// Opens an offscreen layer. Empty `bounds` means unbounded.
    fn save_layer(&mut self, bounds: Rect, alpha: f32, blend: LayerBlend);
    fn fill_rect(&mut self, rect: Rect, transform: Affine, color: Vec4, alpha: f32);
    fn fill_path(&mut self, path: &BezPath, transform: Affine, color: Vec4, alpha: f32);
    fn draw_image(&mut self, asset_id: &str, width: f32, height: f32, transform: Affine, alpha: f32);
    fn draw_text(&mut self, run: &TextRun, transform: Affine, alpha: f32);
}

/// One recorded call. Geometry is stored as its device-space bounding box.
#[derive(Clone, Debug, PartialEq)]
pub enum CanvasOp {
    Save,
    Restore,
    ClipRect(Rect),
    ClipPath { bounds: Rect, mode: ClipMode },
    SaveLayer { bounds: Rect, alpha: f32, blend: LayerBlend },
    FillRect { bounds: Rect, color: Vec4, alpha: f32 },
    FillPath { bounds: Rect, color: Vec4, alpha: f32 },
    DrawImage { asset_id: String, bounds: Rect, alpha: f32 },
    DrawText { text: String, alpha: f32 },
}

impl CanvasOp {
    pub fn is_paint(&self) -> bool {
        matches!(
            self,
            CanvasOp::FillRect { .. }
                | CanvasOp::FillPath { .. }
                | CanvasOp::DrawImage { .. }
                | CanvasOp::DrawText { .. }
        )
    }
}

/// A [`Canvas`] that records calls and tracks the rectangular clip.
///
/// Path clips are recorded but do not narrow the tracked clip.
#[derive(Debug)]
pub struct RecordingCanvas {
    pub ops: Vec<CanvasOp>,
    clip: Rect,
    stack: Vec<Rect>,
}

impl RecordingCanvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            ops: Vec::new(),
            clip: Rect::new(0.0, 0.0, width, height),
            stack: Vec::new(),
        }
    }

    pub fn current_clip(&self) -> Rect {
        self.clip
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn paints(&self) -> impl Iterator<Item = &CanvasOp> {
        self.ops.iter().filter(|op| op.is_paint())
    }
}

impl Canvas for RecordingCanvas {
    fn save(&mut self) {
        self.stack.push(self.clip);
        self.ops.push(CanvasOp::Save);
    }

    fn restore(&mut self) {
        if let Some(clip) = self.stack.pop() {
            self.clip = clip;
        }
        self.ops.push(CanvasOp::Restore);
    }

    fn clip_rect(&mut self, rect: Rect) -> bool {
        self.clip = self.clip.intersect(rect);
        self.ops.push(CanvasOp::ClipRect(rect));
        !is_empty_rect(self.clip)
    }

    fn clip_path(&mut self, path: &BezPath, transform: Affine, mode: ClipMode) {
        let bounds = (transform * path.clone()).bounding_box();
        self.ops.push(CanvasOp::ClipPath { bounds, mode });
    }

    fn save_layer(&mut self, bounds: Rect, alpha: f32, blend: LayerBlend) {
        self.stack.push(self.clip);
        self.ops.push(CanvasOp::SaveLayer {
            bounds,
            alpha,
            blend,
        });
    }

    fn fill_rect(&mut self, rect: Rect, transform: Affine, color: Vec4, alpha: f32) {
        self.ops.push(CanvasOp::FillRect {
            bounds: transform.transform_rect_bbox(rect),
            color,
            alpha,
        });
    }

    fn fill_path(&mut self, path: &BezPath, transform: Affine, color: Vec4, alpha: f32) {
        self.ops.push(CanvasOp::FillPath {
            bounds: (transform * path.clone()).bounding_box(),
            color,
            alpha,
        });
    }

    fn draw_image(&mut self, asset_id: &str, width: f32, height: f32, transform: Affine, alpha: f32) {
        let rect = Rect::new(0.0, 0.0, width as f64, height as f64);
        self.ops.push(CanvasOp::DrawImage {
            asset_id: asset_id.to_string(),
            bounds: transform.transform_rect_bbox(rect),
            alpha,
        });
    }

    fn draw_text(&mut self, run: &TextRun, _transform: Affine, alpha: f32) {
        self.ops.push(CanvasOp::DrawText {
            text: run.text.clone(),
            alpha,
        });
    }
}
