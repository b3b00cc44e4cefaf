use crate::animatable::AnimatableValue;
use crate::canvas::{Canvas, ClipMode, TextRun};
use crate::composition::{BuildContext, CompositionLayer};
use crate::geometry::{to_bez_path, union_bounds};
use crate::keyframe::KeyframeTrack;
use crate::transform::{mark_on_change, LayerTransform};
use glam::Vec4;
use kurbo::{Affine, BezPath, Rect, Shape as _};
use lottie_data::model::{
    BezierPath, Color, LayerContentData, LayerData, MaskData, MaskMode, MatteType, ShapeData,
    TrackData,
};
use std::cell::Cell;
use tracing::warn;

/// Index of a node inside its composition's arena.
pub type LayerId = usize;

fn color_track(data: &TrackData<Color>) -> AnimatableValue<Vec4> {
    AnimatableValue::new(KeyframeTrack::from_data(data, |c| Vec4::from(*c)))
}

fn scalar_track(data: &TrackData<f32>) -> AnimatableValue<f32> {
    AnimatableValue::new(KeyframeTrack::from_data(data, |v| *v))
}

fn path_track(data: &TrackData<BezierPath>) -> AnimatableValue<BezierPath> {
    AnimatableValue::new(KeyframeTrack::from_data(data, BezierPath::clone))
}

#[derive(Debug)]
pub struct ShapeFill {
    pub color: AnimatableValue<Vec4>,
    /// Percent.
    pub opacity: AnimatableValue<f32>,
}

#[derive(Debug)]
pub struct ShapeItem {
    pub name: String,
    pub path: AnimatableValue<BezierPath>,
    pub fill: Option<ShapeFill>,
}

impl ShapeItem {
    fn from_data(data: &ShapeData) -> Self {
        Self {
            name: data.name.clone(),
            path: path_track(&data.path),
            fill: data.fill.as_ref().map(|fill| ShapeFill {
                color: color_track(&fill.color),
                opacity: scalar_track(&fill.opacity),
            }),
        }
    }

    fn set_progress(&mut self, progress: f32) {
        self.path.set_progress(progress);
        if let Some(fill) = &mut self.fill {
            fill.color.set_progress(progress);
            fill.opacity.set_progress(progress);
        }
    }
}

#[derive(Debug)]
pub struct Mask {
    pub name: String,
    pub mode: MaskMode,
    pub inverted: bool,
    pub path: AnimatableValue<BezierPath>,
    /// Percent. A mask at zero opacity is skipped.
    pub opacity: AnimatableValue<f32>,
}

impl Mask {
    fn from_data(data: &MaskData) -> Self {
        Self {
            name: data.name.clone(),
            mode: data.mode,
            inverted: data.inverted,
            path: path_track(&data.path),
            opacity: scalar_track(&data.opacity),
        }
    }

    fn clip_mode(&self) -> Option<ClipMode> {
        let keep_inside = match self.mode {
            MaskMode::None => return None,
            MaskMode::Add | MaskMode::Intersect => true,
            MaskMode::Subtract => false,
        };
        if keep_inside != self.inverted {
            Some(ClipMode::Intersect)
        } else {
            Some(ClipMode::Difference)
        }
    }
}

/// What a layer paints. Fixed at construction from the descriptor's content kind.
#[derive(Debug)]
pub enum LayerContent {
    Shape(Vec<ShapeItem>),
    Solid {
        width: f32,
        height: f32,
        color: AnimatableValue<Vec4>,
    },
    Image {
        asset_id: String,
        width: f32,
        height: f32,
    },
    /// Paints nothing; exists to parent other layers.
    Null,
    Text {
        text: String,
        font_family: String,
        size: f32,
        color: Vec4,
    },
    PreComp(Box<CompositionLayer>),
}

impl LayerContent {
    pub fn kind(&self) -> &'static str {
        match self {
            LayerContent::Shape(_) => "shape",
            LayerContent::Solid { .. } => "solid",
            LayerContent::Image { .. } => "image",
            LayerContent::Null => "null",
            LayerContent::Text { .. } => "text",
            LayerContent::PreComp(_) => "pre_comp",
        }
    }
}

/// One runtime layer.
///
/// `parent` and `matte` are arena indices into the owning
/// [`CompositionLayer`]. The parent link is a plain lookup; the matte slot is
/// the only place the matte node is reachable from.
#[derive(Debug)]
pub struct LayerNode {
    id: i64,
    name: String,
    parent_id: Option<i64>,
    matte_type: MatteType,
    time_stretch: f32,
    pub(crate) parent: Option<LayerId>,
    pub(crate) matte: Option<LayerId>,
    pub(crate) transform: LayerTransform,
    pub(crate) masks: Vec<Mask>,
    pub(crate) content: LayerContent,
    pub(crate) bounds: Cell<Rect>,
    progress: f32,
}

impl LayerNode {
    /// Returns `None` for content kinds that are not drawn.
    pub(crate) fn build(data: &LayerData, ctx: &mut BuildContext<'_>) -> Option<Self> {
        let content = match &data.content {
            LayerContentData::Shape { shapes } => {
                LayerContent::Shape(shapes.iter().map(ShapeItem::from_data).collect())
            }
            LayerContentData::Solid {
                width,
                height,
                color,
            } => LayerContent::Solid {
                width: *width,
                height: *height,
                color: AnimatableValue::constant(Vec4::from(*color)),
            },
            LayerContentData::Image {
                ref_id,
                width,
                height,
            } => LayerContent::Image {
                asset_id: ref_id.clone(),
                width: *width,
                height: *height,
            },
            LayerContentData::Null => LayerContent::Null,
            LayerContentData::Text {
                text,
                font_family,
                size,
                color,
            } => LayerContent::Text {
                text: text.clone(),
                font_family: font_family.clone(),
                size: *size,
                color: Vec4::from(*color),
            },
            LayerContentData::PreComp { ref_id } => {
                let nested = CompositionLayer::build_precomp(data, ref_id, ctx)?;
                LayerContent::PreComp(Box::new(nested))
            }
            LayerContentData::Unsupported => {
                warn!(id = data.id, name = %data.name, "skipping unsupported layer");
                return None;
            }
        };

        let mut transform = LayerTransform::from_data(&data.transform);
        transform.on_change(&ctx.invalidated);

        let mut node = Self {
            id: data.id,
            name: data.name.clone(),
            parent_id: data.parent_id,
            matte_type: data.matte_type,
            time_stretch: data.time_stretch,
            parent: None,
            matte: None,
            transform,
            masks: data.masks.iter().map(Mask::from_data).collect(),
            content,
            bounds: Cell::new(Rect::ZERO),
            progress: 0.0,
        };
        node.watch_content(ctx);
        Some(node)
    }

    fn watch_content(&mut self, ctx: &BuildContext<'_>) {
        let flag = &ctx.invalidated;
        for mask in &mut self.masks {
            mark_on_change(&mut mask.path, flag);
            mark_on_change(&mut mask.opacity, flag);
        }
        match &mut self.content {
            LayerContent::Shape(items) => {
                for item in items {
                    mark_on_change(&mut item.path, flag);
                    if let Some(fill) = &mut item.fill {
                        mark_on_change(&mut fill.color, flag);
                        mark_on_change(&mut fill.opacity, flag);
                    }
                }
            }
            LayerContent::Solid { color, .. } => mark_on_change(color, flag),
            _ => {}
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_id(&self) -> Option<i64> {
        self.parent_id
    }

    pub fn matte_type(&self) -> MatteType {
        self.matte_type
    }

    pub fn parent(&self) -> Option<LayerId> {
        self.parent
    }

    pub fn matte(&self) -> Option<LayerId> {
        self.matte
    }

    pub fn transform(&self) -> &LayerTransform {
        &self.transform
    }

    pub fn masks(&self) -> &[Mask] {
        &self.masks
    }

    pub fn content(&self) -> &LayerContent {
        &self.content
    }

    /// Progress as last received, before this layer's time stretch.
    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Bounds computed by the last bounds pass.
    pub fn cached_bounds(&self) -> Rect {
        self.bounds.get()
    }

    pub fn has_masks_on_this_layer(&self) -> bool {
        !self.masks.is_empty()
    }

    pub fn has_matte_on_this_layer(&self) -> bool {
        self.matte.is_some()
    }

    pub(crate) fn set_progress(&mut self, progress: f32) {
        self.progress = progress;
        let local = if self.time_stretch != 0.0 {
            progress / self.time_stretch
        } else {
            progress
        };

        self.transform.set_progress(local);
        for mask in &mut self.masks {
            mask.path.set_progress(local);
            mask.opacity.set_progress(local);
        }
        match &mut self.content {
            LayerContent::Shape(items) => {
                for item in items {
                    item.set_progress(local);
                }
            }
            LayerContent::Solid { color, .. } => color.set_progress(local),
            // Nested compositions localize time themselves.
            LayerContent::PreComp(nested) => nested.set_progress(progress),
            LayerContent::Image { .. } | LayerContent::Null | LayerContent::Text { .. } => {}
        }
    }

    /// Clips to the union of the plain `Add` masks, then applies every other
    /// mask on its own. Successive clips intersect.
    pub(crate) fn apply_masks(&self, canvas: &mut dyn Canvas, matrix: Affine) {
        let visible = || self.masks.iter().filter(|mask| *mask.opacity.value() > 0.0);
        let is_union = |mask: &Mask| mask.mode == MaskMode::Add && !mask.inverted;

        let mut union: Option<BezPath> = None;
        for mask in visible().filter(|&mask| is_union(mask)) {
            let path = to_bez_path(mask.path.value());
            match &mut union {
                Some(acc) => acc.extend(path),
                None => union = Some(path),
            }
        }
        if let Some(union) = union {
            canvas.clip_path(&union, matrix, ClipMode::Intersect);
        }

        for mask in visible().filter(|&mask| !is_union(mask)) {
            if let Some(mode) = mask.clip_mode() {
                canvas.clip_path(&to_bez_path(mask.path.value()), matrix, mode);
            }
        }
    }

    /// Paints this layer's own content. Transform, masks and matte are the caller's job.
    pub(crate) fn draw_content(&self, canvas: &mut dyn Canvas, matrix: Affine, alpha: f32) {
        match &self.content {
            LayerContent::Shape(items) => {
                for item in items {
                    let Some(fill) = &item.fill else { continue };
                    let fill_alpha = alpha * (*fill.opacity.value() / 100.0).clamp(0.0, 1.0);
                    canvas.fill_path(&to_bez_path(item.path.value()), matrix, *fill.color.value(), fill_alpha);
                }
            }
            LayerContent::Solid {
                width,
                height,
                color,
            } => {
                let rect = Rect::new(0.0, 0.0, *width as f64, *height as f64);
                canvas.fill_rect(rect, matrix, *color.value(), alpha);
            }
            LayerContent::Image {
                asset_id,
                width,
                height,
            } => canvas.draw_image(asset_id, *width, *height, matrix, alpha),
            LayerContent::Null => {}
            LayerContent::Text {
                text,
                font_family,
                size,
                color,
            } => {
                let run = TextRun {
                    text: text.clone(),
                    font_family: font_family.clone(),
                    size: *size,
                    color: *color,
                };
                canvas.draw_text(&run, matrix, alpha);
            }
            LayerContent::PreComp(nested) => nested.draw(canvas, matrix, alpha),
        }
    }

    /// Device-space bounds of the content under `matrix`. Text measures as empty.
    pub(crate) fn content_bounds(&self, matrix: Affine) -> Rect {
        match &self.content {
            LayerContent::Shape(items) => items
                .iter()
                .map(|item| (matrix * to_bez_path(item.path.value())).bounding_box())
                .fold(Rect::ZERO, union_bounds),
            LayerContent::Solid { width, height, .. }
            | LayerContent::Image { width, height, .. } => {
                matrix.transform_rect_bbox(Rect::new(0.0, 0.0, *width as f64, *height as f64))
            }
            LayerContent::Null | LayerContent::Text { .. } => Rect::ZERO,
            LayerContent::PreComp(nested) => nested.bounds(matrix),
        }
    }

    pub(crate) fn dispose(&mut self) {
        self.transform.clear_listeners();
        for mask in &mut self.masks {
            mask.path.clear_listeners();
            mask.opacity.clear_listeners();
        }
        match &mut self.content {
            LayerContent::Shape(items) => {
                for item in items {
                    item.path.clear_listeners();
                    if let Some(fill) = &mut item.fill {
                        fill.color.clear_listeners();
                        fill.opacity.clear_listeners();
                    }
                }
            }
            LayerContent::Solid { color, .. } => color.clear_listeners(),
            LayerContent::PreComp(nested) => nested.dispose(),
            _ => {}
        }
    }
}
