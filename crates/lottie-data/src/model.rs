use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type Vec2 = [f32; 2];
/// RGBA, each channel in `0.0..=1.0`.
pub type Color = [f32; 4];

/// A timed group of layers, already parsed by whatever loader produced it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CompositionData {
    #[serde(default)]
    pub name: Option<String>,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub start_frame: f32,
    pub end_frame: f32,
    pub frame_rate: f32,
    /// Front-to-back, as authored.
    pub layers: Vec<LayerData>,
    /// Layer lists of nested compositions, keyed by the `ref_id` used in
    /// [`LayerContentData::PreComp`].
    #[serde(default)]
    pub precomps: HashMap<String, Vec<LayerData>>,
}

impl CompositionData {
    pub fn duration_frames(&self) -> f32 {
        (self.end_frame - self.start_frame).max(0.0)
    }

    /// Duration in milliseconds. Zero when the frame rate is not positive.
    pub fn duration_ms(&self) -> f32 {
        if self.frame_rate > 0.0 {
            self.duration_frames() / self.frame_rate * 1000.0
        } else {
            0.0
        }
    }

    /// Maps an absolute frame number onto the `0..=1` progress of this composition.
    pub fn progress_for_frame(&self, frame: f32) -> f32 {
        let frames = self.duration_frames();
        if frames <= 0.0 {
            return 0.0;
        }
        (frame - self.start_frame) / frames
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatteType {
    #[default]
    None,
    /// The matte's alpha reveals the layer.
    Add,
    /// The matte's alpha hides the layer.
    Invert,
}

impl MatteType {
    pub fn requests_matte(self) -> bool {
        matches!(self, MatteType::Add | MatteType::Invert)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LayerData {
    pub id: i64,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub matte_type: MatteType,
    #[serde(default)]
    pub start_progress: f32,
    #[serde(default = "default_one")]
    pub time_stretch: f32,
    #[serde(default)]
    pub precomp_width: f32,
    #[serde(default)]
    pub precomp_height: f32,
    /// Values are in seconds of the nested composition's timeline.
    #[serde(default)]
    pub time_remap: Option<TrackData<f32>>,
    #[serde(default)]
    pub transform: TransformData,
    #[serde(default)]
    pub masks: Vec<MaskData>,
    pub content: LayerContentData,
}

fn default_one() -> f32 {
    1.0
}

impl LayerData {
    /// A layer with identity transform and no masks, mostly useful for building fixtures.
    pub fn new(id: i64, name: impl Into<String>, content: LayerContentData) -> Self {
        Self {
            id,
            parent_id: None,
            name: name.into(),
            matte_type: MatteType::None,
            start_progress: 0.0,
            time_stretch: 1.0,
            precomp_width: 0.0,
            precomp_height: 0.0,
            time_remap: None,
            transform: TransformData::default(),
            masks: Vec::new(),
            content,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerContentData {
    Shape {
        #[serde(default)]
        shapes: Vec<ShapeData>,
    },
    Solid {
        width: f32,
        height: f32,
        color: Color,
    },
    Image {
        ref_id: String,
        width: f32,
        height: f32,
    },
    Null,
    Text {
        text: String,
        #[serde(default)]
        font_family: String,
        size: f32,
        #[serde(default = "default_text_color")]
        color: Color,
    },
    PreComp {
        ref_id: String,
    },
    /// Cameras, audio and anything else the renderer does not draw.
    #[serde(other)]
    Unsupported,
}

fn default_text_color() -> Color {
    [0.0, 0.0, 0.0, 1.0]
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ShapeData {
    #[serde(default)]
    pub name: String,
    pub path: TrackData<BezierPath>,
    #[serde(default)]
    pub fill: Option<FillData>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FillData {
    pub color: TrackData<Color>,
    #[serde(default = "default_opacity")]
    pub opacity: TrackData<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaskMode {
    #[default]
    Add,
    Subtract,
    Intersect,
    None,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MaskData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mode: MaskMode,
    #[serde(default)]
    pub inverted: bool,
    pub path: TrackData<BezierPath>,
    #[serde(default = "default_opacity")]
    pub opacity: TrackData<f32>,
}

/// Opacity is authored in percent.
fn default_opacity() -> TrackData<f32> {
    TrackData::constant(100.0)
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TransformData {
    pub anchor: TrackData<Vec2>,
    pub position: PositionData,
    /// Percent per axis.
    pub scale: TrackData<Vec2>,
    /// Degrees, clockwise.
    pub rotation: TrackData<f32>,
    /// Percent.
    pub opacity: TrackData<f32>,
}

impl Default for TransformData {
    fn default() -> Self {
        Self {
            anchor: TrackData::constant([0.0, 0.0]),
            position: PositionData::default(),
            scale: TrackData::constant([100.0, 100.0]),
            rotation: TrackData::constant(0.0),
            opacity: default_opacity(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PositionData {
    /// A single point track, optionally moving along spatial tangents.
    Path(TrackData<Vec2>),
    /// Independent x and y scalar tracks.
    Split { x: TrackData<f32>, y: TrackData<f32> },
}

impl Default for PositionData {
    fn default() -> Self {
        PositionData::Path(TrackData::constant([0.0, 0.0]))
    }
}

/// An ordered keyframe list. Serialized as a bare array.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(transparent)]
pub struct TrackData<T> {
    pub keyframes: Vec<KeyframeData<T>>,
}

impl<T> TrackData<T> {
    pub fn new(keyframes: Vec<KeyframeData<T>>) -> Self {
        Self { keyframes }
    }

    /// A one-element static track.
    pub fn constant(value: T) -> Self {
        Self {
            keyframes: vec![KeyframeData::constant(value)],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct KeyframeData<T> {
    pub start_value: T,
    /// `None` holds `start_value` until the next keyframe. Missing in JSON reads as `None`.
    pub end_value: Option<T>,
    #[serde(default)]
    pub start_progress: f32,
    #[serde(default = "default_one")]
    pub end_progress: f32,
    /// `None` means linear.
    #[serde(default)]
    pub easing: Option<EasingData>,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    /// Spatial tangent leaving `start_value`, relative to it.
    #[serde(default)]
    pub tangent_out: Option<Vec2>,
    /// Spatial tangent arriving at `end_value`, relative to it.
    #[serde(default)]
    pub tangent_in: Option<Vec2>,
}

impl<T> KeyframeData<T> {
    pub fn constant(value: T) -> Self {
        Self {
            start_value: value,
            end_value: None,
            start_progress: 0.0,
            end_progress: 1.0,
            easing: None,
            is_static: true,
            tangent_out: None,
            tangent_in: None,
        }
    }

    pub fn tween(start_value: T, end_value: T, start_progress: f32, end_progress: f32) -> Self {
        Self {
            start_value,
            end_value: Some(end_value),
            start_progress,
            end_progress,
            easing: None,
            is_static: false,
            tangent_out: None,
            tangent_in: None,
        }
    }
}

/// Cubic-bezier timing curve between `(0,0)` and `(1,1)`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct EasingData {
    pub out_tangent: Vec2,
    pub in_tangent: Vec2,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct BezierPath {
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub vertices: Vec<Vec2>,
    /// Relative to the matching vertex.
    #[serde(default)]
    pub in_tangents: Vec<Vec2>,
    /// Relative to the matching vertex.
    #[serde(default)]
    pub out_tangents: Vec<Vec2>,
}

impl BezierPath {
    /// A closed axis-aligned rectangle with straight edges.
    pub fn rect(x: f32, y: f32, width: f32, height: f32) -> Self {
        let vertices = vec![
            [x, y],
            [x + width, y],
            [x + width, y + height],
            [x, y + height],
        ];
        Self {
            closed: true,
            in_tangents: vec![[0.0, 0.0]; vertices.len()],
            out_tangents: vec![[0.0, 0.0]; vertices.len()],
            vertices,
        }
    }
}
