use crate::animatable::AnimatableValue;
use crate::keyframe::{KeyframeTrack, ValueCallback};
use glam::Vec2;
use kurbo::Affine;
use lottie_data::model::{PositionData, TrackData, TransformData};
use std::cell::Cell;
use std::rc::Rc;

fn vec2_track(data: &TrackData<[f32; 2]>) -> AnimatableValue<Vec2> {
    AnimatableValue::new(KeyframeTrack::from_data(data, |v| Vec2::from(*v)))
}

fn scalar_track(data: &TrackData<f32>) -> AnimatableValue<f32> {
    AnimatableValue::new(KeyframeTrack::from_data(data, |v| *v))
}

pub(crate) fn mark_on_change<T>(value: &mut AnimatableValue<T>, flag: &Rc<Cell<bool>>)
where
    T: crate::animatable::Interpolatable + PartialEq + Default,
{
    let flag = flag.clone();
    value.subscribe(move |_| flag.set(true));
}

/// A layer position: one point track, or separate x and y scalar tracks.
#[derive(Debug)]
pub enum PositionValue {
    Path(AnimatableValue<Vec2>),
    Split {
        x: AnimatableValue<f32>,
        y: AnimatableValue<f32>,
    },
}

impl PositionValue {
    pub fn from_data(data: &PositionData) -> Self {
        match data {
            PositionData::Path(track) => PositionValue::Path(vec2_track(track)),
            PositionData::Split { x, y } => PositionValue::Split {
                x: scalar_track(x),
                y: scalar_track(y),
            },
        }
    }

    pub fn value(&self) -> Vec2 {
        match self {
            PositionValue::Path(value) => *value.value(),
            PositionValue::Split { x, y } => Vec2::new(*x.value(), *y.value()),
        }
    }

    fn set_progress(&mut self, progress: f32) {
        match self {
            PositionValue::Path(value) => value.set_progress(progress),
            PositionValue::Split { x, y } => {
                x.set_progress(progress);
                y.set_progress(progress);
            }
        }
    }

    fn progress(&self) -> f32 {
        match self {
            PositionValue::Path(value) => value.progress(),
            PositionValue::Split { x, .. } => x.progress(),
        }
    }

    fn clear_listeners(&mut self) {
        match self {
            PositionValue::Path(value) => value.clear_listeners(),
            PositionValue::Split { x, y } => {
                x.clear_listeners();
                y.clear_listeners();
            }
        }
    }
}

/// Anchor, position, scale, rotation and opacity of one layer.
#[derive(Debug)]
pub struct LayerTransform {
    pub anchor: AnimatableValue<Vec2>,
    pub position: PositionValue,
    /// Percent.
    pub scale: AnimatableValue<Vec2>,
    /// Degrees.
    pub rotation: AnimatableValue<f32>,
    /// Percent.
    pub opacity: AnimatableValue<f32>,
}

impl LayerTransform {
    pub fn from_data(data: &TransformData) -> Self {
        Self {
            anchor: vec2_track(&data.anchor),
            position: PositionValue::from_data(&data.position),
            scale: vec2_track(&data.scale),
            rotation: scalar_track(&data.rotation),
            opacity: scalar_track(&data.opacity),
        }
    }

    pub fn identity() -> Self {
        Self::from_data(&TransformData::default())
    }

    pub fn set_progress(&mut self, progress: f32) {
        self.anchor.set_progress(progress);
        self.position.set_progress(progress);
        self.scale.set_progress(progress);
        self.rotation.set_progress(progress);
        self.opacity.set_progress(progress);
    }

    /// Layer space to parent space.
    pub fn matrix(&self) -> Affine {
        let position = self.position.value();
        let anchor = *self.anchor.value();
        let scale = *self.scale.value() / 100.0;
        let rotation = (*self.rotation.value() as f64).to_radians();

        Affine::translate((position.x as f64, position.y as f64))
            * Affine::rotate(rotation)
            * Affine::scale_non_uniform(scale.x as f64, scale.y as f64)
            * Affine::translate((-anchor.x as f64, -anchor.y as f64))
    }

    /// In `0.0..=1.0`.
    pub fn opacity(&self) -> f32 {
        (*self.opacity.value() / 100.0).clamp(0.0, 1.0)
    }

    /// Sets `flag` whenever any component changes value.
    pub fn on_change(&mut self, flag: &Rc<Cell<bool>>) {
        mark_on_change(&mut self.anchor, flag);
        mark_on_change(&mut self.scale, flag);
        mark_on_change(&mut self.rotation, flag);
        mark_on_change(&mut self.opacity, flag);
        match &mut self.position {
            PositionValue::Path(value) => mark_on_change(value, flag),
            PositionValue::Split { x, y } => {
                mark_on_change(x, flag);
                mark_on_change(y, flag);
            }
        }
    }

    /// Overrides the position. A split position becomes a single point value
    /// driven entirely by the callback.
    pub fn set_position_callback(&mut self, callback: ValueCallback<Vec2>, flag: &Rc<Cell<bool>>) {
        match &mut self.position {
            PositionValue::Path(value) => value.set_value_callback(Some(callback)),
            PositionValue::Split { .. } => {
                let progress = self.position.progress();
                let mut value = AnimatableValue::from_callback(callback);
                mark_on_change(&mut value, flag);
                value.set_progress(progress);
                self.position = PositionValue::Path(value);
                flag.set(true);
            }
        }
    }

    pub fn clear_listeners(&mut self) {
        self.anchor.clear_listeners();
        self.position.clear_listeners();
        self.scale.clear_listeners();
        self.rotation.clear_listeners();
        self.opacity.clear_listeners();
    }
}
