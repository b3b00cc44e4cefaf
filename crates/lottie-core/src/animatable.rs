use crate::keyframe::{KeyframeTrack, ValueCallback};
use crate::observer::{ListenerId, ObserverList};
use glam::{Vec2, Vec4};
use lottie_data::model::BezierPath;
use std::fmt;

pub trait Interpolatable: Sized + Clone {
    fn lerp(&self, other: &Self, t: f32) -> Self;

    fn lerp_spatial(
        &self,
        other: &Self,
        t: f32,
        _tan_in: Option<Vec2>,
        _tan_out: Option<Vec2>,
    ) -> Self {
        self.lerp(other, t)
    }
}

impl Interpolatable for f32 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Interpolatable for Vec2 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Vec2::lerp(*self, *other, t)
    }

    fn lerp_spatial(
        &self,
        other: &Self,
        t: f32,
        tan_in: Option<Vec2>,
        tan_out: Option<Vec2>,
    ) -> Self {
        if tan_in.is_none() && tan_out.is_none() {
            return self.lerp(other, t);
        }

        let p0 = *self;
        let p3 = *other;
        let p1 = p0 + tan_out.unwrap_or(Vec2::ZERO);
        let p2 = p3 + tan_in.unwrap_or(Vec2::ZERO);

        let one_minus_t = 1.0 - t;
        let one_minus_t_sq = one_minus_t * one_minus_t;
        let one_minus_t_cub = one_minus_t_sq * one_minus_t;

        let t_sq = t * t;
        let t_cub = t_sq * t;

        p0 * one_minus_t_cub
            + p1 * 3.0 * one_minus_t_sq * t
            + p2 * 3.0 * one_minus_t * t_sq
            + p3 * t_cub
    }
}

impl Interpolatable for Vec4 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Vec4::lerp(*self, *other, t)
    }
}

// Vertex-wise when both paths share a topology, otherwise a hold.
impl Interpolatable for BezierPath {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        let same_shape = self.vertices.len() == other.vertices.len()
            && self.in_tangents.len() == other.in_tangents.len()
            && self.out_tangents.len() == other.out_tangents.len();
        if !same_shape {
            return if t < 1.0 { self.clone() } else { other.clone() };
        }

        let mix = |a: &[[f32; 2]], b: &[[f32; 2]]| -> Vec<[f32; 2]> {
            a.iter()
                .zip(b.iter())
                .map(|(a, b)| [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t])
                .collect()
        };

        BezierPath {
            closed: self.closed || other.closed,
            vertices: mix(&self.vertices, &other.vertices),
            in_tangents: mix(&self.in_tangents, &other.in_tangents),
            out_tangents: mix(&self.out_tangents, &other.out_tangents),
        }
    }
}

// Cubic Bezier Easing
pub fn solve_cubic_bezier(p1: Vec2, p2: Vec2, x: f32) -> f32 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    // Newton-Raphson
    let mut t = x;
    for _ in 0..8 {
        let one_minus_t = 1.0 - t;
        let x_est = 3.0 * one_minus_t * one_minus_t * t * p1.x
            + 3.0 * one_minus_t * t * t * p2.x
            + t * t * t;

        let err = x_est - x;
        if err.abs() < 1e-4 {
            break;
        }

        let dx_dt = 3.0 * one_minus_t * one_minus_t * p1.x
            + 6.0 * one_minus_t * t * (p2.x - p1.x)
            + 3.0 * t * t * (1.0 - p2.x);

        if dx_dt.abs() < 1e-6 {
            break;
        }
        t -= err / dx_dt;
    }

    let one_minus_t = 1.0 - t;
    3.0 * one_minus_t * one_minus_t * t * p1.y + 3.0 * one_minus_t * t * t * p2.y + t * t * t
}

/// A keyframe track bound to its current value.
///
/// `set_progress` recomputes the value and notifies subscribers when it
/// actually changed.
pub struct AnimatableValue<T> {
    track: KeyframeTrack<T>,
    value: T,
    progress: f32,
    listeners: ObserverList<T>,
}

impl<T> AnimatableValue<T>
where
    T: Interpolatable + PartialEq + Default,
{
    pub fn new(track: KeyframeTrack<T>) -> Self {
        let value = track.value_at(0.0);
        Self {
            track,
            value,
            progress: 0.0,
            listeners: ObserverList::new(),
        }
    }

    pub fn constant(value: T) -> Self {
        Self::new(KeyframeTrack::constant(value))
    }

    pub fn from_callback(callback: ValueCallback<T>) -> Self {
        Self::new(KeyframeTrack::from_callback(callback))
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn track(&self) -> &KeyframeTrack<T> {
        &self.track
    }

    pub fn set_progress(&mut self, progress: f32) {
        self.progress = progress;
        self.refresh();
    }

    /// Installs or clears a value override and re-evaluates at the current progress.
    pub fn set_value_callback(&mut self, callback: Option<ValueCallback<T>>) {
        self.track.set_value_callback(callback);
        self.refresh();
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&T) + 'static) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn clear_listeners(&mut self) {
        self.listeners.clear();
    }

    fn refresh(&mut self) {
        let next = self.track.value_at(self.progress);
        if next != self.value {
            self.value = next;
            self.listeners.notify(&self.value);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for AnimatableValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimatableValue")
            .field("value", &self.value)
            .field("progress", &self.progress)
            .finish()
    }
}
