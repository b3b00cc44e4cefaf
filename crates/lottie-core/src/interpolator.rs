use crate::animatable::solve_cubic_bezier;
use glam::Vec2;
use keyframe::EasingFunction;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Maps the clock's wrapped linear fraction onto the published animated fraction.
pub trait Interpolator {
    fn interpolate(&self, fraction: f32) -> f32;
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Linear;

impl Interpolator for Linear {
    fn interpolate(&self, fraction: f32) -> f32 {
        fraction
    }
}

/// Starts and ends slowly, fastest through the middle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AccelerateDecelerate;

impl Interpolator for AccelerateDecelerate {
    fn interpolate(&self, fraction: f32) -> f32 {
        ((fraction + 1.0) * PI).cos() / 2.0 + 0.5
    }
}

/// CSS-style `cubic-bezier(x1, y1, x2, y2)` timing curve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CubicBezierInterpolator {
    p1: Vec2,
    p2: Vec2,
}

impl CubicBezierInterpolator {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            p1: Vec2::new(x1.clamp(0.0, 1.0), y1),
            p2: Vec2::new(x2.clamp(0.0, 1.0), y2),
        }
    }
}

impl Interpolator for CubicBezierInterpolator {
    fn interpolate(&self, fraction: f32) -> f32 {
        solve_cubic_bezier(self.p1, self.p2, fraction)
    }
}

/// Named easing presets usable from configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EasingType {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    AccelerateDecelerate,
}

impl EasingFunction for EasingType {
    fn y(&self, x: f64) -> f64 {
        match self {
            EasingType::Linear => keyframe::functions::Linear.y(x),
            EasingType::EaseIn => keyframe::functions::EaseIn.y(x),
            EasingType::EaseOut => keyframe::functions::EaseOut.y(x),
            EasingType::EaseInOut => keyframe::functions::EaseInOut.y(x),
            EasingType::AccelerateDecelerate => {
                AccelerateDecelerate.interpolate(x as f32) as f64
            }
        }
    }
}

impl Interpolator for EasingType {
    fn interpolate(&self, fraction: f32) -> f32 {
        self.y(fraction as f64) as f32
    }
}
