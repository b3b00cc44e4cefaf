use crate::canvas::Canvas;
use crate::clock::{AnimationClock, RepeatCount, RepeatMode, DEFAULT_FRAME_RATE};
use crate::composition::CompositionLayer;
use crate::error::LottieError;
use crate::interpolator::EasingType;
use crate::keypath::{KeyPath, LottieProperty};
use crate::scheduler::{FrameScheduler, MonotonicTime, ThreadScheduler, TimeSource};
use kurbo::{Affine, Rect};
use lottie_data::model::CompositionData;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Playback settings, usually loaded from JSON next to the animation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Ticks per second. Defaults to the composition's own frame rate.
    pub frame_rate: Option<f32>,
    pub repeat_count: RepeatCount,
    pub repeat_mode: RepeatMode,
    pub easing: EasingType,
    /// Playback speed multiplier; 2.0 plays twice as fast.
    pub speed: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            frame_rate: None,
            repeat_count: RepeatCount::default(),
            repeat_mode: RepeatMode::default(),
            easing: EasingType::default(),
            speed: 1.0,
        }
    }
}

impl PlayerConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn validate(&self) -> Result<(), LottieError> {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(LottieError::InvalidSpeed(self.speed));
        }
        if let Some(rate) = self.frame_rate {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(LottieError::InvalidFrameRate(rate));
            }
        }
        Ok(())
    }
}

/// A root composition driven by an animation clock.
///
/// Ticks are consumed with [`LottiePlayer::pump`] on the thread that owns the
/// player; each consumed tick pushes the clock's animated fraction into the
/// composition as progress.
pub struct LottiePlayer {
    composition: CompositionLayer,
    clock: AnimationClock,
    config: PlayerConfig,
}

impl LottiePlayer {
    /// Plays on the system clock with a background ticker thread.
    pub fn new(data: &CompositionData, config: PlayerConfig) -> Result<Self, LottieError> {
        Self::with_drivers(
            data,
            config,
            Box::new(MonotonicTime::new()),
            Box::new(ThreadScheduler::new()),
        )
    }

    pub fn with_drivers(
        data: &CompositionData,
        config: PlayerConfig,
        time: Box<dyn TimeSource>,
        scheduler: Box<dyn FrameScheduler>,
    ) -> Result<Self, LottieError> {
        config.validate()?;

        let duration_ms = data.duration_ms().max(0.0) as f64 / config.speed as f64;
        let duration = Duration::try_from_secs_f64(duration_ms / 1000.0)
            .map_err(|_| LottieError::InvalidSpeed(config.speed))?;
        let mut clock = AnimationClock::with_drivers(duration, time, scheduler);
        let frame_rate = config.frame_rate.unwrap_or(if data.frame_rate > 0.0 {
            data.frame_rate
        } else {
            DEFAULT_FRAME_RATE
        });
        clock.set_frame_rate(frame_rate)?;
        clock.set_repeat_count(config.repeat_count);
        clock.set_repeat_mode(config.repeat_mode);
        clock.set_interpolator(Some(Box::new(config.easing)));

        let composition = CompositionLayer::new(data);
        debug!(
            width = composition.width(),
            height = composition.height(),
            duration = ?clock.duration(),
            frame_rate,
            "player ready"
        );
        Ok(Self {
            composition,
            clock,
            config,
        })
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn width(&self) -> f32 {
        self.composition.width()
    }

    pub fn height(&self) -> f32 {
        self.composition.height()
    }

    pub fn composition(&self) -> &CompositionLayer {
        &self.composition
    }

    pub fn clock(&self) -> &AnimationClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut AnimationClock {
        &mut self.clock
    }

    /// Starts the clock and applies its first frame.
    pub fn play(&mut self) -> Result<(), LottieError> {
        self.clock.start()?;
        self.composition.set_progress(self.clock.animated_fraction());
        Ok(())
    }

    /// Applies a pending tick. Returns whether progress moved.
    pub fn pump(&mut self) -> bool {
        if !self.clock.pump() {
            return false;
        }
        self.composition.set_progress(self.clock.animated_fraction());
        true
    }

    pub fn cancel(&mut self) {
        self.clock.cancel();
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_running()
    }

    /// Seeks without touching the clock.
    pub fn set_progress(&mut self, progress: f32) {
        self.composition.set_progress(progress);
    }

    pub fn progress(&self) -> f32 {
        self.composition.progress()
    }

    pub fn draw(&self, canvas: &mut dyn Canvas, matrix: Affine, alpha: f32) {
        self.composition.draw(canvas, matrix, alpha);
    }

    pub fn bounds(&self, matrix: Affine) -> Rect {
        self.composition.bounds(matrix)
    }

    pub fn resolve_key_path(&self, key_path: &KeyPath) -> Vec<KeyPath> {
        self.composition.resolve_key_path(key_path)
    }

    pub fn add_value_callback(&mut self, key_path: &KeyPath, property: LottieProperty) -> usize {
        self.composition.add_value_callback(key_path, property)
    }

    /// Whether anything visible changed since the last call.
    pub fn take_invalidated(&self) -> bool {
        self.composition.take_invalidated()
    }

    /// Stops playback and releases the layer tree. Idempotent.
    pub fn dispose(&mut self) {
        self.clock.dispose();
        self.composition.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_and_json() {
        let config = PlayerConfig::from_json("{}").unwrap();
        assert_eq!(config, PlayerConfig::default());

        let config = PlayerConfig::from_json(
            r#"{ "frame_rate": 24, "repeat_count": "infinite", "repeat_mode": "reverse", "easing": "ease_out", "speed": 0.5 }"#,
        )
        .unwrap();
        assert_eq!(config.frame_rate, Some(24.0));
        assert_eq!(config.repeat_count, RepeatCount::Infinite);
        assert_eq!(config.repeat_mode, RepeatMode::Reverse);
        assert_eq!(config.easing, EasingType::EaseOut);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_bad_speed_and_rate() {
        let config = PlayerConfig {
            speed: 0.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(LottieError::InvalidSpeed(_))));

        let config = PlayerConfig {
            frame_rate: Some(-1.0),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(LottieError::InvalidFrameRate(_))));
    }

    #[test]
    fn test_tiny_speed_is_rejected_instead_of_overflowing() {
        let data = CompositionData {
            name: None,
            width: 10.0,
            height: 10.0,
            start_frame: 0.0,
            end_frame: 30.0,
            frame_rate: 30.0,
            layers: Vec::new(),
            precomps: Default::default(),
        };
        let config = PlayerConfig {
            speed: 1e-20,
            ..Default::default()
        };
        let result = LottiePlayer::with_drivers(
            &data,
            config,
            Box::new(crate::scheduler::ManualTimeSource::new()),
            Box::new(crate::scheduler::ManualScheduler::new()),
        );
        assert!(matches!(result, Err(LottieError::InvalidSpeed(_))));
    }
}
