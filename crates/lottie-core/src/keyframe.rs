use crate::animatable::{solve_cubic_bezier, Interpolatable};
use glam::Vec2;
use lottie_data::model::{EasingData, KeyframeData, TrackData};
use std::fmt;
use std::rc::Rc;

/// Cubic-bezier timing curve mapping linear segment progress to an
/// interpolation fraction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Easing {
    pub out_tangent: Vec2,
    pub in_tangent: Vec2,
}

impl Easing {
    pub fn new(out_tangent: Vec2, in_tangent: Vec2) -> Self {
        Self {
            out_tangent,
            in_tangent,
        }
    }

    pub fn apply(&self, x: f32) -> f32 {
        solve_cubic_bezier(self.out_tangent, self.in_tangent, x)
    }
}

impl From<&EasingData> for Easing {
    fn from(data: &EasingData) -> Self {
        Self::new(Vec2::from(data.out_tangent), Vec2::from(data.in_tangent))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Keyframe<T> {
    pub start_value: T,
    /// `None` holds `start_value` for the whole segment.
    pub end_value: Option<T>,
    pub start_progress: f32,
    pub end_progress: f32,
    /// `None` means linear.
    pub easing: Option<Easing>,
    pub is_static: bool,
    pub tangent_out: Option<Vec2>,
    pub tangent_in: Option<Vec2>,
}

impl<T> Keyframe<T> {
    /// A static keyframe: the same value for every progress.
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

    pub fn new(start_value: T, end_value: Option<T>, start_progress: f32, end_progress: f32) -> Self {
        Self {
            start_value,
            end_value,
            start_progress,
            end_progress,
            easing: None,
            is_static: false,
            tangent_out: None,
            tangent_in: None,
        }
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = Some(easing);
        self
    }

    pub fn with_tangents(mut self, tangent_out: Vec2, tangent_in: Vec2) -> Self {
        self.tangent_out = Some(tangent_out);
        self.tangent_in = Some(tangent_in);
        self
    }

    fn from_data<D>(data: &KeyframeData<D>, convert: &impl Fn(&D) -> T) -> Self {
        Self {
            start_value: convert(&data.start_value),
            end_value: data.end_value.as_ref().map(convert),
            start_progress: data.start_progress,
            end_progress: data.end_progress,
            easing: data.easing.as_ref().map(Easing::from),
            is_static: data.is_static,
            tangent_out: data.tangent_out.map(Vec2::from),
            tangent_in: data.tangent_in.map(Vec2::from),
        }
    }
}

/// What a value callback sees for the segment containing the current progress.
pub struct FrameInfo<'a, T> {
    pub start_value: &'a T,
    pub end_value: &'a T,
    pub linear_progress: f32,
    pub interpolated_progress: f32,
    pub overall_progress: f32,
}

/// Replaces a track's computed value. Shared so one callback can be installed
/// on every property a key path resolves to.
pub type ValueCallback<T> = Rc<dyn Fn(&FrameInfo<'_, T>) -> T>;

struct Segment<'a, T> {
    start: &'a T,
    end: &'a T,
    linear: f32,
    eased: f32,
    tangent_out: Option<Vec2>,
    tangent_in: Option<Vec2>,
}

impl<'a, T> Segment<'a, T> {
    fn hold(value: &'a T) -> Self {
        Self {
            start: value,
            end: value,
            linear: 0.0,
            eased: 0.0,
            tangent_out: None,
            tangent_in: None,
        }
    }

    fn is_hold(&self) -> bool {
        std::ptr::eq(self.start, self.end)
    }
}

/// An ordered keyframe list that produces a value for any progress.
///
/// Progress before the first keyframe clamps to its start value, progress past
/// the last keyframe clamps to its end value (or its start value when it is a
/// hold). Keyframes are immutable after construction; only the value callback
/// can be swapped.
pub struct KeyframeTrack<T> {
    keyframes: Vec<Keyframe<T>>,
    callback: Option<ValueCallback<T>>,
}

impl<T: Interpolatable + Default> KeyframeTrack<T> {
    pub fn new(mut keyframes: Vec<Keyframe<T>>) -> Self {
        // Stable, so equal start progresses keep their authored order.
        keyframes.sort_by(|a, b| a.start_progress.total_cmp(&b.start_progress));
        Self {
            keyframes,
            callback: None,
        }
    }

    pub fn constant(value: T) -> Self {
        Self::new(vec![Keyframe::constant(value)])
    }

    /// A track with no keyframes whose output comes entirely from `callback`.
    pub fn from_callback(callback: ValueCallback<T>) -> Self {
        Self {
            keyframes: Vec::new(),
            callback: Some(callback),
        }
    }

    pub fn from_data<D>(data: &TrackData<D>, convert: impl Fn(&D) -> T) -> Self {
        Self::new(
            data.keyframes
                .iter()
                .map(|kf| Keyframe::from_data(kf, &convert))
                .collect(),
        )
    }

    pub fn keyframes(&self) -> &[Keyframe<T>] {
        &self.keyframes
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// True when the first keyframe is marked static; the track then never changes.
    pub fn is_static(&self) -> bool {
        self.keyframes.first().is_some_and(|kf| kf.is_static)
    }

    pub fn set_value_callback(&mut self, callback: Option<ValueCallback<T>>) {
        self.callback = callback;
    }

    pub fn has_value_callback(&self) -> bool {
        self.callback.is_some()
    }

    pub fn value_at(&self, progress: f32) -> T {
        let fallback = T::default();
        let segment = self.locate(progress).unwrap_or_else(|| Segment::hold(&fallback));

        if let Some(callback) = &self.callback {
            return callback(&FrameInfo {
                start_value: segment.start,
                end_value: segment.end,
                linear_progress: segment.linear,
                interpolated_progress: segment.eased,
                overall_progress: progress,
            });
        }

        if segment.is_hold() {
            return segment.start.clone();
        }
        segment.start.lerp_spatial(
            segment.end,
            segment.eased,
            segment.tangent_in,
            segment.tangent_out,
        )
    }

    fn locate(&self, progress: f32) -> Option<Segment<'_, T>> {
        let first = self.keyframes.first()?;
        if first.is_static {
            return Some(Segment::hold(&first.start_value));
        }

        // First keyframe starting after `progress`; the active one precedes it.
        let idx = self.keyframes.partition_point(|kf| kf.start_progress <= progress);
        if idx == 0 {
            return Some(Segment::hold(&first.start_value));
        }

        let kf = &self.keyframes[idx - 1];
        let Some(end) = kf.end_value.as_ref() else {
            return Some(Segment::hold(&kf.start_value));
        };
        if progress >= kf.end_progress {
            return Some(Segment::hold(end));
        }

        // start <= progress < end, so the span is positive.
        let linear = (progress - kf.start_progress) / (kf.end_progress - kf.start_progress);
        let eased = kf.easing.map_or(linear, |easing| easing.apply(linear));
        Some(Segment {
            start: &kf.start_value,
            end,
            linear,
            eased,
            tangent_out: kf.tangent_out,
            tangent_in: kf.tangent_in,
        })
    }
}

impl<T> fmt::Debug for KeyframeTrack<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyframeTrack")
            .field("keyframes", &self.keyframes)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> KeyframeTrack<f32> {
        KeyframeTrack::new(vec![
            Keyframe::new(0.0, Some(10.0), 0.0, 0.5),
            Keyframe::new(10.0, Some(20.0), 0.5, 0.75),
            Keyframe::new(20.0, None, 0.75, 1.0),
        ])
    }

    #[test]
    fn test_value_at_segments() {
        let track = ramp();

        assert_eq!(track.value_at(0.0), 0.0);
        assert_eq!(track.value_at(0.25), 5.0);
        assert_eq!(track.value_at(0.5), 10.0);
        assert_eq!(track.value_at(0.625), 15.0);
        // Hold keyframe
        assert_eq!(track.value_at(0.9), 20.0);
    }

    #[test]
    fn test_value_at_clamps_outside_range() {
        let track = ramp();
        for p in [-10.0, -0.5, -f32::EPSILON] {
            assert_eq!(track.value_at(p), 0.0, "before first at {p}");
        }
        for p in [1.0, 1.5, 100.0] {
            assert_eq!(track.value_at(p), 20.0, "after last at {p}");
        }
    }

    #[test]
    fn test_last_end_value_used_after_range() {
        let track = KeyframeTrack::new(vec![Keyframe::new(1.0, Some(3.0), 0.2, 0.8)]);
        assert_eq!(track.value_at(0.0), 1.0);
        assert!((track.value_at(0.5) - 2.0).abs() < 1e-5);
        assert_eq!(track.value_at(0.8), 3.0);
        assert_eq!(track.value_at(2.0), 3.0);
    }

    #[test]
    fn test_gap_between_keyframes_holds_previous_end() {
        let track = KeyframeTrack::new(vec![
            Keyframe::new(0.0, Some(1.0), 0.0, 0.2),
            Keyframe::new(5.0, Some(6.0), 0.6, 1.0),
        ]);
        assert_eq!(track.value_at(0.4), 1.0);
        assert!((track.value_at(0.8) - 5.5).abs() < 1e-5);
    }

    #[test]
    fn test_static_track_is_constant() {
        let track = KeyframeTrack::constant(42.0_f32);
        assert!(track.is_static());
        for p in [-3.0, 0.0, 0.5, 1.0, 7.0] {
            assert_eq!(track.value_at(p), 42.0);
        }
    }

    #[test]
    fn test_static_flag_wins_over_later_keyframes() {
        let mut first = Keyframe::new(4.0_f32, Some(8.0), 0.0, 0.5);
        first.is_static = true;
        let track = KeyframeTrack::new(vec![first, Keyframe::new(8.0, Some(16.0), 0.5, 1.0)]);
        assert_eq!(track.value_at(0.25), 4.0);
        assert_eq!(track.value_at(0.75), 4.0);
    }

    #[test]
    fn test_easing_applied_within_segment() {
        let ease_in = Easing::new(Vec2::new(0.9, 0.0), Vec2::new(1.0, 1.0));
        let track = KeyframeTrack::new(vec![
            Keyframe::new(0.0_f32, Some(100.0), 0.0, 1.0).with_easing(ease_in),
        ]);
        let mid = track.value_at(0.5);
        assert!(mid < 50.0, "ease-in should lag behind linear, got {mid}");
        assert_eq!(track.value_at(0.0), 0.0);
        assert_eq!(track.value_at(1.0), 100.0);
    }

    #[test]
    fn test_unsorted_input_is_ordered() {
        let track = KeyframeTrack::new(vec![
            Keyframe::new(10.0_f32, Some(20.0), 0.5, 1.0),
            Keyframe::new(0.0, Some(10.0), 0.0, 0.5),
        ]);
        assert_eq!(track.value_at(0.25), 5.0);
        assert_eq!(track.value_at(0.75), 15.0);
    }

    #[test]
    fn test_value_callback_replaces_output() {
        let mut track = ramp();
        track.set_value_callback(Some(Rc::new(|info: &FrameInfo<'_, f32>| {
            *info.end_value + info.overall_progress
        })));
        assert!(track.has_value_callback());
        // Segment [0, 0.5): end value 10
        assert_eq!(track.value_at(0.25), 10.25);

        track.set_value_callback(None);
        assert_eq!(track.value_at(0.25), 5.0);
    }

    #[test]
    fn test_empty_track_uses_default_or_callback() {
        let track = KeyframeTrack::<f32>::new(vec![]);
        assert_eq!(track.value_at(0.3), 0.0);

        let track = KeyframeTrack::<f32>::from_callback(Rc::new(|info: &FrameInfo<'_, f32>| {
            info.overall_progress * 2.0
        }));
        assert_eq!(track.value_at(0.3), 0.6);
    }

    #[test]
    fn test_from_data_converts_values() {
        let data = TrackData::new(vec![KeyframeData::tween([0.0, 0.0], [10.0, 20.0], 0.0, 1.0)]);
        let track = KeyframeTrack::from_data(&data, |v| Vec2::from(*v));
        assert_eq!(track.value_at(0.5), Vec2::new(5.0, 10.0));
    }
}
