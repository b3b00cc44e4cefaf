pub mod animatable;
pub mod canvas;
pub mod clock;
pub mod composition;
pub mod error;
pub mod geometry;
pub mod interpolator;
pub mod keyframe;
pub mod keypath;
pub mod layer;
pub mod observer;
pub mod player;
pub mod scheduler;
pub mod transform;

pub use animatable::{AnimatableValue, Interpolatable};
pub use canvas::{Canvas, CanvasOp, ClipMode, LayerBlend, RecordingCanvas, TextRun};
pub use clock::{AnimationClock, ClockFrame, ClockState, RepeatCount, RepeatMode};
pub use composition::CompositionLayer;
pub use error::LottieError;
pub use interpolator::{
    AccelerateDecelerate, CubicBezierInterpolator, EasingType, Interpolator, Linear,
};
pub use keyframe::{Easing, FrameInfo, Keyframe, KeyframeTrack, ValueCallback};
pub use keypath::{KeyPath, LottieProperty};
pub use layer::{LayerContent, LayerId, LayerNode};
pub use observer::ListenerId;
pub use player::{LottiePlayer, PlayerConfig};
pub use scheduler::{
    FrameScheduler, ManualScheduler, ManualTimeSource, MonotonicTime, ThreadScheduler, TimeSource,
};
