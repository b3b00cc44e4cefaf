use crate::error::LottieError;
use crate::interpolator::{AccelerateDecelerate, Interpolator, Linear};
use crate::observer::{ListenerId, ObserverList};
use crate::scheduler::{FrameScheduler, MonotonicTime, ThreadScheduler, TimeSource};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace};

pub const DEFAULT_FRAME_RATE: f32 = 60.0;

/// How many times the clock replays after the first cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRepeat", into = "i64")]
pub enum RepeatCount {
    Finite(u32),
    Infinite,
}

impl Default for RepeatCount {
    fn default() -> Self {
        RepeatCount::Finite(0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRepeat {
    Count(i64),
    Word(String),
}

impl TryFrom<RawRepeat> for RepeatCount {
    type Error = String;

    fn try_from(raw: RawRepeat) -> Result<Self, Self::Error> {
        match raw {
            RawRepeat::Count(-1) => Ok(RepeatCount::Infinite),
            RawRepeat::Count(n) => u32::try_from(n)
                .map(RepeatCount::Finite)
                .map_err(|_| format!("repeat count must be -1 or a non-negative count, got {n}")),
            RawRepeat::Word(word) if word.eq_ignore_ascii_case("infinite") => {
                Ok(RepeatCount::Infinite)
            }
            RawRepeat::Word(word) => Err(format!("unknown repeat count {word:?}")),
        }
    }
}

impl From<RepeatCount> for i64 {
    fn from(count: RepeatCount) -> Self {
        match count {
            RepeatCount::Finite(n) => n as i64,
            RepeatCount::Infinite => -1,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    /// Every cycle runs 0 → 1.
    #[default]
    Restart,
    /// Odd cycles run 1 → 0.
    Reverse,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockState {
    Idle,
    Running,
}

/// Payload of every tick notification.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockFrame {
    /// The interpolated fraction observers should apply.
    pub animated_fraction: f32,
    /// Wrapped and direction-adjusted fraction before interpolation.
    pub raw_fraction: f32,
    /// Zero-based cycle the tick fell in.
    pub cycle: u64,
}

/// A frame-rate driven, repeatable and cancelable progress driver.
///
/// The clock runs on one thread. Ticks arrive through a [`FrameScheduler`]
/// and are consumed with [`AnimationClock::pump`], so observer callbacks
/// always execute on the thread that owns the clock and never overlap.
pub struct AnimationClock {
    duration: Duration,
    repeat_count: RepeatCount,
    repeat_mode: RepeatMode,
    frame_rate: f32,
    interpolator: Box<dyn Interpolator>,
    state: ClockState,
    started_at: Duration,
    generation: u64,
    last_frame: ClockFrame,
    disposed: bool,
    time: Box<dyn TimeSource>,
    scheduler: Box<dyn FrameScheduler>,
    value_changed: ObserverList<ClockFrame>,
    update: ObserverList<ClockFrame>,
    cancel_listeners: ObserverList<()>,
    end_listeners: ObserverList<()>,
}

impl AnimationClock {
    /// A clock on the monotonic system clock, ticking from a background thread.
    pub fn new(duration: Duration) -> Self {
        Self::with_drivers(
            duration,
            Box::new(MonotonicTime::new()),
            Box::new(ThreadScheduler::new()),
        )
    }

    pub fn with_drivers(
        duration: Duration,
        time: Box<dyn TimeSource>,
        scheduler: Box<dyn FrameScheduler>,
    ) -> Self {
        Self {
            duration,
            repeat_count: RepeatCount::default(),
            repeat_mode: RepeatMode::default(),
            frame_rate: DEFAULT_FRAME_RATE,
            interpolator: Box::new(AccelerateDecelerate),
            state: ClockState::Idle,
            started_at: Duration::ZERO,
            generation: 0,
            last_frame: ClockFrame {
                animated_fraction: 0.0,
                raw_fraction: 0.0,
                cycle: 0,
            },
            disposed: false,
            time,
            scheduler,
            value_changed: ObserverList::new(),
            update: ObserverList::new(),
            cancel_listeners: ObserverList::new(),
            end_listeners: ObserverList::new(),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Takes effect on the next tick; elapsed time is not reset.
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    pub fn repeat_count(&self) -> RepeatCount {
        self.repeat_count
    }

    pub fn set_repeat_count(&mut self, repeat_count: RepeatCount) {
        self.repeat_count = repeat_count;
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub fn set_repeat_mode(&mut self, repeat_mode: RepeatMode) {
        self.repeat_mode = repeat_mode;
    }

    /// `None` selects linear interpolation.
    pub fn set_interpolator(&mut self, interpolator: Option<Box<dyn Interpolator>>) {
        self.interpolator = interpolator.unwrap_or_else(|| Box::new(Linear));
    }

    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    /// Changes the tick interval. A running clock keeps its elapsed time.
    pub fn set_frame_rate(&mut self, frame_rate: f32) -> Result<(), LottieError> {
        if interval_for(frame_rate).is_none() {
            return Err(LottieError::InvalidFrameRate(frame_rate));
        }
        self.frame_rate = frame_rate;
        if self.state == ClockState::Running {
            self.scheduler.reschedule(self.frame_interval());
        }
        debug!(frame_rate, "clock frame rate changed");
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        interval_for(self.frame_rate).unwrap_or(Duration::MAX)
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn animated_fraction(&self) -> f32 {
        self.last_frame.animated_fraction
    }

    pub fn last_frame(&self) -> ClockFrame {
        self.last_frame
    }

    /// Starts from the beginning and publishes the first frame immediately.
    /// Does nothing when already running.
    pub fn start(&mut self) -> Result<(), LottieError> {
        if self.disposed {
            return Err(LottieError::Disposed);
        }
        if self.state == ClockState::Running {
            return Ok(());
        }

        self.generation += 1;
        self.started_at = self.time.now();
        self.state = ClockState::Running;
        if let Err(err) = self.scheduler.schedule(self.frame_interval(), self.generation) {
            self.state = ClockState::Idle;
            return Err(err);
        }

        debug!(
            duration = ?self.duration,
            repeat_count = ?self.repeat_count,
            repeat_mode = ?self.repeat_mode,
            frame_rate = self.frame_rate,
            "clock started"
        );
        self.tick();
        Ok(())
    }

    /// Consumes one pending tick from the scheduler. Returns whether a frame
    /// was published. Ticks scheduled before the last restart are ignored.
    pub fn pump(&mut self) -> bool {
        match self.scheduler.poll() {
            Some(generation) if generation == self.generation && self.is_running() => {
                self.tick();
                true
            }
            _ => false,
        }
    }

    /// Stops ticking and fires the cancel listeners. A no-op when idle.
    pub fn cancel(&mut self) {
        if self.stop() {
            debug!("clock cancelled");
            self.cancel_listeners.notify(&());
        }
    }

    /// Cancels and detaches every listener. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.cancel();
        self.value_changed.clear();
        self.update.clear();
        self.cancel_listeners.clear();
        self.end_listeners.clear();
        self.disposed = true;
    }

    pub fn add_value_changed_listener(
        &mut self,
        listener: impl FnMut(&ClockFrame) + 'static,
    ) -> ListenerId {
        self.value_changed.add(listener)
    }

    pub fn remove_value_changed_listener(&mut self, id: ListenerId) -> bool {
        self.value_changed.remove(id)
    }

    pub fn add_update_listener(&mut self, listener: impl FnMut(&ClockFrame) + 'static) -> ListenerId {
        self.update.add(listener)
    }

    pub fn remove_update_listener(&mut self, id: ListenerId) -> bool {
        self.update.remove(id)
    }

    pub fn remove_all_update_listeners(&mut self) {
        self.update.clear();
    }

    /// Detaches every value-changed listener.
    pub fn remove_all_listeners(&mut self) {
        self.value_changed.clear();
    }

    pub fn add_cancel_listener(&mut self, mut listener: impl FnMut() + 'static) -> ListenerId {
        self.cancel_listeners.add(move |_: &()| listener())
    }

    pub fn add_end_listener(&mut self, mut listener: impl FnMut() + 'static) -> ListenerId {
        self.end_listeners.add(move |_: &()| listener())
    }

    fn tick(&mut self) {
        let elapsed = self.time.now().saturating_sub(self.started_at);

        let (raw_fraction, cycle, finished) = if self.duration.is_zero() {
            (1.0, 0, true)
        } else {
            let raw = elapsed.as_secs_f64() / self.duration.as_secs_f64();
            let cycle = raw.floor() as u64;
            match self.repeat_count {
                RepeatCount::Finite(n) if cycle > n as u64 => {
                    let last = n as u64;
                    (self.directed(1.0, last), last, true)
                }
                _ => (self.directed(raw.fract() as f32, cycle), cycle, false),
            }
        };

        let frame = ClockFrame {
            animated_fraction: self.interpolator.interpolate(raw_fraction),
            raw_fraction,
            cycle,
        };
        self.last_frame = frame;
        trace!(?elapsed, fraction = frame.animated_fraction, cycle, "clock tick");

        self.value_changed.notify(&frame);
        self.update.notify(&frame);

        if finished {
            self.finish();
        }
    }

    fn directed(&self, fraction: f32, cycle: u64) -> f32 {
        match self.repeat_mode {
            RepeatMode::Reverse if cycle % 2 == 1 => 1.0 - fraction,
            _ => fraction,
        }
    }

    fn finish(&mut self) {
        if self.stop() {
            debug!("clock finished");
            self.end_listeners.notify(&());
        }
    }

    fn stop(&mut self) -> bool {
        if self.state == ClockState::Idle {
            return false;
        }
        self.state = ClockState::Idle;
        self.scheduler.cancel();
        // Any tick still in flight for this run is now stale.
        self.generation += 1;
        true
    }
}

/// Tick interval for `frame_rate`, or `None` when it is not positive or too
/// small to express as a `Duration`.
fn interval_for(frame_rate: f32) -> Option<Duration> {
    if !frame_rate.is_finite() || frame_rate <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(1.0 / frame_rate as f64).ok()
}

impl Drop for AnimationClock {
    fn drop(&mut self) {
        self.scheduler.cancel();
    }
}

impl fmt::Debug for AnimationClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationClock")
            .field("duration", &self.duration)
            .field("repeat_count", &self.repeat_count)
            .field("repeat_mode", &self.repeat_mode)
            .field("frame_rate", &self.frame_rate)
            .field("state", &self.state)
            .field("last_frame", &self.last_frame)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{ManualScheduler, ManualTimeSource};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn manual_clock(duration_ms: u64) -> (AnimationClock, ManualTimeSource, ManualScheduler) {
        let time = ManualTimeSource::new();
        let scheduler = ManualScheduler::new();
        let mut clock = AnimationClock::with_drivers(
            Duration::from_millis(duration_ms),
            Box::new(time.clone()),
            Box::new(scheduler.clone()),
        );
        clock.set_interpolator(None);
        (clock, time, scheduler)
    }

    fn record_updates(clock: &mut AnimationClock) -> Rc<RefCell<Vec<f32>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        clock.add_update_listener(move |frame| s.borrow_mut().push(frame.raw_fraction));
        seen
    }

    /// Advances time one frame interval at a time and pumps until the clock idles.
    fn run_to_end(clock: &mut AnimationClock, time: &ManualTimeSource, max_frames: usize) {
        for _ in 0..max_frames {
            if !clock.is_running() {
                return;
            }
            time.advance(clock.frame_interval());
            clock.pump();
        }
    }

    #[test]
    fn test_single_cycle_updates_then_idles() {
        let (mut clock, time, scheduler) = manual_clock(1000);
        let updates = record_updates(&mut clock);
        let ended = Rc::new(Cell::new(0));
        let e = ended.clone();
        clock.add_end_listener(move || e.set(e.get() + 1));

        clock.start().unwrap();
        run_to_end(&mut clock, &time, 500);

        let count = updates.borrow().len();
        assert!((60..=62).contains(&count), "expected ~61 updates, got {count}");
        assert_eq!(clock.state(), ClockState::Idle);
        assert_eq!(*updates.borrow().last().unwrap(), 1.0);
        assert_eq!(ended.get(), 1);
        assert!(!scheduler.is_active());

        // No further ticks once idle.
        time.advance(Duration::from_secs(1));
        assert!(!clock.pump());
        assert_eq!(updates.borrow().len(), count);
    }

    #[test]
    fn test_reverse_repeat_is_continuous() {
        let (mut clock, time, _scheduler) = manual_clock(1000);
        clock.set_frame_rate(10.0).unwrap();
        clock.set_repeat_mode(RepeatMode::Reverse);
        clock.set_repeat_count(RepeatCount::Finite(1));
        let updates = record_updates(&mut clock);

        clock.start().unwrap();
        for _ in 0..40 {
            time.advance(Duration::from_millis(100));
            clock.pump();
        }

        let values = updates.borrow();
        assert!(values.iter().any(|v| (*v - 1.0).abs() < 1e-4));
        for pair in values.windows(2) {
            assert!(
                (pair[1] - pair[0]).abs() <= 0.1 + 1e-4,
                "discontinuity between {} and {}",
                pair[0],
                pair[1]
            );
        }
        assert_eq!(*values.last().unwrap(), 0.0);
        assert_eq!(clock.state(), ClockState::Idle);
    }

    #[test]
    fn test_infinite_repeat_runs_until_cancelled() {
        let (mut clock, time, _scheduler) = manual_clock(100);
        clock.set_repeat_count(RepeatCount::Infinite);
        let cycles = Rc::new(Cell::new(0));
        let c = cycles.clone();
        clock.add_value_changed_listener(move |frame| c.set(frame.cycle));

        clock.start().unwrap();
        for _ in 0..100 {
            time.advance(Duration::from_millis(25));
            clock.pump();
        }
        assert!(clock.is_running());
        assert_eq!(cycles.get(), 25);

        clock.cancel();
        assert!(!clock.is_running());
    }

    #[test]
    fn test_cancel_fires_hook_once_and_idle_cancel_is_noop() {
        let (mut clock, _time, _scheduler) = manual_clock(1000);
        let cancelled = Rc::new(Cell::new(0));
        let c = cancelled.clone();
        clock.add_cancel_listener(move || c.set(c.get() + 1));

        clock.cancel();
        assert_eq!(cancelled.get(), 0);

        clock.start().unwrap();
        clock.cancel();
        clock.cancel();
        assert_eq!(cancelled.get(), 1);
        assert!(!clock.pump());
    }

    #[test]
    fn test_frame_rate_change_keeps_elapsed_time() {
        let (mut clock, time, scheduler) = manual_clock(1000);
        clock.start().unwrap();
        time.advance(Duration::from_millis(400));
        clock.pump();

        clock.set_frame_rate(30.0).unwrap();
        assert_eq!(scheduler.reschedule_count(), 1);
        assert_eq!(scheduler.interval(), Duration::from_secs_f64(1.0 / 30.0));

        time.advance(Duration::from_millis(100));
        clock.pump();
        assert!((clock.last_frame().raw_fraction - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_invalid_frame_rate_rejected() {
        let (mut clock, _time, _scheduler) = manual_clock(1000);
        for bad in [0.0, -24.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                clock.set_frame_rate(bad),
                Err(LottieError::InvalidFrameRate(_))
            ));
        }
        assert_eq!(clock.frame_rate(), DEFAULT_FRAME_RATE);
    }

    #[test]
    fn test_tiny_frame_rate_rejected_before_start() {
        let (mut clock, _time, scheduler) = manual_clock(1000);
        assert!(matches!(
            clock.set_frame_rate(1e-20),
            Err(LottieError::InvalidFrameRate(_))
        ));
        clock.start().unwrap();
        assert_eq!(scheduler.interval(), Duration::from_secs_f64(1.0 / DEFAULT_FRAME_RATE as f64));
    }

    #[test]
    fn test_zero_duration_publishes_end_and_finishes() {
        let (mut clock, _time, _scheduler) = manual_clock(0);
        let updates = record_updates(&mut clock);
        clock.start().unwrap();
        assert_eq!(*updates.borrow(), vec![1.0]);
        assert!(!clock.is_running());
    }

    #[test]
    fn test_restart_ignores_stale_generation() {
        let (mut clock, time, scheduler) = manual_clock(1000);
        let mut stale = scheduler.clone();
        clock.start().unwrap();
        let first_generation = stale.poll();
        clock.cancel();
        clock.start().unwrap();
        assert_ne!(stale.poll(), first_generation);

        time.advance(Duration::from_millis(250));
        assert!(clock.pump());
        assert!((clock.last_frame().raw_fraction - 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_dispose_detaches_and_is_idempotent() {
        let (mut clock, _time, _scheduler) = manual_clock(1000);
        let updates = record_updates(&mut clock);
        clock.start().unwrap();
        clock.dispose();
        clock.dispose();

        assert!(clock.is_disposed());
        assert!(matches!(clock.start(), Err(LottieError::Disposed)));
        assert_eq!(updates.borrow().len(), 1);
    }

    #[test]
    fn test_listener_removal() {
        let (mut clock, _time, _scheduler) = manual_clock(1000);
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let id = clock.add_value_changed_listener(move |_| h.set(h.get() + 1));
        let h = hits.clone();
        clock.add_update_listener(move |_| h.set(h.get() + 10));

        assert!(clock.remove_value_changed_listener(id));
        clock.remove_all_update_listeners();
        clock.start().unwrap();
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_default_interpolator_eases() {
        let time = ManualTimeSource::new();
        let mut clock = AnimationClock::with_drivers(
            Duration::from_millis(1000),
            Box::new(time.clone()),
            Box::new(ManualScheduler::new()),
        );
        clock.start().unwrap();
        time.advance(Duration::from_millis(100));
        clock.pump();
        let frame = clock.last_frame();
        assert!(frame.animated_fraction < frame.raw_fraction);
    }

    #[test]
    fn test_repeat_count_serde() {
        let infinite: RepeatCount = serde_json::from_str("-1").unwrap();
        assert_eq!(infinite, RepeatCount::Infinite);
        let word: RepeatCount = serde_json::from_str("\"infinite\"").unwrap();
        assert_eq!(word, RepeatCount::Infinite);
        let three: RepeatCount = serde_json::from_str("3").unwrap();
        assert_eq!(three, RepeatCount::Finite(3));
        assert!(serde_json::from_str::<RepeatCount>("-2").is_err());
        assert_eq!(serde_json::to_string(&RepeatCount::Infinite).unwrap(), "-1");
    }

    #[test]
    fn test_threaded_clock_reaches_end() {
        let mut clock = AnimationClock::new(Duration::from_millis(30));
        clock.set_frame_rate(500.0).unwrap();
        let ended = Rc::new(Cell::new(false));
        let e = ended.clone();
        clock.add_end_listener(move || e.set(true));

        clock.start().unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while clock.is_running() && std::time::Instant::now() < deadline {
            clock.pump();
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(ended.get());
    }
}
