//! Time sources and tick schedulers driving the animation clock.
//!
//! The clock never sleeps or spawns anything itself. It reads time from a
//! [`TimeSource`] and asks a [`FrameScheduler`] to deliver ticks, which the
//! owning thread collects with [`FrameScheduler::poll`]. Every schedule call
//! carries a generation number; a tick tagged with an older generation is
//! stale and ignored by the clock.

use crate::error::LottieError;
use crossbeam_channel::{bounded, select, tick, unbounded, Receiver, Sender, TrySendError};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

pub trait TimeSource {
    /// Monotonic time since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

#[derive(Debug)]
pub struct MonotonicTime {
    origin: Instant,
}

impl MonotonicTime {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTime {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualTimeSource {
    now: Rc<Cell<Duration>>,
}

impl ManualTimeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn set(&self, to: Duration) {
        self.now.set(to);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

pub trait FrameScheduler {
    /// Starts delivering ticks every `interval`, tagged with `generation`.
    /// Replaces any previous schedule.
    fn schedule(&mut self, interval: Duration, generation: u64) -> Result<(), LottieError>;

    /// Changes the interval of the active schedule without resetting its generation.
    fn reschedule(&mut self, interval: Duration);

    /// Stops delivery. Ticks already queued are dropped.
    fn cancel(&mut self);

    /// Returns the generation of a pending tick, if one is due.
    fn poll(&mut self) -> Option<u64>;
}

#[derive(Debug, Default)]
struct ManualState {
    active: Option<u64>,
    interval: Duration,
    reschedules: usize,
}

/// A scheduler that reports a tick on every poll while active.
///
/// Pair it with [`ManualTimeSource`] and advance time between polls to step
/// the clock frame by frame. Clones share state so a test can keep a handle.
#[derive(Clone, Debug, Default)]
pub struct ManualScheduler {
    state: Rc<RefCell<ManualState>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.state.borrow().active.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.state.borrow().interval
    }

    pub fn reschedule_count(&self) -> usize {
        self.state.borrow().reschedules
    }
}

impl FrameScheduler for ManualScheduler {
    fn schedule(&mut self, interval: Duration, generation: u64) -> Result<(), LottieError> {
        let mut state = self.state.borrow_mut();
        state.active = Some(generation);
        state.interval = interval;
        Ok(())
    }

    fn reschedule(&mut self, interval: Duration) {
        let mut state = self.state.borrow_mut();
        state.interval = interval;
        state.reschedules += 1;
    }

    fn cancel(&mut self) {
        self.state.borrow_mut().active = None;
    }

    fn poll(&mut self) -> Option<u64> {
        self.state.borrow().active
    }
}

enum Command {
    Interval(Duration),
    Stop,
}

struct Ticker {
    commands: Sender<Command>,
    ticks: Receiver<u64>,
    handle: JoinHandle<()>,
}

/// Delivers ticks from a background timer thread.
///
/// The thread only produces tick tokens; the clock still runs on whichever
/// thread calls [`FrameScheduler::poll`]. The tick channel holds at most one
/// token, so a slow consumer coalesces missed frames instead of queueing them
/// and ticks never overlap.
#[derive(Default)]
pub struct ThreadScheduler {
    ticker: Option<Ticker>,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the next tick or `timeout`.
    pub fn wait(&mut self, timeout: Duration) -> Option<u64> {
        let ticker = self.ticker.as_ref()?;
        ticker.ticks.recv_timeout(timeout).ok()
    }
}

fn run_ticker(interval: Duration, generation: u64, commands: Receiver<Command>, ticks: Sender<u64>) {
    let mut timer = tick(interval);
    loop {
        let mut next_interval = None;
        let mut stop = false;
        select! {
            recv(commands) -> cmd => match cmd {
                Ok(Command::Interval(interval)) => next_interval = Some(interval),
                Ok(Command::Stop) | Err(_) => stop = true,
            },
            recv(timer) -> _ => {
                if let Err(TrySendError::Disconnected(_)) = ticks.try_send(generation) {
                    stop = true;
                }
            },
        }
        if stop {
            break;
        }
        if let Some(interval) = next_interval {
            trace!(?interval, "ticker interval changed");
            timer = tick(interval);
        }
    }
}

impl FrameScheduler for ThreadScheduler {
    fn schedule(&mut self, interval: Duration, generation: u64) -> Result<(), LottieError> {
        self.cancel();

        let (command_tx, command_rx) = unbounded();
        let (tick_tx, tick_rx) = bounded(1);
        let handle = thread::Builder::new()
            .name("lottie-clock".into())
            .spawn(move || run_ticker(interval, generation, command_rx, tick_tx))?;

        debug!(?interval, generation, "ticker thread started");
        self.ticker = Some(Ticker {
            commands: command_tx,
            ticks: tick_rx,
            handle,
        });
        Ok(())
    }

    fn reschedule(&mut self, interval: Duration) {
        if let Some(ticker) = &self.ticker {
            let _ = ticker.commands.send(Command::Interval(interval));
        }
    }

    fn cancel(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.commands.send(Command::Stop);
            let _ = ticker.handle.join();
            debug!("ticker thread stopped");
        }
    }

    fn poll(&mut self) -> Option<u64> {
        self.ticker.as_ref()?.ticks.try_recv().ok()
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
