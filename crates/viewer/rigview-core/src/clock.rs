//! Frame timing.
//!
//! There is no process-wide clock: the host passes the current time into
//! [`FrameTimer::tick`] (or implements [`Clock`]), so tests drive time explicitly.

use std::cell::Cell;

/// A source of monotonic wall-clock seconds.
pub trait Clock {
    fn now_seconds(&self) -> f64;
}

/// Clock advanced by hand. Interior mutability lets tests share it by reference.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    pub fn set(&self, seconds: f64) {
        self.now.set(seconds);
    }

    pub fn advance(&self, seconds: f64) {
        self.now.set(self.now.get() + seconds);
    }
}

impl Clock for ManualClock {
    fn now_seconds(&self) -> f64 {
        self.now.get()
    }
}

/// Tracks the last frame timestamp and yields per-frame deltas.
#[derive(Debug, Default, Clone)]
pub struct FrameTimer {
    last: Option<f64>,
    delta: f32,
    elapsed: f64,
}

impl FrameTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a frame at `now` seconds and return the delta since the previous frame.
    /// The first frame, and any clock that runs backwards, yields zero.
    pub fn tick(&mut self, now: f64) -> f32 {
        let delta = match self.last {
            Some(last) if now > last => (now - last) as f32,
            _ => 0.0,
        };
        self.last = Some(now);
        self.delta = delta;
        self.elapsed += delta as f64;
        delta
    }

    pub fn tick_with(&mut self, clock: &dyn Clock) -> f32 {
        self.tick(clock.now_seconds())
    }

    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta
    }

    /// Sum of all deltas since creation.
    #[inline]
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }
}
