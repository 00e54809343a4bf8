//! Monotonic time sources.
//!
//! The scheduler stamps control points with clock readings, so the clock a
//! controller uses must be the one its signal graph plays against. Wall-clock
//! time is never used.

use instant::Instant;
use std::cell::Cell;
use std::rc::Rc;

pub trait Clock {
    /// Seconds since an arbitrary fixed origin; never decreases.
    fn now(&self) -> f64;
}

/// Process-monotonic clock (`Instant` on native, `performance.now()` on wasm).
#[derive(Clone, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Hand-driven clock. Clones share the same reading, so a test (or an
/// offline render) can keep one handle and advance time under a controller
/// that owns another.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    /// Move to `t`. Requests to go backwards are ignored.
    pub fn set(&self, t: f64) {
        if t > self.now.get() {
            self.now.set(t);
        }
    }

    pub fn advance(&self, dt: f64) {
        self.set(self.now.get() + dt.max(0.0));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> f64 {
        (**self).now()
    }
}
