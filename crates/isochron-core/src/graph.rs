//! The signal-generation seam: a carrier oscillator gated by a pulse gain
//! stage, feeding a master gain and an output sink.
//!
//! The core never touches samples. It sets the carrier, pushes timestamped
//! gain ramps and adjusts the master level; hosts implement [`SignalGraph`]
//! over Web Audio, cpal, or [`RecordingGraph`] for tests and offline renders.

use crate::envelope::ControlPoint;
use crate::error::GraphError;
use std::cell::RefCell;
use std::rc::Rc;

pub trait SignalGraph {
    fn set_carrier_frequency(&mut self, hz: f64) -> Result<(), GraphError>;

    /// Route carrier -> pulse gain -> master gain -> sink.
    fn connect(&mut self) -> Result<(), GraphError>;

    /// Pulse gain moves linearly from `from` (its value at the previous
    /// control point) to `to`, arriving at absolute time `at`.
    fn schedule_gain_ramp(&mut self, from: f32, to: f32, at: f64) -> Result<(), GraphError>;

    /// Drop every pulse gain point at or after `from_time`.
    fn cancel_scheduled_gain(&mut self, from_time: f64) -> Result<(), GraphError>;

    /// Approach `target` exponentially from `at` with the given time constant.
    fn set_master_gain(&mut self, target: f32, at: f64, time_constant: f64)
        -> Result<(), GraphError>;

    /// Stop the carrier and disconnect. Must tolerate repeated calls.
    fn release(&mut self) -> Result<(), GraphError>;
}

impl<G: SignalGraph + ?Sized> SignalGraph for Box<G> {
    fn set_carrier_frequency(&mut self, hz: f64) -> Result<(), GraphError> {
        (**self).set_carrier_frequency(hz)
    }
    fn connect(&mut self) -> Result<(), GraphError> {
        (**self).connect()
    }
    fn schedule_gain_ramp(&mut self, from: f32, to: f32, at: f64) -> Result<(), GraphError> {
        (**self).schedule_gain_ramp(from, to, at)
    }
    fn cancel_scheduled_gain(&mut self, from_time: f64) -> Result<(), GraphError> {
        (**self).cancel_scheduled_gain(from_time)
    }
    fn set_master_gain(
        &mut self,
        target: f32,
        at: f64,
        time_constant: f64,
    ) -> Result<(), GraphError> {
        (**self).set_master_gain(target, at, time_constant)
    }
    fn release(&mut self) -> Result<(), GraphError> {
        (**self).release()
    }
}

/// Every call a [`RecordingGraph`] has seen, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum GraphCall {
    SetCarrier(f64),
    Connect,
    GainRamp { from: f32, to: f32, at: f64 },
    CancelGain { from_time: f64 },
    MasterGain { target: f32, at: f64, time_constant: f64 },
    Release,
}

#[derive(Debug, Default)]
struct Recording {
    calls: Vec<GraphCall>,
    pending: Vec<ControlPoint>,
    carrier_hz: Option<f64>,
    connected: bool,
    released: bool,
    fail_connect: Option<String>,
    fail_schedules: usize,
    succeed_before_failing: usize,
}

/// In-memory graph that keeps a call log and the pulse automation still
/// pending after cancellations. Clones share state, so a handle kept outside
/// the controller sees everything the controller did.
#[derive(Clone, Debug, Default)]
pub struct RecordingGraph {
    inner: Rc<RefCell<Recording>>,
}

impl RecordingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `connect` fail with [`GraphError::Unavailable`].
    pub fn fail_connect(&self, reason: &str) {
        self.inner.borrow_mut().fail_connect = Some(reason.to_string());
    }

    /// Make the next `n` gain ramps fail with [`GraphError::Schedule`].
    pub fn fail_next_schedules(&self, n: usize) {
        self.fail_schedules_after(0, n);
    }

    /// Accept `ok` more gain ramps, then fail the `n` after them.
    pub fn fail_schedules_after(&self, ok: usize, n: usize) {
        let mut inner = self.inner.borrow_mut();
        inner.succeed_before_failing = ok;
        inner.fail_schedules = n;
    }

    pub fn calls(&self) -> Vec<GraphCall> {
        self.inner.borrow().calls.clone()
    }

    /// Pulse gain points scheduled and not cancelled, in schedule order.
    pub fn pending_points(&self) -> Vec<ControlPoint> {
        self.inner.borrow().pending.clone()
    }

    /// Anchor times of every pulse that was scheduled (cancelled or not).
    pub fn pulse_starts(&self) -> Vec<f64> {
        let inner = self.inner.borrow();
        let mut starts = Vec::new();
        let mut last_gain = 0.0_f32;
        for call in &inner.calls {
            if let GraphCall::GainRamp { from, to, at } = *call {
                if from == 0.0 && to == 0.0 && last_gain == 0.0 {
                    starts.push(at);
                }
                last_gain = to;
            }
        }
        starts
    }

    pub fn carrier_hz(&self) -> Option<f64> {
        self.inner.borrow().carrier_hz
    }

    pub fn is_connected(&self) -> bool {
        self.inner.borrow().connected
    }

    pub fn is_released(&self) -> bool {
        self.inner.borrow().released
    }

    pub fn release_count(&self) -> usize {
        self.inner
            .borrow()
            .calls
            .iter()
            .filter(|c| matches!(c, GraphCall::Release))
            .count()
    }
}

impl SignalGraph for RecordingGraph {
    fn set_carrier_frequency(&mut self, hz: f64) -> Result<(), GraphError> {
        let mut inner = self.inner.borrow_mut();
        if inner.released {
            return Err(GraphError::Released);
        }
        inner.calls.push(GraphCall::SetCarrier(hz));
        inner.carrier_hz = Some(hz);
        Ok(())
    }

    fn connect(&mut self) -> Result<(), GraphError> {
        let mut inner = self.inner.borrow_mut();
        if let Some(reason) = inner.fail_connect.clone() {
            return Err(GraphError::Unavailable(reason));
        }
        inner.calls.push(GraphCall::Connect);
        inner.connected = true;
        Ok(())
    }

    fn schedule_gain_ramp(&mut self, from: f32, to: f32, at: f64) -> Result<(), GraphError> {
        let mut inner = self.inner.borrow_mut();
        if inner.released {
            return Err(GraphError::Released);
        }
        if inner.fail_schedules > 0 {
            if inner.succeed_before_failing > 0 {
                inner.succeed_before_failing -= 1;
            } else {
                inner.fail_schedules -= 1;
                return Err(GraphError::Schedule(format!("ramp to {to} at {at:.3}")));
            }
        }
        inner.calls.push(GraphCall::GainRamp { from, to, at });
        inner.pending.push(ControlPoint::new(at, to));
        Ok(())
    }

    fn cancel_scheduled_gain(&mut self, from_time: f64) -> Result<(), GraphError> {
        let mut inner = self.inner.borrow_mut();
        if inner.released {
            return Ok(());
        }
        inner.calls.push(GraphCall::CancelGain { from_time });
        inner.pending.retain(|p| p.time < from_time);
        Ok(())
    }

    fn set_master_gain(
        &mut self,
        target: f32,
        at: f64,
        time_constant: f64,
    ) -> Result<(), GraphError> {
        let mut inner = self.inner.borrow_mut();
        if inner.released {
            return Err(GraphError::Released);
        }
        inner.calls.push(GraphCall::MasterGain {
            target,
            at,
            time_constant,
        });
        Ok(())
    }

    fn release(&mut self) -> Result<(), GraphError> {
        let mut inner = self.inner.borrow_mut();
        if inner.released {
            return Ok(());
        }
        inner.calls.push(GraphCall::Release);
        inner.released = true;
        inner.connected = false;
        inner.pending.clear();
        Ok(())
    }
}
