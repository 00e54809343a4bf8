use crate::constants::MIN_RAMP_SEC;
use smallvec::SmallVec;

/// One gain automation point on the graph's clock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlPoint {
    pub time: f64,
    pub gain: f32,
}

impl ControlPoint {
    pub fn new(time: f64, gain: f32) -> Self {
        Self { time, gain }
    }
}

/// Gain shape of a single isochronic pulse: a symmetric triangle occupying
/// the first half of the beat period (50% duty cycle), silent for the rest.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PulseEnvelope {
    pub start: f64,
    pub period: f64,
}

impl PulseEnvelope {
    /// Periods are floored at `2 * MIN_RAMP_SEC`: the gate never gets
    /// shorter than `MIN_RAMP_SEC` and the cursor always moves forward.
    pub fn for_beat(start: f64, beat_hz: f64) -> Self {
        Self {
            start,
            period: (1.0 / beat_hz).max(2.0 * MIN_RAMP_SEC),
        }
    }

    /// Gate length, never negative.
    pub fn pulse_duration(&self) -> f64 {
        (self.period * 0.5).max(0.0)
    }

    pub fn end(&self) -> f64 {
        self.start + self.pulse_duration()
    }

    /// `(start, 0) -> (start + d/2, 1) -> (start + d, 0)`
    pub fn control_points(&self) -> SmallVec<[ControlPoint; 3]> {
        let d = self.pulse_duration();
        smallvec::smallvec![
            ControlPoint::new(self.start, 0.0),
            ControlPoint::new(self.start + d * 0.5, 1.0),
            ControlPoint::new(self.start + d, 0.0),
        ]
    }
}
