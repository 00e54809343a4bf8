//! Sample-level rendition of the signal graph: a sine carrier, a pulse gain
//! lane that follows scheduled ramps, and a master gain that approaches its
//! target exponentially.
//!
//! Everything here is plain data so it can run inside a cpal callback or in
//! an offline render against a simulated clock.

use isochron_core::ControlPoint;
use std::f32::consts::TAU;

/// Beyond this disagreement between the render cursor and the clock the
/// cursor snaps back to the clock.
const RESYNC_SEC: f64 = 0.05;

/// Linear automation over timestamped points. The value before the first
/// point is `base`; after the last point it holds the last gain.
#[derive(Clone, Debug, Default)]
pub struct GainLane {
    points: Vec<ControlPoint>,
    base: f32,
}

impl GainLane {
    pub fn push(&mut self, gain: f32, at: f64) {
        let i = self.points.partition_point(|p| p.time <= at);
        self.points.insert(i, ControlPoint::new(at, gain));
    }

    pub fn cancel_from(&mut self, from_time: f64) {
        self.points.retain(|p| p.time < from_time);
    }

    pub fn value_at(&self, t: f64) -> f32 {
        let i = self.points.partition_point(|p| p.time <= t);
        if i == 0 {
            return self.base;
        }
        let prev = self.points[i - 1];
        let Some(next) = self.points.get(i) else {
            return prev.gain;
        };
        let span = next.time - prev.time;
        if span <= 0.0 {
            return next.gain;
        }
        let frac = ((t - prev.time) / span) as f32;
        prev.gain + (next.gain - prev.gain) * frac
    }

    /// Forget points that can no longer shape anything at or after `t`,
    /// keeping the one that anchors the segment `t` falls in.
    pub fn prune_before(&mut self, t: f64) {
        let i = self.points.partition_point(|p| p.time <= t);
        if i > 1 {
            self.points.drain(..i - 1);
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Exponential approach: `target + (start - target) * exp(-(t - at) / tc)`.
#[derive(Clone, Copy, Debug)]
pub struct MasterLane {
    start: f32,
    target: f32,
    at: f64,
    time_constant: f64,
}

impl MasterLane {
    pub fn new(level: f32) -> Self {
        Self {
            start: level,
            target: level,
            at: 0.0,
            time_constant: 0.0,
        }
    }

    pub fn value_at(&self, t: f64) -> f32 {
        if t <= self.at {
            return self.start;
        }
        if self.time_constant <= 0.0 {
            return self.target;
        }
        let k = (-(t - self.at) / self.time_constant).exp() as f32;
        self.target + (self.start - self.target) * k
    }

    pub fn retarget(&mut self, target: f32, at: f64, time_constant: f64) {
        self.start = self.value_at(at);
        self.target = target;
        self.at = at;
        self.time_constant = time_constant;
    }
}

#[derive(Clone, Debug)]
pub struct PulseVoice {
    sample_rate: f32,
    carrier_hz: f32,
    phase: f32,
    pub pulse: GainLane,
    pub master: MasterLane,
    connected: bool,
    cursor: Option<f64>,
}

impl PulseVoice {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            carrier_hz: isochron_core::DEFAULT_CARRIER_HZ as f32,
            phase: 0.0,
            pulse: GainLane::default(),
            master: MasterLane::new(0.0),
            connected: false,
            cursor: None,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn set_carrier(&mut self, hz: f32) {
        self.carrier_hz = hz;
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Fill interleaved `data` starting at clock time `now`. Silence while
    /// disconnected. Returns the time just past the last rendered frame.
    pub fn render(&mut self, now: f64, data: &mut [f32], channels: usize) -> f64 {
        let channels = channels.max(1);
        let start = match self.cursor {
            Some(c) if (c - now).abs() < RESYNC_SEC => c,
            _ => now,
        };
        let dt = 1.0 / self.sample_rate as f64;
        let phase_inc = TAU * self.carrier_hz / self.sample_rate;

        let mut t = start;
        for frame in data.chunks_mut(channels) {
            let sample = if self.connected {
                let gain = self.pulse.value_at(t) * self.master.value_at(t);
                let s = self.phase.sin() * gain;
                self.phase += phase_inc;
                if self.phase > TAU {
                    self.phase -= TAU;
                }
                s
            } else {
                0.0
            };
            frame.fill(sample);
            t += dt;
        }
        self.pulse.prune_before(t);
        self.cursor = Some(t);
        t
    }
}
