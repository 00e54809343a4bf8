/// State owned by one playback run, from `start` until the graph is released.
///
/// The scheduler's cursor lives here rather than in a closure so a session
/// can be inspected and stepped deterministically.
#[derive(Clone, Debug)]
pub struct PlaybackSession {
    pub id: u64,
    /// Clock reading at start; elapsed program time is measured from here.
    pub t0: f64,
    /// Cleared by stop; a pending re-arm that finds it false does nothing.
    pub running: bool,
    pub muted: bool,
    /// Anchor time of the next pulse (or probe while the beat rests at 0 Hz).
    pub next_pulse_time: f64,
    /// Pending deferred scheduler invocation, if armed.
    pub rearm_at: Option<f64>,
    pub pulses_emitted: u64,
    pub graph_errors: u64,
}

impl PlaybackSession {
    pub fn new(id: u64, t0: f64, muted: bool) -> Self {
        Self {
            id,
            t0,
            running: true,
            muted,
            next_pulse_time: t0,
            rearm_at: None,
            pulses_emitted: 0,
            graph_errors: 0,
        }
    }

    pub fn elapsed_at(&self, now: f64) -> f64 {
        (now - self.t0).max(0.0)
    }

    pub fn arm(&mut self, at: f64) {
        self.rearm_at = Some(at);
    }

    /// Drop the pending invocation. Cancelling twice, or after it fired, is fine.
    pub fn cancel_rearm(&mut self) {
        self.rearm_at = None;
    }

    /// True when a re-arm is pending and due at `now`.
    pub fn rearm_due(&self, now: f64) -> bool {
        self.rearm_at.map_or(false, |at| now >= at)
    }
}
