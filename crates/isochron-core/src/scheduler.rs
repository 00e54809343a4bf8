//! Lookahead pulse scheduler.
//!
//! Each invocation walks the session cursor forward until it is at least
//! `lookahead` ahead of the clock, emitting one envelope per beat period, and
//! asks to be invoked again after a fixed `interval`. The interval is
//! independent of the beat, so the work per invocation stays bounded and the
//! queue never runs dry as long as `interval < lookahead`.

use crate::constants::{LOOKAHEAD_SEC, SCHEDULE_INTERVAL_SEC, ZERO_BEAT_PROBE_SEC};
use crate::envelope::PulseEnvelope;
use crate::graph::SignalGraph;
use crate::program::{EndAction, Program};
use crate::session::PlaybackSession;
use crate::timeline::{beat_at, total_duration};
use log::{trace, warn};

#[derive(Clone, Debug, PartialEq)]
pub struct SchedulerConfig {
    pub lookahead: f64,
    pub interval: f64,
    pub zero_beat_probe: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookahead: LOOKAHEAD_SEC,
            interval: SCHEDULE_INTERVAL_SEC,
            zero_beat_probe: ZERO_BEAT_PROBE_SEC,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScheduleOutcome {
    /// Invoke again at `at`.
    Rearm { at: f64 },
    /// The program ran past its end with `EndAction::Stop`.
    Finished,
    /// The session was no longer running; nothing was scheduled.
    Halted,
}

#[derive(Clone, Debug, Default)]
pub struct PulseScheduler {
    pub config: SchedulerConfig,
}

impl PulseScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn run<G: SignalGraph + ?Sized>(
        &self,
        session: &mut PlaybackSession,
        program: &Program,
        graph: &mut G,
        now: f64,
    ) -> ScheduleOutcome {
        if !session.running {
            return ScheduleOutcome::Halted;
        }
        let total = total_duration(program);
        let stops = program.end_action == EndAction::Stop;
        if stops && now - session.t0 > total {
            return ScheduleOutcome::Finished;
        }

        let horizon = now + self.config.lookahead;
        let mut emitted = 0u32;
        while session.next_pulse_time < horizon {
            let elapsed = session.next_pulse_time - session.t0;
            if stops && elapsed > total {
                // nothing left to queue; termination lands once the clock gets there
                break;
            }
            let beat = beat_at(program, elapsed);
            if !(beat > 0.0) {
                session.next_pulse_time += self.config.zero_beat_probe;
                continue;
            }
            let envelope = PulseEnvelope::for_beat(session.next_pulse_time, beat);
            if self.emit(graph, &envelope, session) {
                emitted += 1;
            }
            session.next_pulse_time += envelope.period;
        }

        trace!(
            "[scheduler] session={} now={:.3} emitted={} cursor={:.3}",
            session.id,
            now,
            emitted,
            session.next_pulse_time
        );
        ScheduleOutcome::Rearm {
            at: now + self.config.interval,
        }
    }

    // A refused ramp drops the whole pulse: points already queued for it are
    // cancelled so the gate cannot hang open. The cursor still advances so
    // later pulses stay on the beat grid.
    fn emit<G: SignalGraph + ?Sized>(
        &self,
        graph: &mut G,
        envelope: &PulseEnvelope,
        session: &mut PlaybackSession,
    ) -> bool {
        let mut previous = 0.0_f32;
        for (i, point) in envelope.control_points().into_iter().enumerate() {
            if let Err(e) = graph.schedule_gain_ramp(previous, point.gain, point.time) {
                warn!(
                    "[scheduler] pulse at {:.3} not scheduled: {}",
                    envelope.start, e
                );
                session.graph_errors += 1;
                if i > 0 {
                    if let Err(e) = graph.cancel_scheduled_gain(envelope.start) {
                        warn!("[scheduler] rollback of pulse at {:.3}: {}", envelope.start, e);
                    }
                }
                return false;
            }
            previous = point.gain;
        }
        session.pulses_emitted += 1;
        true
    }
}
