//! Piecewise-linear beat timeline over a [`Program`].
//!
//! Every function here is pure: a renderer may call them at any rate while a
//! session is playing.

use crate::program::Program;

/// Sum of all stage durations, in seconds.
pub fn total_duration(program: &Program) -> f64 {
    program.stages.iter().map(|s| s.duration_seconds).sum()
}

/// Target beat frequency at `elapsed_seconds` into the program.
///
/// Before the start this is the start beat; past the end it is the final
/// stage's target (the hold value, whatever the end action).
pub fn beat_at(program: &Program, elapsed_seconds: f64) -> f64 {
    if elapsed_seconds <= 0.0 {
        return program.start_beat_hz;
    }
    let mut previous = program.start_beat_hz;
    let mut stage_start = 0.0;
    for stage in &program.stages {
        let stage_end = stage_start + stage.duration_seconds;
        if elapsed_seconds < stage_end {
            // zero-length stages never divide; the jump lands on the next instant
            let fraction = if stage.duration_seconds > 0.0 {
                (elapsed_seconds - stage_start) / stage.duration_seconds
            } else {
                0.0
            };
            return previous + (stage.target_beat_hz - previous) * fraction;
        }
        previous = stage.target_beat_hz;
        stage_start = stage_end;
    }
    hold_beat(program)
}

/// The beat held after the last stage.
pub fn hold_beat(program: &Program) -> f64 {
    program
        .stages
        .last()
        .map_or(program.start_beat_hz, |s| s.target_beat_hz)
}

/// Index of the stage playing at `elapsed_seconds`, or `None` outside
/// `[0, total_duration)`.
pub fn stage_at(program: &Program, elapsed_seconds: f64) -> Option<usize> {
    if elapsed_seconds < 0.0 {
        return None;
    }
    let mut stage_end = 0.0;
    for (index, stage) in program.stages.iter().enumerate() {
        stage_end += stage.duration_seconds;
        if elapsed_seconds < stage_end {
            return Some(index);
        }
    }
    None
}

/// Seconds left until the end of the last stage, never negative.
pub fn remaining(program: &Program, elapsed_seconds: f64) -> f64 {
    (total_duration(program) - elapsed_seconds.max(0.0)).max(0.0)
}
