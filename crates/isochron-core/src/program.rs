//! The beat program a session plays: a start beat, an ordered list of stages
//! and what to do once the last stage has been reached.
//!
//! Programs arrive from configuration (JSON files, CLI flags, a web page) and
//! are validated once at load time. The timeline and scheduler only apply the
//! numeric guards they need and otherwise trust a validated program.

use crate::constants::{DEFAULT_CARRIER_HZ, DEFAULT_START_BEAT_HZ};
use crate::error::ProgramError;
use serde::{Deserialize, Serialize};

/// One segment of a program: the beat glides linearly to `target_beat_hz`
/// over `duration_seconds`. A zero duration is an instant jump.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub target_beat_hz: f64,
    pub duration_seconds: f64,
}

impl Stage {
    pub fn new(target_beat_hz: f64, duration_seconds: f64) -> Self {
        Self {
            target_beat_hz,
            duration_seconds,
        }
    }

    /// Parse the compact `<beat>:<seconds>` or `<beat>@<duration>` form, where
    /// the duration may carry an `s`, `m` or `h` suffix (`"4:1800"`, `"4@30m"`).
    pub fn parse(text: &str) -> Result<Self, ProgramError> {
        let syntax = || ProgramError::StageSyntax(text.to_string());
        let (beat, duration) = text
            .split_once(':')
            .or_else(|| text.split_once('@'))
            .ok_or_else(syntax)?;
        let beat: f64 = beat.trim().parse().map_err(|_| syntax())?;
        let duration = parse_duration(duration.trim()).ok_or_else(syntax)?;
        Ok(Self::new(beat, duration))
    }
}

fn parse_duration(text: &str) -> Option<f64> {
    let (number, scale) = match text.char_indices().last()? {
        (i, 'h') => (&text[..i], 3600.0),
        (i, 'm') => (&text[..i], 60.0),
        (i, 's') => (&text[..i], 1.0),
        _ => (text, 1.0),
    };
    number.trim().parse::<f64>().ok().map(|n| n * scale)
}

/// Behavior once elapsed time passes the end of the last stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndAction {
    /// Keep pulsing at the final beat indefinitely.
    #[default]
    Hold,
    /// End the session.
    Stop,
}

impl std::str::FromStr for EndAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hold" => Ok(EndAction::Hold),
            "stop" => Ok(EndAction::Stop),
            other => Err(format!("unknown end action `{other}` (expected hold or stop)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub start_beat_hz: f64,
    #[serde(default)]
    pub stages: Vec<Stage>,
    #[serde(default = "default_carrier")]
    pub carrier_hz: f64,
    #[serde(default)]
    pub end_action: EndAction,
}

fn default_carrier() -> f64 {
    DEFAULT_CARRIER_HZ
}

impl Default for Program {
    fn default() -> Self {
        Self {
            start_beat_hz: DEFAULT_START_BEAT_HZ,
            stages: Vec::new(),
            carrier_hz: DEFAULT_CARRIER_HZ,
            end_action: EndAction::Hold,
        }
    }
}

pub const PRESET_NAMES: &[&str] = &["relax", "focus", "sleep"];

impl Program {
    pub fn new(start_beat_hz: f64, stages: Vec<Stage>) -> Self {
        Self {
            start_beat_hz,
            stages,
            ..Self::default()
        }
    }

    pub fn with_carrier(mut self, carrier_hz: f64) -> Self {
        self.carrier_hz = carrier_hz;
        self
    }

    pub fn with_end_action(mut self, end_action: EndAction) -> Self {
        self.end_action = end_action;
        self
    }

    /// Reject programs the scheduler must never see: non-finite numbers,
    /// negative durations, a non-positive start beat, and a 0 Hz target
    /// anywhere but the final stage.
    pub fn validate(&self) -> Result<(), ProgramError> {
        if !(self.start_beat_hz.is_finite() && self.start_beat_hz > 0.0) {
            return Err(ProgramError::StartBeat(self.start_beat_hz));
        }
        if !(self.carrier_hz.is_finite() && self.carrier_hz > 0.0) {
            return Err(ProgramError::Carrier(self.carrier_hz));
        }
        let last = self.stages.len().saturating_sub(1);
        for (index, stage) in self.stages.iter().enumerate() {
            let value = stage.duration_seconds;
            if !(value.is_finite() && value >= 0.0) {
                return Err(ProgramError::StageDuration { index, value });
            }
            let value = stage.target_beat_hz;
            if !(value.is_finite() && value >= 0.0) {
                return Err(ProgramError::StageBeat { index, value });
            }
            if value == 0.0 && index != last {
                return Err(ProgramError::ZeroBeatNotTerminal { index });
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON program.
    pub fn from_json_str(json: &str) -> Result<Self, ProgramError> {
        let program: Program =
            serde_json::from_str(json).map_err(|e| ProgramError::Json(e.to_string()))?;
        program.validate()?;
        Ok(program)
    }

    pub fn to_json_string(&self) -> Result<String, ProgramError> {
        serde_json::to_string_pretty(self).map_err(|e| ProgramError::Json(e.to_string()))
    }

    /// Built-in programs, see [`PRESET_NAMES`].
    pub fn preset(name: &str) -> Result<Self, ProgramError> {
        let program = match name {
            // alpha down into theta, then stay there
            "relax" => Program::new(10.0, vec![Stage::new(7.0, 300.0), Stage::new(4.0, 1200.0)]),
            // up into low beta, hold for twenty minutes, done
            "focus" => Program::new(10.0, vec![Stage::new(14.0, 300.0), Stage::new(14.0, 1200.0)])
                .with_end_action(EndAction::Stop),
            // theta to delta, fading to rest
            "sleep" => Program::new(
                7.0,
                vec![
                    Stage::new(4.0, 900.0),
                    Stage::new(2.0, 900.0),
                    Stage::new(0.0, 300.0),
                ],
            )
            .with_carrier(150.0)
            .with_end_action(EndAction::Stop),
            other => return Err(ProgramError::UnknownPreset(other.to_string())),
        };
        Ok(program)
    }
}
