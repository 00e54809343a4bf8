use anyhow::{bail, Context};
use clap::Parser;
use isochron_core::{EndAction, Program, SchedulerConfig, Stage, PRESET_NAMES};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "isochron")]
#[command(about = "Isochronic pulse player: glide a beat frequency through a staged program")]
pub struct Cli {
    /// JSON program file ({"startBeatHz", "stages": [{"targetBeatHz", "durationSeconds"}], ...})
    #[arg(long, conflicts_with = "preset")]
    pub program: Option<PathBuf>,

    /// Built-in program: relax, focus or sleep
    #[arg(long)]
    pub preset: Option<String>,

    /// Beat frequency at the start of the program (Hz)
    #[arg(long)]
    pub start_beat: Option<f64>,

    /// Stage as <beat>:<seconds> or <beat>@<duration> (e.g. 4@30m); repeatable
    #[arg(long = "stage", value_parser = parse_stage)]
    pub stages: Vec<Stage>,

    /// Carrier tone frequency (Hz)
    #[arg(long)]
    pub carrier: Option<f64>,

    /// What happens after the last stage: hold or stop
    #[arg(long)]
    pub end_action: Option<EndAction>,

    /// Master volume, 0.0 to 1.0
    #[arg(long, default_value_t = isochron_core::DEFAULT_MASTER_GAIN)]
    pub volume: f32,

    /// Start muted (pulses are still scheduled)
    #[arg(long)]
    pub muted: bool,

    /// Scheduler lookahead window (seconds)
    #[arg(long, default_value_t = isochron_core::LOOKAHEAD_SEC)]
    pub lookahead: f64,

    /// Scheduler re-arm interval (seconds); must be shorter than the lookahead
    #[arg(long, default_value_t = isochron_core::SCHEDULE_INTERVAL_SEC)]
    pub interval: f64,

    /// Stop after this many seconds even if the program holds
    #[arg(long)]
    pub max_seconds: Option<f64>,

    /// Render the program against a simulated clock and print a summary
    #[arg(long)]
    pub offline: bool,

    /// With --offline, print every pulse start and beat
    #[arg(long, requires = "offline")]
    pub dump_pulses: bool,

    /// Print the resolved program as JSON and exit
    #[arg(long)]
    pub print_program: bool,

    /// Seconds between status lines while playing
    #[arg(long, default_value_t = 1.0)]
    pub status_every: f64,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_stage(text: &str) -> Result<Stage, String> {
    Stage::parse(text).map_err(|e| e.to_string())
}

impl Cli {
    /// Resolve the program from a file, a preset or the stage flags, then
    /// apply the carrier / end-action overrides.
    pub fn program(&self) -> anyhow::Result<Program> {
        let mut program = if let Some(path) = &self.program {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading program {}", path.display()))?;
            Program::from_json_str(&json)
                .with_context(|| format!("parsing program {}", path.display()))?
        } else if let Some(name) = &self.preset {
            Program::preset(name)
                .with_context(|| format!("available presets: {}", PRESET_NAMES.join(", ")))?
        } else {
            Program::new(
                self.start_beat.unwrap_or(isochron_core::DEFAULT_START_BEAT_HZ),
                self.stages.clone(),
            )
        };

        if self.program.is_some() || self.preset.is_some() {
            if let Some(beat) = self.start_beat {
                program.start_beat_hz = beat;
            }
            if !self.stages.is_empty() {
                program.stages = self.stages.clone();
            }
        }
        if let Some(carrier) = self.carrier {
            program.carrier_hz = carrier;
        }
        if let Some(end) = self.end_action {
            program.end_action = end;
        }
        program.validate()?;
        Ok(program)
    }

    pub fn scheduler_config(&self) -> anyhow::Result<SchedulerConfig> {
        if !(self.lookahead > 0.0 && self.interval > 0.0) {
            bail!("lookahead and interval must be positive");
        }
        if self.interval >= self.lookahead {
            bail!(
                "interval ({}s) must be shorter than the lookahead ({}s) or pulses will gap",
                self.interval,
                self.lookahead
            );
        }
        Ok(SchedulerConfig {
            lookahead: self.lookahead,
            interval: self.interval,
            ..SchedulerConfig::default()
        })
    }
}
