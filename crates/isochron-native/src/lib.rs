pub mod cli;
pub mod graph;
pub mod runner;
#[cfg(feature = "audio")]
pub mod synth;
pub mod voice;

pub use cli::Cli;
pub use graph::{OnsetLog, VoiceGraph};
pub use runner::{format_clock, render_offline, run_realtime, status_line, OfflineReport, RunOptions};
#[cfg(feature = "audio")]
pub use synth::CpalGraph;
pub use voice::{GainLane, MasterLane, PulseVoice};
