// Scheduling and playback tuning constants shared by the native and web hosts.

// Scheduler
pub const LOOKAHEAD_SEC: f64 = 0.2; // pulses are queued at least this far ahead of the clock
pub const SCHEDULE_INTERVAL_SEC: f64 = 0.1; // re-arm period, independent of the pulse period
pub const ZERO_BEAT_PROBE_SEC: f64 = 0.5; // cursor step while the beat rests at 0 Hz

// Envelope
pub const MIN_RAMP_SEC: f64 = 0.001; // below this a ramp is effectively a step

// Output stage
pub const DEFAULT_CARRIER_HZ: f64 = 200.0;
pub const DEFAULT_MASTER_GAIN: f32 = 0.5;
pub const SILENT_GAIN: f32 = 0.0001; // fade target; exponential approaches never reach 0
pub const FADE_TIME_CONSTANT_SEC: f64 = 0.05;
pub const RELEASE_DELAY_SEC: f64 = 0.3; // ~6 time constants after the fade starts

// Program defaults
pub const DEFAULT_START_BEAT_HZ: f64 = 10.0;
