use crate::graph::{OnsetLog, VoiceGraph};
use crate::voice::PulseVoice;
use isochron_core::{
    beat_at, total_duration, Clock, EndAction, GraphError, ManualClock, PlayState, PlaybackController,
    PlaybackStatus, Program, Readout, SchedulerConfig, SignalGraph,
};
use log::{info, warn};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

/// Offline renders of holding programs stop this long after the last stage.
pub const HOLD_TAIL_SEC: f64 = 10.0;
pub const OFFLINE_SAMPLE_RATE: f32 = 8_000.0;

// bounds for the host loop sleep
const MIN_SLEEP_SEC: f64 = 0.001;
const MAX_SLEEP_SEC: f64 = 0.1;

#[derive(Clone, Debug)]
pub struct RunOptions {
    pub max_seconds: Option<f64>,
    pub status_every: f64,
}

/// Drive `controller` in real time on the current thread until playback
/// ends, printing a status line every `status_every` seconds. A failed start
/// comes back as `PlaybackStatus::Failed`.
pub fn run_realtime<C: Clock, G: SignalGraph>(
    controller: &mut PlaybackController<C, G>,
    program: Program,
    options: &RunOptions,
) -> anyhow::Result<PlaybackStatus> {
    let stages = program.stages.len();
    if let Err(e) = controller.start(program) {
        warn!("[runner] {e}");
        return Ok(controller.status().clone());
    }
    let mut next_status = controller.clock().now();

    while controller.state() != PlayState::Stopped {
        controller.tick();
        let now = controller.clock().now();

        if let Some(max) = options.max_seconds {
            if controller.is_running() && controller.elapsed() >= max {
                info!("[runner] reached --max-seconds {max}");
                controller.stop();
            }
        }
        if controller.is_running() && now >= next_status {
            println!("{}", status_line(&controller.readout(), stages));
            next_status = now + options.status_every.max(MIN_SLEEP_SEC);
        }

        let wake = controller
            .next_deadline()
            .unwrap_or(now + MAX_SLEEP_SEC)
            .min(next_status);
        let nap = (wake - now).clamp(MIN_SLEEP_SEC, MAX_SLEEP_SEC);
        thread::sleep(Duration::from_secs_f64(nap));
    }
    Ok(controller.status().clone())
}

/// What an offline render produced.
#[derive(Clone, Debug)]
pub struct OfflineReport {
    pub status: PlaybackStatus,
    /// Simulated seconds rendered, including the release tail.
    pub rendered_seconds: f64,
    /// `(start time, beat Hz)` for every pulse that was scheduled.
    pub onsets: Vec<(f64, f64)>,
    pub peak: f32,
    pub rms: f32,
}

impl OfflineReport {
    pub fn pulses(&self) -> usize {
        self.onsets.len()
    }
}

/// Play `program` against a simulated clock through the same controller,
/// scheduler and voice the device path uses, rendering mono samples as
/// simulated time advances.
pub fn render_offline(
    program: Program,
    config: SchedulerConfig,
    volume: f32,
    muted: bool,
    max_seconds: Option<f64>,
) -> anyhow::Result<OfflineReport> {
    let clock = ManualClock::new(0.0);
    let onsets: OnsetLog = Arc::new(Mutex::new(Vec::new()));
    let voice_slot: Rc<RefCell<Option<Arc<Mutex<PulseVoice>>>>> = Rc::new(RefCell::new(None));

    let factory = {
        let onsets = Arc::clone(&onsets);
        let voice_slot = Rc::clone(&voice_slot);
        move |_: &Program| {
            let graph = VoiceGraph::new(OFFLINE_SAMPLE_RATE).recording_onsets(Arc::clone(&onsets));
            *voice_slot.borrow_mut() = Some(graph.voice());
            Ok::<_, GraphError>(graph)
        }
    };
    let mut controller = PlaybackController::new(clock.clone(), factory)
        .with_scheduler_config(config.clone())
        .with_volume(volume);
    controller.set_muted(muted);

    let total = total_duration(&program);
    let horizon = max_seconds.unwrap_or(match program.end_action {
        EndAction::Stop => f64::INFINITY,
        EndAction::Hold => total + HOLD_TAIL_SEC,
    });
    controller.start(program.clone())?;
    let voice = voice_slot
        .borrow_mut()
        .take()
        .ok_or_else(|| anyhow::anyhow!("start did not build a voice"))?;

    let mut meter = Meter::default();
    let mut rendered_until = 0.0;
    let mut buffer = Vec::new();
    while controller.state() != PlayState::Stopped {
        let now = clock.now();
        if controller.is_running() && controller.elapsed() >= horizon {
            controller.stop();
        }
        let next = controller.next_deadline().unwrap_or(now + config.interval);
        clock.set(next);
        controller.tick();

        let frames = ((clock.now() - rendered_until) * OFFLINE_SAMPLE_RATE as f64).round() as usize;
        if frames > 0 {
            buffer.resize(frames, 0.0);
            let mut guard = voice.lock().unwrap_or_else(PoisonError::into_inner);
            rendered_until = guard.render(rendered_until, &mut buffer, 1);
            meter.add(&buffer);
        }
    }

    let starts = onsets.lock().unwrap_or_else(PoisonError::into_inner).clone();
    let onsets = starts
        .into_iter()
        .map(|t| (t, beat_at(&program, t)))
        .collect();
    Ok(OfflineReport {
        status: controller.status().clone(),
        rendered_seconds: rendered_until,
        onsets,
        peak: meter.peak,
        rms: meter.rms(),
    })
}

#[derive(Default)]
struct Meter {
    peak: f32,
    sum_sq: f64,
    count: usize,
}

impl Meter {
    fn add(&mut self, samples: &[f32]) {
        for &s in samples {
            self.peak = self.peak.max(s.abs());
            self.sum_sq += (s as f64) * (s as f64);
        }
        self.count += samples.len();
    }

    fn rms(&self) -> f32 {
        if self.count == 0 {
            0.0
        } else {
            (self.sum_sq / self.count as f64).sqrt() as f32
        }
    }
}

/// `mm:ss`, or `h:mm:ss` from an hour up.
pub fn format_clock(seconds: f64) -> String {
    let s = seconds.max(0.0).floor() as u64;
    let (h, m, s) = (s / 3600, (s / 60) % 60, s % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

pub fn status_line(readout: &Readout, stage_count: usize) -> String {
    let time = if readout.total > 0.0 {
        format!(
            "{} / {}",
            format_clock(readout.elapsed),
            format_clock(readout.total)
        )
    } else {
        format_clock(readout.elapsed)
    };
    let stage = match readout.stage {
        Some(i) => format!("stage {}/{}", i + 1, stage_count),
        None if readout.state == PlayState::Playing => "hold".to_string(),
        None => "-".to_string(),
    };
    let beat = readout
        .beat_hz
        .map_or_else(|| "  -.-- Hz".to_string(), |b| format!("{b:6.2} Hz"));
    format!("{time}  {stage}  beat {beat}  {}", readout.status)
}
