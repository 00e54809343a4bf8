//! Playback lifecycle: `Stopped -> Starting -> Playing -> Stopping -> Stopped`.
//!
//! The controller owns the clock, the active session and its signal graph.
//! It never blocks and never spawns: the host calls [`PlaybackController::tick`]
//! whenever [`PlaybackController::next_deadline`] passes (a timer, an audio
//! thread loop, a `setTimeout` chain), which fires the scheduler's re-arm or
//! completes a pending release.

use crate::clock::Clock;
use crate::constants::{
    DEFAULT_MASTER_GAIN, FADE_TIME_CONSTANT_SEC, RELEASE_DELAY_SEC, SILENT_GAIN,
};
use crate::error::{GraphError, StartError};
use crate::graph::SignalGraph;
use crate::program::Program;
use crate::scheduler::{PulseScheduler, ScheduleOutcome, SchedulerConfig};
use crate::session::PlaybackSession;
use crate::timeline::{beat_at, stage_at, total_duration};
use log::{debug, info, warn};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayState {
    Stopped,
    Starting,
    Playing,
    Stopping,
}

/// What observers are told about the last lifecycle change.
#[derive(Clone, Debug, PartialEq)]
pub enum PlaybackStatus {
    Idle,
    Playing,
    /// Stopped by the user.
    Stopped,
    /// Reached the end of a program with `EndAction::Stop`.
    Finished,
    /// `start` failed; carries the cause.
    Failed(String),
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackStatus::Idle => write!(f, "idle"),
            PlaybackStatus::Playing => write!(f, "playing"),
            PlaybackStatus::Stopped => write!(f, "stopped"),
            PlaybackStatus::Finished => write!(f, "finished"),
            PlaybackStatus::Failed(cause) => write!(f, "could not start: {cause}"),
        }
    }
}

/// Snapshot for a renderer or status line.
#[derive(Clone, Debug, PartialEq)]
pub struct Readout {
    pub state: PlayState,
    pub status: PlaybackStatus,
    pub elapsed: f64,
    pub beat_hz: Option<f64>,
    pub stage: Option<usize>,
    pub total: f64,
}

pub type GraphFactory<G> = Box<dyn FnMut(&Program) -> Result<G, GraphError>>;

struct Active<G> {
    session: PlaybackSession,
    program: Program,
    graph: G,
    release_at: Option<f64>,
}

pub struct PlaybackController<C: Clock, G: SignalGraph> {
    clock: C,
    factory: GraphFactory<G>,
    scheduler: PulseScheduler,
    state: PlayState,
    status: PlaybackStatus,
    active: Option<Active<G>>,
    muted: bool,
    volume: f32,
    sessions_started: u64,
}

impl<C: Clock, G: SignalGraph> PlaybackController<C, G> {
    pub fn new(
        clock: C,
        factory: impl FnMut(&Program) -> Result<G, GraphError> + 'static,
    ) -> Self {
        Self {
            clock,
            factory: Box::new(factory),
            scheduler: PulseScheduler::default(),
            state: PlayState::Stopped,
            status: PlaybackStatus::Idle,
            active: None,
            muted: false,
            volume: DEFAULT_MASTER_GAIN,
            sessions_started: 0,
        }
    }

    pub fn with_scheduler_config(mut self, config: SchedulerConfig) -> Self {
        self.scheduler = PulseScheduler::new(config);
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }

    pub fn start(&mut self, program: Program) -> Result<(), StartError> {
        if self.state == PlayState::Playing {
            debug!("[controller] start ignored, already playing");
            return Ok(());
        }
        if self.state == PlayState::Stopping {
            self.finish_release();
        }
        if let Err(e) = program.validate() {
            warn!("[controller] rejected program: {e}");
            self.status = PlaybackStatus::Failed(e.to_string());
            return Err(e.into());
        }

        self.state = PlayState::Starting;
        let now = self.clock.now();
        let graph = match self.build_graph(&program, now) {
            Ok(g) => g,
            Err(e) => {
                warn!("[controller] could not start: {e}");
                self.state = PlayState::Stopped;
                self.status = PlaybackStatus::Failed(e.to_string());
                return Err(e.into());
            }
        };

        self.sessions_started += 1;
        let session = PlaybackSession::new(self.sessions_started, now, self.muted);
        info!(
            "[controller] session {} started at {:.3}: {} stages, {:.1}s, carrier {:.1} Hz",
            session.id,
            now,
            program.stages.len(),
            total_duration(&program),
            program.carrier_hz
        );
        self.active = Some(Active {
            session,
            program,
            graph,
            release_at: None,
        });
        self.state = PlayState::Playing;
        self.status = PlaybackStatus::Playing;
        self.schedule(now);
        Ok(())
    }

    fn build_graph(&mut self, program: &Program, now: f64) -> Result<G, GraphError> {
        let mut graph = (self.factory)(program)?;
        let level = self.master_level();
        if let Err(e) = wire(&mut graph, program.carrier_hz, level, now) {
            if let Err(release_err) = graph.release() {
                debug!("[controller] release after failed start: {release_err}");
            }
            return Err(e);
        }
        Ok(graph)
    }

    fn schedule(&mut self, now: f64) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let outcome =
            self.scheduler
                .run(&mut active.session, &active.program, &mut active.graph, now);
        match outcome {
            ScheduleOutcome::Rearm { at } => active.session.arm(at),
            ScheduleOutcome::Finished => {
                info!("[controller] session {} finished", active.session.id);
                self.begin_stop(PlaybackStatus::Finished);
            }
            ScheduleOutcome::Halted => {}
        }
    }

    /// Fire whatever is due: the scheduler re-arm while playing, the graph
    /// release while stopping.
    pub fn tick(&mut self) {
        let now = self.clock.now();
        match self.state {
            PlayState::Playing => {
                let due = self
                    .active
                    .as_mut()
                    .filter(|a| a.session.rearm_due(now))
                    .map(|a| a.session.cancel_rearm())
                    .is_some();
                if due {
                    self.schedule(now);
                }
            }
            PlayState::Stopping => {
                let due = self
                    .active
                    .as_ref()
                    .and_then(|a| a.release_at)
                    .map_or(true, |at| now >= at);
                if due {
                    self.finish_release();
                }
            }
            PlayState::Stopped | PlayState::Starting => {}
        }
    }

    /// User stop. Ignored unless playing.
    pub fn stop(&mut self) {
        if self.state != PlayState::Playing {
            debug!("[controller] stop ignored in {:?}", self.state);
            return;
        }
        self.begin_stop(PlaybackStatus::Stopped);
    }

    fn begin_stop(&mut self, status: PlaybackStatus) {
        let now = self.clock.now();
        if let Some(active) = self.active.as_mut() {
            active.session.running = false;
            active.session.cancel_rearm();
            if let Err(e) = active.graph.cancel_scheduled_gain(now) {
                warn!("[controller] cancel pending pulses: {e}");
            }
            if let Err(e) = active
                .graph
                .set_master_gain(SILENT_GAIN, now, FADE_TIME_CONSTANT_SEC)
            {
                warn!("[controller] fade out: {e}");
            }
            active.release_at = Some(now + RELEASE_DELAY_SEC);
            info!(
                "[controller] session {} stopping ({}) after {} pulses",
                active.session.id, status, active.session.pulses_emitted
            );
        }
        self.state = PlayState::Stopping;
        self.status = status;
    }

    fn finish_release(&mut self) {
        if let Some(mut active) = self.active.take() {
            if let Err(e) = active.graph.release() {
                warn!("[controller] release: {e}");
            }
            info!("[controller] session {} released", active.session.id);
        }
        self.state = PlayState::Stopped;
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.apply_master_level();
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.apply_master_level();
    }

    fn master_level(&self) -> f32 {
        if self.muted {
            SILENT_GAIN
        } else {
            self.volume.max(SILENT_GAIN)
        }
    }

    // Only the master stage moves; pulses keep being scheduled underneath.
    fn apply_master_level(&mut self) {
        if self.state != PlayState::Playing {
            return;
        }
        let level = self.master_level();
        let now = self.clock.now();
        if let Some(active) = self.active.as_mut() {
            active.session.muted = self.muted;
            if let Err(e) = active
                .graph
                .set_master_gain(level, now, FADE_TIME_CONSTANT_SEC)
            {
                warn!("[controller] master gain: {e}");
            }
        }
    }

    /// Seconds since start while playing, otherwise 0.
    pub fn elapsed(&self) -> f64 {
        match (&self.active, self.state) {
            (Some(active), PlayState::Playing) => active.session.elapsed_at(self.clock.now()),
            _ => 0.0,
        }
    }

    pub fn current_beat(&self) -> Option<f64> {
        self.playing_program().map(|p| beat_at(p, self.elapsed()))
    }

    pub fn current_stage(&self) -> Option<usize> {
        self.playing_program().and_then(|p| stage_at(p, self.elapsed()))
    }

    fn playing_program(&self) -> Option<&Program> {
        match self.state {
            PlayState::Playing => self.active.as_ref().map(|a| &a.program),
            _ => None,
        }
    }

    pub fn readout(&self) -> Readout {
        Readout {
            state: self.state,
            status: self.status.clone(),
            elapsed: self.elapsed(),
            beat_hz: self.current_beat(),
            stage: self.current_stage(),
            total: self.playing_program().map_or(0.0, total_duration),
        }
    }

    /// Earliest clock time at which `tick` has work to do.
    pub fn next_deadline(&self) -> Option<f64> {
        let active = self.active.as_ref()?;
        match self.state {
            PlayState::Playing => active.session.rearm_at,
            PlayState::Stopping => active.release_at,
            PlayState::Stopped | PlayState::Starting => None,
        }
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn status(&self) -> &PlaybackStatus {
        &self.status
    }

    pub fn is_running(&self) -> bool {
        self.state == PlayState::Playing
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.active.as_ref().map(|a| &a.session)
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

fn wire<G: SignalGraph>(graph: &mut G, carrier_hz: f64, level: f32, now: f64) -> Result<(), GraphError> {
    graph.set_carrier_frequency(carrier_hz)?;
    graph.connect()?;
    graph.set_master_gain(level, now, FADE_TIME_CONSTANT_SEC)
}

impl<C: Clock, G: SignalGraph> Drop for PlaybackController<C, G> {
    fn drop(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active.session.running = false;
            if let Err(e) = active.graph.release() {
                debug!("[controller] release on drop: {e}");
            }
        }
    }
}
