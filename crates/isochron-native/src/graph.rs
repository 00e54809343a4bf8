use crate::voice::PulseVoice;
use isochron_core::{GraphError, SignalGraph};
use log::debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Pulse start times, shared so they outlive the graph that wrote them.
pub type OnsetLog = Arc<Mutex<Vec<f64>>>;

/// [`SignalGraph`] over a shared [`PulseVoice`]. The audio callback (or an
/// offline render loop) holds the other end of the `Arc`.
pub struct VoiceGraph {
    voice: Arc<Mutex<PulseVoice>>,
    onsets: Option<OnsetLog>,
    pulses: usize,
    released: bool,
}

impl VoiceGraph {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            voice: Arc::new(Mutex::new(PulseVoice::new(sample_rate))),
            onsets: None,
            pulses: 0,
            released: false,
        }
    }

    /// Append every pulse start to `log`.
    pub fn recording_onsets(mut self, log: OnsetLog) -> Self {
        self.onsets = Some(log);
        self
    }

    pub fn voice(&self) -> Arc<Mutex<PulseVoice>> {
        Arc::clone(&self.voice)
    }

    pub fn pulses(&self) -> usize {
        self.pulses
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn lock(&self) -> MutexGuard<'_, PulseVoice> {
        self.voice.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SignalGraph for VoiceGraph {
    fn set_carrier_frequency(&mut self, hz: f64) -> Result<(), GraphError> {
        if self.released {
            return Err(GraphError::Released);
        }
        debug!("[graph] carrier {hz:.1} Hz");
        self.lock().set_carrier(hz as f32);
        Ok(())
    }

    fn connect(&mut self) -> Result<(), GraphError> {
        if self.released {
            return Err(GraphError::Released);
        }
        self.lock().set_connected(true);
        Ok(())
    }

    fn schedule_gain_ramp(&mut self, from: f32, to: f32, at: f64) -> Result<(), GraphError> {
        if self.released {
            return Err(GraphError::Released);
        }
        // a flat ramp from silence is the anchor of a new pulse
        if from == 0.0 && to == 0.0 {
            self.pulses += 1;
            if let Some(log) = &self.onsets {
                log.lock().unwrap_or_else(PoisonError::into_inner).push(at);
            }
        }
        self.lock().pulse.push(to, at);
        Ok(())
    }

    fn cancel_scheduled_gain(&mut self, from_time: f64) -> Result<(), GraphError> {
        self.lock().pulse.cancel_from(from_time);
        if let Some(log) = &self.onsets {
            log.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|&t| t < from_time);
        }
        Ok(())
    }

    fn set_master_gain(
        &mut self,
        target: f32,
        at: f64,
        time_constant: f64,
    ) -> Result<(), GraphError> {
        if self.released {
            return Err(GraphError::Released);
        }
        debug!("[graph] master -> {target:.4} at {at:.3} (tc {time_constant}s)");
        self.lock().master.retarget(target, at, time_constant);
        Ok(())
    }

    fn release(&mut self) -> Result<(), GraphError> {
        if !self.released {
            debug!("[graph] released after {} pulses", self.pulses);
        }
        self.released = true;
        self.lock().set_connected(false);
        Ok(())
    }
}
