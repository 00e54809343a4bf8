use isochron_core::{Clock, GraphError, SignalGraph};
use wasm_bindgen::JsValue;
use web_sys as web;

fn js_err(e: JsValue) -> String {
    format!("{e:?}")
}

fn create_gain(audio_ctx: &web::AudioContext, value: f32, label: &str) -> Result<web::GainNode, GraphError> {
    match web::GainNode::new(audio_ctx) {
        Ok(g) => {
            g.gain().set_value(value);
            Ok(g)
        }
        Err(e) => {
            log::error!("{} GainNode error: {:?}", label, e);
            Err(GraphError::Unavailable(format!("{label} gain: {}", js_err(e))))
        }
    }
}

/// `AudioContext.currentTime`: the clock the gain automation runs against.
#[derive(Clone)]
pub struct AudioContextClock {
    audio_ctx: web::AudioContext,
}

impl AudioContextClock {
    pub fn new(audio_ctx: web::AudioContext) -> Self {
        Self { audio_ctx }
    }
}

impl Clock for AudioContextClock {
    fn now(&self) -> f64 {
        self.audio_ctx.current_time()
    }
}

/// Sine oscillator -> pulse gain -> master gain -> destination.
pub struct WebAudioGraph {
    audio_ctx: web::AudioContext,
    carrier: web::OscillatorNode,
    pulse: web::GainNode,
    master: web::GainNode,
    started: bool,
    released: bool,
}

impl WebAudioGraph {
    pub fn new(audio_ctx: &web::AudioContext) -> Result<Self, GraphError> {
        let carrier = web::OscillatorNode::new(audio_ctx)
            .map_err(|e| GraphError::Unavailable(format!("oscillator: {}", js_err(e))))?;
        carrier.set_type(web::OscillatorType::Sine);
        Ok(Self {
            audio_ctx: audio_ctx.clone(),
            carrier,
            pulse: create_gain(audio_ctx, 0.0, "Pulse")?,
            master: create_gain(audio_ctx, 0.0, "Master")?,
            started: false,
            released: false,
        })
    }

    fn live(&self) -> Result<(), GraphError> {
        if self.released {
            Err(GraphError::Released)
        } else {
            Ok(())
        }
    }
}

impl SignalGraph for WebAudioGraph {
    fn set_carrier_frequency(&mut self, hz: f64) -> Result<(), GraphError> {
        self.live()?;
        self.carrier.frequency().set_value(hz as f32);
        Ok(())
    }

    fn connect(&mut self) -> Result<(), GraphError> {
        self.live()?;
        let unavailable = |e: JsValue| GraphError::Unavailable(js_err(e));
        self.carrier
            .connect_with_audio_node(&self.pulse)
            .map_err(unavailable)?;
        self.pulse
            .connect_with_audio_node(&self.master)
            .map_err(unavailable)?;
        self.master
            .connect_with_audio_node(&self.audio_ctx.destination())
            .map_err(unavailable)?;
        if !self.started {
            self.carrier.start_with_when(0.0).map_err(unavailable)?;
            self.started = true;
        }
        Ok(())
    }

    fn schedule_gain_ramp(&mut self, from: f32, to: f32, at: f64) -> Result<(), GraphError> {
        self.live()?;
        let gain = self.pulse.gain();
        // a flat ramp pins the value at `at`
        let scheduled = if from == to {
            gain.set_value_at_time(to, at)
        } else {
            gain.linear_ramp_to_value_at_time(to, at)
        };
        scheduled
            .map(|_| ())
            .map_err(|e| GraphError::Schedule(js_err(e)))
    }

    fn cancel_scheduled_gain(&mut self, from_time: f64) -> Result<(), GraphError> {
        if self.released {
            return Ok(());
        }
        self.pulse
            .gain()
            .cancel_scheduled_values(from_time)
            .map(|_| ())
            .map_err(|e| GraphError::Schedule(js_err(e)))
    }

    fn set_master_gain(&mut self, target: f32, at: f64, time_constant: f64) -> Result<(), GraphError> {
        self.live()?;
        self.master
            .gain()
            .set_target_at_time(target, at, time_constant)
            .map(|_| ())
            .map_err(|e| GraphError::Schedule(js_err(e)))
    }

    fn release(&mut self) -> Result<(), GraphError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        if self.started {
            if let Err(e) = self.carrier.stop_with_when(0.0) {
                log::debug!("[audio] carrier stop: {}", js_err(e));
            }
        }
        if let Err(e) = self.carrier.disconnect() {
            log::debug!("[audio] carrier disconnect: {}", js_err(e));
        }
        if let Err(e) = self.pulse.disconnect() {
            log::debug!("[audio] pulse disconnect: {}", js_err(e));
        }
        if let Err(e) = self.master.disconnect() {
            log::debug!("[audio] master disconnect: {}", js_err(e));
        }
        Ok(())
    }
}
