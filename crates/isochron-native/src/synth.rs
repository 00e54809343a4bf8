// ---------------- Native audio (cpal) ----------------

use crate::graph::VoiceGraph;
use crate::voice::PulseVoice;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use isochron_core::{Clock, GraphError, MonotonicClock, SignalGraph};
use log::{error, info};
use std::sync::{Arc, Mutex, PoisonError};

/// A [`VoiceGraph`] rendered to the default output device. The stream is
/// built up front and only starts pulling samples on `connect`.
pub struct CpalGraph {
    graph: VoiceGraph,
    stream: Option<cpal::Stream>,
}

impl CpalGraph {
    /// `clock` must be the controller's clock: the callback stamps each
    /// buffer with it.
    pub fn open(clock: MonotonicClock) -> Result<Self, GraphError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| GraphError::Unavailable("no output device".into()))?;
        let config = device
            .default_output_config()
            .map_err(|e| GraphError::Unavailable(e.to_string()))?;
        let sample_rate = config.sample_rate().0 as f32;
        let channels = config.channels() as usize;
        info!(
            "[audio] {} @ {} Hz, {} ch, {:?}",
            device.name().unwrap_or_else(|_| "output".into()),
            sample_rate,
            channels,
            config.sample_format()
        );

        let graph = VoiceGraph::new(sample_rate);
        let voice = graph.voice();
        let stream_config: cpal::StreamConfig = config.clone().into();
        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &stream_config, channels, voice, clock)
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &stream_config, channels, voice, clock)
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &stream_config, channels, voice, clock)
            }
            other => {
                return Err(GraphError::Unavailable(format!(
                    "unsupported sample format {other:?}"
                )))
            }
        }
        .map_err(|e| GraphError::Unavailable(e.to_string()))?;

        Ok(Self {
            graph,
            stream: Some(stream),
        })
    }
}

impl SignalGraph for CpalGraph {
    fn set_carrier_frequency(&mut self, hz: f64) -> Result<(), GraphError> {
        self.graph.set_carrier_frequency(hz)
    }

    fn connect(&mut self) -> Result<(), GraphError> {
        self.graph.connect()?;
        let stream = self.stream.as_ref().ok_or(GraphError::Released)?;
        stream
            .play()
            .map_err(|e| GraphError::Unavailable(e.to_string()))
    }

    fn schedule_gain_ramp(&mut self, from: f32, to: f32, at: f64) -> Result<(), GraphError> {
        self.graph.schedule_gain_ramp(from, to, at)
    }

    fn cancel_scheduled_gain(&mut self, from_time: f64) -> Result<(), GraphError> {
        self.graph.cancel_scheduled_gain(from_time)
    }

    fn set_master_gain(
        &mut self,
        target: f32,
        at: f64,
        time_constant: f64,
    ) -> Result<(), GraphError> {
        self.graph.set_master_gain(target, at, time_constant)
    }

    fn release(&mut self) -> Result<(), GraphError> {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                error!("[audio] pause on release: {e}");
            }
        }
        self.graph.release()
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    voice: Arc<Mutex<PulseVoice>>,
    clock: MonotonicClock,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            {
                let mut guard = voice.lock().unwrap_or_else(PoisonError::into_inner);
                guard.render(clock.now(), &mut scratch, channels);
            }
            for (out, &s) in data.iter_mut().zip(scratch.iter()) {
                *out = T::from_sample(s.clamp(-1.0, 1.0));
            }
        },
        |err| error!("[audio] stream error: {err}"),
        None,
    )
}
