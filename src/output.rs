//! Realtime output through the host's default audio device.

use std::sync::{Arc, Mutex, PoisonError};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use crate::{error::SynthError, synth::SynthState};

/// The default output device and the configuration it prefers.
pub(crate) struct OutputDevice {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
}

impl OutputDevice {
    pub fn open_default() -> Result<Self, SynthError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(SynthError::NoOutputDevice)?;
        let config = device.default_output_config()?;
        Ok(Self { device, config })
    }

    pub fn sample_rate(&self) -> f64 {
        f64::from(self.config.sample_rate().0)
    }

    /// Build and start a stream whose callback renders `state` into every
    /// device buffer.
    pub fn start(self, state: Arc<Mutex<SynthState>>) -> Result<cpal::Stream, SynthError> {
        let channels = usize::from(self.config.channels());
        info!(
            device = %self.device.name().unwrap_or_else(|_| "unknown".into()),
            sample_rate = self.sample_rate(),
            channels,
            "opening output stream"
        );

        let stream = self.device.build_output_stream(
            &self.config.into(),
            move |data: &mut [f32], _| {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                state.render(data, channels);
            },
            |err| error!(%err, "output stream error"),
            None,
        )?;
        stream.play()?;
        Ok(stream)
    }
}
