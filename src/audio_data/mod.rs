//! Decoded clip audio for players that render samples themselves.

mod loader;
mod resampler;

use crate::error::{GeoSonicError, Result};
use std::sync::Arc;
use std::time::Duration;

pub use loader::{ClipLoader, SymphoniaLoader};
pub use resampler::ClipResampler;

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Resample to this rate after decoding (None = keep original)
    pub target_sample_rate: Option<u32>,
    /// Stop decoding after this much audio (None = whole file)
    pub max_duration: Option<Duration>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target_sample_rate(mut self, rate: u32) -> Self {
        self.target_sample_rate = Some(rate);
        self
    }

    pub fn max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }
}

/// Decoded audio for one clip, shared by reference between the loader cache
/// and the render callback.
///
/// Samples are interleaved: `[L0, R0, L1, R1, ...]` for stereo.
#[derive(Debug, Clone)]
pub struct ClipAudio {
    inner: Arc<ClipAudioInner>,
}

#[derive(Debug)]
struct ClipAudioInner {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    duration: Duration,
    total_frames: usize,
}

impl ClipAudio {
    /// Wraps interleaved samples. The sample count must be a whole number of frames.
    pub fn from_interleaved(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self> {
        if sample_rate == 0 {
            return Err(GeoSonicError::AudioFormat(
                "Sample rate must be greater than 0".into(),
            ));
        }
        if channels == 0 {
            return Err(GeoSonicError::AudioFormat(
                "Channel count must be greater than 0".into(),
            ));
        }
        if samples.len() % channels as usize != 0 {
            return Err(GeoSonicError::AudioFormat(format!(
                "{} samples do not divide into {} channels",
                samples.len(),
                channels
            )));
        }

        let total_frames = samples.len() / channels as usize;
        let duration = Duration::from_secs_f64(total_frames as f64 / sample_rate as f64);
        Ok(Self {
            inner: Arc::new(ClipAudioInner {
                samples,
                sample_rate,
                channels,
                duration,
                total_frames,
            }),
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.inner.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.inner.channels
    }

    pub fn duration(&self) -> Duration {
        self.inner.duration
    }

    pub fn total_frames(&self) -> usize {
        self.inner.total_frames
    }

    /// Interleaved samples of one frame, or `None` past the end.
    pub fn frame(&self, index: usize) -> Option<&[f32]> {
        let channels = self.inner.channels as usize;
        let start = index.checked_mul(channels)?;
        self.inner.samples.get(start..start + channels)
    }

    /// Resample to a different sample rate using rubato
    pub fn resample(&self, target_sample_rate: u32) -> Result<Self> {
        if target_sample_rate == self.inner.sample_rate {
            return Ok(self.clone());
        }

        let resampler =
            ClipResampler::new(self.inner.sample_rate, target_sample_rate, self.inner.channels, None)?;
        let samples = resampler.resample_interleaved(&self.inner.samples)?;
        Self::from_interleaved(samples, target_sample_rate, self.inner.channels)
    }
}
