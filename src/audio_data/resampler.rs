use crate::error::{GeoSonicError, Result};
use rubato::{FftFixedIn, Resampler};

/// Offline sample-rate converter for whole clips.
pub struct ClipResampler {
    source_sample_rate: u32,
    target_sample_rate: u32,
    channels: u16,
    chunk_size: usize,
}

impl ClipResampler {
    pub fn new(
        source_sample_rate: u32,
        target_sample_rate: u32,
        channels: u16,
        chunk_size: Option<usize>,
    ) -> Result<Self> {
        if source_sample_rate == 0 || target_sample_rate == 0 {
            return Err(GeoSonicError::AudioFormat(
                "Sample rates must be greater than 0".to_string(),
            ));
        }

        if channels == 0 {
            return Err(GeoSonicError::AudioFormat(
                "Channel count must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            source_sample_rate,
            target_sample_rate,
            channels,
            chunk_size: chunk_size.unwrap_or(1024),
        })
    }

    pub fn resample_interleaved(&self, interleaved: &[f32]) -> Result<Vec<f32>> {
        if self.source_sample_rate == self.target_sample_rate || interleaved.is_empty() {
            return Ok(interleaved.to_vec());
        }

        let channels = self.channels as usize;
        let mut resampler = FftFixedIn::<f32>::new(
            self.source_sample_rate as usize,
            self.target_sample_rate as usize,
            self.chunk_size,
            2, // sub_chunks
            channels,
        )
        .map_err(|e| GeoSonicError::AudioLoading(format!("Failed to create resampler: {}", e)))?;

        // Deinterleave
        let planar: Vec<Vec<f32>> = (0..channels)
            .map(|ch| {
                interleaved
                    .chunks(channels)
                    .map(|frame| frame.get(ch).copied().unwrap_or(0.0))
                    .collect()
            })
            .collect();
        let total_frames = planar[0].len();

        let mut output: Vec<Vec<f32>> = vec![Vec::new(); channels];
        let mut input_index = 0;

        while input_index < total_frames {
            let chunk_frames = resampler.input_frames_next();
            let end_index = (input_index + chunk_frames).min(total_frames);

            // Pad the last chunk with silence
            let waves_in: Vec<Vec<f32>> = planar
                .iter()
                .map(|channel| {
                    let mut chunk = vec![0.0f32; chunk_frames];
                    chunk[..end_index - input_index].copy_from_slice(&channel[input_index..end_index]);
                    chunk
                })
                .collect();

            let waves_out = resampler
                .process(&waves_in, None)
                .map_err(|e| GeoSonicError::AudioLoading(format!("Resampling error: {}", e)))?;

            for (out, wave) in output.iter_mut().zip(waves_out) {
                out.extend_from_slice(&wave);
            }

            input_index = end_index;
        }

        // Interleave
        let new_frames = output.iter().map(Vec::len).min().unwrap_or(0);
        let mut interleaved_out = Vec::with_capacity(new_frames * channels);
        for frame_idx in 0..new_frames {
            for channel in &output {
                interleaved_out.push(channel[frame_idx]);
            }
        }

        Ok(interleaved_out)
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    pub fn source_sample_rate(&self) -> u32 {
        self.source_sample_rate
    }

    pub fn resample_ratio(&self) -> f64 {
        self.target_sample_rate as f64 / self.source_sample_rate as f64
    }
}
