use crate::audio_data::{ClipAudio, LoadOptions};
use crate::error::{GeoSonicError, Result};
use std::fs::File;
use std::path::Path;
use symphonia::{
    core::{
        audio::SampleBuffer, codecs::DecoderOptions, errors::Error, formats::FormatOptions,
        io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
    },
    default::{get_codecs, get_probe},
};

/// Turns a clip's file reference into decoded audio.
///
/// The native player uses [`SymphoniaLoader`]; hosts with their own asset
/// pipeline (bundled archives, encrypted packs) can plug in another loader.
pub trait ClipLoader {
    fn load(&self, path: &Path, options: &LoadOptions) -> Result<ClipAudio>;
}

/// Default loader backed by symphonia (WAV, MP3, FLAC, OGG, ...).
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaLoader;

impl ClipLoader for SymphoniaLoader {
    fn load(&self, path: &Path, options: &LoadOptions) -> Result<ClipAudio> {
        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                GeoSonicError::AudioLoading(format!("Failed to probe audio format: {:?}", e))
            })?;

        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| GeoSonicError::AudioLoading("No default audio track found".into()))?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| GeoSonicError::AudioLoading("Sample rate not found".into()))?;

        let channels = codec_params
            .channels
            .ok_or_else(|| GeoSonicError::AudioLoading("Channel count not found".into()))?
            .count() as u16;

        let mut decoder = get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| GeoSonicError::AudioLoading(format!("Failed to create decoder: {:?}", e)))?;

        let max_frames = options
            .max_duration
            .map(|d| (d.as_secs_f64() * sample_rate as f64) as usize)
            .unwrap_or(usize::MAX);

        let mut samples: Vec<f32> = Vec::new();
        let mut frames_decoded = 0;

        while frames_decoded < max_frames {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(Error::IoError(_)) => break, // end-of-file
                Err(e) => {
                    return Err(GeoSonicError::AudioLoading(format!(
                        "Error reading packet: {:?}",
                        e
                    )));
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(Error::IoError(_)) => break,
                Err(Error::DecodeError(e)) => {
                    log::warn!("Skipping corrupt packet in {}: {}", path.display(), e);
                    continue;
                }
                Err(e) => {
                    return Err(GeoSonicError::AudioLoading(format!(
                        "Error decoding packet: {:?}",
                        e
                    )));
                }
            };

            let spec = *decoded.spec();
            let frames = decoded.frames();
            let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buffer.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buffer.samples());

            frames_decoded += frames;
        }

        let keep = max_frames.saturating_mul(channels as usize).min(samples.len());
        samples.truncate(keep);

        log::debug!(
            "Decoded {} ({} Hz, {} ch, {} frames)",
            path.display(),
            sample_rate,
            channels,
            samples.len() / channels.max(1) as usize
        );

        let audio = ClipAudio::from_interleaved(samples, sample_rate, channels)?;
        match options.target_sample_rate {
            Some(target) if target != sample_rate => audio.resample(target),
            _ => Ok(audio),
        }
    }
}
