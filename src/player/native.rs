//! cpal-backed audio player.
//!
//! Clip files are decoded on the control thread (and cached by file
//! reference), then handed to the output stream through a command channel.
//! The stream callback owns the [`PlaybackSlot`] and never blocks.

use crate::audio_data::{ClipAudio, ClipLoader, LoadOptions, SymphoniaLoader};
use crate::error::{GeoSonicError, Result};
use crate::playback::{PlaybackCommand, PlaybackSlot};
use crate::player::{AudioPlayer, PlayerStatus, check_volume};
use crate::story::SoundClip;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use crossbeam_channel::{Receiver, Sender};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Sentinel stored in `finished_generation` before any clip has finished.
const NO_GENERATION: u64 = u64::MAX;

pub struct CpalAudioPlayer<L: ClipLoader = SymphoniaLoader> {
    asset_root: PathBuf,
    loader: L,
    cache: HashMap<String, ClipAudio>,
    command_sender: Sender<PlaybackCommand>,
    stream: Option<cpal::Stream>,
    sample_rate: u32,
    channels: u16,
    generation: u64,
    finished_generation: Arc<AtomicU64>,
    status: PlayerStatus,
    paused: bool,
}

impl CpalAudioPlayer<SymphoniaLoader> {
    /// Opens the default output device. Clip file references are resolved
    /// relative to `asset_root`.
    pub fn new(asset_root: impl Into<PathBuf>) -> Result<Self> {
        Self::with_loader(asset_root, SymphoniaLoader)
    }
}

impl<L: ClipLoader> CpalAudioPlayer<L> {
    pub fn with_loader(asset_root: impl Into<PathBuf>, loader: L) -> Result<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or_else(|| {
            GeoSonicError::AudioDevice("No default output device available".into())
        })?;

        let default_config = device.default_output_config().map_err(|e| {
            GeoSonicError::AudioDevice(format!("Failed to get default config: {}", e))
        })?;

        let config = cpal::StreamConfig {
            channels: default_config.channels(),
            sample_rate: default_config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };
        let sample_rate = config.sample_rate.0;
        let channels = config.channels;

        let (command_sender, command_receiver) = crossbeam_channel::unbounded();
        let finished_generation = Arc::new(AtomicU64::new(NO_GENERATION));

        let stream = match default_config.sample_format() {
            cpal::SampleFormat::F32 => create_stream::<f32>(
                &device,
                &config,
                command_receiver,
                finished_generation.clone(),
            )?,
            cpal::SampleFormat::I16 => create_stream::<i16>(
                &device,
                &config,
                command_receiver,
                finished_generation.clone(),
            )?,
            cpal::SampleFormat::U16 => create_stream::<u16>(
                &device,
                &config,
                command_receiver,
                finished_generation.clone(),
            )?,
            _ => {
                return Err(GeoSonicError::AudioFormat(
                    "Unsupported sample format".into(),
                ));
            }
        };

        stream
            .play()
            .map_err(|e| GeoSonicError::AudioDevice(format!("Failed to start stream: {}", e)))?;

        log::info!(
            "Audio output opened: {} Hz, {} channels",
            sample_rate,
            channels
        );

        Ok(Self {
            asset_root: asset_root.into(),
            loader,
            cache: HashMap::new(),
            command_sender,
            stream: Some(stream),
            sample_rate,
            channels,
            generation: 0,
            finished_generation,
            status: PlayerStatus::default(),
            paused: false,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    fn send(&self, command: PlaybackCommand) -> Result<()> {
        if self.stream.is_none() {
            return Err(GeoSonicError::AudioDevice("Audio output was released".into()));
        }
        self.command_sender
            .send(command)
            .map_err(|e| GeoSonicError::Audio(format!("Failed to send playback command: {}", e)))
    }

    fn load(&mut self, clip: &SoundClip) -> Result<ClipAudio> {
        if let Some(audio) = self.cache.get(&clip.file) {
            return Ok(audio.clone());
        }

        let path = self.asset_root.join(&clip.file);
        let options = LoadOptions::new().target_sample_rate(self.sample_rate);
        let audio = self.loader.load(&path, &options)?;
        log::debug!(
            "Cached clip {} ({:.1}s)",
            clip.id,
            audio.duration().as_secs_f64()
        );
        self.cache.insert(clip.file.clone(), audio.clone());
        Ok(audio)
    }

    fn current_has_finished(&self) -> bool {
        self.status.current_clip_id.is_some()
            && self.finished_generation.load(Ordering::Acquire) == self.generation
    }
}

impl<L: ClipLoader> AudioPlayer for CpalAudioPlayer<L> {
    fn play(&mut self, clip: &SoundClip) -> Result<()> {
        let audio = self.load(clip)?;
        let generation = self.generation.wrapping_add(1) % NO_GENERATION;
        self.send(PlaybackCommand::Play {
            clip_id: clip.id.clone(),
            audio,
            generation,
        })?;

        self.generation = generation;
        self.status.is_playing = true;
        self.status.current_clip_id = Some(clip.id.clone());
        self.paused = false;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if self.status.current_clip_id.is_none() {
            return Ok(());
        }
        self.send(PlaybackCommand::Stop)?;
        self.status.is_playing = false;
        self.status.current_clip_id = None;
        self.paused = false;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        if !self.status.is_playing {
            return Ok(());
        }
        self.send(PlaybackCommand::Pause)?;
        self.status.is_playing = false;
        self.paused = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        if !self.paused {
            return Ok(());
        }
        self.send(PlaybackCommand::Resume)?;
        self.status.is_playing = true;
        self.paused = false;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<()> {
        let volume = check_volume(volume)?;
        self.send(PlaybackCommand::SetVolume(volume))?;
        self.status.volume = volume;
        Ok(())
    }

    fn status(&self) -> PlayerStatus {
        if self.current_has_finished() {
            return PlayerStatus {
                is_playing: false,
                current_clip_id: None,
                volume: self.status.volume,
            };
        }
        self.status.clone()
    }

    fn release(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            let _ = self.command_sender.send(PlaybackCommand::Stop);
            drop(stream);
            log::info!("Audio output released");
        }
        self.cache.clear();
        self.status.is_playing = false;
        self.status.current_clip_id = None;
        self.paused = false;
        Ok(())
    }
}

fn create_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    command_receiver: Receiver<PlaybackCommand>,
    finished_generation: Arc<AtomicU64>,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels;
    let mut slot = PlaybackSlot::default();
    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                while let Ok(command) = command_receiver.try_recv() {
                    slot.apply(command);
                }

                scratch.resize(data.len(), 0.0);
                if let Some(generation) = slot.render(&mut scratch, channels) {
                    finished_generation.store(generation, Ordering::Release);
                }

                for (out, sample) in data.iter_mut().zip(scratch.iter()) {
                    *out = T::from_sample(*sample);
                }
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| GeoSonicError::AudioDevice(format!("Failed to build stream: {}", e)))
}

impl<L: ClipLoader> Drop for CpalAudioPlayer<L> {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
