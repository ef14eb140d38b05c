//! Render-side playback state for players that produce samples themselves.
//!
//! - [`PlaybackCommand`]: messages from the control thread to the render callback
//! - [`PlaybackInstance`]: cursor and state for one clip
//! - [`PlaybackSlot`]: the single playback slot, applying commands and filling buffers
//!
//! The slot holds at most one instance. A new `Play` replaces whatever was in
//! it, which is how the one-sound-at-a-time contract is enforced at render level.

use crate::audio_data::ClipAudio;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Playing,
    Paused,
    /// Reached the end of the clip
    Finished,
}

/// Commands sent to the render callback
#[derive(Debug)]
pub enum PlaybackCommand {
    Play {
        clip_id: String,
        audio: ClipAudio,
        /// Tag echoed back when this clip finishes
        generation: u64,
    },
    Stop,
    Pause,
    Resume,
    SetVolume(f32),
}

#[derive(Debug)]
pub struct PlaybackInstance {
    pub clip_id: String,
    pub audio: ClipAudio,
    pub generation: u64,
    pub current_frame: usize,
    pub state: PlayState,
}

impl PlaybackInstance {
    pub fn new(clip_id: String, audio: ClipAudio, generation: u64) -> Self {
        Self {
            clip_id,
            audio,
            generation,
            current_frame: 0,
            state: PlayState::Playing,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state == PlayState::Finished
    }

    /// Mixes this instance into an interleaved output buffer with `channels`
    /// channels. Mono clips are copied to every output channel; otherwise clip
    /// channels wrap around the output layout. Returns the frames written.
    pub fn fill_buffer(&mut self, buffer: &mut [f32], channels: u16, gain: f32) -> usize {
        if self.state != PlayState::Playing || channels == 0 {
            return 0;
        }

        let out_channels = channels as usize;
        let frame_count = buffer.len() / out_channels;
        let mut frames_filled = 0;

        for out_frame in buffer.chunks_mut(out_channels).take(frame_count) {
            let Some(frame) = self.audio.frame(self.current_frame) else {
                log::debug!("Clip {} reached end at frame {}", self.clip_id, self.current_frame);
                self.state = PlayState::Finished;
                break;
            };

            for (ch, sample) in out_frame.iter_mut().enumerate() {
                *sample += frame[ch % frame.len()] * gain;
            }

            self.current_frame += 1;
            frames_filled += 1;
        }

        if self.audio.frame(self.current_frame).is_none() {
            self.state = PlayState::Finished;
        }

        frames_filled
    }
}

/// The render callback's view of the player.
#[derive(Debug)]
pub struct PlaybackSlot {
    current: Option<PlaybackInstance>,
    volume: f32,
}

impl Default for PlaybackSlot {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl PlaybackSlot {
    pub fn new(volume: f32) -> Self {
        Self {
            current: None,
            volume,
        }
    }

    pub fn apply(&mut self, command: PlaybackCommand) {
        match command {
            PlaybackCommand::Play {
                clip_id,
                audio,
                generation,
            } => {
                if let Some(previous) = self.current.take() {
                    log::debug!("Clip {} replaced by {}", previous.clip_id, clip_id);
                }
                self.current = Some(PlaybackInstance::new(clip_id, audio, generation));
            }
            PlaybackCommand::Stop => {
                self.current = None;
            }
            PlaybackCommand::Pause => {
                if let Some(instance) = self.current.as_mut() {
                    if instance.state == PlayState::Playing {
                        instance.state = PlayState::Paused;
                    }
                }
            }
            PlaybackCommand::Resume => {
                if let Some(instance) = self.current.as_mut() {
                    if instance.state == PlayState::Paused {
                        instance.state = PlayState::Playing;
                    }
                }
            }
            PlaybackCommand::SetVolume(volume) => {
                self.volume = volume.clamp(0.0, 1.0);
            }
        }
    }

    /// Zeroes `buffer` and renders the current clip into it. Returns the
    /// generation of the clip if it finished during this call.
    pub fn render(&mut self, buffer: &mut [f32], channels: u16) -> Option<u64> {
        buffer.fill(0.0);

        let instance = self.current.as_mut()?;
        instance.fill_buffer(buffer, channels, self.volume);
        if instance.is_finished() {
            let generation = instance.generation;
            self.current = None;
            return Some(generation);
        }
        None
    }

    pub fn current_clip_id(&self) -> Option<&str> {
        self.current.as_ref().map(|instance| instance.clip_id.as_str())
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }
}
