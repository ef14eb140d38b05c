//! Audio players driven by the trigger engine.
//!
//! A player owns a single playback slot: starting a clip implicitly stops the
//! previous one. The engine is the only component that calls into the player
//! while monitoring is active.

mod headless;
#[cfg(feature = "native")]
pub mod native;

use crate::error::{GeoSonicError, Result};
use crate::story::SoundClip;

pub use headless::{HeadlessAudioPlayer, PlayerCall};

/// Snapshot of a player's slot.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStatus {
    pub is_playing: bool,
    pub current_clip_id: Option<String>,
    pub volume: f32,
}

impl Default for PlayerStatus {
    fn default() -> Self {
        Self {
            is_playing: false,
            current_clip_id: None,
            volume: 1.0,
        }
    }
}

pub trait AudioPlayer {
    /// Starts `clip` from the beginning, replacing anything already playing.
    fn play(&mut self, clip: &SoundClip) -> Result<()>;

    /// Stops and unloads the current clip. A no-op when nothing is loaded.
    fn stop(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    fn resume(&mut self) -> Result<()>;

    /// Sets output volume in `0.0..=1.0`.
    fn set_volume(&mut self, volume: f32) -> Result<()>;

    fn status(&self) -> PlayerStatus;

    /// Releases the output device and cached audio. Called once from engine cleanup.
    fn release(&mut self) -> Result<()> {
        self.stop()
    }
}

pub(crate) fn check_volume(volume: f32) -> Result<f32> {
    if volume.is_finite() && (0.0..=1.0).contains(&volume) {
        Ok(volume)
    } else {
        Err(GeoSonicError::Audio(format!(
            "Volume must be between 0 and 1, got {}",
            volume
        )))
    }
}
