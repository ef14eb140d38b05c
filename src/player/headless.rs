use crate::error::{GeoSonicError, Result};
use crate::player::{AudioPlayer, PlayerStatus, check_volume};
use crate::story::SoundClip;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A call received by a [`HeadlessAudioPlayer`].
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCall {
    Play(String),
    Stop,
    Pause,
    Resume,
    SetVolume(f32),
    Release,
}

#[derive(Debug, Default)]
struct HeadlessState {
    status: PlayerStatus,
    paused: bool,
    history: Vec<PlayerCall>,
    fail_next: Option<String>,
}

/// Player that tracks the playback slot without producing sound.
///
/// Suitable for hosts that render audio elsewhere (or not at all) and for
/// driving the engine in tests: clones share state, so the host can keep a
/// clone to inspect [`HeadlessAudioPlayer::history`] after handing one to the
/// engine.
#[derive(Debug, Clone, Default)]
pub struct HeadlessAudioPlayer {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessAudioPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every call received so far, in order.
    pub fn history(&self) -> Vec<PlayerCall> {
        self.state().history.clone()
    }

    pub fn clear_history(&self) {
        self.state().history.clear();
    }

    /// Number of `play` calls received so far.
    pub fn play_count(&self) -> usize {
        self.state()
            .history
            .iter()
            .filter(|call| matches!(call, PlayerCall::Play(_)))
            .count()
    }

    /// Makes the next call fail with [`GeoSonicError::Audio`] carrying `message`.
    pub fn fail_next_call(&self, message: impl Into<String>) {
        self.state().fail_next = Some(message.into());
    }

    /// Simulates the current clip reaching its end.
    pub fn finish_current(&self) {
        let mut state = self.state();
        state.status.is_playing = false;
        state.status.current_clip_id = None;
        state.paused = false;
    }

    fn record(&self, call: PlayerCall) -> Result<MutexGuard<'_, HeadlessState>> {
        let mut state = self.state();
        state.history.push(call);
        match state.fail_next.take() {
            Some(message) => Err(GeoSonicError::Audio(message)),
            None => Ok(state),
        }
    }
}

impl AudioPlayer for HeadlessAudioPlayer {
    fn play(&mut self, clip: &SoundClip) -> Result<()> {
        let mut state = self.record(PlayerCall::Play(clip.id.clone()))?;
        state.status.is_playing = true;
        state.status.current_clip_id = Some(clip.id.clone());
        state.paused = false;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut state = self.record(PlayerCall::Stop)?;
        state.status.is_playing = false;
        state.status.current_clip_id = None;
        state.paused = false;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        let mut state = self.record(PlayerCall::Pause)?;
        if state.status.is_playing {
            state.status.is_playing = false;
            state.paused = true;
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        let mut state = self.record(PlayerCall::Resume)?;
        if state.paused && state.status.current_clip_id.is_some() {
            state.status.is_playing = true;
            state.paused = false;
        }
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<()> {
        let volume = check_volume(volume)?;
        let mut state = self.record(PlayerCall::SetVolume(volume))?;
        state.status.volume = volume;
        Ok(())
    }

    fn status(&self) -> PlayerStatus {
        self.state().status.clone()
    }

    fn release(&mut self) -> Result<()> {
        let mut state = self.record(PlayerCall::Release)?;
        state.status.is_playing = false;
        state.status.current_clip_id = None;
        state.paused = false;
        Ok(())
    }
}
