//! Location-triggered playback engine for GeoSonic

use crate::catalog::CatalogProvider;
use crate::config::GeoSonicDesc;
use crate::cooldown::{Clock, CooldownTimers, SystemClock};
use crate::error::{GeoSonicError, Result};
use crate::events::{GeoSonicEvent, MonitorCallback, MonitorUpdate, TriggerEvent};
use crate::geo::{Coordinate, distance_meters};
use crate::location::{PositionSource, PositionUpdate, SubscriptionId};
use crate::player::AudioPlayer;
use crate::status::{EngineStatus, NearbyClip, nearby_clips};
use crate::story::{SoundClip, Story, StorySummary};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::Arc;
use std::time::Duration;

/// Live subscription to the position source.
struct Monitoring {
    subscription: SubscriptionId,
    updates: Receiver<PositionUpdate>,
    callback: Option<MonitorCallback>,
}

struct TriggerState {
    current_story: Option<Arc<Story>>,
    active_clip_id: Option<String>,
    cooldowns: CooldownTimers,
    monitoring: Option<Monitoring>,
}

/// Plays story clips as the listener walks into their geofences.
///
/// One engine exists per app session. It owns its collaborators: the story
/// catalog, the position source and the audio player. While monitoring, the
/// engine is the only caller of the player, so at most one clip plays at a time.
///
/// The engine is single-threaded. Position updates arrive on a channel and are
/// processed one at a time by [`GeoSonicEngine::pump`] (or pushed directly
/// through [`GeoSonicEngine::on_position_update`]).
///
/// # Example
///
/// ```no_run
/// # use geosonic::*;
/// # fn main() -> geosonic::error::Result<()> {
/// let catalog = StoryCatalog::from_path("assets/stories.json")?;
/// let gps = ManualPositionSource::new();
/// let player = HeadlessAudioPlayer::new();
///
/// let mut engine = GeoSonicEngine::new(GeoSonicDesc::default(), catalog, gps.clone(), player)?;
/// engine.select_story("midtown")?;
/// engine.start_monitoring(None)?;
///
/// gps.push(Some(Coordinate::new(40.7589, -73.9851)));
/// engine.pump();
///
/// for event in engine.poll_events() {
///     if let GeoSonicEvent::ClipTriggered(trigger) = event {
///         println!("Now playing {}", trigger.clip.display_name());
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct GeoSonicEngine {
    desc: GeoSonicDesc,
    catalog: Box<dyn CatalogProvider>,
    position_source: Box<dyn PositionSource>,
    player: Box<dyn AudioPlayer>,
    clock: Box<dyn Clock>,
    state: TriggerState,
    event_sender: Sender<GeoSonicEvent>,
    event_receiver: Receiver<GeoSonicEvent>,
}

impl GeoSonicEngine {
    pub fn new(
        desc: GeoSonicDesc,
        catalog: impl CatalogProvider + 'static,
        position_source: impl PositionSource + 'static,
        player: impl AudioPlayer + 'static,
    ) -> Result<Self> {
        desc.validate()?;
        let (event_sender, event_receiver) = crossbeam_channel::bounded(desc.max_pending_events);
        let cooldowns = CooldownTimers::new(desc.cooldown);

        Ok(Self {
            desc,
            catalog: Box::new(catalog),
            position_source: Box::new(position_source),
            player: Box::new(player),
            clock: Box::new(SystemClock),
            state: TriggerState {
                current_story: None,
                active_clip_id: None,
                cooldowns,
                monitoring: None,
            },
            event_sender,
            event_receiver,
        })
    }

    /// Replaces the time source used for cooldowns and trigger timestamps.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn desc(&self) -> &GeoSonicDesc {
        &self.desc
    }

    pub fn list_stories(&self) -> Vec<StorySummary> {
        self.catalog.list_stories()
    }

    /// Makes `story_id` the current story.
    ///
    /// Pending cooldowns are cancelled and the active clip is forgotten. Audio
    /// that is still playing is left alone and position updates no longer
    /// stop it; the caller stops it with `stop_monitoring` or `cleanup`.
    ///
    /// # Errors
    ///
    /// [`GeoSonicError::StoryNotFound`] if the catalog has no such story. The
    /// engine state is unchanged in that case.
    pub fn select_story(&mut self, story_id: &str) -> Result<()> {
        let story = self
            .catalog
            .story_by_id(story_id)
            .ok_or_else(|| GeoSonicError::StoryNotFound(story_id.to_string()))?;

        let cancelled = self.state.cooldowns.cancel_all();
        self.state.active_clip_id = None;
        log::info!(
            "Selected story '{}' ({} clips, {} cooldowns cancelled)",
            story.id,
            story.clips.len(),
            cancelled
        );
        self.state.current_story = Some(story);
        self.emit(GeoSonicEvent::StorySelected {
            story_id: story_id.to_string(),
        });
        Ok(())
    }

    /// Subscribes to the position source and starts evaluating updates.
    ///
    /// `callback` is invoked for every processed update and again for every
    /// clip triggered by it. Calling this while already monitoring only
    /// replaces the callback.
    ///
    /// # Errors
    ///
    /// - [`GeoSonicError::NoStoryLoaded`] without a prior `select_story`; the
    ///   position source is not touched.
    /// - [`GeoSonicError::PermissionDenied`] / [`GeoSonicError::ServicesDisabled`]
    ///   or any other error from the position source, unchanged.
    pub fn start_monitoring(&mut self, callback: Option<MonitorCallback>) -> Result<()> {
        let story_id = match &self.state.current_story {
            Some(story) => story.id.clone(),
            None => return Err(GeoSonicError::NoStoryLoaded),
        };

        if let Some(monitoring) = self.state.monitoring.as_mut() {
            log::debug!("Already monitoring; replacing update callback");
            monitoring.callback = callback;
            return Ok(());
        }

        let (sender, updates) = crossbeam_channel::unbounded();
        let subscription = self.position_source.subscribe(sender)?;

        if let Err(e) = self.player.set_volume(self.desc.initial_volume) {
            log::warn!("Failed to apply initial volume: {}", e);
        }

        self.state.monitoring = Some(Monitoring {
            subscription,
            updates,
            callback,
        });
        log::info!("Monitoring started for story '{}'", story_id);
        self.emit(GeoSonicEvent::MonitoringStarted { story_id });
        Ok(())
    }

    /// Unsubscribes from the position source and stops the current clip.
    ///
    /// Safe to call at any time. A clip started with `trigger_manually` is
    /// stopped even when not monitoring; with nothing to unsubscribe and
    /// nothing playing, no collaborator is called. Teardown always completes.
    /// The first collaborator error, if any, is returned afterwards.
    pub fn stop_monitoring(&mut self) -> Result<()> {
        let monitoring = self.state.monitoring.take();
        let audio_loaded = self.state.active_clip_id.is_some()
            || self.player.status().current_clip_id.is_some();
        if monitoring.is_none() && !audio_loaded {
            return Ok(());
        }

        let unsubscribed = match &monitoring {
            Some(monitoring) => self.position_source.unsubscribe(monitoring.subscription),
            None => Ok(()),
        };
        let stopped = self.player.stop();
        if let Some(clip_id) = self.state.active_clip_id.take() {
            self.emit(GeoSonicEvent::ClipStopped { clip_id });
        }

        if monitoring.is_some() {
            log::info!("Monitoring stopped");
            self.emit(GeoSonicEvent::MonitoringStopped);
        }
        unsubscribed.and(stopped)
    }

    /// Processes every queued position update. Returns how many were processed.
    pub fn pump(&mut self) -> usize {
        self.expire_cooldowns();

        let mut processed = 0;
        loop {
            let next = self
                .state
                .monitoring
                .as_ref()
                .and_then(|monitoring| monitoring.updates.try_recv().ok());
            let Some(update) = next else {
                break;
            };
            self.on_position_update(update);
            processed += 1;
        }
        processed
    }

    /// Evaluates one position update.
    ///
    /// Clips whose zone contains the position start playing unless they are
    /// cooling down or already active. When several start in the same update
    /// they are played in story order and the last one stays active. The
    /// active clip is stopped once the position leaves its zone.
    ///
    /// Failures are logged and queued as [`GeoSonicEvent::EvaluationError`];
    /// they never end monitoring.
    pub fn on_position_update(&mut self, update: PositionUpdate) {
        self.expire_cooldowns();

        let (Some(story), true) = (self.state.current_story.clone(), self.is_monitoring()) else {
            return;
        };

        let Some(position) = update else {
            log::debug!("Position signal lost");
            self.emit(GeoSonicEvent::SignalLost);
            self.notify(None, &[]);
            return;
        };

        if !position.is_valid() {
            let error = format!("Ignoring invalid position {}", position);
            log::warn!("{}", error);
            self.emit(GeoSonicEvent::EvaluationError { error });
            self.notify(None, &[]);
            return;
        }

        let triggered = self.evaluate(&story, &position);
        self.notify(Some(position), &triggered);
    }

    fn evaluate(&mut self, story: &Story, position: &Coordinate) -> Vec<TriggerEvent> {
        let now = self.clock.now();
        let entry_buffer = self.desc.entry_buffer_m;

        let should_trigger: Vec<(Arc<SoundClip>, f64)> = story
            .clips
            .iter()
            .map(|clip| (clip, distance_meters(position, &clip.coordinate)))
            .filter(|(clip, distance)| *distance <= clip.radius + entry_buffer)
            .filter(|(clip, _)| {
                self.state.active_clip_id.as_deref() != Some(clip.id.as_str())
                    && !self.state.cooldowns.is_cooling(&clip.id, now)
            })
            .map(|(clip, distance)| (clip.clone(), distance))
            .collect();

        // Cooldowns start before any playback so a clip triggers at most once
        // per window even if playback fails.
        for (clip, _) in &should_trigger {
            self.state.cooldowns.schedule(&clip.id, now);
        }

        let mut triggered = Vec::with_capacity(should_trigger.len());
        for (clip, distance_m) in should_trigger {
            match self.player.play(&clip) {
                Ok(()) => {
                    log::info!(
                        "Triggered clip '{}' at {:.1} m",
                        clip.display_name(),
                        distance_m
                    );
                    self.state.active_clip_id = Some(clip.id.clone());
                    let event = TriggerEvent {
                        clip,
                        distance_m,
                        timestamp: self.clock.wall_time(),
                        manual: false,
                    };
                    self.emit(GeoSonicEvent::ClipTriggered(event.clone()));
                    triggered.push(event);
                }
                Err(e) => {
                    let error = format!("Failed to play clip '{}': {}", clip.id, e);
                    log::warn!("{}", error);
                    self.emit(GeoSonicEvent::EvaluationError { error });
                }
            }
        }

        if let Some(active_id) = self.state.active_clip_id.clone() {
            let still_inside = story.clip(&active_id).is_some_and(|clip| {
                distance_meters(position, &clip.coordinate) <= clip.radius + self.desc.exit_buffer_m
            });

            if !still_inside {
                if let Err(e) = self.player.stop() {
                    let error = format!("Failed to stop clip '{}': {}", active_id, e);
                    log::warn!("{}", error);
                    self.emit(GeoSonicEvent::EvaluationError { error });
                }
                log::info!("Left zone of clip '{}'", active_id);
                self.state.active_clip_id = None;
                self.emit(GeoSonicEvent::ClipStopped { clip_id: active_id });
            }
        }

        triggered
    }

    /// Plays `clip_id` from the current story right away.
    ///
    /// Manual triggers ignore cooldowns and do not start one.
    ///
    /// # Errors
    ///
    /// [`GeoSonicError::NoStoryLoaded`], [`GeoSonicError::ClipNotFound`],
    /// [`GeoSonicError::NoLocationAvailable`] when the position source has no
    /// fix yet, or the player's error. The audio player is not called unless
    /// all checks pass.
    pub fn trigger_manually(&mut self, clip_id: &str) -> Result<()> {
        let story = self
            .state
            .current_story
            .as_ref()
            .ok_or(GeoSonicError::NoStoryLoaded)?;
        let clip = story
            .clip(clip_id)
            .cloned()
            .ok_or_else(|| GeoSonicError::ClipNotFound(clip_id.to_string()))?;
        let position = self
            .position_source
            .last_known()
            .ok_or(GeoSonicError::NoLocationAvailable)?;

        self.player.play(&clip)?;

        let distance_m = distance_meters(&position, &clip.coordinate);
        log::info!(
            "Manually triggered clip '{}' at {:.1} m",
            clip.display_name(),
            distance_m
        );
        self.state.active_clip_id = Some(clip.id.clone());
        self.emit(GeoSonicEvent::ClipTriggered(TriggerEvent {
            clip,
            distance_m,
            timestamp: self.clock.wall_time(),
            manual: true,
        }));
        Ok(())
    }

    pub fn pause_audio(&mut self) -> Result<()> {
        self.player.pause()
    }

    pub fn resume_audio(&mut self) -> Result<()> {
        self.player.resume()
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<()> {
        self.player.set_volume(volume)
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            is_monitoring: self.is_monitoring(),
            current_story: self.state.current_story.as_ref().map(|story| story.summary()),
            active_clip_id: self.state.active_clip_id.clone(),
            location_tracking_active: self.position_source.is_active(),
            audio_loaded: self.player.status().current_clip_id.is_some(),
        }
    }

    /// Clips of the current story ordered by distance from `position`.
    /// Empty when no story is selected. `is_in_range` uses the nominal
    /// radius; the entry buffer only affects triggering.
    pub fn nearby_clips(&self, position: &Coordinate) -> Vec<NearbyClip> {
        match &self.state.current_story {
            Some(story) => nearby_clips(story, position),
            None => Vec::new(),
        }
    }

    /// Stops monitoring, forgets the story and all trigger state, and releases
    /// the player and position source.
    ///
    /// Every step runs even if an earlier one fails; the first error is returned.
    pub fn cleanup(&mut self) -> Result<()> {
        let stopped = self.stop_monitoring();

        let cancelled = self.state.cooldowns.cancel_all();
        self.state.current_story = None;
        self.state.active_clip_id = None;

        let player_released = self.player.release();
        let source_released = self.position_source.release();

        log::info!("Engine cleaned up ({} cooldowns cancelled)", cancelled);
        self.emit(GeoSonicEvent::CleanedUp);
        stopped.and(player_released).and(source_released)
    }

    /// Drains queued engine events.
    pub fn poll_events(&mut self) -> Vec<GeoSonicEvent> {
        self.event_receiver.try_iter().collect()
    }

    pub fn is_monitoring(&self) -> bool {
        self.state.monitoring.is_some()
    }

    pub fn current_story(&self) -> Option<&Arc<Story>> {
        self.state.current_story.as_ref()
    }

    pub fn active_clip_id(&self) -> Option<&str> {
        self.state.active_clip_id.as_deref()
    }

    /// Time left before `clip_id` may trigger again, if it is cooling down.
    pub fn cooldown_remaining(&self, clip_id: &str) -> Option<Duration> {
        let now = self.clock.now();
        self.state
            .cooldowns
            .get(clip_id)
            .map(|handle| handle.remaining(now))
            .filter(|remaining| !remaining.is_zero())
    }

    fn expire_cooldowns(&mut self) {
        let now = self.clock.now();
        for clip_id in self.state.cooldowns.expire(now) {
            log::debug!("Cooldown expired for clip '{}'", clip_id);
            self.emit(GeoSonicEvent::CooldownExpired { clip_id });
        }
    }

    fn notify(&mut self, position: Option<Coordinate>, triggered: &[TriggerEvent]) {
        let Some(callback) = self
            .state
            .monitoring
            .as_mut()
            .and_then(|monitoring| monitoring.callback.as_mut())
        else {
            return;
        };

        callback(&MonitorUpdate::Position(position));
        for event in triggered {
            callback(&MonitorUpdate::Triggered(event.clone()));
        }
    }

    fn emit(&self, event: GeoSonicEvent) {
        if let Err(TrySendError::Full(event)) = self.event_sender.try_send(event) {
            // Drop the oldest event to make room.
            let _ = self.event_receiver.try_recv();
            let _ = self.event_sender.try_send(event);
        }
    }
}

impl Drop for GeoSonicEngine {
    fn drop(&mut self) {
        let _ = self.stop_monitoring();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StoryCatalog;
    use crate::cooldown::ManualClock;
    use crate::geo::EARTH_RADIUS_M;
    use crate::location::ManualPositionSource;
    use crate::player::{HeadlessAudioPlayer, PlayerCall};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::SystemTime;

    const CLIP_CENTER: Coordinate = Coordinate::new(40.7589, -73.9851);

    fn north_of(origin: Coordinate, meters: f64) -> Coordinate {
        let degrees = (meters / EARTH_RADIUS_M).to_degrees();
        Coordinate::new(origin.latitude + degrees, origin.longitude)
    }

    fn catalog() -> StoryCatalog {
        StoryCatalog::from_stories(vec![
            Story::new("single", "Single Clip").with_clip(SoundClip::new(
                "times-square",
                "times_square.mp3",
                CLIP_CENTER,
                100.0,
            )),
            Story::new("overlap", "Overlapping Clips")
                .with_clip(SoundClip::new("first", "first.mp3", CLIP_CENTER, 100.0))
                .with_clip(SoundClip::new(
                    "second",
                    "second.mp3",
                    north_of(CLIP_CENTER, 30.0),
                    100.0,
                )),
        ])
        .unwrap()
    }

    struct Fixture {
        engine: GeoSonicEngine,
        gps: ManualPositionSource,
        player: HeadlessAudioPlayer,
        clock: ManualClock,
    }

    fn fixture_with(desc: GeoSonicDesc) -> Fixture {
        let _ = env_logger::builder().is_test(true).try_init();

        let gps = ManualPositionSource::new();
        let player = HeadlessAudioPlayer::new();
        let clock = ManualClock::new();
        let engine = GeoSonicEngine::new(desc, catalog(), gps.clone(), player.clone())
            .unwrap()
            .with_clock(clock.clone());
        Fixture {
            engine,
            gps,
            player,
            clock,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(GeoSonicDesc::default())
    }

    /// Selects a story, starts monitoring and clears the initial volume call.
    fn monitoring(story_id: &str) -> Fixture {
        let mut f = fixture();
        f.engine.select_story(story_id).unwrap();
        f.engine.start_monitoring(None).unwrap();
        f.player.clear_history();
        f.engine.poll_events();
        f
    }

    #[test]
    fn test_enter_zone_triggers_once() {
        let mut f = monitoring("single");

        f.engine.on_position_update(Some(CLIP_CENTER));
        assert_eq!(f.player.history(), vec![PlayerCall::Play("times-square".into())]);
        assert_eq!(f.engine.active_clip_id(), Some("times-square"));

        f.engine.on_position_update(Some(CLIP_CENTER));
        assert_eq!(f.player.play_count(), 1);

        let triggers: Vec<_> = f
            .engine
            .poll_events()
            .into_iter()
            .filter(|e| matches!(e, GeoSonicEvent::ClipTriggered(_)))
            .collect();
        assert_eq!(triggers.len(), 1);
    }

    #[test]
    fn test_exit_zone_stops_playback() {
        let mut f = monitoring("single");
        f.engine.on_position_update(Some(CLIP_CENTER));

        f.engine.on_position_update(Some(north_of(CLIP_CENTER, 150.0)));
        assert_eq!(
            f.player.history(),
            vec![PlayerCall::Play("times-square".into()), PlayerCall::Stop]
        );
        assert_eq!(f.engine.active_clip_id(), None);
        assert!(
            f.engine
                .poll_events()
                .contains(&GeoSonicEvent::ClipStopped {
                    clip_id: "times-square".into()
                })
        );
    }

    #[test]
    fn test_overlapping_zones_last_play_wins() {
        let mut f = monitoring("overlap");

        f.engine.on_position_update(Some(north_of(CLIP_CENTER, 15.0)));
        assert_eq!(
            f.player.history(),
            vec![
                PlayerCall::Play("first".into()),
                PlayerCall::Play("second".into())
            ]
        );
        assert_eq!(f.engine.active_clip_id(), Some("second"));
    }

    #[test]
    fn test_trigger_manually_unknown_clip() {
        let mut f = monitoring("single");
        f.gps.set_last_known(Some(CLIP_CENTER));

        let err = f.engine.trigger_manually("missing-id").unwrap_err();
        assert!(matches!(err, GeoSonicError::ClipNotFound(ref id) if id == "missing-id"));
        assert!(f.player.history().is_empty());
    }

    #[test]
    fn test_start_monitoring_requires_story() {
        let mut f = fixture();
        let err = f.engine.start_monitoring(None).unwrap_err();
        assert!(matches!(err, GeoSonicError::NoStoryLoaded));
        assert_eq!(f.gps.subscribe_calls(), 0);
        assert!(!f.engine.is_monitoring());
    }

    #[test]
    fn test_stop_monitoring_is_idempotent() {
        let mut f = monitoring("single");
        f.engine.on_position_update(Some(CLIP_CENTER));
        f.player.clear_history();

        assert!(f.engine.stop_monitoring().is_ok());
        let after_first = f.player.history();
        assert_eq!(after_first, vec![PlayerCall::Stop]);
        assert_eq!(f.gps.subscriber_count(), 0);

        assert!(f.engine.stop_monitoring().is_ok());
        assert_eq!(f.player.history(), after_first);
        assert!(!f.engine.is_monitoring());
    }

    #[test]
    fn test_cooldown_blocks_reentry_until_expired() {
        let mut f = monitoring("single");
        let outside = north_of(CLIP_CENTER, 500.0);

        f.engine.on_position_update(Some(CLIP_CENTER));
        f.engine.on_position_update(Some(outside));
        f.clock.advance(Duration::from_secs(5));
        f.engine.on_position_update(Some(CLIP_CENTER));
        assert_eq!(f.player.play_count(), 1);
        assert_eq!(
            f.engine.cooldown_remaining("times-square"),
            Some(Duration::from_secs(5))
        );

        f.clock.advance(Duration::from_secs(5));
        f.engine.on_position_update(Some(CLIP_CENTER));
        assert_eq!(f.player.play_count(), 2);
        assert!(
            f.engine
                .poll_events()
                .contains(&GeoSonicEvent::CooldownExpired {
                    clip_id: "times-square".into()
                })
        );
    }

    #[test]
    fn test_callback_sees_every_update_and_trigger() {
        let mut f = fixture();
        let seen: Rc<RefCell<Vec<MonitorUpdate>>> = Rc::default();
        let sink = seen.clone();

        f.engine.select_story("single").unwrap();
        f.engine
            .start_monitoring(Some(Box::new(move |update: &MonitorUpdate| {
                sink.borrow_mut().push(update.clone());
            })))
            .unwrap();

        f.engine.on_position_update(Some(CLIP_CENTER));
        f.engine.on_position_update(None);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], MonitorUpdate::Position(Some(CLIP_CENTER)));
        match &seen[1] {
            MonitorUpdate::Triggered(event) => {
                assert_eq!(event.clip.id, "times-square");
                assert_eq!(event.distance_m, 0.0);
                assert!(!event.manual);
            }
            other => panic!("expected trigger, got {:?}", other),
        }
        assert_eq!(seen[2], MonitorUpdate::Position(None));
    }

    #[test]
    fn test_signal_loss_does_not_touch_audio() {
        let mut f = monitoring("single");
        f.engine.on_position_update(Some(CLIP_CENTER));
        f.player.clear_history();

        f.engine.on_position_update(None);
        assert!(f.player.history().is_empty());
        assert_eq!(f.engine.active_clip_id(), Some("times-square"));
        assert!(f.engine.poll_events().contains(&GeoSonicEvent::SignalLost));
    }

    #[test]
    fn test_updates_ignored_when_not_monitoring() {
        let mut f = fixture();
        f.engine.select_story("single").unwrap();
        f.engine.on_position_update(Some(CLIP_CENTER));
        assert!(f.player.history().is_empty());
    }

    #[test]
    fn test_pump_drains_position_source() {
        let mut f = monitoring("single");
        f.gps.push(Some(north_of(CLIP_CENTER, 300.0)));
        f.gps.push(Some(CLIP_CENTER));
        f.gps.push(Some(CLIP_CENTER));

        assert_eq!(f.engine.pump(), 3);
        assert_eq!(f.player.play_count(), 1);
        assert_eq!(f.engine.pump(), 0);
    }

    #[test]
    fn test_select_story_resets_trigger_state() {
        let mut f = monitoring("single");
        f.engine.on_position_update(Some(CLIP_CENTER));

        f.engine.select_story("single").unwrap();
        assert_eq!(f.engine.active_clip_id(), None);
        assert_eq!(f.engine.cooldown_remaining("times-square"), None);

        f.engine.on_position_update(Some(CLIP_CENTER));
        assert_eq!(f.player.play_count(), 2);
    }

    #[test]
    fn test_select_unknown_story_keeps_state() {
        let mut f = monitoring("single");
        f.engine.on_position_update(Some(CLIP_CENTER));

        let err = f.engine.select_story("nope").unwrap_err();
        assert!(matches!(err, GeoSonicError::StoryNotFound(_)));
        assert_eq!(f.engine.current_story().map(|s| s.id.as_str()), Some("single"));
        assert_eq!(f.engine.active_clip_id(), Some("times-square"));
    }

    #[test]
    fn test_permission_errors_surface_verbatim() {
        let mut f = fixture();
        f.engine.select_story("single").unwrap();

        f.gps.set_permission_granted(false);
        let err = f.engine.start_monitoring(None).unwrap_err();
        assert!(matches!(err, GeoSonicError::PermissionDenied(_)));
        assert!(err.is_terminal());
        assert!(!f.engine.is_monitoring());

        f.gps.set_permission_granted(true);
        f.gps.set_services_enabled(false);
        let err = f.engine.start_monitoring(None).unwrap_err();
        assert!(matches!(err, GeoSonicError::ServicesDisabled(_)));

        f.gps.set_services_enabled(true);
        assert!(f.engine.start_monitoring(None).is_ok());
        assert!(f.engine.is_monitoring());
    }

    #[test]
    fn test_trigger_manually() {
        let mut f = monitoring("single");

        let err = f.engine.trigger_manually("times-square").unwrap_err();
        assert!(matches!(err, GeoSonicError::NoLocationAvailable));
        assert!(f.player.history().is_empty());

        let here = north_of(CLIP_CENTER, 40.0);
        f.gps.set_last_known(Some(here));
        f.engine.on_position_update(Some(here));
        f.engine.on_position_update(Some(north_of(CLIP_CENTER, 400.0)));
        f.engine.poll_events();

        // Still cooling down, but manual triggers are never suppressed.
        f.engine.trigger_manually("times-square").unwrap();
        assert_eq!(f.player.play_count(), 2);
        assert_eq!(f.engine.active_clip_id(), Some("times-square"));

        let events = f.engine.poll_events();
        match events.as_slice() {
            [GeoSonicEvent::ClipTriggered(event)] => {
                assert!(event.manual);
                assert!((event.distance_m - 40.0).abs() < 0.01);
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[test]
    fn test_trigger_manually_without_story() {
        let mut f = fixture();
        f.gps.set_last_known(Some(CLIP_CENTER));
        assert!(matches!(
            f.engine.trigger_manually("times-square"),
            Err(GeoSonicError::NoStoryLoaded)
        ));
    }

    #[test]
    fn test_play_failure_keeps_monitoring() {
        let mut f = monitoring("single");
        f.player.fail_next_call("decoder crashed");

        f.engine.on_position_update(Some(CLIP_CENTER));
        assert!(f.engine.is_monitoring());
        assert_eq!(f.engine.active_clip_id(), None);
        assert!(f.engine.poll_events().iter().any(|e| e.is_error()));

        // The failed attempt still started the cooldown.
        f.engine.on_position_update(Some(CLIP_CENTER));
        assert_eq!(f.player.status().current_clip_id, None);

        f.clock.advance(Duration::from_secs(10));
        f.engine.on_position_update(Some(CLIP_CENTER));
        assert_eq!(f.engine.active_clip_id(), Some("times-square"));
    }

    #[test]
    fn test_entry_and_exit_buffers() {
        let mut f = fixture_with(GeoSonicDesc::new().entry_buffer_m(30.0).exit_buffer_m(50.0));
        f.engine.select_story("single").unwrap();
        f.engine.start_monitoring(None).unwrap();
        f.player.clear_history();

        let buffered = north_of(CLIP_CENTER, 120.0);
        f.engine.on_position_update(Some(buffered));
        assert_eq!(f.engine.active_clip_id(), Some("times-square"));
        // Listed against the nominal radius.
        assert!(!f.engine.nearby_clips(&buffered)[0].is_in_range);

        f.engine.on_position_update(Some(north_of(CLIP_CENTER, 140.0)));
        assert_eq!(f.engine.active_clip_id(), Some("times-square"));

        f.engine.on_position_update(Some(north_of(CLIP_CENTER, 160.0)));
        assert_eq!(f.engine.active_clip_id(), None);
        assert_eq!(
            f.player.history(),
            vec![PlayerCall::Play("times-square".into()), PlayerCall::Stop]
        );
    }

    #[test]
    fn test_invalid_position_is_reported() {
        let mut f = monitoring("single");
        f.engine.on_position_update(Some(Coordinate::new(f64::NAN, 0.0)));
        assert!(f.player.history().is_empty());
        assert!(f.engine.poll_events().iter().any(|e| e.is_error()));
    }

    #[test]
    fn test_status_and_nearby_clips() {
        let mut f = fixture();
        assert!(f.engine.nearby_clips(&CLIP_CENTER).is_empty());

        f.engine.select_story("overlap").unwrap();
        f.engine.start_monitoring(None).unwrap();
        f.engine.on_position_update(Some(north_of(CLIP_CENTER, 40.0)));

        let status = f.engine.status();
        assert!(status.is_monitoring);
        assert!(status.location_tracking_active);
        assert!(status.audio_loaded);
        assert_eq!(status.active_clip_id.as_deref(), Some("second"));
        assert_eq!(
            status.current_story.map(|s| s.id),
            Some("overlap".to_string())
        );

        let nearby = f.engine.nearby_clips(&north_of(CLIP_CENTER, 40.0));
        let ids: Vec<&str> = nearby.iter().map(|n| n.clip.id.as_str()).collect();
        assert_eq!(ids, vec!["second", "first"]);
        assert!(nearby.iter().all(|n| n.is_in_range));
        assert_eq!(nearby[0].formatted_distance, "10m");
    }

    #[test]
    fn test_cleanup_releases_everything() {
        let mut f = monitoring("single");
        f.engine.on_position_update(Some(CLIP_CENTER));

        f.engine.cleanup().unwrap();
        assert!(!f.engine.is_monitoring());
        assert!(f.engine.current_story().is_none());
        assert_eq!(f.engine.active_clip_id(), None);
        assert_eq!(f.engine.cooldown_remaining("times-square"), None);
        assert_eq!(
            f.player.history(),
            vec![
                PlayerCall::Play("times-square".into()),
                PlayerCall::Stop,
                PlayerCall::Release
            ]
        );
        assert_eq!(f.gps.subscriber_count(), 0);
        assert!(f.engine.poll_events().contains(&GeoSonicEvent::CleanedUp));
    }

    #[test]
    fn test_stop_monitoring_stops_manual_clip() {
        let mut f = fixture();
        f.engine.select_story("single").unwrap();
        f.gps.set_last_known(Some(CLIP_CENTER));
        f.engine.trigger_manually("times-square").unwrap();
        f.engine.poll_events();

        f.engine.stop_monitoring().unwrap();
        assert_eq!(
            f.player.history(),
            vec![PlayerCall::Play("times-square".into()), PlayerCall::Stop]
        );
        assert!(!f.player.status().is_playing);
        assert_eq!(f.engine.active_clip_id(), None);
        assert_eq!(
            f.engine.poll_events(),
            vec![GeoSonicEvent::ClipStopped {
                clip_id: "times-square".into()
            }]
        );

        f.engine.stop_monitoring().unwrap();
        assert_eq!(f.player.history().len(), 2);
    }

    #[test]
    fn test_select_story_leaves_audio_to_caller() {
        let mut f = monitoring("single");
        f.engine.on_position_update(Some(CLIP_CENTER));

        f.engine.select_story("single").unwrap();
        f.engine.on_position_update(Some(north_of(CLIP_CENTER, 1100.0)));
        assert_eq!(f.player.history(), vec![PlayerCall::Play("times-square".into())]);
        assert!(f.player.status().is_playing);
        assert_eq!(f.engine.active_clip_id(), None);

        f.engine.stop_monitoring().unwrap();
        assert!(!f.player.status().is_playing);
    }

    #[test]
    fn test_trigger_timestamps_follow_clock() {
        let _ = env_logger::builder().is_test(true).try_init();
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let clock = ManualClock::starting_at(start);
        let gps = ManualPositionSource::new();
        let mut engine = GeoSonicEngine::new(
            GeoSonicDesc::default(),
            catalog(),
            gps.clone(),
            HeadlessAudioPlayer::new(),
        )
        .unwrap()
        .with_clock(clock.clone());

        engine.select_story("single").unwrap();
        engine.start_monitoring(None).unwrap();
        clock.advance(Duration::from_secs(5));
        engine.on_position_update(Some(CLIP_CENTER));

        gps.set_last_known(Some(CLIP_CENTER));
        clock.advance(Duration::from_secs(2));
        engine.trigger_manually("times-square").unwrap();

        let timestamps: Vec<SystemTime> = engine
            .poll_events()
            .into_iter()
            .filter_map(|event| match event {
                GeoSonicEvent::ClipTriggered(trigger) => Some(trigger.timestamp),
                _ => None,
            })
            .collect();
        assert_eq!(
            timestamps,
            vec![
                start + Duration::from_secs(5),
                start + Duration::from_secs(7)
            ]
        );
    }

    #[test]
    fn test_audio_passthroughs() {
        let mut f = monitoring("single");
        f.engine.on_position_update(Some(CLIP_CENTER));

        f.engine.pause_audio().unwrap();
        assert!(!f.player.status().is_playing);
        f.engine.resume_audio().unwrap();
        assert!(f.player.status().is_playing);

        f.engine.set_volume(0.5).unwrap();
        assert_eq!(f.player.status().volume, 0.5);
        assert!(f.engine.set_volume(2.0).is_err());
    }

    #[test]
    fn test_event_queue_drops_oldest() {
        let mut f = fixture_with(GeoSonicDesc::new().max_pending_events(2));
        f.engine.select_story("single").unwrap();
        f.engine.select_story("overlap").unwrap();
        f.engine.select_story("single").unwrap();

        let events = f.engine.poll_events();
        assert_eq!(
            events,
            vec![
                GeoSonicEvent::StorySelected {
                    story_id: "overlap".into()
                },
                GeoSonicEvent::StorySelected {
                    story_id: "single".into()
                },
            ]
        );
    }
}
