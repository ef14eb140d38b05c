//! Event types for GeoSonic

use crate::geo::Coordinate;
use crate::story::SoundClip;
use std::sync::Arc;
use std::time::SystemTime;

/// Emitted when playback starts for a clip.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerEvent {
    pub clip: Arc<SoundClip>,
    /// Distance from the listener to the clip center when it triggered
    pub distance_m: f64,
    pub timestamp: SystemTime,
    /// Started through `trigger_manually` rather than by walking into the zone
    pub manual: bool,
}

/// What the monitoring callback receives.
///
/// Every processed position update produces one `Position`, followed by one
/// `Triggered` per clip that started during that update.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorUpdate {
    Position(Option<Coordinate>),
    Triggered(TriggerEvent),
}

/// Callback registered with `start_monitoring`.
pub type MonitorCallback = Box<dyn FnMut(&MonitorUpdate)>;

#[derive(Debug, Clone, PartialEq)]
pub enum GeoSonicEvent {
    StorySelected { story_id: String },
    MonitoringStarted { story_id: String },
    MonitoringStopped,
    ClipTriggered(TriggerEvent),
    ClipStopped { clip_id: String },
    SignalLost,
    CooldownExpired { clip_id: String },
    EvaluationError { error: String },
    CleanedUp,
}

impl GeoSonicEvent {
    pub fn clip_id(&self) -> Option<&str> {
        match self {
            Self::ClipTriggered(event) => Some(&event.clip.id),
            Self::ClipStopped { clip_id } | Self::CooldownExpired { clip_id } => Some(clip_id),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::EvaluationError { .. })
    }

    pub fn is_clip_event(&self) -> bool {
        matches!(
            self,
            Self::ClipTriggered(_) | Self::ClipStopped { .. } | Self::CooldownExpired { .. }
        )
    }
}
