//! Read-only views over engine state for UI layers.

use crate::geo::{Coordinate, distance_meters, format_distance};
use crate::story::{SoundClip, Story, StorySummary};
use std::sync::Arc;

/// Snapshot returned by `GeoSonicEngine::status`.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStatus {
    pub is_monitoring: bool,
    pub current_story: Option<StorySummary>,
    pub active_clip_id: Option<String>,
    /// Whether the position source is currently tracking
    pub location_tracking_active: bool,
    /// Whether the audio player has a clip loaded
    pub audio_loaded: bool,
}

/// One row of the nearby-clips list.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyClip {
    pub clip: Arc<SoundClip>,
    pub distance_m: f64,
    pub formatted_distance: String,
    /// Within the clip's nominal radius, boundary included
    pub is_in_range: bool,
}

/// Every clip of `story` with its distance from `position`, nearest first.
///
/// Clips at equal distance keep their story order.
pub fn nearby_clips(story: &Story, position: &Coordinate) -> Vec<NearbyClip> {
    let mut nearby: Vec<NearbyClip> = story
        .clips
        .iter()
        .map(|clip| {
            let distance_m = distance_meters(position, &clip.coordinate);
            NearbyClip {
                clip: clip.clone(),
                distance_m,
                formatted_distance: format_distance(distance_m),
                is_in_range: distance_m <= clip.radius,
            }
        })
        .collect();

    nearby.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
    nearby
}
