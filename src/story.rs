//! Stories and the sound clips they place on the map

use crate::geo::Coordinate;
use std::sync::Arc;

/// A sound anchored to a circular geofence.
///
/// Clips are immutable once loaded. The engine shares them as `Arc<SoundClip>`
/// between the current story, trigger events and status queries.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundClip {
    /// Unique within the owning story
    pub id: String,
    /// Audio file reference, resolved by the audio player
    pub file: String,
    /// Center of the geofence
    pub coordinate: Coordinate,
    /// Geofence radius in meters, always > 0 for catalog-loaded clips
    pub radius: f64,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl SoundClip {
    pub fn new(
        id: impl Into<String>,
        file: impl Into<String>,
        coordinate: Coordinate,
        radius: f64,
    ) -> Self {
        Self {
            id: id.into(),
            file: file.into(),
            coordinate,
            radius,
            title: None,
            description: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Title if present, otherwise the clip id.
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

/// An ordered collection of sound clips the listener walks through.
#[derive(Debug, Clone, PartialEq)]
pub struct Story {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub clips: Vec<Arc<SoundClip>>,
}

impl Story {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            clips: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_clip(mut self, clip: SoundClip) -> Self {
        self.clips.push(Arc::new(clip));
        self
    }

    pub fn clip(&self, clip_id: &str) -> Option<&Arc<SoundClip>> {
        self.clips.iter().find(|clip| clip.id == clip_id)
    }

    pub fn summary(&self) -> StorySummary {
        StorySummary {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
        }
    }
}

/// Catalog listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorySummary {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
}
