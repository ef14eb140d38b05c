//! Story catalog: lookup of stories by id and the bundled JSON document format.
//!
//! The bundled document looks like this:
//!
//! ```json
//! {
//!   "stories": [
//!     {
//!       "id": "midtown",
//!       "title": "Midtown Voices",
//!       "description": "Optional",
//!       "soundClips": [
//!         { "id": "intro", "file": "intro.mp3", "latitude": 40.7589,
//!           "longitude": -73.9851, "radius": 100, "title": "Optional" }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! `lat`/`lng` are accepted as aliases for `latitude`/`longitude`.

use crate::error::{GeoSonicError, Result};
use crate::geo::{Coordinate, is_valid_coordinate};
use crate::story::{SoundClip, Story, StorySummary};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Read-only source of stories consumed by the engine.
pub trait CatalogProvider {
    /// Returns the story with the given id, if any.
    fn story_by_id(&self, id: &str) -> Option<Arc<Story>>;

    /// Lists every story in catalog order.
    fn list_stories(&self) -> Vec<StorySummary>;
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    stories: Vec<RawStory>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStory {
    id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    sound_clips: Option<Vec<RawClip>>,
}

#[derive(Debug, Deserialize)]
struct RawClip {
    id: Option<String>,
    file: Option<String>,
    #[serde(alias = "lat")]
    latitude: Option<f64>,
    #[serde(alias = "lng")]
    longitude: Option<f64>,
    radius: Option<f64>,
    title: Option<String>,
    description: Option<String>,
}

/// In-memory catalog built from validated stories.
#[derive(Debug, Clone, Default)]
pub struct StoryCatalog {
    stories: Vec<Arc<Story>>,
}

impl StoryCatalog {
    /// Builds a catalog from stories constructed in code, applying the same
    /// checks as the JSON loader.
    pub fn from_stories(stories: Vec<Story>) -> Result<Self> {
        let mut seen = HashSet::new();
        for story in &stories {
            validate_story(story)?;
            if !seen.insert(story.id.clone()) {
                return Err(GeoSonicError::Catalog(format!(
                    "Duplicate story id '{}'",
                    story.id
                )));
            }
        }

        Ok(Self {
            stories: stories.into_iter().map(Arc::new).collect(),
        })
    }

    /// Parses and validates a catalog document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: CatalogDocument = serde_json::from_str(json)?;

        let stories = document
            .stories
            .into_iter()
            .enumerate()
            .map(|(index, raw)| convert_story(index, raw))
            .collect::<Result<Vec<_>>>()?;

        let catalog = Self::from_stories(stories)?;
        log::info!("Loaded catalog with {} stories", catalog.len());
        Ok(catalog)
    }

    /// Reads and validates a catalog document from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Story>> {
        self.stories.iter()
    }
}

impl CatalogProvider for StoryCatalog {
    fn story_by_id(&self, id: &str) -> Option<Arc<Story>> {
        self.stories.iter().find(|story| story.id == id).cloned()
    }

    fn list_stories(&self) -> Vec<StorySummary> {
        self.stories.iter().map(|story| story.summary()).collect()
    }
}

fn required(value: Option<String>, what: &str, context: &str) -> Result<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(GeoSonicError::Catalog(format!(
            "{} is missing required field '{}'",
            context, what
        ))),
    }
}

fn convert_story(index: usize, raw: RawStory) -> Result<Story> {
    let context = format!("Story #{}", index);
    let id = required(raw.id, "id", &context)?;
    let context = format!("Story '{}'", id);
    let title = required(raw.title, "title", &context)?;
    let raw_clips = raw.sound_clips.ok_or_else(|| {
        GeoSonicError::Catalog(format!("{} is missing required field 'soundClips'", context))
    })?;

    let mut story = Story::new(id, title);
    story.description = raw.description;

    for (clip_index, raw_clip) in raw_clips.into_iter().enumerate() {
        let clip_context = format!("{} clip #{}", context, clip_index);
        let clip_id = required(raw_clip.id, "id", &clip_context)?;
        let clip_context = format!("{} clip '{}'", context, clip_id);
        let file = required(raw_clip.file, "file", &clip_context)?;

        let (latitude, longitude) = match (raw_clip.latitude, raw_clip.longitude) {
            (Some(latitude), Some(longitude)) => (latitude, longitude),
            _ => {
                return Err(GeoSonicError::Catalog(format!(
                    "{} is missing latitude/longitude",
                    clip_context
                )));
            }
        };
        let radius = raw_clip.radius.ok_or_else(|| {
            GeoSonicError::Catalog(format!("{} is missing required field 'radius'", clip_context))
        })?;

        let mut clip = SoundClip::new(clip_id, file, Coordinate::new(latitude, longitude), radius);
        clip.title = raw_clip.title;
        clip.description = raw_clip.description;
        story.clips.push(Arc::new(clip));
    }

    Ok(story)
}

fn validate_story(story: &Story) -> Result<()> {
    if story.id.trim().is_empty() {
        return Err(GeoSonicError::Catalog("Story id must not be empty".into()));
    }
    if story.title.trim().is_empty() {
        return Err(GeoSonicError::Catalog(format!(
            "Story '{}' has an empty title",
            story.id
        )));
    }

    let mut clip_ids = HashSet::new();
    for clip in &story.clips {
        if clip.id.trim().is_empty() {
            return Err(GeoSonicError::Catalog(format!(
                "Story '{}' contains a clip with an empty id",
                story.id
            )));
        }
        if !clip_ids.insert(clip.id.as_str()) {
            return Err(GeoSonicError::Catalog(format!(
                "Story '{}' has duplicate clip id '{}'",
                story.id, clip.id
            )));
        }
        if clip.file.trim().is_empty() {
            return Err(GeoSonicError::Catalog(format!(
                "Clip '{}' in story '{}' has no file reference",
                clip.id, story.id
            )));
        }
        if !is_valid_coordinate(clip.coordinate.latitude, clip.coordinate.longitude) {
            return Err(GeoSonicError::Catalog(format!(
                "Clip '{}' in story '{}' has invalid coordinate {}",
                clip.id, story.id, clip.coordinate
            )));
        }
        if !clip.radius.is_finite() || clip.radius <= 0.0 {
            return Err(GeoSonicError::Catalog(format!(
                "Clip '{}' in story '{}' has invalid radius {}",
                clip.id, story.id, clip.radius
            )));
        }
    }

    Ok(())
}
