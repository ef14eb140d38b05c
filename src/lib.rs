//! GeoSonic plays location-based audio stories.
//!
//! A story is a set of sound clips, each pinned to a circular geofence. While
//! monitoring, [`GeoSonicEngine`] consumes position fixes from a
//! [`PositionSource`], starts a clip when the listener walks into its zone,
//! stops it when they walk out, and keeps a clip from retriggering until its
//! cooldown expires.

pub mod audio_data;
pub mod catalog;
pub mod config;
pub mod cooldown;
pub mod engine;
pub mod error;
pub mod events;
pub mod geo;
pub mod location;
pub mod playback;
pub mod player;
pub mod status;
pub mod story;

pub use catalog::{CatalogProvider, StoryCatalog};
pub use config::GeoSonicDesc;
pub use cooldown::{Clock, ManualClock, SystemClock};
pub use engine::GeoSonicEngine;
pub use error::GeoSonicError;
pub use events::{GeoSonicEvent, MonitorCallback, MonitorUpdate, TriggerEvent};
pub use geo::Coordinate;
pub use location::{ManualPositionSource, PositionSource, PositionUpdate, SubscriptionId};
pub use player::{AudioPlayer, HeadlessAudioPlayer, PlayerStatus};
pub use status::{EngineStatus, NearbyClip};
pub use story::{SoundClip, Story, StorySummary};

#[cfg(feature = "native")]
pub use player::native::CpalAudioPlayer;
