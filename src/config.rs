//! Configuration for GeoSonic

use crate::error::{GeoSonicError, Result};
use std::time::Duration;

/// Configuration descriptor for a trigger engine
#[derive(Debug, Clone)]
pub struct GeoSonicDesc {
    /// How long a triggered clip is barred from triggering again
    pub cooldown: Duration,
    /// Meters added to a clip's radius when deciding whether the listener entered it
    pub entry_buffer_m: f64,
    /// Meters added to the active clip's radius when deciding whether the listener left it
    pub exit_buffer_m: f64,
    /// Volume applied to the player when monitoring starts
    pub initial_volume: f32,
    /// Capacity of the engine event queue; the oldest events are dropped when full
    pub max_pending_events: usize,
}

impl Default for GeoSonicDesc {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(10),
            entry_buffer_m: 0.0,
            exit_buffer_m: 0.0,
            initial_volume: 1.0,
            max_pending_events: 256,
        }
    }
}

impl GeoSonicDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn entry_buffer_m(mut self, meters: f64) -> Self {
        self.entry_buffer_m = meters;
        self
    }

    pub fn exit_buffer_m(mut self, meters: f64) -> Self {
        self.exit_buffer_m = meters;
        self
    }

    pub fn initial_volume(mut self, volume: f32) -> Self {
        self.initial_volume = volume;
        self
    }

    pub fn max_pending_events(mut self, max: usize) -> Self {
        self.max_pending_events = max;
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("entry_buffer_m", self.entry_buffer_m),
            ("exit_buffer_m", self.exit_buffer_m),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(GeoSonicError::Configuration(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        if !self.initial_volume.is_finite() || !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(GeoSonicError::Configuration(format!(
                "initial_volume must be between 0 and 1, got {}",
                self.initial_volume
            )));
        }

        if self.max_pending_events == 0 {
            return Err(GeoSonicError::Configuration(
                "max_pending_events must be at least 1".into(),
            ));
        }

        Ok(())
    }
}
