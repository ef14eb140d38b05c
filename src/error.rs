//! Error types for GeoSonic

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoSonicError {
    #[error("Story not found: {0}")]
    StoryNotFound(String),

    #[error("Clip not found: {0}")]
    ClipNotFound(String),

    #[error("No story loaded")]
    NoStoryLoaded,

    #[error("No location available")]
    NoLocationAvailable,

    #[error("Location permission denied: {0}")]
    PermissionDenied(String),

    #[error("Location services disabled: {0}")]
    ServicesDisabled(String),

    #[error("Location error: {0}")]
    Location(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Audio loading error: {0}")]
    AudioLoading(String),

    #[error("Audio format error: {0}")]
    AudioFormat(String),

    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Invalid coordinate: ({latitude}, {longitude})")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GeoSonicError {
    /// Permission and service errors stay until the user changes device
    /// settings; retrying `start_monitoring` will not help before then.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::PermissionDenied(_) | Self::ServicesDisabled(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::StoryNotFound(_) | Self::ClipNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, GeoSonicError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(GeoSonicError::PermissionDenied("denied".into()).is_terminal());
        assert!(GeoSonicError::ServicesDisabled("off".into()).is_terminal());
        assert!(!GeoSonicError::NoStoryLoaded.is_terminal());

        assert!(GeoSonicError::ClipNotFound("x".into()).is_not_found());
        assert!(GeoSonicError::StoryNotFound("x".into()).is_not_found());
        assert!(!GeoSonicError::NoLocationAvailable.is_not_found());
    }

    #[test]
    fn test_error_messages() {
        let err = GeoSonicError::InvalidCoordinate {
            latitude: 91.0,
            longitude: 0.0,
        };
        assert_eq!(err.to_string(), "Invalid coordinate: (91, 0)");
        assert_eq!(
            GeoSonicError::ClipNotFound("missing-id".into()).to_string(),
            "Clip not found: missing-id"
        );
    }
}
