//! Geographic math for GeoSonic
//!
//! Everything here is a pure function over WGS-84 latitude/longitude pairs in
//! degrees. Distances use the Haversine formula on a spherical Earth, which is
//! well within GPS accuracy at the scale of a walking tour.

use crate::error::{GeoSonicError, Result};
use crate::story::SoundClip;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a coordinate without range checks. Use [`Coordinate::try_new`]
    /// for values coming from outside the process.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Creates a coordinate, rejecting NaN, infinities and out-of-range values.
    pub fn try_new(latitude: f64, longitude: f64) -> Result<Self> {
        if is_valid_coordinate(latitude, longitude) {
            Ok(Self::new(latitude, longitude))
        } else {
            Err(GeoSonicError::InvalidCoordinate {
                latitude,
                longitude,
            })
        }
    }

    pub fn is_valid(&self) -> bool {
        is_valid_coordinate(self.latitude, self.longitude)
    }

    /// Great-circle distance to `other` in meters.
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        distance_meters(self, other)
    }

    /// Initial bearing towards `other`, in degrees clockwise from north.
    pub fn bearing_to(&self, other: &Coordinate) -> f64 {
        bearing_degrees(self, other)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Haversine great-circle distance in meters.
///
/// Returns exactly 0 for identical points. The longitude delta only enters
/// through `sin²(Δλ/2)`, which has a period of 360°, so longitudes of -180 and
/// 180 describe the same meridian.
pub fn distance_meters(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat * 0.5).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon * 0.5).sin().powi(2);

    // Rounding can push h a hair outside [0, 1] for antipodal or polar points.
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Initial bearing from `a` to `b`, normalized to `[0, 360)`.
pub fn bearing_degrees(a: &Coordinate, b: &Coordinate) -> f64 {
    if a == b {
        return 0.0;
    }

    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();

    let bearing = y.atan2(x).to_degrees().rem_euclid(360.0);
    if bearing >= 360.0 { 0.0 } else { bearing }
}

pub fn is_valid_coordinate(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

/// Whether `point` lies inside the clip's geofence. The boundary counts as inside.
pub fn is_within_radius(point: &Coordinate, clip: &SoundClip) -> bool {
    is_within_buffered_radius(point, clip, 0.0)
}

/// Like [`is_within_radius`] with `buffer_m` added to the clip radius.
pub fn is_within_buffered_radius(point: &Coordinate, clip: &SoundClip, buffer_m: f64) -> bool {
    distance_meters(point, &clip.coordinate) <= clip.radius + buffer_m
}

/// Human readable distance: whole meters below 1 km, otherwise kilometers
/// with one decimal (`500m`, `1.0km`, `1.5km`).
pub fn format_distance(meters: f64) -> String {
    let rounded = meters.round();
    if rounded < 1000.0 {
        format!("{}m", rounded as i64)
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}
