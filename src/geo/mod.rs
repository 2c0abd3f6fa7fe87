//! Great-circle distance utilities
//!
//! This module provides the coordinate type shared by every other component and
//! the pure functions used to measure and describe distances between points.
//!
//! Distances are computed with the haversine formula on a sphere of radius
//! [`EARTH_RADIUS_KM`], i.e. "as the crow flies". No routing is involved.
//!
//! # Example
//!
//! ```
//! use friendradar::geo::{distance_km, format_distance, Coordinate};
//!
//! let canterbury = Coordinate::new(51.297269, 1.069740)?;
//! let dover = Coordinate::new(51.1279, 1.3134)?;
//!
//! let km = distance_km(canterbury, dover);
//! assert!(km > 20.0 && km < 30.0);
//! assert!(format_distance(km).starts_with("Distance away: "));
//! # Ok::<(), friendradar::geo::CoordinateError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use thiserror::Error;

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometres in one statute mile
pub const KM_PER_MILE: f64 = 1.609344;

/// Errors raised when constructing a [`Coordinate`]
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CoordinateError {
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),
}

/// A point on the Earth's surface in decimal degrees
///
/// Coordinates are immutable once constructed. Out-of-range values are
/// rejected by [`Coordinate::new`] rather than clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

/// Unvalidated wire form, used so serde goes through [`Coordinate::new`]
#[derive(Deserialize)]
struct RawCoordinate {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = CoordinateError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.latitude, raw.longitude)
    }
}

impl Coordinate {
    /// Create a coordinate, rejecting values outside the valid ranges
    ///
    /// NaN fails both range checks and is rejected the same way.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinateError::LongitudeOutOfRange(longitude));
        }

        Ok(Self { latitude, longitude })
    }

    /// Build a compile-time constant; callers guarantee the ranges
    pub(crate) const fn from_trusted(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    #[inline]
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    #[inline]
    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Convert degrees to radians as `value * π / 180`
#[inline]
pub fn to_radians(degrees: f64) -> f64 {
    degrees * PI / 180.0
}

/// Convert kilometres to statute miles
#[inline]
pub fn km_to_miles(km: f64) -> f64 {
    km / KM_PER_MILE
}

/// Great-circle distance between two coordinates in kilometres
///
/// Symmetric in its arguments and exactly zero when `a == b`.
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat_distance = to_radians(b.latitude - a.latitude);
    let lon_distance = to_radians(b.longitude - a.longitude);

    let h = (lat_distance / 2.0).sin() * (lat_distance / 2.0).sin()
        + to_radians(a.latitude).cos()
            * to_radians(b.latitude).cos()
            * (lon_distance / 2.0).sin()
            * (lon_distance / 2.0).sin();

    EARTH_RADIUS_KM * (2.0 * h.sqrt().atan2((1.0 - h).sqrt()))
}

/// Format a distance as `"Distance away: {meters}m | {miles:.2}mi"`
///
/// Metres are truncated toward zero, not rounded.
///
/// # Examples
///
/// ```
/// use friendradar::geo::format_distance;
///
/// assert_eq!(format_distance(0.0), "Distance away: 0m | 0.00mi");
/// assert_eq!(format_distance(1.609344), "Distance away: 1609m | 1.00mi");
/// ```
pub fn format_distance(distance_km: f64) -> String {
    let meters = (distance_km * 1000.0) as i64;
    format!("Distance away: {}m | {:.2}mi", meters, km_to_miles(distance_km))
}
