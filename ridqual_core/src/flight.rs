//! Flight track data model.
//!
//! Tracks are append-only while generated and read-only afterwards; every
//! downstream component (partitioner, query builder, reconciler) borrows
//! them immutably.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a synthesized flight.
///
/// Uses UUID v4 for global uniqueness without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlightId(pub Uuid);

impl FlightId {
    /// Creates a new random FlightId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a FlightId from a UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Creates a deterministic FlightId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for FlightId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FlightId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Errors raised while assembling a track.
#[derive(Debug, Error)]
pub enum TrackError {
    /// Timestamps must be monotonically non-decreasing along the track
    #[error("track timestamp at index {index} precedes its predecessor")]
    NonMonotonic { index: usize },
}

/// A point on a flight track, in the WGS84 datum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlightPoint {
    /// Degrees of latitude north of the equator
    pub lat: f64,

    /// Degrees of longitude east of the Prime Meridian
    pub lng: f64,

    /// Altitude in meters
    pub alt: f64,

    /// Ground speed in m/s
    pub speed: f64,

    /// Forward azimuth to the next point on the track, in degrees
    pub bearing: f64,
}

/// A flight point together with the instant the aircraft occupies it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    /// Instant the aircraft is at `position`
    pub time: DateTime<Utc>,

    /// Position and kinematics at `time`
    pub position: FlightPoint,
}

/// Ordered sequence of track points forming one flight.
///
/// Construction validates that timestamps never decrease; after that the
/// track is immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    points: Vec<TrackPoint>,
}

impl Track {
    /// Creates a track, validating timestamp monotonicity.
    pub fn new(points: Vec<TrackPoint>) -> Result<Self, TrackError> {
        for (index, pair) in points.windows(2).enumerate() {
            if pair[1].time < pair[0].time {
                return Err(TrackError::NonMonotonic { index: index + 1 });
            }
        }
        Ok(Self { points })
    }

    /// Returns the ordered track points.
    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    /// Returns the number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if the track has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Timestamp of the first point, if any.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.points.first().map(|p| p.time)
    }

    /// Timestamp of the last point, if any.
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.points.last().map(|p| p.time)
    }
}

/// RID-specific details shared in remote identification calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RidFlightDetails {
    /// Operator-assigned flight identifier
    pub id: String,

    /// Identity of the operating entity
    pub operator_id: String,

    /// Free-text description of the operation
    pub operation_description: String,

    /// Aircraft serial number
    pub serial_number: String,
}

/// Metadata associated with a generated flight, shared as information in
/// the remote identification call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightDetails {
    pub rid_details: RidFlightDetails,
    pub operator_name: String,

    /// Generic type of aircraft, e.g. "Multirotor"
    pub aircraft_type: String,
}

/// Everything known about one synthesized flight: identity, timing
/// reference, the track itself, and its operator metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullFlightRecord {
    pub flight_id: FlightId,

    /// Instant the flight's timeline is anchored to
    pub reference_time: DateTime<Utc>,

    pub track: Track,
    pub details: FlightDetails,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn point(lat: f64, lng: f64) -> FlightPoint {
        FlightPoint {
            lat,
            lng,
            alt: 50.0,
            speed: 5.0,
            bearing: 90.0,
        }
    }

    #[test]
    fn test_flight_id_from_seed_deterministic() {
        assert_eq!(FlightId::from_seed(7), FlightId::from_seed(7));
        assert_ne!(FlightId::from_seed(7), FlightId::from_seed(8));
    }

    #[test]
    fn test_flight_id_display_is_short() {
        let id = FlightId::from_seed(42);
        assert_eq!(id.to_string().len(), 8);
    }

    #[test]
    fn test_track_accepts_monotonic_timestamps() {
        let t0 = DateTime::from_timestamp(1704067200, 0).unwrap();
        let points = vec![
            TrackPoint { time: t0, position: point(46.97, 7.47) },
            TrackPoint { time: t0 + TimeDelta::seconds(1), position: point(46.97, 7.48) },
            TrackPoint { time: t0 + TimeDelta::seconds(1), position: point(46.97, 7.49) },
        ];
        let track = Track::new(points).unwrap();
        assert_eq!(track.len(), 3);
        assert_eq!(track.start_time(), Some(t0));
        assert_eq!(track.end_time(), Some(t0 + TimeDelta::seconds(1)));
    }

    #[test]
    fn test_track_rejects_decreasing_timestamps() {
        let t0 = DateTime::from_timestamp(1704067200, 0).unwrap();
        let points = vec![
            TrackPoint { time: t0 + TimeDelta::seconds(5), position: point(46.97, 7.47) },
            TrackPoint { time: t0, position: point(46.97, 7.48) },
        ];
        let err = Track::new(points).unwrap_err();
        assert!(matches!(err, TrackError::NonMonotonic { index: 1 }));
    }
}
