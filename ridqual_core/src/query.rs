//! Bounding-box query derivation.
//!
//! Turns each cell/sub-track pair into the spatial query an observer
//! worker issues, together with the temporal window during which that
//! query should yield the aircraft. Shapes below the configured minimum
//! diagonal are enlarged by uniform scaling about the cell centroid,
//! within a bounded buffer budget.

use chrono::{DateTime, TimeDelta, Utc};
use geo::{BoundingRect, Centroid, HaversineDistance, Intersects, Point, Polygon, Scale};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::EvaluationConfiguration;
use crate::flight::{FlightId, TrackPoint};
use crate::ridqual_space::GridCellFlight;

/// Widening applied to a single-point sub-track so its validity interval
/// is never zero-width.
pub const SINGLE_POINT_EPSILON_MS: i64 = 100;

/// Multiplicative step used when escalating the buffer factor.
const BUFFER_STEP: f64 = 1.25;

/// Errors raised while deriving a query shape.
#[derive(Debug, Error)]
pub enum QueryGeometryError {
    /// Sub-track with no points cannot anchor a validity interval
    #[error("flight {flight} has an empty sub-track for cell {cell}")]
    EmptySubTrack { flight: FlightId, cell: usize },

    /// Cell polygon has no measurable extent or centroid
    #[error("cell {cell} has no measurable extent")]
    DegenerateCell { cell: usize },

    /// Required enlargement exceeds the configured buffer budget
    #[error(
        "cell {cell} cannot reach a {required_m}m diagonal and contain its \
         sub-track within buffer factor {budget}"
    )]
    BufferBudgetExceeded { cell: usize, required_m: f64, budget: f64 },
}

/// A spatial query together with its temporal validity window.
///
/// During `[timestamp_after, timestamp_before)` the shape is an eligible
/// query target for the aircraft that produced the source sub-track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryBoundingBox {
    pub name: String,
    pub shape: Polygon<f64>,

    /// Inclusive start of the validity window
    pub timestamp_after: DateTime<Utc>,

    /// Exclusive end of the validity window; always after `timestamp_after`
    pub timestamp_before: DateTime<Utc>,
}

impl QueryBoundingBox {
    /// Returns true if `t` falls within the validity window.
    pub fn contains_time(&self, t: DateTime<Utc>) -> bool {
        t >= self.timestamp_after && t < self.timestamp_before
    }

    /// Length of the validity window.
    pub fn validity(&self) -> TimeDelta {
        self.timestamp_before - self.timestamp_after
    }

    /// Haversine length of the shape's bounding-rect diagonal, in meters.
    pub fn diagonal_meters(&self) -> Option<f64> {
        diagonal_meters(&self.shape)
    }
}

fn diagonal_meters(shape: &Polygon<f64>) -> Option<f64> {
    let rect = shape.bounding_rect()?;
    let sw = Point::from(rect.min());
    let ne = Point::from(rect.max());
    Some(sw.haversine_distance(&ne))
}

fn contains_all(shape: &Polygon<f64>, track: &[TrackPoint]) -> bool {
    track
        .iter()
        .all(|tp| shape.intersects(&Point::new(tp.position.lng, tp.position.lat)))
}

/// Enlarges the cell polygon until the diagonal floor and sub-track
/// containment both hold, or the buffer budget runs out.
///
/// Scaling a concave clipped cell about its centroid can lose containment
/// of points near a notch, so containment is re-verified after every step
/// rather than assumed.
fn enlarge_to_diagonal(
    cell_flight: &GridCellFlight,
    config: &EvaluationConfiguration,
) -> Result<Polygon<f64>, QueryGeometryError> {
    let cell = cell_flight.cell_index;
    let diagonal = diagonal_meters(&cell_flight.bounds)
        .filter(|d| *d > 0.0)
        .ok_or(QueryGeometryError::DegenerateCell { cell })?;

    if diagonal >= config.min_query_diagonal && contains_all(&cell_flight.bounds, &cell_flight.track)
    {
        return Ok(cell_flight.bounds.clone());
    }

    let centroid = cell_flight
        .bounds
        .centroid()
        .ok_or(QueryGeometryError::DegenerateCell { cell })?;

    let mut factor = (config.min_query_diagonal / diagonal).max(1.0);
    while factor <= config.max_buffer_factor {
        let candidate = cell_flight.bounds.scale_around_point(factor, factor, centroid);
        let candidate_diagonal = diagonal_meters(&candidate).unwrap_or(0.0);
        if candidate_diagonal >= config.min_query_diagonal
            && contains_all(&candidate, &cell_flight.track)
        {
            return Ok(candidate);
        }
        factor *= BUFFER_STEP;
    }

    Err(QueryGeometryError::BufferBudgetExceeded {
        cell,
        required_m: config.min_query_diagonal,
        budget: config.max_buffer_factor,
    })
}

/// Derives the query for one cell/sub-track pair.
///
/// `ordinal` is the entry's position in the flight's partition sequence;
/// it keeps names unique when a flight re-enters a cell. The validity
/// window spans the sub-track's first to last timestamp, widened by
/// [`SINGLE_POINT_EPSILON_MS`] when those coincide.
pub fn build_query(
    cell_flight: &GridCellFlight,
    flight: FlightId,
    ordinal: usize,
    config: &EvaluationConfiguration,
) -> Result<QueryBoundingBox, QueryGeometryError> {
    let first = cell_flight.track.first().ok_or(QueryGeometryError::EmptySubTrack {
        flight,
        cell: cell_flight.cell_index,
    })?;
    let last = cell_flight.track.last().ok_or(QueryGeometryError::EmptySubTrack {
        flight,
        cell: cell_flight.cell_index,
    })?;

    let shape = enlarge_to_diagonal(cell_flight, config)?;

    let timestamp_after = first.time;
    let timestamp_before = if last.time > first.time {
        last.time
    } else {
        first.time + TimeDelta::milliseconds(SINGLE_POINT_EPSILON_MS)
    };

    Ok(QueryBoundingBox {
        name: format!("{flight}/cell{}/{ordinal}", cell_flight.cell_index),
        shape,
        timestamp_after,
        timestamp_before,
    })
}
