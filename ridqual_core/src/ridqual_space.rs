//! The "SPACE" side of the harness - GeoGrid partitioning.
//!
//! Divides a test-area polygon into disjoint grid cells and assigns each
//! flight-track point to exactly one cell, producing the ordered
//! cell/sub-track pairs the query builder consumes.
//!
//! Tessellation choice: square cells with uniform *angular* (degree-space)
//! spacing. Angular spacing distorts metric area away from the equator,
//! but the distortion is bounded for the small test areas this harness
//! targets. Boundary points resolve to the lowest adjacent cell index;
//! indices are row-major from the south-west corner of the envelope, so
//! the tie-break is deterministic.

use geo::{Area, BooleanOps, BoundingRect, Coord, EuclideanDistance, Intersects, Point, Polygon, Rect};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flight::{FlightId, FlightPoint, Track, TrackPoint};

/// Clipping slivers below this area (square degrees) are discarded.
const MIN_CELL_AREA: f64 = 1e-12;

/// Errors raised while building a grid or partitioning a track.
#[derive(Debug, Error)]
pub enum GridError {
    /// Track point outside every grid cell, under the Abort policy
    #[error("flight {flight} leaves the test area at ({lat}, {lng})")]
    OutOfArea { flight: FlightId, lat: f64, lng: f64 },

    /// Test area polygon has no extent (or no cell survived clipping)
    #[error("test area polygon has no coverable extent")]
    EmptyArea,

    /// Grid resolution cannot produce at least one cell
    #[error("invalid grid resolution: {0}")]
    InvalidResolution(String),
}

/// How the bounding envelope of the test area is divided into squares.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GridResolution {
    /// Approximate number of cells covering the envelope
    CellCount(usize),

    /// Edge length of each square cell, in degrees
    CellSizeDegrees(f64),
}

impl GridResolution {
    /// Resolves the cell edge length in degrees for the given envelope.
    fn cell_size(&self, envelope: &Rect<f64>) -> Result<f64, GridError> {
        match *self {
            GridResolution::CellCount(n) => {
                if n == 0 {
                    return Err(GridError::InvalidResolution("cell count is zero".into()));
                }
                Ok(((envelope.width() * envelope.height()) / n as f64).sqrt())
            }
            GridResolution::CellSizeDegrees(s) => {
                if !(s > 0.0) {
                    return Err(GridError::InvalidResolution(format!(
                        "cell size must be positive degrees, got {s}"
                    )));
                }
                Ok(s)
            }
        }
    }
}

/// Policy for track points that fall outside every cell.
///
/// There is no default: callers must choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutOfAreaPolicy {
    /// Assign the point to the nearest cell
    Clamp,

    /// Abort partitioning of the affected flight
    Abort,
}

/// Grid construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub resolution: GridResolution,
    pub out_of_area: OutOfAreaPolicy,
}

/// A single grid cell: the clipped polygon plus its deterministic index.
#[derive(Debug, Clone)]
pub struct GridCell {
    /// Row-major index from the south-west corner of the envelope
    pub index: usize,

    /// Cell polygon, clipped against the test area
    pub bounds: Polygon<f64>,
}

/// A grid cell paired with the ordered sub-track flown inside it.
///
/// Entries are emitted in track-temporal order; a flight re-entering a
/// previously visited cell produces a second, separate entry.
#[derive(Debug, Clone)]
pub struct GridCellFlight {
    /// Index of the containing cell
    pub cell_index: usize,

    /// Bounds of the containing cell
    pub bounds: Polygon<f64>,

    /// Contiguous run of track points inside the cell
    pub track: Vec<TrackPoint>,
}

/// Disjoint grid cells covering exactly the test area.
#[derive(Debug)]
pub struct GeoGrid {
    cells: Vec<GridCell>,
    out_of_area: OutOfAreaPolicy,
}

impl GeoGrid {
    /// Tessellates the area's bounding envelope into a regular degree-space
    /// grid and clips every square against the area polygon.
    ///
    /// Squares entirely outside the area are discarded. A square whose
    /// intersection with the area is disconnected becomes one cell per
    /// part, keeping every cell a single polygon and preserving
    /// disjointness.
    pub fn build(area: &Polygon<f64>, spec: &GridSpec) -> Result<Self, GridError> {
        let envelope = area.bounding_rect().ok_or(GridError::EmptyArea)?;
        if !(envelope.width() > 0.0) || !(envelope.height() > 0.0) {
            return Err(GridError::EmptyArea);
        }

        let size = spec.resolution.cell_size(&envelope)?;
        // The 1e-9 slack keeps float noise in width/size from adding a
        // degenerate extra column or row.
        let nx = ((envelope.width() / size) - 1e-9).ceil().max(1.0) as usize;
        let ny = ((envelope.height() / size) - 1e-9).ceil().max(1.0) as usize;

        let mut cells = Vec::new();
        for row in 0..ny {
            for col in 0..nx {
                let min = Coord {
                    x: envelope.min().x + col as f64 * size,
                    y: envelope.min().y + row as f64 * size,
                };
                // The last column/row extends to the envelope edge so
                // float rounding never leaves an uncovered sliver.
                let max = Coord {
                    x: if col + 1 == nx { envelope.max().x.max(min.x + size) } else { min.x + size },
                    y: if row + 1 == ny { envelope.max().y.max(min.y + size) } else { min.y + size },
                };
                let square = Rect::new(min, max).to_polygon();
                for part in square.intersection(area) {
                    if part.unsigned_area() > MIN_CELL_AREA {
                        cells.push(GridCell { index: cells.len(), bounds: part });
                    }
                }
            }
        }

        if cells.is_empty() {
            return Err(GridError::EmptyArea);
        }
        Ok(Self { cells, out_of_area: spec.out_of_area })
    }

    /// Returns the cells in index order.
    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    /// Returns the number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if the grid has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Returns the index of the cell containing the point.
    ///
    /// Cells are scanned in index order, so a point on a shared edge
    /// resolves to the lowest adjacent cell index.
    pub fn cell_containing(&self, position: &FlightPoint) -> Option<usize> {
        let p = Point::new(position.lng, position.lat);
        self.cells.iter().find(|c| c.bounds.intersects(&p)).map(|c| c.index)
    }

    /// Index of the cell nearest to an out-of-area point, in degree space.
    fn nearest_cell(&self, position: &FlightPoint) -> usize {
        let p = Point::new(position.lng, position.lat);
        let mut best = 0usize;
        let mut best_distance = f64::INFINITY;
        for cell in &self.cells {
            let d = p.euclidean_distance(&cell.bounds);
            if d < best_distance {
                best_distance = d;
                best = cell.index;
            }
        }
        best
    }

    /// Walks the track once in order and groups contiguous runs of points
    /// by containing cell.
    ///
    /// Concatenating the returned sub-tracks in emission order reproduces
    /// the input track exactly. Points outside every cell follow the
    /// configured [`OutOfAreaPolicy`]: `Clamp` assigns them to the nearest
    /// cell, `Abort` fails with [`GridError::OutOfArea`].
    pub fn partition(
        &self,
        flight: FlightId,
        track: &Track,
    ) -> Result<Vec<GridCellFlight>, GridError> {
        let mut entries: Vec<GridCellFlight> = Vec::new();

        for tp in track.points() {
            let index = match self.cell_containing(&tp.position) {
                Some(index) => index,
                None => match self.out_of_area {
                    OutOfAreaPolicy::Clamp => self.nearest_cell(&tp.position),
                    OutOfAreaPolicy::Abort => {
                        return Err(GridError::OutOfArea {
                            flight,
                            lat: tp.position.lat,
                            lng: tp.position.lng,
                        })
                    }
                },
            };

            match entries.last_mut() {
                Some(last) if last.cell_index == index => last.track.push(*tp),
                _ => entries.push(GridCellFlight {
                    cell_index: index,
                    bounds: self.cells[index].bounds.clone(),
                    track: vec![*tp],
                }),
            }
        }

        Ok(entries)
    }
}
