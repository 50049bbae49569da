//! Synthetic flight generation.
//!
//! Plays the external flight-generator collaborator: deterministic,
//! seeded tracks inside a configured test area. Geometry is intentionally
//! simple (lines and orbits in degree space); what matters to the harness
//! is cell coverage and timing, not aerodynamic realism.

use chrono::{DateTime, TimeDelta, Utc};
use geo::Rect;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use ridqual_core::flight::{
    FlightDetails, FlightId, FlightPoint, FullFlightRecord, RidFlightDetails, Track, TrackPoint,
};

const METERS_PER_DEGREE: f64 = 111_320.0;

const AIRCRAFT_TYPES: [&str; 4] = ["Multirotor", "Fixed Wing", "Helicopter", "Hybrid Lift"];

/// Shape of a generated track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackShape {
    /// Eastbound line spanning the area at a random latitude
    StraightLine,

    /// Closed circular orbit around the area center; re-enters its
    /// starting cell
    Orbit,

    /// Eastbound line starting near the east edge and leaving the area
    Escaping,
}

/// Deterministic synthetic flight builder.
pub struct FlightGenerator {
    rng: ChaCha8Rng,
    area: Rect<f64>,
    sample_interval: TimeDelta,
    sequence: u64,
}

impl FlightGenerator {
    /// Creates a generator for the given test area.
    pub fn new(seed: u64, area: Rect<f64>) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            area,
            sample_interval: TimeDelta::seconds(1),
            sequence: 0,
        }
    }

    /// Generates one flight of `points` states starting at `start_time`.
    ///
    /// Speeds are derived from the geometry and the one-second sample
    /// interval so each point's kinematics match its neighbors.
    pub fn generate(
        &mut self,
        shape: TrackShape,
        start_time: DateTime<Utc>,
        points: usize,
    ) -> FullFlightRecord {
        self.sequence += 1;
        let flight_id = FlightId::from_seed(self.rng.gen());

        let track = match shape {
            TrackShape::StraightLine => self.straight_line(start_time, points),
            TrackShape::Orbit => self.orbit(start_time, points),
            TrackShape::Escaping => self.escaping(start_time, points),
        };

        let aircraft_type = AIRCRAFT_TYPES[self.rng.gen_range(0..AIRCRAFT_TYPES.len())];
        FullFlightRecord {
            flight_id,
            reference_time: start_time,
            track,
            details: FlightDetails {
                rid_details: RidFlightDetails {
                    id: format!("flight-{:04}", self.sequence),
                    operator_id: format!("op-{:03}", self.sequence),
                    operation_description: "synthetic conformance test flight".into(),
                    serial_number: format!("SN-{:04}", self.sequence),
                },
                operator_name: format!("Operator {:03}", self.sequence),
                aircraft_type: aircraft_type.into(),
            },
        }
    }

    fn timed(&self, start_time: DateTime<Utc>, index: usize, position: FlightPoint) -> TrackPoint {
        TrackPoint {
            time: start_time + self.sample_interval * index as i32,
            position,
        }
    }

    fn straight_line(&mut self, start_time: DateTime<Utc>, points: usize) -> Track {
        let lat = self.rng.gen_range(
            self.area.min().y + self.area.height() * 0.25
                ..self.area.min().y + self.area.height() * 0.75,
        );
        let lng_start = self.area.min().x + self.area.width() * 0.05;
        let span = self.area.width() * 0.9;
        let step_deg = if points > 1 { span / (points - 1) as f64 } else { 0.0 };
        let speed = step_deg * METERS_PER_DEGREE * lat.to_radians().cos();

        let alt = self.rng.gen_range(30.0..120.0);
        let track_points = (0..points)
            .map(|i| {
                self.timed(
                    start_time,
                    i,
                    FlightPoint {
                        lat,
                        lng: lng_start + i as f64 * step_deg,
                        alt,
                        speed,
                        bearing: 90.0,
                    },
                )
            })
            .collect();
        Track::new(track_points).expect("generated timestamps are monotonic")
    }

    fn orbit(&mut self, start_time: DateTime<Utc>, points: usize) -> Track {
        let center_lat = self.area.min().y + self.area.height() * 0.5;
        let center_lng = self.area.min().x + self.area.width() * 0.5;
        let radius_deg = self.area.width().min(self.area.height()) * 0.3;
        let steps = points.max(2) - 1;
        let omega = std::f64::consts::TAU / steps as f64;
        let speed = radius_deg * omega * METERS_PER_DEGREE;

        let alt = self.rng.gen_range(30.0..120.0);
        let track_points = (0..points)
            .map(|i| {
                let theta = i as f64 * omega;
                self.timed(
                    start_time,
                    i,
                    FlightPoint {
                        lat: center_lat + radius_deg * theta.sin(),
                        lng: center_lng + radius_deg * theta.cos(),
                        alt,
                        speed,
                        // Tangent direction for a counter-clockwise orbit
                        bearing: (360.0 - theta.to_degrees()).rem_euclid(360.0),
                    },
                )
            })
            .collect();
        Track::new(track_points).expect("generated timestamps are monotonic")
    }

    fn escaping(&mut self, start_time: DateTime<Utc>, points: usize) -> Track {
        let lat = self.area.min().y + self.area.height() * 0.5;
        let lng_start = self.area.min().x + self.area.width() * 0.8;
        let step_deg = self.area.width() * 0.05;
        let speed = step_deg * METERS_PER_DEGREE * lat.to_radians().cos();

        let track_points = (0..points)
            .map(|i| {
                self.timed(
                    start_time,
                    i,
                    FlightPoint {
                        lat,
                        lng: lng_start + i as f64 * step_deg,
                        alt: 50.0,
                        speed,
                        bearing: 90.0,
                    },
                )
            })
            .collect();
        Track::new(track_points).expect("generated timestamps are monotonic")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;
    use proptest::prelude::*;

    fn area() -> Rect<f64> {
        Rect::new(Coord { x: 7.46, y: 46.96 }, Coord { x: 7.48, y: 46.98 })
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(crate::clock::SIM_EPOCH_SECS, 0).unwrap()
    }

    #[test]
    fn test_generation_is_deterministic() {
        let mut a = FlightGenerator::new(42, area());
        let mut b = FlightGenerator::new(42, area());

        let fa = a.generate(TrackShape::StraightLine, t0(), 20);
        let fb = b.generate(TrackShape::StraightLine, t0(), 20);

        assert_eq!(fa.flight_id, fb.flight_id);
        assert_eq!(fa.track, fb.track);
        assert_eq!(fa.details, fb.details);
    }

    #[test]
    fn test_different_seeds_differ() {
        let mut a = FlightGenerator::new(42, area());
        let mut b = FlightGenerator::new(43, area());

        let fa = a.generate(TrackShape::StraightLine, t0(), 20);
        let fb = b.generate(TrackShape::StraightLine, t0(), 20);
        assert_ne!(fa.flight_id, fb.flight_id);
    }

    #[test]
    fn test_orbit_closes_on_itself() {
        use approx::assert_relative_eq;

        let mut gen = FlightGenerator::new(7, area());
        let flight = gen.generate(TrackShape::Orbit, t0(), 25);
        let points = flight.track.points();

        let first = points.first().unwrap().position;
        let last = points.last().unwrap().position;
        assert_relative_eq!(first.lat, last.lat, epsilon = 1e-9);
        assert_relative_eq!(first.lng, last.lng, epsilon = 1e-9);
    }

    #[test]
    fn test_escaping_leaves_the_area() {
        let mut gen = FlightGenerator::new(7, area());
        let flight = gen.generate(TrackShape::Escaping, t0(), 10);

        let east = area().max().x;
        assert!(flight.track.points().iter().any(|tp| tp.position.lng > east));
    }

    proptest! {
        #[test]
        fn prop_straight_and_orbit_stay_in_area(seed in 0u64..1000, points in 2usize..50) {
            let mut gen = FlightGenerator::new(seed, area());
            for shape in [TrackShape::StraightLine, TrackShape::Orbit] {
                let flight = gen.generate(shape, t0(), points);
                for tp in flight.track.points() {
                    prop_assert!(tp.position.lng >= area().min().x);
                    prop_assert!(tp.position.lng <= area().max().x);
                    prop_assert!(tp.position.lat >= area().min().y);
                    prop_assert!(tp.position.lat <= area().max().y);
                }
            }
        }
    }
}
