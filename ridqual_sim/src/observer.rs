//! Simulated observer.
//!
//! Answers bounding-box polls the way a display provider would: injected
//! states become visible only after a propagation delay, and reported
//! timestamps carry the observer's own clock, which may be skewed against
//! the injection clock. All non-determinism is seeded.

use chrono::{DateTime, TimeDelta, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use ridqual_core::{InjectedFlight, ObservedReport, ObserverConfiguration, QueryBoundingBox};

/// Fault model applied to one observer's reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservationFault {
    /// Mean propagation delay in seconds
    pub mean_delay_s: f64,

    /// Delay jitter standard deviation in seconds
    pub jitter_std_s: f64,

    /// Constant offset of the observer's clock against the injection
    /// clock, in seconds; negative means the observer's clock runs behind
    pub clock_skew_s: f64,

    /// Probability that a poll returns nothing despite visible traffic
    pub drop_rate: f64,
}

impl ObservationFault {
    /// Well-behaved propagation comfortably inside a 10s latency budget.
    pub fn nominal() -> Self {
        Self {
            mean_delay_s: 1.0,
            jitter_std_s: 0.25,
            clock_skew_s: 0.0,
            drop_rate: 0.0,
        }
    }

    /// Propagation far beyond the latency budget.
    pub fn slow(mean_delay_s: f64) -> Self {
        Self { mean_delay_s, jitter_std_s: 1.0, ..Self::nominal() }
    }

    /// Nominal propagation with a skewed observer clock.
    pub fn skewed(clock_skew_s: f64) -> Self {
        Self { clock_skew_s, ..Self::nominal() }
    }
}

impl Default for ObservationFault {
    fn default() -> Self {
        Self::nominal()
    }
}

fn delta_from_secs(s: f64) -> TimeDelta {
    TimeDelta::milliseconds((s * 1000.0).round() as i64)
}

/// One observer endpoint, simulated.
pub struct SimObserver {
    config: ObserverConfiguration,
    fault: ObservationFault,
    rng: ChaCha8Rng,
    delay: Normal<f64>,
}

impl SimObserver {
    /// Creates a simulated observer with the given fault model.
    pub fn new(config: ObserverConfiguration, fault: ObservationFault, seed: u64) -> Self {
        let delay = Normal::new(fault.mean_delay_s, fault.jitter_std_s)
            .expect("fault parameters are finite");
        Self {
            config,
            fault,
            rng: ChaCha8Rng::seed_from_u64(seed),
            delay,
        }
    }

    /// Returns the observer's identity.
    pub fn config(&self) -> &ObserverConfiguration {
        &self.config
    }

    /// Answers one poll of `query` at `poll_at`.
    ///
    /// A report is produced when at least one injected state in the query
    /// window has propagated by poll time; its timestamp is the poll
    /// instant on the observer's (possibly skewed) clock.
    pub fn poll(
        &mut self,
        injected: &InjectedFlight,
        query: &QueryBoundingBox,
        poll_at: DateTime<Utc>,
    ) -> Option<ObservedReport> {
        if self.fault.drop_rate > 0.0 && self.rng.gen::<f64>() < self.fault.drop_rate {
            return None;
        }

        let visible = injected.states_in(query).any(|injected_at| {
            let delay_s = self.delay.sample(&mut self.rng).max(0.0);
            injected_at + delta_from_secs(delay_s) <= poll_at
        });
        if !visible {
            return None;
        }

        Some(ObservedReport {
            flight: injected.flight_id(),
            query_name: query.name.clone(),
            observed_at: poll_at + delta_from_secs(self.fault.clock_skew_s),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ridqual_core::flight::{
        FlightDetails, FlightId, FlightPoint, FullFlightRecord, RidFlightDetails, Track, TrackPoint,
    };
    use ridqual_core::InjectionTargetConfiguration;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(crate::clock::SIM_EPOCH_SECS, 0).unwrap()
    }

    fn observer_config() -> ObserverConfiguration {
        ObserverConfiguration {
            name: "obs1".into(),
            observation_base_url: "https://obs1.example.test/observe".into(),
        }
    }

    fn injected(n_points: usize) -> InjectedFlight {
        let flight_id = FlightId::from_seed(5);
        let points: Vec<TrackPoint> = (0..n_points)
            .map(|i| TrackPoint {
                time: t0() + TimeDelta::seconds(i as i64),
                position: FlightPoint {
                    lat: 46.975,
                    lng: 7.475,
                    alt: 50.0,
                    speed: 5.0,
                    bearing: 90.0,
                },
            })
            .collect();
        let first = points.first().unwrap().time;
        let last = points.last().unwrap().time;
        InjectedFlight {
            target: InjectionTargetConfiguration {
                name: "uss1".into(),
                injection_base_url: "https://uss1.example.test/inject".into(),
            },
            record: FullFlightRecord {
                flight_id,
                reference_time: t0(),
                track: Track::new(points).unwrap(),
                details: FlightDetails {
                    rid_details: RidFlightDetails {
                        id: "flight-5".into(),
                        operator_id: "op-1".into(),
                        operation_description: "test".into(),
                        serial_number: "SN-5".into(),
                    },
                    operator_name: "Operator One".into(),
                    aircraft_type: "Multirotor".into(),
                },
            },
            queries: vec![QueryBoundingBox {
                name: "q0".into(),
                shape: geo::Rect::new(
                    geo::Coord { x: 7.47, y: 46.97 },
                    geo::Coord { x: 7.48, y: 46.98 },
                )
                .to_polygon(),
                timestamp_after: first,
                timestamp_before: last + TimeDelta::milliseconds(100),
            }],
        }
    }

    #[test]
    fn test_nothing_visible_before_propagation() {
        let flight = injected(10);
        let query = &flight.queries[0];
        let mut observer = SimObserver::new(observer_config(), ObservationFault::nominal(), 1);

        // At the very first state's timestamp nothing has propagated yet.
        let report = observer.poll(&flight, query, query.timestamp_after);
        assert!(report.is_none());
    }

    #[test]
    fn test_report_carries_poll_time() {
        let flight = injected(10);
        let query = &flight.queries[0];
        let mut observer = SimObserver::new(observer_config(), ObservationFault::nominal(), 1);

        let poll_at = query.timestamp_after + TimeDelta::seconds(5);
        let report = observer.poll(&flight, query, poll_at).unwrap();
        assert_eq!(report.observed_at, poll_at);
        assert_eq!(report.flight, flight.flight_id());
        assert_eq!(report.query_name, "q0");
    }

    #[test]
    fn test_clock_skew_shifts_report_timestamps() {
        let flight = injected(10);
        let query = &flight.queries[0];
        let mut observer =
            SimObserver::new(observer_config(), ObservationFault::skewed(-30.0), 1);

        let poll_at = query.timestamp_after + TimeDelta::seconds(5);
        let report = observer.poll(&flight, query, poll_at).unwrap();
        assert_eq!(report.observed_at, poll_at - TimeDelta::seconds(30));
    }

    #[test]
    fn test_full_drop_rate_silences_observer() {
        let flight = injected(10);
        let query = &flight.queries[0];
        let fault = ObservationFault { drop_rate: 1.0, ..ObservationFault::nominal() };
        let mut observer = SimObserver::new(observer_config(), fault, 1);

        let poll_at = query.timestamp_after + TimeDelta::seconds(5);
        assert!(observer.poll(&flight, query, poll_at).is_none());
    }

    #[test]
    fn test_observer_is_deterministic() {
        let flight = injected(10);
        let query = &flight.queries[0];
        let mut a = SimObserver::new(observer_config(), ObservationFault::nominal(), 9);
        let mut b = SimObserver::new(observer_config(), ObservationFault::nominal(), 9);

        for offset in 0..10 {
            let poll_at = query.timestamp_after + TimeDelta::seconds(offset);
            assert_eq!(a.poll(&flight, query, poll_at), b.poll(&flight, query, poll_at));
        }
    }
}
