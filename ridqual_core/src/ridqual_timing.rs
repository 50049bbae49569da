//! The "TIME" side of the harness - polling cadence and reconciliation of
//! independently-clocked observations against injected ground truth.
//!
//! Injection and observation run on independent clocks with one-directional
//! latency: an observation can only reflect past injections. A report is
//! consistent with ground truth iff some injected state in the same query
//! window precedes it by no more than the propagation latency budget; when
//! several qualify, the one closest in time wins (tightest bound). Reports
//! that match nothing are classified, never silently dropped.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::config::EvaluationConfiguration;
use crate::flight::FlightId;
use crate::ridqual_registry::FlightRegistry;

/// Tracks per-observer poll instants and enforces the minimum polling
/// interval.
///
/// Polling faster than the interval is disallowed: it is not
/// representative of real client behavior and would bias latency
/// measurements.
#[derive(Debug, Clone)]
pub struct PollingSchedule {
    min_interval: TimeDelta,
    last_poll: HashMap<String, DateTime<Utc>>,
}

impl PollingSchedule {
    /// Creates a schedule from the configured minimum polling interval.
    pub fn new(min_interval: Duration) -> Self {
        // Saturates on intervals beyond the chrono range; configuration
        // validation keeps real values far below that.
        let min_interval = TimeDelta::from_std(min_interval).unwrap_or(TimeDelta::MAX);
        Self { min_interval, last_poll: HashMap::new() }
    }

    /// Returns the minimum legal spacing between successive polls.
    pub fn min_interval(&self) -> TimeDelta {
        self.min_interval
    }

    /// Earliest instant the observer may legally be polled again, or None
    /// if it has never been polled.
    pub fn earliest_next_poll(&self, observer: &str) -> Option<DateTime<Utc>> {
        self.last_poll.get(observer).map(|t| *t + self.min_interval)
    }

    /// Returns true if polling the observer at `t` respects the minimum
    /// interval.
    pub fn poll_permitted(&self, observer: &str, t: DateTime<Utc>) -> bool {
        match self.earliest_next_poll(observer) {
            None => true,
            Some(earliest) => t >= earliest,
        }
    }

    /// Records a poll at `t`. Returns false, recording nothing, if the
    /// poll would violate the minimum spacing.
    pub fn record_poll(&mut self, observer: &str, t: DateTime<Utc>) -> bool {
        if !self.poll_permitted(observer, t) {
            return false;
        }
        self.last_poll.insert(observer.to_string(), t);
        true
    }
}

/// A single aircraft state reported by an observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedReport {
    pub flight: FlightId,

    /// Name of the query the report was issued against
    pub query_name: String,

    /// Timestamp the observer attached to the state
    pub observed_at: DateTime<Utc>,
}

/// Consistency verdict for one observed report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Matched an injected state within the latency budget
    Consistent {
        injected_at: DateTime<Utc>,
        observed_at: DateTime<Utc>,
    },

    /// Too old: propagation should have completed for every candidate
    Stale,

    /// Precedes the earliest injected state; a clock-skew or bug signal
    Premature,

    /// No registered flight or query window to compare against
    NotFound,
}

impl Verdict {
    /// Returns true for the consistent case.
    pub fn is_consistent(&self) -> bool {
        matches!(self, Verdict::Consistent { .. })
    }

    /// Stable label for logs and exports.
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Consistent { .. } => "consistent",
            Verdict::Stale => "stale",
            Verdict::Premature => "premature",
            Verdict::NotFound => "not_found",
        }
    }
}

/// Applies the evaluation configuration's timing budgets to observed
/// reports.
#[derive(Debug, Clone)]
pub struct Reconciler {
    max_latency: TimeDelta,
}

impl Reconciler {
    /// Creates a reconciler from the evaluation configuration.
    pub fn new(config: &EvaluationConfiguration) -> Self {
        let max_latency =
            TimeDelta::from_std(config.max_propagation_latency).unwrap_or(TimeDelta::MAX);
        Self { max_latency }
    }

    /// Returns the propagation latency budget.
    pub fn max_latency(&self) -> TimeDelta {
        self.max_latency
    }

    /// Reconciles one report against the registry's ground truth.
    ///
    /// An unregistered flight or an unknown query name yields
    /// [`Verdict::NotFound`]; both are normal outcomes for late or
    /// unexpected reports.
    pub fn reconcile(&self, report: &ObservedReport, registry: &FlightRegistry) -> Verdict {
        let injected = match registry.lookup(report.flight) {
            Ok(injected) => injected,
            Err(_) => return Verdict::NotFound,
        };
        let query = match injected.query(&report.query_name) {
            Some(query) => query,
            None => return Verdict::NotFound,
        };
        self.reconcile_window(report.observed_at, injected.states_in(query))
    }

    /// Core matching against the injected state timestamps of one query
    /// window.
    ///
    /// A candidate matches iff `observed_at - injected_at` lies in
    /// `[0, max_latency]`; candidates in the observer's future are
    /// rejected outright. Among matches, the smallest lag wins.
    pub fn reconcile_window(
        &self,
        observed_at: DateTime<Utc>,
        candidates: impl Iterator<Item = DateTime<Utc>>,
    ) -> Verdict {
        let mut earliest: Option<DateTime<Utc>> = None;
        let mut best: Option<(TimeDelta, DateTime<Utc>)> = None;

        for injected_at in candidates {
            if earliest.map_or(true, |e| injected_at < e) {
                earliest = Some(injected_at);
            }

            let lag = observed_at - injected_at;
            if lag < TimeDelta::zero() {
                // Causality: observation never reflects a future injection.
                continue;
            }
            if lag > self.max_latency {
                continue;
            }
            if best.map_or(true, |(best_lag, _)| lag < best_lag) {
                best = Some((lag, injected_at));
            }
        }

        if let Some((_, injected_at)) = best {
            return Verdict::Consistent { injected_at, observed_at };
        }
        match earliest {
            Some(earliest) if observed_at < earliest => Verdict::Premature,
            Some(_) => Verdict::Stale,
            None => Verdict::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1704067200, 0).unwrap()
    }

    fn at(offset_s: i64) -> DateTime<Utc> {
        t0() + TimeDelta::seconds(offset_s)
    }

    fn reconciler(max_latency_s: u64) -> Reconciler {
        let config = EvaluationConfiguration {
            max_propagation_latency: Duration::from_secs(max_latency_s),
            ..EvaluationConfiguration::default()
        };
        Reconciler::new(&config)
    }

    #[test]
    fn test_report_within_latency_is_consistent() {
        // Injected at T=0, observed at T=9, budget 10s.
        let verdict = reconciler(10).reconcile_window(at(9), [at(0)].into_iter());
        assert_eq!(
            verdict,
            Verdict::Consistent { injected_at: at(0), observed_at: at(9) }
        );
    }

    #[test]
    fn test_report_past_latency_is_stale() {
        // Observed at T=11 against the only injected state at T=0.
        let verdict = reconciler(10).reconcile_window(at(11), [at(0)].into_iter());
        assert_eq!(verdict, Verdict::Stale);
    }

    #[test]
    fn test_report_before_injection_is_premature() {
        // Observed at T=-1 against the only injected state at T=0.
        let verdict = reconciler(10).reconcile_window(at(-1), [at(0)].into_iter());
        assert_eq!(verdict, Verdict::Premature);
    }

    #[test]
    fn test_future_injection_never_matches() {
        // A state one second in the observer's future must not match even
        // though its absolute distance is smaller than the budget.
        let verdict = reconciler(10).reconcile_window(at(5), [at(6), at(0)].into_iter());
        assert_eq!(
            verdict,
            Verdict::Consistent { injected_at: at(0), observed_at: at(5) }
        );
    }

    #[test]
    fn test_tightest_bound_match_wins() {
        let verdict = reconciler(10).reconcile_window(at(9), [at(0), at(4), at(8)].into_iter());
        assert_eq!(
            verdict,
            Verdict::Consistent { injected_at: at(8), observed_at: at(9) }
        );
    }

    #[test]
    fn test_between_windows_is_stale() {
        // Observation after some injections but beyond the budget of all.
        let verdict = reconciler(10).reconcile_window(at(30), [at(0), at(5)].into_iter());
        assert_eq!(verdict, Verdict::Stale);
    }

    #[test]
    fn test_empty_window_is_not_found() {
        let verdict = reconciler(10).reconcile_window(at(0), std::iter::empty());
        assert_eq!(verdict, Verdict::NotFound);
    }

    #[test]
    fn test_monotonicity_property() {
        // For any lag beyond the budget, the verdict is never consistent.
        let r = reconciler(10);
        for lag in 11..120 {
            let verdict = r.reconcile_window(at(lag), [at(0)].into_iter());
            assert!(!verdict.is_consistent(), "lag {lag}s must not be consistent");
        }
    }

    #[test]
    fn test_reconcile_through_registry() {
        use crate::config::{InjectionTargetConfiguration, ObserverConfiguration};
        use crate::flight::{FlightDetails, FlightPoint, FullFlightRecord, RidFlightDetails, Track, TrackPoint};
        use crate::query::build_query;
        use crate::ridqual_space::{GeoGrid, GridResolution, GridSpec, OutOfAreaPolicy};
        use geo::{Coord, Rect};

        let area = Rect::new(Coord { x: 7.47, y: 46.97 }, Coord { x: 7.49, y: 46.98 })
            .to_polygon();
        let grid = GeoGrid::build(
            &area,
            &GridSpec {
                resolution: GridResolution::CellSizeDegrees(0.01),
                out_of_area: OutOfAreaPolicy::Abort,
            },
        )
        .unwrap();

        let flight_id = FlightId::from_seed(7);
        let points = (0..10)
            .map(|i| TrackPoint {
                time: at(i),
                position: FlightPoint {
                    lat: 46.975,
                    lng: 7.4710 + i as f64 * 0.002,
                    alt: 50.0,
                    speed: 5.0,
                    bearing: 90.0,
                },
            })
            .collect();
        let record = FullFlightRecord {
            flight_id,
            reference_time: t0(),
            track: Track::new(points).unwrap(),
            details: FlightDetails {
                rid_details: RidFlightDetails {
                    id: "flight-7".into(),
                    operator_id: "op-1".into(),
                    operation_description: "conformance test".into(),
                    serial_number: "SN-7".into(),
                },
                operator_name: "Operator One".into(),
                aircraft_type: "Multirotor".into(),
            },
        };

        let config = EvaluationConfiguration::default();
        let cells = grid.partition(flight_id, &record.track).unwrap();
        let queries = cells
            .iter()
            .enumerate()
            .map(|(i, cf)| build_query(cf, flight_id, i, &config).unwrap())
            .collect::<Vec<_>>();
        let first_query = queries[0].name.clone();

        let registry = FlightRegistry::new(vec![ObserverConfiguration {
            name: "obs1".into(),
            observation_base_url: "https://obs1.example.test/observe".into(),
        }]);
        registry
            .register(
                record,
                queries,
                InjectionTargetConfiguration {
                    name: "uss1".into(),
                    injection_base_url: "https://uss1.example.test/inject".into(),
                },
            )
            .unwrap();

        let reconciler = Reconciler::new(&config);

        let report = ObservedReport {
            flight: flight_id,
            query_name: first_query.clone(),
            observed_at: at(3),
        };
        assert!(reconciler.reconcile(&report, &registry).is_consistent());

        let unknown_query = ObservedReport {
            flight: flight_id,
            query_name: "no/such/query".into(),
            observed_at: at(3),
        };
        assert_eq!(reconciler.reconcile(&unknown_query, &registry), Verdict::NotFound);

        let unknown_flight = ObservedReport {
            flight: FlightId::from_seed(999),
            query_name: first_query,
            observed_at: at(3),
        };
        assert_eq!(reconciler.reconcile(&unknown_flight, &registry), Verdict::NotFound);
    }

    #[test]
    fn test_polling_schedule_spacing() {
        let mut schedule = PollingSchedule::new(Duration::from_secs(5));

        assert!(schedule.poll_permitted("obs1", at(0)));
        assert!(schedule.record_poll("obs1", at(0)));
        assert_eq!(schedule.earliest_next_poll("obs1"), Some(at(5)));

        // Too soon.
        assert!(!schedule.poll_permitted("obs1", at(3)));
        assert!(!schedule.record_poll("obs1", at(3)));

        // Exactly on the boundary is legal.
        assert!(schedule.record_poll("obs1", at(5)));

        // Independent observers are unconstrained by each other.
        assert!(schedule.poll_permitted("obs2", at(1)));
    }
}
