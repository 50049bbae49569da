//! Scenario runner - wires generation, injection, observation, and
//! reconciliation end to end.
//!
//! Worker model: one task per injection target, all joined before any
//! observer task starts (the happens-before edge from registration
//! completion to first poll), then one polling task per observer obeying
//! the minimum polling interval. A rejected flight aborts only itself;
//! the run keeps evaluating the others.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, warn};

use ridqual_core::{
    FlightId, FullFlightRecord, ObservedReport, OutOfAreaPolicy, PollingSchedule, Reconciler,
    Verdict,
};

use crate::exporter::ReportRecord;
use crate::flightgen::{FlightGenerator, TrackShape};
use crate::observer::{ObservationFault, SimObserver};
use crate::injector::SimInjectionTarget;
use crate::scenarios::ScenarioId;
use crate::world::{SimConfig, SimWorld};

/// Seed folding constants keep subsystem RNG streams independent.
const FLIGHT_SEED_MIX: u64 = 0x9e3779b97f4a7c15;
const OBSERVER_SEED_MIX: u64 = 0x517cc1b727220a95;

/// Verdict tallies for one scenario run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerdictCounts {
    pub consistent: usize,
    pub stale: usize,
    pub premature: usize,
    pub not_found: usize,
}

impl VerdictCounts {
    fn add(&mut self, verdict: &Verdict) {
        match verdict {
            Verdict::Consistent { .. } => self.consistent += 1,
            Verdict::Stale => self.stale += 1,
            Verdict::Premature => self.premature += 1,
            Verdict::NotFound => self.not_found += 1,
        }
    }

    /// Total number of reconciled reports.
    pub fn total(&self) -> usize {
        self.consistent + self.stale + self.premature + self.not_found
    }
}

/// Outcome of one scenario run.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub scenario: ScenarioId,
    pub seed: u64,
    pub passed: bool,
    pub flights: usize,
    pub rejected_flights: usize,
    pub counts: VerdictCounts,
    pub records: Vec<ReportRecord>,
    pub final_time_secs: f64,
    pub failure_reason: Option<String>,
}

impl ScenarioResult {
    fn failed(scenario: ScenarioId, seed: u64, reason: String) -> Self {
        Self {
            scenario,
            seed,
            passed: false,
            flights: 0,
            rejected_flights: 0,
            counts: VerdictCounts::default(),
            records: Vec::new(),
            final_time_secs: 0.0,
            failure_reason: Some(reason),
        }
    }
}

/// Drives scenarios, building a fresh SimWorld per run.
pub struct ScenarioRunner {
    config: SimConfig,
}

impl ScenarioRunner {
    /// Creates a runner with the default endpoint set.
    pub fn new(seed: u64, num_flights: usize) -> Self {
        Self {
            config: SimConfig {
                seed,
                num_flights: num_flights.max(1),
                ..SimConfig::default()
            },
        }
    }

    /// Creates a runner over an explicit configuration.
    pub fn with_config(config: SimConfig) -> Self {
        Self { config }
    }

    /// Runs one scenario to completion.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        let mut config = self.config.clone();
        if scenario == ScenarioId::OutOfArea {
            config.out_of_area = OutOfAreaPolicy::Abort;
        }
        let seed = config.seed;

        let world = match SimWorld::new(config) {
            Ok(world) => world,
            Err(e) => return ScenarioResult::failed(scenario, seed, format!("world setup: {e}")),
        };

        let flights = self.generate_flights(&world, scenario);
        let rejected_flights = inject_all(&world, &flights).await;
        let tagged_reports = observe_all(&world, scenario).await;

        let reconciler = Reconciler::new(&world.config.qualifier.evaluation);
        let mut counts = VerdictCounts::default();
        let mut records = Vec::with_capacity(tagged_reports.len());
        let mut last_observed: Option<DateTime<Utc>> = None;
        for (observer, report) in &tagged_reports {
            let verdict = reconciler.reconcile(report, &world.registry);
            counts.add(&verdict);
            records.push(ReportRecord::new(report, observer, &verdict));
            if last_observed.map_or(true, |t| report.observed_at > t) {
                last_observed = Some(report.observed_at);
            }
        }
        if let Some(t) = last_observed {
            world.clock.advance_to(t);
        }

        let failure_reason = evaluate(scenario, &world, rejected_flights, &counts);
        debug!(
            scenario = scenario.name(),
            reports = counts.total(),
            rejected = rejected_flights,
            "scenario reconciled"
        );

        ScenarioResult {
            scenario,
            seed,
            passed: failure_reason.is_none(),
            flights: flights.len(),
            rejected_flights,
            counts,
            records,
            final_time_secs: world.clock.elapsed().as_secs_f64(),
            failure_reason,
        }
    }

    fn generate_flights(&self, world: &SimWorld, scenario: ScenarioId) -> Vec<FullFlightRecord> {
        let mut generator = FlightGenerator::new(
            world.config.seed.wrapping_mul(FLIGHT_SEED_MIX),
            world.config.area_rect(),
        );
        let start = world.flight_start_time();

        (0..world.config.num_flights)
            .map(|i| {
                let shape = match scenario {
                    ScenarioId::Reentrant => TrackShape::Orbit,
                    // One departing flight; the rest stay in-area to show
                    // the run continues past the rejected one.
                    ScenarioId::OutOfArea if i == 0 => TrackShape::Escaping,
                    _ => TrackShape::StraightLine,
                };
                generator.generate(shape, start + TimeDelta::seconds(i as i64 * 2), 30)
            })
            .collect()
    }
}

/// Injects every flight, one worker per injection target, flights spread
/// round-robin. Returns the number of rejected flights.
async fn inject_all(world: &SimWorld, flights: &[FullFlightRecord]) -> usize {
    let targets = &world.config.qualifier.injection_targets;
    let mut handles = Vec::with_capacity(targets.len());

    for (t_index, target) in targets.iter().enumerate() {
        let injector = SimInjectionTarget::new(
            target.clone(),
            Arc::clone(&world.grid),
            world.config.qualifier.evaluation.clone(),
        );
        let registry = Arc::clone(&world.registry);
        let batch: Vec<FullFlightRecord> = flights
            .iter()
            .enumerate()
            .filter(|(i, _)| i % targets.len() == t_index)
            .map(|(_, record)| record.clone())
            .collect();

        handles.push(tokio::spawn(async move {
            let mut rejected = 0usize;
            for record in batch {
                let flight = record.flight_id;
                if let Err(e) = injector.inject(record, &registry) {
                    warn!("flight {flight} rejected by {}: {e}", injector.config().name);
                    rejected += 1;
                }
            }
            rejected
        }));
    }

    // Joining every injection worker before observation starts is the
    // happens-before edge from registration to first poll.
    let mut rejected = 0;
    for handle in handles {
        rejected += handle.await.expect("injection worker panicked");
    }
    rejected
}

/// Polls every registered flight's queries, one worker per observer, and
/// returns the reports tagged with their observer's name.
async fn observe_all(world: &SimWorld, scenario: ScenarioId) -> Vec<(String, ObservedReport)> {
    let evaluation = &world.config.qualifier.evaluation;
    let fault = match scenario {
        ScenarioId::SlowPropagation => ObservationFault::slow(25.0),
        ScenarioId::ClockSkew => ObservationFault::skewed(-30.0),
        _ => ObservationFault::nominal(),
    };

    let max_latency =
        TimeDelta::from_std(evaluation.max_propagation_latency).unwrap_or(TimeDelta::MAX);
    // Stale verdicts only appear once every candidate has aged out, so the
    // slow scenario keeps polling well past each query window.
    let horizon_pad = match scenario {
        ScenarioId::SlowPropagation => max_latency * 4,
        _ => max_latency,
    };
    let min_interval =
        TimeDelta::from_std(evaluation.min_polling_interval).unwrap_or(TimeDelta::MAX);

    // Deterministic flight order regardless of registry iteration order.
    let mut flight_ids = world.registry.flight_ids();
    flight_ids.sort_by_key(|id| id.as_uuid());

    let mut handles = Vec::new();
    for (o_index, observer_config) in world.config.qualifier.observers.iter().enumerate() {
        let registry = Arc::clone(&world.registry);
        let flight_ids = flight_ids.clone();
        let observer_config = observer_config.clone();
        let observer_seed = world.config.seed.wrapping_mul(OBSERVER_SEED_MIX) ^ o_index as u64;
        let min_polling_interval = evaluation.min_polling_interval;

        handles.push(tokio::spawn(async move {
            let name = observer_config.name.clone();
            let mut observer = SimObserver::new(observer_config, fault, observer_seed);
            let mut schedule = PollingSchedule::new(min_polling_interval);
            let mut reports = Vec::new();

            let injected_flights: Vec<_> = flight_ids
                .into_iter()
                .filter_map(|flight| registry.lookup(flight).ok())
                .collect();

            // One sweep per tick: every query whose padded window contains
            // the tick gets polled. Ticks are spaced by the minimum
            // polling interval.
            let first_tick = injected_flights
                .iter()
                .flat_map(|f| f.queries.iter())
                .map(|q| q.timestamp_after)
                .min();
            let last_tick = injected_flights
                .iter()
                .flat_map(|f| f.queries.iter())
                .map(|q| q.timestamp_before + horizon_pad)
                .max();

            if let (Some(first_tick), Some(last_tick)) = (first_tick, last_tick) {
                let mut poll_at = first_tick;
                while poll_at <= last_tick {
                    let recorded = schedule.record_poll(&name, poll_at);
                    debug_assert!(recorded, "poll cadence violated the schedule");
                    for injected in &injected_flights {
                        for query in &injected.queries {
                            let active = poll_at >= query.timestamp_after
                                && poll_at <= query.timestamp_before + horizon_pad;
                            if !active {
                                continue;
                            }
                            if let Some(report) = observer.poll(injected, query, poll_at) {
                                reports.push((name.clone(), report));
                            }
                        }
                    }
                    poll_at = poll_at + min_interval;
                }
            }
            reports
        }));
    }

    let mut all_reports = Vec::new();
    for handle in handles {
        all_reports.extend(handle.await.expect("observer worker panicked"));
    }

    if scenario == ScenarioId::UnknownFlight {
        // Late reports for flights nobody injected.
        let start = world.flight_start_time();
        for (i, observer) in world.config.qualifier.observers.iter().enumerate() {
            all_reports.push((
                observer.name.clone(),
                ObservedReport {
                    flight: FlightId::from_seed(0xdead_beef + i as u64),
                    query_name: "cell0/0".into(),
                    observed_at: start,
                },
            ));
        }
    }

    all_reports
}

/// Scenario-specific pass criteria; None means passed.
fn evaluate(
    scenario: ScenarioId,
    world: &SimWorld,
    rejected: usize,
    counts: &VerdictCounts,
) -> Option<String> {
    match scenario {
        ScenarioId::Nominal => {
            if rejected > 0 {
                return Some(format!("{rejected} flights rejected"));
            }
            if counts.total() == 0 {
                return Some("no reports produced".into());
            }
            if counts.consistent != counts.total() {
                return Some(format!("expected only consistent verdicts, got {counts:?}"));
            }
            None
        }
        ScenarioId::SlowPropagation => {
            if counts.stale == 0 {
                return Some("expected stale verdicts".into());
            }
            if counts.premature + counts.not_found > 0 {
                return Some(format!("unexpected verdicts: {counts:?}"));
            }
            None
        }
        ScenarioId::ClockSkew => {
            if counts.premature == 0 {
                return Some("expected premature verdicts".into());
            }
            if counts.not_found > 0 {
                return Some(format!("unexpected verdicts: {counts:?}"));
            }
            None
        }
        ScenarioId::CellHopper => {
            for flight in world.registry.flight_ids() {
                let injected = world.registry.lookup(flight).expect("flight registered");
                if injected.queries.len() < 2 {
                    return Some(format!("flight {flight} crossed fewer than 2 cells"));
                }
            }
            if counts.consistent == 0 || counts.consistent != counts.total() {
                return Some(format!("expected only consistent verdicts, got {counts:?}"));
            }
            None
        }
        ScenarioId::Reentrant => {
            let mut revisits = false;
            for flight in world.registry.flight_ids() {
                let injected = world.registry.lookup(flight).expect("flight registered");
                let entries = world
                    .grid
                    .partition(flight, &injected.record.track)
                    .expect("registered track partitions");
                let mut seen = std::collections::HashSet::new();
                if entries.iter().any(|e| !seen.insert(e.cell_index)) {
                    revisits = true;
                    break;
                }
            }
            if !revisits {
                return Some("no flight re-entered a cell".into());
            }
            if counts.premature + counts.not_found > 0 {
                return Some(format!("unexpected verdicts: {counts:?}"));
            }
            None
        }
        ScenarioId::UnknownFlight => {
            let expected = world.config.qualifier.observers.len();
            if counts.not_found != expected {
                return Some(format!(
                    "expected {expected} not_found verdicts, got {}",
                    counts.not_found
                ));
            }
            if counts.consistent == 0 {
                return Some("expected consistent reports for registered flights".into());
            }
            None
        }
        ScenarioId::OutOfArea => {
            if rejected == 0 {
                return Some("expected the departing flight to be rejected".into());
            }
            if counts.consistent == 0 {
                return Some("expected surviving flights to keep reporting".into());
            }
            if counts.not_found > 0 {
                return Some(format!("unexpected verdicts: {counts:?}"));
            }
            None
        }
    }
}
