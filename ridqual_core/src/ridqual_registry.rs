//! The flight/target registry - exclusive owner of the ground truth
//! mapping.
//!
//! Associates each synthetic flight with the injection target that
//! ingested it and the observers expected to later report it. Writes
//! (registration) serialize behind the write lock; releasing that guard
//! publishes the record to observer workers, giving the happens-before
//! edge from registration completion to first poll. Reads take the read
//! lock only and run concurrently once a flight is registered.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{InjectionTargetConfiguration, ObserverConfiguration};
use crate::flight::{FlightId, FullFlightRecord};
use crate::query::QueryBoundingBox;

/// Errors raised by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Same flight identity claimed by two different injection targets
    #[error("flight {flight} already registered to {existing}, rejected for {requested}")]
    RegistrationConflict {
        flight: FlightId,
        existing: String,
        requested: String,
    },

    /// Lookup against an unregistered flight identity; a normal outcome
    /// for late or unexpected reports, not fatal
    #[error("flight {0} is not registered")]
    NotFound(FlightId),
}

/// One injection target's claim on one synthesized flight, together with
/// the query sequence derived for it at injection time.
///
/// Created by registration, read-only thereafter; serves as the
/// ground-truth reference during evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectedFlight {
    /// The target that ingested the flight
    pub target: InjectionTargetConfiguration,

    /// Full ground-truth record
    pub record: FullFlightRecord,

    /// Queries derived from the flight's partition, in track-temporal order
    pub queries: Vec<QueryBoundingBox>,
}

impl InjectedFlight {
    /// Returns the flight identity.
    pub fn flight_id(&self) -> FlightId {
        self.record.flight_id
    }

    /// Looks up one of the flight's queries by name.
    pub fn query(&self, name: &str) -> Option<&QueryBoundingBox> {
        self.queries.iter().find(|q| q.name == name)
    }

    /// Injected state timestamps belonging to the query's window.
    ///
    /// The window end is exclusive for query eligibility, but the source
    /// sub-track's final state is stamped exactly at the window end and
    /// still belongs to the cell, so the filter here is end-inclusive.
    pub fn states_in<'a>(
        &'a self,
        query: &'a QueryBoundingBox,
    ) -> impl Iterator<Item = DateTime<Utc>> + 'a {
        self.record
            .track
            .points()
            .iter()
            .map(|tp| tp.time)
            .filter(move |t| *t >= query.timestamp_after && *t <= query.timestamp_before)
    }
}

/// Exclusive owner of the flight-id to InjectedFlight mapping and of the
/// expected-observer set.
pub struct FlightRegistry {
    observers: Vec<ObserverConfiguration>,
    flights: RwLock<HashMap<FlightId, Arc<InjectedFlight>>>,
}

impl FlightRegistry {
    /// Creates a registry expecting the given observers to report every
    /// registered flight.
    pub fn new(observers: Vec<ObserverConfiguration>) -> Self {
        Self {
            observers,
            flights: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a flight under an injection target.
    ///
    /// Idempotent per (flight identity, target) pair: re-registering under
    /// the same target returns the existing record. The same flight
    /// identity under a different target is a conflict.
    pub fn register(
        &self,
        record: FullFlightRecord,
        queries: Vec<QueryBoundingBox>,
        target: InjectionTargetConfiguration,
    ) -> Result<Arc<InjectedFlight>, RegistryError> {
        let mut flights = self.flights.write().unwrap();

        if let Some(existing) = flights.get(&record.flight_id) {
            if existing.target.name == target.name {
                return Ok(Arc::clone(existing));
            }
            return Err(RegistryError::RegistrationConflict {
                flight: record.flight_id,
                existing: existing.target.name.clone(),
                requested: target.name,
            });
        }

        let injected = Arc::new(InjectedFlight { target, record, queries });
        flights.insert(injected.flight_id(), Arc::clone(&injected));
        Ok(injected)
    }

    /// Looks up a registered flight.
    pub fn lookup(&self, flight: FlightId) -> Result<Arc<InjectedFlight>, RegistryError> {
        self.flights
            .read()
            .unwrap()
            .get(&flight)
            .cloned()
            .ok_or(RegistryError::NotFound(flight))
    }

    /// Observers expected to later report the flight.
    pub fn observers_for(&self, flight: FlightId) -> Result<Vec<ObserverConfiguration>, RegistryError> {
        self.lookup(flight)?;
        Ok(self.observers.clone())
    }

    /// Identities of all registered flights, in no particular order.
    pub fn flight_ids(&self) -> Vec<FlightId> {
        self.flights.read().unwrap().keys().copied().collect()
    }

    /// Number of registered flights.
    pub fn len(&self) -> usize {
        self.flights.read().unwrap().len()
    }

    /// Returns true if no flight has been registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight::{FlightDetails, FlightPoint, RidFlightDetails, Track, TrackPoint};
    use chrono::TimeDelta;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1704067200, 0).unwrap()
    }

    fn record(seed: u64) -> FullFlightRecord {
        let points = (0..3)
            .map(|i| TrackPoint {
                time: t0() + TimeDelta::seconds(i),
                position: FlightPoint {
                    lat: 46.975,
                    lng: 7.475 + i as f64 * 0.001,
                    alt: 50.0,
                    speed: 5.0,
                    bearing: 90.0,
                },
            })
            .collect();
        FullFlightRecord {
            flight_id: FlightId::from_seed(seed),
            reference_time: t0(),
            track: Track::new(points).unwrap(),
            details: FlightDetails {
                rid_details: RidFlightDetails {
                    id: format!("flight-{seed}"),
                    operator_id: "op-1".into(),
                    operation_description: "conformance test".into(),
                    serial_number: format!("SN-{seed}"),
                },
                operator_name: "Operator One".into(),
                aircraft_type: "Multirotor".into(),
            },
        }
    }

    fn target(name: &str) -> InjectionTargetConfiguration {
        InjectionTargetConfiguration {
            name: name.into(),
            injection_base_url: format!("https://{name}.example.test/inject"),
        }
    }

    fn observers() -> Vec<ObserverConfiguration> {
        vec![ObserverConfiguration {
            name: "obs1".into(),
            observation_base_url: "https://obs1.example.test/observe".into(),
        }]
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = FlightRegistry::new(observers());
        let injected = registry.register(record(1), vec![], target("uss1")).unwrap();

        let found = registry.lookup(injected.flight_id()).unwrap();
        assert_eq!(found.target.name, "uss1");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registration_is_idempotent() {
        let registry = FlightRegistry::new(observers());
        let first = registry.register(record(1), vec![], target("uss1")).unwrap();
        let second = registry.register(record(1), vec![], target("uss1")).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_conflicting_target_rejected() {
        let registry = FlightRegistry::new(observers());
        registry.register(record(1), vec![], target("uss1")).unwrap();

        let err = registry.register(record(1), vec![], target("uss2")).unwrap_err();
        match err {
            RegistryError::RegistrationConflict { existing, requested, .. } => {
                assert_eq!(existing, "uss1");
                assert_eq!(requested, "uss2");
            }
            other => panic!("expected RegistrationConflict, got {other:?}"),
        }
    }

    #[test]
    fn test_lookup_unregistered_is_not_found() {
        let registry = FlightRegistry::new(observers());
        let err = registry.lookup(FlightId::from_seed(99)).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[test]
    fn test_observers_for_registered_flight() {
        let registry = FlightRegistry::new(observers());
        let injected = registry.register(record(1), vec![], target("uss1")).unwrap();

        let expected = registry.observers_for(injected.flight_id()).unwrap();
        assert_eq!(expected.len(), 1);
        assert_eq!(expected[0].name, "obs1");

        assert!(registry.observers_for(FlightId::from_seed(99)).is_err());
    }

    #[test]
    fn test_concurrent_reads_during_writes() {
        use std::thread;

        let registry = Arc::new(FlightRegistry::new(observers()));
        let writer = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for seed in 0..50 {
                    registry
                        .register(record(seed), vec![], target("uss1"))
                        .unwrap();
                }
            })
        };
        let reader = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for seed in 0..50 {
                    // Registered or not-yet-registered are both fine; the
                    // read must simply never observe a torn state.
                    let _ = registry.lookup(FlightId::from_seed(seed));
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(registry.len(), 50);
    }
}
