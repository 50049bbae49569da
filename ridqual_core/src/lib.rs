//! RID Qualifier Core - Spatial Partitioning and Timing Reconciliation
//!
//! This library is the data and timing model underlying a multi-party
//! conformance test harness for Remote Identification of unmanned
//! aircraft. It solves three problems:
//! 1. **Space**: decompose a continuous flight track into disjoint grid
//!    cells with bounding-box queries of bounded granularity
//! 2. **Time**: reconcile independently-clocked observations against
//!    injected ground truth under a propagation latency budget
//! 3. **Identity**: bind each flight to the injection target that ingested
//!    it and the observers expected to report it
//!
//! Everything here is pure and synchronous; network calls belong to the
//! external collaborators driving injection and observation.

pub mod config;
pub mod flight;
pub mod query;
pub mod ridqual_registry;
pub mod ridqual_space;
pub mod ridqual_timing;

// Re-export key types for convenience
pub use config::{
    ConfigError, EvaluationConfiguration, InjectionTargetConfiguration, ObserverConfiguration,
    RidQualifierTestConfiguration,
};
pub use flight::{FlightDetails, FlightId, FlightPoint, FullFlightRecord, Track, TrackPoint};
pub use query::{build_query, QueryBoundingBox, QueryGeometryError};
pub use ridqual_registry::{FlightRegistry, InjectedFlight, RegistryError};
pub use ridqual_space::{
    GeoGrid, GridCellFlight, GridError, GridResolution, GridSpec, OutOfAreaPolicy,
};
pub use ridqual_timing::{ObservedReport, PollingSchedule, Reconciler, Verdict};
