//! RID Qualifier Deterministic Simulation Harness
//!
//! Drives the `ridqual_core` spatial/timing model end to end against
//! simulated injection targets and observers. All sources of
//! non-determinism are controlled:
//! - **Time**: a virtual clock anchored at a fixed epoch
//! - **Flights**: synthetic tracks derived from a single 64-bit seed
//! - **Observation**: propagation delay and jitter from seeded RNG streams
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       ScenarioRunner                         │
//! │                                                              │
//! │  FlightGenerator ──► SimInjectionTarget ──► FlightRegistry   │
//! │        (seeded)        (per target task)     (ground truth)  │
//! │                                                   │          │
//! │                              join = happens-before│          │
//! │                                                   ▼          │
//! │  SimObserver ◄────────── QueryBoundingBox sweeps per         │
//! │  (per observer task)     PollingSchedule cadence             │
//! │        │                                                     │
//! │        ▼                                                     │
//! │  Reconciler ──► Verdicts ──► ScenarioResult / SimExport      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use ridqual_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let runner = ScenarioRunner::new(42, 3);
//! let result = runner.run(ScenarioId::Nominal).await;
//! assert!(result.passed);
//! ```

mod clock;
mod exporter;
mod flightgen;
mod injector;
mod observer;
mod runner;
pub mod scenarios;
mod world;

pub use clock::{SimClock, SIM_EPOCH_SECS};
pub use exporter::{ReportRecord, SimExport};
pub use flightgen::{FlightGenerator, TrackShape};
pub use injector::{InjectionError, SimInjectionTarget};
pub use observer::{ObservationFault, SimObserver};
pub use runner::{ScenarioResult, ScenarioRunner, VerdictCounts};
pub use world::{SimConfig, SimWorld, WorldError};
