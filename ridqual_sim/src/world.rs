//! SimWorld - the harness container.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use geo::{Coord, Polygon, Rect};
use thiserror::Error;

use ridqual_core::{
    ConfigError, EvaluationConfiguration, FlightRegistry, GeoGrid, GridError, GridResolution,
    GridSpec, InjectionTargetConfiguration, ObserverConfiguration, OutOfAreaPolicy,
    RidQualifierTestConfiguration,
};

use crate::clock::SimClock;

/// Errors raised while assembling a simulation world.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Number of flights to synthesize
    pub num_flights: usize,

    /// Test area center as (lat, lng)
    pub area_center: (f64, f64),

    /// Angular extent of the square test area, degrees
    pub area_extent_deg: f64,

    /// Cell edge length, degrees
    pub cell_size_deg: f64,

    /// Policy for track points leaving the area
    pub out_of_area: OutOfAreaPolicy,

    /// Qualifier configuration: endpoints and evaluation budgets
    pub qualifier: RidQualifierTestConfiguration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            num_flights: 3,
            area_center: (46.97, 7.47),
            area_extent_deg: 0.02,
            cell_size_deg: 0.005,
            out_of_area: OutOfAreaPolicy::Clamp,
            qualifier: default_qualifier(),
        }
    }
}

fn default_qualifier() -> RidQualifierTestConfiguration {
    RidQualifierTestConfiguration {
        locale: "che".into(),
        injection_targets: vec![
            InjectionTargetConfiguration {
                name: "uss1".into(),
                injection_base_url: "https://uss1.example.test/inject".into(),
            },
            InjectionTargetConfiguration {
                name: "uss2".into(),
                injection_base_url: "https://uss2.example.test/inject".into(),
            },
        ],
        observers: vec![
            ObserverConfiguration {
                name: "obs1".into(),
                observation_base_url: "https://obs1.example.test/observe".into(),
            },
            ObserverConfiguration {
                name: "obs2".into(),
                observation_base_url: "https://obs2.example.test/observe".into(),
            },
        ],
        flight_start_delay: Duration::from_secs(15),
        evaluation: EvaluationConfiguration::default(),
    }
}

/// The SimWorld - grid, registry, and virtual clock for one run.
pub struct SimWorld {
    pub config: SimConfig,
    pub clock: Arc<SimClock>,
    pub grid: Arc<GeoGrid>,
    pub registry: Arc<FlightRegistry>,
}

impl SimWorld {
    /// Validates the configuration and builds the grid and registry.
    pub fn new(config: SimConfig) -> Result<Self, WorldError> {
        config.qualifier.validate()?;

        let grid = GeoGrid::build(
            &config.area_polygon(),
            &GridSpec {
                resolution: GridResolution::CellSizeDegrees(config.cell_size_deg),
                out_of_area: config.out_of_area,
            },
        )?;

        let registry = FlightRegistry::new(config.qualifier.observers.clone());
        Ok(Self {
            clock: SimClock::shared(),
            grid: Arc::new(grid),
            registry: Arc::new(registry),
            config,
        })
    }

    /// Instant the first flight commences: test start plus the configured
    /// start delay.
    pub fn flight_start_time(&self) -> DateTime<Utc> {
        let delay = TimeDelta::from_std(self.config.qualifier.flight_start_delay)
            .unwrap_or(TimeDelta::MAX);
        self.clock.now() + delay
    }
}

impl SimConfig {
    /// Bounding rectangle of the test area.
    pub fn area_rect(&self) -> Rect<f64> {
        let (lat, lng) = self.area_center;
        let half = self.area_extent_deg / 2.0;
        Rect::new(
            Coord { x: lng - half, y: lat - half },
            Coord { x: lng + half, y: lat + half },
        )
    }

    /// Test area polygon.
    pub fn area_polygon(&self) -> Polygon<f64> {
        self.area_rect().to_polygon()
    }
}
