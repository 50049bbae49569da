//! Simulated injection target.
//!
//! Accepts synthetic flights on behalf of an operator the way a real
//! injection target's API would: the flight is partitioned, its query
//! sequence derived, and the result registered as ground truth. A failure
//! aborts the affected flight only; the caller keeps processing others.

use std::sync::Arc;

use thiserror::Error;

use ridqual_core::{
    build_query, EvaluationConfiguration, FlightRegistry, FullFlightRecord, GeoGrid, GridError,
    InjectedFlight, InjectionTargetConfiguration, QueryGeometryError, RegistryError,
};

/// Errors aborting injection of a single flight.
#[derive(Debug, Error)]
pub enum InjectionError {
    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Query(#[from] QueryGeometryError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// One injection target endpoint, simulated.
pub struct SimInjectionTarget {
    config: InjectionTargetConfiguration,
    grid: Arc<GeoGrid>,
    evaluation: EvaluationConfiguration,
}

impl SimInjectionTarget {
    /// Creates a simulated target over the shared grid.
    pub fn new(
        config: InjectionTargetConfiguration,
        grid: Arc<GeoGrid>,
        evaluation: EvaluationConfiguration,
    ) -> Self {
        Self { config, grid, evaluation }
    }

    /// Returns the target's identity.
    pub fn config(&self) -> &InjectionTargetConfiguration {
        &self.config
    }

    /// Partitions the flight, derives its queries, and registers it.
    pub fn inject(
        &self,
        record: FullFlightRecord,
        registry: &FlightRegistry,
    ) -> Result<Arc<InjectedFlight>, InjectionError> {
        let cells = self.grid.partition(record.flight_id, &record.track)?;

        let mut queries = Vec::with_capacity(cells.len());
        for (ordinal, cell_flight) in cells.iter().enumerate() {
            queries.push(build_query(
                cell_flight,
                record.flight_id,
                ordinal,
                &self.evaluation,
            )?);
        }

        Ok(registry.register(record, queries, self.config.clone())?)
    }
}
