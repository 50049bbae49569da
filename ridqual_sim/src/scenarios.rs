//! Scenario catalogue for the simulation harness.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// RIDQ-001: well-behaved propagation within the latency budget
    Nominal,

    /// RIDQ-002: propagation slower than the latency budget
    SlowPropagation,

    /// RIDQ-003: observer clock running behind the injection clock
    ClockSkew,

    /// RIDQ-004: track crossing many cell boundaries
    CellHopper,

    /// RIDQ-005: orbit track re-entering a previously visited cell
    Reentrant,

    /// RIDQ-006: reports for a flight that was never injected
    UnknownFlight,

    /// RIDQ-007: track leaving the configured test area
    OutOfArea,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Nominal,
            ScenarioId::SlowPropagation,
            ScenarioId::ClockSkew,
            ScenarioId::CellHopper,
            ScenarioId::Reentrant,
            ScenarioId::UnknownFlight,
            ScenarioId::OutOfArea,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Nominal => "nominal",
            ScenarioId::SlowPropagation => "slow_propagation",
            ScenarioId::ClockSkew => "clock_skew",
            ScenarioId::CellHopper => "cell_hopper",
            ScenarioId::Reentrant => "reentrant",
            ScenarioId::UnknownFlight => "unknown_flight",
            ScenarioId::OutOfArea => "out_of_area",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Nominal => "All reports arrive within the propagation budget",
            ScenarioId::SlowPropagation => "25s mean delay against a 10s budget, expect Stale",
            ScenarioId::ClockSkew => "Observer clock 30s behind, expect Premature",
            ScenarioId::CellHopper => "Full-width tracks crossing every grid column",
            ScenarioId::Reentrant => "Orbit tracks closing on their starting cell",
            ScenarioId::UnknownFlight => "Reports for unregistered flights, expect NotFound",
            ScenarioId::OutOfArea => "Departing track under the Abort policy",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nominal" | "ridq-001" => Ok(ScenarioId::Nominal),
            "slow_propagation" | "slowpropagation" | "ridq-002" => Ok(ScenarioId::SlowPropagation),
            "clock_skew" | "clockskew" | "ridq-003" => Ok(ScenarioId::ClockSkew),
            "cell_hopper" | "cellhopper" | "ridq-004" => Ok(ScenarioId::CellHopper),
            "reentrant" | "ridq-005" => Ok(ScenarioId::Reentrant),
            "unknown_flight" | "unknownflight" | "ridq-006" => Ok(ScenarioId::UnknownFlight),
            "out_of_area" | "outofarea" | "ridq-007" => Ok(ScenarioId::OutOfArea),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_names_round_trip() {
        for scenario in ScenarioId::all() {
            let parsed: ScenarioId = scenario.name().parse().unwrap();
            assert_eq!(parsed, scenario);
        }
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        assert!("no_such_scenario".parse::<ScenarioId>().is_err());
    }
}
