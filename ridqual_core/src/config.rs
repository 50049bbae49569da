//! Test configuration layer.
//!
//! Explicit configuration structs with every recognized option enumerated
//! and a documented default. Duration fields are expressed as "5s"-style
//! strings in JSON and parsed at load time; malformed values fail the load
//! rather than surfacing at first use. All configuration is immutable for
//! the duration of a test run.

use parse_duration::parse;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading or validating a configuration document.
///
/// All of these are fatal at startup: a run cannot proceed with undefined
/// timing budgets.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Document failed to parse (including malformed duration strings)
    #[error("configuration does not parse: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("at least one injection target is required")]
    MissingInjectionTargets,

    #[error("at least one observer is required")]
    MissingObservers,

    #[error("locale must be a three letter ISO 3166 code, got {0:?}")]
    InvalidLocale(String),

    #[error("{field} must be a positive duration")]
    ZeroDuration { field: &'static str },

    #[error("min_query_diagonal must be positive meters, got {0}")]
    InvalidDiagonal(f64),

    #[error("max_buffer_factor must be at least 1, got {0}")]
    InvalidBufferFactor(f64),
}

/// Deserializes a Duration from a "5s"/"2m30s"-style string.
pub fn de_duration_from_str<'a, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'a>,
{
    let s = String::deserialize(deserializer)?;
    parse(s.as_str()).map_err(|e| serde::de::Error::custom(format!("{:?}", e)))
}

/// Serializes a Duration in the debug form ("5s", "1.5s").
pub fn ser_duration_as_str<S: Serializer>(dur: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format!("{:?}", dur))
}

/// Identity of a system that accepts flight data on behalf of an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionTargetConfiguration {
    pub name: String,
    pub injection_base_url: String,
}

/// Identity of a system queried for currently-visible airborne traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverConfiguration {
    pub name: String,
    pub observation_base_url: String,
}

/// Settings controlling behavior when evaluating observed system data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfiguration {
    /// Do not repeat system observations with intervals smaller than this.
    /// Default 5s.
    #[serde(
        default = "default_min_polling_interval",
        deserialize_with = "de_duration_from_str",
        serialize_with = "ser_duration_as_str"
    )]
    pub min_polling_interval: Duration,

    /// Allow up to this much time for data to propagate through the system.
    /// Default 10s.
    #[serde(
        default = "default_max_propagation_latency",
        deserialize_with = "de_duration_from_str",
        serialize_with = "ser_duration_as_str"
    )]
    pub max_propagation_latency: Duration,

    /// Do not make queries with diagonals smaller than this many meters.
    /// Default 100.
    #[serde(default = "default_min_query_diagonal")]
    pub min_query_diagonal: f64,

    /// Upper bound on the uniform enlargement factor applied to query
    /// shapes whose diagonal is below the floor. Default 4.
    #[serde(default = "default_max_buffer_factor")]
    pub max_buffer_factor: f64,
}

fn default_min_polling_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_max_propagation_latency() -> Duration {
    Duration::from_secs(10)
}

fn default_min_query_diagonal() -> f64 {
    100.0
}

fn default_max_buffer_factor() -> f64 {
    4.0
}

fn default_flight_start_delay() -> Duration {
    Duration::from_secs(15)
}

impl Default for EvaluationConfiguration {
    fn default() -> Self {
        Self {
            min_polling_interval: default_min_polling_interval(),
            max_propagation_latency: default_max_propagation_latency(),
            min_query_diagonal: default_min_query_diagonal(),
            max_buffer_factor: default_max_buffer_factor(),
        }
    }
}

impl EvaluationConfiguration {
    /// Validates the timing and geometry budgets.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_polling_interval.is_zero() {
            return Err(ConfigError::ZeroDuration { field: "min_polling_interval" });
        }
        if self.max_propagation_latency.is_zero() {
            return Err(ConfigError::ZeroDuration { field: "max_propagation_latency" });
        }
        if !(self.min_query_diagonal > 0.0) {
            return Err(ConfigError::InvalidDiagonal(self.min_query_diagonal));
        }
        if !(self.max_buffer_factor >= 1.0) {
            return Err(ConfigError::InvalidBufferFactor(self.max_buffer_factor));
        }
        Ok(())
    }
}

/// Top-level qualifier test configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidQualifierTestConfiguration {
    /// Three letter ISO 3166 country code the qualifier runs against;
    /// must match the locale the flight data was simulated for.
    pub locale: String,

    /// Systems into which flight data is injected
    pub injection_targets: Vec<InjectionTargetConfiguration>,

    /// Systems through which the airspace is observed
    pub observers: Vec<ObserverConfiguration>,

    /// Time between starting the test and commencement of flights.
    /// Default 15s.
    #[serde(
        default = "default_flight_start_delay",
        deserialize_with = "de_duration_from_str",
        serialize_with = "ser_duration_as_str"
    )]
    pub flight_start_delay: Duration,

    #[serde(default)]
    pub evaluation: EvaluationConfiguration,
}

impl RidQualifierTestConfiguration {
    /// Parses and eagerly validates a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the whole configuration; called by [`Self::from_json`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.locale.len() != 3 || !self.locale.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::InvalidLocale(self.locale.clone()));
        }
        if self.injection_targets.is_empty() {
            return Err(ConfigError::MissingInjectionTargets);
        }
        if self.observers.is_empty() {
            return Err(ConfigError::MissingObservers);
        }
        self.evaluation.validate()
    }
}
