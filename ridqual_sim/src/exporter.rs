//! JSON exporter for scenario results.
//!
//! Exports per-report verdict records for CI parsing and offline review.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

use ridqual_core::{ObservedReport, Verdict};

/// One reconciled report in the export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRecord {
    pub observer: String,
    pub flight: String,
    pub query: String,
    pub observed_at: DateTime<Utc>,
    pub verdict: String,

    /// Matched injection timestamp, present only for consistent reports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub injected_at: Option<DateTime<Utc>>,
}

impl ReportRecord {
    /// Builds a record from a report and its verdict.
    pub fn new(report: &ObservedReport, observer: &str, verdict: &Verdict) -> Self {
        let injected_at = match verdict {
            Verdict::Consistent { injected_at, .. } => Some(*injected_at),
            _ => None,
        };
        Self {
            observer: observer.to_string(),
            flight: report.flight.to_string(),
            query: report.query_name.clone(),
            observed_at: report.observed_at,
            verdict: verdict.label().to_string(),
            injected_at,
        }
    }
}

/// Complete export for one scenario run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Number of flights synthesized
    pub flights: usize,

    /// All reconciled reports
    pub reports: Vec<ReportRecord>,

    /// Verdict tallies
    pub consistent: usize,
    pub stale: usize,
    pub premature: usize,
    pub not_found: usize,

    /// Final outcome
    pub passed: bool,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            flights: 0,
            reports: Vec::new(),
            consistent: 0,
            stale: 0,
            premature: 0,
            not_found: 0,
            passed: false,
        }
    }

    /// Adds one reconciled report.
    pub fn add_report(&mut self, record: ReportRecord) {
        self.reports.push(record);
    }

    /// Finalizes the export, tallying verdicts from the recorded reports.
    pub fn finalize(&mut self, flights: usize, passed: bool) {
        self.flights = flights;
        self.passed = passed;
        self.consistent = self.count("consistent");
        self.stale = self.count("stale");
        self.premature = self.count("premature");
        self.not_found = self.count("not_found");
    }

    fn count(&self, label: &str) -> usize {
        self.reports.iter().filter(|r| r.verdict == label).count()
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
