//! Virtual clock for deterministic simulation.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Simulation epoch: 2024-01-01 00:00:00 UTC.
pub const SIM_EPOCH_SECS: i64 = 1704067200;

/// A manually-advanced clock shared across harness components.
///
/// Virtual time only moves when the harness advances it, so runs are
/// reproducible regardless of wall-clock scheduling.
pub struct SimClock {
    epoch: DateTime<Utc>,
    offset_ms: Mutex<i64>,
}

impl SimClock {
    /// Creates a clock at the simulation epoch.
    pub fn new() -> Self {
        Self {
            epoch: DateTime::from_timestamp(SIM_EPOCH_SECS, 0)
                .expect("simulation epoch is a valid timestamp"),
            offset_ms: Mutex::new(0),
        }
    }

    /// Creates an Arc-wrapped clock for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Returns the current virtual instant.
    pub fn now(&self) -> DateTime<Utc> {
        self.epoch + TimeDelta::milliseconds(*self.offset_ms.lock().unwrap())
    }

    /// Advances virtual time by the given duration.
    pub fn advance(&self, duration: Duration) {
        let mut offset = self.offset_ms.lock().unwrap();
        *offset += duration.as_millis() as i64;
    }

    /// Advances virtual time to `instant` if it lies in the future;
    /// virtual time never moves backwards.
    pub fn advance_to(&self, instant: DateTime<Utc>) {
        let mut offset = self.offset_ms.lock().unwrap();
        let target = (instant - self.epoch).num_milliseconds();
        if target > *offset {
            *offset = target;
        }
    }

    /// Virtual time elapsed since the epoch.
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis((*self.offset_ms.lock().unwrap()).max(0) as u64)
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_starts_at_epoch() {
        let clock = SimClock::new();
        assert_eq!(clock.now().timestamp(), SIM_EPOCH_SECS);
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_clock_advances() {
        let clock = SimClock::new();
        clock.advance(Duration::from_secs(1));
        clock.advance(Duration::from_millis(500));
        assert_eq!(clock.elapsed(), Duration::from_millis(1500));
    }

    #[test]
    fn test_clock_never_moves_backwards() {
        let clock = SimClock::new();
        clock.advance(Duration::from_secs(10));
        let earlier = clock.now() - TimeDelta::seconds(5);
        clock.advance_to(earlier);
        assert_eq!(clock.elapsed(), Duration::from_secs(10));

        let later = clock.now() + TimeDelta::seconds(5);
        clock.advance_to(later);
        assert_eq!(clock.elapsed(), Duration::from_secs(15));
    }
}
