//! Rate gate for bursts of duplicate scan events.
//!
//! The capture side may hand over the same decoded text many times per
//! second. The gate drops events that arrive too soon after the last
//! processed one. It only saves work; every store operation behind it is
//! idempotent.

use std::time::{Duration, Instant};

/// Default minimum interval between processed scan events.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(200);

/// Last-processed-timestamp guard evaluated before dispatching a scan.
#[derive(Debug, Clone)]
pub struct ScanGate {
    min_interval: Duration,
    last_processed: Option<Instant>,
}

impl Default for ScanGate {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

impl ScanGate {
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_processed: None,
        }
    }

    /// Whether an event arriving at `now` should be processed.
    ///
    /// Admitted events reset the window; dropped ones do not.
    pub fn admit(&mut self, now: Instant) -> bool {
        let open = self
            .last_processed
            .is_none_or(|last| now.saturating_duration_since(last) >= self.min_interval);
        if open {
            self.last_processed = Some(now);
        }
        open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_event_is_admitted() {
        let mut gate = ScanGate::default();
        assert!(gate.admit(Instant::now()));
    }

    #[test]
    fn burst_within_window_is_dropped() {
        let mut gate = ScanGate::new(Duration::from_millis(200));
        let t0 = Instant::now();
        assert!(gate.admit(t0));
        assert!(!gate.admit(t0 + Duration::from_millis(10)));
        assert!(!gate.admit(t0 + Duration::from_millis(199)));
        assert!(gate.admit(t0 + Duration::from_millis(200)));
    }

    #[test]
    fn dropped_events_do_not_extend_window() {
        let mut gate = ScanGate::new(Duration::from_millis(200));
        let t0 = Instant::now();
        assert!(gate.admit(t0));
        assert!(!gate.admit(t0 + Duration::from_millis(150)));
        assert!(gate.admit(t0 + Duration::from_millis(250)));
    }

    #[test]
    fn zero_interval_admits_everything() {
        let mut gate = ScanGate::new(Duration::ZERO);
        let t0 = Instant::now();
        assert!(gate.admit(t0));
        assert!(gate.admit(t0));
    }
}
