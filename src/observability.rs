//! Observability: tracing setup and dispatch counters

use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber
///
/// `RUST_LOG` wins over `default_filter` when set.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    // A second initialisation (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Counters kept by a registry for its dispatches
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    dispatched: AtomicU64,
    failed: AtomicU64,
    callbacks_fired: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "dispatched", "Metric incremented");
    }

    pub fn dispatch_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "failed", "Metric incremented");
    }

    pub fn callback_fired(&self) {
        self.callbacks_fired.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(counter = "callbacks_fired", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            callbacks_fired: self.callbacks_fired.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub dispatched: u64,
    pub failed: u64,
    pub callbacks_fired: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero_and_increment() {
        let metrics = DispatchMetrics::new();
        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                dispatched: 0,
                failed: 0,
                callbacks_fired: 0
            }
        );

        metrics.dispatched();
        metrics.dispatched();
        metrics.dispatch_failed();
        metrics.callback_fired();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.dispatched, 2);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.callbacks_fired, 1);
    }
}
