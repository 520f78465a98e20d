//! Prometheus metrics for reconciliations.

use crate::error::ControllerError;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Duration;

/// Outcome label values of `homeagent_reconciliations_total`
pub const OUTCOME_DONE: &str = "done";
pub const OUTCOME_REQUEUE: &str = "requeue";
pub const OUTCOME_ERROR: &str = "error";

/// Reconciliation metrics, registered in their own registry
pub struct Metrics {
    registry: Registry,
    reconciliations: IntCounterVec,
    reconcile_duration: Histogram,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create and register the reconciliation metrics
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new();

        let reconciliations = IntCounterVec::new(
            Opts::new(
                "homeagent_reconciliations_total",
                "HomeAgent reconciliations by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(reconciliations.clone()))?;

        let reconcile_duration = Histogram::with_opts(
            HistogramOpts::new(
                "homeagent_reconcile_duration_seconds",
                "Duration of HomeAgent reconciliations",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;
        registry.register(Box::new(reconcile_duration.clone()))?;

        Ok(Self {
            registry,
            reconciliations,
            reconcile_duration,
        })
    }

    /// Record one reconciliation
    pub fn observe(&self, outcome: &str, elapsed: Duration) {
        self.reconciliations.with_label_values(&[outcome]).inc();
        self.reconcile_duration.observe(elapsed.as_secs_f64());
    }

    /// Number of reconciliations recorded with `outcome`
    pub fn count(&self, outcome: &str) -> u64 {
        self.reconciliations.with_label_values(&[outcome]).get()
    }

    /// Render all metrics in the Prometheus text format
    pub fn render(&self) -> Result<String, ControllerError> {
        let output = TextEncoder::new().encode_to_string(&self.registry.gather())?;
        Ok(output)
    }
}
