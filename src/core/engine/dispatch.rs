// src/core/engine/dispatch.rs

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, error, warn};

use crate::core::config::ScanConfig;
use crate::core::models::{ProbeOutcome, Target};
use crate::core::probes::{ProbeRegistry, Strategy};

/// Runs registered probes against one target and turns every failure into `Empty`.
pub struct Dispatcher {
    registry: ProbeRegistry,
    max_depth: u32,
    deadline: Duration,
    disabled: HashSet<Strategy>,
}

impl Dispatcher {
    pub fn new(registry: ProbeRegistry, config: &ScanConfig) -> Self {
        Self {
            registry,
            max_depth: config.budget.max_depth,
            deadline: config.probe_deadline(),
            disabled: config.disabled.clone(),
        }
    }

    /// Overrides the per-call bound.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn registry(&self) -> &ProbeRegistry {
        &self.registry
    }

    pub fn is_enabled(&self, strategy: Strategy) -> bool {
        !self.disabled.contains(&strategy)
    }

    /// Invokes one strategy on one target.
    ///
    /// # Returns
    /// The probe's outcome, or `ProbeOutcome::Empty` when the depth is past the limit,
    /// the strategy is disabled or unregistered, or the probe failed, panicked or
    /// ran past the deadline.
    pub async fn dispatch(&self, strategy: Strategy, target: &Target, depth: u32) -> ProbeOutcome {
        if depth > self.max_depth || !self.is_enabled(strategy) {
            return ProbeOutcome::Empty;
        }
        let Some(probe) = self.registry.get(strategy) else {
            debug!(%strategy, "No probe registered.");
            return ProbeOutcome::Empty;
        };

        let call = AssertUnwindSafe(probe.probe(target, depth)).catch_unwind();
        match tokio::time::timeout(self.deadline, call).await {
            Ok(Ok(Ok(outcome))) => outcome.normalized(),
            Ok(Ok(Err(e))) => {
                debug!(%strategy, %target, error = %e, "Probe failed.");
                ProbeOutcome::Empty
            }
            Ok(Err(_)) => {
                error!(%strategy, %target, "Probe panicked.");
                ProbeOutcome::Empty
            }
            Err(_) => {
                warn!(%strategy, %target, deadline = ?self.deadline, "Probe timed out.");
                ProbeOutcome::Empty
            }
        }
    }
}
