// src/core/engine/mod.rs

//! The recursive crawl: level-by-level expansion from the seed, bounded fan-out,
//! aggregation and early termination on the result budget.

pub mod aggregator;
pub mod dispatch;
pub mod filter;
pub mod pool;

use chrono::Utc;
use futures::StreamExt;
use tracing::{debug, info, instrument};

use crate::core::config::{Budget, ScanConfig};
use crate::core::errors::ConfigError;
use crate::core::models::{DiscoverySets, ResultStore, ScanReport, ScanSummary, Target, VisitState};
use crate::core::probes::{ProbeRegistry, Scope, Strategy};

use aggregator::Aggregator;
use dispatch::Dispatcher;
use pool::run_bounded;

/// Probes run concurrently against a single target.
const PER_TARGET_LIMIT: usize = 8;

/// What a finished crawl hands back.
#[derive(Debug)]
pub struct CrawlOutcome {
    pub results: ResultStore,
    pub discovered: DiscoverySets,
    pub visited: VisitState,
    pub result_count: usize,
    pub budget_exhausted: bool,
    /// Number of levels that ran.
    pub levels: u32,
}

/// Drives one scan from the seed to `max_depth`.
pub struct Crawler {
    seed: Target,
    budget: Budget,
    dispatcher: Dispatcher,
    aggregator: Aggregator,
}

impl Crawler {
    /// Validates `config` and prepares the crawl state. Nothing touches the network
    /// until [`Crawler::run`].
    pub fn new(config: &ScanConfig, registry: ProbeRegistry) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_dispatcher(config, Dispatcher::new(registry, config)))
    }

    /// Like [`Crawler::new`] but with a caller-built dispatcher. The configuration is
    /// not validated.
    pub fn with_dispatcher(config: &ScanConfig, dispatcher: Dispatcher) -> Self {
        Self {
            seed: config.seed.clone(),
            budget: config.budget,
            aggregator: Aggregator::new(&config.seed, config.budget),
            dispatcher,
        }
    }

    #[instrument(skip(self), fields(seed = %self.seed, max_depth = self.budget.max_depth))]
    pub async fn run(self) -> CrawlOutcome {
        info!(registered = self.dispatcher.registry().len(), "Starting crawl.");
        let domain_strategies = self.enabled_strategies(Scope::Domain);
        let ip_strategies = self.enabled_strategies(Scope::Ip);

        let mut levels = 0;
        for depth in 0..=self.budget.max_depth {
            let (domains, ips) = self.aggregator.frontier(self.budget.max_per_strategy).await;
            if domains.is_empty() && ips.is_empty() {
                debug!(depth, "Frontier is empty, stopping.");
                break;
            }
            info!(depth, domains = domains.len(), ips = ips.len(), "Starting level.");

            self.run_batch(domains, &domain_strategies, depth).await;
            self.run_batch(ips, &ip_strategies, depth).await;
            levels = depth + 1;

            if self.aggregator.is_exhausted() {
                info!(depth, "Budget exhausted, not expanding further.");
                break;
            }
        }

        let budget_exhausted = self.aggregator.is_exhausted();
        let state = self.aggregator.into_state();
        info!(
            levels,
            result_count = state.result_count,
            domains = state.discovered.domains.len(),
            ips = state.discovered.ips.len(),
            visited = state.visited.len(),
            "Crawl finished."
        );
        CrawlOutcome {
            results: state.results,
            discovered: state.discovered,
            visited: state.visited,
            result_count: state.result_count,
            budget_exhausted,
            levels,
        }
    }

    fn enabled_strategies(&self, scope: Scope) -> Vec<Strategy> {
        self.dispatcher
            .registry()
            .strategies(scope)
            .into_iter()
            .filter(|s| self.dispatcher.is_enabled(*s))
            .collect()
    }

    /// Runs one batch of targets with at most `threads` targets in flight.
    async fn run_batch(&self, targets: Vec<Target>, strategies: &[Strategy], depth: u32) {
        if targets.is_empty() {
            return;
        }
        let tasks = targets
            .into_iter()
            .map(|target| self.process_target(target, strategies, depth));
        run_bounded(tasks, self.budget.threads, self.aggregator.exhausted_flag())
            .collect::<Vec<()>>()
            .await;
    }

    /// Claims `target`, runs every strategy against it and absorbs outcomes as they
    /// complete.
    async fn process_target(&self, target: Target, strategies: &[Strategy], depth: u32) {
        if !self.aggregator.claim(&target).await {
            debug!(%target, "Already visited, skipping.");
            return;
        }
        debug!(%target, depth, strategies = strategies.len(), "Dispatching target.");

        let limit = strategies.len().min(PER_TARGET_LIMIT);
        let target_ref = &target;
        let calls = strategies.iter().map(|&strategy| async move {
            (strategy, self.dispatcher.dispatch(strategy, target_ref, depth).await)
        });
        let mut outcomes = run_bounded(calls, limit, self.aggregator.exhausted_flag());
        while let Some((strategy, outcome)) = outcomes.next().await {
            self.aggregator.absorb(strategy, outcome, target_ref).await;
        }
    }
}

/// Runs a full scan and assembles the report, provider filter included.
///
/// # Arguments
/// * `config` - The validated-on-entry scan settings.
/// * `registry` - The probes available to this scan.
///
/// # Returns
/// The report, or a `ConfigError` if `config` is rejected before the crawl starts.
pub async fn scan(config: &ScanConfig, registry: ProbeRegistry) -> Result<ScanReport, ConfigError> {
    let crawler = Crawler::new(config, registry)?;
    let outcome = crawler.run().await;
    Ok(build_report(config, outcome))
}

/// Turns a crawl outcome into the exported document.
pub fn build_report(config: &ScanConfig, outcome: CrawlOutcome) -> ScanReport {
    let mut results = outcome.results;
    filter::hide_providers(&mut results, &config.hidden_providers);

    let domains = outcome.discovered.sorted_domains();
    let ips = outcome.discovered.sorted_ips();
    let summary = ScanSummary {
        domains_found: domains.len(),
        ips_found: ips.len(),
        result_count: outcome.result_count,
        budget_exhausted: outcome.budget_exhausted,
        strategies_used: results.keys().copied().collect(),
        domains,
        ips,
    };
    ScanReport {
        domain: config.seed.to_string(),
        scan_date: Utc::now(),
        depth: config.budget.max_depth,
        max_results: config.budget.max_results,
        total_results: summary.domains_found + summary.ips_found,
        results,
        summary,
    }
}
