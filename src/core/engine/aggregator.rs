// src/core/engine/aggregator.rs

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::core::config::Budget;
use crate::core::models::{
    DiscoverySets, ProbeOutcome, ResultStore, Target, VisitState, looks_like_domain, normalize_domain,
};
use crate::core::probes::Strategy;

/// Discovery fields counted per structured record.
const STRUCTURED_DOMAIN_CAP: usize = 20;
const STRUCTURED_IP_CAP: usize = 10;

/// Everything a scan mutates, guarded by the aggregator's lock.
#[derive(Debug, Default)]
pub struct ScanState {
    pub results: ResultStore,
    pub discovered: DiscoverySets,
    pub visited: VisitState,
    pub result_count: usize,
    absorbed: HashSet<(Strategy, Target)>,
}

/// Merges probe outcomes into the shared scan state and tracks the result budget.
pub struct Aggregator {
    state: Mutex<ScanState>,
    exhausted: AtomicBool,
    budget: Budget,
}

impl Aggregator {
    pub fn new(seed: &Target, budget: Budget) -> Self {
        Self {
            state: Mutex::new(ScanState {
                discovered: DiscoverySets::seeded(seed),
                ..ScanState::default()
            }),
            exhausted: AtomicBool::new(false),
            budget,
        }
    }

    /// The one-way flag the worker pools consult before starting a task.
    pub fn exhausted_flag(&self) -> &AtomicBool {
        &self.exhausted
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::Acquire)
    }

    /// Marks `target` as visited. Returns `false` when it was already claimed.
    pub async fn claim(&self, target: &Target) -> bool {
        let mut state = self.state.lock().await;
        if !state.visited.insert(target.clone()) {
            return false;
        }
        state.discovered.insert(target.clone());
        true
    }

    /// Unvisited domains and IPs, sorted, each list capped at `cap`.
    pub async fn frontier(&self, cap: usize) -> (Vec<Target>, Vec<Target>) {
        let state = self.state.lock().await;
        let domains = state
            .discovered
            .sorted_domains()
            .into_iter()
            .filter(|d| !state.visited.domains.contains(d))
            .take(cap)
            .map(Target::Domain)
            .collect();
        let ips = state
            .discovered
            .sorted_ips()
            .into_iter()
            .filter(|ip| !state.visited.ips.contains(ip))
            .take(cap)
            .map(Target::Ip)
            .collect();
        (domains, ips)
    }

    /// Records one probe outcome produced for `source`.
    ///
    /// # Returns
    /// How much the result count grew. Repeated `(strategy, source)` pairs add nothing.
    pub async fn absorb(&self, strategy: Strategy, outcome: ProbeOutcome, source: &Target) -> usize {
        let mut state = self.state.lock().await;
        if !state.absorbed.insert((strategy, source.clone())) {
            debug!(%strategy, %source, "Outcome already absorbed, ignoring repeat.");
            return 0;
        }

        let added = match outcome {
            ProbeOutcome::Empty => 0,
            ProbeOutcome::List(items) => absorb_list(&mut state, strategy, items, self.budget.max_per_strategy),
            ProbeOutcome::Structured(fields) => absorb_record(&mut state, strategy, fields, source),
        };
        state.result_count += added;

        if state.result_count >= self.budget.max_results && !self.is_exhausted() {
            info!(
                result_count = state.result_count,
                max_results = self.budget.max_results,
                "Result budget exhausted."
            );
            self.exhausted.store(true, Ordering::Release);
        }
        added
    }

    pub async fn result_count(&self) -> usize {
        self.state.lock().await.result_count
    }

    pub fn into_state(self) -> ScanState {
        self.state.into_inner()
    }
}

fn absorb_list(state: &mut ScanState, strategy: Strategy, items: Vec<Value>, cap: usize) -> usize {
    let kept: Vec<Value> = items.into_iter().take(cap).collect();
    for item in &kept {
        if let Some(text) = item.as_str() {
            if looks_like_domain(text) {
                if let Some(domain) = normalize_domain(text) {
                    state.discovered.domains.insert(domain);
                }
            }
        }
    }
    let added = kept.len();
    state.results.entry(strategy).or_default().extend(kept);
    added
}

fn absorb_record(state: &mut ScanState, strategy: Strategy, fields: Map<String, Value>, source: &Target) -> usize {
    let domains = string_items(&fields, "domains", STRUCTURED_DOMAIN_CAP);
    let ips = string_items(&fields, "ips", STRUCTURED_IP_CAP);
    let added = domains.len() + ips.len();

    for raw in domains.into_iter().chain(ips) {
        match Target::parse(&raw) {
            Some(Target::Ip(ip)) => {
                state.discovered.ips.insert(ip);
            }
            Some(Target::Domain(domain)) if looks_like_domain(&domain) => {
                state.discovered.domains.insert(domain);
            }
            _ => debug!(%strategy, value = %raw, "Ignoring unusable discovery value."),
        }
    }

    let mut entry = Map::new();
    entry.insert(source.to_string(), Value::Object(fields));
    state.results.entry(strategy).or_default().push(Value::Object(entry));
    added
}

/// The first `cap` string items of the array field `key`.
fn string_items(fields: &Map<String, Value>, key: &str, cap: usize) -> Vec<String> {
    fields
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .take(cap)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seed() -> Target {
        Target::Domain("example.com".to_string())
    }

    fn budget(max_results: usize) -> Budget {
        Budget { max_results, ..Budget::default() }
    }

    #[tokio::test]
    async fn list_is_capped_per_strategy() {
        let aggregator = Aggregator::new(&seed(), budget(10_000));
        let items: Vec<String> = (0..1000).map(|i| format!("h{i}.example.com")).collect();
        let added = aggregator.absorb(Strategy::Subdomains, ProbeOutcome::list(items), &seed()).await;
        assert_eq!(added, 50);

        let state = aggregator.into_state();
        assert_eq!(state.result_count, 50);
        assert_eq!(state.results[&Strategy::Subdomains].len(), 50);
        assert_eq!(state.discovered.domains.len(), 51);
    }

    #[tokio::test]
    async fn structured_counts_capped_discoveries() {
        let aggregator = Aggregator::new(&seed(), budget(10_000));
        let domains: Vec<String> = (0..30).map(|i| format!("d{i}.example.com")).collect();
        let ips: Vec<String> = (1..=15).map(|i| format!("192.0.2.{i}")).collect();
        let outcome = ProbeOutcome::record(&json!({ "domains": domains, "ips": ips, "note": "x" }));
        let added = aggregator.absorb(Strategy::Ns, outcome, &seed()).await;
        assert_eq!(added, 30);

        let state = aggregator.into_state();
        assert_eq!(state.discovered.domains.len(), 21);
        assert_eq!(state.discovered.ips.len(), 10);
        let entry = &state.results[&Strategy::Ns][0];
        assert_eq!(entry["example.com"]["note"], json!("x"));
    }

    #[tokio::test]
    async fn repeated_absorption_is_ignored() {
        let aggregator = Aggregator::new(&seed(), budget(10_000));
        let outcome = ProbeOutcome::list(["a.example.com"]);
        assert_eq!(aggregator.absorb(Strategy::Txt, outcome.clone(), &seed()).await, 1);
        assert_eq!(aggregator.absorb(Strategy::Txt, outcome, &seed()).await, 0);
        assert_eq!(aggregator.result_count().await, 1);
    }

    #[tokio::test]
    async fn budget_flag_is_one_way() {
        let aggregator = Aggregator::new(&seed(), budget(2));
        aggregator.absorb(Strategy::A, ProbeOutcome::list(["x"]), &seed()).await;
        assert!(!aggregator.is_exhausted());
        aggregator.absorb(Strategy::Aaaa, ProbeOutcome::list(["y"]), &seed()).await;
        assert!(aggregator.is_exhausted());
        aggregator.absorb(Strategy::Mx, ProbeOutcome::Empty, &seed()).await;
        assert!(aggregator.is_exhausted());
    }

    #[tokio::test]
    async fn claims_are_exclusive_and_frontier_shrinks() {
        let aggregator = Aggregator::new(&seed(), budget(100));
        aggregator
            .absorb(Strategy::Ptr, ProbeOutcome::record(&json!({ "ips": ["192.0.2.1"] })), &seed())
            .await;
        let (domains, ips) = aggregator.frontier(50).await;
        assert_eq!(domains, vec![seed()]);
        assert_eq!(ips, vec![Target::Ip("192.0.2.1".parse().unwrap())]);

        assert!(aggregator.claim(&seed()).await);
        assert!(!aggregator.claim(&seed()).await);
        let (domains, _) = aggregator.frontier(50).await;
        assert!(domains.is_empty());
    }
}
