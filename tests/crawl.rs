// tests/crawl.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{StreamExt, stream};
use serde_json::json;

use vanguard_dns_mapper::core::engine::pool::collect_within;
use vanguard_dns_mapper::core::errors::{ConfigError, ProbeError};
use vanguard_dns_mapper::{Crawler, FnProbe, Probe, ProbeOutcome, ProbeRegistry, ScanConfig, Strategy, Target, scan};

type CallLog = Arc<Mutex<Vec<Target>>>;

/// A fake probe that records every target it is called with.
fn recording<F>(log: CallLog, respond: F) -> impl Probe
where
    F: Fn(&Target) -> ProbeOutcome + Send + Sync + 'static,
{
    let respond = Arc::new(respond);
    FnProbe::new(move |target: Target, _depth: u32| {
        let log = log.clone();
        let respond = respond.clone();
        async move {
            log.lock().unwrap().push(target.clone());
            Ok(respond(&target))
        }
    })
}

fn domain(name: &str) -> Target {
    Target::Domain(name.to_string())
}

fn config(seed: &str, max_depth: u32) -> ScanConfig {
    let mut config = ScanConfig::new(seed).unwrap();
    config.budget.max_depth = max_depth;
    config
}

/// Counts how many calls are in flight at once and remembers the highest value.
#[derive(Clone, Default)]
struct Gauge {
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Gauge {
    fn tracked(&self, domains: &'static [&'static str]) -> impl Probe + use<> {
        let gauge = self.clone();
        FnProbe::new(move |target: Target, _depth: u32| {
            let gauge = gauge.clone();
            async move {
                let now = gauge.running.fetch_add(1, Ordering::SeqCst) + 1;
                gauge.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(25)).await;
                gauge.running.fetch_sub(1, Ordering::SeqCst);
                if target == domain("example.com") && !domains.is_empty() {
                    Ok(ProbeOutcome::record(&json!({ "domains": domains })))
                } else {
                    Ok(ProbeOutcome::Empty)
                }
            }
        })
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

fn counts(log: &CallLog) -> HashMap<Target, usize> {
    let mut counts = HashMap::new();
    for target in log.lock().unwrap().iter() {
        *counts.entry(target.clone()).or_insert(0) += 1;
    }
    counts
}

#[tokio::test]
async fn discovered_domains_are_crawled_once() {
    let log = CallLog::default();
    let mut registry = ProbeRegistry::new();
    registry.register(
        Strategy::Ns,
        recording(log.clone(), |target| match target.to_string().as_str() {
            "example.com" => ProbeOutcome::record(&json!({ "domains": ["a.example.com", "b.example.com"] })),
            _ => ProbeOutcome::record(&json!({ "domains": ["example.com", "a.example.com", "b.example.com"] })),
        }),
    );

    let outcome = Crawler::new(&config("example.com", 1), registry).unwrap().run().await;

    let expected = ["example.com", "a.example.com", "b.example.com"];
    let calls = counts(&log);
    assert_eq!(calls.len(), 3);
    assert!(calls.values().all(|&n| n == 1));
    for name in expected {
        assert!(outcome.discovered.domains.contains(name));
        assert!(outcome.visited.domains.contains(name));
    }
    assert_eq!(outcome.discovered.domains.len(), 3);
    assert_eq!(outcome.visited.domains.len(), 3);
}

#[tokio::test]
async fn rediscovery_across_levels_never_redispatches() {
    let log = CallLog::default();
    let mut registry = ProbeRegistry::new();
    registry.register(
        Strategy::Cname,
        recording(log.clone(), |_| ProbeOutcome::record(&json!({ "domains": ["example.com", "loop.example.com"] }))),
    );

    let outcome = Crawler::new(&config("example.com", 4), registry).unwrap().run().await;

    assert!(counts(&log).values().all(|&n| n == 1));
    assert_eq!(log.lock().unwrap().len(), 2);
    assert_eq!(outcome.levels, 2);
}

#[tokio::test]
async fn targets_found_at_the_last_level_are_not_dispatched() {
    let log = CallLog::default();
    let mut registry = ProbeRegistry::new();
    registry.register(
        Strategy::Subdomains,
        recording(log.clone(), |target| ProbeOutcome::list([format!("next.{target}")])),
    );

    let outcome = Crawler::new(&config("example.com", 2), registry).unwrap().run().await;

    let visited: Vec<String> = outcome.visited.sorted_domains();
    assert_eq!(visited, vec!["example.com", "next.example.com", "next.next.example.com"]);
    assert!(outcome.discovered.domains.contains("next.next.next.example.com"));
    assert!(!outcome.visited.domains.contains("next.next.next.example.com"));
    assert_eq!(outcome.levels, 3);
}

#[tokio::test]
async fn small_budget_stops_after_the_seed_level() {
    let log = CallLog::default();
    let mut registry = ProbeRegistry::new();
    registry
        .register(Strategy::A, recording(log.clone(), |_| ProbeOutcome::list(["one.example.com"])))
        .register(Strategy::Mx, recording(log.clone(), |_| ProbeOutcome::list(["two.example.com"])));
    let mut config = config("example.com", 3);
    config.budget.max_results = 1;

    let outcome = Crawler::new(&config, registry).unwrap().run().await;

    assert!(outcome.budget_exhausted);
    assert!((1..=2).contains(&outcome.result_count));
    assert_eq!(outcome.visited.sorted_domains(), vec!["example.com"]);
    assert_eq!(outcome.levels, 1);
}

#[tokio::test]
async fn list_results_are_capped_per_strategy() {
    let mut registry = ProbeRegistry::new();
    registry.register(
        Strategy::Subdomains,
        recording(CallLog::default(), |_| {
            ProbeOutcome::list((0..1000).map(|i| format!("h{i}.example.com")))
        }),
    );
    let mut config = config("example.com", 0);
    config.budget.max_results = 10_000;

    let outcome = Crawler::new(&config, registry).unwrap().run().await;

    assert_eq!(outcome.results[&Strategy::Subdomains].len(), 50);
    assert_eq!(outcome.result_count, 50);
    assert_eq!(outcome.visited.len(), 1);
}

#[tokio::test]
async fn failing_and_panicking_probes_do_not_stop_the_scan() {
    let mut registry = ProbeRegistry::new();
    registry
        .register(
            Strategy::Txt,
            FnProbe::new(|_, _| async { Err(ProbeError::Malformed("garbage".into())) }),
        )
        .register(
            Strategy::Soa,
            FnProbe::new(|target: Target, _| async move {
                if target.to_string() == "example.com" {
                    panic!("unexpected record layout");
                }
                Ok(ProbeOutcome::Empty)
            }),
        )
        .register(Strategy::A, recording(CallLog::default(), |_| ProbeOutcome::list(["192.0.2.80"])));

    let outcome = Crawler::new(&config("example.com", 0), registry).unwrap().run().await;

    assert!(!outcome.results.contains_key(&Strategy::Txt));
    assert!(!outcome.results.contains_key(&Strategy::Soa));
    assert_eq!(outcome.results[&Strategy::A], vec![json!("192.0.2.80")]);
    assert_eq!(outcome.result_count, 1);
}

#[tokio::test]
async fn disabled_strategies_are_never_called() {
    let log = CallLog::default();
    let mut registry = ProbeRegistry::new();
    registry
        .register(Strategy::Srv, recording(log.clone(), |_| ProbeOutcome::list(["sip.example.com"])))
        .register(Strategy::Mx, recording(CallLog::default(), |_| ProbeOutcome::list(["mx.example.com"])));
    let mut config = config("example.com", 1);
    config.disabled.insert(Strategy::Srv);

    let outcome = Crawler::new(&config, registry).unwrap().run().await;

    assert!(log.lock().unwrap().is_empty());
    assert!(!outcome.results.contains_key(&Strategy::Srv));
    assert!(outcome.visited.domains.contains("mx.example.com"));
}

#[tokio::test]
async fn discovered_ips_go_through_the_ip_probes() {
    let domain_log = CallLog::default();
    let ip_log = CallLog::default();
    let mut registry = ProbeRegistry::new();
    registry
        .register(
            Strategy::A,
            recording(domain_log.clone(), |_| ProbeOutcome::record(&json!({ "ips": ["192.0.2.10"] }))),
        )
        .register(
            Strategy::Ptr,
            recording(ip_log.clone(), |_| ProbeOutcome::record(&json!({ "domains": ["host.example.net"] }))),
        );

    let outcome = Crawler::new(&config("example.com", 2), registry).unwrap().run().await;

    assert_eq!(*ip_log.lock().unwrap(), vec![Target::Ip("192.0.2.10".parse().unwrap())]);
    assert!(domain_log.lock().unwrap().contains(&domain("host.example.net")));
    assert!(outcome.visited.domains.contains("host.example.net"));
    assert!(!domain_log.lock().unwrap().iter().any(Target::is_ip));
}

#[tokio::test]
async fn ip_seed_runs_only_ip_probes() {
    let domain_log = CallLog::default();
    let ip_log = CallLog::default();
    let mut registry = ProbeRegistry::new();
    registry
        .register(Strategy::Txt, recording(domain_log.clone(), |_| ProbeOutcome::Empty))
        .register(Strategy::ReverseDns, recording(ip_log.clone(), |_| ProbeOutcome::Empty));

    let outcome = Crawler::new(&config("192.0.2.7", 1), registry).unwrap().run().await;

    assert!(domain_log.lock().unwrap().is_empty());
    assert_eq!(ip_log.lock().unwrap().len(), 1);
    assert_eq!(outcome.visited.ips.len(), 1);
}

#[tokio::test]
async fn invalid_configuration_is_rejected_before_crawling() {
    let log = CallLog::default();
    let mut registry = ProbeRegistry::new();
    registry.register(Strategy::A, recording(log.clone(), |_| ProbeOutcome::Empty));
    let mut config = config("example.com", 1);
    config.budget.threads = 0;

    let err = scan(&config, registry).await.unwrap_err();

    assert!(matches!(err, ConfigError::InvalidThreads(0)));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn report_applies_the_provider_filter() {
    let mut registry = ProbeRegistry::new();
    registry
        .register(
            Strategy::Ns,
            recording(CallLog::default(), |target| {
                if *target == domain("example.com") {
                    ProbeOutcome::record(&json!({ "nameservers": ["kate.ns.cloudflare.com"], "domains": ["kate.ns.cloudflare.com"] }))
                } else {
                    ProbeOutcome::Empty
                }
            }),
        )
        .register(Strategy::Mx, recording(CallLog::default(), |_| ProbeOutcome::list(["mx.example.com"])));
    let mut config = config("example.com", 0);
    config.hidden_providers = vec!["Cloudflare".to_string()];

    let report = scan(&config, registry).await.unwrap();

    assert_eq!(report.domain, "example.com");
    assert!(!report.results.contains_key(&Strategy::Ns));
    assert_eq!(report.summary.strategies_used, vec![Strategy::Mx]);
    assert!(report.summary.domains.contains(&"kate.ns.cloudflare.com".to_string()));
    assert_eq!(report.total_results, report.summary.domains_found + report.summary.ips_found);
}

#[tokio::test]
async fn frontier_beyond_the_cap_waits_for_later_levels() {
    let calls: Arc<Mutex<Vec<(String, u32)>>> = Arc::default();
    let seen = calls.clone();
    let mut registry = ProbeRegistry::new();
    registry.register(
        Strategy::Ns,
        FnProbe::new(move |target: Target, depth: u32| {
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().push((target.to_string(), depth));
                if target == domain("example.com") {
                    let found = ["a", "b", "c", "d", "e"].map(|label| format!("{label}.example.com"));
                    Ok(ProbeOutcome::record(&json!({ "domains": found })))
                } else {
                    Ok(ProbeOutcome::Empty)
                }
            }
        }),
    );
    let mut config = config("example.com", 3);
    config.budget.max_per_strategy = 2;

    let outcome = Crawler::new(&config, registry).unwrap().run().await;

    let mut calls = calls.lock().unwrap().clone();
    calls.sort();
    let expected: Vec<(String, u32)> = [
        ("a.example.com", 1),
        ("b.example.com", 1),
        ("c.example.com", 2),
        ("d.example.com", 2),
        ("e.example.com", 3),
        ("example.com", 0),
    ]
    .into_iter()
    .map(|(name, depth)| (name.to_string(), depth))
    .collect();
    assert_eq!(calls, expected);
    assert_eq!(outcome.levels, 4);
}

#[tokio::test]
async fn exhausted_budget_skips_the_rest_of_the_level() {
    let log = CallLog::default();
    let mut registry = ProbeRegistry::new();
    registry.register(
        Strategy::Ns,
        recording(log.clone(), |target| {
            let found: Vec<String> = ["x", "y", "z"].iter().map(|label| format!("{label}.{target}")).collect();
            match target.to_string().as_str() {
                "example.com" => ProbeOutcome::record(&json!({ "domains": ["a.example.com", "b.example.com", "c.example.com"] })),
                _ => ProbeOutcome::record(&json!({ "domains": found })),
            }
        }),
    );
    let mut config = config("example.com", 3);
    config.budget.threads = 1;
    config.budget.max_results = 5;

    let outcome = Crawler::new(&config, registry).unwrap().run().await;

    assert_eq!(*log.lock().unwrap(), vec![domain("example.com"), domain("a.example.com")]);
    assert_eq!(outcome.result_count, 6);
    assert!(outcome.budget_exhausted);
    assert_eq!(outcome.levels, 2);
    assert!(!outcome.visited.domains.contains("b.example.com"));
}

#[tokio::test]
async fn strategies_per_target_run_at_most_eight_at_once() {
    let many = Gauge::default();
    let mut registry = ProbeRegistry::new();
    for strategy in [
        Strategy::A,
        Strategy::Aaaa,
        Strategy::Ns,
        Strategy::Soa,
        Strategy::Mx,
        Strategy::Cname,
        Strategy::Txt,
        Strategy::Ttl,
        Strategy::Spf,
        Strategy::Dmarc,
        Strategy::Caa,
        Strategy::Wildcard,
    ] {
        registry.register(strategy, many.tracked(&[]));
    }
    Crawler::new(&config("example.com", 0), registry).unwrap().run().await;
    assert_eq!(many.peak(), 8);

    let few = Gauge::default();
    let mut registry = ProbeRegistry::new();
    for strategy in [Strategy::A, Strategy::Ns, Strategy::Mx] {
        registry.register(strategy, few.tracked(&[]));
    }
    Crawler::new(&config("example.com", 0), registry).unwrap().run().await;
    assert_eq!(few.peak(), 3);
}

#[tokio::test]
async fn targets_per_level_respect_the_thread_limit() {
    const FOUND: &[&str] = &[
        "a.example.com",
        "b.example.com",
        "c.example.com",
        "d.example.com",
        "e.example.com",
        "f.example.com",
    ];
    let gauge = Gauge::default();
    let mut registry = ProbeRegistry::new();
    registry.register(Strategy::Ns, gauge.tracked(FOUND));
    let mut config = config("example.com", 1);
    config.budget.threads = 2;

    let outcome = Crawler::new(&config, registry).unwrap().run().await;

    assert_eq!(outcome.visited.domains.len(), 7);
    assert_eq!(gauge.peak(), 2);
}

#[tokio::test]
async fn slow_tail_keeps_the_findings_gathered_before_it() {
    let mut config = config("example.com", 0);
    config.probe_timeout = Duration::from_millis(100);
    let budget = config.collection_budget();

    let mut registry = ProbeRegistry::new();
    registry.register(
        Strategy::Subdomains,
        FnProbe::new(move |_target: Target, _depth: u32| async move {
            let lookups = stream::iter([("www", 10), ("mail", 20), ("legacy", 60_000)]).then(|(label, millis)| async move {
                tokio::time::sleep(Duration::from_millis(millis)).await;
                format!("{label}.example.com")
            })
            .boxed();
            let gathered = collect_within(lookups, budget).await;
            assert!(gathered.cut_short);
            Ok(ProbeOutcome::list(gathered.items))
        }),
    );

    let outcome = Crawler::new(&config, registry).unwrap().run().await;

    assert_eq!(outcome.results[&Strategy::Subdomains], vec![json!("www.example.com"), json!("mail.example.com")]);
    assert!(outcome.discovered.domains.contains("mail.example.com"));
    assert!(!outcome.discovered.domains.contains("legacy.example.com"));
}
