// src/core/probes/heuristics.rs

//! Probes and helpers that work on names alone, without touching the network.

use async_trait::async_trait;

use crate::core::errors::ProbeError;
use crate::core::models::{ProbeOutcome, Target};
use crate::core::probes::Probe;

/// Suffixes never reported as parents.
const PUBLIC_SUFFIXES: &[&str] = &["com", "org", "net", "edu", "gov", "fr", "gouv.fr", "co.uk"];

/// Name fragments that identify CDN and cloud providers.
const PROVIDER_PATTERNS: &[(&str, &str)] = &[
    ("cloudfront", "Amazon CloudFront"),
    ("akamai", "Akamai"),
    ("fastly", "Fastly"),
    ("cloudflare", "Cloudflare"),
    ("azure", "Microsoft Azure"),
    ("googleapis", "Google Cloud"),
    ("amazonaws", "AWS"),
];

/// Walks a domain up towards its public suffix, listing every parent.
pub struct CrawlTldProbe;

#[async_trait]
impl Probe for CrawlTldProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Target::Domain(domain) = target else { return Ok(ProbeOutcome::Empty) };
        Ok(ProbeOutcome::list(parent_domains(domain)))
    }
}

/// `a.b.example.co.uk` → `b.example.co.uk`, `example.co.uk`.
///
/// Single-label parents are left out, as are the suffixes in `PUBLIC_SUFFIXES`.
pub fn parent_domains(domain: &str) -> Vec<String> {
    let labels: Vec<&str> = domain.split('.').collect();
    (1..labels.len())
        .map(|i| labels[i..].join("."))
        .filter(|parent| parent.contains('.') && !PUBLIC_SUFFIXES.contains(&parent.as_str()))
        .collect()
}

/// Known CDN or cloud providers whose pattern appears in `name`.
pub fn classify_providers(name: &str) -> Vec<&'static str> {
    let lower = name.to_ascii_lowercase();
    PROVIDER_PATTERNS
        .iter()
        .filter(|(pattern, _)| lower.contains(pattern))
        .map(|(_, provider)| *provider)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parents_stop_before_public_suffix() {
        assert_eq!(parent_domains("a.b.example.com"), vec!["b.example.com", "example.com"]);
        assert_eq!(parent_domains("www.example.co.uk"), vec!["example.co.uk"]);
        assert_eq!(parent_domains("service.gouv.fr"), Vec::<String>::new());
        assert!(parent_domains("example.io").is_empty());
    }

    #[test]
    fn providers_from_names() {
        assert_eq!(classify_providers("d111111abcdef8.cloudfront.net"), vec!["Amazon CloudFront"]);
        assert_eq!(classify_providers("bucket.s3.amazonaws.com"), vec!["AWS"]);
        assert!(classify_providers("example.com").is_empty());
    }

    #[tokio::test]
    async fn crawl_probe_lists_parents() {
        let outcome = CrawlTldProbe.probe(&Target::Domain("mail.example.com".into()), 1).await.unwrap();
        assert_eq!(outcome, ProbeOutcome::list(["example.com"]));
        let outcome = CrawlTldProbe.probe(&Target::Domain("example.com".into()), 1).await.unwrap();
        assert_eq!(outcome, ProbeOutcome::Empty);
    }
}
