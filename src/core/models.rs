// src/core/models.rs

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::probes::Strategy;

// --- Target ---

/// A single unit of work for the crawler: either a domain name or an IP address.
///
/// Domains are stored lowercased and without a trailing dot, so the `Display` form
/// doubles as the deduplication key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    Ip(IpAddr),
    Domain(String),
}

impl Target {
    /// Parses a raw string into a `Target`, returning `None` for empty input.
    ///
    /// IP literals win over domain names; everything else is normalized as a domain.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if let Ok(ip) = trimmed.parse::<IpAddr>() {
            return Some(Target::Ip(ip));
        }
        normalize_domain(trimmed).map(Target::Domain)
    }

    pub fn is_ip(&self) -> bool {
        matches!(self, Target::Ip(_))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Ip(ip) => write!(f, "{ip}"),
            Target::Domain(domain) => f.write_str(domain),
        }
    }
}

/// Lowercases a domain and strips surrounding whitespace and trailing dots.
pub fn normalize_domain(raw: &str) -> Option<String> {
    let domain = raw.trim().trim_end_matches('.').to_ascii_lowercase();
    if domain.is_empty() { None } else { Some(domain) }
}

/// Heuristic used to route plain strings from list results into the domain set.
///
/// A candidate must contain a dot, must not consist solely of digits, dots and colons
/// (bare IP literals), and must not contain whitespace. Values such as version strings
/// ("1.2a") or CAA tags still slip through; no stronger contract exists for probe output.
pub fn looks_like_domain(item: &str) -> bool {
    let item = item.trim().trim_end_matches('.');
    item.contains('.')
        && !item.chars().any(char::is_whitespace)
        && !item.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ':')
}

// --- Probe Outcome ---

/// The result of running one probe against one target.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// No finding. Timeouts and probe failures also end up here.
    Empty,
    /// An ordered sequence of plain values or records.
    List(Vec<Value>),
    /// A single record with named fields; `domains` and `ips` feed discovery.
    Structured(Map<String, Value>),
}

impl ProbeOutcome {
    /// Builds a list outcome from anything serializable, skipping items that fail to encode.
    pub fn list<T: Serialize>(items: impl IntoIterator<Item = T>) -> Self {
        let values: Vec<Value> = items
            .into_iter()
            .filter_map(|item| serde_json::to_value(item).ok())
            .collect();
        ProbeOutcome::List(values).normalized()
    }

    /// Builds a structured outcome from a serializable record.
    ///
    /// Anything that does not serialize to a JSON object is treated as `Empty`.
    pub fn record<T: Serialize>(record: &T) -> Self {
        match serde_json::to_value(record) {
            Ok(Value::Object(fields)) => ProbeOutcome::Structured(fields).normalized(),
            _ => ProbeOutcome::Empty,
        }
    }

    /// Collapses empty lists and records into `Empty`.
    pub fn normalized(self) -> Self {
        match self {
            ProbeOutcome::List(items) if items.is_empty() => ProbeOutcome::Empty,
            ProbeOutcome::Structured(fields) if fields.is_empty() => ProbeOutcome::Empty,
            other => other,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ProbeOutcome::Empty => true,
            ProbeOutcome::List(items) => items.is_empty(),
            ProbeOutcome::Structured(fields) => fields.is_empty(),
        }
    }
}

// --- Scan State ---

/// Mapping from strategy to the entries it produced, in absorption order.
pub type ResultStore = BTreeMap<Strategy, Vec<Value>>;

/// Running union of every domain and IP observed during a scan, seed included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoverySets {
    pub domains: HashSet<String>,
    pub ips: HashSet<IpAddr>,
}

impl DiscoverySets {
    pub fn seeded(seed: &Target) -> Self {
        let mut sets = Self::default();
        sets.insert(seed.clone());
        sets
    }

    /// Returns `true` when the target was not already known.
    pub fn insert(&mut self, target: Target) -> bool {
        match target {
            Target::Domain(domain) => self.domains.insert(domain),
            Target::Ip(ip) => self.ips.insert(ip),
        }
    }

    pub fn contains(&self, target: &Target) -> bool {
        match target {
            Target::Domain(domain) => self.domains.contains(domain),
            Target::Ip(ip) => self.ips.contains(ip),
        }
    }

    pub fn len(&self) -> usize {
        self.domains.len() + self.ips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty() && self.ips.is_empty()
    }

    pub fn sorted_domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self.domains.iter().cloned().collect();
        domains.sort();
        domains
    }

    pub fn sorted_ips(&self) -> Vec<IpAddr> {
        let mut ips: Vec<IpAddr> = self.ips.iter().copied().collect();
        ips.sort();
        ips
    }
}

/// Targets that have already been handed to the dispatcher.
///
/// Shares its shape with `DiscoverySets`; the crawler keeps it a subset of the latter.
pub type VisitState = DiscoverySets;

// --- Report ---

/// Aggregate statistics attached to every report.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScanSummary {
    pub domains_found: usize,
    pub ips_found: usize,
    pub result_count: usize,
    pub budget_exhausted: bool,
    pub strategies_used: Vec<Strategy>,
    pub domains: Vec<String>,
    pub ips: Vec<IpAddr>,
}

/// The final document handed to the exporters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub domain: String,
    pub scan_date: DateTime<Utc>,
    pub depth: u32,
    pub max_results: usize,
    pub total_results: usize,
    pub results: ResultStore,
    pub summary: ScanSummary,
}

// --- Probe Records ---
// Typed payloads produced by the built-in probes. They are serialized into
// `ProbeOutcome` values, so field names are part of the report format.

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AddressRecord {
    pub ips: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ipv6Entry {
    pub ipv6: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub properties: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Ipv6Record {
    pub records: Vec<Ipv6Entry>,
    pub ips: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameserverEntry {
    pub nameserver: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ipv4: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ipv6: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NameserverRecord {
    pub nameservers: Vec<NameserverEntry>,
    pub domains: Vec<String>,
    pub ips: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoaRecord {
    pub mname: String,
    pub rname: String,
    pub serial: u32,
    pub refresh: i32,
    pub retry: i32,
    pub expire: i32,
    pub minimum: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MxEntry {
    pub host: String,
    pub priority: u16,
    pub ips: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MxRecord {
    pub exchanges: Vec<MxEntry>,
    pub domains: Vec<String>,
    pub ips: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CnameChain {
    pub chain: Vec<String>,
    pub final_target: String,
    pub chain_length: usize,
    pub final_ips: Vec<String>,
    pub domains: Vec<String>,
    pub ips: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TxtRecord {
    pub raw_records: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub ownership: BTreeMap<String, bool>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub services: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub security: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub emails: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub domains: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ips: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpfMechanism {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpfRecord {
    pub record: String,
    pub mechanisms: Vec<SpfMechanism>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DmarcRecord {
    pub record: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate_reports: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forensic_reports: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DkimRecord {
    pub selector: String,
    pub record: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SrvEntry {
    pub target: String,
    pub port: u16,
    pub priority: u16,
    pub weight: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SrvRecord {
    pub services: BTreeMap<String, Vec<SrvEntry>>,
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WildcardRecord {
    pub wildcard_detected: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub wildcard_ips: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtlEntry {
    pub ttl: u32,
    pub category: String,
    pub human: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyTxtRecord {
    pub name: String,
    pub record: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadersRecord {
    pub url: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    pub present: BTreeMap<String, String>,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityTxtRecord {
    pub url: String,
    pub contacts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
}

/// Details extracted from the peer certificate presented on port 443.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub subject_name: String,
    pub issuer_name: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub days_until_expiry: i64,
    pub is_valid: bool,
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeoRecord {
    pub ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bgp_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_hint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PtrEntry {
    pub ip: String,
    pub hostname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PtrRecord {
    pub records: Vec<PtrEntry>,
    pub domains: Vec<String>,
}

// DNSSEC

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DnskeyEntry {
    pub flags: u16,
    pub protocol: u8,
    pub algorithm: u8,
    pub algorithm_name: String,
    /// `KSK` when the secure entry point bit is set, `ZSK` otherwise.
    pub key_type: String,
    pub is_zone_key: bool,
    pub revoked: bool,
    pub key_tag: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_length_bits: Option<u32>,
    pub public_key: String,
    pub secure: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DnskeyRecord {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ksk_keys: Vec<DnskeyEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub zsk_keys: Vec<DnskeyEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DsEntry {
    pub key_tag: u16,
    pub algorithm: u8,
    pub algorithm_name: String,
    pub digest_type: u8,
    pub digest_type_name: String,
    pub digest: String,
    pub secure: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnssecRecord {
    pub enabled: bool,
    /// A DS record at the parent references one of the published KSKs.
    pub chain_of_trust: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub dnskey: Vec<DnskeyEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ds: Vec<DsEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NsecEntry {
    pub next_domain: String,
    pub record_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Nsec3Entry {
    pub algorithm: u8,
    pub algorithm_name: String,
    pub flags: u8,
    pub opt_out: bool,
    pub iterations: u16,
    pub salt: String,
    pub next_hash: String,
    pub record_types: Vec<String>,
    pub secure: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Nsec3ParamEntry {
    pub algorithm: u8,
    pub flags: u8,
    pub iterations: u16,
    pub salt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NsecRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nsec: Option<NsecEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub nsec3: Vec<Nsec3Entry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nsec3param: Option<Nsec3ParamEntry>,
    /// Plain NSEC chains can be walked to list every name in the zone.
    pub enumerable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub domains: Vec<String>,
}

// Service and host records

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TlsaEntry {
    pub name: String,
    pub usage: u8,
    pub usage_desc: String,
    pub selector: u8,
    pub selector_desc: String,
    pub matching_type: u8,
    pub matching_desc: String,
    pub certificate_data: String,
    pub secure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SshfpEntry {
    pub algorithm: u8,
    pub algorithm_name: String,
    pub fingerprint_type: u8,
    pub fingerprint_type_name: String,
    pub fingerprint: String,
    pub secure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HinfoEntry {
    pub cpu: String,
    pub os: String,
    pub warning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NaptrEntry {
    pub order: u16,
    pub preference: u16,
    pub flags: String,
    pub service: String,
    pub service_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regexp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    pub priority_score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NaptrRecord {
    pub records: Vec<NaptrEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocEntry {
    pub latitude: String,
    pub longitude: String,
    pub latitude_decimal: f64,
    pub longitude_decimal: f64,
    pub altitude_m: f64,
    pub size_m: f64,
    pub horizontal_precision_m: f64,
    pub vertical_precision_m: f64,
    pub maps_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxfrRecord {
    /// Nameservers that answered the transfer.
    pub transferable_from: Vec<String>,
    pub record_count: usize,
    pub domains: Vec<String>,
}

// Infrastructure analysis

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlacklistHit {
    pub blacklist: String,
    pub dnsbl: String,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailServerStatus {
    pub mx_host: String,
    pub ip: String,
    pub priority: u16,
    pub reputation: String,
    pub blacklists_checked: usize,
    pub blacklists_listed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub listed_on: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub blacklist_details: Vec<BlacklistHit>,
    pub clean: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailBlacklistRecord {
    pub mail_servers: Vec<MailServerStatus>,
    pub summary: String,
    pub overall_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnycastCandidate {
    pub ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asn_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bgp_prefix: Option<String>,
    pub anycast_likely: bool,
    pub anycast_indicators: Vec<String>,
    pub confidence: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnycastRecord {
    pub ips_analyzed: usize,
    pub anycast_candidates: Vec<AnycastCandidate>,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoadBalancerRecord {
    pub load_balanced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancer_type: Option<String>,
    pub ip_count: usize,
    pub ips: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub distribution: BTreeMap<String, usize>,
    pub queries_performed: usize,
    pub patterns_detected: usize,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub indicators: Vec<String>,
    pub confidence: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub hostnames: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CdnRecord {
    pub cdn_detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cdn_provider: Option<String>,
    pub confidence: String,
    pub detection_methods: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub all_detected_providers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SoaTimings {
    pub refresh: String,
    pub retry: String,
    pub expire: String,
    pub negative_cache_ttl: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DomainAgeRecord {
    pub serial: u32,
    pub serial_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_age_days: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update_estimate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soa_timings: Option<SoaTimings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_stability: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn target_parse_normalizes_domains() {
        assert_eq!(
            Target::parse("  WWW.Example.COM. "),
            Some(Target::Domain("www.example.com".to_string()))
        );
        assert_eq!(Target::parse(""), None);
        assert_eq!(Target::parse("..."), None);
    }

    #[test]
    fn target_parse_prefers_ip_literals() {
        assert!(Target::parse("192.0.2.1").is_some_and(|t| t.is_ip()));
        assert!(Target::parse("2001:db8::1").is_some_and(|t| t.is_ip()));
    }

    #[test]
    fn domain_heuristic_rejects_ip_literals_and_phrases() {
        assert!(looks_like_domain("mail.example.com"));
        assert!(looks_like_domain("ns1.example.com."));
        assert!(!looks_like_domain("192.0.2.10"));
        assert!(!looks_like_domain("::1"));
        assert!(!looks_like_domain("localhost"));
        assert!(!looks_like_domain("0 issue \"letsencrypt.org\""));
    }

    #[test]
    fn empty_outcomes_collapse() {
        assert_eq!(ProbeOutcome::List(vec![]).normalized(), ProbeOutcome::Empty);
        assert_eq!(ProbeOutcome::Structured(Map::new()).normalized(), ProbeOutcome::Empty);
        assert!(ProbeOutcome::list(Vec::<String>::new()).is_empty());
        assert!(!ProbeOutcome::list(["a.example.com"]).is_empty());
    }

    #[test]
    fn record_outcome_keeps_discovery_fields() {
        let record = MxRecord {
            exchanges: vec![],
            domains: vec!["mx.example.com".to_string()],
            ips: vec!["192.0.2.25".to_string()],
        };
        match ProbeOutcome::record(&record) {
            ProbeOutcome::Structured(fields) => {
                assert_eq!(fields["domains"], json!(["mx.example.com"]));
                assert_eq!(fields["ips"], json!(["192.0.2.25"]));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn discovery_sets_dedup_targets() {
        let seed = Target::Domain("example.com".to_string());
        let mut sets = DiscoverySets::seeded(&seed);
        assert!(!sets.insert(seed.clone()));
        assert!(sets.insert(Target::Ip("192.0.2.1".parse().unwrap())));
        assert_eq!(sets.len(), 2);
        assert!(sets.contains(&seed));
    }
}
