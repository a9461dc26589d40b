// src/core/probes/dns_probes.rs

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, stream};
use hickory_resolver::proto::rr::RecordType;
use once_cell::sync::Lazy;
use rand::Rng;
use rand::distr::Alphanumeric;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::core::engine::pool::collect_within;
use crate::core::errors::ProbeError;
use crate::core::models::{
    AddressRecord, CnameChain, DkimRecord, DmarcRecord, Ipv6Entry, Ipv6Record, MxEntry, MxRecord,
    NameserverEntry, NameserverRecord, PolicyTxtRecord, ProbeOutcome, SoaRecord, SpfMechanism,
    SpfRecord, SrvEntry, SrvRecord, Target, TtlEntry, TxtRecord, WildcardRecord, looks_like_domain,
};
use crate::core::probes::Probe;
use crate::core::resolver::{DnsClient, is_absent, trim_name};

/// A list of common DKIM selectors to check for when a specific one is not known.
const COMMON_DKIM_SELECTORS: &[&str] = &["google", "selector1", "selector2", "default", "dkim", "k1", "mail"];

const MAX_CNAME_HOPS: usize = 10;
const TXT_EXTRACT_LIMIT: usize = 5;
const SUBDOMAIN_CONCURRENCY: usize = 30;
const SRV_CONCURRENCY: usize = 8;
const DKIM_CONCURRENCY: usize = 4;
const WILDCARD_PROBES: usize = 3;
const WILDCARD_LABEL_LEN: usize = 15;
const TTL_RECORD_TYPES: &[RecordType] = &[
    RecordType::A,
    RecordType::AAAA,
    RecordType::MX,
    RecordType::NS,
    RecordType::TXT,
    RecordType::SOA,
    RecordType::CNAME,
];

static IPV4_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("valid IPv4 pattern"));
static DOMAIN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}\b").expect("valid domain pattern")
});
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid email pattern")
});
static DMARC_RUA: Lazy<Regex> = Lazy::new(|| Regex::new(r"rua=mailto:([^;\s]+)").expect("valid rua pattern"));
static DMARC_RUF: Lazy<Regex> = Lazy::new(|| Regex::new(r"ruf=mailto:([^;\s]+)").expect("valid ruf pattern"));
static DMARC_PCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"pct=(\d+)").expect("valid pct pattern"));

/// DNS probes only make sense for domain targets.
pub(crate) fn domain_of(target: &Target) -> Option<&str> {
    match target {
        Target::Domain(domain) => Some(domain.as_str()),
        Target::Ip(_) => None,
    }
}

macro_rules! dns_probe {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name {
            dns: Arc<DnsClient>,
        }

        impl $name {
            pub fn new(dns: Arc<DnsClient>) -> Self {
                Self { dns }
            }
        }
    };
}

dns_probe!(
    /// IPv4 addresses of the target.
    ARecordProbe
);
dns_probe!(
    /// IPv6 addresses of the target, each classified by prefix.
    AaaaProbe
);
dns_probe!(
    /// Authoritative nameservers, their addresses and the DNS host behind them.
    NsProbe
);
dns_probe!(SoaProbe);
dns_probe!(
    /// Mail exchangers sorted by preference, with their IPv4 addresses.
    MxProbe
);
dns_probe!(
    /// Follows the CNAME chain of the target and resolves its final name.
    CnameProbe
);
dns_probe!(
    /// Parses TXT records for verification tokens, services, emails, IPs and domains.
    TxtProbe
);
dns_probe!(TtlProbe);
dns_probe!(
    /// Parses the SPF policy published in TXT records.
    SpfProbe
);
dns_probe!(
    /// Parses the DMARC policy published at `_dmarc.<domain>`.
    DmarcProbe
);
dns_probe!(CaaProbe);
dns_probe!(
    /// Resolves random labels to detect wildcard DNS.
    WildcardProbe
);

#[async_trait]
impl Probe for ARecordProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let ips: Vec<String> = self.dns.ipv4(domain).await?.iter().map(|ip| ip.to_string()).collect();
        if ips.is_empty() {
            return Ok(ProbeOutcome::Empty);
        }
        debug!(domain, count = ips.len(), "A records found.");
        Ok(ProbeOutcome::record(&AddressRecord { ips }))
    }
}

#[async_trait]
impl Probe for AaaaProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let addresses = self.dns.ipv6(domain).await?;
        if addresses.is_empty() {
            return Ok(ProbeOutcome::Empty);
        }
        let records: Vec<Ipv6Entry> = addresses
            .iter()
            .map(|ip| {
                let ipv6 = ip.to_string();
                Ipv6Entry { properties: classify_ipv6(&ipv6), ipv6 }
            })
            .collect();
        let ips = records.iter().map(|r| r.ipv6.clone()).collect();
        Ok(ProbeOutcome::record(&Ipv6Record { records, ips }))
    }
}

/// Labels an IPv6 address by well-known prefix and notation.
pub fn classify_ipv6(ipv6: &str) -> Vec<String> {
    let mut properties = Vec::new();
    let kind = if ipv6.starts_with("2001:db8:") {
        Some("documentation")
    } else if ipv6.starts_with("fe80:") {
        Some("link-local")
    } else if ipv6.starts_with("fc") || ipv6.starts_with("fd") {
        Some("unique-local")
    } else if ipv6.starts_with("ff") {
        Some("multicast")
    } else if ipv6 == "::1" {
        Some("loopback")
    } else if ipv6.starts_with("::") {
        Some("special")
    } else if ipv6.starts_with("2001:") {
        Some("global-unicast")
    } else if ipv6.starts_with("2a") {
        Some("RIPE-NCC-region")
    } else if ipv6.starts_with("2c") {
        Some("AFRINIC-region")
    } else if ipv6.starts_with("2d") || ipv6.starts_with("2e") {
        Some("APNIC-region")
    } else {
        None
    };
    if let Some(kind) = kind {
        properties.push(kind.to_string());
    }
    if ipv6.contains("::") {
        properties.push("compressed".to_string());
    }
    properties
}

/// Guesses the hosting provider from a nameserver host name.
pub fn nameserver_provider(host: &str) -> Option<&'static str> {
    let host = host.to_ascii_lowercase();
    if host.contains("cloudflare") {
        Some("Cloudflare")
    } else if host.contains("awsdns") || host.contains("amazonaws") {
        Some("AWS Route53")
    } else if host.contains("google") {
        Some("Google Cloud DNS")
    } else if host.contains("azure") {
        Some("Azure DNS")
    } else if host.contains("ovh") {
        Some("OVH")
    } else if host.contains("gandi") {
        Some("Gandi")
    } else {
        None
    }
}

#[async_trait]
impl Probe for NsProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let hosts = self.dns.ns(domain).await?;
        if hosts.is_empty() {
            return Ok(ProbeOutcome::Empty);
        }

        let nameservers: Vec<NameserverEntry> = futures::future::join_all(hosts.iter().map(|host| async move {
            let (v4, v6) = tokio::join!(self.dns.ipv4(host), self.dns.ipv6(host));
            NameserverEntry {
                nameserver: host.clone(),
                ipv4: v4.unwrap_or_default().iter().map(|ip| ip.to_string()).collect(),
                ipv6: v6.unwrap_or_default().iter().map(|ip| ip.to_string()).collect(),
                provider: nameserver_provider(host).map(str::to_string),
            }
        }))
        .await;

        let ips = nameservers
            .iter()
            .flat_map(|ns| ns.ipv4.iter().chain(ns.ipv6.iter()).cloned())
            .collect();
        info!(domain, count = nameservers.len(), "Nameservers found.");
        Ok(ProbeOutcome::record(&NameserverRecord { domains: hosts, nameservers, ips }))
    }
}

#[async_trait]
impl Probe for SoaProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let lookup = match self.dns.inner().soa_lookup(domain).await {
            Ok(lookup) => lookup,
            Err(e) if is_absent(&e) => return Ok(ProbeOutcome::Empty),
            Err(e) => return Err(e.into()),
        };
        let Some(soa) = lookup.iter().next() else { return Ok(ProbeOutcome::Empty) };
        Ok(ProbeOutcome::record(&SoaRecord {
            mname: trim_name(&soa.mname().to_string()),
            rname: rname_to_email(&soa.rname().to_string()),
            serial: soa.serial(),
            refresh: soa.refresh(),
            retry: soa.retry(),
            expire: soa.expire(),
            minimum: soa.minimum(),
        }))
    }
}

/// `hostmaster.example.com.` → `hostmaster@example.com`
pub fn rname_to_email(rname: &str) -> String {
    rname.trim_end_matches('.').replacen('.', "@", 1)
}

#[async_trait]
impl Probe for MxProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let mut exchanges = self.dns.mx(domain).await?;
        if exchanges.is_empty() {
            return Ok(ProbeOutcome::Empty);
        }
        exchanges.sort_by_key(|(preference, _)| *preference);

        let entries: Vec<MxEntry> = futures::future::join_all(exchanges.into_iter().map(|(priority, host)| async move {
            let ips = match self.dns.ipv4(&host).await {
                Ok(ips) => ips.iter().map(|ip| ip.to_string()).collect(),
                Err(e) => {
                    debug!(host = %host, error = %e, "MX host did not resolve.");
                    Vec::new()
                }
            };
            MxEntry { host, priority, ips }
        }))
        .await;

        let domains = entries.iter().map(|e| e.host.clone()).collect();
        let ips = entries.iter().flat_map(|e| e.ips.iter().cloned()).collect();
        Ok(ProbeOutcome::record(&MxRecord { exchanges: entries, domains, ips }))
    }
}

#[async_trait]
impl Probe for CnameProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let mut chain = vec![domain.to_string()];
        while chain.len() <= MAX_CNAME_HOPS {
            let current = chain[chain.len() - 1].clone();
            let next = match self.dns.records(&current, RecordType::CNAME).await {
                Ok(records) => records.into_iter().next().map(|r| trim_name(&r)),
                Err(e) => {
                    debug!(name = %current, error = %e, "CNAME hop failed.");
                    None
                }
            };
            match next {
                Some(name) if !chain.contains(&name) => chain.push(name),
                _ => break,
            }
        }
        if chain.len() < 2 {
            return Ok(ProbeOutcome::Empty);
        }

        let final_target = chain[chain.len() - 1].clone();
        let final_ips: Vec<String> = self
            .dns
            .ipv4(&final_target)
            .await
            .unwrap_or_default()
            .iter()
            .map(|ip| ip.to_string())
            .collect();
        Ok(ProbeOutcome::record(&CnameChain {
            chain_length: chain.len() - 1,
            domains: chain[1..].to_vec(),
            ips: final_ips.clone(),
            final_target,
            final_ips,
            chain,
        }))
    }
}

#[async_trait]
impl Probe for TxtProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let records = self.dns.txt(domain).await?;
        if records.is_empty() {
            return Ok(ProbeOutcome::Empty);
        }
        Ok(ProbeOutcome::record(&parse_txt_records(domain, records)))
    }
}

/// Extracts verification tokens, providers and embedded identifiers from TXT data.
pub fn parse_txt_records(domain: &str, records: Vec<String>) -> TxtRecord {
    let mut result = TxtRecord::default();
    let mut emails = BTreeSet::new();
    let mut ips = BTreeSet::new();
    let mut domains = BTreeSet::new();

    for txt in &records {
        let lower = txt.to_ascii_lowercase();

        for (token, key) in [
            ("google-site-verification", "google_verified"),
            ("facebook-domain-verification", "facebook_verified"),
            ("apple-domain-verification", "apple_verified"),
            ("ms-domain-verification", "microsoft_verified"),
        ] {
            if lower.contains(token) {
                result.ownership.insert(key.to_string(), true);
            }
        }
        if txt.contains("MS=") {
            result.ownership.insert("microsoft_verified".to_string(), true);
        }

        for (token, key, value) in [
            ("docusign=", "docusign", "verified"),
            ("atlassian-domain-verification", "atlassian", "verified"),
            ("stripe-verification=", "stripe", "verified"),
            ("cloudflare-verify", "cloudflare", "verified"),
            ("fastly-domain-delegation", "cdn", "Fastly"),
            ("amazonses:", "email_service", "Amazon SES"),
            ("mailgun-verification", "email_service", "Mailgun"),
            ("sendgrid", "email_service", "SendGrid"),
        ] {
            if lower.contains(token) {
                result.services.insert(key.to_string(), value.to_string());
            }
        }

        for (token, key, value) in [
            ("globalsign-domain-verification", "ssl_provider", "GlobalSign"),
            ("sectigo", "ssl_provider", "Sectigo"),
            ("comodo", "ssl_provider", "Sectigo"),
            ("digicert", "ssl_provider", "DigiCert"),
            ("proofpoint", "email_security", "Proofpoint"),
            ("mimecast", "email_security", "Mimecast"),
        ] {
            if lower.contains(token) {
                result.security.insert(key.to_string(), value.to_string());
            }
        }

        emails.extend(EMAIL_PATTERN.find_iter(txt).map(|m| m.as_str().to_string()));
        ips.extend(IPV4_PATTERN.find_iter(txt).map(|m| m.as_str().to_string()));
        domains.extend(
            DOMAIN_PATTERN
                .find_iter(&lower)
                .map(|m| m.as_str().to_string())
                .filter(|d| d != domain),
        );
    }

    result.raw_records = records;
    result.emails = emails.into_iter().take(TXT_EXTRACT_LIMIT).collect();
    result.ips = ips.into_iter().take(TXT_EXTRACT_LIMIT).collect();
    result.domains = domains.into_iter().take(TXT_EXTRACT_LIMIT).collect();
    result
}

#[async_trait]
impl Probe for TtlProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let mut entries = BTreeMap::new();
        for record_type in TTL_RECORD_TYPES {
            match self.dns.lookup(domain, *record_type).await {
                Ok(Some(lookup)) => {
                    if let Some(record) = lookup.records().first() {
                        entries.insert(record_type.to_string(), ttl_entry(record.ttl()));
                    }
                }
                Ok(None) => {}
                Err(e) => debug!(domain, record_type = %record_type, error = %e, "TTL lookup failed."),
            }
        }
        Ok(ProbeOutcome::record(&entries))
    }
}

pub fn ttl_entry(ttl: u32) -> TtlEntry {
    let category = match ttl {
        0..300 => "very-short (frequent updates expected)",
        300..3600 => "short (CDN/load-balanced)",
        3600..86400 => "moderate (standard)",
        _ => "long (static configuration)",
    };
    let human = if ttl >= 3600 {
        format!("{}h {}m {}s", ttl / 3600, (ttl % 3600) / 60, ttl % 60)
    } else {
        format!("{}m {}s", ttl / 60, ttl % 60)
    };
    TtlEntry { ttl, category: category.to_string(), human }
}

/// Looks up the SPF (Sender Policy Framework) record for a domain.
/// SPF records are stored in TXT records and start with "v=spf1".
#[async_trait]
impl Probe for SpfProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        debug!(domain, "Looking up SPF record.");
        let records = self.dns.txt(domain).await.map_err(|e| {
            warn!(domain, error = %e, "SPF lookup failed.");
            e
        })?;
        match records.into_iter().find(|r| r.starts_with("v=spf1")) {
            Some(record) => {
                debug!(record = %record, "SPF record found.");
                Ok(ProbeOutcome::record(&parse_spf(domain, &record)))
            }
            None => {
                debug!(domain, "No SPF record found among TXT records.");
                Ok(ProbeOutcome::Empty)
            }
        }
    }
}

pub fn parse_spf(domain: &str, record: &str) -> SpfRecord {
    let mut mechanisms = Vec::new();
    let mut policy = None;
    for part in record.split_whitespace().skip(1) {
        let mechanism = |kind: &str, value: &str| SpfMechanism { kind: kind.to_string(), value: value.to_string() };
        if let Some(value) = part.strip_prefix("include:") {
            mechanisms.push(mechanism("include", value));
        } else if part == "a" {
            mechanisms.push(mechanism("a", domain));
        } else if let Some(value) = part.strip_prefix("a:") {
            mechanisms.push(mechanism("a", value));
        } else if part.starts_with("mx") {
            mechanisms.push(mechanism("mx", domain));
        } else if let Some(value) = part.strip_prefix("ip4:") {
            mechanisms.push(mechanism("ipv4", value));
        } else if let Some(value) = part.strip_prefix("ip6:") {
            mechanisms.push(mechanism("ipv6", value));
        } else if matches!(part, "~all" | "-all" | "+all" | "?all") {
            policy = Some(part.to_string());
        }
    }
    let domains = mechanisms
        .iter()
        .filter(|m| matches!(m.kind.as_str(), "include" | "a") && m.value != domain && looks_like_domain(&m.value))
        .map(|m| m.value.to_ascii_lowercase())
        .collect();
    SpfRecord { record: record.to_string(), mechanisms, policy, domains }
}

/// Looks up the DMARC record for a domain.
/// DMARC records are stored in a TXT record at the `_dmarc` subdomain.
#[async_trait]
impl Probe for DmarcProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let dmarc_target = format!("_dmarc.{domain}");
        debug!(target = %dmarc_target, "Looking up DMARC record.");
        let records = self.dns.txt(&dmarc_target).await?;
        match records.into_iter().find(|r| r.starts_with("v=DMARC1")) {
            Some(record) => Ok(ProbeOutcome::record(&parse_dmarc(&record))),
            None => {
                debug!(target = %dmarc_target, "No DMARC record found.");
                Ok(ProbeOutcome::Empty)
            }
        }
    }
}

pub fn parse_dmarc(record: &str) -> DmarcRecord {
    let policy = record
        .split(';')
        .find_map(|tag| tag.trim().strip_prefix("p="))
        .map(|p| p.trim().to_string());
    DmarcRecord {
        record: record.to_string(),
        policy,
        aggregate_reports: DMARC_RUA.captures(record).map(|c| c[1].to_string()),
        forensic_reports: DMARC_RUF.captures(record).map(|c| c[1].to_string()),
        percentage: DMARC_PCT.captures(record).and_then(|c| c[1].parse().ok()),
    }
}

/// Looks for DKIM keys under a list of common selectors.
pub struct DkimProbe {
    dns: Arc<DnsClient>,
    budget: Duration,
}

impl DkimProbe {
    pub fn new(dns: Arc<DnsClient>, budget: Duration) -> Self {
        Self { dns, budget }
    }
}

/// Looks up DKIM records for a domain using a list of common selectors.
/// DKIM records are stored in TXT records at `selector._domainkey.domain`.
#[async_trait]
impl Probe for DkimProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let lookups = stream::iter(COMMON_DKIM_SELECTORS)
            .map(|selector| async move {
                let dkim_target = format!("{selector}._domainkey.{domain}");
                match self.dns.txt(&dkim_target).await {
                    Ok(records) => records
                        .into_iter()
                        .filter(|r| r.starts_with("v=DKIM1"))
                        .map(|record| DkimRecord { selector: selector.to_string(), record })
                        .collect(),
                    Err(e) => {
                        debug!(selector, target = %dkim_target, error = %e, "DKIM lookup for this selector failed.");
                        Vec::new()
                    }
                }
            })
            .buffered(DKIM_CONCURRENCY)
            .boxed();
        let found_records: Vec<DkimRecord> =
            collect_within(lookups, self.budget).await.items.into_iter().flatten().collect();
        if !found_records.is_empty() {
            info!(count = %found_records.len(), "Found DKIM records.");
        }
        Ok(ProbeOutcome::list(found_records))
    }
}

/// TXT-published policy discovered at a fixed prefix (BIMI, MTA-STS).
pub struct PolicyTxtProbe {
    dns: Arc<DnsClient>,
    prefix: &'static str,
    marker: &'static str,
}

impl PolicyTxtProbe {
    pub fn bimi(dns: Arc<DnsClient>) -> Self {
        Self { dns, prefix: "default._bimi", marker: "v=BIMI1" }
    }

    pub fn mta_sts(dns: Arc<DnsClient>) -> Self {
        Self { dns, prefix: "_mta-sts", marker: "v=STSv1" }
    }
}

#[async_trait]
impl Probe for PolicyTxtProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let name = format!("{}.{domain}", self.prefix);
        let records = self.dns.txt(&name).await?;
        let Some(record) = records.into_iter().find(|r| r.starts_with(self.marker)) else {
            return Ok(ProbeOutcome::Empty);
        };
        Ok(ProbeOutcome::record(&PolicyTxtRecord { tags: parse_tags(&record), name, record }))
    }
}

/// Splits `k=v; k2=v2` tag lists, skipping the version tag.
pub fn parse_tags(record: &str) -> BTreeMap<String, String> {
    record
        .split(';')
        .filter_map(|tag| tag.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty() && k != "v")
        .collect()
}

/// Looks up CAA (Certification Authority Authorization) records for a domain.
#[async_trait]
impl Probe for CaaProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let records = self.dns.records(domain, RecordType::CAA).await?;
        if !records.is_empty() {
            info!(count = %records.len(), "Found CAA records.");
        }
        Ok(ProbeOutcome::list(records))
    }
}

/// Queries SRV records for every configured service name.
pub struct SrvProbe {
    dns: Arc<DnsClient>,
    services: Vec<String>,
    budget: Duration,
}

impl SrvProbe {
    pub fn new(dns: Arc<DnsClient>, services: Vec<String>, budget: Duration) -> Self {
        Self { dns, services, budget }
    }
}

#[async_trait]
impl Probe for SrvProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let lookups = stream::iter(self.services.iter())
            .map(|service| async move {
                let name = format!("{service}.{domain}");
                let entries = match self.dns.inner().srv_lookup(name.as_str()).await {
                    Ok(lookup) => lookup
                        .iter()
                        .map(|srv| SrvEntry {
                            target: trim_name(&srv.target().to_string()),
                            port: srv.port(),
                            priority: srv.priority(),
                            weight: srv.weight(),
                        })
                        .collect(),
                    Err(e) => {
                        if !is_absent(&e) {
                            debug!(name = %name, error = %e, "SRV lookup failed.");
                        }
                        Vec::new()
                    }
                };
                (service.clone(), entries)
            })
            .buffer_unordered(SRV_CONCURRENCY)
            .filter(|(_, entries)| futures::future::ready(!entries.is_empty()))
            .boxed();
        let found = collect_within(lookups, self.budget).await;
        if found.cut_short {
            info!(domain, answered = found.items.len(), "SRV sweep hit its budget, returning partial results.");
        }

        let mut record = SrvRecord::default();
        let mut domains = BTreeSet::new();
        for (service, entries) in found.items {
            domains.extend(entries.iter().map(|e| e.target.clone()).filter(|t| looks_like_domain(t)));
            record.services.insert(service, entries);
        }
        record.domains = domains.into_iter().collect();
        if record.services.is_empty() {
            return Ok(ProbeOutcome::Empty);
        }
        Ok(ProbeOutcome::record(&record))
    }
}

/// Brute-forces `word.domain` names from the configured wordlist.
pub struct SubdomainProbe {
    dns: Arc<DnsClient>,
    words: Vec<String>,
    budget: Duration,
}

impl SubdomainProbe {
    pub fn new(dns: Arc<DnsClient>, words: Vec<String>, budget: Duration) -> Self {
        Self { dns, words, budget }
    }
}

#[async_trait]
impl Probe for SubdomainProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let candidates = stream::iter(self.words.iter())
            .map(|word| async move {
                let candidate = format!("{word}.{domain}");
                match self.dns.ipv4(&candidate).await {
                    Ok(ips) if !ips.is_empty() => Some(candidate),
                    _ => None,
                }
            })
            .buffer_unordered(SUBDOMAIN_CONCURRENCY)
            .filter_map(futures::future::ready)
            .boxed();
        let gathered = collect_within(candidates, self.budget).await;
        if gathered.cut_short {
            info!(domain, found = gathered.items.len(), "Subdomain sweep hit its budget, returning partial results.");
        }
        let mut found = gathered.items;
        found.sort();
        debug!(domain, found = found.len(), tried = self.words.len(), "Subdomain enumeration finished.");
        Ok(ProbeOutcome::list(found))
    }
}

#[async_trait]
impl Probe for WildcardProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let mut wildcard_ips = BTreeSet::new();
        for label in random_labels(WILDCARD_PROBES) {
            let name = format!("{label}.{domain}");
            if let Ok(ips) = self.dns.ipv4(&name).await {
                wildcard_ips.extend(ips.iter().map(|ip| ip.to_string()));
            }
        }
        let record = if wildcard_ips.is_empty() {
            WildcardRecord { wildcard_detected: false, wildcard_ips: Vec::new(), note: None }
        } else {
            WildcardRecord {
                wildcard_detected: true,
                wildcard_ips: wildcard_ips.into_iter().collect(),
                note: Some("Domain uses wildcard DNS - subdomain enumeration may be unreliable".to_string()),
            }
        };
        Ok(ProbeOutcome::record(&record))
    }
}

fn random_labels(count: usize) -> Vec<String> {
    let mut rng = rand::rng();
    (0..count)
        .map(|_| {
            (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(WILDCARD_LABEL_LEN)
                .map(|b| char::from(b).to_ascii_lowercase())
                .collect()
        })
        .collect()
}
