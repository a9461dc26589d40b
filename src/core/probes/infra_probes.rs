// src/core/probes/infra_probes.rs

//! Infrastructure analysis built on plain lookups: mail server reputation, anycast
//! and load-balancing signals, CDN fingerprinting and zone age.

use std::collections::{BTreeMap, BTreeSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures::{StreamExt, stream};
use hickory_resolver::proto::rr::RecordType;
use tracing::{debug, info, warn};

use crate::core::engine::pool::collect_within;
use crate::core::errors::ProbeError;
use crate::core::models::{
    AnycastCandidate, AnycastRecord, BlacklistHit, CdnRecord, DomainAgeRecord, LoadBalancerRecord,
    MailBlacklistRecord, MailServerStatus, ProbeOutcome, SoaTimings, Target,
};
use crate::core::probes::Probe;
use crate::core::probes::dns_probes::domain_of;
use crate::core::probes::ip_probes::{cymru_origin, reversed_octets};
use crate::core::resolver::{DnsClient, trim_name};

pub const DNS_BLACKLISTS: &[(&str, &str)] = &[
    ("zen.spamhaus.org", "Spamhaus ZEN (combined list)"),
    ("bl.spamcop.net", "SpamCop"),
    ("dnsbl.sorbs.net", "SORBS"),
    ("b.barracudacentral.org", "Barracuda"),
    ("dnsbl-1.uceprotect.net", "UCEPROTECT Level 1"),
    ("cbl.abuseat.org", "Composite Blocking List"),
    ("psbl.surriel.com", "Passive Spam Block List"),
    ("dnsbl.dronebl.org", "DroneBL"),
    ("spam.dnsbl.anonmails.de", "AnonMails DNSBL"),
];
const MAX_MAIL_SERVERS: usize = 5;
const BLACKLIST_CONCURRENCY: usize = 8;

const ANYCAST_PROVIDERS: &[&str] =
    &["CLOUDFLARE", "GOOGLE", "AKAMAI", "FASTLY", "AMAZON", "MICROSOFT", "CLOUDFRONT", "FACEBOOK"];
const MAX_ANYCAST_IPS: usize = 8;
const LOW_TTL: u32 = 300;
const VERY_LOW_TTL: u32 = 60;

const ROTATION_QUERIES: usize = 10;
const ROTATION_PAUSE: Duration = Duration::from_millis(100);
const MAX_PTR_LOOKUPS: usize = 5;

const CDN_PATTERNS: &[(&str, &[&str])] = &[
    ("Cloudflare", &["cloudflare.com", "cloudflare.net", "cloudflare-dns.com"]),
    ("Akamai", &["akamai.net", "akamaiedge.net", "akamaitechnologies.com", "akamaihd.net"]),
    ("Fastly", &["fastly.net", "fastlylb.net"]),
    ("Amazon CloudFront", &["cloudfront.net", "awsdns", "amazonaws.com"]),
    ("Google Cloud CDN", &["1e100.net", "google.com", "goog"]),
    ("Microsoft Azure CDN", &["azureedge.net", "azure.com", "trafficmanager.net"]),
    ("Cloudinary", &["cloudinary.com"]),
    ("KeyCDN", &["keycdn.com"]),
    ("StackPath", &["stackpathcdn.com", "netdna-cdn.com"]),
    ("BunnyCDN", &["bunnycdn.com"]),
    ("CDN77", &["cdn77.org"]),
    ("Imperva (Incapsula)", &["incapdns.net", "incapsula.com"]),
    ("Sucuri", &["sucuri.net"]),
    ("Netlify", &["netlify.app", "netlify.com"]),
    ("Vercel", &["vercel.app", "vercel-dns.com"]),
];
const CDN_ASNS: &[(&str, &str)] = &[
    ("13335", "Cloudflare"),
    ("16509", "Amazon CloudFront"),
    ("15169", "Google Cloud CDN"),
    ("8075", "Microsoft Azure CDN"),
    ("20940", "Akamai"),
    ("16625", "Akamai"),
    ("54113", "Fastly"),
];
const MAX_CDN_ASN_LOOKUPS: usize = 3;

/// Earliest serial accepted as a Unix timestamp (2000-01-01).
const MIN_TIMESTAMP_SERIAL: u32 = 946_684_800;

macro_rules! infra_probe {
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

infra_probe!(
    /// Looks up each IPv4 address of the target in well-known anycast networks.
    AnycastProbe
);
infra_probe!(
    /// Fingerprints CDN use from CNAME, NS, ASN, TXT and TTL signals.
    CdnProbe
);
infra_probe!(
    /// Estimates zone age and update cadence from the SOA serial.
    DomainAgeProbe
);

pub fn confidence(signals: usize) -> &'static str {
    match signals {
        0 => "NONE",
        1 => "LOW",
        2 => "MEDIUM",
        _ => "HIGH",
    }
}

// --- Mail blacklists ---

/// Checks mail server addresses against public DNS blacklists.
pub struct MailBlacklistProbe {
    dns: Arc<DnsClient>,
    budget: Duration,
}

impl MailBlacklistProbe {
    pub fn new(dns: Arc<DnsClient>, budget: Duration) -> Self {
        Self { dns, budget }
    }

    /// `(host, ip, priority)` for each MX address, falling back to the domain's own
    /// addresses when it publishes no MX.
    async fn mail_servers(&self, domain: &str) -> Result<Vec<(String, Ipv4Addr, u16)>, ProbeError> {
        let mut exchanges = self.dns.mx(domain).await.unwrap_or_default();
        exchanges.sort_by_key(|(preference, _)| *preference);
        let mut servers = Vec::new();
        for (priority, host) in exchanges {
            let ips = self.dns.ipv4(&host).await.unwrap_or_default();
            servers.extend(ips.into_iter().map(|ip| (host.clone(), ip, priority)));
        }
        if servers.is_empty() {
            servers = self.dns.ipv4(domain).await?.into_iter().map(|ip| (domain.to_string(), ip, 0)).collect();
        }
        servers.truncate(MAX_MAIL_SERVERS);
        Ok(servers)
    }
}

/// Real listings answer inside 127.0.0.0/8. Answers in 127.255.255.0/24 are error
/// codes, such as queries refused through public resolvers.
pub fn is_listing(response: Ipv4Addr) -> bool {
    let [a, b, c, _] = response.octets();
    a == 127 && !(b == 255 && c == 255)
}

pub fn reputation(listed: usize) -> &'static str {
    match listed {
        0 => "EXCELLENT",
        1 => "GOOD",
        2 | 3 => "POOR",
        _ => "CRITICAL",
    }
}

pub fn server_status(mx_host: String, ip: Ipv4Addr, priority: u16, hits: Vec<BlacklistHit>) -> MailServerStatus {
    let listed = hits.len();
    MailServerStatus {
        mx_host,
        ip: ip.to_string(),
        priority,
        reputation: reputation(listed).to_string(),
        blacklists_checked: DNS_BLACKLISTS.len(),
        blacklists_listed: listed,
        listed_on: hits.iter().map(|hit| hit.blacklist.clone()).collect(),
        blacklist_details: hits,
        clean: listed == 0,
    }
}

pub fn blacklist_summary(mail_servers: Vec<MailServerStatus>) -> MailBlacklistRecord {
    let clean = mail_servers.iter().filter(|server| server.clean).count();
    let total = mail_servers.len();
    MailBlacklistRecord {
        summary: format!("{clean}/{total} mail servers clean"),
        overall_status: if clean == total { "CLEAN" } else { "ISSUES_DETECTED" }.to_string(),
        mail_servers,
    }
}

#[async_trait]
impl Probe for MailBlacklistProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let servers = self.mail_servers(domain).await?;
        if servers.is_empty() {
            return Ok(ProbeOutcome::Empty);
        }

        let checks = servers.iter().enumerate().flat_map(|(index, (_, ip, _))| {
            DNS_BLACKLISTS.iter().map(move |(zone, name)| (index, *ip, *zone, *name))
        });
        let lookups = stream::iter(checks)
            .map(|(index, ip, zone, name)| async move {
                let query = format!("{}.{zone}", reversed_octets(ip));
                let response = match self.dns.ipv4(&query).await {
                    Ok(answers) => answers.into_iter().find(|a| is_listing(*a))?,
                    Err(e) => {
                        debug!(query = %query, error = %e, "Blacklist lookup failed.");
                        return None;
                    }
                };
                let reason = self.dns.txt(&query).await.ok().and_then(|txt| txt.into_iter().next());
                let hit = BlacklistHit {
                    blacklist: name.to_string(),
                    dnsbl: zone.to_string(),
                    response: response.to_string(),
                    reason,
                };
                Some((index, hit))
            })
            .buffer_unordered(BLACKLIST_CONCURRENCY)
            .filter_map(futures::future::ready)
            .boxed();
        let gathered = collect_within(lookups, self.budget).await;
        if gathered.cut_short {
            info!(domain, listings = gathered.items.len(), "Blacklist sweep hit its budget, returning partial results.");
        }

        let mut hits: BTreeMap<usize, Vec<BlacklistHit>> = BTreeMap::new();
        for (index, hit) in gathered.items {
            hits.entry(index).or_default().push(hit);
        }
        let statuses: Vec<MailServerStatus> = servers
            .into_iter()
            .enumerate()
            .map(|(index, (host, ip, priority))| {
                let mut found = hits.remove(&index).unwrap_or_default();
                found.sort_by(|a, b| a.dnsbl.cmp(&b.dnsbl));
                server_status(host, ip, priority, found)
            })
            .collect();
        let listed = statuses.iter().filter(|s| !s.clean).count();
        if listed > 0 {
            warn!(domain, listed, "Mail servers found on blacklists.");
        }
        Ok(ProbeOutcome::record(&blacklist_summary(statuses)))
    }
}

// --- Anycast ---

pub fn anycast_indicators(asn_name: Option<&str>, ip_count: usize, ttl: Option<u32>) -> Vec<String> {
    let mut indicators = Vec::new();
    let upper = asn_name.unwrap_or_default().to_ascii_uppercase();
    if ANYCAST_PROVIDERS.iter().any(|provider| upper.contains(provider)) {
        indicators.push("Known anycast CDN/cloud provider".to_string());
    }
    if ip_count > 2 {
        indicators.push(format!("Multiple IPs in rotation ({ip_count} total)"));
    }
    if let Some(ttl) = ttl.filter(|ttl| *ttl < LOW_TTL) {
        indicators.push(format!("Low TTL ({ttl}s) suggests dynamic routing"));
    }
    indicators
}

#[async_trait]
impl Probe for AnycastProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let answer = self.dns.ipv4_with_ttl(domain).await?;
        if answer.ips.is_empty() {
            return Ok(ProbeOutcome::Empty);
        }
        let ip_count = answer.ips.len();
        let origins = futures::future::join_all(
            answer.ips.iter().take(MAX_ANYCAST_IPS).map(|ip| cymru_origin(&self.dns, *ip)),
        )
        .await;

        let candidates: Vec<AnycastCandidate> = origins
            .into_iter()
            .filter_map(|origin| origin.map_err(|e| debug!(domain, error = %e, "Origin lookup failed.")).ok())
            .filter(|origin| origin.asn.is_some())
            .filter_map(|origin| {
                let indicators = anycast_indicators(origin.asn_name.as_deref(), ip_count, answer.ttl);
                if indicators.is_empty() {
                    return None;
                }
                Some(AnycastCandidate {
                    ip: origin.ip,
                    asn: origin.asn,
                    asn_name: origin.asn_name,
                    country: origin.country,
                    registry: origin.registry,
                    bgp_prefix: origin.bgp_prefix,
                    anycast_likely: indicators.len() >= 2,
                    confidence: confidence(indicators.len()).to_string(),
                    anycast_indicators: indicators,
                })
            })
            .collect();
        if candidates.is_empty() {
            return Ok(ProbeOutcome::Empty);
        }
        Ok(ProbeOutcome::record(&AnycastRecord {
            ips_analyzed: ip_count,
            summary: format!("{} of {ip_count} IPs show anycast characteristics", candidates.len()),
            anycast_candidates: candidates,
        }))
    }
}

// --- Load balancing ---

/// Repeats uncached A queries and reads rotation, distribution, TTL and PTR
/// location signals from the answers.
pub struct LoadBalancerProbe {
    dns: Arc<DnsClient>,
    budget: Duration,
}

impl LoadBalancerProbe {
    pub fn new(dns: Arc<DnsClient>, budget: Duration) -> Self {
        Self { dns, budget }
    }
}

pub fn ttl_indicator(ttl: u32) -> Option<String> {
    if ttl < VERY_LOW_TTL {
        Some(format!("Very low TTL ({ttl}s) suggests active load balancing"))
    } else if ttl < LOW_TTL {
        Some(format!("Low TTL ({ttl}s) suggests load balancing"))
    } else {
        None
    }
}

/// Three-letter site codes taken from host name labels that mix letters and digits,
/// such as `fra2` or `sea1`.
pub fn location_codes(hostnames: &[String]) -> BTreeSet<String> {
    hostnames
        .iter()
        .flat_map(|hostname| hostname.split('.'))
        .filter(|label| label.len() >= 3 && label.chars().any(|c| c.is_ascii_digit()))
        .map(|label| label.chars().take(3).collect())
        .collect()
}

/// Reads distribution and rotation out of repeated answers. Each response keeps
/// the order the server returned it in.
pub fn analyze_rotation(responses: &[Vec<String>]) -> LoadBalancerRecord {
    let mut distribution: BTreeMap<String, usize> = BTreeMap::new();
    for ip in responses.iter().flatten() {
        *distribution.entry(ip.clone()).or_default() += 1;
    }
    let patterns: BTreeSet<&Vec<String>> = responses.iter().collect();
    let ips: Vec<String> = distribution.keys().cloned().collect();
    let mut record = LoadBalancerRecord {
        ip_count: ips.len(),
        queries_performed: responses.len(),
        patterns_detected: patterns.len(),
        ..LoadBalancerRecord::default()
    };

    if ips.len() <= 1 {
        record.ips = ips;
        record.distribution = distribution;
        record.confidence = confidence(0).to_string();
        record.note = Some("Single IP - no load balancing detected".to_string());
        return record;
    }

    record.load_balanced = true;
    record.indicators.push(format!("{} unique IPs detected", ips.len()));
    if patterns.len() > 1 {
        record.indicators.push("IP order varies between queries (round-robin)".to_string());
        record.load_balancer_type = Some("Round-Robin DNS".to_string());
    }
    let max = distribution.values().copied().max().unwrap_or_default();
    let min = distribution.values().copied().min().unwrap_or_default();
    if max == min {
        record.indicators.push("Equal distribution detected (uniform load balancing)".to_string());
        record.load_balancer_type.get_or_insert_with(|| "Uniform Load Balancing".to_string());
    } else if max > min * 2 {
        record.indicators.push("Unequal distribution (weighted load balancing)".to_string());
        record.load_balancer_type = Some("Weighted Load Balancing".to_string());
    }
    record.ips = ips;
    record.distribution = distribution;
    record
}

#[async_trait]
impl Probe for LoadBalancerProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let queries = stream::iter(0..ROTATION_QUERIES)
            .then(|round| async move {
                if round > 0 {
                    tokio::time::sleep(ROTATION_PAUSE).await;
                }
                self.dns.ipv4_uncached(domain).await
            })
            .take_while(|answer| futures::future::ready(answer.as_ref().is_ok_and(|a| !a.ips.is_empty())))
            .filter_map(|answer| futures::future::ready(answer.ok()))
            .boxed();
        let gathered = collect_within(queries, self.budget).await;
        if gathered.items.is_empty() {
            return Ok(ProbeOutcome::Empty);
        }
        let ttl = gathered.items.iter().find_map(|answer| answer.ttl);
        let responses: Vec<Vec<String>> = gathered
            .items
            .into_iter()
            .map(|answer| answer.ips.iter().map(|ip| ip.to_string()).collect())
            .collect();

        let mut record = analyze_rotation(&responses);
        if !record.load_balanced {
            return Ok(ProbeOutcome::record(&record));
        }
        if let Some(indicator) = ttl.and_then(ttl_indicator) {
            record.indicators.push(indicator);
        }

        let lookups = record.ips.iter().take(MAX_PTR_LOOKUPS).filter_map(|ip| ip.parse::<IpAddr>().ok());
        let names = futures::future::join_all(lookups.map(|ip| self.dns.reverse(ip))).await;
        record.hostnames = names
            .into_iter()
            .filter_map(|names| names.ok().and_then(|names| names.into_iter().next()))
            .collect();
        let sites = location_codes(&record.hostnames);
        if sites.len() > 1 {
            record.indicators.push(format!("{} geographic locations detected (geo load balancing)", sites.len()));
            record.load_balancer_type = Some("Geographic Load Balancing".to_string());
        }
        record.load_balancer_type.get_or_insert_with(|| "Unknown".to_string());
        record.confidence = confidence(record.indicators.len()).to_string();
        debug!(domain, ips = record.ip_count, kind = ?record.load_balancer_type, "Load balancing analysed.");
        Ok(ProbeOutcome::record(&record))
    }
}

// --- CDN ---

pub fn cdn_provider_for(name: &str) -> Option<&'static str> {
    let lower = name.to_ascii_lowercase();
    CDN_PATTERNS
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|pattern| lower.contains(pattern)))
        .map(|(provider, _)| *provider)
}

pub fn cdn_for_asn(asn: &str) -> Option<&'static str> {
    CDN_ASNS.iter().find(|(number, _)| *number == asn).map(|(_, provider)| *provider)
}

/// Picks the provider seen most often; ties go to the first one observed.
pub fn summarize_cdn(indicators: Vec<String>, providers: &[&'static str]) -> Option<CdnRecord> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for &provider in providers {
        match counts.iter_mut().find(|(name, _)| *name == provider) {
            Some((_, count)) => *count += 1,
            None => counts.push((provider, 1)),
        }
    }
    let primary = counts.iter().fold(None::<(&str, usize)>, |best, &(name, count)| match best {
        Some((_, top)) if top >= count => best,
        _ => Some((name, count)),
    });
    match primary {
        Some((provider, count)) => Some(CdnRecord {
            cdn_detected: true,
            cdn_provider: Some(provider.to_string()),
            confidence: confidence(count).to_string(),
            detection_methods: indicators,
            all_detected_providers: counts.iter().map(|(name, _)| name.to_string()).collect(),
        }),
        None if !indicators.is_empty() => Some(CdnRecord {
            cdn_detected: false,
            confidence: confidence(1).to_string(),
            detection_methods: indicators,
            ..CdnRecord::default()
        }),
        None => None,
    }
}

#[async_trait]
impl Probe for CdnProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let (cnames, nameservers, answer, txt) = tokio::join!(
            self.dns.records(domain, RecordType::CNAME),
            self.dns.ns(domain),
            self.dns.ipv4_with_ttl(domain),
            self.dns.txt(domain),
        );
        let mut indicators = Vec::new();
        let mut providers = Vec::new();

        for cname in cnames.unwrap_or_default().iter().map(|c| trim_name(c)) {
            if let Some(provider) = cdn_provider_for(&cname) {
                indicators.push(format!("CNAME points to {provider}: {cname}"));
                providers.push(provider);
            }
        }
        for ns in nameservers.unwrap_or_default() {
            if let Some(provider) = cdn_provider_for(&ns) {
                indicators.push(format!("NS hosted by {provider}: {ns}"));
                providers.push(provider);
            }
        }

        let answer = answer.unwrap_or_default();
        if answer.ips.len() > 2 {
            indicators.push(format!("Multiple IPs ({}) suggest CDN distribution", answer.ips.len()));
        }
        let origins = futures::future::join_all(
            answer.ips.iter().take(MAX_CDN_ASN_LOOKUPS).map(|ip| cymru_origin(&self.dns, *ip)),
        )
        .await;
        for origin in origins.into_iter().flatten() {
            let Some(asn) = origin.asn.as_deref() else { continue };
            let provider = cdn_for_asn(asn).or_else(|| origin.asn_name.as_deref().and_then(cdn_provider_for));
            if let Some(provider) = provider {
                indicators.push(format!("IP {} belongs to {provider} (ASN {asn})", origin.ip));
                providers.push(provider);
            }
        }

        for record in txt.unwrap_or_default() {
            if let Some(provider) = cdn_provider_for(&record) {
                indicators.push(format!("TXT record references {provider}"));
                providers.push(provider);
            }
        }
        if let Some(ttl) = answer.ttl.filter(|ttl| *ttl < LOW_TTL) {
            indicators.push(format!("Low TTL ({ttl}s) typical of CDN"));
        }

        match summarize_cdn(indicators, &providers) {
            Some(record) => Ok(ProbeOutcome::record(&record)),
            None => Ok(ProbeOutcome::Empty),
        }
    }
}

// --- Domain age ---

pub fn age_category(days: i64) -> String {
    match days {
        ..30 => "Very Recent (< 1 month)".to_string(),
        30..365 => format!("Recent ({} months)", days / 30),
        365..1825 => format!("Mature ({} years)", days / 365),
        _ => format!("Established ({} years)", days / 365),
    }
}

pub fn update_pattern(refresh: i32) -> String {
    let refresh = i64::from(refresh);
    if refresh < 3600 {
        format!("Frequently updated (refresh every {}m)", refresh / 60)
    } else if refresh < 86_400 {
        format!("Regular updates (refresh every {}h)", refresh / 3600)
    } else {
        format!("Infrequent updates (refresh every {}d)", refresh / 86_400)
    }
}

/// `YYYYMMDDnn` serials (RFC 1912) in a plausible range.
fn date_serial(serial: u32) -> Option<(NaiveDate, u32)> {
    let text = serial.to_string();
    if text.len() != 10 {
        return None;
    }
    let year: i32 = text[..4].parse().ok()?;
    let month: u32 = text[4..6].parse().ok()?;
    let day: u32 = text[6..8].parse().ok()?;
    let revision: u32 = text[8..].parse().ok()?;
    if !(1990..=2100).contains(&year) {
        return None;
    }
    Some((NaiveDate::from_ymd_opt(year, month, day)?, revision))
}

/// Reads the SOA serial as a date or a timestamp. Dates in the future are rejected;
/// anything unreadable falls back to an assessment of the SOA timers.
pub fn estimate_age(
    serial: u32,
    refresh: i32,
    retry: i32,
    expire: i32,
    minimum: u32,
    now: DateTime<Utc>,
) -> DomainAgeRecord {
    let mut record = DomainAgeRecord { serial, ..DomainAgeRecord::default() };

    if let Some((date, revision)) = date_serial(serial) {
        let midnight = date.and_time(chrono::NaiveTime::MIN).and_utc();
        if midnight <= now {
            let age = (now - midnight).num_days();
            record.serial_format = format!("RFC 1912 (YYYYMMDDnn) - revision {revision}");
            record.estimated_date = Some(midnight.format("%Y-%m-%dT%H:%M:%S").to_string());
            record.last_update_estimate = Some(date.format("%Y-%m-%d").to_string());
            record.estimated_age_days = Some(age);
            record.age_category = Some(age_category(age));
            record.update_pattern = Some(update_pattern(refresh));
            return record;
        }
    }

    if serial > MIN_TIMESTAMP_SERIAL {
        if let Some(stamp) = DateTime::from_timestamp(i64::from(serial), 0).filter(|stamp| *stamp < now) {
            let age = (now - stamp).num_days();
            record.serial_format = "Unix timestamp".to_string();
            record.estimated_date = Some(stamp.format("%Y-%m-%dT%H:%M:%S").to_string());
            record.last_update_estimate = Some(stamp.format("%Y-%m-%d %H:%M:%S").to_string());
            record.estimated_age_days = Some(age);
            record.age_category = Some(age_category(age));
            return record;
        }
    }

    record.serial_format = "Unknown/Custom format".to_string();
    record.note = Some("Cannot estimate age from serial number format".to_string());
    record.soa_timings = Some(SoaTimings {
        refresh: if refresh >= 3600 { format!("{refresh}s ({}h)", refresh / 3600) } else { format!("{refresh}s") },
        retry: format!("{retry}s"),
        expire: if expire >= 86_400 { format!("{expire}s ({}d)", expire / 86_400) } else { format!("{expire}s") },
        negative_cache_ttl: format!("{minimum}s"),
    });
    record.zone_stability = Some(
        match expire {
            ..604_800 => "Low (short expiry)",
            604_800..2_592_000 => "Moderate",
            _ => "High (long expiry)",
        }
        .to_string(),
    );
    record
}

#[async_trait]
impl Probe for DomainAgeProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let lookup = match self.dns.inner().soa_lookup(domain).await {
            Ok(lookup) => lookup,
            Err(e) if crate::core::resolver::is_absent(&e) => return Ok(ProbeOutcome::Empty),
            Err(e) => return Err(e.into()),
        };
        let Some(soa) = lookup.iter().next() else { return Ok(ProbeOutcome::Empty) };
        let record = estimate_age(soa.serial(), soa.refresh(), soa.retry(), soa.expire(), soa.minimum(), Utc::now());
        Ok(ProbeOutcome::record(&record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hit(zone: &str) -> BlacklistHit {
        BlacklistHit {
            blacklist: zone.to_string(),
            dnsbl: zone.to_string(),
            response: "127.0.0.2".to_string(),
            reason: None,
        }
    }

    #[test]
    fn blacklist_error_codes_are_not_listings() {
        assert!(is_listing(Ipv4Addr::new(127, 0, 0, 2)));
        assert!(is_listing(Ipv4Addr::new(127, 0, 0, 10)));
        assert!(!is_listing(Ipv4Addr::new(127, 255, 255, 254)));
        assert!(!is_listing(Ipv4Addr::new(192, 0, 2, 1)));
    }

    #[test]
    fn reputation_degrades_with_listings() {
        let ip = Ipv4Addr::new(192, 0, 2, 25);
        let clean = server_status("mx.example.com".into(), ip, 10, Vec::new());
        assert_eq!(clean.reputation, "EXCELLENT");
        assert!(clean.clean);
        assert_eq!(clean.blacklists_checked, DNS_BLACKLISTS.len());

        let listed = server_status("mx2.example.com".into(), ip, 20, vec![hit("a"), hit("b"), hit("c"), hit("d")]);
        assert_eq!(listed.reputation, "CRITICAL");
        assert_eq!(listed.listed_on, vec!["a", "b", "c", "d"]);

        let summary = blacklist_summary(vec![clean, listed]);
        assert_eq!(summary.summary, "1/2 mail servers clean");
        assert_eq!(summary.overall_status, "ISSUES_DETECTED");
        assert_eq!(reputation(1), "GOOD");
        assert_eq!(reputation(3), "POOR");
    }

    #[test]
    fn anycast_signals_accumulate() {
        let all = anycast_indicators(Some("CLOUDFLARENET - Cloudflare, Inc., US"), 4, Some(60));
        assert_eq!(all.len(), 3);
        assert_eq!(confidence(all.len()), "HIGH");
        assert!(anycast_indicators(Some("EXAMPLE-AS"), 1, Some(3600)).is_empty());
        assert_eq!(anycast_indicators(None, 3, None), vec!["Multiple IPs in rotation (3 total)"]);
    }

    fn answers(rounds: &[&[&str]]) -> Vec<Vec<String>> {
        rounds.iter().map(|ips| ips.iter().map(|ip| ip.to_string()).collect()).collect()
    }

    #[test]
    fn rotation_and_distribution() {
        let record = analyze_rotation(&answers(&[
            &["192.0.2.1", "192.0.2.2"],
            &["192.0.2.2", "192.0.2.1"],
            &["192.0.2.1", "192.0.2.2"],
        ]));
        assert!(record.load_balanced);
        assert_eq!(record.patterns_detected, 2);
        assert_eq!(record.load_balancer_type.as_deref(), Some("Round-Robin DNS"));
        assert_eq!(record.distribution.get("192.0.2.1"), Some(&3));

        let weighted = analyze_rotation(&answers(&[&["192.0.2.1"], &["192.0.2.1"], &["192.0.2.1"], &["192.0.2.9"]]));
        assert_eq!(weighted.load_balancer_type.as_deref(), Some("Weighted Load Balancing"));

        let single = analyze_rotation(&answers(&[&["192.0.2.1"], &["192.0.2.1"]]));
        assert!(!single.load_balanced);
        assert!(single.note.is_some());
    }

    #[test]
    fn ttl_and_site_codes() {
        assert!(ttl_indicator(30).unwrap().starts_with("Very low"));
        assert!(ttl_indicator(120).unwrap().starts_with("Low"));
        assert_eq!(ttl_indicator(3600), None);

        let hosts = vec!["edge.fra2.example.net".to_string(), "edge.sea1.example.net".to_string()];
        assert_eq!(location_codes(&hosts), BTreeSet::from(["fra".to_string(), "sea".to_string()]));
        assert!(location_codes(&["www.example.com".to_string()]).is_empty());
    }

    #[test]
    fn cdn_patterns_and_primary_provider() {
        assert_eq!(cdn_provider_for("d111.cloudfront.net"), Some("Amazon CloudFront"));
        assert_eq!(cdn_provider_for("KATE.NS.CLOUDFLARE.COM"), Some("Cloudflare"));
        assert_eq!(cdn_provider_for("ns1.example.com"), None);
        assert_eq!(cdn_for_asn("54113"), Some("Fastly"));

        let record = summarize_cdn(vec!["a".into(), "b".into(), "c".into()], &["Fastly", "Cloudflare", "Cloudflare"]).unwrap();
        assert_eq!(record.cdn_provider.as_deref(), Some("Cloudflare"));
        assert_eq!(record.confidence, "MEDIUM");
        assert_eq!(record.all_detected_providers, vec!["Fastly", "Cloudflare"]);

        let weak = summarize_cdn(vec!["Low TTL (60s) typical of CDN".into()], &[]).unwrap();
        assert!(!weak.cdn_detected);
        assert_eq!(weak.confidence, "LOW");
        assert!(summarize_cdn(Vec::new(), &[]).is_none());
    }

    #[test]
    fn date_serials_give_age_and_cadence() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let record = estimate_age(2024050103, 7200, 900, 1_209_600, 300, now);
        assert_eq!(record.serial_format, "RFC 1912 (YYYYMMDDnn) - revision 3");
        assert_eq!(record.estimated_age_days, Some(31));
        assert_eq!(record.age_category.as_deref(), Some("Recent (1 months)"));
        assert_eq!(record.update_pattern.as_deref(), Some("Regular updates (refresh every 2h)"));
        assert_eq!(record.last_update_estimate.as_deref(), Some("2024-05-01"));
    }

    #[test]
    fn timestamp_and_unknown_serials() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let stamp = estimate_age(1_700_000_000, 3600, 600, 604_800, 60, now);
        assert_eq!(stamp.serial_format, "Unix timestamp");
        assert_eq!(stamp.age_category.as_deref(), Some("Recent (6 months)"));

        let unknown = estimate_age(42, 3600, 600, 3_000_000, 60, now);
        assert_eq!(unknown.serial_format, "Unknown/Custom format");
        assert_eq!(unknown.zone_stability.as_deref(), Some("High (long expiry)"));
        assert_eq!(unknown.soa_timings.unwrap().expire, "3000000s (34d)");

        // a date serial in the future is not trusted
        let future = estimate_age(2030010101, 3600, 600, 86_400, 60, now);
        assert_eq!(future.serial_format, "Unknown/Custom format");
        assert_eq!(future.zone_stability.as_deref(), Some("Low (short expiry)"));
    }
}
