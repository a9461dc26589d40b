// src/core/probes/ip_probes.rs

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::core::errors::ProbeError;
use crate::core::models::{GeoRecord, ProbeOutcome, PtrEntry, PtrRecord, Target};
use crate::core::probes::Probe;
use crate::core::resolver::DnsClient;

/// Airport codes and city names commonly embedded in router and CDN host names.
const LOCATION_HINTS: &[(&str, &str)] = &[
    ("par", "Paris, FR"),
    ("lhr", "London, UK"),
    ("ams", "Amsterdam, NL"),
    ("fra", "Frankfurt, DE"),
    ("cdg", "Paris, FR"),
    ("jfk", "New York, US"),
    ("sfo", "San Francisco, US"),
    ("lax", "Los Angeles, US"),
    ("ord", "Chicago, US"),
    ("dfw", "Dallas, US"),
    ("sea", "Seattle, US"),
    ("iad", "Washington DC, US"),
    ("sin", "Singapore, SG"),
    ("hkg", "Hong Kong, HK"),
    ("nrt", "Tokyo, JP"),
    ("syd", "Sydney, AU"),
    ("yyz", "Toronto, CA"),
    ("gru", "São Paulo, BR"),
    ("dxb", "Dubai, AE"),
    ("muc", "Munich, DE"),
    ("zrh", "Zurich, CH"),
];

fn ip_of(target: &Target) -> Option<IpAddr> {
    match target {
        Target::Ip(ip) => Some(*ip),
        Target::Domain(_) => None,
    }
}

/// ASN, prefix and country from Team Cymru's DNS interface, plus a location hint
/// guessed from the PTR name.
pub struct GeolocationProbe {
    dns: Arc<DnsClient>,
}

impl GeolocationProbe {
    pub fn new(dns: Arc<DnsClient>) -> Self {
        Self { dns }
    }
}

#[async_trait]
impl Probe for GeolocationProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(ip) = ip_of(target) else { return Ok(ProbeOutcome::Empty) };
        let mut record = match ip {
            IpAddr::V4(v4) => cymru_origin(&self.dns, v4).await?,
            IpAddr::V6(_) => GeoRecord { ip: ip.to_string(), ..GeoRecord::default() },
        };

        if let Ok(names) = self.dns.reverse(ip).await {
            if let Some(hostname) = names.into_iter().next() {
                record.location_hint = location_hint(&hostname).map(str::to_string);
                record.hostname = Some(hostname);
            }
        }

        let found_anything = record.asn.is_some() || record.hostname.is_some();
        if !found_anything {
            return Ok(ProbeOutcome::Empty);
        }
        Ok(ProbeOutcome::record(&record))
    }
}

/// ASN, prefix, country and AS name for an IPv4 address, from Team Cymru's DNS
/// interface. Fields stay `None` when the address is not announced.
pub(crate) async fn cymru_origin(dns: &DnsClient, ip: Ipv4Addr) -> Result<GeoRecord, ProbeError> {
    let mut record = GeoRecord { ip: ip.to_string(), ..GeoRecord::default() };
    let query = format!("{}.origin.asn.cymru.com", reversed_octets(ip));
    if let Some(txt) = dns.txt(&query).await?.into_iter().next() {
        apply_origin(&mut record, &txt);
    }
    if let Some(asn) = record.asn.clone() {
        match dns.txt(&format!("AS{asn}.asn.cymru.com")).await {
            Ok(records) => {
                record.asn_name = records.first().and_then(|txt| pipe_field(txt, 4));
            }
            Err(e) => debug!(asn = %asn, error = %e, "ASN name lookup failed."),
        }
    }
    Ok(record)
}

pub(crate) fn reversed_octets(ip: Ipv4Addr) -> String {
    let [a, b, c, d] = ip.octets();
    format!("{d}.{c}.{b}.{a}")
}

fn pipe_field(txt: &str, index: usize) -> Option<String> {
    txt.split('|')
        .map(str::trim)
        .nth(index)
        .filter(|field| !field.is_empty())
        .map(str::to_string)
}

/// Fills ASN fields from an origin line, either `ASN | BGP Prefix | CC | Registry | Allocated`
/// or the longer form with the queried IP in the second column.
pub fn apply_origin(record: &mut GeoRecord, txt: &str) {
    if txt.split('|').count() < 4 {
        return;
    }
    let prefix_at = if pipe_field(txt, 1).is_some_and(|f| f.contains('/')) { 1 } else { 2 };
    // Multi-origin prefixes list several ASNs separated by spaces.
    record.asn = pipe_field(txt, 0).and_then(|asn| asn.split_whitespace().next().map(str::to_string));
    record.bgp_prefix = pipe_field(txt, prefix_at);
    record.country = pipe_field(txt, prefix_at + 1);
    record.registry = pipe_field(txt, prefix_at + 2);
}

pub fn location_hint(hostname: &str) -> Option<&'static str> {
    let lower = hostname.to_ascii_lowercase();
    LOCATION_HINTS
        .iter()
        .find(|(code, _)| lower.contains(code))
        .map(|(_, location)| *location)
}

/// Guesses the cloud provider from a PTR host name.
pub fn ptr_provider(hostname: &str) -> Option<&'static str> {
    let lower = hostname.to_ascii_lowercase();
    if lower.contains("amazonaws") || lower.contains("aws") {
        Some("AWS")
    } else if lower.contains("googleusercontent") || lower.contains("google") {
        Some("Google Cloud")
    } else if lower.contains("cloudflare") {
        Some("Cloudflare")
    } else if lower.contains("azure") || lower.contains("microsoft") {
        Some("Azure")
    } else {
        None
    }
}

/// PTR names for an address, annotated with a provider guess.
pub struct PtrProbe {
    dns: Arc<DnsClient>,
}

impl PtrProbe {
    pub fn new(dns: Arc<DnsClient>) -> Self {
        Self { dns }
    }
}

#[async_trait]
impl Probe for PtrProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(ip) = ip_of(target) else { return Ok(ProbeOutcome::Empty) };
        let names = self.dns.reverse(ip).await?;
        if names.is_empty() {
            return Ok(ProbeOutcome::Empty);
        }
        let records = names
            .iter()
            .map(|hostname| PtrEntry {
                ip: ip.to_string(),
                hostname: hostname.clone(),
                provider: ptr_provider(hostname).map(str::to_string),
            })
            .collect();
        Ok(ProbeOutcome::record(&PtrRecord { records, domains: names }))
    }
}

/// Plain reverse lookup: the PTR names as a list.
pub struct ReverseDnsProbe {
    dns: Arc<DnsClient>,
}

impl ReverseDnsProbe {
    pub fn new(dns: Arc<DnsClient>) -> Self {
        Self { dns }
    }
}

#[async_trait]
impl Probe for ReverseDnsProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(ip) = ip_of(target) else { return Ok(ProbeOutcome::Empty) };
        Ok(ProbeOutcome::list(self.dns.reverse(ip).await?))
    }
}

/// Lists the addresses within `range` of the target, excluding the target itself.
pub struct NeighborsProbe {
    range: u32,
}

impl NeighborsProbe {
    pub fn new(range: u32) -> Self {
        Self { range }
    }
}

#[async_trait]
impl Probe for NeighborsProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(ip) = ip_of(target) else { return Ok(ProbeOutcome::Empty) };
        let neighbors: Vec<String> = neighbors(ip, self.range).iter().map(IpAddr::to_string).collect();
        Ok(ProbeOutcome::list(neighbors))
    }
}

/// Addresses at offsets `-range..=range` (zero skipped). Offsets that would wrap past
/// either end of the address space are dropped.
pub fn neighbors(ip: IpAddr, range: u32) -> Vec<IpAddr> {
    let offsets = (1..=range as i64).rev().map(|o| -o).chain(1..=range as i64);
    match ip {
        IpAddr::V4(v4) => {
            let base = u32::from(v4) as i64;
            offsets
                .filter_map(|offset| u32::try_from(base + offset).ok())
                .map(|n| IpAddr::V4(Ipv4Addr::from(n)))
                .collect()
        }
        IpAddr::V6(v6) => {
            let base = u128::from(v6);
            offsets
                .filter_map(|offset| {
                    if offset < 0 {
                        base.checked_sub(offset.unsigned_abs() as u128)
                    } else {
                        base.checked_add(offset as u128)
                    }
                })
                .map(|n| IpAddr::V6(Ipv6Addr::from(n)))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbors_skip_self_and_stay_ordered() {
        let ip: IpAddr = "192.0.2.10".parse().unwrap();
        let around: Vec<String> = neighbors(ip, 2).iter().map(IpAddr::to_string).collect();
        assert_eq!(around, vec!["192.0.2.8", "192.0.2.9", "192.0.2.11", "192.0.2.12"]);
    }

    #[test]
    fn neighbors_drop_overflow() {
        assert_eq!(neighbors("0.0.0.0".parse().unwrap(), 2).len(), 2);
        assert_eq!(neighbors("255.255.255.255".parse().unwrap(), 2).len(), 2);
        let v6 = neighbors("::1".parse().unwrap(), 2);
        assert_eq!(v6, vec!["::".parse::<IpAddr>().unwrap(), "::2".parse().unwrap(), "::3".parse().unwrap()]);
        assert!(neighbors("198.51.100.1".parse().unwrap(), 0).is_empty());
    }

    #[test]
    fn cymru_origin_line() {
        let mut record = GeoRecord::default();
        apply_origin(&mut record, "13335 14789 | 1.1.1.1 | 1.1.1.0/24 | AU | apnic | 2011-08-11");
        assert_eq!(record.asn.as_deref(), Some("13335"));
        assert_eq!(record.bgp_prefix.as_deref(), Some("1.1.1.0/24"));
        assert_eq!(record.country.as_deref(), Some("AU"));
        assert_eq!(record.registry.as_deref(), Some("apnic"));

        let mut record = GeoRecord::default();
        apply_origin(&mut record, "15169 | 8.8.8.0/24 | US | arin | 2023-12-28");
        assert_eq!(record.asn.as_deref(), Some("15169"));
        assert_eq!(record.bgp_prefix.as_deref(), Some("8.8.8.0/24"));
        assert_eq!(record.country.as_deref(), Some("US"));
        assert_eq!(record.registry.as_deref(), Some("arin"));

        let mut record = GeoRecord::default();
        apply_origin(&mut record, "garbage");
        assert!(record.asn.is_none());
    }

    #[test]
    fn hints_and_providers() {
        assert_eq!(location_hint("ae-1.r01.fra02.example.net"), Some("Frankfurt, DE"));
        assert_eq!(location_hint("host.example.net"), None);
        assert_eq!(ptr_provider("ec2-1-2-3-4.compute-1.amazonaws.com"), Some("AWS"));
        assert_eq!(ptr_provider("mail.example.org"), None);
        assert_eq!(reversed_octets("192.0.2.1".parse().unwrap()), "1.2.0.192");
    }

    #[tokio::test]
    async fn neighbor_probe_lists_addresses() {
        let probe = NeighborsProbe::new(1);
        let outcome = probe.probe(&Target::Ip("192.0.2.10".parse().unwrap()), 0).await.unwrap();
        assert_eq!(outcome, ProbeOutcome::list(["192.0.2.9", "192.0.2.11"]));
        let outcome = probe.probe(&Target::Domain("example.com".into()), 0).await.unwrap();
        assert_eq!(outcome, ProbeOutcome::Empty);
    }
}
