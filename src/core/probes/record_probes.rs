// src/core/probes/record_probes.rs

//! Service and host records: DANE, SSH fingerprints, host info, NAPTR, LOC and
//! zone transfers.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_resolver::proto::rr::{Name, RData, RecordType};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::core::errors::ProbeError;
use crate::core::models::{
    AxfrRecord, HinfoEntry, LocEntry, NaptrEntry, NaptrRecord, ProbeOutcome, SshfpEntry, Target, TlsaEntry,
    looks_like_domain,
};
use crate::core::probes::Probe;
use crate::core::probes::dns_probes::domain_of;
use crate::core::probes::dnssec_probes::hex;
use crate::core::resolver::{DnsClient, trim_name};

/// Ports whose TLSA records are checked: SMTP, HTTPS, SMTPS, submission, IMAPS, POP3S.
const TLSA_PORTS: &[u16] = &[25, 443, 465, 587, 993, 995];
const CERT_DATA_PREVIEW: usize = 64;
/// RR type 29 has no dedicated variant in the resolver.
const LOC_TYPE: u16 = 29;
const DNS_PORT: u16 = 53;
const AXFR_NAMESERVERS: usize = 4;
const AXFR_MAX_NAMES: usize = 10_000;

macro_rules! record_probe {
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

record_probe!(
    /// DANE TLSA records for the usual mail and web ports.
    TlsaProbe
);
record_probe!(SshfpProbe);
record_probe!(
    /// HINFO records. Rare, and a leak of host details when present.
    HinfoProbe
);
record_probe!(
    /// NAPTR rewrite rules, sorted by order then preference.
    NaptrProbe
);
record_probe!(
    /// RFC 1876 LOC records decoded to degrees and meters.
    LocProbe
);

pub fn describe_tlsa(name: &str, usage: u8, selector: u8, matching: u8, data: &[u8]) -> TlsaEntry {
    let usage_desc = match usage {
        0 => "PKIX-TA (CA constraint)".to_string(),
        1 => "PKIX-EE (Service certificate)".to_string(),
        2 => "DANE-TA (Trust anchor)".to_string(),
        3 => "DANE-EE (Domain-issued)".to_string(),
        other => format!("Unknown ({other})"),
    };
    let selector_desc = match selector {
        0 => "Full certificate".to_string(),
        1 => "SubjectPublicKeyInfo".to_string(),
        other => format!("Unknown ({other})"),
    };
    let matching_desc = match matching {
        0 => "Exact match".to_string(),
        1 => "SHA-256 hash".to_string(),
        2 => "SHA-512 hash".to_string(),
        other => format!("Unknown ({other})"),
    };
    let mut certificate_data = hex(data);
    if certificate_data.len() > CERT_DATA_PREVIEW {
        certificate_data.truncate(CERT_DATA_PREVIEW);
        certificate_data.push_str("...");
    }
    TlsaEntry {
        name: name.to_string(),
        usage,
        usage_desc,
        selector,
        selector_desc,
        matching_type: matching,
        matching_desc,
        certificate_data,
        secure: matches!(usage, 2 | 3),
    }
}

#[async_trait]
impl Probe for TlsaProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let lookups = TLSA_PORTS.iter().map(|port| async move {
            let name = format!("_{port}._tcp.{domain}");
            let entries: Vec<TlsaEntry> = match self.dns.lookup(&name, RecordType::TLSA).await {
                Ok(Some(lookup)) => lookup
                    .iter()
                    .filter_map(|rdata| match rdata {
                        RData::TLSA(tlsa) => Some(describe_tlsa(
                            &name,
                            tlsa.cert_usage().into(),
                            tlsa.selector().into(),
                            tlsa.matching().into(),
                            tlsa.cert_data(),
                        )),
                        _ => None,
                    })
                    .collect(),
                Ok(None) => Vec::new(),
                Err(e) => {
                    debug!(name = %name, error = %e, "TLSA lookup failed.");
                    Vec::new()
                }
            };
            (format!("port_{port}"), entries)
        });
        let found: BTreeMap<String, Vec<TlsaEntry>> = futures::future::join_all(lookups)
            .await
            .into_iter()
            .filter(|(_, entries)| !entries.is_empty())
            .collect();
        Ok(ProbeOutcome::record(&found))
    }
}

pub fn describe_sshfp(algorithm: u8, fingerprint_type: u8, fingerprint: &[u8]) -> SshfpEntry {
    let algorithm_name = match algorithm {
        1 => "RSA".to_string(),
        2 => "DSA".to_string(),
        3 => "ECDSA".to_string(),
        4 => "Ed25519".to_string(),
        6 => "Ed448".to_string(),
        other => format!("Unknown ({other})"),
    };
    let fingerprint_type_name = match fingerprint_type {
        1 => "SHA-1".to_string(),
        2 => "SHA-256".to_string(),
        other => format!("Unknown ({other})"),
    };
    let fingerprint = fingerprint.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(":");
    SshfpEntry {
        algorithm,
        algorithm_name,
        fingerprint_type,
        fingerprint_type_name,
        fingerprint,
        secure: fingerprint_type == 2 && matches!(algorithm, 3 | 4 | 6),
    }
}

#[async_trait]
impl Probe for SshfpProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let Some(lookup) = self.dns.lookup(domain, RecordType::SSHFP).await? else {
            return Ok(ProbeOutcome::Empty);
        };
        let entries = lookup.iter().filter_map(|rdata| match rdata {
            RData::SSHFP(sshfp) => Some(describe_sshfp(
                sshfp.algorithm().into(),
                sshfp.fingerprint_type().into(),
                sshfp.fingerprint(),
            )),
            _ => None,
        });
        Ok(ProbeOutcome::list(entries))
    }
}

#[async_trait]
impl Probe for HinfoProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let Some(lookup) = self.dns.lookup(domain, RecordType::HINFO).await? else {
            return Ok(ProbeOutcome::Empty);
        };
        let entries: Vec<HinfoEntry> = lookup
            .iter()
            .filter_map(|rdata| match rdata {
                RData::HINFO(hinfo) => Some(HinfoEntry {
                    cpu: String::from_utf8_lossy(hinfo.cpu()).into_owned(),
                    os: String::from_utf8_lossy(hinfo.os()).into_owned(),
                    warning: "HINFO exposes system information".to_string(),
                }),
                _ => None,
            })
            .collect();
        if !entries.is_empty() {
            warn!(domain, count = entries.len(), "HINFO records published.");
        }
        Ok(ProbeOutcome::list(entries))
    }
}

pub fn naptr_service_type(service: &str) -> &'static str {
    let upper = service.to_ascii_uppercase();
    if upper.contains("SIP") {
        "SIP/VoIP"
    } else if upper.contains("E2U") {
        "ENUM (Phone Number)"
    } else if upper.contains("HTTP") {
        "HTTP Service"
    } else {
        "Unknown"
    }
}

pub fn describe_naptr(
    order: u16,
    preference: u16,
    flags: &[u8],
    service: &[u8],
    regexp: &[u8],
    replacement: &str,
) -> NaptrEntry {
    let service = String::from_utf8_lossy(service).into_owned();
    let regexp = String::from_utf8_lossy(regexp).into_owned();
    let replacement = trim_name(replacement);
    NaptrEntry {
        order,
        preference,
        flags: String::from_utf8_lossy(flags).into_owned(),
        service_type: naptr_service_type(&service).to_string(),
        service,
        regexp: (!regexp.is_empty()).then_some(regexp),
        replacement: (!replacement.is_empty()).then_some(replacement),
        priority_score: u32::from(order) * 1000 + u32::from(preference),
    }
}

/// Sorts entries by priority and collects replacement names for discovery.
pub fn naptr_record(mut records: Vec<NaptrEntry>) -> NaptrRecord {
    records.sort_by_key(|entry| entry.priority_score);
    let domains = records
        .iter()
        .filter_map(|entry| entry.replacement.clone())
        .filter(|name| looks_like_domain(name))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    NaptrRecord { records, domains }
}

#[async_trait]
impl Probe for NaptrProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let Some(lookup) = self.dns.lookup(domain, RecordType::NAPTR).await? else {
            return Ok(ProbeOutcome::Empty);
        };
        let records: Vec<NaptrEntry> = lookup
            .iter()
            .filter_map(|rdata| match rdata {
                RData::NAPTR(naptr) => Some(describe_naptr(
                    naptr.order(),
                    naptr.preference(),
                    naptr.flags(),
                    naptr.services(),
                    naptr.regexp(),
                    &naptr.replacement().to_string(),
                )),
                _ => None,
            })
            .collect();
        if records.is_empty() {
            return Ok(ProbeOutcome::Empty);
        }
        Ok(ProbeOutcome::record(&naptr_record(records)))
    }
}

/// Size and precision bytes: mantissa in the high nibble, power of ten in the low
/// one, in centimeters.
fn loc_meters(encoded: u8) -> f64 {
    let mantissa = f64::from(encoded >> 4);
    let exponent = i32::from(encoded & 0x0F);
    mantissa * 10f64.powi(exponent) / 100.0
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Splits an angle in thousandths of an arc-second, offset by 2^31, into
/// `(degrees, minutes, seconds, positive)`.
fn loc_angle(raw: u32) -> (u32, u32, f64, bool) {
    let offset = i64::from(raw) - (1i64 << 31);
    let positive = offset >= 0;
    let millis = offset.unsigned_abs();
    let degrees = millis / 3_600_000;
    let minutes = (millis % 3_600_000) / 60_000;
    let seconds = (millis % 60_000) as f64 / 1000.0;
    (degrees as u32, minutes as u32, seconds, positive)
}

/// Decodes version 0 LOC rdata (RFC 1876).
pub fn parse_loc(rdata: &[u8]) -> Option<LocEntry> {
    let [version, size, horizontal, vertical, rest @ ..] = rdata else { return None };
    if *version != 0 || rest.len() < 12 {
        return None;
    }
    let word = |at: usize| u32::from_be_bytes([rest[at], rest[at + 1], rest[at + 2], rest[at + 3]]);
    let (lat_deg, lat_min, lat_sec, north) = loc_angle(word(0));
    let (lon_deg, lon_min, lon_sec, east) = loc_angle(word(4));
    let altitude = f64::from(word(8)) / 100.0 - 100_000.0;

    let decimal = |deg: u32, min: u32, sec: f64, positive: bool| {
        let value = f64::from(deg) + f64::from(min) / 60.0 + sec / 3600.0;
        round_to(if positive { value } else { -value }, 6)
    };
    let latitude_decimal = decimal(lat_deg, lat_min, lat_sec, north);
    let longitude_decimal = decimal(lon_deg, lon_min, lon_sec, east);
    Some(LocEntry {
        latitude: format!("{lat_deg}°{lat_min}'{lat_sec:.3}\"{}", if north { 'N' } else { 'S' }),
        longitude: format!("{lon_deg}°{lon_min}'{lon_sec:.3}\"{}", if east { 'E' } else { 'W' }),
        latitude_decimal,
        longitude_decimal,
        altitude_m: round_to(altitude, 2),
        size_m: loc_meters(*size),
        horizontal_precision_m: loc_meters(*horizontal),
        vertical_precision_m: loc_meters(*vertical),
        maps_url: format!("https://www.google.com/maps?q={latitude_decimal},{longitude_decimal}"),
    })
}

#[async_trait]
impl Probe for LocProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let raw = self.dns.raw(domain, RecordType::from(LOC_TYPE)).await?;
        Ok(ProbeOutcome::list(raw.iter().filter_map(|rdata| parse_loc(rdata))))
    }
}

/// Attempts a full zone transfer from each authoritative nameserver.
pub struct AxfrProbe {
    dns: Arc<DnsClient>,
    timeout: Duration,
}

impl AxfrProbe {
    pub fn new(dns: Arc<DnsClient>, timeout: Duration) -> Self {
        Self { dns, timeout }
    }
}

pub fn axfr_query(zone: &str, id: u16) -> Result<Vec<u8>, ProbeError> {
    let name = Name::from_ascii(format!("{zone}.")).map_err(|e| ProbeError::Malformed(e.to_string()))?;
    let mut message = Message::new();
    message
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(false)
        .add_query(Query::query(name, RecordType::AXFR));
    message.to_vec().map_err(|e| ProbeError::Malformed(e.to_string()))
}

/// Owner names strictly inside `zone`, wildcards excluded.
pub fn zone_names(zone: &str, owners: impl IntoIterator<Item = String>) -> Vec<String> {
    let suffix = format!(".{zone}");
    owners
        .into_iter()
        .map(|owner| trim_name(&owner))
        .filter(|name| name.ends_with(&suffix) && !name.starts_with("*."))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

async fn transfer(ip: IpAddr, zone: &str, timeout: Duration) -> Result<(Vec<String>, usize), ProbeError> {
    let query = axfr_query(zone, rand::random())?;
    let mut stream = tokio::time::timeout(timeout, TcpStream::connect((ip, DNS_PORT))).await??;
    let length = u16::try_from(query.len()).map_err(|_| ProbeError::Malformed("oversized query".into()))?;
    stream.write_all(&length.to_be_bytes()).await?;
    stream.write_all(&query).await?;

    let mut owners = Vec::new();
    let mut soa_seen = 0;
    while soa_seen < 2 && owners.len() < AXFR_MAX_NAMES {
        let mut prefix = [0u8; 2];
        tokio::time::timeout(timeout, stream.read_exact(&mut prefix)).await??;
        let mut buffer = vec![0u8; usize::from(u16::from_be_bytes(prefix))];
        tokio::time::timeout(timeout, stream.read_exact(&mut buffer)).await??;

        let message = Message::from_vec(&buffer).map_err(|e| ProbeError::Malformed(e.to_string()))?;
        if message.response_code() != ResponseCode::NoError || message.answers().is_empty() {
            return Err(ProbeError::TransferRefused(ip.to_string()));
        }
        for record in message.answers() {
            if record.record_type() == RecordType::SOA {
                soa_seen += 1;
            }
            owners.push(record.name().to_string());
        }
    }
    let record_count = owners.len();
    Ok((zone_names(zone, owners), record_count))
}

#[async_trait]
impl Probe for AxfrProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let nameservers = self.dns.ns(domain).await?;
        let mut record = AxfrRecord { transferable_from: Vec::new(), record_count: 0, domains: Vec::new() };
        let mut domains = BTreeSet::new();

        for nameserver in nameservers.iter().take(AXFR_NAMESERVERS) {
            let Some(ip) = self.dns.ipv4(nameserver).await.unwrap_or_default().into_iter().next() else {
                continue;
            };
            match transfer(IpAddr::V4(ip), domain, self.timeout).await {
                Ok((names, count)) => {
                    warn!(domain, nameserver = %nameserver, records = count, "Zone transfer allowed.");
                    record.transferable_from.push(nameserver.clone());
                    record.record_count = record.record_count.max(count);
                    domains.extend(names);
                }
                Err(e) => debug!(domain, nameserver = %nameserver, error = %e, "Zone transfer refused."),
            }
        }
        if record.transferable_from.is_empty() {
            return Ok(ProbeOutcome::Empty);
        }
        record.domains = domains.into_iter().collect();
        info!(domain, names = record.domains.len(), "Zone transfer succeeded.");
        Ok(ProbeOutcome::record(&record))
    }
}
