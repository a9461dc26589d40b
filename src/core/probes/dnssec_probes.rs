// src/core/probes/dnssec_probes.rs

//! DNSSEC material: zone keys, delegation signers and denial-of-existence chains.
//!
//! The resolver is built without validation support, so these record types come
//! back as opaque rdata. The wire formats (RFC 4034, RFC 5155) are decoded here.

use std::sync::Arc;

use async_trait::async_trait;
use hickory_resolver::proto::rr::RecordType;
use tracing::{debug, info};

use crate::core::errors::ProbeError;
use crate::core::models::{
    DnskeyEntry, DnskeyRecord, DnssecRecord, DsEntry, NsecEntry, NsecRecord, Nsec3Entry, Nsec3ParamEntry,
    ProbeOutcome, Target,
};
use crate::core::probes::Probe;
use crate::core::probes::dns_probes::domain_of;
use crate::core::resolver::DnsClient;

/// Algorithms still considered safe for signing (RFC 8624).
const SECURE_ALGORITHMS: &[u8] = &[8, 10, 13, 14, 15, 16];
/// Digest types acceptable for DS records.
const SECURE_DIGESTS: &[u8] = &[2, 4];
const MAX_NSEC3_ITERATIONS: u16 = 100;
const PUBLIC_KEY_PREVIEW: usize = 64;
const NEXT_HASH_PREVIEW: usize = 32;
const SUMMARY_KEYS: usize = 3;
const SUMMARY_DS: usize = 2;

const FLAG_ZONE_KEY: u16 = 0x0100;
const FLAG_REVOKE: u16 = 0x0080;
const FLAG_SEP: u16 = 0x0001;

pub fn algorithm_name(algorithm: u8) -> String {
    match algorithm {
        3 => "DSA".to_string(),
        5 => "RSA/SHA-1".to_string(),
        6 => "DSA-NSEC3-SHA1".to_string(),
        7 => "RSASHA1-NSEC3-SHA1".to_string(),
        8 => "RSA/SHA-256".to_string(),
        10 => "RSA/SHA-512".to_string(),
        13 => "ECDSA P-256/SHA-256".to_string(),
        14 => "ECDSA P-384/SHA-384".to_string(),
        15 => "Ed25519".to_string(),
        16 => "Ed448".to_string(),
        other => format!("Unknown ({other})"),
    }
}

pub fn digest_type_name(digest_type: u8) -> String {
    match digest_type {
        1 => "SHA-1".to_string(),
        2 => "SHA-256".to_string(),
        3 => "GOST R 34.11-94".to_string(),
        4 => "SHA-384".to_string(),
        other => format!("Unknown ({other})"),
    }
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn preview(text: String, limit: usize) -> String {
    if text.len() > limit {
        format!("{}...", &text[..limit])
    } else {
        text
    }
}

fn u16_at(bytes: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_be_bytes([*bytes.get(at)?, *bytes.get(at + 1)?]))
}

/// Key tag over the full DNSKEY rdata (RFC 4034, Appendix B).
pub fn key_tag(rdata: &[u8]) -> u16 {
    // RSA/MD5 keys carry the tag in their last bytes.
    if rdata.get(3) == Some(&1) {
        let n = rdata.len();
        return if n >= 7 { u16::from_be_bytes([rdata[n - 3], rdata[n - 2]]) } else { 0 };
    }
    let mut acc: u32 = 0;
    for (i, byte) in rdata.iter().enumerate() {
        acc += if i & 1 == 1 { u32::from(*byte) } else { u32::from(*byte) << 8 };
    }
    acc += (acc >> 16) & 0xFFFF;
    (acc & 0xFFFF) as u16
}

/// Key size in bits. RSA keys are measured on the modulus (RFC 3110 layout),
/// curve keys report the curve size.
pub fn key_length_bits(algorithm: u8, key: &[u8]) -> Option<u32> {
    match algorithm {
        5 | 7 | 8 | 10 => {
            let (exponent_len, header) = match *key.first()? {
                0 => (usize::from(u16_at(key, 1)?), 3),
                n => (usize::from(n), 1),
            };
            let modulus = key.get(header + exponent_len..)?;
            let significant = modulus.iter().skip_while(|b| **b == 0).count();
            Some(significant as u32 * 8)
        }
        13 | 15 => Some(256),
        14 => Some(384),
        16 => Some(456),
        _ if key.is_empty() => None,
        _ => Some(key.len() as u32 * 8),
    }
}

pub fn parse_dnskey(rdata: &[u8]) -> Option<DnskeyEntry> {
    let flags = u16_at(rdata, 0)?;
    let protocol = *rdata.get(2)?;
    let algorithm = *rdata.get(3)?;
    let key = rdata.get(4..)?;

    let revoked = flags & FLAG_REVOKE != 0;
    let strong = SECURE_ALGORITHMS.contains(&algorithm);
    let warning = if revoked {
        Some("Key is revoked".to_string())
    } else if !strong {
        Some(format!("Algorithm {} is deprecated or weak", algorithm_name(algorithm)))
    } else {
        None
    };
    Some(DnskeyEntry {
        flags,
        protocol,
        algorithm,
        algorithm_name: algorithm_name(algorithm),
        key_type: if flags & FLAG_SEP != 0 { "KSK" } else { "ZSK" }.to_string(),
        is_zone_key: flags & FLAG_ZONE_KEY != 0,
        revoked,
        key_tag: key_tag(rdata),
        key_length_bits: key_length_bits(algorithm, key),
        public_key: preview(hex(key), PUBLIC_KEY_PREVIEW),
        secure: strong && !revoked,
        warning,
    })
}

pub fn parse_ds(rdata: &[u8]) -> Option<DsEntry> {
    let key_tag = u16_at(rdata, 0)?;
    let algorithm = *rdata.get(2)?;
    let digest_type = *rdata.get(3)?;
    let digest = rdata.get(4..)?;

    let strong_algorithm = SECURE_ALGORITHMS.contains(&algorithm);
    let strong_digest = SECURE_DIGESTS.contains(&digest_type);
    let warning = if !strong_digest {
        Some(format!("Digest {} is deprecated", digest_type_name(digest_type)))
    } else if !strong_algorithm {
        Some(format!("Algorithm {} is deprecated or weak", algorithm_name(algorithm)))
    } else {
        None
    };
    Some(DsEntry {
        key_tag,
        algorithm,
        algorithm_name: algorithm_name(algorithm),
        digest_type,
        digest_type_name: digest_type_name(digest_type),
        digest: hex(digest),
        secure: strong_algorithm && strong_digest,
        warning,
    })
}

/// Reads an uncompressed wire-format name, returning it with the bytes consumed.
fn read_name(bytes: &[u8]) -> Option<(String, usize)> {
    let mut labels = Vec::new();
    let mut at = 0;
    loop {
        let len = usize::from(*bytes.get(at)?);
        at += 1;
        if len == 0 {
            break;
        }
        // Compression pointers are not allowed in this rdata.
        if len & 0xC0 != 0 {
            return None;
        }
        let label = bytes.get(at..at + len)?;
        labels.push(String::from_utf8_lossy(label).to_ascii_lowercase());
        at += len;
    }
    Some((labels.join("."), at))
}

fn type_name(code: u16) -> String {
    match RecordType::from(code) {
        RecordType::Unknown(code) => format!("TYPE{code}"),
        known => known.to_string(),
    }
}

/// Record types listed in an NSEC/NSEC3 type bitmap (RFC 4034, section 4.1.2).
pub fn type_bitmap(mut bytes: &[u8]) -> Vec<String> {
    let mut types = Vec::new();
    while let [window, len, rest @ ..] = bytes {
        let len = usize::from(*len);
        let Some(map) = rest.get(..len) else { break };
        for (i, byte) in map.iter().enumerate() {
            for bit in 0..8u16 {
                if byte & (0x80 >> bit) != 0 {
                    types.push(type_name((u16::from(*window) << 8) | (i as u16 * 8 + bit)));
                }
            }
        }
        bytes = &rest[len..];
    }
    types
}

pub fn parse_nsec(rdata: &[u8]) -> Option<NsecEntry> {
    let (next_domain, used) = read_name(rdata)?;
    Some(NsecEntry { next_domain, record_types: type_bitmap(rdata.get(used..)?) })
}

/// Extended hex alphabet base32 without padding (RFC 4648, section 7), as used
/// for NSEC3 owner names.
pub fn base32hex(bytes: &[u8]) -> String {
    const ALPHABET: &[u8; 32] = b"0123456789abcdefghijklmnopqrstuv";
    let mut out = String::with_capacity(bytes.len() * 8 / 5 + 1);
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for byte in bytes {
        buffer = (buffer << 8) | u32::from(*byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(char::from(ALPHABET[((buffer >> bits) & 0x1F) as usize]));
        }
        buffer &= (1 << bits) - 1;
    }
    if bits > 0 {
        out.push(char::from(ALPHABET[((buffer << (5 - bits)) & 0x1F) as usize]));
    }
    out
}

fn salt_text(salt: &[u8]) -> String {
    if salt.is_empty() { "none".to_string() } else { hex(salt) }
}

pub fn parse_nsec3(rdata: &[u8]) -> Option<Nsec3Entry> {
    let algorithm = *rdata.first()?;
    let flags = *rdata.get(1)?;
    let iterations = u16_at(rdata, 2)?;
    let salt_len = usize::from(*rdata.get(4)?);
    let salt = rdata.get(5..5 + salt_len)?;
    let hash_at = 5 + salt_len;
    let hash_len = usize::from(*rdata.get(hash_at)?);
    let next_hash = rdata.get(hash_at + 1..hash_at + 1 + hash_len)?;
    let record_types = type_bitmap(rdata.get(hash_at + 1 + hash_len..)?);

    let opt_out = flags & 0x01 != 0;
    let warning = if iterations > MAX_NSEC3_ITERATIONS {
        Some(format!("High iteration count ({iterations}) adds resolver load"))
    } else if opt_out {
        Some("Opt-out leaves unsigned delegations unauthenticated".to_string())
    } else {
        None
    };
    Some(Nsec3Entry {
        algorithm,
        algorithm_name: if algorithm == 1 { "SHA-1".to_string() } else { format!("Unknown ({algorithm})") },
        flags,
        opt_out,
        iterations,
        salt: salt_text(salt),
        next_hash: preview(base32hex(next_hash), NEXT_HASH_PREVIEW),
        record_types,
        secure: iterations <= MAX_NSEC3_ITERATIONS && !opt_out,
        warning,
    })
}

pub fn parse_nsec3param(rdata: &[u8]) -> Option<Nsec3ParamEntry> {
    let salt_len = usize::from(*rdata.get(4)?);
    Some(Nsec3ParamEntry {
        algorithm: *rdata.first()?,
        flags: *rdata.get(1)?,
        iterations: u16_at(rdata, 2)?,
        salt: salt_text(rdata.get(5..5 + salt_len)?),
    })
}

/// Splits parsed keys into key-signing and zone-signing sets.
pub fn split_keys(keys: Vec<DnskeyEntry>) -> DnskeyRecord {
    let (ksk_keys, zsk_keys): (Vec<_>, Vec<_>) = keys.into_iter().partition(|key| key.key_type == "KSK");
    DnskeyRecord { ksk_keys, zsk_keys }
}

/// Combines the denial-of-existence records published at a zone apex.
pub fn assess_nsec(
    domain: &str,
    nsec: Option<NsecEntry>,
    nsec3: Vec<Nsec3Entry>,
    nsec3param: Option<Nsec3ParamEntry>,
) -> NsecRecord {
    let mut record = NsecRecord { enumerable: nsec.is_some(), ..NsecRecord::default() };
    if let Some(entry) = &nsec {
        record
            .warnings
            .push("NSEC allows zone walking: every name in the zone can be enumerated".to_string());
        let suffix = format!(".{domain}");
        if entry.next_domain.ends_with(&suffix) {
            record.domains.push(entry.next_domain.clone());
        }
    }
    record.warnings.extend(nsec3.iter().filter_map(|entry| entry.warning.clone()));
    record.nsec = nsec;
    record.nsec3 = nsec3;
    record.nsec3param = nsec3param;
    record
}

macro_rules! dnssec_probe {
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

dnssec_probe!(
    /// Summary of the zone's signing state: a few keys, the parent's DS records and
    /// whether the two match up.
    DnssecProbe
);
dnssec_probe!(
    /// Every published DNSKEY with its tag, size and strength.
    DnskeyProbe
);
dnssec_probe!(DsProbe);
dnssec_probe!(
    /// NSEC, NSEC3 and NSEC3PARAM at the apex, assessed for zone-walking exposure.
    NsecProbe
);

async fn parsed<T>(
    dns: &DnsClient,
    name: &str,
    record_type: RecordType,
    parse: fn(&[u8]) -> Option<T>,
) -> Result<Vec<T>, ProbeError> {
    let raw = dns.raw(name, record_type).await?;
    let total = raw.len();
    let entries: Vec<T> = raw.iter().filter_map(|rdata| parse(rdata)).collect();
    if entries.len() < total {
        debug!(name, record_type = %record_type, skipped = total - entries.len(), "Skipped undecodable rdata.");
    }
    Ok(entries)
}

#[async_trait]
impl Probe for DnssecProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let (keys, ds) = tokio::join!(
            parsed(&self.dns, domain, RecordType::DNSKEY, parse_dnskey),
            parsed(&self.dns, domain, RecordType::DS, parse_ds),
        );
        let keys = keys.unwrap_or_default();
        let ds = ds.unwrap_or_default();
        if keys.is_empty() && ds.is_empty() {
            debug!(domain, "Zone is not signed.");
            return Ok(ProbeOutcome::Empty);
        }
        let chain_of_trust = ds
            .iter()
            .any(|d| keys.iter().any(|k| k.key_type == "KSK" && k.key_tag == d.key_tag));
        info!(domain, keys = keys.len(), ds = ds.len(), chain_of_trust, "DNSSEC material found.");
        Ok(ProbeOutcome::record(&DnssecRecord {
            enabled: true,
            chain_of_trust,
            dnskey: keys.into_iter().take(SUMMARY_KEYS).collect(),
            ds: ds.into_iter().take(SUMMARY_DS).collect(),
        }))
    }
}

#[async_trait]
impl Probe for DnskeyProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let keys = parsed(&self.dns, domain, RecordType::DNSKEY, parse_dnskey).await?;
        Ok(ProbeOutcome::record(&split_keys(keys)))
    }
}

#[async_trait]
impl Probe for DsProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        Ok(ProbeOutcome::list(parsed(&self.dns, domain, RecordType::DS, parse_ds).await?))
    }
}

#[async_trait]
impl Probe for NsecProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Some(domain) = domain_of(target) else { return Ok(ProbeOutcome::Empty) };
        let (nsec, nsec3, param) = tokio::join!(
            parsed(&self.dns, domain, RecordType::NSEC, parse_nsec),
            parsed(&self.dns, domain, RecordType::NSEC3, parse_nsec3),
            parsed(&self.dns, domain, RecordType::NSEC3PARAM, parse_nsec3param),
        );
        let nsec = nsec.unwrap_or_default().into_iter().next();
        let nsec3 = nsec3.unwrap_or_default();
        let param = param.unwrap_or_default().into_iter().next();
        if nsec.is_none() && nsec3.is_empty() && param.is_none() {
            return Ok(ProbeOutcome::Empty);
        }
        Ok(ProbeOutcome::record(&assess_nsec(domain, nsec, nsec3, param)))
    }
}
