// src/core/resolver.rs

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::lookup::Lookup;
use hickory_resolver::proto::rr::{RData, RecordType};
use tracing::{debug, info};

use crate::core::config::ScanConfig;

const DNS_PORT: u16 = 53;
const CACHE_SIZE: usize = 1024;

/// A DNS client owned by one scan session.
///
/// Holds the configured timeout, retry count and answer cache, so nothing leaks
/// between scans. Lookups that come back with no records resolve to empty vectors
/// rather than errors.
pub struct DnsClient {
    resolver: TokioAsyncResolver,
    /// Same upstream, but answers expire immediately. Used where repeated queries
    /// must reach the server.
    uncached: TokioAsyncResolver,
}

/// IPv4 answer together with the TTL the server gave it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressAnswer {
    pub ips: Vec<Ipv4Addr>,
    pub ttl: Option<u32>,
}

impl DnsClient {
    /// Builds a resolver from the scan configuration.
    ///
    /// # Arguments
    /// * `config` - Supplies the per-query timeout and an optional custom nameserver.
    pub fn from_config(config: &ScanConfig) -> Self {
        let resolver_config = match config.nameserver {
            Some(ip) => {
                info!(nameserver = %ip, "Using custom nameserver.");
                ResolverConfig::from_parts(
                    None,
                    Vec::new(),
                    NameServerConfigGroup::from_ips_clear(&[ip], DNS_PORT, true),
                )
            }
            None => ResolverConfig::default(),
        };

        let mut opts = ResolverOpts::default();
        opts.timeout = config.probe_timeout;
        opts.attempts = 1;
        opts.cache_size = CACHE_SIZE;

        let mut uncached_opts = opts.clone();
        uncached_opts.positive_max_ttl = Some(Duration::ZERO);
        uncached_opts.negative_max_ttl = Some(Duration::ZERO);

        debug!(timeout = ?config.probe_timeout, "Building DNS resolver.");
        Self {
            uncached: TokioAsyncResolver::tokio(resolver_config.clone(), uncached_opts),
            resolver: TokioAsyncResolver::tokio(resolver_config, opts),
        }
    }

    pub async fn ipv4(&self, name: &str) -> Result<Vec<Ipv4Addr>, ResolveError> {
        absent_as_empty(self.resolver.ipv4_lookup(name).await.map(|l| l.iter().map(|a| a.0).collect()))
    }

    /// IPv4 addresses with the answer TTL.
    pub async fn ipv4_with_ttl(&self, name: &str) -> Result<AddressAnswer, ResolveError> {
        address_answer(&self.resolver, name).await
    }

    /// Like [`DnsClient::ipv4_with_ttl`], bypassing the answer cache so repeated calls
    /// observe rotation.
    pub async fn ipv4_uncached(&self, name: &str) -> Result<AddressAnswer, ResolveError> {
        address_answer(&self.uncached, name).await
    }

    pub async fn ipv6(&self, name: &str) -> Result<Vec<Ipv6Addr>, ResolveError> {
        absent_as_empty(self.resolver.ipv6_lookup(name).await.map(|l| l.iter().map(|a| a.0).collect()))
    }

    /// Nameserver host names, normalized without trailing dot.
    pub async fn ns(&self, name: &str) -> Result<Vec<String>, ResolveError> {
        absent_as_empty(
            self.resolver
                .ns_lookup(name)
                .await
                .map(|l| l.iter().map(|ns| trim_name(&ns.0.to_string())).collect()),
        )
    }

    /// `(preference, exchange)` pairs.
    pub async fn mx(&self, name: &str) -> Result<Vec<(u16, String)>, ResolveError> {
        absent_as_empty(self.resolver.mx_lookup(name).await.map(|l| {
            l.iter()
                .map(|mx| (mx.preference(), trim_name(&mx.exchange().to_string())))
                .collect()
        }))
    }

    pub async fn txt(&self, name: &str) -> Result<Vec<String>, ResolveError> {
        absent_as_empty(
            self.resolver
                .txt_lookup(name)
                .await
                .map(|l| l.iter().map(|txt| txt.to_string().trim_matches('"').to_string()).collect()),
        )
    }

    pub async fn reverse(&self, ip: IpAddr) -> Result<Vec<String>, ResolveError> {
        absent_as_empty(
            self.resolver
                .reverse_lookup(ip)
                .await
                .map(|l| l.iter().map(|ptr| trim_name(&ptr.to_string())).collect()),
        )
    }

    /// Generic lookup for record types without a dedicated helper.
    pub async fn lookup(&self, name: &str, record_type: RecordType) -> Result<Option<Lookup>, ResolveError> {
        match self.resolver.lookup(name, record_type).await {
            Ok(lookup) => Ok(Some(lookup)),
            Err(e) if is_absent(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Rendered rdata for every record of `record_type`.
    pub async fn records(&self, name: &str, record_type: RecordType) -> Result<Vec<String>, ResolveError> {
        Ok(self
            .lookup(name, record_type)
            .await?
            .map(|lookup| lookup.iter().map(|rdata| rdata.to_string()).collect())
            .unwrap_or_default())
    }

    /// Undecoded rdata, for record types the resolver hands back as opaque bytes
    /// (DNSSEC types without validation support, LOC).
    pub async fn raw(&self, name: &str, record_type: RecordType) -> Result<Vec<Vec<u8>>, ResolveError> {
        Ok(self
            .lookup(name, record_type)
            .await?
            .map(|lookup| {
                lookup
                    .iter()
                    .filter_map(|rdata| match rdata {
                        RData::Unknown { rdata, .. } => Some(rdata.anything().to_vec()),
                        RData::NULL(null) => Some(null.anything().to_vec()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn inner(&self) -> &TokioAsyncResolver {
        &self.resolver
    }
}

/// Strips the trailing root dot and lowercases a DNS name.
pub fn trim_name(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

pub(crate) fn is_absent(error: &ResolveError) -> bool {
    matches!(error.kind(), ResolveErrorKind::NoRecordsFound { .. })
}

async fn address_answer(resolver: &TokioAsyncResolver, name: &str) -> Result<AddressAnswer, ResolveError> {
    match resolver.ipv4_lookup(name).await {
        Ok(lookup) => Ok(AddressAnswer {
            ttl: lookup.as_lookup().records().first().map(|record| record.ttl()),
            ips: lookup.iter().map(|a| a.0).collect(),
        }),
        Err(e) if is_absent(&e) => Ok(AddressAnswer::default()),
        Err(e) => Err(e),
    }
}

fn absent_as_empty<T>(result: Result<Vec<T>, ResolveError>) -> Result<Vec<T>, ResolveError> {
    match result {
        Err(e) if is_absent(&e) => Ok(Vec::new()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_lose_root_dot_and_case() {
        assert_eq!(trim_name("NS1.Example.COM."), "ns1.example.com");
        assert_eq!(trim_name("example.com"), "example.com");
    }

    #[tokio::test]
    async fn client_builds_from_config() {
        let mut config = ScanConfig::new("example.com").unwrap();
        config.nameserver = Some("192.0.2.53".parse().unwrap());
        let client = DnsClient::from_config(&config);
        let _ = client.inner();
    }
}
