// src/core/probes/mod.rs

//! The probe collection and the registry that maps strategy identifiers to probes.
//!
//! Every probe is an independent unit: it receives one target and returns a
//! `ProbeOutcome`, or an error that the dispatcher absorbs. Parameters a probe
//! needs (wordlists, ranges, clients) are bound into it when the registry is built.

pub mod cert_probe;
pub mod dns_probes;
pub mod dnssec_probes;
pub mod heuristics;
pub mod http_probes;
pub mod infra_probes;
pub mod ip_probes;
pub mod record_probes;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::core::config::ScanConfig;
use crate::core::errors::ProbeError;
use crate::core::models::{ProbeOutcome, Target};
use crate::core::resolver::DnsClient;

/// Identifier of every strategy the mapper knows about.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
    Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Strategy {
    // core records
    A,
    Aaaa,
    Ns,
    Soa,
    Mx,
    Cname,
    Txt,
    Ttl,
    // DNSSEC
    Dnssec,
    Dnskey,
    Ds,
    Nsec,
    // other record types
    Tlsa,
    Sshfp,
    Hinfo,
    Naptr,
    Loc,
    Axfr,
    // email security
    Spf,
    Dmarc,
    Dkim,
    Bimi,
    MtaSts,
    MailBlacklist,
    // certificates and services
    Caa,
    Srv,
    Certificate,
    // discovery
    Subdomains,
    Wildcard,
    CrawlTld,
    // web
    HttpHeaders,
    SecurityTxt,
    // infrastructure
    Anycast,
    Loadbalancer,
    CdnEnhanced,
    DomainAge,
    // IP targets
    Geolocation,
    Ptr,
    #[strum(to_string = "reverse_dns", serialize = "reverse")]
    ReverseDns,
    IpNeighbors,
}

/// Which kind of target a strategy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Domain,
    Ip,
}

impl Strategy {
    pub fn scope(self) -> Scope {
        match self {
            Strategy::Geolocation | Strategy::Ptr | Strategy::ReverseDns | Strategy::IpNeighbors => Scope::Ip,
            _ => Scope::Domain,
        }
    }

    pub fn for_scope(scope: Scope) -> impl Iterator<Item = Strategy> {
        Strategy::iter().filter(move |s| s.scope() == scope)
    }
}

/// A single reconnaissance capability.
///
/// Implementations return `Ok(ProbeOutcome::Empty)` when there is simply nothing to
/// report, and `Err` for genuine failures.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, target: &Target, depth: u32) -> Result<ProbeOutcome, ProbeError>;
}

/// Adapts an async closure into a `Probe`.
pub struct FnProbe<F>(F);

impl<F> FnProbe<F> {
    pub fn new<Fut>(f: F) -> Self
    where
        F: Fn(Target, u32) -> Fut + Send + Sync,
        Fut: Future<Output = Result<ProbeOutcome, ProbeError>> + Send,
    {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> Probe for FnProbe<F>
where
    F: Fn(Target, u32) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ProbeOutcome, ProbeError>> + Send,
{
    async fn probe(&self, target: &Target, depth: u32) -> Result<ProbeOutcome, ProbeError> {
        (self.0)(target.clone(), depth).await
    }
}

/// Fixed mapping from strategy to probe for one scan.
#[derive(Clone, Default)]
pub struct ProbeRegistry {
    probes: BTreeMap<Strategy, Arc<dyn Probe>>,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the full built-in probe set.
    ///
    /// # Arguments
    /// * `dns` - The scan's resolver, shared by every DNS probe.
    /// * `http` - Client for the web probes.
    /// * `config` - Supplies the wordlists and ranges bound into the parameterized
    ///   probes, and the collection budget for the ones that fan out.
    pub fn standard(dns: Arc<DnsClient>, http: reqwest::Client, config: &ScanConfig) -> Self {
        use dns_probes::*;
        use dnssec_probes::*;
        use infra_probes::*;
        use ip_probes::*;
        use record_probes::*;

        let params = &config.params;
        let budget = config.collection_budget();
        let mut registry = Self::new();
        registry
            .register(Strategy::A, ARecordProbe::new(dns.clone()))
            .register(Strategy::Aaaa, AaaaProbe::new(dns.clone()))
            .register(Strategy::Ns, NsProbe::new(dns.clone()))
            .register(Strategy::Soa, SoaProbe::new(dns.clone()))
            .register(Strategy::Mx, MxProbe::new(dns.clone()))
            .register(Strategy::Cname, CnameProbe::new(dns.clone()))
            .register(Strategy::Txt, TxtProbe::new(dns.clone()))
            .register(Strategy::Ttl, TtlProbe::new(dns.clone()))
            .register(Strategy::Dnssec, DnssecProbe::new(dns.clone()))
            .register(Strategy::Dnskey, DnskeyProbe::new(dns.clone()))
            .register(Strategy::Ds, DsProbe::new(dns.clone()))
            .register(Strategy::Nsec, NsecProbe::new(dns.clone()))
            .register(Strategy::Tlsa, TlsaProbe::new(dns.clone()))
            .register(Strategy::Sshfp, SshfpProbe::new(dns.clone()))
            .register(Strategy::Hinfo, HinfoProbe::new(dns.clone()))
            .register(Strategy::Naptr, NaptrProbe::new(dns.clone()))
            .register(Strategy::Loc, LocProbe::new(dns.clone()))
            .register(Strategy::Axfr, AxfrProbe::new(dns.clone(), config.probe_timeout))
            .register(Strategy::Spf, SpfProbe::new(dns.clone()))
            .register(Strategy::Dmarc, DmarcProbe::new(dns.clone()))
            .register(Strategy::Dkim, DkimProbe::new(dns.clone(), budget))
            .register(Strategy::Bimi, PolicyTxtProbe::bimi(dns.clone()))
            .register(Strategy::MtaSts, PolicyTxtProbe::mta_sts(dns.clone()))
            .register(Strategy::MailBlacklist, MailBlacklistProbe::new(dns.clone(), budget))
            .register(Strategy::Caa, CaaProbe::new(dns.clone()))
            .register(Strategy::Srv, SrvProbe::new(dns.clone(), params.srv_services.clone(), budget))
            .register(Strategy::Subdomains, SubdomainProbe::new(dns.clone(), params.subdomain_words.clone(), budget))
            .register(Strategy::Wildcard, WildcardProbe::new(dns.clone()))
            .register(Strategy::CrawlTld, heuristics::CrawlTldProbe)
            .register(Strategy::HttpHeaders, http_probes::HeadersProbe::new(http.clone()))
            .register(Strategy::SecurityTxt, http_probes::SecurityTxtProbe::new(http))
            .register(Strategy::Anycast, AnycastProbe::new(dns.clone()))
            .register(Strategy::Loadbalancer, LoadBalancerProbe::new(dns.clone(), budget))
            .register(Strategy::CdnEnhanced, CdnProbe::new(dns.clone()))
            .register(Strategy::DomainAge, DomainAgeProbe::new(dns.clone()))
            .register(Strategy::Certificate, cert_probe::CertificateProbe)
            .register(Strategy::Geolocation, GeolocationProbe::new(dns.clone()))
            .register(Strategy::Ptr, PtrProbe::new(dns.clone()))
            .register(Strategy::ReverseDns, ReverseDnsProbe::new(dns))
            .register(Strategy::IpNeighbors, NeighborsProbe::new(params.neighbor_range));
        registry
    }

    pub fn register(&mut self, strategy: Strategy, probe: impl Probe + 'static) -> &mut Self {
        self.probes.insert(strategy, Arc::new(probe));
        self
    }

    pub fn get(&self, strategy: Strategy) -> Option<&Arc<dyn Probe>> {
        self.probes.get(&strategy)
    }

    /// Registered strategies for `scope`, in identifier order.
    pub fn strategies(&self, scope: Scope) -> Vec<Strategy> {
        self.probes.keys().copied().filter(|s| s.scope() == scope).collect()
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_ids_round_trip_through_text() {
        assert_eq!("mta_sts".parse::<Strategy>().unwrap(), Strategy::MtaSts);
        assert_eq!("MX".parse::<Strategy>().unwrap(), Strategy::Mx);
        assert_eq!("reverse".parse::<Strategy>().unwrap(), Strategy::ReverseDns);
        assert_eq!(Strategy::ReverseDns.to_string(), "reverse_dns");
        assert_eq!(Strategy::CrawlTld.to_string(), "crawl_tld");
        assert_eq!("cdn_enhanced".parse::<Strategy>().unwrap(), Strategy::CdnEnhanced);
        assert_eq!(Strategy::Loadbalancer.to_string(), "loadbalancer");
        assert_eq!(Strategy::MailBlacklist.to_string(), "mail_blacklist");
        assert!("nope".parse::<Strategy>().is_err());
    }

    #[test]
    fn scopes_split_ip_probes_out() {
        let ip: Vec<Strategy> = Strategy::for_scope(Scope::Ip).collect();
        assert_eq!(
            ip,
            vec![Strategy::Geolocation, Strategy::Ptr, Strategy::ReverseDns, Strategy::IpNeighbors]
        );
        assert!(Strategy::for_scope(Scope::Domain).all(|s| s.scope() == Scope::Domain));
    }

    #[test]
    fn serde_names_match_cli_names() {
        let json = serde_json::to_string(&Strategy::HttpHeaders).unwrap();
        assert_eq!(json, "\"http_headers\"");
    }

    #[tokio::test]
    async fn standard_registry_covers_every_strategy() {
        let config = ScanConfig::new("example.com").unwrap();
        let dns = Arc::new(DnsClient::from_config(&config));
        let registry = ProbeRegistry::standard(dns, reqwest::Client::new(), &config);
        assert!(Strategy::iter().all(|s| registry.get(s).is_some()));
        assert_eq!(registry.len(), Strategy::iter().count());
    }

    #[tokio::test]
    async fn registry_routes_to_registered_probe() {
        let mut registry = ProbeRegistry::new();
        registry.register(
            Strategy::Txt,
            FnProbe::new(|target: Target, _depth| async move { Ok(ProbeOutcome::list([target.to_string()])) }),
        );
        assert_eq!(registry.strategies(Scope::Domain), vec![Strategy::Txt]);
        assert!(registry.strategies(Scope::Ip).is_empty());

        let probe = registry.get(Strategy::Txt).unwrap();
        let target = Target::Domain("example.com".to_string());
        let outcome = probe.probe(&target, 0).await.unwrap();
        assert_eq!(outcome, ProbeOutcome::list(["example.com"]));
    }
}
