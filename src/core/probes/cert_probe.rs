// src/core/probes/cert_probe.rs

use std::collections::BTreeSet;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use native_tls::TlsConnector;
use tokio::task::spawn_blocking;
use tracing::{debug, error, info};
use x509_parser::prelude::*;

use crate::core::errors::ProbeError;
use crate::core::models::{CertificateRecord, ProbeOutcome, Target};
use crate::core::probes::Probe;

const TLS_PORT: u16 = 443;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Reads the certificate presented on port 443 and turns its SAN DNS names into
/// discovered domains.
pub struct CertificateProbe;

#[async_trait]
impl Probe for CertificateProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Target::Domain(domain) = target else { return Ok(ProbeOutcome::Empty) };
        let target_owned = domain.clone();

        debug!(target = %domain, "Spawning blocking task for TLS connection.");
        let record = spawn_blocking(move || perform_tls_handshake(&target_owned)).await??;
        match record {
            Some(record) => {
                info!(
                    subject = %record.subject_name,
                    sans = record.domains.len(),
                    "Successfully parsed certificate."
                );
                Ok(ProbeOutcome::record(&record))
            }
            None => Ok(ProbeOutcome::Empty),
        }
    }
}

fn perform_tls_handshake(target: &str) -> Result<Option<CertificateRecord>, ProbeError> {
    let connector = TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .build()
        .map_err(|e| {
            error!(error = %e, "Failed to create TlsConnector");
            ProbeError::Tls(format!("TlsConnector Error: {e}"))
        })?;

    let addr = (target, TLS_PORT)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| ProbeError::Malformed(format!("{target} has no socket address")))?;
    debug!(target, %addr, "Connecting TCP stream to port 443.");
    let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
    stream.set_read_timeout(Some(CONNECT_TIMEOUT))?;
    stream.set_write_timeout(Some(CONNECT_TIMEOUT))?;

    let stream = connector
        .connect(target, stream)
        .map_err(|e| ProbeError::Tls(format!("TLS Handshake Error: {e}")))?;

    let Some(cert) = stream
        .peer_certificate()
        .map_err(|e| ProbeError::Tls(format!("Could not get peer certificate: {e}")))?
    else {
        debug!(target, "TLS connection successful, but no peer certificate provided.");
        return Ok(None);
    };

    let cert_der = cert
        .to_der()
        .map_err(|e| ProbeError::Tls(format!("Could not convert certificate to DER: {e}")))?;
    certificate_record(target, &cert_der).map(Some)
}

/// Extracts subject, issuer, validity and SAN DNS names from a DER certificate.
pub fn certificate_record(target: &str, cert_der: &[u8]) -> Result<CertificateRecord, ProbeError> {
    let (_, x509) = parse_x509_certificate(cert_der)
        .map_err(|e| ProbeError::Malformed(format!("X.509 Parse Error: {e}")))?;

    let validity = x509.validity();
    let not_after = asn1_time_to_chrono_utc(&validity.not_after);
    let not_before = asn1_time_to_chrono_utc(&validity.not_before);
    let now = Utc::now();

    let mut domains = BTreeSet::new();
    if let Ok(Some(san)) = x509.subject_alternative_name() {
        for name in &san.value.general_names {
            if let GeneralName::DNSName(dns) = name {
                let dns = dns.trim_start_matches("*.").to_ascii_lowercase();
                if dns != target {
                    domains.insert(dns);
                }
            }
        }
    }

    Ok(CertificateRecord {
        subject_name: x509.subject().to_string(),
        issuer_name: x509.issuer().to_string(),
        not_before,
        not_after,
        days_until_expiry: not_after.signed_duration_since(now).num_days(),
        is_valid: now > not_before && now < not_after,
        domains: domains.into_iter().collect(),
    })
}

fn asn1_time_to_chrono_utc(time: &ASN1Time) -> DateTime<Utc> {
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_der_is_malformed() {
        let err = certificate_record("example.com", &[0x30, 0x03, 0x01]).unwrap_err();
        assert!(matches!(err, ProbeError::Malformed(_)));
    }

    #[tokio::test]
    async fn ip_targets_are_skipped() {
        let target = Target::Ip("192.0.2.1".parse().unwrap());
        assert_eq!(CertificateProbe.probe(&target, 0).await.unwrap(), ProbeOutcome::Empty);
    }
}
