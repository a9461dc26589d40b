// src/core/probes/http_probes.rs

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use tracing::{debug, info, warn};

use crate::core::errors::ProbeError;
use crate::core::models::{HeadersRecord, ProbeOutcome, SecurityTxtRecord, Target};
use crate::core::probes::Probe;

/// Security headers whose absence is reported.
const SECURITY_HEADERS: &[&str] = &[
    "strict-transport-security",
    "content-security-policy",
    "x-frame-options",
    "x-content-type-options",
];

/// Headers that leak infrastructure details (stack, CDN, proxies).
const INFRA_HEADERS: &[&str] = &[
    "server",
    "x-powered-by",
    "x-aspnet-version",
    "x-generator",
    "x-drupal-cache",
    "x-varnish",
    "via",
    "x-cache",
    "cf-ray",
    "x-amz-cf-id",
    "location",
];

/// Checks for the presence of a specific HTTP header in a `HeaderMap`.
///
/// # Arguments
/// * `headers` - The `HeaderMap` from the HTTP response.
/// * `name` - The name of the header to check (e.g., "content-security-policy").
///
/// # Returns
/// `Some(value)` when the header is present. Non-UTF-8 values are reported with a
/// placeholder so presence is still recorded.
fn check_header(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(name)?;
    match value.to_str() {
        Ok(s) => {
            debug!(header_name = name, value = s, "Header found.");
            Some(s.to_string())
        }
        Err(_) => {
            warn!(header_name = name, "Header found but contained invalid UTF-8.");
            Some("[Invalid UTF-8]".to_string())
        }
    }
}

/// Splits the interesting headers of a response into present and missing ones.
pub fn inspect_headers(url: &str, status: u16, headers: &HeaderMap) -> HeadersRecord {
    let mut present = BTreeMap::new();
    let mut missing = Vec::new();
    for name in SECURITY_HEADERS {
        match check_header(headers, name) {
            Some(value) => {
                present.insert(name.to_string(), value);
            }
            None => missing.push(name.to_string()),
        }
    }
    for name in INFRA_HEADERS {
        if let Some(value) = check_header(headers, name) {
            present.insert(name.to_string(), value);
        }
    }
    HeadersRecord {
        url: url.to_string(),
        status,
        server: present.get("server").cloned(),
        present,
        missing,
    }
}

/// Fetches `https://<domain>` and reports security and infrastructure headers.
pub struct HeadersProbe {
    client: reqwest::Client,
}

impl HeadersProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Probe for HeadersProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Target::Domain(domain) = target else { return Ok(ProbeOutcome::Empty) };
        let url = format!("https://{domain}");
        let response = self.client.get(&url).send().await?;
        let status = response.status().as_u16();
        info!(url = %url, status, "Received HTTP response for headers probe.");
        let record = inspect_headers(&url, status, response.headers());
        debug!(missing = record.missing.len(), "Headers probe finished.");
        Ok(ProbeOutcome::record(&record))
    }
}

/// Fetches `/.well-known/security.txt` and extracts contact fields.
pub struct SecurityTxtProbe {
    client: reqwest::Client,
}

impl SecurityTxtProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Probe for SecurityTxtProbe {
    async fn probe(&self, target: &Target, _depth: u32) -> Result<ProbeOutcome, ProbeError> {
        let Target::Domain(domain) = target else { return Ok(ProbeOutcome::Empty) };
        let url = format!("https://{domain}/.well-known/security.txt");
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            debug!(url = %url, status = %response.status(), "No security.txt published.");
            return Ok(ProbeOutcome::Empty);
        }
        let body = response.text().await?;
        match parse_security_txt(&url, &body) {
            Some(record) => Ok(ProbeOutcome::record(&record)),
            None => Ok(ProbeOutcome::Empty),
        }
    }
}

/// Parses an RFC 9116 document. Returns `None` when no `Contact:` field is present,
/// which filters out HTML error pages served with a 200 status.
pub fn parse_security_txt(url: &str, body: &str) -> Option<SecurityTxtRecord> {
    let mut record = SecurityTxtRecord { url: url.to_string(), contacts: Vec::new(), expires: None, policy: None };
    for line in body.lines().map(str::trim).filter(|l| !l.starts_with('#')) {
        let Some((field, value)) = line.split_once(':') else { continue };
        let value = value.trim().to_string();
        match field.trim().to_ascii_lowercase().as_str() {
            "contact" => record.contacts.push(value),
            "expires" => record.expires = Some(value),
            "policy" => record.policy = Some(value),
            _ => {}
        }
    }
    (!record.contacts.is_empty()).then_some(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderName, HeaderValue};

    #[test]
    fn missing_security_headers_are_listed() {
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("strict-transport-security"), HeaderValue::from_static("max-age=63072000"));
        headers.insert(HeaderName::from_static("server"), HeaderValue::from_static("nginx"));
        let record = inspect_headers("https://example.com", 200, &headers);
        assert_eq!(record.server.as_deref(), Some("nginx"));
        assert_eq!(record.present.len(), 2);
        assert_eq!(
            record.missing,
            vec!["content-security-policy", "x-frame-options", "x-content-type-options"]
        );
    }

    #[test]
    fn security_txt_fields() {
        let body = "# comment\nContact: mailto:security@example.com\nContact: https://example.com/report\nExpires: 2030-01-01T00:00:00.000Z\nPolicy: https://example.com/policy\n";
        let record = parse_security_txt("https://example.com/.well-known/security.txt", body).unwrap();
        assert_eq!(record.contacts.len(), 2);
        assert_eq!(record.contacts[0], "mailto:security@example.com");
        assert_eq!(record.expires.as_deref(), Some("2030-01-01T00:00:00.000Z"));
        assert_eq!(record.policy.as_deref(), Some("https://example.com/policy"));
    }

    #[test]
    fn html_page_is_not_a_security_txt() {
        assert!(parse_security_txt("u", "<html><body>Not found</body></html>").is_none());
    }
}
