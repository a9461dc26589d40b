// src/core/errors.rs

use std::path::PathBuf;

use hickory_resolver::error::ResolveError;
use thiserror::Error;

/// Invalid scan settings. Always raised before any crawl work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid target '{0}': expected a domain name or an IP address")]
    InvalidTarget(String),
    #[error("depth {0} is out of range (0..={max})", max = crate::core::config::MAX_DEPTH)]
    InvalidDepth(u32),
    #[error("thread count {0} is out of range (1..={max})", max = crate::core::config::MAX_THREADS)]
    InvalidThreads(usize),
    #[error("{name} must be at least 1")]
    InvalidBudget { name: &'static str },
    #[error("probe timeout of {0}s is out of range (1..={max})", max = crate::core::config::MAX_TIMEOUT_SECS)]
    InvalidTimeout(u64),
    #[error("neighbor range {0} is out of range (0..={max})", max = crate::core::config::MAX_NEIGHBOR_RANGE)]
    InvalidNeighborRange(u32),
    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),
    #[error("could not read wordlist {path}: {source}")]
    Wordlist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure inside a single probe. The dispatcher turns every one of these into an
/// empty outcome, so they never reach the crawl controller.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("DNS error: {0}")]
    Resolve(#[from] ResolveError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("TLS error: {0}")]
    Tls(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("zone transfer refused by {0}")]
    TransferRefused(String),
    #[error("timed out")]
    Timeout(#[from] tokio::time::error::Elapsed),
}

/// Failure while writing one report format.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}
