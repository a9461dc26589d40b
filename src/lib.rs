// src/lib.rs

//! Recursive DNS reconnaissance.
//!
//! Starting from one domain or IP, the crawler runs every enabled probe, records what
//! it finds, and feeds newly discovered domains and addresses back in, level by level,
//! until the depth limit or the result budget stops it.

pub mod cli;
pub mod core;
pub mod export;
pub mod logging;

pub use crate::core::config::{Budget, ScanConfig};
pub use crate::core::engine::{CrawlOutcome, Crawler, scan};
pub use crate::core::models::{ProbeOutcome, ScanReport, Target};
pub use crate::core::probes::{FnProbe, Probe, ProbeRegistry, Strategy};
