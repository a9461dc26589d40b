// src/core/mod.rs

// The `mod.rs` file acts as the root of the `core` module, exposing its
// sub-modules to the crate and to the binary.

/// Scan settings, budget limits and their validation.
pub mod config;

/// The crawl controller, worker pool, dispatcher, aggregator and provider filter.
pub mod engine;

/// Error types for configuration, probes and exporters.
pub mod errors;

/// Targets, probe outcomes, scan state and the report document, plus the typed
/// records the built-in probes emit.
pub mod models;

/// The probe trait, the strategy identifiers and every built-in probe.
pub mod probes;

/// The scan-scoped DNS client.
pub mod resolver;

/// Built-in subdomain and SRV wordlists.
pub mod wordlists;
