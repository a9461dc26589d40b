// src/core/config.rs

use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;

use tracing::debug;

use crate::core::errors::ConfigError;
use crate::core::models::Target;
use crate::core::probes::Strategy;
use crate::core::wordlists;

pub const MAX_DEPTH: u32 = 10;
pub const MAX_THREADS: usize = 256;
pub const MAX_TIMEOUT_SECS: u64 = 30;
pub const MAX_NEIGHBOR_RANGE: u32 = 64;

/// Resolver timeouts a multi-query probe may spend collecting before it returns
/// what it has.
const COLLECTION_FACTOR: u32 = 10;
/// Extra resolver timeouts the dispatcher allows past the collection budget.
const DEADLINE_MARGIN_FACTOR: u32 = 3;

/// Limits that govern how far a scan is allowed to spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub max_depth: u32,
    pub max_results: usize,
    pub max_per_strategy: usize,
    pub threads: usize,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_results: 100,
            max_per_strategy: 50,
            threads: 30,
        }
    }
}

/// Auxiliary inputs for parameterized probes, resolved once per scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeParams {
    pub subdomain_words: Vec<String>,
    pub srv_services: Vec<String>,
    pub neighbor_range: u32,
}

impl Default for ProbeParams {
    fn default() -> Self {
        Self {
            subdomain_words: wordlists::subdomains_for(wordlists::SubdomainMode::Default),
            srv_services: wordlists::default_srv_services(),
            neighbor_range: 2,
        }
    }
}

/// Immutable settings for one scan invocation.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub seed: Target,
    pub budget: Budget,
    /// Per-call bound applied by the dispatcher and the resolver.
    pub probe_timeout: Duration,
    pub nameserver: Option<IpAddr>,
    pub disabled: HashSet<Strategy>,
    pub hidden_providers: Vec<String>,
    pub params: ProbeParams,
}

impl ScanConfig {
    /// Creates a configuration with default budget and parameters for `seed`.
    pub fn new(seed: &str) -> Result<Self, ConfigError> {
        let seed = Target::parse(seed).ok_or_else(|| ConfigError::InvalidTarget(seed.to_string()))?;
        Ok(Self {
            seed,
            budget: Budget::default(),
            probe_timeout: Duration::from_secs(2),
            nameserver: None,
            disabled: HashSet::new(),
            hidden_providers: Vec::new(),
            params: ProbeParams::default(),
        })
    }

    /// Wall-clock budget for probes that fan out over a wordlist or a service list.
    /// Findings gathered within it are returned even if queries remain.
    pub fn collection_budget(&self) -> Duration {
        self.probe_timeout * COLLECTION_FACTOR
    }

    /// Hard upper bound for one probe call. Always above the collection budget, so
    /// a probe that stops on its budget gets to hand back its partial results.
    pub fn probe_deadline(&self) -> Duration {
        self.collection_budget() + self.probe_timeout * DEADLINE_MARGIN_FACTOR
    }

    /// Checks every limit; the crawler refuses to start on an invalid configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let budget = &self.budget;
        if let Target::Domain(domain) = &self.seed {
            if !is_valid_hostname(domain) {
                return Err(ConfigError::InvalidTarget(domain.clone()));
            }
        }
        if budget.max_depth > MAX_DEPTH {
            return Err(ConfigError::InvalidDepth(budget.max_depth));
        }
        if budget.threads == 0 || budget.threads > MAX_THREADS {
            return Err(ConfigError::InvalidThreads(budget.threads));
        }
        if budget.max_results == 0 {
            return Err(ConfigError::InvalidBudget { name: "max_results" });
        }
        if budget.max_per_strategy == 0 {
            return Err(ConfigError::InvalidBudget { name: "max_per_strategy" });
        }
        let timeout = self.probe_timeout.as_secs();
        if self.probe_timeout.is_zero() || timeout > MAX_TIMEOUT_SECS {
            return Err(ConfigError::InvalidTimeout(timeout));
        }
        if self.params.neighbor_range > MAX_NEIGHBOR_RANGE {
            return Err(ConfigError::InvalidNeighborRange(self.params.neighbor_range));
        }
        debug!(seed = %self.seed, ?budget, disabled = self.disabled.len(), "Configuration validated.");
        Ok(())
    }
}

/// Letters, digits and hyphens in dot-separated labels of at most 63 characters.
/// Underscores are tolerated for service-style names.
fn is_valid_hostname(domain: &str) -> bool {
    domain.len() <= 253
        && domain.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ScanConfig::new("example.com").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.budget.max_depth, 2);
        assert_eq!(config.budget.max_per_strategy, 50);
        assert_eq!(config.collection_budget(), Duration::from_secs(20));
        assert_eq!(config.probe_deadline(), Duration::from_secs(26));
    }

    #[test]
    fn deadline_leaves_room_after_the_collection_budget() {
        let mut config = ScanConfig::new("example.com").unwrap();
        for secs in [1, 5, MAX_TIMEOUT_SECS] {
            config.probe_timeout = Duration::from_secs(secs);
            assert!(config.probe_deadline() >= config.collection_budget() + config.probe_timeout);
        }
    }

    #[test]
    fn rejects_bad_limits() {
        let mut config = ScanConfig::new("example.com").unwrap();
        config.budget.threads = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidThreads(0))));

        let mut config = ScanConfig::new("example.com").unwrap();
        config.budget.max_depth = MAX_DEPTH + 1;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidDepth(_))));

        let mut config = ScanConfig::new("example.com").unwrap();
        config.budget.max_results = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBudget { name: "max_results" })));

        let mut config = ScanConfig::new("example.com").unwrap();
        config.probe_timeout = Duration::ZERO;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout(0))));
    }

    #[test]
    fn rejects_malformed_seed() {
        assert!(ScanConfig::new("   ").is_err());
        let config = ScanConfig::new("exa mple.com").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTarget(_))));
        let config = ScanConfig::new("-bad.example.com").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn ip_seed_is_accepted() {
        let config = ScanConfig::new("192.0.2.7").unwrap();
        assert!(config.seed.is_ip());
        assert!(config.validate().is_ok());
    }

}
