// src/cli.rs

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use strum::IntoEnumIterator;
use tracing::debug;
use url::Url;

use crate::core::config::ScanConfig;
use crate::core::errors::ConfigError;
use crate::core::probes::Strategy;
use crate::core::wordlists::{self, SubdomainMode};
use crate::export::ExportFormat;

/// Strategies skipped by `--fast`.
const FAST_DISABLED: &[Strategy] = &[Strategy::Subdomains, Strategy::IpNeighbors, Strategy::Srv, Strategy::Axfr];

#[derive(Debug, Parser)]
#[command(name = "vanguard-dns-mapper", version)]
#[command(about = "Recursive DNS reconnaissance: maps the domains and IPs around a target.")]
#[command(after_help = "Examples:\n  \
    vanguard-dns-mapper example.com                    # Basic scan\n  \
    vanguard-dns-mapper example.com -o report.html     # HTML output\n  \
    vanguard-dns-mapper example.com --fast             # Quick mode\n  \
    vanguard-dns-mapper example.com --enable-only a,mx # Only A and MX records\n  \
    vanguard-dns-mapper example.com --disable mx,srv   # Skip MX and SRV")]
pub struct Cli {
    /// Domain, URL or IP address to analyze (e.g., example.com)
    pub target: String,

    /// Output file (format auto-detected from .json/.html/.md)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Force the output format
    #[arg(short, long, value_enum)]
    pub format: Option<ExportFormat>,
    /// Write dns_map.{json,html,md} into report_<domain>/
    #[arg(long)]
    pub export_all: bool,

    /// Recursion depth
    #[arg(short, long, default_value_t = 2)]
    pub depth: u32,
    /// Stop expanding once this many results are recorded
    #[arg(long, default_value_t = 100)]
    pub max_results: usize,
    /// Entries kept per list result, and targets per level batch
    #[arg(long, default_value_t = 50)]
    pub max_per_strategy: usize,

    /// Run ONLY these strategies (e.g., "a,mx,ns,txt")
    #[arg(long, value_delimiter = ',', help_heading = "Strategy selection")]
    pub enable_only: Vec<String>,
    /// Skip these strategies (e.g., "srv,ip_neighbors")
    #[arg(long, value_delimiter = ',', help_heading = "Strategy selection")]
    pub disable: Vec<String>,

    /// Fast mode: depth=1, max=50, 20 threads, skip slow strategies
    #[arg(long, conflicts_with = "thorough", help_heading = "Scan modes")]
    pub fast: bool,
    /// Thorough mode: depth=3, max=500, 50 threads, full subdomain list
    #[arg(long, help_heading = "Scan modes")]
    pub thorough: bool,

    /// Targets processed concurrently per level
    #[arg(long, default_value_t = 30, help_heading = "Advanced")]
    pub threads: usize,
    /// DNS timeout in seconds
    #[arg(long, default_value_t = 2, help_heading = "Advanced")]
    pub timeout: u64,
    /// Custom DNS server IP
    #[arg(long, help_heading = "Advanced")]
    pub nameserver: Option<IpAddr>,
    /// Custom subdomain wordlist file
    #[arg(long, help_heading = "Advanced")]
    pub subdomain_wordlist: Option<PathBuf>,
    /// Custom SRV services file
    #[arg(long, help_heading = "Advanced")]
    pub srv_services: Option<PathBuf>,
    /// Size of the built-in subdomain list: quick, default or thorough
    #[arg(long, default_value_t = SubdomainMode::Default, help_heading = "Advanced")]
    pub subdomain_mode: SubdomainMode,
    /// Addresses probed on each side of a discovered IP
    #[arg(long, default_value_t = 2, help_heading = "Advanced")]
    pub neighbor_range: u32,
    /// Drop result entries mentioning these providers (comma-separated)
    #[arg(long, value_delimiter = ',', help_heading = "Advanced")]
    pub hide_providers: Vec<String>,

    /// Verbose mode (-v, -vv for debug)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,
    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Where and how the report is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPlan {
    pub format: ExportFormat,
    pub output: Option<PathBuf>,
    pub export_all: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Applies presets, resolves strategy filters and wordlists, and builds the
    /// scan configuration.
    pub fn into_config(self) -> Result<(ScanConfig, OutputPlan), ConfigError> {
        let host = extract_host(&self.target);
        let mut config = ScanConfig::new(&host)?;

        config.budget.max_depth = self.depth;
        config.budget.max_results = self.max_results;
        config.budget.max_per_strategy = self.max_per_strategy;
        config.budget.threads = self.threads;
        let mut mode = self.subdomain_mode;

        if self.fast {
            config.budget.max_depth = 1;
            config.budget.max_results = 50;
            config.budget.threads = 20;
            config.disabled.extend(FAST_DISABLED.iter().copied());
        }
        if self.thorough {
            config.budget.max_depth = 3;
            config.budget.max_results = 500;
            config.budget.threads = 50;
            mode = SubdomainMode::Thorough;
        }

        config.disabled.extend(disabled_strategies(&self.enable_only, &self.disable)?);
        config.probe_timeout = Duration::from_secs(self.timeout);
        config.nameserver = self.nameserver;
        config.hidden_providers = self.hide_providers;

        config.params.subdomain_words = match &self.subdomain_wordlist {
            Some(path) => wordlists::load_wordlist(path)?,
            None => wordlists::subdomains_for(mode),
        };
        if let Some(path) = &self.srv_services {
            config.params.srv_services = wordlists::load_wordlist(path)?;
        }
        config.params.neighbor_range = self.neighbor_range;

        let format = self
            .format
            .or_else(|| self.output.as_deref().and_then(ExportFormat::from_path))
            .unwrap_or_default();
        let plan = OutputPlan { format, output: self.output, export_all: self.export_all };

        debug!(seed = %config.seed, ?plan, "Command line resolved.");
        Ok((config, plan))
    }
}

/// Accepts bare hosts as well as URLs; falls back to the raw input when no host can
/// be extracted.
pub fn extract_host(raw: &str) -> String {
    let raw = raw.trim();
    let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    Url::parse(&with_scheme)
        .ok()
        .and_then(|url| url.host_str().map(|h| h.trim_matches(['[', ']']).to_string()))
        .unwrap_or_else(|| raw.to_string())
}

fn parse_strategies(names: &[String]) -> Result<HashSet<Strategy>, ConfigError> {
    names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .map(|n| n.parse::<Strategy>().map_err(|_| ConfigError::UnknownStrategy(n.to_string())))
        .collect()
}

/// Everything not in `enable_only` (when given), plus everything in `disable`.
pub fn disabled_strategies(enable_only: &[String], disable: &[String]) -> Result<HashSet<Strategy>, ConfigError> {
    let mut disabled = parse_strategies(disable)?;
    let enabled = parse_strategies(enable_only)?;
    if !enabled.is_empty() {
        disabled.extend(Strategy::iter().filter(|s| !enabled.contains(s)));
    }
    Ok(disabled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("vanguard-dns-mapper").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn hosts_come_out_of_urls() {
        assert_eq!(extract_host("https://www.example.com/path?q=1"), "www.example.com");
        assert_eq!(extract_host("example.com"), "example.com");
        assert_eq!(extract_host("192.0.2.1"), "192.0.2.1");
        assert_eq!(extract_host("2001:db8::1"), "2001:db8::1");
    }

    #[test]
    fn defaults_match_the_documented_ones() {
        let (config, plan) = cli(&["example.com"]).into_config().unwrap();
        assert_eq!(config.budget.max_depth, 2);
        assert_eq!(config.budget.max_results, 100);
        assert_eq!(config.budget.threads, 30);
        assert_eq!(config.params.subdomain_words.len(), 40);
        assert!(config.disabled.is_empty());
        assert_eq!(plan.format, ExportFormat::Text);
    }

    #[test]
    fn fast_preset_overrides_and_disables() {
        let (config, _) = cli(&["example.com", "--fast", "--disable", "mx"]).into_config().unwrap();
        assert_eq!(config.budget.max_depth, 1);
        assert_eq!(config.budget.max_results, 50);
        assert_eq!(config.budget.threads, 20);
        for s in [Strategy::Subdomains, Strategy::IpNeighbors, Strategy::Srv, Strategy::Axfr, Strategy::Mx] {
            assert!(config.disabled.contains(&s), "{s} should be disabled");
        }
    }

    #[test]
    fn thorough_preset_uses_the_full_wordlist() {
        let (config, _) = cli(&["example.com", "--thorough"]).into_config().unwrap();
        assert_eq!(config.budget.max_depth, 3);
        assert!(config.params.subdomain_words.len() > 40);
    }

    #[test]
    fn presets_and_verbosity_conflict() {
        let argv = ["vanguard-dns-mapper", "example.com", "--fast", "--thorough"];
        assert!(Cli::try_parse_from(argv).is_err());
        let argv = ["vanguard-dns-mapper", "example.com", "-v", "-q"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn enable_only_disables_the_rest() {
        let disabled = disabled_strategies(&["A".into(), "mx".into()], &[]).unwrap();
        assert!(!disabled.contains(&Strategy::A));
        assert!(!disabled.contains(&Strategy::Mx));
        assert!(disabled.contains(&Strategy::Txt));
        assert!(disabled.contains(&Strategy::Geolocation));
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let err = cli(&["example.com", "--disable", "axfr"]).into_config().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownStrategy(name) if name == "axfr"));
    }

    #[test]
    fn format_follows_output_extension() {
        let (_, plan) = cli(&["example.com", "-o", "out/map.html"]).into_config().unwrap();
        assert_eq!(plan.format, ExportFormat::Html);
        let (_, plan) = cli(&["example.com", "-o", "map.html", "-f", "json"]).into_config().unwrap();
        assert_eq!(plan.format, ExportFormat::Json);
    }

    #[test]
    fn missing_wordlist_fails_before_scanning() {
        let err = cli(&["example.com", "--subdomain-wordlist", "/nonexistent/words.txt"])
            .into_config()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Wordlist { .. }));
    }
}
