// src/main.rs

use std::io::{IsTerminal, stdout};
use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr};
use tracing::{error, info};

use vanguard_dns_mapper::cli::Cli;
use vanguard_dns_mapper::core::engine;
use vanguard_dns_mapper::core::probes::ProbeRegistry;
use vanguard_dns_mapper::core::resolver::DnsClient;
use vanguard_dns_mapper::export::{self, ExportFormat};
use vanguard_dns_mapper::logging;

const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse_args();
    logging::initialize_logging(logging::console_level(cli.verbose, cli.quiet))?;

    let (config, plan) = cli.into_config().wrap_err("invalid configuration")?;
    info!(seed = %config.seed, budget = ?config.budget, "Starting DNS reconnaissance.");

    let dns = Arc::new(DnsClient::from_config(&config));
    let http = reqwest::Client::builder()
        .user_agent(concat!("VanguardDnsMapper/", env!("CARGO_PKG_VERSION")))
        .timeout(HTTP_TIMEOUT)
        .build()
        .wrap_err("failed to build HTTP client")?;
    let registry = ProbeRegistry::standard(dns, http, &config);

    let report = engine::scan(&config, registry).await?;
    info!(
        domains = report.summary.domains_found,
        ips = report.summary.ips_found,
        strategies = report.results.len(),
        "Scan complete."
    );

    if plan.export_all {
        let dir = export::output_dir(&report.domain);
        let failures = export::export_all(&report, &dir)
            .into_iter()
            .filter(|(_, result)| result.is_err())
            .count();
        if failures > 0 {
            error!(failures, "Some exports failed.");
        }
    }

    match (&plan.output, plan.format) {
        (Some(path), format) => {
            export::write_report(&report, format, path)?;
        }
        (None, ExportFormat::Text) => {
            let color = stdout().is_terminal();
            export::print_report(&report, ExportFormat::Text, color, &mut stdout())?;
        }
        (None, format) if !plan.export_all => {
            let path = export::output_dir(&report.domain).join(format.default_file_name());
            export::write_report(&report, format, &path)?;
        }
        (None, _) => {}
    }

    Ok(())
}
