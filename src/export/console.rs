// src/export/console.rs

use std::fmt::{Display, Write as _};

use crossterm::style::{Color, Stylize};
use serde_json::{Map, Value};

use crate::core::errors::ExportError;
use crate::core::models::ScanReport;
use crate::core::probes::Strategy;
use crate::core::probes::heuristics::classify_providers;
use crate::export::Exporter;
use crate::export::html::heading;

const RULE_WIDTH: usize = 60;

/// Colored tree view for the terminal.
pub struct TextExporter {
    pub color: bool,
}

/// Markdown document with one section per strategy.
pub struct MarkdownExporter;

impl TextExporter {
    fn paint(&self, text: impl Display, color: Color) -> String {
        if self.color { text.to_string().with(color).to_string() } else { text.to_string() }
    }

    fn strong(&self, text: impl Display, color: Color) -> String {
        if self.color { text.to_string().with(color).bold().to_string() } else { text.to_string() }
    }

    fn check(&self, ok: bool) -> String {
        if ok { self.paint("✓", Color::Green) } else { self.paint("✗", Color::Red) }
    }

    /// Annotates well-known values: booleans, policies, TTL categories, wildcard flags.
    fn format_value(&self, key: &str, value: &Value) -> String {
        match (key, value) {
            ("wildcard_detected", Value::Bool(true)) => self.paint("⚠ WILDCARD DETECTED", Color::Red),
            ("wildcard_detected", Value::Bool(false)) => self.paint("✓ no wildcard", Color::Green),
            (_, Value::Bool(b)) => self.check(*b),
            ("policy", Value::String(p)) => match p.as_str() {
                "reject" | "-all" => self.paint(format!("✓ {p} (strict)"), Color::Green),
                "quarantine" | "~all" => self.paint(format!("⚠ {p} (moderate)"), Color::Yellow),
                "none" | "?all" | "+all" => self.paint(format!("✗ {p} (permissive)"), Color::Red),
                _ => p.clone(),
            },
            ("category", Value::String(c)) if c.starts_with("very-short") => self.paint(format!("⚡ {c}"), Color::Yellow),
            ("category", Value::String(c)) if c.starts_with("short") => self.paint(format!("→ {c}"), Color::Cyan),
            ("category", Value::String(c)) if c.starts_with("long") => self.paint(format!("✓ {c}"), Color::Green),
            (_, Value::String(s)) => s.clone(),
            (_, other) => other.to_string(),
        }
    }

    fn strategy_color(strategy: Strategy) -> Color {
        match strategy {
            Strategy::A | Strategy::Ns => Color::Blue,
            Strategy::Aaaa | Strategy::Soa | Strategy::Srv | Strategy::Geolocation => Color::Magenta,
            Strategy::Mx | Strategy::Cname | Strategy::Ptr | Strategy::ReverseDns | Strategy::Bimi => Color::Cyan,
            Strategy::Txt | Strategy::Subdomains => Color::Green,
            Strategy::Spf | Strategy::Caa | Strategy::SecurityTxt => Color::Red,
            Strategy::IpNeighbors => Color::DarkGrey,
            _ => Color::Yellow,
        }
    }

    fn render_fields(&self, out: &mut String, fields: &Map<String, Value>, last: bool) {
        let connector = if last { "  " } else { "║ " };
        let count = fields.len();
        for (idx, (key, value)) in fields.iter().enumerate() {
            let branch = if last && idx + 1 == count { "╚═" } else { "╠═" };
            match value {
                Value::Array(items) => {
                    let _ = writeln!(out, "║ {branch} {}", self.strong(key, Color::Yellow));
                    for (i, item) in items.iter().enumerate() {
                        let sub = if i + 1 == items.len() { "  ╚═" } else { "  ╠═" };
                        let _ = writeln!(out, "║ {connector}{sub} {}", self.paint(plain(item), Color::Cyan));
                    }
                }
                Value::Object(map) => {
                    let _ = writeln!(out, "║ {branch} {}", self.strong(key, Color::Yellow));
                    for (i, (k, v)) in map.iter().enumerate() {
                        let sub = if i + 1 == map.len() { "  ╚═" } else { "  ╠═" };
                        let _ = writeln!(out, "║ {connector}{sub} {k}: {}", self.format_value(k, v));
                    }
                }
                _ => {
                    let _ = writeln!(out, "║ {branch} {} {}", self.paint(format!("{key}:"), Color::Yellow), self.format_value(key, value));
                }
            }
        }
    }
}

impl Exporter for TextExporter {
    fn render(&self, report: &ScanReport) -> Result<String, ExportError> {
        let mut out = String::new();
        let results = &report.results;
        let title = format!(">>> DNS REPORT: {} <<<", truncate(&report.domain, 35));
        let _ = writeln!(out, "\n{}", self.strong(format!("+{}+", "=".repeat(RULE_WIDTH - 2)), Color::Magenta));
        let _ = writeln!(out, "{}", self.strong(format!("|{title:^58}|"), Color::Magenta));
        let _ = writeln!(out, "{}", self.strong(format!("+{}+", "=".repeat(RULE_WIDTH - 2)), Color::Magenta));

        let _ = writeln!(out, "\n{}    {}", self.paint("Date:", Color::Cyan), report.scan_date.to_rfc3339());
        let _ = writeln!(out, "{} {}", self.paint("Results:", Color::Cyan), self.strong(report.total_results, Color::Yellow));
        let _ = writeln!(out, "{} {}", self.paint("Domains:", Color::Cyan), self.strong(report.summary.domains_found, Color::Green));
        let _ = writeln!(out, "{}     {}", self.paint("IPs:", Color::Cyan), self.strong(report.summary.ips_found, Color::Blue));
        if report.summary.budget_exhausted {
            let _ = writeln!(out, "{}", self.paint("Result budget reached, crawl stopped early.", Color::Yellow));
        }

        let has = |s: Strategy| results.get(&s).is_some_and(|entries| !entries.is_empty());
        let _ = writeln!(out, "\n{}", self.strong("Security Posture:", Color::Yellow));
        let _ = writeln!(out, "  SPF:     {}", self.check(has(Strategy::Spf)));
        let _ = writeln!(out, "  DMARC:   {}", self.check(has(Strategy::Dmarc)));
        let _ = writeln!(out, "  MTA-STS: {}", self.check(has(Strategy::MtaSts)));
        let _ = writeln!(out, "  CAA:     {}", self.check(has(Strategy::Caa)));
        let _ = writeln!(out, "  DNSSEC:  {}", self.check(has(Strategy::Dnssec)));

        if let Some(ownership) = ownership(report) {
            let _ = writeln!(out, "\n{}", self.strong("Domain Ownership:", Color::Cyan));
            for (platform, verified) in ownership {
                let name = platform.trim_end_matches("_verified");
                let _ = writeln!(out, "  {name:12} {}", self.check(verified.as_bool().unwrap_or(false)));
            }
        }

        let providers = providers_seen(report);
        if !providers.is_empty() {
            let _ = writeln!(out, "\n{} {}", self.strong("Providers:", Color::Cyan), providers.join(", "));
        }

        let _ = writeln!(out, "\n{}", self.strong("-".repeat(RULE_WIDTH), Color::Cyan));

        for (strategy, entries) in results {
            let color = Self::strategy_color(*strategy);
            let _ = writeln!(out, "\n{}", self.strong(format!("╔═ {}", heading(strategy.as_ref())), color));
            for (idx, entry) in entries.iter().enumerate() {
                let last = idx + 1 == entries.len();
                match entry {
                    Value::Object(by_source) => {
                        for (source, record) in by_source {
                            match record {
                                Value::Object(fields) => {
                                    let _ = writeln!(out, "║ {}", self.paint(format!("[{source}]"), Color::DarkGrey));
                                    self.render_fields(&mut out, fields, last);
                                }
                                other => {
                                    let branch = if last { "╚═" } else { "╠═" };
                                    let _ = writeln!(out, "║ {branch} {}: {}", source, self.format_value(source, other));
                                }
                            }
                        }
                    }
                    other => {
                        let branch = if last { "╚═" } else { "╠═" };
                        let _ = writeln!(out, "║ {branch} {}", self.paint(plain(other), Color::Cyan));
                    }
                }
            }
            let _ = writeln!(out, "╚{}", "═".repeat(RULE_WIDTH - 1));
        }

        let _ = writeln!(out, "\n{}\n", self.strong("=".repeat(RULE_WIDTH), Color::Magenta));
        Ok(out)
    }
}

impl Exporter for MarkdownExporter {
    fn render(&self, report: &ScanReport) -> Result<String, ExportError> {
        let mut out = String::new();
        let _ = writeln!(out, "# DNS Mapping Report: {}\n", report.domain);
        let _ = writeln!(out, "**Scan Date:** {}", report.scan_date.to_rfc3339());
        let _ = writeln!(out, "**Depth:** {} | **Max Results:** {}", report.depth, report.max_results);
        let _ = writeln!(out, "**Total Results:** {}\n", report.total_results);

        let _ = writeln!(out, "| Domains | IPs | Strategies |\n|---|---|---|");
        let _ = writeln!(
            out,
            "| {} | {} | {} |",
            report.summary.domains_found,
            report.summary.ips_found,
            report.results.len()
        );

        for (strategy, entries) in &report.results {
            let _ = writeln!(out, "\n## {}\n", heading(strategy.as_ref()));
            for entry in entries {
                match entry {
                    Value::String(text) => {
                        let _ = writeln!(out, "- `{text}`");
                    }
                    other => {
                        let _ = writeln!(out, "```json\n{}\n```", serde_json::to_string_pretty(other)?);
                    }
                }
            }
        }
        Ok(out)
    }
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// The first `ownership` map found among TXT entries.
fn ownership(report: &ScanReport) -> Option<&Map<String, Value>> {
    report
        .results
        .get(&Strategy::Txt)?
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|by_source| by_source.values())
        .find_map(|record| record.get("ownership").and_then(Value::as_object))
        .filter(|map| !map.is_empty())
}

/// Known CDN and cloud providers appearing in any discovered domain.
fn providers_seen(report: &ScanReport) -> Vec<&'static str> {
    let mut providers: Vec<&'static str> = report
        .summary
        .domains
        .iter()
        .flat_map(|domain| classify_providers(domain))
        .collect();
    providers.sort_unstable();
    providers.dedup();
    providers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::fixtures::sample_report;

    #[test]
    fn plain_text_tree_has_posture_and_sections() {
        let text = TextExporter { color: false }.render(&sample_report()).unwrap();
        assert!(text.contains(">>> DNS REPORT: example.com <<<"));
        assert!(text.contains("SPF:     ✓"));
        assert!(text.contains("DMARC:   ✗"));
        assert!(text.contains("google       ✓"));
        assert!(text.contains("╔═ SUBDOMAINS"));
        assert!(text.contains("╚═ <script>.example.com"));
        assert!(text.contains("policy: ✓ -all (strict)"));
        assert!(!text.contains('\u{1b}'));
    }

    #[test]
    fn colored_text_uses_ansi_sequences() {
        let text = TextExporter { color: true }.render(&sample_report()).unwrap();
        assert!(text.contains('\u{1b}'));
    }

    #[test]
    fn markdown_sections() {
        let md = MarkdownExporter.render(&sample_report()).unwrap();
        assert!(md.starts_with("# DNS Mapping Report: example.com"));
        assert!(md.contains("## SUBDOMAINS"));
        assert!(md.contains("- `www.example.com`"));
        assert!(md.contains("```json"));
    }

    #[test]
    fn value_annotations() {
        let exporter = TextExporter { color: false };
        assert_eq!(exporter.format_value("policy", &Value::from("quarantine")), "⚠ quarantine (moderate)");
        assert_eq!(exporter.format_value("wildcard_detected", &Value::from(true)), "⚠ WILDCARD DETECTED");
        assert_eq!(exporter.format_value("serial", &Value::from(7)), "7");
    }
}
