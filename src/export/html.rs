// src/export/html.rs

use std::fmt::Write as _;

use serde_json::Value;

use crate::core::errors::ExportError;
use crate::core::models::ScanReport;
use crate::export::Exporter;

/// Entries rendered per strategy section.
const MAX_ENTRIES: usize = 50;

const STYLE: &str = "body{font-family:monospace;background:#1a1a2e;color:#eee;padding:20px;margin:0}\
.container{max-width:1200px;margin:0 auto;background:#16213e;border-radius:8px;padding:20px}\
h1{color:#bb86fc;border-bottom:2px solid #bb86fc;padding-bottom:10px}\
h2{color:#03dac6;margin-top:20px;border-left:4px solid #03dac6;padding-left:10px}\
.meta{background:#0f3460;padding:10px;border-radius:5px;margin:15px 0}\
.summary{display:grid;grid-template-columns:repeat(auto-fit,minmax(150px,1fr));gap:10px;margin:15px 0}\
.stat{background:#533483;padding:10px;border-radius:5px;text-align:center}\
.stat-value{font-size:24px;font-weight:bold;color:#03dac6}\
.section{background:#0f3460;margin:15px 0;padding:15px;border-radius:5px;border-left:4px solid #bb86fc}\
pre{background:#1a1a2e;padding:10px;border-radius:3px;overflow-x:auto}\
ul{list-style:none;padding:0}li{padding:5px 0;border-bottom:1px solid #333}\
li:last-child{border-bottom:none}code{color:#03dac6}";

/// A single self-contained dark-themed page.
pub struct HtmlExporter;

impl Exporter for HtmlExporter {
    fn render(&self, report: &ScanReport) -> Result<String, ExportError> {
        let domain = escape(&report.domain);
        let mut html = String::new();
        // Writing into a String cannot fail.
        let _ = write!(
            html,
            "<!DOCTYPE html>\n<html><head><meta charset=\"UTF-8\"><title>DNS: {domain}</title>\
             <style>{STYLE}</style></head><body><div class=\"container\">\n\
             <h1>DNS Report: {domain}</h1>\n\
             <div class=\"meta\"><strong>Date:</strong> {date}<br><strong>Depth:</strong> {depth} | \
             <strong>Max:</strong> {max}</div>\n\
             <div class=\"summary\">{domains}{ips}{strategies}</div>\n",
            date = report.scan_date.to_rfc3339(),
            depth = report.depth,
            max = report.max_results,
            domains = stat(report.summary.domains_found, "Domains"),
            ips = stat(report.summary.ips_found, "IPs"),
            strategies = stat(report.results.len(), "Strategies"),
        );

        for (strategy, entries) in &report.results {
            let _ = write!(html, "<div class=\"section\"><h2>{}</h2><ul>", heading(strategy.as_ref()));
            for entry in entries.iter().take(MAX_ENTRIES) {
                match entry {
                    Value::String(text) => {
                        let _ = write!(html, "<li><code>{}</code></li>", escape(text));
                    }
                    other => {
                        let pretty = serde_json::to_string_pretty(other)?;
                        let _ = write!(html, "<li><pre>{}</pre></li>", escape(&pretty));
                    }
                }
            }
            if entries.len() > MAX_ENTRIES {
                let _ = write!(html, "<li><em>{} more entries omitted</em></li>", entries.len() - MAX_ENTRIES);
            }
            html.push_str("</ul></div>\n");
        }

        html.push_str("</div></body></html>\n");
        Ok(html)
    }
}

fn stat(value: usize, label: &str) -> String {
    format!("<div class=\"stat\"><div class=\"stat-value\">{value}</div><div>{label}</div></div>")
}

/// `mta_sts` → `MTA STS`
pub(crate) fn heading(id: &str) -> String {
    id.to_uppercase().replace('_', " ")
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::probes::Strategy;
    use crate::export::fixtures::sample_report;
    use serde_json::json;

    #[test]
    fn markup_is_escaped() {
        let html = HtmlExporter.render(&sample_report()).unwrap();
        assert!(html.contains("&lt;script&gt;.example.com"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("<h2>SUBDOMAINS</h2>"));
        assert!(html.contains("<title>DNS: example.com</title>"));
    }

    #[test]
    fn long_sections_are_truncated() {
        let mut report = sample_report();
        report
            .results
            .insert(Strategy::IpNeighbors, (0..60).map(|i| json!(format!("192.0.2.{i}"))).collect());
        let html = HtmlExporter.render(&report).unwrap();
        assert!(html.contains("192.0.2.49"));
        assert!(!html.contains("192.0.2.50<"));
        assert!(html.contains("10 more entries omitted"));
    }

    #[test]
    fn headings_are_readable() {
        assert_eq!(heading("mta_sts"), "MTA STS");
    }
}
