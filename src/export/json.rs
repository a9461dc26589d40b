// src/export/json.rs

use crate::core::errors::ExportError;
use crate::core::models::ScanReport;
use crate::export::Exporter;

/// Pretty-printed JSON, the report's serde form.
pub struct JsonExporter;

impl Exporter for JsonExporter {
    fn render(&self, report: &ScanReport) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(report)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::fixtures::sample_report;
    use serde_json::Value;

    #[test]
    fn keys_follow_the_report_layout() {
        let rendered = JsonExporter.render(&sample_report()).unwrap();
        let value: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["domain"], "example.com");
        assert_eq!(value["total_results"], 3);
        assert_eq!(value["summary"]["strategies_used"][1], "subdomains");
        assert_eq!(value["results"]["subdomains"][0], "www.example.com");
        assert!(value["scan_date"].as_str().unwrap().starts_with("2025-01-02T03:04:05"));
    }

    #[test]
    fn report_round_trips() {
        let rendered = JsonExporter.render(&sample_report()).unwrap();
        let back: ScanReport = serde_json::from_str(&rendered).unwrap();
        assert_eq!(back.summary.ips_found, 1);
    }
}
