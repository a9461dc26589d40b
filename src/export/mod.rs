// src/export/mod.rs

//! Report exporters. Each format renders a `ScanReport` into a string; writing to
//! disk and the per-format error isolation live here.

pub mod console;
pub mod html;
pub mod json;

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use strum::{Display, EnumIter, EnumString};
use tracing::{error, info};

use crate::core::errors::ExportError;
use crate::core::models::ScanReport;

/// Formats written by `--export-all`.
pub const FILE_FORMATS: &[ExportFormat] = &[ExportFormat::Json, ExportFormat::Html, ExportFormat::Markdown];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter, ValueEnum)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ExportFormat {
    #[default]
    Text,
    Json,
    Html,
    Markdown,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Json => "json",
            ExportFormat::Html => "html",
            ExportFormat::Markdown => "md",
        }
    }

    /// Detects the format from an output path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "html" | "htm" => Some(ExportFormat::Html),
            "md" | "markdown" => Some(ExportFormat::Markdown),
            "txt" => Some(ExportFormat::Text),
            _ => None,
        }
    }

    pub fn default_file_name(self) -> String {
        format!("dns_map.{}", self.extension())
    }
}

/// Renders a report into one output format.
pub trait Exporter {
    fn render(&self, report: &ScanReport) -> Result<String, ExportError>;
}

/// The exporter for `format`. Text output is colored only when `color` is set.
pub fn exporter_for(format: ExportFormat, color: bool) -> Box<dyn Exporter> {
    match format {
        ExportFormat::Text => Box::new(console::TextExporter { color }),
        ExportFormat::Json => Box::new(json::JsonExporter),
        ExportFormat::Html => Box::new(html::HtmlExporter),
        ExportFormat::Markdown => Box::new(console::MarkdownExporter),
    }
}

/// `report_<domain with dots replaced by underscores>`.
pub fn output_dir(domain: &str) -> PathBuf {
    PathBuf::from(format!("report_{}", domain.replace(['.', '/', ':'], "_")))
}

/// Renders `report` as `format` and writes it to `path`, creating parent directories.
pub fn write_report(report: &ScanReport, format: ExportFormat, path: &Path) -> Result<PathBuf, ExportError> {
    let rendered = exporter_for(format, false).render(report)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ExportError::Io { path: parent.to_path_buf(), source })?;
    }
    std::fs::write(path, rendered).map_err(|source| ExportError::Io { path: path.to_path_buf(), source })?;
    info!(format = %format, path = %path.display(), "Report saved.");
    Ok(path.to_path_buf())
}

/// Prints `report` as `format` on `out`.
pub fn print_report(report: &ScanReport, format: ExportFormat, color: bool, out: &mut impl Write) -> Result<(), ExportError> {
    let rendered = exporter_for(format, color).render(report)?;
    out.write_all(rendered.as_bytes())
        .map_err(|source| ExportError::Io { path: PathBuf::from("<stdout>"), source })
}

/// Writes every file format into `dir`. A failing format is logged and does not
/// stop the others.
///
/// # Returns
/// One entry per attempted format with the written path or the error.
pub fn export_all(report: &ScanReport, dir: &Path) -> Vec<(ExportFormat, Result<PathBuf, ExportError>)> {
    FILE_FORMATS
        .iter()
        .map(|&format| {
            let result = write_report(report, format, &dir.join(format.default_file_name()));
            if let Err(e) = &result {
                error!(format = %format, error = %e, "Export failed.");
            }
            (format, result)
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_from_paths_and_names() {
        assert_eq!(ExportFormat::from_path(Path::new("out/map.JSON")), Some(ExportFormat::Json));
        assert_eq!(ExportFormat::from_path(Path::new("map.md")), Some(ExportFormat::Markdown));
        assert_eq!(ExportFormat::from_path(Path::new("map")), None);
        assert_eq!("markdown".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!(ExportFormat::Html.default_file_name(), "dns_map.html");
    }

    #[test]
    fn output_dir_replaces_dots() {
        assert_eq!(output_dir("mail.example.com"), PathBuf::from("report_mail_example_com"));
    }

    #[test]
    fn export_all_writes_every_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("report_example_com");
        let results = export_all(&fixtures::sample_report(), &target);
        assert_eq!(results.len(), 3);
        for (format, result) in results {
            let path = result.unwrap();
            assert_eq!(path, target.join(format.default_file_name()));
            assert!(std::fs::metadata(&path).unwrap().len() > 0);
        }
    }

    #[test]
    fn one_failing_format_does_not_stop_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        // A directory squatting on the JSON file name makes only that write fail.
        std::fs::create_dir_all(dir.path().join("dns_map.json")).unwrap();
        let results = export_all(&fixtures::sample_report(), dir.path());
        assert!(matches!(results[0], (ExportFormat::Json, Err(ExportError::Io { .. }))));
        assert!(results[1].1.is_ok());
        assert!(results[2].1.is_ok());
    }

    #[test]
    fn printing_goes_to_the_writer() {
        let mut out = Vec::new();
        print_report(&fixtures::sample_report(), ExportFormat::Markdown, false, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().starts_with("# DNS Mapping Report: example.com"));
    }
}
