//! Report generation for sweep results.
//!
//! Supports JSON for CI integration and Markdown tables for documentation.
//! Pure formatting over the flattened sweep columns; no aggregation happens
//! here.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::params::ParamValue;
use crate::runners::sweep::SweepResults;
use crate::util::available_units;

/// Report schema version.
const REPORT_VERSION: &str = "1";

/// Report format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// JSON for CI integration.
    Json,
    /// Markdown table for documentation.
    Markdown,
    /// Both formats.
    Both,
}

/// Report metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Report schema version.
    pub version: String,
    /// RFC 3339 timestamp of generation.
    pub generated_at: String,
    /// Processing units available on the generating host.
    pub cpu_cores: usize,
}

/// Complete JSON report structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    /// Report metadata.
    pub metadata: ReportMetadata,
    /// One flattened column map per sweep row.
    pub rows: Vec<BTreeMap<String, ParamValue>>,
}

/// Sweep report generator.
pub struct SweepReport {
    results: SweepResults,
}

impl SweepReport {
    /// Create a report from sweep results.
    pub fn new(results: SweepResults) -> Self {
        Self { results }
    }

    /// Render the JSON report.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let report = JsonReport {
            metadata: ReportMetadata {
                version: REPORT_VERSION.to_string(),
                generated_at: chrono::Utc::now().to_rfc3339(),
                cpu_cores: available_units(),
            },
            rows: self.results.rows.iter().map(|row| row.columns()).collect(),
        };
        serde_json::to_string_pretty(&report)
    }

    /// Render a Markdown table with one line per sweep row.
    pub fn to_markdown(&self) -> String {
        let rows: Vec<BTreeMap<String, ParamValue>> =
            self.results.rows.iter().map(|row| row.columns()).collect();

        // Column set is the union across rows, name-ordered.
        let mut column_names: Vec<String> = Vec::new();
        for row in &rows {
            for name in row.keys() {
                if !column_names.contains(name) {
                    column_names.push(name.clone());
                }
            }
        }
        column_names.sort();

        let mut out = String::new();
        out.push_str("| ");
        out.push_str(&column_names.join(" | "));
        out.push_str(" |\n|");
        for _ in &column_names {
            out.push_str("---|");
        }
        out.push('\n');
        for row in &rows {
            out.push_str("| ");
            let cells: Vec<String> = column_names
                .iter()
                .map(|name| match row.get(name) {
                    Some(value) => value.to_string(),
                    None => String::new(),
                })
                .collect();
            out.push_str(&cells.join(" | "));
            out.push_str(" |\n");
        }
        out
    }

    /// Write the report to `<base_path>.json` and/or `<base_path>.md`.
    pub fn write_to_file(&self, format: ReportFormat, base_path: &Path) -> std::io::Result<()> {
        if matches!(format, ReportFormat::Json | ReportFormat::Both) {
            let json = self
                .to_json()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            std::fs::write(base_path.with_extension("json"), json)?;
        }
        if matches!(format, ReportFormat::Markdown | ReportFormat::Both) {
            std::fs::write(base_path.with_extension("md"), self.to_markdown())?;
        }
        Ok(())
    }

    /// The underlying results.
    pub fn results(&self) -> &SweepResults {
        &self.results
    }
}
