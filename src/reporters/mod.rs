//! Output formatters for scan results.
//!
//! The core guarantees the Verdict shape; everything here is
//! presentation for the CLI collaborator.

use crate::types::{truncate, Verdict};
use anyhow::Result;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;

/// Output format for scan results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Cli,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cli" | "terminal" | "console" => Ok(OutputFormat::Cli),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// One scanned file with its verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitReport {
    pub path: PathBuf,
    pub verdict: Verdict,
    pub scan_time_ms: u64,
}

/// Aggregated report for a whole scan invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub scan_root: PathBuf,
    pub units: Vec<UnitReport>,
    pub total_time_ms: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ScanReport {
    pub fn new(scan_root: PathBuf) -> Self {
        Self {
            scan_root,
            units: Vec::new(),
            total_time_ms: 0,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn total_hits(&self) -> usize {
        self.units.iter().map(|u| u.verdict.hits.len()).sum()
    }

    pub fn max_score(&self) -> f64 {
        self.units
            .iter()
            .map(|u| u.verdict.score)
            .fold(0.0, f64::max)
    }
}

/// Render the report in the requested format.
pub fn report<W: Write>(report: &ScanReport, format: OutputFormat, writer: &mut W) -> Result<()> {
    match format {
        OutputFormat::Cli => report_cli(report, writer),
        OutputFormat::Json => report_json(report, writer),
    }
}

fn report_cli<W: Write>(report: &ScanReport, writer: &mut W) -> Result<()> {
    writeln!(writer)?;
    writeln!(writer, "{}", "Veilscan Report".bold().underline())?;
    writeln!(writer, "  Scan root:    {}", report.scan_root.display())?;
    writeln!(writer, "  Files:        {}", report.units.len())?;
    writeln!(writer, "  Total hits:   {}", report.total_hits())?;
    writeln!(writer, "  Max score:    {:.1}", report.max_score())?;
    writeln!(writer, "  Scan time:    {}ms", report.total_time_ms)?;
    writeln!(writer)?;

    for unit in &report.units {
        if unit.verdict.hits.is_empty() {
            continue;
        }

        writeln!(
            writer,
            "{} {}",
            unit.path.display().to_string().bold(),
            format!("(score {:.1})", unit.verdict.score).yellow()
        )?;
        if unit.verdict.limit_reached {
            writeln!(
                writer,
                "  {} decoding stopped at resource limit",
                "!".yellow()
            )?;
        }

        for (category, tally) in &unit.verdict.categories {
            writeln!(
                writer,
                "  {:<20} {} hits, {} suppressed",
                category.to_string(),
                tally.count,
                tally.suppressed_count
            )?;
        }

        for hit in &unit.verdict.hits {
            let marker = if hit.suppressed {
                "·".white()
            } else if hit.severity >= 8 {
                "●".bright_red()
            } else if hit.severity >= 5 {
                "●".yellow()
            } else {
                "●".blue()
            };
            writeln!(
                writer,
                "  {} [{}] {} sev {} depth {} @ {}",
                marker,
                hit.category,
                hit.rule_id,
                hit.severity,
                hit.depth,
                hit.offset
            )?;
            writeln!(writer, "      {}", truncate(&hit.snippet, 100).dimmed())?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn report_json<W: Write>(report: &ScanReport, writer: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, report)?;
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Scanner;

    #[test]
    fn test_json_roundtrip() {
        let scanner = Scanner::new().unwrap();
        let mut report_data = ScanReport::new(PathBuf::from("/tmp/x"));
        report_data.units.push(UnitReport {
            path: PathBuf::from("/tmp/x/a.js"),
            verdict: scanner.scan("eval('x');"),
            scan_time_ms: 1,
        });

        let mut buf = Vec::new();
        report(&report_data, OutputFormat::Json, &mut buf).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert!(parsed["units"][0]["verdict"]["score"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn test_cli_render_does_not_fail() {
        let scanner = Scanner::new().unwrap();
        let mut report_data = ScanReport::new(PathBuf::from("."));
        report_data.units.push(UnitReport {
            path: PathBuf::from("sample.js"),
            verdict: scanner.scan("fetch('https://malicious-site.com/x');"),
            scan_time_ms: 2,
        });

        let mut buf = Vec::new();
        report(&report_data, OutputFormat::Cli, &mut buf).unwrap();
        assert!(!buf.is_empty());
    }
}
