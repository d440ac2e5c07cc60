//! CLI entry point: supplies files to the core and renders Verdicts.

use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use veilscan::{
    cli::{Cli, Commands},
    reporters::{report, OutputFormat, ScanReport, UnitReport},
    Allowlist, DecodeLimits, Decoder, Registry, Scanner,
};
use walkdir::WalkDir;

/// Extensions worth scanning as source text.
const SOURCE_EXTENSIONS: &[&str] = &[
    "js", "mjs", "cjs", "ts", "tsx", "jsx", "py", "rb", "sh", "bash", "php", "pl", "lua", "ps1",
    "bat", "cmd", "json", "yaml", "yml", "toml", "md", "txt", "html", "htm",
];

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| log_level.into()))
        .with_target(false)
        .init();

    let format: OutputFormat = cli
        .format
        .parse()
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    match cli.command {
        Commands::Scan {
            path,
            allowlist,
            max_depth,
            max_variants,
            fail_on_score,
        } => {
            let registry = Registry::builtin()?;

            let allowlist = match allowlist {
                Some(ref p) => {
                    let content = std::fs::read_to_string(p)
                        .with_context(|| format!("failed to read allowlist {}", p.display()))?;
                    Allowlist::from_toml_str(&content)?
                }
                None => Allowlist::empty(),
            };

            let scanner = Scanner::with_parts(
                registry,
                allowlist,
                DecodeLimits {
                    max_depth,
                    max_variants,
                },
            );

            let start = Instant::now();
            let files = collect_files(&path);
            tracing::info!("Scanning {} files under {}", files.len(), path.display());

            // Each unit's pipeline touches only its own data plus the
            // shared read-only scanner, so files scan in parallel.
            let mut units: Vec<UnitReport> = files
                .par_iter()
                .filter_map(|file| {
                    let content = match std::fs::read_to_string(file) {
                        Ok(c) => c,
                        Err(e) => {
                            tracing::debug!("Skipping {}: {}", file.display(), e);
                            return None;
                        }
                    };
                    let unit_start = Instant::now();
                    let verdict = scanner.scan(&content);
                    Some(UnitReport {
                        path: file.clone(),
                        verdict,
                        scan_time_ms: unit_start.elapsed().as_millis() as u64,
                    })
                })
                .collect();
            units.sort_by(|a, b| a.path.cmp(&b.path));

            let mut scan_report = ScanReport::new(path);
            scan_report.units = units;
            scan_report.total_time_ms = start.elapsed().as_millis() as u64;

            report(&scan_report, format, &mut io::stdout())?;

            if let Some(threshold) = fail_on_score {
                if scan_report.max_score() >= threshold {
                    tracing::warn!(
                        "max score {:.1} >= fail threshold {:.1}",
                        scan_report.max_score(),
                        threshold
                    );
                    std::process::exit(1);
                }
            }
        }

        Commands::Rules { json } => {
            let registry = Registry::builtin()?;
            if json {
                let specs = veilscan::builtin_rules();
                serde_json::to_writer_pretty(io::stdout(), &specs)?;
                println!();
            } else {
                for rule in registry.all() {
                    println!(
                        "{:<28} {:<20} sev {:>2}  {}",
                        rule.id, rule.category.to_string(), rule.severity, rule.description
                    );
                }
            }
        }

        Commands::Decode { input, depth } => {
            let decoder = Decoder::new(DecodeLimits {
                max_depth: depth,
                ..DecodeLimits::default()
            });
            let expansion = decoder.expand(&input);
            for variant in &expansion.variants {
                let chain: Vec<String> =
                    variant.chain.iter().map(|t| t.to_string()).collect();
                println!(
                    "depth {} [{}]: {}",
                    variant.depth,
                    chain.join(" -> "),
                    veilscan::truncate(&variant.text, 200)
                );
            }
            if expansion.limit_reached {
                println!("(resource limit reached)");
            }
        }
    }

    Ok(())
}

/// Collect scannable files under `path`.
fn collect_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }

    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|ext| SOURCE_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)))
                .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect()
}
