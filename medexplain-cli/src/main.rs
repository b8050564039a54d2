// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! MedExplain CLI
//!
//! Command-line interface for plain-language rewrites and the term
//! statistics table.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use medexplain_analysis::{extract_bracketed, ReadabilityScorer, TermExtractor};
use medexplain_core::{EngineConfig, TermRecord};
use medexplain_engine::{OllamaClient, PassOutcome, Simplifier};
use medexplain_storage::{TermLedger, TermOrder};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "medexplain")]
#[command(about = "MedExplain - plain-language medical text with term analytics", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "MEDEXPLAIN_CONFIG")]
    config: Option<PathBuf>,

    /// Term table directory (overrides config)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Output as JSON (machine-readable); logs are emitted as JSON too
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite medical text in plain language and record term statistics
    Simplify {
        /// Text to simplify
        text: Option<String>,

        /// Read the text from a file instead
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },

    /// Score a piece of text for readability
    Score {
        text: String,

        /// Number of explained terms (default: count of [[...]] spans)
        #[arg(long)]
        bracketed: Option<usize>,
    },

    /// List the medical terms the extractor finds
    Extract { text: String },

    /// Show the term statistics table
    Stats {
        #[arg(long, value_enum, default_value = "usage")]
        sort: SortOrder,

        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Merge a JSON array of term samples into the table
    Merge {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Write a timestamped copy of the term table
    Snapshot {
        /// Output directory (default: the data directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SortOrder {
    Usage,
    Score,
    Recent,
}

impl From<SortOrder> for TermOrder {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Usage => TermOrder::Usage,
            SortOrder::Score => TermOrder::Score,
            SortOrder::Recent => TermOrder::Recent,
        }
    }
}

fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("medexplain=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "medexplain=info".into())
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = EngineConfig::load(cli.config.clone()).context("Failed to load configuration")?;
    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = dir.clone();
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json);

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Simplify { text, file } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {:?}", path))?,
                (None, None) => bail!("Provide TEXT or --file"),
            };

            let client = OllamaClient::new(&config.generation)
                .context("Failed to build generation client")?;
            let ledger = Arc::new(TermLedger::open(&config.storage));
            let simplifier = Simplifier::new(Arc::new(client), ledger, &config)?;

            let outcome = simplifier.simplify(&text).await?;
            let analytics = &outcome.analytics;

            if cli.json {
                let output = json!({
                    "text": outcome.text,
                    "score": outcome.score,
                    "terms": outcome.terms,
                    "off_topic": outcome.off_topic,
                    "skipped_fragments": outcome.skipped_fragments,
                    "analytics": {
                        "intake": pass_json(&analytics.intake),
                        "final": pass_json(&analytics.final_pass),
                        "explained": pass_json(&analytics.explained_pass),
                    }
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("{}", outcome.text);
                println!();
                println!("Simplicity score: {:.2}", outcome.score);
                if !outcome.terms.is_empty() {
                    let terms: Vec<&str> = outcome.terms.iter().map(String::as_str).collect();
                    println!("Terms: {}", terms.join(", "));
                }
                for (name, pass) in [
                    ("intake", &analytics.intake),
                    ("final", &analytics.final_pass),
                    ("explained", &analytics.explained_pass),
                ] {
                    if let PassOutcome::Failed(reason) = pass {
                        println!("✗ {} statistics not recorded: {}", name, reason);
                    }
                }
            }
        }

        Commands::Score { text, bracketed } => {
            let scorer = ReadabilityScorer::new(config.scoring.clone())?;
            let bracketed = bracketed.unwrap_or_else(|| extract_bracketed(&text).len());
            let breakdown = scorer.breakdown(&text, bracketed);

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&breakdown)?);
            } else {
                println!("Simplicity score: {:.2}", breakdown.score);
                println!(
                    "  Words: {}, Sentences: {}, Syllables: {}",
                    breakdown.words, breakdown.sentences, breakdown.syllables
                );
                println!("  Grade level: {:.2}", breakdown.grade);
                println!(
                    "  Bracket penalty: {:.2} ({} terms), Friendly bonus: {:.2} ({} matches)",
                    breakdown.bracket_penalty,
                    bracketed,
                    breakdown.friendly_bonus,
                    breakdown.friendly_matches
                );
            }
        }

        Commands::Extract { text } => {
            let extractor = TermExtractor::from_config(&config.extraction)?;
            let terms = extractor.extract(&text);

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&terms)?);
            } else if terms.is_empty() {
                println!("No terms found.");
            } else {
                println!("Found {} terms:", terms.len());
                for term in &terms {
                    println!("  - {}", term);
                }
            }
        }

        Commands::Stats { sort, limit } => {
            let ledger = TermLedger::open(&config.storage);
            let records = ledger
                .top_terms(sort.into(), limit)
                .context("Failed to read term table")?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No terms recorded yet.");
            } else {
                print_table(&records);
            }
        }

        Commands::Merge { input } => {
            let content = std::fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {:?}", input))?;
            let ledger = TermLedger::open(&config.storage);
            let report = ledger
                .merge_json(&content)
                .context("Failed to merge samples")?;

            if cli.json {
                let skipped: Vec<String> = report.skipped.iter().map(|e| e.to_string()).collect();
                let output = json!({
                    "added": report.added,
                    "updated": report.updated,
                    "skipped": skipped,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!(
                    "✓ Merged {} samples: {} new, {} updated",
                    report.applied(),
                    report.added,
                    report.updated
                );
                for invalid in &report.skipped {
                    println!("  ✗ {}", invalid);
                }
            }
        }

        Commands::Snapshot { out } => {
            let dir = out.unwrap_or_else(|| config.storage.data_dir.clone());
            let ledger = TermLedger::open(&config.storage);
            let path = ledger
                .snapshot(&dir)
                .context("Failed to write snapshot")?;

            info!("Snapshot written to {:?}", path);
            if cli.json {
                println!("{}", json!({ "path": path.to_string_lossy() }));
            } else {
                println!("✓ Snapshot written to {}", path.display());
            }
        }
    }

    Ok(())
}

fn pass_json(pass: &PassOutcome) -> serde_json::Value {
    match pass {
        PassOutcome::Committed(report) => json!({
            "status": "committed",
            "added": report.added,
            "updated": report.updated,
            "skipped": report.skipped.len(),
        }),
        PassOutcome::Skipped => json!({ "status": "skipped" }),
        PassOutcome::Failed(reason) => json!({ "status": "failed", "reason": reason }),
    }
}

fn print_table(records: &[TermRecord]) {
    println!(
        "{:<32} {:>6} {:>7} {:>5} {:>5}  {}",
        "TERM", "USES", "SCORE", "MISU", "INSTR", "LAST SEEN"
    );
    println!("{:-<80}", "");
    for r in records {
        println!(
            "{:<32} {:>6} {:>7.2} {:>5} {:>5}  {}",
            r.term,
            r.usage_count,
            r.display_score(),
            u8::from(r.misunderstood),
            u8::from(r.usage_instruction),
            r.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_stats() {
        let cli = Cli::try_parse_from(["medexplain", "--json", "stats", "--sort", "score", "--limit", "5"])
            .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Stats { sort, limit } => {
                assert_eq!(sort, SortOrder::Score);
                assert_eq!(limit, 5);
                assert_eq!(TermOrder::from(sort), TermOrder::Score);
            }
            _ => panic!("expected stats"),
        }
    }

    #[test]
    fn test_simplify_text_and_file_conflict() {
        let result = Cli::try_parse_from([
            "medexplain",
            "simplify",
            "chest pain",
            "--file",
            "note.txt",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_pass_json() {
        assert_eq!(pass_json(&PassOutcome::Skipped)["status"], "skipped");
        let failed = pass_json(&PassOutcome::Failed("disk full".to_string()));
        assert_eq!(failed["reason"], "disk full");
    }
}
