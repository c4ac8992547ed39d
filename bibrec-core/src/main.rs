//! bibrec - bibliographic record reconciliation and output validation
//!
//! Results are printed as JSON on stdout; logs go to stderr. Exit code 2 means the run
//! completed but generation must be blocked.

use anyhow::{Context, Result};
use bibrec_common::logging::init_tracing;
use bibrec_core::fusion::strip_resolution_notes;
use bibrec_core::validators::{OutputValidator, PageRelationshipHints};
use bibrec_core::workflow::Reconciler;
use bibrec_core::{BibrecConfig, CandidateEntity, FieldRecord};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

/// Exit status when the run succeeded but release must be blocked
const EXIT_BLOCKED: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "bibrec")]
#[command(about = "Reconcile extracted bibliographic records and validate generated output")]
#[command(version)]
struct Args {
    /// Configuration file (overrides BIBREC_CONFIG and the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge per-chunk candidates into canonical entities
    Reconcile {
        /// JSON file: an array of candidates, or {"candidates": [...], "hints": {...}}
        #[arg(long, value_name = "FILE")]
        candidates: PathBuf,

        /// Number of entities the document is known to contain
        #[arg(long)]
        expected_count: Option<usize>,

        /// Required fields per entity, comma separated (replaces the configured list)
        #[arg(long, value_delimiter = ',')]
        required: Option<Vec<String>>,

        /// Keep conflict resolution notes in the output
        #[arg(long)]
        audit: bool,
    },

    /// Compare a generated record against its source record
    Validate {
        /// Source record JSON (nested or flattened)
        #[arg(long, value_name = "FILE")]
        source: PathBuf,

        /// Generated output record JSON (same shape)
        #[arg(long, value_name = "FILE")]
        generated: PathBuf,

        /// Rule table TOML (overrides rules_path from configuration)
        #[arg(long, value_name = "FILE")]
        rules: Option<PathBuf>,
    },

    /// Load and check a rule table
    Rules {
        #[arg(long, value_name = "FILE")]
        rules: Option<PathBuf>,
    },
}

/// Accepted shapes of the reconcile input file
#[derive(Deserialize)]
#[serde(untagged)]
enum CandidateInput {
    Bare(Vec<CandidateEntity>),
    WithHints {
        candidates: Vec<CandidateEntity>,
        #[serde(default)]
        hints: PageRelationshipHints,
    },
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let mut config = BibrecConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.logging).context("Failed to initialize logging")?;

    info!("bibrec {}", env!("CARGO_PKG_VERSION"));
    config.log_source();

    match args.command {
        Command::Reconcile {
            candidates,
            expected_count,
            required,
            audit,
        } => run_reconcile(&config, &candidates, expected_count, required, audit),
        Command::Validate {
            source,
            generated,
            rules,
        } => {
            if rules.is_some() {
                config.rules_path = rules;
            }
            run_validate(&config, &source, &generated)
        }
        Command::Rules { rules } => {
            if rules.is_some() {
                config.rules_path = rules;
            }
            run_rules(&config)
        }
    }
}

fn run_reconcile(
    config: &BibrecConfig,
    path: &Path,
    expected_count: Option<usize>,
    required: Option<Vec<String>>,
    audit: bool,
) -> Result<ExitCode> {
    let input: CandidateInput = read_json(path)?;
    let (candidates, hints) = match input {
        CandidateInput::Bare(candidates) => (candidates, PageRelationshipHints {
            first_sequence: config.completeness.first_sequence,
            declared_total: None,
        }),
        CandidateInput::WithHints { candidates, hints } => (candidates, hints),
    };

    let tables = config.rule_table().context("Failed to load rule table")?.tables();
    let mut reconciler = Reconciler::new(config, tables);
    if let Some(required) = required {
        reconciler = reconciler.with_required_fields(required);
    }

    let mut reconciliation = reconciler.reconcile(&candidates, expected_count, &hints);
    if !(audit || config.deduplication.retain_resolution_notes) {
        strip_resolution_notes(&mut reconciliation.entities);
    }

    println!("{}", serde_json::to_string_pretty(&reconciliation)?);

    if reconciliation.completeness.generation_blocked {
        Ok(ExitCode::from(EXIT_BLOCKED))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn run_validate(config: &BibrecConfig, source: &Path, generated: &Path) -> Result<ExitCode> {
    let rules = config.rule_table().context("Failed to load rule table")?;
    let validator = OutputValidator::new(Arc::new(rules), config.validator.clone());

    let source_record = FieldRecord::from_json(&read_json::<serde_json::Value>(source)?);
    let generated_record = FieldRecord::from_json(&read_json::<serde_json::Value>(generated)?);

    let report = validator.validate(&source_record, &generated_record);
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.generation_blocked {
        Ok(ExitCode::from(EXIT_BLOCKED))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn run_rules(config: &BibrecConfig) -> Result<ExitCode> {
    let rules = config.rule_table().context("Failed to load rule table")?;

    println!("Rule table version: {}", rules.version());
    println!("Rules: {}", rules.rules().len());
    for rule in rules.rules() {
        println!(
            "  {:<32} {:<44} {:?} severity={} cosmetic={}",
            rule.id, rule.path, rule.normalization, rule.severity, rule.cosmetic_severity
        );
    }
    println!("Required paths: {}", rules.required_paths().join(", "));
    Ok(ExitCode::SUCCESS)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
