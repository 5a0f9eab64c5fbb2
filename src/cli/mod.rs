//! Fraud pipeline CLI module
//!
//! Command-line interface for validating datasets, training and inspecting
//! model bundles, and scoring transactions.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::dataset::{summarize, FeatureMap};
use crate::export::resolve_bundle;
use crate::inference::Predictor;
use crate::pipeline::{StageStatus, TrainingPipeline};
use crate::utils::DataLoader;
use crate::validation::{self, ValidationReport};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString { s.truecolor(100, 210, 120) }
fn warn(s: &str) -> ColoredString { s.truecolor(230, 190, 90) }
fn bad(s: &str) -> ColoredString { s.truecolor(235, 100, 100) }

fn line_box_top() { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep() { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_warn(msg: &str) {
    println!("  {} {}", warn("!"), msg);
}

fn step_fail(msg: &str) {
    println!("  {} {}", bad("✗"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "fraud-pipeline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validate card transaction data and train a fraud detection model")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check a dataset against the expected schema and quality rules
    Validate {
        /// Input data file (CSV, JSON, or Parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// Pipeline configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Validate, train, evaluate and persist a model bundle
    Train {
        /// Input data file (CSV, JSON, or Parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// Destination directory for bundles
        #[arg(short, long)]
        output: PathBuf,

        /// Pipeline configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seed for both the split and the forest
        #[arg(long)]
        seed: Option<u64>,

        /// Number of trees
        #[arg(long)]
        n_estimators: Option<usize>,

        /// Held-out fraction of each class
        #[arg(long)]
        test_fraction: Option<f64>,

        /// Write the run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show a bundle's metadata, metrics and top features
    Inspect {
        /// Bundle directory, or a destination holding LATEST
        #[arg(short, long)]
        bundle: PathBuf,
    },

    /// Score transactions given as JSON feature maps
    Predict {
        /// Bundle directory, or a destination holding LATEST
        #[arg(short, long)]
        bundle: PathBuf,

        /// JSON object or array of objects keyed by feature name, or a file holding one
        #[arg(short, long)]
        input: String,
    },

    /// Show dataset shape, missing values and class balance
    Info {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    Ok(match path {
        Some(p) => PipelineConfig::from_json_file(p)?,
        None => PipelineConfig::default(),
    })
}

fn print_findings(report: &ValidationReport) {
    for issue in report.errors() {
        step_fail(&format!("{} {}", muted(&format!("[{}]", issue.check())), issue));
    }
    for issue in report.warnings() {
        step_warn(&format!("{} {}", muted(&format!("[{}]", issue.check())), issue));
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

/// Returns whether the dataset passed
pub fn cmd_validate(data_path: &Path, config_path: Option<&Path>) -> anyhow::Result<bool> {
    section("Validate");
    let config = load_config(config_path)?;

    step_run(&format!("Checking {}", data_path.display()));
    let start = Instant::now();
    let report = validation::validate(data_path, &config.validation);
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    println!("  {:<14} {}", muted("Rows"), report.n_rows());
    println!("  {:<14} {}", muted("Columns"), report.n_columns());
    if let Some(size) = report.file_size_bytes() {
        println!("  {:<14} {:.2} MB", muted("File size"), size as f64 / 1024.0 / 1024.0);
    }
    if let Some(counts) = report.class_counts() {
        println!(
            "  {:<14} {} normal, {} fraud ({:.3}%)",
            muted("Classes"),
            counts.normal,
            counts.fraud,
            counts.fraud_ratio() * 100.0
        );
    }
    println!();
    print_findings(&report);

    println!();
    if report.is_valid() {
        step_ok(&format!("valid with {} warning(s)", report.warnings().len()));
    } else {
        step_fail(&format!("{} error(s)", report.errors().len()).red().to_string());
    }
    println!();

    Ok(report.is_valid())
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_train(
    data_path: &Path,
    output: &Path,
    config_path: Option<&Path>,
    seed: Option<u64>,
    n_estimators: Option<usize>,
    test_fraction: Option<f64>,
    report_path: Option<&Path>,
) -> anyhow::Result<()> {
    section("Train");

    let mut config = load_config(config_path)?;
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }
    if let Some(n) = n_estimators {
        config.training.n_estimators = n;
    }
    if let Some(f) = test_fraction {
        config = config.with_test_fraction(f);
    }

    let pipeline = TrainingPipeline::new(config, output);
    let (report, outcome) = pipeline.run_recorded(data_path);

    if let Some(path) = report_path {
        report.write_json(path)?;
    }

    println!();
    for record in report.stages() {
        let line = format!("{:<9} {} {}", record.stage, dim(&format!("{:>6} ms", record.elapsed_ms)), record.detail);
        match record.status {
            StageStatus::Succeeded => step_ok(&line),
            StageStatus::Failed => step_fail(&line),
        }
    }
    if let Some(findings) = report.validation() {
        if !findings.is_valid() || !findings.warnings().is_empty() {
            println!();
            print_findings(findings);
        }
    }

    let handle = outcome?;

    println!();
    line_box_top();
    line_box(&kv("Run     ", handle.run_id.as_str()));
    line_box(&kv("Bundle  ", &handle.path.display().to_string()));
    line_box_sep();
    if let Some(m) = report.metrics() {
        line_box(&kv("Precision", &format!("{:.4}", m.precision)));
        line_box(&kv("Recall   ", &format!("{:.4}", m.recall)));
        line_box(&kv("F1       ", &format!("{:.4}", m.f1_score)));
        line_box(&kv("Support  ", &format!("{} ({} fraud)", m.support(), m.fraud_support())));
    }
    line_box_sep();
    for check in report.sample_checks() {
        let label = if check.actual_fraud { "fraud row " } else { "normal row" };
        let verdict = if check.is_correct() { ok("correct") } else { bad("wrong") };
        line_box(&format!("{} {}", kv(label, &format!("{:.4}", check.score)), verdict));
    }
    line_box_bottom();
    println!();

    Ok(())
}

pub fn cmd_inspect(bundle: &Path) -> anyhow::Result<()> {
    section("Inspect");

    step_run("Loading bundle");
    let start = Instant::now();
    let predictor = Predictor::load(resolve_bundle(bundle)?)?;
    step_done(&format!("{:?}", start.elapsed()));

    let meta = predictor.metadata();
    println!();
    println!("  {:<20} {}", muted("Run"), meta.run_id());
    println!("  {:<20} {}", muted("Created"), meta.created_at().to_rfc3339());
    println!("  {:<20} {}", muted("Path"), predictor.path().display());
    println!("  {:<20} {}", muted("Model"), meta.model_type());
    println!("  {:<20} {}", muted("Trees"), meta.n_estimators());
    println!(
        "  {:<20} {}",
        muted("Max depth"),
        meta.max_depth().map_or("none".to_string(), |d| d.to_string())
    );
    println!("  {:<20} {:?}", muted("Class weighting"), meta.class_weighting());
    println!("  {:<20} {}", muted("Seed"), meta.seed());
    println!(
        "  {:<20} {} ({} fraud)",
        muted("Training samples"),
        meta.training_samples(),
        meta.training_fraud_samples()
    );
    println!(
        "  {:<20} {} ({} fraud)",
        muted("Test samples"),
        meta.test_samples(),
        meta.test_fraud_samples()
    );
    println!("  {:<20} {}", muted("Features"), meta.feature_count());

    let m = meta.metrics();
    section("Metrics");
    println!("  {:<12} {}", muted("Precision"), format!("{:.4}", m.precision).white().bold());
    println!("  {:<12} {}", muted("Recall"), format!("{:.4}", m.recall).white().bold());
    println!("  {:<12} {}", muted("F1"), format!("{:.4}", m.f1_score).white().bold());
    println!("  {:<12} {:.4}", muted("Accuracy"), m.accuracy);
    println!(
        "  {:<12} tp {}  fp {}  tn {}  fn {}",
        muted("Confusion"),
        m.confusion.true_positives,
        m.confusion.false_positives,
        m.confusion.true_negatives,
        m.confusion.false_negatives
    );

    section("Top features");
    for (rank, f) in meta.top_features(10).iter().enumerate() {
        let bar = "█".repeat((f.importance * 40.0).round() as usize);
        println!("  {:>2}. {:<8} {:.4} {}", rank + 1, f.feature, f.importance, accent(&bar));
    }

    if !meta.validation_warnings().is_empty() {
        section("Validation warnings");
        for w in meta.validation_warnings() {
            step_warn(w);
        }
    }
    println!();
    Ok(())
}

/// Parse one feature map or an array of them
pub fn parse_feature_maps(input: &str) -> anyhow::Result<Vec<FeatureMap>> {
    let value: serde_json::Value = serde_json::from_str(input)?;
    match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| Ok(serde_json::from_value::<FeatureMap>(item)?))
            .collect(),
        serde_json::Value::Object(_) => Ok(vec![serde_json::from_value(value)?]),
        _ => anyhow::bail!("expected a JSON object or an array of objects"),
    }
}

pub fn cmd_predict(bundle: &Path, input: &str) -> anyhow::Result<()> {
    let text = if Path::new(input).is_file() {
        std::fs::read_to_string(input)?
    } else {
        input.to_string()
    };
    let batch = parse_feature_maps(&text)?;

    let predictor = Predictor::load(resolve_bundle(bundle)?)?;
    let scores = predictor.predict_batch(&batch)?;

    section("Predict");
    println!("  {}", dim(&format!("run {}", predictor.run_id())));
    println!();
    for (i, score) in scores.iter().enumerate() {
        let verdict = if *score > crate::training::DECISION_THRESHOLD {
            bad("fraud")
        } else {
            ok("normal")
        };
        println!("  {:>4}  {:.6}  {}", i, score, verdict);
    }
    println!();
    Ok(())
}

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let df = DataLoader::new().load_auto(data_path)?;
    let summary = summarize(&df)?;

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), summary.n_rows);
    println!("  {:<12} {}", muted("Columns"), summary.n_columns);
    println!("  {:<12} {:.2} MB", muted("Memory"), summary.estimated_bytes as f64 / 1024.0 / 1024.0);
    println!("  {:<12} {}", muted("Nulls"), summary.total_nulls());

    if summary.total_nulls() > 0 {
        println!();
        for (column, nulls) in summary.null_counts.iter().filter(|(_, n)| *n > 0) {
            println!("  {:<20} {:>8}", column, nulls);
        }
    }

    if let Some(counts) = summary.class_counts {
        section("Class distribution");
        println!(
            "  {:<12} {:>8} {:>9.3}%",
            muted("Normal (0)"),
            counts.normal,
            100.0 - counts.fraud_ratio() * 100.0
        );
        println!(
            "  {:<12} {:>8} {:>9.3}%",
            muted("Fraud (1)"),
            counts.fraud,
            counts.fraud_ratio() * 100.0
        );
    }

    let stats: Vec<_> = [summary.time.as_ref(), summary.amount.as_ref()]
        .into_iter()
        .flatten()
        .collect();
    if !stats.is_empty() {
        section("Statistics");
        println!(
            "  {:<8} {:>12} {:>12} {:>12} {:>12} {:>12}",
            muted("Column"),
            muted("min"),
            muted("median"),
            muted("mean"),
            muted("max"),
            muted("std")
        );
        println!("  {}", dim(&"─".repeat(72)));
        for s in stats {
            println!(
                "  {:<8} {:>12.2} {:>12.2} {:>12.2} {:>12.2} {:>12.2}",
                s.column, s.min, s.median, s.mean, s.max, s.std
            );
        }
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_and_batch() {
        let one = parse_feature_maps(r#"{"Time": 1.0, "Amount": 2.5}"#).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0]["Amount"], 2.5);

        let many = parse_feature_maps(r#"[{"a": 1}, {"a": 2}]"#).unwrap();
        assert_eq!(many.len(), 2);
        assert_eq!(many[1]["a"], 2.0);
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        assert!(parse_feature_maps(r#"{"a": "x"}"#).is_err());
        assert!(parse_feature_maps("42").is_err());
    }

    #[test]
    fn test_strip_ansi() {
        let colored = format!("{}", "hi".red());
        assert_eq!(strip_ansi(&colored), "hi");
    }

    #[test]
    fn test_cli_parses_train_flags() {
        let cli = Cli::try_parse_from([
            "fraud-pipeline",
            "train",
            "--data",
            "d.csv",
            "--output",
            "out",
            "--seed",
            "7",
            "--n-estimators",
            "20",
        ])
        .unwrap();
        match cli.command {
            Commands::Train { seed, n_estimators, test_fraction, .. } => {
                assert_eq!(seed, Some(7));
                assert_eq!(n_estimators, Some(20));
                assert_eq!(test_fraction, None);
            }
            _ => panic!("expected train"),
        }
    }
}
