//! medflow CLI Module
//!
//! Command-line interface for running a configured analysis, bootstrapping
//! settings files and inspecting data.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::analysis::AnalysisOutcome;
use crate::config::{AnalysisKind, ConfigResolver, DEFAULT_MARKER_FILE};
use crate::pipeline::{Pipeline, RunSummary};
use crate::utils::DataLoader;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<16} {}", muted(key), val.white());
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    println!("  {} {}...", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("  {} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn indented(block: &str) {
    for line in block.lines() {
        println!("    {}", line);
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "medflow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Configuration-driven analysis pipeline for tabular medical data")]
#[command(long_about = None)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

fn parse_kind(s: &str) -> Result<AnalysisKind, String> {
    s.parse::<AnalysisKind>().map_err(|e| e.to_string())
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the analysis selected by the marker file (default)
    Run {
        /// Marker file naming the analysis type
        #[arg(short, long, default_value = DEFAULT_MARKER_FILE)]
        marker: PathBuf,
    },

    /// Write a marker file and preset settings for an analysis type
    Init {
        /// Analysis type (knn, naive_bayes, linear, logistic, pca_analysis)
        #[arg(short, long, value_parser = parse_kind)]
        kind: AnalysisKind,

        /// Directory to write into
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },

    /// Show column types and missing counts of a CSV file
    Info {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,
    },
}

// ─── Run ───────────────────────────────────────────────────────────────────────

pub fn cmd_run(marker: &Path) -> anyhow::Result<RunSummary> {
    section("Run");

    step_run("Resolving configuration");
    let pipeline = Pipeline::from_marker(marker)?;
    let config = pipeline.config();
    step_done(&format!("{} → target {}", config.config_type, config.target_column));

    step_run(&format!("Running {}", config.config_type.to_string().cyan()));
    let start = Instant::now();
    let summary = pipeline.run()?;
    step_done(&format!("{:.2?}", start.elapsed()));

    print_summary(&summary);
    Ok(summary)
}

fn print_summary(summary: &RunSummary) {
    section("Data");
    kv("Started", &summary.started_at.format("%Y-%m-%d %H:%M:%S").to_string());
    kv("Rows", &summary.rows.to_string());
    kv("Target", &summary.target);
    kv("Predictors", &summary.predictors.len().to_string());
    kv("Prepared", &summary.prepared_path.display().to_string());

    match &summary.outcome {
        AnalysisOutcome::Regression(r) => {
            section("Regression");
            kv("R²", &format!("{:.4}", r.r_squared));
            kv("Adj. R²", &format!("{:.4}", r.adj_r_squared));
            kv("MSE", &format!("{:.4}", r.mse));
            kv("VIF dropped", &r.vif.dropped.len().to_string());
        }
        AnalysisOutcome::Pca(p) => {
            section("PCA");
            for (name, ratio) in p.components.iter().zip(&p.cumulative_variance_ratio) {
                kv(name, &format!("{:.2}% cumulative", ratio * 100.0));
            }
        }
        AnalysisOutcome::Classification(_) => {}
    }

    if let Some(c) = summary.outcome.classification() {
        section("Classification");
        kv("Accuracy", &format!("{:.4}", c.accuracy()).bold().to_string());
        if let Some(auc) = c.auc() {
            kv("ROC AUC", &format!("{:.4}", auc));
        }
        if let Some(cv) = c.cv_mean() {
            kv("CV accuracy", &format!("{:.4}", cv));
        }
        println!();
        indented(&c.confusion.to_text(&c.class_names));
        indented(&c.report.to_text());
    }

    section("Files");
    for file in &summary.files {
        step_ok(&file.display().to_string());
    }
    println!();
}

// ─── Init ──────────────────────────────────────────────────────────────────────

pub fn cmd_init(kind: AnalysisKind, dir: &Path, force: bool) -> anyhow::Result<()> {
    section("Init");
    let (marker, settings) = ConfigResolver::write_template(dir, kind, force)?;
    step_ok(&format!("marker   {}", marker.display()));
    step_ok(&format!("settings {}", settings.display()));
    println!();
    println!("  {}", dim(&format!("run with: medflow run --marker {}", marker.display())));
    println!();
    Ok(())
}

// ─── Info ──────────────────────────────────────────────────────────────────────

pub fn cmd_info(data_path: &Path) -> anyhow::Result<()> {
    section("Data Info");

    let info = DataLoader::new().file_info(data_path)?;

    kv("File", &info.path);
    kv("Rows", &info.n_rows.to_string());
    kv("Columns", &info.columns.len().to_string());
    kv("Size", &format!("{:.2} MB", info.file_size as f64 / 1024.0 / 1024.0));
    println!();

    println!("  {:<24} {:<12} {:>6}", muted("Column"), muted("Type"), muted("Nulls"));
    println!("  {}", dim(&"─".repeat(46)));
    for col in &info.columns {
        let nulls = if col.null_count > 0 {
            col.null_count.to_string().yellow()
        } else {
            col.null_count.to_string().normal()
        };
        println!("  {:<24} {:<12} {:>6}", col.name, muted(&col.dtype), nulls);
    }
    println!();
    Ok(())
}
