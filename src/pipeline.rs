//! End-to-end run: resolve, load, prepare, dispatch

use crate::analysis::{run_analysis, AnalysisOutcome};
use crate::config::{AnalysisConfig, AnalysisKind, ConfigResolver};
use crate::error::Result;
use crate::preprocessing::DataPreparer;
use crate::results::{OutputDir, ResultWriter};
use crate::utils::{DataLoader, DataSaver};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// What one run did
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub kind: AnalysisKind,
    pub started_at: DateTime<Local>,
    pub rows: usize,
    pub target: String,
    pub predictors: Vec<String>,
    pub prepared_path: PathBuf,
    pub outcome: AnalysisOutcome,
    pub files: Vec<PathBuf>,
    pub elapsed_secs: f64,
}

/// A configured run over one dataset
pub struct Pipeline {
    config: AnalysisConfig,
}

impl Pipeline {
    /// Validate `config` and create its output directories
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        ConfigResolver::prepare_directories(&config)?;
        Ok(Self { config })
    }

    /// Resolve the marker file and its settings file
    pub fn from_marker(marker: &Path) -> Result<Self> {
        let config = ConfigResolver::new(marker).resolve()?;
        Self::new(config)
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn run(&self) -> Result<RunSummary> {
        let start = Instant::now();
        let started_at = Local::now();
        let config = &self.config;
        info!(analysis = %config.config_type, data = %config.raw_data_path.display(), "starting run");

        let raw = DataLoader::new().load_csv(&config.raw_data_path)?;
        let prepared = DataPreparer::new(config).prepare(&raw)?;

        let prepared_path = config.prepared_data_path();
        let mut model_frame = prepared.model_frame()?;
        DataSaver::save_csv(&mut model_frame, &prepared_path)?;
        info!(path = %prepared_path.display(), "saved prepared data");

        let writer = ResultWriter::from_config(config);
        let outcome = run_analysis(&prepared, config, &writer)?;

        let (metric, value) = outcome.headline();
        let elapsed_secs = start.elapsed().as_secs_f64();
        info!(metric, value, elapsed_secs, "run complete");

        let mut summary = RunSummary {
            kind: config.config_type,
            started_at,
            rows: prepared.n_rows(),
            target: prepared.target.clone(),
            predictors: prepared.predictors.clone(),
            prepared_path,
            outcome,
            files: Vec::new(),
            elapsed_secs,
        };
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => {
                writer.try_write_text(OutputDir::Results, "run_summary.json", &json);
            }
            Err(e) => warn!(error = %e, "run summary not serialized"),
        }
        summary.files = writer.written();
        Ok(summary)
    }
}
