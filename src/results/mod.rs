//! Result files
//!
//! Text and CSV artifacts of a run, split across the results, visuals and
//! prepared-data directories.

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::utils::DataSaver;
use polars::prelude::DataFrame;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Which output directory a file belongs in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputDir {
    Results,
    /// Data behind the figures of the report
    Visuals,
    Prepared,
}

/// Writes run artifacts and remembers what it wrote
#[derive(Debug)]
pub struct ResultWriter {
    results_dir: PathBuf,
    visuals_dir: PathBuf,
    prepared_dir: PathBuf,
    written: RefCell<Vec<PathBuf>>,
}

impl ResultWriter {
    pub fn new(
        results_dir: impl Into<PathBuf>,
        visuals_dir: impl Into<PathBuf>,
        prepared_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            results_dir: results_dir.into(),
            visuals_dir: visuals_dir.into(),
            prepared_dir: prepared_dir.into(),
            written: RefCell::new(Vec::new()),
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            config.results_dir.clone(),
            config.visuals_dir(),
            config.prepared_data_dir.clone(),
        )
    }

    pub fn dir(&self, dir: OutputDir) -> &Path {
        match dir {
            OutputDir::Results => &self.results_dir,
            OutputDir::Visuals => &self.visuals_dir,
            OutputDir::Prepared => &self.prepared_dir,
        }
    }

    pub fn path(&self, dir: OutputDir, name: &str) -> PathBuf {
        self.dir(dir).join(name)
    }

    /// Every file written so far, in write order
    pub fn written(&self) -> Vec<PathBuf> {
        self.written.borrow().clone()
    }

    fn record(&self, path: PathBuf) -> PathBuf {
        debug!(path = %path.display(), "wrote result file");
        self.written.borrow_mut().push(path.clone());
        path
    }

    pub fn write_text(&self, dir: OutputDir, name: &str, text: &str) -> Result<PathBuf> {
        let path = self.path(dir, name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, text)?;
        Ok(self.record(path))
    }

    pub fn write_frame(&self, dir: OutputDir, name: &str, df: &DataFrame) -> Result<PathBuf> {
        let path = self.path(dir, name);
        let mut df = df.clone();
        DataSaver::save_csv(&mut df, &path)?;
        Ok(self.record(path))
    }

    /// Like [`write_text`](Self::write_text) but only logs failures
    pub fn try_write_text(&self, dir: OutputDir, name: &str, text: &str) -> Option<PathBuf> {
        self.write_text(dir, name, text)
            .map_err(|e| warn!(file = name, error = %e, "could not write result file"))
            .ok()
    }

    pub fn try_write_frame(&self, dir: OutputDir, name: &str, df: &DataFrame) -> Option<PathBuf> {
        self.write_frame(dir, name, df)
            .map_err(|e| warn!(file = name, error = %e, "could not write result file"))
            .ok()
    }

    /// Run a best-effort step that builds a frame, then write it
    pub fn try_frame_with<F>(&self, dir: OutputDir, name: &str, build: F) -> Option<PathBuf>
    where
        F: FnOnce() -> Result<DataFrame>,
    {
        match build() {
            Ok(df) => self.try_write_frame(dir, name, &df),
            Err(e) => {
                warn!(file = name, error = %e, "skipped result file");
                None
            }
        }
    }
}
