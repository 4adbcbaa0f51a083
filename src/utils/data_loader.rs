//! CSV loading and saving

use crate::error::{MedflowError, Result};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;
use tracing::{debug, info};

/// Reads the raw record table
pub struct DataLoader {
    /// Rows scanned when inferring column types
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: 10_000,
        }
    }

    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows.max(1);
        self
    }

    /// Load a header-ful CSV file
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path).map_err(|e| {
            MedflowError::DataError(format!("cannot open {}: {}", path.display(), e))
        })?;

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| MedflowError::DataError(format!("cannot parse {}: {}", path.display(), e)))?;

        info!(path = %path.display(), rows = df.height(), columns = df.width(), "loaded data");
        Ok(df)
    }

    /// Row and column overview of a CSV file
    pub fn file_info(&self, path: &Path) -> Result<FileInfo> {
        let file_size = fs::metadata(path)?.len();
        let df = self.load_csv(path)?;

        let columns = df
            .get_columns()
            .iter()
            .map(|c| ColumnInfo {
                name: c.name().to_string(),
                dtype: c.dtype().to_string(),
                null_count: c.null_count(),
            })
            .collect();

        Ok(FileInfo {
            path: path.display().to_string(),
            file_size,
            n_rows: df.height(),
            columns,
        })
    }
}

/// File information
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub path: String,
    pub file_size: u64,
    pub n_rows: usize,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: String,
    pub null_count: usize,
}

/// Writes frames to disk
pub struct DataSaver;

impl DataSaver {
    /// Save to CSV, creating parent directories first
    pub fn save_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = File::create(path)?;
        CsvWriter::new(&mut file)
            .finish(df)
            .map_err(|e| MedflowError::DataError(e.to_string()))?;

        debug!(path = %path.display(), rows = df.height(), "saved csv");
        Ok(())
    }
}
