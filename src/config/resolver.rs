//! Marker-file driven configuration resolution

use super::{AnalysisConfig, AnalysisKind};
use crate::error::{MedflowError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Marker file looked up when no path is given
pub const DEFAULT_MARKER_FILE: &str = "analysis.cfg";

/// Extract the `CONFIG_TYPE` value from marker file contents.
///
/// The first line starting with `CONFIG_TYPE` is used. Anything after `#`
/// is a comment, and surrounding single or double quotes are stripped.
pub fn parse_marker(contents: &str) -> Option<String> {
    let line = contents
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("CONFIG_TYPE"))?;

    let (_, value) = line.split_once('=')?;
    let value = value
        .split('#')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();

    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Resolves a marker file into a validated [`AnalysisConfig`]
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    marker_path: PathBuf,
}

impl ConfigResolver {
    pub fn new(marker_path: impl Into<PathBuf>) -> Self {
        Self {
            marker_path: marker_path.into(),
        }
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker_path
    }

    /// Directory holding the marker; settings files live next to it
    pub fn base_dir(&self) -> PathBuf {
        match self.marker_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    pub fn settings_path(&self, kind: AnalysisKind) -> PathBuf {
        self.base_dir().join(kind.settings_file_name())
    }

    /// Read the analysis kind named by the marker file
    pub fn read_kind(&self) -> Result<AnalysisKind> {
        if !self.marker_path.exists() {
            return Err(MedflowError::ConfigError(format!(
                "marker file '{}' was not found",
                self.marker_path.display()
            )));
        }

        let contents = fs::read_to_string(&self.marker_path)?;
        let value = parse_marker(&contents)
            .ok_or_else(|| MedflowError::MissingMarker(self.marker_path.clone()))?;
        debug!(marker = %self.marker_path.display(), value = %value, "parsed CONFIG_TYPE");

        value.parse()
    }

    /// Load, rebase and validate the settings named by the marker
    pub fn resolve(&self) -> Result<AnalysisConfig> {
        let kind = self.read_kind()?;
        let settings_path = self.settings_path(kind);
        let mut config = Self::load_settings(&settings_path)?;

        if config.config_type != kind {
            return Err(MedflowError::ConfigError(format!(
                "marker selects '{}' but {} declares config_type '{}'",
                kind,
                settings_path.display(),
                config.config_type
            )));
        }

        config.resolve_paths(&self.base_dir());
        config.validate()?;

        info!(
            kind = %kind,
            settings = %settings_path.display(),
            target = %config.target_column,
            "configuration resolved"
        );
        Ok(config)
    }

    /// Parse a settings file without any rebasing or validation
    pub fn load_settings(path: &Path) -> Result<AnalysisConfig> {
        if !path.exists() {
            return Err(MedflowError::SettingsNotFound(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            MedflowError::ConfigError(format!("invalid settings file {}: {}", path.display(), e))
        })
    }

    /// Create the results, visuals and prepared-data directories
    pub fn prepare_directories(config: &AnalysisConfig) -> Result<()> {
        for dir in [
            config.results_dir.clone(),
            config.visuals_dir(),
            config.prepared_data_dir.clone(),
        ] {
            fs::create_dir_all(&dir)?;
            debug!(dir = %dir.display(), "ensured directory");
        }
        Ok(())
    }

    /// Write a marker file and the preset settings for `kind` into `dir`.
    ///
    /// Existing files are left alone unless `force` is set.
    pub fn write_template(dir: &Path, kind: AnalysisKind, force: bool) -> Result<(PathBuf, PathBuf)> {
        fs::create_dir_all(dir)?;
        let marker = dir.join(DEFAULT_MARKER_FILE);
        let settings = dir.join(kind.settings_file_name());

        for path in [&marker, &settings] {
            if path.exists() && !force {
                return Err(MedflowError::ConfigError(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                )));
            }
        }

        fs::write(
            &marker,
            format!("CONFIG_TYPE = '{}'  # one of knn, naive_bayes, linear, logistic, pca_analysis\n", kind),
        )?;
        let preset = AnalysisConfig::preset(kind);
        fs::write(&settings, serde_json::to_string_pretty(&preset)?)?;

        info!(marker = %marker.display(), settings = %settings.display(), "wrote configuration template");
        Ok((marker, settings))
    }
}
