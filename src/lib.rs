//! medflow - configuration-driven statistical analysis of tabular health data
//!
//! A run reads one raw CSV, prepares it (cleaning, imputation, outlier
//! capping, dummy encoding, optional scaling), saves the prepared frame and
//! dispatches to one of five analyses selected by the configuration.
//!
//! # Modules
//!
//! ## Configuration
//! - [`config`] - Marker file, settings resolution and presets
//!
//! ## Data preparation
//! - [`preprocessing`] - Cleaning, encoding, scaling, VIF filtering
//! - [`utils`] - CSV loading/saving and frame helpers
//!
//! ## Modelling
//! - [`training`] - KNN, naive Bayes, linear/logistic/lasso models, metrics
//! - [`decomposition`] - Principal component analysis
//! - [`analysis`] - The five analysis runners and their outcomes
//!
//! ## Orchestration
//! - [`pipeline`] - End-to-end run
//! - [`results`] - Output files
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Configuration
pub mod config;

// Data preparation
pub mod preprocessing;
pub mod utils;

// Modelling
pub mod training;
pub mod decomposition;
pub mod analysis;

// Orchestration
pub mod pipeline;
pub mod results;
pub mod cli;

pub use error::{MedflowError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{MedflowError, Result};

    // Configuration
    pub use crate::config::{
        AnalysisConfig, AnalysisKind, CleaningConfig, ColumnSpec, ConfigResolver,
    };

    // Preparation
    pub use crate::preprocessing::{
        DataCleaner, DataPreparer, DummyEncoder, PreparedData, StandardScaler, VifFilter,
    };

    // Modelling
    pub use crate::training::{
        ClassificationReport, ConfusionMatrix, GaussianNaiveBayes, KNNClassifier,
        LinearRegression, LogisticRegression, ReductionMethod,
    };
    pub use crate::decomposition::Pca;

    // Analysis and orchestration
    pub use crate::analysis::{run_analysis, AnalysisOutcome};
    pub use crate::pipeline::{Pipeline, RunSummary};
    pub use crate::results::{OutputDir, ResultWriter};
    pub use crate::utils::{DataLoader, DataSaver};
}
