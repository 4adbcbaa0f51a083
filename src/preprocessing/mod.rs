//! Data preprocessing module
//!
//! Turns the raw medical table into a numeric modelling frame:
//! - Median / mode imputation
//! - IQR outlier handling with median re-imputation
//! - Drop-first dummy encoding
//! - Standard scaling
//! - Variance-inflation-factor filtering

mod cleaner;
mod encoder;
mod imputer;
mod pipeline;
mod scaler;
pub mod feature_selection;
pub mod outlier;

pub use cleaner::{CleaningReport, DataCleaner};
pub use encoder::{binary_indicator, indicator_name, sorted_levels, DummyEncoder, EncodedColumn};
pub use feature_selection::{compute_vif, VifEntry, VifFilter, VifReport};
pub use imputer::{mode, FillValue, ImputeStrategy, Imputer, UNKNOWN_LEVEL};
pub use outlier::{OutlierBounds, OutlierCapper};
pub use pipeline::{DataPreparer, PreparedData};
pub use scaler::{ScalerParams, StandardScaler};
