//! Utility modules for medflow

pub mod data_loader;
pub mod frame;

pub use data_loader::{ColumnInfo, DataLoader, DataSaver, FileInfo};
