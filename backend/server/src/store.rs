//! # Record Store
//!
//! Materializes every expenditure record from the CSV dataset.
//!
//! ## Layout
//! - Header row naming at least `cidade`, `ano`, `Saúde`, `Educação`, `Transporte`
//! - Extra columns are ignored
//! - Fields are kept verbatim, amounts stay as text until lookup
//!
//! ## Notes
//! - Every call opens and fully consumes the file, there is no short-circuit
//!   on the first match.
//! - Any failure aborts the whole load, no partial results.
use std::{
    fs::File,
    path::{Path, PathBuf},
};

use csv::ReaderBuilder;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const CITY_COLUMN: &str = "cidade";
pub const YEAR_COLUMN: &str = "ano";
pub const HEALTH_COLUMN: &str = "Saúde";
pub const EDUCATION_COLUMN: &str = "Educação";
pub const TRANSPORT_COLUMN: &str = "Transporte";

pub const REQUIRED_COLUMNS: [&str; 5] = [
    CITY_COLUMN,
    YEAR_COLUMN,
    HEALTH_COLUMN,
    EDUCATION_COLUMN,
    TRANSPORT_COLUMN,
];

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open dataset {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed dataset {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("Dataset {path} is missing required column `{column}`")]
    MissingColumn { path: PathBuf, column: &'static str },
}

/// One row of the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExpenditureRecord {
    pub cidade: String,

    pub ano: String,

    #[serde(rename = "Saúde")]
    pub saude: String,

    #[serde(rename = "Educação")]
    pub educacao: String,

    #[serde(rename = "Transporte")]
    pub transporte: String,
}

pub fn load_records(path: &Path) -> Result<Vec<ExpenditureRecord>, StoreError> {
    let csv_error = |source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(|source| StoreError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

    let headers = reader.headers().map_err(csv_error)?;
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|header| header == column) {
            return Err(StoreError::MissingColumn {
                path: path.to_path_buf(),
                column,
            });
        }
    }

    let records = reader
        .deserialize::<ExpenditureRecord>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(csv_error)?;

    debug!("Loaded {} records from {}", records.len(), path.display());

    Ok(records)
}
