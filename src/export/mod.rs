//! Section export
//!
//! Flattens one workbook sheet into a tab-separated file.

mod tsv;

pub use tsv::*;

use thiserror::Error;

use crate::spreadsheet::SpreadsheetError;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Workbook error: {0}")]
    Spreadsheet(#[from] SpreadsheetError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;
