//! End-to-end pipeline runs
//!
//! A run goes stamp → export every section → build deck(s) → update the
//! download page (unified mode only) → publish. The first failing stage
//! stops the run; files written by earlier stages stay on disk.

mod engine;

pub use engine::*;

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::deck::DeckError;
use crate::export::ExportError;
use crate::git::GitOperationError;
use crate::publish::PageError;
use crate::spreadsheet::SpreadsheetError;

/// Which decks a run produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// One deck per section
    PerSubject,
    /// One deck spanning all sections, plus the download page
    Unified,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::PerSubject => write!(f, "per-subject"),
            Mode::Unified => write!(f, "unified"),
        }
    }
}

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Export,
    Build,
    PageUpdate,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Export => write!(f, "export"),
            Stage::Build => write!(f, "build"),
            Stage::PageUpdate => write!(f, "page update"),
            Stage::Publish => write!(f, "publish"),
        }
    }
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Cannot open workbook {path}: {source}")]
    Workbook {
        path: PathBuf,
        #[source]
        source: SpreadsheetError,
    },

    #[error("Export of section '{section}' failed: {source}")]
    Export {
        section: String,
        #[source]
        source: ExportError,
    },

    #[error("Building deck '{title}' failed: {source}")]
    Build {
        title: String,
        #[source]
        source: DeckError,
    },

    #[error("Page update failed: {0}")]
    Page(#[from] PageError),

    #[error("Publish failed: {0}")]
    Publish(#[from] GitOperationError),
}

impl WorkflowError {
    /// The stage the run stopped at
    pub fn stage(&self) -> Stage {
        match self {
            WorkflowError::Workbook { .. } | WorkflowError::Export { .. } => Stage::Export,
            WorkflowError::Build { .. } => Stage::Build,
            WorkflowError::Page(_) => Stage::PageUpdate,
            WorkflowError::Publish(_) => Stage::Publish,
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
