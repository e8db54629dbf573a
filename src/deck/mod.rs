//! Flashcard deck generation
//!
//! This module provides:
//! - Loading and merging section exports
//! - Card generation with text-to-speech fields and hierarchical tags
//! - Stable deck, note type and note identities
//! - Writing and inspecting `.apkg` packages

pub mod builder;
pub mod identity;
pub mod models;
pub mod package;

use std::path::PathBuf;

use thiserror::Error;

pub use builder::{build_deck, default_output_path, BuildSummary, DeckOptions};
pub use models::*;
pub use package::{read_summary, DeckSummary, NoteRecord};

/// Voice tried first by the study client's text-to-speech
pub const DEFAULT_VOICE: &str = "Apple_Evan_(Enhanced)";

/// Voices appended after the preferred one
pub const FALLBACK_VOICES: &[&str] = &[
    "Apple_Evan_(Enhanced)",
    "Microsoft_David",
    "Microsoft_Zira",
    "Google_US_English",
];

#[derive(Error, Debug)]
pub enum DeckError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Malformed input {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("No data found for deck '{0}'")]
    NoData(String),

    #[error("Invalid package: {0}")]
    InvalidPackage(String),
}

pub type Result<T> = std::result::Result<T, DeckError>;
