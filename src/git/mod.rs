//! Git Integration Module
//!
//! Publishes pipeline output through the repository it lives in:
//! - Stage all changes and detect whether anything differs from HEAD
//! - Commit with a version-stamped message
//! - Tag the commit with the stamp, replacing an existing tag
//! - Push the branch and tags to the configured remote

mod publisher;
mod repository;

pub use publisher::*;
pub use repository::*;
