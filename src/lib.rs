pub mod config;
pub mod deck;
pub mod export;
pub mod git;
pub mod publish;
pub mod spreadsheet;
pub mod stamp;
pub mod workflow;

pub use config::PipelineConfig;
pub use stamp::VersionStamp;
pub use workflow::{Mode, RunReport, Workflow};
