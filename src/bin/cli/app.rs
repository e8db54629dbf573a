use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use trish_lib::config::PipelineConfig;
use trish_lib::workflow::Workflow;

/// Shared state for CLI commands
pub struct App {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub config: PipelineConfig,
}

impl App {
    /// Load the pipeline config for a repository root
    pub fn new(root: &Path, config: &Path) -> Result<Self> {
        if !root.is_dir() {
            anyhow::bail!("Repository root {} is not a directory", root.display());
        }

        let config_path = PipelineConfig::resolve(root, config);
        let config = PipelineConfig::load(&config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?;

        log::debug!("Using config {:?} for {:?}", config_path, root);

        Ok(Self {
            root: root.to_path_buf(),
            config_path,
            config,
        })
    }

    pub fn workflow(&self) -> Workflow {
        Workflow::new(self.config.clone(), self.root.clone())
    }
}
