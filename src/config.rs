//! Pipeline configuration (`trish.toml`)
//!
//! Every field has a default, so a missing file or a partial file both
//! work. Relative paths are resolved against the repository root.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default config file name, looked up in the repository root
pub const CONFIG_FILE_NAME: &str = "trish.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Top-level pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct PipelineConfig {
    /// Source workbook (.ods)
    pub workbook: PathBuf,
    /// Sheet names to export, in build order
    pub sections: Vec<String>,
    /// Directory receiving one TSV per section
    pub export_dir: PathBuf,
    /// Directory receiving the .apkg files
    pub deck_dir: PathBuf,
    /// Deck title; also the prefix of every artifact name
    pub deck_title: String,
    /// Root of the hierarchical card tags
    pub tag_prefix: String,
    /// Preferred text-to-speech voice
    pub voice: String,
    pub page: PageConfig,
    pub publish: PublishConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workbook: PathBuf::from("TRISH.ods"),
            sections: [
                "Skin", "MSK", "Cardio", "Pulm", "Renal", "GI", "Heme", "Neuro", "Endo", "Repro",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            export_dir: PathBuf::from("tsv"),
            deck_dir: PathBuf::from("decks"),
            deck_title: "TRISH".to_string(),
            tag_prefix: "TRISH".to_string(),
            voice: crate::deck::DEFAULT_VOICE.to_string(),
            page: PageConfig::default(),
            publish: PublishConfig::default(),
        }
    }
}

/// Static download page settings (unified workflow only)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct PageConfig {
    pub path: PathBuf,
    pub placeholder: String,
    pub button_class: String,
    pub meta_name: String,
    pub footer_id: String,
    pub footer_label: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("index.html"),
            placeholder: "{{DECK_VERSION}}".to_string(),
            button_class: "download-button".to_string(),
            meta_name: "deck-version".to_string(),
            footer_id: "deck-version".to_string(),
            footer_label: "Version ".to_string(),
        }
    }
}

/// Git publishing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct PublishConfig {
    /// Run the publisher at the end of a workflow
    pub enabled: bool,
    /// Push commit and tags after committing
    pub push: bool,
    pub remote: String,
    /// Branch to push; the checked-out branch when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub message_prefix: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            push: true,
            remote: "origin".to_string(),
            branch: None,
            message_prefix: "Update decks".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load settings from a file, falling back to defaults when it is absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        log::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Save settings as TOML
    #[cfg(test)]
    pub(crate) fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.deck_title.trim().is_empty() {
            return Err(ConfigError::Invalid("deck_title must not be empty".to_string()));
        }
        if self.sections.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::Invalid("section names must not be empty".to_string()));
        }
        Ok(())
    }

    /// Resolve a configured path against the repository root
    pub fn resolve(root: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = PipelineConfig::load(&temp.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config.deck_title, "TRISH");
        assert!(config.publish.enabled);
        assert_eq!(config.publish.remote, "origin");
        assert_eq!(config.page.placeholder, "{{DECK_VERSION}}");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
            sections = ["Cardio", "Renal"]

            [publish]
            push = false
            "#,
        )
        .unwrap();
        assert_eq!(config.sections, vec!["Cardio", "Renal"]);
        assert!(!config.publish.push);
        assert!(config.publish.enabled);
        assert_eq!(config.export_dir, PathBuf::from("tsv"));
        assert_eq!(config.page.footer_id, "deck-version");
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        let mut config = PipelineConfig::default();
        config.deck_title = "Boards".to_string();
        config.publish.branch = Some("main".to_string());
        config.save(&path).unwrap();

        let loaded = PipelineConfig::load(&path).unwrap();
        assert_eq!(loaded.deck_title, "Boards");
        assert_eq!(loaded.publish.branch.as_deref(), Some("main"));
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "sections = [").unwrap();
        let err = PipelineConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_empty_title_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "deck_title = \"  \"").unwrap();
        assert!(matches!(
            PipelineConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_resolve_relative_paths() {
        let root = Path::new("/repo");
        assert_eq!(
            PipelineConfig::resolve(root, Path::new("tsv")),
            PathBuf::from("/repo/tsv")
        );
        assert_eq!(
            PipelineConfig::resolve(root, Path::new("/abs/x.ods")),
            PathBuf::from("/abs/x.ods")
        );
    }
}
