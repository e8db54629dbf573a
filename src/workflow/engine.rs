use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::PipelineConfig;
use crate::deck::{build_deck, BuildSummary, DeckOptions};
use crate::export::{export_from_workbook, ExportSummary};
use crate::git::{publish, PublishOptions, PublishOutcome};
use crate::publish::{update_page, PageMarkers, PageUpdate};
use crate::spreadsheet::Workbook;
use crate::stamp::VersionStamp;

use super::{Mode, Result, Stage, WorkflowError};

/// Everything one run produced
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub mode: Mode,
    pub stamp: VersionStamp,
    pub exports: Vec<ExportSummary>,
    pub decks: Vec<BuildSummary>,
    /// Unified runs only
    pub page: Option<PageUpdate>,
    /// `None` when publishing is disabled
    pub publish: Option<PublishOutcome>,
}

/// Runs the pipeline for one repository
#[derive(Debug, Clone)]
pub struct Workflow {
    config: PipelineConfig,
    root: PathBuf,
}

impl Workflow {
    pub fn new(config: PipelineConfig, root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            root: root.into(),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        PipelineConfig::resolve(&self.root, path)
    }

    /// `<export_dir>/<section>.tsv`
    pub fn export_path(&self, section: &str) -> PathBuf {
        self.resolve(&self.config.export_dir)
            .join(format!("{}.tsv", section))
    }

    /// `<title>-<section>-<stamp>.apkg`, or `<title>-<stamp>.apkg` for the
    /// unified deck
    pub fn artifact_name(&self, section: Option<&str>, stamp: &VersionStamp) -> String {
        match section {
            Some(section) => format!("{}-{}-{}.apkg", self.config.deck_title, section, stamp),
            None => format!("{}-{}.apkg", self.config.deck_title, stamp),
        }
    }

    fn deck_options(&self, title: String, output: PathBuf, stamp: &VersionStamp) -> DeckOptions {
        DeckOptions {
            title,
            output,
            version: stamp.to_string(),
            voice: self.config.voice.clone(),
            tag_prefix: self.config.tag_prefix.clone(),
        }
    }

    /// Run every stage for `mode`
    pub fn run(&self, mode: Mode, stamp: &VersionStamp) -> Result<RunReport> {
        log::info!("Starting {} run {} in {:?}", mode, stamp, self.root);

        let exports = self.export_sections()?;

        log::info!("[{}] {} mode", Stage::Build, mode);
        let decks = match mode {
            Mode::PerSubject => self.build_per_subject(stamp)?,
            Mode::Unified => vec![self.build_unified(stamp)?],
        };

        let page = match mode {
            Mode::Unified => Some(self.update_page(stamp)?),
            Mode::PerSubject => None,
        };

        let publish = if self.config.publish.enabled {
            Some(self.publish(stamp)?)
        } else {
            log::info!("[{}] disabled in config", Stage::Publish);
            None
        };

        log::info!("Finished {} run {}", mode, stamp);
        Ok(RunReport {
            mode,
            stamp: *stamp,
            exports,
            decks,
            page,
            publish,
        })
    }

    /// Export every configured section from the workbook
    pub fn export_sections(&self) -> Result<Vec<ExportSummary>> {
        let workbook_path = self.resolve(&self.config.workbook);
        log::info!("[{}] reading {:?}", Stage::Export, workbook_path);

        let workbook =
            Workbook::open(&workbook_path).map_err(|source| WorkflowError::Workbook {
                path: workbook_path.clone(),
                source,
            })?;

        self.config
            .sections
            .iter()
            .map(|section| {
                export_from_workbook(&workbook, section, &self.export_path(section)).map_err(
                    |source| WorkflowError::Export {
                        section: section.clone(),
                        source,
                    },
                )
            })
            .collect()
    }

    fn build(&self, options: DeckOptions, inputs: &[PathBuf]) -> Result<BuildSummary> {
        build_deck(&options, inputs).map_err(|source| WorkflowError::Build {
            title: options.title.clone(),
            source,
        })
    }

    /// One deck per section, titled `<title>::<section>`
    pub fn build_per_subject(&self, stamp: &VersionStamp) -> Result<Vec<BuildSummary>> {
        let deck_dir = self.resolve(&self.config.deck_dir);

        self.config
            .sections
            .iter()
            .map(|section| {
                let options = self.deck_options(
                    format!("{}::{}", self.config.deck_title, section),
                    deck_dir.join(self.artifact_name(Some(section), stamp)),
                    stamp,
                );
                self.build(options, &[self.export_path(section)])
            })
            .collect()
    }

    /// One deck spanning every section
    pub fn build_unified(&self, stamp: &VersionStamp) -> Result<BuildSummary> {
        let inputs: Vec<PathBuf> = self
            .config
            .sections
            .iter()
            .map(|section| self.export_path(section))
            .collect();
        let options = self.deck_options(
            self.config.deck_title.clone(),
            self.resolve(&self.config.deck_dir)
                .join(self.artifact_name(None, stamp)),
            stamp,
        );
        self.build(options, &inputs)
    }

    /// Point the download page at the unified deck
    pub fn update_page(&self, stamp: &VersionStamp) -> Result<PageUpdate> {
        let path = self.resolve(&self.config.page.path);
        log::info!("[{}] {:?}", Stage::PageUpdate, path);
        let markers = PageMarkers::from(&self.config.page);
        Ok(update_page(
            &path,
            stamp,
            &self.artifact_name(None, stamp),
            &markers,
        )?)
    }

    /// Commit, tag and push whatever the run changed
    pub fn publish(&self, stamp: &VersionStamp) -> Result<PublishOutcome> {
        log::info!("[{}] {:?}", Stage::Publish, self.root);
        let options = PublishOptions::from(&self.config.publish);
        Ok(publish(&self.root, stamp, &options)?)
    }
}
