//! Commit, tag and push a run's output
//!
//! Publishing is skipped entirely when the staged tree equals HEAD's tree,
//! so re-running with unchanged content leaves history and remote alone.

use std::path::Path;

use serde::Serialize;

use crate::config::PublishConfig;
use crate::stamp::VersionStamp;

use super::repository::{
    commit_tree, current_branch, open_repo, push, push_refspecs, stage_all, tag_head,
    tree_differs_from_head, CommitInfo, Result,
};

/// Publisher settings
#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub remote: String,
    /// Branch to push; the checked-out branch when `None`
    pub branch: Option<String>,
    pub message_prefix: String,
    pub push: bool,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self::from(&PublishConfig::default())
    }
}

impl From<&PublishConfig> for PublishOptions {
    fn from(config: &PublishConfig) -> Self {
        Self {
            remote: config.remote.clone(),
            branch: config.branch.clone(),
            message_prefix: config.message_prefix.clone(),
            push: config.push,
        }
    }
}

impl PublishOptions {
    pub fn commit_message(&self, stamp: &VersionStamp) -> String {
        format!("{} {}", self.message_prefix, stamp)
    }
}

/// What the publisher did
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PublishOutcome {
    /// Staged tree equals HEAD; nothing committed, tagged or pushed
    NoChanges,
    Published {
        commit: CommitInfo,
        tag: String,
        /// Refs pushed, empty when pushing is disabled
        pushed: Vec<String>,
    },
}

impl PublishOutcome {
    pub fn is_no_op(&self) -> bool {
        matches!(self, PublishOutcome::NoChanges)
    }
}

/// Stage everything under `repo_path` and publish it as `stamp`
pub fn publish(
    repo_path: &Path,
    stamp: &VersionStamp,
    options: &PublishOptions,
) -> Result<PublishOutcome> {
    let repo = open_repo(repo_path)?;

    let staged = stage_all(&repo)?;
    if !tree_differs_from_head(&repo, staged)? {
        log::info!("No changes to publish for {}", stamp);
        return Ok(PublishOutcome::NoChanges);
    }

    let commit = commit_tree(&repo, staged, &options.commit_message(stamp))?;
    let tag = stamp.to_string();
    tag_head(&repo, &tag)?;

    let pushed = if options.push {
        let branch = match &options.branch {
            Some(branch) => branch.clone(),
            None => current_branch(&repo)?,
        };
        let refspecs = push_refspecs(&repo, &branch, &tag)?;
        push(&repo, &options.remote, &refspecs)?;
        refspecs
    } else {
        log::info!("Push disabled; {} stays local", tag);
        Vec::new()
    };

    Ok(PublishOutcome::Published {
        commit,
        tag,
        pushed,
    })
}
