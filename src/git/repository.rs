//! Git Repository Operations
//!
//! Low-level steps the publisher is built from: staging, change detection,
//! committing, tagging and pushing.

use std::path::Path;

use chrono::{DateTime, Utc};
use git2::{
    Commit, Cred, CredentialType, Error as GitError, ErrorCode, IndexAddOption, Oid, PushOptions,
    RemoteCallbacks, Repository, Signature,
};
use serde::{Deserialize, Serialize};

const DEFAULT_AUTHOR: &str = "TRISH Pipeline";
const DEFAULT_EMAIL: &str = "trish@localhost";

/// Credential callbacks give up after this many attempts
const MAX_AUTH_ATTEMPTS: usize = 3;

/// Git operation errors
#[derive(Debug, thiserror::Error)]
pub enum GitOperationError {
    #[error("Git error: {0}")]
    Git(#[from] GitError),
    #[error("Repository not initialized")]
    NotInitialized,
    #[error("Remote '{0}' not configured")]
    NoRemote(String),
    #[error("Detached HEAD; set a branch to push")]
    DetachedHead,
    #[error("Push rejected: {0}")]
    PushRejected(String),
}

pub type Result<T> = std::result::Result<T, GitOperationError>;

/// Information about a commit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitInfo {
    pub id: String,
    pub short_id: String,
    pub message: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
}

/// Initialize a new Git repository in the given directory
pub fn init_repo(path: &Path) -> Result<Repository> {
    let repo = Repository::init(path)?;
    log::info!("Initialized Git repository at {:?}", path);
    Ok(repo)
}

/// Open an existing Git repository
pub fn open_repo(path: &Path) -> Result<Repository> {
    Repository::open(path).map_err(|e| {
        if e.code() == ErrorCode::NotFound {
            GitOperationError::NotInitialized
        } else {
            GitOperationError::Git(e)
        }
    })
}

/// Convert a git2::Commit to CommitInfo
fn commit_to_info(commit: &Commit) -> CommitInfo {
    let timestamp = DateTime::from_timestamp(commit.time().seconds(), 0)
        .unwrap_or_else(Utc::now);

    CommitInfo {
        id: commit.id().to_string(),
        short_id: commit.id().to_string()[..7].to_string(),
        message: commit.message().unwrap_or("").trim().to_string(),
        author: commit.author().name().unwrap_or("Unknown").to_string(),
        timestamp,
    }
}

/// Stage additions, modifications and deletions; returns the staged tree
pub fn stage_all(repo: &Repository) -> Result<Oid> {
    let mut index = repo.index()?;
    index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
    index.update_all(["*"].iter(), None)?;
    index.write()?;
    Ok(index.write_tree()?)
}

/// Tree of the HEAD commit, or `None` while the branch is unborn
pub fn head_tree(repo: &Repository) -> Result<Option<Oid>> {
    match repo.head() {
        Ok(head) => Ok(Some(head.peel_to_tree()?.id())),
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Whether a staged tree differs from HEAD. An unborn HEAD is the empty tree.
pub fn tree_differs_from_head(repo: &Repository, staged: Oid) -> Result<bool> {
    match head_tree(repo)? {
        Some(head) => Ok(head != staged),
        None => Ok(!repo.find_tree(staged)?.is_empty()),
    }
}

/// Commit a tree on top of HEAD
pub fn commit_tree(repo: &Repository, tree_id: Oid, message: &str) -> Result<CommitInfo> {
    let tree = repo.find_tree(tree_id)?;

    // Get parent commit (if any)
    let parent_commit = repo.head().ok().and_then(|h| h.peel_to_commit().ok());

    let sig = get_signature(repo)?;

    let commit_id = if let Some(parent) = parent_commit {
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])?
    } else {
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[])?
    };

    let commit = repo.find_commit(commit_id)?;
    log::info!("Created commit: {} - {}", &commit_id.to_string()[..7], message);

    Ok(commit_to_info(&commit))
}

/// Stage all changes and create a commit
#[cfg(test)]
pub fn commit_all(path: &Path, message: &str) -> Result<CommitInfo> {
    let repo = open_repo(path)?;
    let tree_id = stage_all(&repo)?;
    commit_tree(&repo, tree_id, message)
}

/// Point a lightweight tag at HEAD, replacing any tag of the same name
pub fn tag_head(repo: &Repository, name: &str) -> Result<Oid> {
    let head = repo.head()?.peel_to_commit()?;
    let oid = repo.tag_lightweight(name, head.as_object(), true)?;
    log::info!("Tagged {} as {}", &head.id().to_string()[..7], name);
    Ok(oid)
}

/// Get or create a signature for commits
fn get_signature(repo: &Repository) -> Result<Signature<'static>> {
    // Try to get from git config
    if let Ok(sig) = repo.signature() {
        return Ok(Signature::now(
            sig.name().unwrap_or(DEFAULT_AUTHOR),
            sig.email().unwrap_or(DEFAULT_EMAIL),
        )?);
    }

    // Fall back to default
    Ok(Signature::now(DEFAULT_AUTHOR, DEFAULT_EMAIL)?)
}

/// Get commit history of the current branch, newest first
#[cfg(test)]
pub fn get_history(path: &Path, limit: usize) -> Result<Vec<CommitInfo>> {
    let repo = open_repo(path)?;

    let mut revwalk = repo.revwalk()?;
    revwalk.push_head()?;
    revwalk.set_sorting(git2::Sort::TIME)?;

    let mut commits = Vec::new();
    for oid_result in revwalk.take(limit) {
        let commit = repo.find_commit(oid_result?)?;
        commits.push(commit_to_info(&commit));
    }

    Ok(commits)
}

/// Get current branch name
pub fn current_branch(repo: &Repository) -> Result<String> {
    let head = repo.head()?;
    if !head.is_branch() {
        return Err(GitOperationError::DetachedHead);
    }
    Ok(head.shorthand().unwrap_or("HEAD").to_string())
}

/// Refspecs for a branch plus every local tag. Only `forced_tag` is forced,
/// so a re-used stamp moves on the remote while other tags never do
pub fn push_refspecs(repo: &Repository, branch: &str, forced_tag: &str) -> Result<Vec<String>> {
    let mut refspecs = vec![format!("refs/heads/{}:refs/heads/{}", branch, branch)];
    for tag in repo.tag_names(None)?.iter().flatten() {
        let force = if tag == forced_tag { "+" } else { "" };
        refspecs.push(format!("{}refs/tags/{}:refs/tags/{}", force, tag, tag));
    }
    Ok(refspecs)
}

/// Credentials from the git credential helper, then the ssh agent
fn credential_callbacks<'a>(repo: &Repository) -> Result<RemoteCallbacks<'a>> {
    let config = repo.config()?;
    let mut attempts = 0;

    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, username_from_url, allowed_types| {
        attempts += 1;
        if attempts > MAX_AUTH_ATTEMPTS {
            return Err(GitError::from_str("authentication failed"));
        }

        if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
            if let Ok(cred) = Cred::credential_helper(&config, url, username_from_url) {
                return Ok(cred);
            }
        }
        if allowed_types.contains(CredentialType::SSH_KEY) {
            if let Some(username) = username_from_url {
                return Cred::ssh_key_from_agent(username);
            }
        }
        Cred::default()
    });
    Ok(callbacks)
}

/// Push refspecs to a remote, failing if the remote rejects any of them
pub fn push(repo: &Repository, remote_name: &str, refspecs: &[String]) -> Result<()> {
    let mut remote = repo
        .find_remote(remote_name)
        .map_err(|_| GitOperationError::NoRemote(remote_name.to_string()))?;

    let mut rejected = Vec::new();
    {
        let mut callbacks = credential_callbacks(repo)?;
        callbacks.push_update_reference(|refname, status| {
            if let Some(message) = status {
                rejected.push(format!("{} ({})", refname, message));
            }
            Ok(())
        });

        let mut push_opts = PushOptions::new();
        push_opts.remote_callbacks(callbacks);
        remote.push(refspecs, Some(&mut push_opts))?;
    }

    if !rejected.is_empty() {
        return Err(GitOperationError::PushRejected(rejected.join(", ")));
    }

    log::info!("Pushed {} refs to {}", refspecs.len(), remote_name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_repo() -> (TempDir, std::path::PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().to_path_buf();
        init_repo(&path).unwrap();
        (temp_dir, path)
    }

    #[test]
    fn test_open_missing_repo() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            open_repo(temp.path()),
            Err(GitOperationError::NotInitialized)
        ));
    }

    #[test]
    fn test_unborn_head_is_empty_tree() {
        let (_temp, path) = create_test_repo();
        let repo = open_repo(&path).unwrap();

        let staged = stage_all(&repo).unwrap();
        assert_eq!(head_tree(&repo).unwrap(), None);
        assert!(!tree_differs_from_head(&repo, staged).unwrap());

        std::fs::write(path.join("deck.apkg"), b"deck").unwrap();
        let staged = stage_all(&repo).unwrap();
        assert!(tree_differs_from_head(&repo, staged).unwrap());
    }

    #[test]
    fn test_commit_and_history() {
        let (_temp, path) = create_test_repo();

        std::fs::write(path.join("file1.txt"), "Content 1").unwrap();
        commit_all(&path, "First commit").unwrap();

        std::fs::write(path.join("file2.txt"), "Content 2").unwrap();
        let commit = commit_all(&path, "Second commit").unwrap();
        assert_eq!(commit.short_id.len(), 7);

        let history = get_history(&path, 10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].message, "Second commit");
        assert_eq!(history[1].message, "First commit");
    }

    #[test]
    fn test_deletions_are_staged() {
        let (_temp, path) = create_test_repo();
        std::fs::write(path.join("old.tsv"), "a\tb\n").unwrap();
        commit_all(&path, "Add export").unwrap();

        std::fs::remove_file(path.join("old.tsv")).unwrap();
        let repo = open_repo(&path).unwrap();
        let staged = stage_all(&repo).unwrap();
        assert!(tree_differs_from_head(&repo, staged).unwrap());
        assert!(repo.find_tree(staged).unwrap().is_empty());
    }

    #[test]
    fn test_tag_head_overwrites() {
        let (_temp, path) = create_test_repo();
        std::fs::write(path.join("a.txt"), "1").unwrap();
        let first = commit_all(&path, "one").unwrap();
        let repo = open_repo(&path).unwrap();
        tag_head(&repo, "v2026.10.19.14-05").unwrap();

        std::fs::write(path.join("a.txt"), "2").unwrap();
        let second = commit_all(&path, "two").unwrap();
        tag_head(&repo, "v2026.10.19.14-05").unwrap();

        let tagged = repo
            .find_reference("refs/tags/v2026.10.19.14-05")
            .unwrap()
            .peel_to_commit()
            .unwrap()
            .id()
            .to_string();
        assert_ne!(tagged, first.id);
        assert_eq!(tagged, second.id);
    }

    #[test]
    fn test_push_refspecs_force_only_the_stamp_tag() {
        let (_temp, path) = create_test_repo();
        std::fs::write(path.join("a.txt"), "1").unwrap();
        commit_all(&path, "one").unwrap();
        let repo = open_repo(&path).unwrap();
        tag_head(&repo, "v2026.10.18.09-00").unwrap();
        tag_head(&repo, "v2026.10.19.14-05").unwrap();

        let branch = current_branch(&repo).unwrap();
        let refspecs = push_refspecs(&repo, &branch, "v2026.10.19.14-05").unwrap();
        assert_eq!(refspecs.len(), 3);
        assert_eq!(refspecs[0], format!("refs/heads/{0}:refs/heads/{0}", branch));
        assert!(refspecs
            .contains(&"+refs/tags/v2026.10.19.14-05:refs/tags/v2026.10.19.14-05".to_string()));
        // Older tags are pushed but never forced
        assert!(refspecs
            .contains(&"refs/tags/v2026.10.18.09-00:refs/tags/v2026.10.18.09-00".to_string()));
    }

    #[test]
    fn test_push_without_remote() {
        let (_temp, path) = create_test_repo();
        let repo = open_repo(&path).unwrap();
        assert!(matches!(
            push(&repo, "origin", &[]),
            Err(GitOperationError::NoRemote(_))
        ));
    }
}
