//! Repository synchronization.
//!
//! [`RepoSyncer`] keeps a local working copy per repository URL inside a
//! storage directory and delegates all version-control mechanics to the
//! external `git` binary via [`tokio::process::Command`].
//!
//! Concurrent syncs of the **same** URL race on the same working directory;
//! serializing them is the caller's responsibility.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info};

use crate::descriptor;
use crate::error::SyncError;
use crate::metadata::ResourceMetadata;

/// README file names probed in the metadata root, first match wins.
const README_CANDIDATES: [&str; 3] = ["README.md", "README.MD", "readme.md"];

/// Outcome of a successful sync.
#[derive(Debug)]
pub struct RepoSyncResult {
    /// Normalized descriptor metadata; `repo` is always populated.
    pub metadata: ResourceMetadata,
    /// Root of the local working copy.
    pub repo_path: PathBuf,
    /// Directory the descriptor was loaded from (`repo_path` + subpath).
    pub metadata_root: PathBuf,
    /// README contents from the metadata root, if one exists.
    pub readme: Option<String>,
}

/// Synchronizes git repositories into a local storage directory.
#[derive(Debug, Clone)]
pub struct RepoSyncer {
    storage_dir: PathBuf,
}

impl RepoSyncer {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self { storage_dir: storage_dir.into() }
    }

    /// Local working-copy directory for `repo_url`.
    pub fn repo_dir(&self, repo_url: &str) -> PathBuf {
        self.storage_dir.join(repo_dir_name(repo_url))
    }

    /// Ensure a current working copy of `repo_url` exists, then load the
    /// descriptor from it.
    ///
    /// An existing working copy is fetched, switched to the requested branch
    /// (or its current branch), and fast-forwarded.  Anything else in the way
    /// — including a directory that is not a git checkout — is removed and
    /// replaced by a fresh clone.
    pub async fn sync(
        &self,
        repo_url: &str,
        branch: Option<&str>,
        subpath: Option<&str>,
    ) -> Result<RepoSyncResult, SyncError> {
        tokio::fs::create_dir_all(&self.storage_dir).await?;
        let repo_path = self.repo_dir(repo_url);

        if repo_path.join(".git").is_dir() {
            debug!(repo_url, path = %repo_path.display(), "updating existing working copy");
            git(Some(&repo_path), &["fetch", "origin"]).await?;
            let branch_name = match branch {
                Some(requested) => requested.to_owned(),
                None => git(Some(&repo_path), &["rev-parse", "--abbrev-ref", "HEAD"]).await?,
            };
            git(Some(&repo_path), &["checkout", &branch_name]).await?;
            git(Some(&repo_path), &["pull", "--ff-only", "origin", &branch_name]).await?;
        } else {
            if repo_path.exists() {
                // Leftover non-git debris; a clone needs an empty target.
                tokio::fs::remove_dir_all(&repo_path).await?;
            }
            info!(repo_url, path = %repo_path.display(), "cloning repository");
            let target = repo_path.to_string_lossy().into_owned();
            git(None, &["clone", repo_url, &target]).await?;
            if let Some(requested) = branch {
                git(Some(&repo_path), &["checkout", requested]).await?;
            }
        }

        let metadata_root = match subpath {
            Some(sub) => repo_path.join(sub),
            None => repo_path.clone(),
        };

        let mut metadata = descriptor::load_metadata(&metadata_root)?;
        if metadata.repo.is_none() {
            metadata.repo = Some(repo_url.to_owned());
        }

        let readme = read_readme(&metadata_root).await;

        Ok(RepoSyncResult { metadata, repo_path, metadata_root, readme })
    }
}

/// Run a git subcommand, returning trimmed stdout.
async fn git(cwd: Option<&Path>, args: &[&str]) -> Result<String, SyncError> {
    let mut cmd = Command::new("git");
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    let output = cmd.output().await?;
    if !output.status.success() {
        return Err(SyncError::Git {
            op: args.first().copied().unwrap_or("git").to_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
}

async fn read_readme(root: &Path) -> Option<String> {
    for candidate in README_CANDIDATES {
        if let Ok(contents) = tokio::fs::read_to_string(root.join(candidate)).await {
            return Some(contents);
        }
    }
    None
}

/// Deterministic directory name for a repository URL: the basename of the
/// URL's path component, `.git` stripped, spaces replaced with hyphens,
/// falling back to `"repo"` when the URL has no path.
fn repo_dir_name(repo_url: &str) -> String {
    let without_scheme = repo_url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(repo_url);
    let path = without_scheme
        .split_once('/')
        .map(|(_, path)| path)
        .unwrap_or("");
    let base = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    let base = base.strip_suffix(".git").unwrap_or(base);
    let name = base.replace(' ', "-");
    if name.is_empty() {
        "repo".to_owned()
    } else {
        name
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dir_name_from_https_url() {
        assert_eq!(repo_dir_name("https://example.com/team/widget.git"), "widget");
        assert_eq!(repo_dir_name("https://example.com/team/widget"), "widget");
        assert_eq!(repo_dir_name("https://example.com/team/widget/"), "widget");
    }

    #[test]
    fn dir_name_replaces_spaces() {
        assert_eq!(repo_dir_name("https://example.com/my repo"), "my-repo");
    }

    #[test]
    fn dir_name_falls_back_to_repo() {
        assert_eq!(repo_dir_name("https://example.com"), "repo");
        assert_eq!(repo_dir_name("https://example.com/"), "repo");
    }

    #[tokio::test]
    async fn sync_of_local_repository_loads_descriptor() {
        // A plain directory is a valid git remote for clone/fetch, which
        // keeps this test network-free.
        let remote = tempfile::tempdir().unwrap();
        std::fs::write(
            remote.path().join("berth.yaml"),
            "kind: dataset\nname: Local Fixture\n",
        )
        .unwrap();
        std::fs::write(remote.path().join("README.md"), "# Fixture\n").unwrap();
        for args in [
            vec!["init", "-b", "main"],
            vec!["add", "."],
            vec!["-c", "user.email=test@test", "-c", "user.name=test", "commit", "-m", "init"],
        ] {
            git(Some(remote.path()), &args).await.unwrap();
        }

        let storage = tempfile::tempdir().unwrap();
        let syncer = RepoSyncer::new(storage.path());
        let url = remote.path().to_string_lossy().into_owned();

        // First sync clones; the missing `repo` field is filled in.
        let result = syncer.sync(&url, None, None).await.unwrap();
        assert_eq!(result.metadata.name, "Local Fixture");
        assert_eq!(result.metadata.repo.as_deref(), Some(url.as_str()));
        assert_eq!(result.readme.as_deref(), Some("# Fixture\n"));

        // Second sync takes the fetch/fast-forward path.
        let again = syncer.sync(&url, None, None).await.unwrap();
        assert_eq!(again.metadata.name, "Local Fixture");
    }

    #[tokio::test]
    async fn sync_replaces_non_git_debris() {
        let remote = tempfile::tempdir().unwrap();
        std::fs::write(remote.path().join("berth.yaml"), "kind: app\nname: Debris\n").unwrap();
        for args in [
            vec!["init", "-b", "main"],
            vec!["add", "."],
            vec!["-c", "user.email=test@test", "-c", "user.name=test", "commit", "-m", "init"],
        ] {
            git(Some(remote.path()), &args).await.unwrap();
        }

        let storage = tempfile::tempdir().unwrap();
        let syncer = RepoSyncer::new(storage.path());
        let url = remote.path().to_string_lossy().into_owned();

        // Pre-create the target directory without a .git inside.
        let dir = syncer.repo_dir(&url);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("stale.txt"), "old").unwrap();

        let result = syncer.sync(&url, None, None).await.unwrap();
        assert_eq!(result.metadata.name, "Debris");
        assert!(!result.repo_path.join("stale.txt").exists());
    }

    #[tokio::test]
    async fn sync_of_nonexistent_remote_is_a_git_error() {
        let storage = tempfile::tempdir().unwrap();
        let syncer = RepoSyncer::new(storage.path());
        let err = syncer
            .sync("/definitely/not/a/repo", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Git { .. }));
    }
}
