//! Read-only access to git: repository presence, tracked status and the
//! committed content of a file.
//!
//! [`VersionControl`] is the raw query interface; [`GitCli`] implements it by
//! running the `git` executable. [`VersionControlGateway`] wraps any backend
//! and turns every failure into a safe default, so callers only ever see
//! "not a repository", "not tracked" or "no baseline".

use crate::error::{DiffCryptError, Result};
use crate::lines::split_lines;
use async_trait::async_trait;
use git2::Repository;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::debug;

/// Locates the git work tree containing a directory.
pub struct GitRepo {
    repo: Repository,
}

impl GitRepo {
    /// Open repository at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let repo = Repository::discover(path).map_err(|_| DiffCryptError::NotInGitRepo)?;
        Ok(Self { repo })
    }

    /// Get repository root path
    pub fn workdir(&self) -> Result<&Path> {
        self.repo.workdir().ok_or(DiffCryptError::Other(
            "Repository has no working directory".into(),
        ))
    }
}

/// Raw version-control queries. Errors are reported, not interpreted.
#[async_trait]
pub trait VersionControl: Send + Sync {
    async fn is_inside_repository(&self) -> Result<bool>;

    /// `relative_path` uses `/` separators and is relative to the backend's
    /// working directory.
    async fn is_tracked(&self, relative_path: &str) -> Result<bool>;

    /// Content of the file at `HEAD`, `None` when it has no committed version.
    async fn committed_content(&self, relative_path: &str) -> Result<Option<String>>;
}

/// Backend that shells out to `git`.
#[derive(Debug, Clone)]
pub struct GitCli {
    workdir: PathBuf,
}

impl GitCli {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<Vec<u8>> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(DiffCryptError::GitCommand {
                command: format!("git {}", args.join(" ")),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn is_inside_repository(&self) -> Result<bool> {
        let stdout = self.run(&["rev-parse", "--is-inside-work-tree"]).await?;
        Ok(String::from_utf8_lossy(&stdout).trim() == "true")
    }

    async fn is_tracked(&self, relative_path: &str) -> Result<bool> {
        self.run(&["ls-files", "--error-unmatch", "--", relative_path])
            .await?;
        Ok(true)
    }

    async fn committed_content(&self, relative_path: &str) -> Result<Option<String>> {
        // `./` resolves the path against the working directory rather than
        // the repository root.
        let object = format!("HEAD:./{relative_path}");
        let stdout = self.run(&["show", &object]).await?;
        String::from_utf8(stdout)
            .map(Some)
            .map_err(|e| DiffCryptError::Other(format!("committed content is not utf-8: {e}")))
    }
}

/// Memoizing, failure-tolerant front of a [`VersionControl`] backend.
///
/// The repository check runs at most once per gateway, even when many
/// files ask concurrently; a failed check is remembered as "not a
/// repository".
pub struct VersionControlGateway {
    backend: Arc<dyn VersionControl>,
    root: PathBuf,
    repository: OnceCell<bool>,
}

impl VersionControlGateway {
    /// `root` is the directory the backend runs in; file paths handed to the
    /// gateway are made relative to it.
    pub fn new(backend: Arc<dyn VersionControl>, root: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            root: root.into(),
            repository: OnceCell::new(),
        }
    }

    /// Gateway backed by the `git` executable running in `root`.
    pub fn git(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self::new(Arc::new(GitCli::new(root.clone())), root)
    }

    pub async fn detect_repository(&self) -> bool {
        *self
            .repository
            .get_or_init(|| async {
                match self.backend.is_inside_repository().await {
                    Ok(inside) => inside,
                    Err(err) => {
                        debug!(error = %err, root = %self.root.display(), "not a git repository");
                        false
                    }
                }
            })
            .await
    }

    /// Last resolved repository state; `false` until resolved.
    pub fn is_git_repository(&self) -> bool {
        self.repository.get().copied().unwrap_or(false)
    }

    pub async fn is_file_tracked(&self, path: &Path) -> bool {
        if !self.detect_repository().await {
            return false;
        }
        let relative = self.relative_path(path);
        match self.backend.is_tracked(&relative).await {
            Ok(tracked) => tracked,
            Err(err) => {
                debug!(path = %relative, error = %err, "treating file as untracked");
                false
            }
        }
    }

    /// Committed lines of `path`; empty when there is no usable baseline.
    pub async fn fetch_committed_content(&self, path: &Path) -> Vec<String> {
        if !self.detect_repository().await {
            return Vec::new();
        }
        let relative = self.relative_path(path);
        match self.backend.committed_content(&relative).await {
            Ok(Some(text)) if !text.is_empty() => {
                split_lines(&text).into_iter().map(str::to_owned).collect()
            }
            Ok(_) => Vec::new(),
            Err(err) => {
                debug!(path = %relative, error = %err, "no committed baseline");
                Vec::new()
            }
        }
    }

    fn relative_path(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBackend {
        checks: AtomicUsize,
        inside: Result<bool>,
    }

    impl CountingBackend {
        fn new(inside: Result<bool>) -> Self {
            Self {
                checks: AtomicUsize::new(0),
                inside,
            }
        }
    }

    #[async_trait]
    impl VersionControl for CountingBackend {
        async fn is_inside_repository(&self) -> Result<bool> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            match &self.inside {
                Ok(inside) => Ok(*inside),
                Err(_) => Err(DiffCryptError::Other("git not found".into())),
            }
        }

        async fn is_tracked(&self, relative_path: &str) -> Result<bool> {
            if relative_path == "tracked.txt" {
                Ok(true)
            } else {
                Err(DiffCryptError::Other("error: pathspec did not match".into()))
            }
        }

        async fn committed_content(&self, relative_path: &str) -> Result<Option<String>> {
            match relative_path {
                "tracked.txt" => Ok(Some("one\r\ntwo\n".into())),
                "empty.txt" => Ok(Some(String::new())),
                _ => Err(DiffCryptError::Other("fatal: path not in HEAD".into())),
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_detection_runs_once() {
        let backend = Arc::new(CountingBackend::new(Ok(true)));
        let gateway = Arc::new(VersionControlGateway::new(backend.clone(), "/repo"));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let gateway = gateway.clone();
            handles.push(tokio::spawn(async move { gateway.detect_repository().await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }

        assert_eq!(backend.checks.load(Ordering::SeqCst), 1);
        assert!(gateway.is_git_repository());
    }

    #[tokio::test]
    async fn test_failed_detection_is_cached_as_false() {
        let backend = Arc::new(CountingBackend::new(Err(DiffCryptError::NotInGitRepo)));
        let gateway = VersionControlGateway::new(backend.clone(), "/repo");

        assert!(!gateway.is_git_repository());
        assert!(!gateway.detect_repository().await);
        assert!(!gateway.detect_repository().await);
        assert_eq!(backend.checks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tracking_failures_mean_untracked() {
        let gateway =
            VersionControlGateway::new(Arc::new(CountingBackend::new(Ok(true))), "/repo");

        assert!(gateway.is_file_tracked(Path::new("/repo/tracked.txt")).await);
        assert!(!gateway.is_file_tracked(Path::new("/repo/new.txt")).await);
    }

    #[tokio::test]
    async fn test_outside_repository_short_circuits() {
        let gateway =
            VersionControlGateway::new(Arc::new(CountingBackend::new(Ok(false))), "/repo");

        assert!(!gateway.is_file_tracked(Path::new("/repo/tracked.txt")).await);
        assert!(gateway
            .fetch_committed_content(Path::new("/repo/tracked.txt"))
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_committed_content_is_split_into_lines() {
        let gateway =
            VersionControlGateway::new(Arc::new(CountingBackend::new(Ok(true))), "/repo");

        assert_eq!(
            gateway
                .fetch_committed_content(Path::new("/repo/tracked.txt"))
                .await,
            vec!["one", "two", ""]
        );
        assert!(gateway
            .fetch_committed_content(Path::new("/repo/empty.txt"))
            .await
            .is_empty());
        assert!(gateway
            .fetch_committed_content(Path::new("/repo/missing.txt"))
            .await
            .is_empty());
    }

    #[test]
    fn test_relative_paths_use_forward_slashes() {
        let gateway =
            VersionControlGateway::new(Arc::new(CountingBackend::new(Ok(true))), "/repo");

        assert_eq!(
            gateway.relative_path(Path::new("/repo/dir/file.txt")),
            "dir/file.txt"
        );
        assert_eq!(gateway.relative_path(Path::new("dir/file.txt")), "dir/file.txt");
    }
}
