//! Per-job working directory lifecycle.
//!
//! Every allocation is paired with exactly one teardown. Pipelines call
//! `cleanup` on all exit paths; `Drop` is the fallback for paths that never
//! reach it (panics, early returns during construction).

use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// An ephemeral directory tree owned exclusively by one job invocation.
#[derive(Debug)]
pub struct JobWorkspace {
    root: PathBuf,
    cleaned: bool,
}

impl JobWorkspace {
    /// Allocate a fresh, uniquely named directory under `base`. No two
    /// concurrent jobs ever share one, even for the same key.
    pub async fn create(base: impl AsRef<Path>, key: &str) -> std::io::Result<Self> {
        let root = base.as_ref().join(format!("{key}-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&root).await?;
        debug!(dir = %root.display(), "allocated working directory");
        Ok(Self {
            root,
            cleaned: false,
        })
    }

    /// The workspace root.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Path of a file inside the workspace.
    pub fn file(&self, name: impl AsRef<Path>) -> PathBuf {
        self.root.join(name)
    }

    /// Recursive teardown. Consumes the workspace so it cannot be reused.
    pub async fn cleanup(mut self) -> std::io::Result<()> {
        self.cleaned = true;
        debug!(dir = %self.root.display(), "removing working directory");
        tokio::fs::remove_dir_all(&self.root).await
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if !self.cleaned {
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unique_per_job() {
        let base = tempfile::tempdir().unwrap();
        let a = JobWorkspace::create(base.path(), "abc").await.unwrap();
        let b = JobWorkspace::create(base.path(), "abc").await.unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().is_dir());
        assert!(b.path().is_dir());
        a.cleanup().await.unwrap();
        b.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn test_cleanup_removes_tree() {
        let base = tempfile::tempdir().unwrap();
        let ws = JobWorkspace::create(base.path(), "abc").await.unwrap();
        tokio::fs::write(ws.file("input.gpx"), "<gpx/>").await.unwrap();
        tokio::fs::create_dir_all(ws.file("output")).await.unwrap();
        let root = ws.path().to_path_buf();
        ws.cleanup().await.unwrap();
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_drop_fallback_removes_tree() {
        let base = tempfile::tempdir().unwrap();
        let root = {
            let ws = JobWorkspace::create(base.path(), "abc").await.unwrap();
            ws.path().to_path_buf()
        };
        assert!(!root.exists());
    }
}
