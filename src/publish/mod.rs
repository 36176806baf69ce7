//! Report publishing — writing artifacts to disk, and optionally
//! committing and pushing them.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

pub mod git;

pub use git::GitPublisher;

/// A rendered file and where it goes.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Written(usize),
    Pushed,
    /// Nothing changed since the last publish.
    Unchanged,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    fn name(&self) -> &str;

    async fn publish(&self, artifacts: &[Artifact]) -> Result<PublishOutcome>;
}

// ── Filesystem ──────────────────────────────────────────────────────

pub struct FsPublisher;

#[async_trait]
impl Publisher for FsPublisher {
    fn name(&self) -> &str {
        "fs"
    }

    async fn publish(&self, artifacts: &[Artifact]) -> Result<PublishOutcome> {
        for artifact in artifacts {
            atomic_write(&artifact.path, &artifact.bytes)
                .with_context(|| format!("Failed to write {}", artifact.path.display()))?;
            info!(path = %artifact.path.display(), bytes = artifact.bytes.len(), "Report written");
        }
        Ok(PublishOutcome::Written(artifacts.len()))
    }
}

/// Write via a sibling temp file and rename, so readers never see a
/// half-written report.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .with_context(|| format!("{} has no file name", path.display()))?;
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    {
        let mut file = fs::File::create(&tmp_path).context("Failed to create temp file")?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    fs::rename(&tmp_path, path).context("Atomic rename failed")?;
    Ok(())
}

/// Create `dir` if needed and check a file can be written into it.
pub fn ensure_writable(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Cannot create output directory {}", dir.display()))?;

    let probe = dir.join(".model-status.write-check");
    fs::write(&probe, b"")
        .with_context(|| format!("Output directory {} is not writable", dir.display()))?;
    let _ = fs::remove_file(&probe);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fs_publisher_writes_all_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = vec![
            Artifact::new(dir.path().join("model-status.json"), "{}"),
            Artifact::new(dir.path().join("model-status.html"), "<html></html>"),
        ];

        let outcome = FsPublisher.publish(&artifacts).await.unwrap();
        assert_eq!(outcome, PublishOutcome::Written(2));
        assert_eq!(fs::read_to_string(dir.path().join("model-status.json")).unwrap(), "{}");

        // No temp files left behind.
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| !n.ends_with(".tmp")));
    }

    #[test]
    fn test_atomic_write_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        atomic_write(&path, b"old").unwrap();
        atomic_write(&path, b"new").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn test_atomic_write_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs/nested/report.html");
        atomic_write(&path, b"x").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_ensure_writable() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("docs");
        ensure_writable(&out).unwrap();
        assert!(out.is_dir());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn test_ensure_writable_rejects_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        fs::write(&file, "x").unwrap();
        assert!(ensure_writable(&file).is_err());
    }
}
