//! Git auto-publish — stages the written reports, commits when they
//! changed, and pushes to the configured upstream.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use super::{Artifact, PublishOutcome, Publisher};

const GIT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct GitPublisher {
    output_dir: PathBuf,
    generated_at: DateTime<Local>,
}

impl GitPublisher {
    pub fn new(output_dir: impl Into<PathBuf>, generated_at: DateTime<Local>) -> Self {
        Self {
            output_dir: output_dir.into(),
            generated_at,
        }
    }

    pub fn commit_message(&self) -> String {
        format!("Model status update: {}", self.generated_at.format("%Y-%m-%d %H:%M"))
    }

    async fn repo_root(&self) -> Result<PathBuf> {
        let output = git(&self.output_dir, &["rev-parse", "--show-toplevel"]).await?;
        if !output.status.success() {
            bail!("{} is not inside a git repository", self.output_dir.display());
        }
        Ok(PathBuf::from(String::from_utf8_lossy(&output.stdout).trim()))
    }
}

#[async_trait]
impl Publisher for GitPublisher {
    fn name(&self) -> &str {
        "git"
    }

    async fn publish(&self, artifacts: &[Artifact]) -> Result<PublishOutcome> {
        let root = self.repo_root().await?;
        // rev-parse reports a resolved path; resolve ours the same way.
        let paths: Vec<String> = artifacts
            .iter()
            .map(|a| {
                std::fs::canonicalize(&a.path)
                    .unwrap_or_else(|_| a.path.clone())
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();

        // Reports usually live in an ignored directory, hence -f.
        let mut add = vec!["add", "-f", "--"];
        add.extend(paths.iter().map(String::as_str));
        checked(&root, &add).await?;

        let mut diff = vec!["diff", "--cached", "--quiet", "--"];
        diff.extend(paths.iter().map(String::as_str));
        let status = git(&root, &diff).await?.status;
        match status.code() {
            Some(0) => {
                info!("No report changes to publish");
                return Ok(PublishOutcome::Unchanged);
            }
            Some(1) => {}
            _ => bail!("git diff --cached failed ({})", status),
        }

        let message = self.commit_message();
        let mut commit = vec!["commit", "-m", message.as_str(), "--"];
        commit.extend(paths.iter().map(String::as_str));
        checked(&root, &commit).await?;
        checked(&root, &["push"]).await?;

        info!(repo = %root.display(), "🚀 Reports pushed");
        Ok(PublishOutcome::Pushed)
    }
}

/// Run `git -C dir args..` and return its output whatever the exit code.
async fn git(dir: &Path, args: &[&str]) -> Result<Output> {
    debug!(dir = %dir.display(), "git {}", args.join(" "));
    let child = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .context("Failed to launch git")?;

    tokio::time::timeout(GIT_TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| anyhow::anyhow!("git {} timed out after {}s", args.join(" "), GIT_TIMEOUT.as_secs()))?
        .context("Failed to wait for git")
}

/// Like [`git`], but a non-zero exit is an error carrying stderr.
async fn checked(dir: &Path, args: &[&str]) -> Result<Output> {
    let output = git(dir, args).await?;
    if !output.status.success() {
        bail!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(output)
}
