//! Project configuration — where the registry lives, where reports go,
//! how hard to probe, and which command the spawn fallback runs.
//!
//! Loaded from a YAML file (JSON is accepted too, it is a YAML subset).
//! Every field has a default, so a missing file is not an error: the
//! checker runs against `~/.openclaw/openclaw.json` and writes to `./docs`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::registry::DefaultModels;
use crate::strategies::google::ShapePolicy;

/// Default project config file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "model-status.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

// ── Sections ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProberConfig {
    pub paths: PathsConfig,
    pub probe: ProbeConfig,
    pub spawn: SpawnConfig,
    pub opencode: OpencodeConfig,
    pub default_models: DefaultModels,
    pub publish: PublishConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// OpenClaw config holding `models.providers`.
    pub registry: PathBuf,
    /// Directory receiving the JSON and HTML reports.
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            registry: PathBuf::from("~/.openclaw/openclaw.json"),
            output_dir: PathBuf::from("./docs"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Number of probe workers in flight at once.
    pub concurrency: usize,
    pub http_timeout_secs: u64,
    /// Must be strictly greater than `http_timeout_secs`.
    pub spawn_timeout_secs: u64,
    pub cli_timeout_secs: u64,
    /// Slack past a probe chain's timeouts before the pool aborts it.
    pub grace_secs: u64,
    /// Models probed per provider, in registry order.
    pub max_models_per_provider: usize,
    pub google_shape_policy: ShapePolicy,
    /// Credentials meaning "auth handled by the gateway, not by us".
    pub oauth_sentinels: Vec<String>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            http_timeout_secs: 20,
            spawn_timeout_secs: 50,
            cli_timeout_secs: 30,
            grace_secs: 5,
            max_models_per_provider: 2,
            google_shape_policy: ShapePolicy::default(),
            oauth_sentinels: vec!["qwen-oauth".to_string()],
        }
    }
}

impl ProbeConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn spawn_timeout(&self) -> Duration {
        Duration::from_secs(self.spawn_timeout_secs)
    }

    pub fn cli_timeout(&self) -> Duration {
        Duration::from_secs(self.cli_timeout_secs)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

/// The `openclaw sessions spawn` invocation used as last-resort probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    pub program: String,
    /// Leading arguments, for wrappers such as `npx openclaw`.
    pub args: Vec<String>,
    pub agent: String,
    /// Passed to the session manager as `--run-timeout`.
    pub run_timeout_secs: u64,
    pub cleanup: String,
    /// Token the spawned session is told to reply with.
    pub reply_token: String,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            program: "openclaw".to_string(),
            args: Vec::new(),
            agent: "main".to_string(),
            run_timeout_secs: 20,
            cleanup: "delete".to_string(),
            reply_token: "TEST_OK".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpencodeConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Written to the CLI's stdin.
    pub prompt: String,
}

impl Default for OpencodeConfig {
    fn default() -> Self {
        Self {
            program: "opencode".to_string(),
            args: Vec::new(),
            prompt: "hi".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Commit and push the artifacts after writing them.
    pub auto_push: bool,
    pub json_file: String,
    pub html_file: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            auto_push: false,
            json_file: "model-status.json".to_string(),
            html_file: "model-status.html".to_string(),
        }
    }
}

// ── Loading ─────────────────────────────────────────────────────────

impl ProberConfig {
    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No project config — using defaults");
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes to unit, not to an empty map.
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probe.concurrency == 0 {
            return Err(ConfigError::Invalid("probe.concurrency must be at least 1".into()));
        }
        if self.probe.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid("probe.http_timeout_secs must be positive".into()));
        }
        if self.probe.spawn_timeout_secs <= self.probe.http_timeout_secs {
            return Err(ConfigError::Invalid(format!(
                "probe.spawn_timeout_secs ({}) must exceed probe.http_timeout_secs ({})",
                self.probe.spawn_timeout_secs, self.probe.http_timeout_secs
            )));
        }
        if self.publish.json_file.is_empty() || self.publish.html_file.is_empty() {
            return Err(ConfigError::Invalid("publish file names must not be empty".into()));
        }
        Ok(())
    }

    pub fn registry_path(&self) -> PathBuf {
        expand_home(&self.paths.registry)
    }

    pub fn output_dir(&self) -> PathBuf {
        expand_home(&self.paths.output_dir)
    }

    pub fn json_report_path(&self) -> PathBuf {
        self.output_dir().join(&self.publish.json_file)
    }

    pub fn html_report_path(&self) -> PathBuf {
        self.output_dir().join(&self.publish.html_file)
    }
}

/// Expand a leading `~` to the home directory. Other paths pass through.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}
