//! Session-manager spawn — asks `openclaw sessions spawn` to run a
//! throwaway session on the target model and reply with a fixed token.
//!
//! Slowest and most expensive probe. Used directly for providers that are
//! only reachable through the gateway, and as the fallback when a direct
//! HTTP probe fails (custom routing or auth the gateway knows about).

use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

use super::{Attempt, ProbeStatus, ProbeStrategy, Route, StrategyId};
use crate::config::SpawnConfig;
use crate::registry::{ModelSpec, ProviderSpec};

const COMPLETION_MARKER: &str = "completed successfully";

pub struct SpawnStrategy {
    config: SpawnConfig,
    timeout: Duration,
}

impl SpawnStrategy {
    pub fn new(config: SpawnConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }

    /// Full argument list after the program name.
    pub fn args(&self, target: &str) -> Vec<String> {
        let mut args = self.config.args.clone();
        args.extend([
            "sessions".to_string(),
            "spawn".to_string(),
            "--agent".to_string(),
            self.config.agent.clone(),
            "--model".to_string(),
            target.to_string(),
            "--run-timeout".to_string(),
            self.config.run_timeout_secs.to_string(),
            "--cleanup".to_string(),
            self.config.cleanup.clone(),
            "--task".to_string(),
            format!("Reply '{}' and stop.", self.config.reply_token),
        ]);
        args
    }
}

/// Map a finished spawn onto a status and snippet.
pub fn classify_spawn(reply_token: &str, exit_ok: bool, stdout: &str, stderr: &str) -> (ProbeStatus, String) {
    if exit_ok {
        let out = stdout.to_lowercase();
        if out.contains(&reply_token.to_lowercase()) || out.contains(COMPLETION_MARKER) {
            return (ProbeStatus::Ok(Route::Spawn), "Spawn accepted".to_string());
        }
        return (ProbeStatus::SpawnNoReply, format!("No reply token: {}", stdout.trim()));
    }

    let combined = format!("{}{}", stderr, stdout).to_lowercase();
    if combined.contains("not allowed") {
        (ProbeStatus::NotAllowed, "Model not in config".to_string())
    } else if combined.contains("401") || combined.contains("auth") {
        (ProbeStatus::AuthFailed, "API key rejected".to_string())
    } else if stderr.trim().is_empty() {
        (ProbeStatus::SpawnError, "Unknown error".to_string())
    } else {
        (ProbeStatus::SpawnError, stderr.to_string())
    }
}

#[async_trait]
impl ProbeStrategy for SpawnStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::Spawn
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn probe(&self, provider: &ProviderSpec, model: &ModelSpec, timeout: Duration) -> Attempt {
        let target = format!("{}/{}", provider.name, model.id);

        let mut cmd = Command::new(&self.config.program);
        cmd.args(self.args(&target))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start = Instant::now();
        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return Attempt::unreached(
                    self.id(),
                    ProbeStatus::SpawnError,
                    format!("failed to launch {}: {}", self.config.program, e),
                )
            }
        };

        // Dropping the future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Attempt::completed(self.id(), ProbeStatus::SpawnError, start.elapsed(), e.to_string())
            }
            Err(_) => {
                tracing::debug!(model = %target, "Spawn probe timed out — child killed");
                return Attempt::completed(
                    self.id(),
                    ProbeStatus::SpawnTimeout,
                    start.elapsed(),
                    format!("Took too long (>{}s)", timeout.as_secs()),
                );
            }
        };
        let latency = start.elapsed();

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let (status, text) = classify_spawn(&self.config.reply_token, output.status.success(), &stdout, &stderr);
        Attempt::completed(self.id(), status, latency, text)
    }
}
