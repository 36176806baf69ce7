//! opencode CLI probe — pipes a prompt into `opencode run --model <id>`
//! and expects any non-empty answer on stdout.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{Attempt, ProbeStatus, ProbeStrategy, Route, StrategyId};
use crate::config::OpencodeConfig;
use crate::registry::{ModelSpec, ProviderSpec};

pub struct OpencodeStrategy {
    config: OpencodeConfig,
    timeout: Duration,
}

impl OpencodeStrategy {
    pub fn new(config: OpencodeConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }
}

#[async_trait]
impl ProbeStrategy for OpencodeStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::Opencode
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn probe(&self, _provider: &ProviderSpec, model: &ModelSpec, timeout: Duration) -> Attempt {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .args(["run", "--model", model.id.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start = Instant::now();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return Attempt::unreached(
                    self.id(),
                    ProbeStatus::SpawnError,
                    format!("failed to launch {}: {}", self.config.program, e),
                )
            }
        };

        let stdin = child.stdin.take();
        let prompt = self.config.prompt.clone();
        let run = async move {
            if let Some(mut stdin) = stdin {
                // A CLI that exits without reading stdin is not a probe failure.
                let _ = stdin.write_all(prompt.as_bytes()).await;
            }
            child.wait_with_output().await
        };

        let output = match tokio::time::timeout(timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Attempt::completed(self.id(), ProbeStatus::SpawnError, start.elapsed(), e.to_string())
            }
            Err(_) => {
                return Attempt::completed(
                    self.id(),
                    ProbeStatus::Timeout,
                    start.elapsed(),
                    format!("Timeout (>{}s)", timeout.as_secs()),
                )
            }
        };
        let latency = start.elapsed();

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let text: &str = if stderr.trim().is_empty() { &stdout } else { &stderr };
            return Attempt::completed(self.id(), ProbeStatus::CliError(code), latency, text);
        }
        if stdout.trim().is_empty() {
            return Attempt::completed(self.id(), ProbeStatus::EmptyResponse, latency, "Empty response");
        }
        Attempt::completed(self.id(), ProbeStatus::Ok(Route::Cli), latency, stdout)
    }
}
