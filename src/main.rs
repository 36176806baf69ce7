//! model-status — liveness checker for every model an OpenClaw gateway
//! has configured.
//!
//! Reads the provider registry, probes each configured model through the
//! cheapest strategy that fits its API kind (escalating to the session
//! manager when a direct HTTP probe fails), prints a status table, and
//! writes JSON + HTML reports. Optionally commits and pushes the reports.

use anyhow::{Context, Result};
use chrono::Local;
use clap::builder::FalseyValueParser;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::{error, info, warn};
use uuid::Uuid;

mod config;
mod prober;
mod publish;
mod registry;
mod report;
mod strategies;

use config::{ProberConfig, DEFAULT_CONFIG_FILE};
use prober::Prober;
use publish::{Artifact, FsPublisher, GitPublisher, Publisher};
use registry::RegistryLoader;
use report::{render_html, render_table, Report};

#[derive(Debug, Parser)]
#[command(name = "model-status", version, about = "Probe every configured model and publish a status report")]
struct Cli {
    /// Project config (YAML or JSON). Missing file means defaults.
    #[arg(long, env = "MODEL_STATUS_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// OpenClaw registry file; overrides `paths.registry`.
    #[arg(long, env = "OPENCLAW_CONFIG")]
    registry: Option<PathBuf>,

    /// Report directory; overrides `paths.output_dir`.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Probe workers in flight; overrides `probe.concurrency`.
    #[arg(long)]
    concurrency: Option<usize>,

    #[arg(long)]
    no_color: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,

    /// Commit and push the reports after writing them.
    #[arg(long, env = "CLAWX_AUTO_PUSH", value_parser = FalseyValueParser::new())]
    push: bool,
}

impl Cli {
    fn apply(&self, config: &mut ProberConfig) {
        if let Some(registry) = &self.registry {
            config.paths.registry = registry.clone();
        }
        if let Some(output_dir) = &self.output_dir {
            config.paths.output_dir = output_dir.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.probe.concurrency = concurrency;
        }
        if self.push {
            config.publish.auto_push = true;
        }
    }

    fn color(&self) -> bool {
        let no_color_env = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
        !self.no_color && !no_color_env && std::io::stdout().is_terminal()
    }
}

fn init_tracing(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "model_status=info".into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    info!("📊 model-status v{}", env!("CARGO_PKG_VERSION"));

    let mut config = ProberConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;
    cli.apply(&mut config);

    let report = run_checks(&config).await?;
    print!("{}", render_table(&report, cli.color()));
    publish_report(&config, &report).await;

    Ok(())
}

// ── Pipeline ────────────────────────────────────────────────────────

/// Validate inputs, probe every provider and build the report.
///
/// Fails only before probing starts: bad config, a missing or unreadable
/// registry, or an output directory that cannot be written.
async fn run_checks(config: &ProberConfig) -> Result<Report> {
    config.validate()?;

    let registry_path = config.registry_path();
    let loader = RegistryLoader::new(
        config.probe.oauth_sentinels.clone(),
        config.default_models.clone(),
    );
    let providers = loader
        .load_file(&registry_path)
        .context("Cannot load provider registry")?;

    let output_dir = config.output_dir();
    publish::ensure_writable(&output_dir)?;

    let run_id = Uuid::new_v4();
    info!(
        run_id = %run_id,
        registry = %registry_path.display(),
        providers = providers.len(),
        "Registry loaded"
    );

    let prober = Prober::from_config(config).context("Failed to build probe strategies")?;
    let results = prober.run(&providers).await;

    Ok(Report::build(results, Local::now(), run_id))
}

/// Render and write the report artifacts, then push them if enabled.
/// Every failure here is logged; none aborts the run.
async fn publish_report(config: &ProberConfig, report: &Report) {
    let mut artifacts = Vec::new();
    match report.to_json() {
        Ok(json) => artifacts.push(Artifact::new(config.json_report_path(), json)),
        Err(e) => error!("Failed to render JSON report: {}", e),
    }
    artifacts.push(Artifact::new(config.html_report_path(), render_html(report)));

    if let Err(e) = FsPublisher.publish(&artifacts).await {
        error!("Failed to write reports: {:#}", e);
        return;
    }

    if !config.publish.auto_push {
        return;
    }

    let git = GitPublisher::new(config.output_dir(), report.summary.generated_at);
    match git.publish(&artifacts).await {
        Ok(outcome) => info!(publisher = git.name(), ?outcome, "Publish finished"),
        Err(e) => warn!(publisher = git.name(), "Publish failed: {:#}", e),
    }
}
