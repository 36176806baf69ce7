//! Probe orchestration — expands providers into tasks, runs them through
//! the escalation policy on the worker pool, and hands back one result
//! per probed model.

use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::config::ProberConfig;
use crate::registry::ProviderSpec;
use crate::strategies::{ProbeResult, StrategySet};

pub mod policy;
pub mod pool;

pub use policy::EscalationPolicy;
pub use pool::{expand_tasks, WorkerPool};

pub struct Prober {
    policy: Arc<EscalationPolicy>,
    pool: WorkerPool,
    max_models: usize,
}

impl Prober {
    pub fn new(policy: EscalationPolicy, pool: WorkerPool, max_models: usize) -> Self {
        Self {
            policy: Arc::new(policy),
            pool,
            max_models,
        }
    }

    pub fn from_config(config: &ProberConfig) -> anyhow::Result<Self> {
        let strategies = StrategySet::from_config(config)?;
        Ok(Self::new(
            EscalationPolicy::new(strategies),
            WorkerPool::new(config.probe.concurrency).with_grace(config.probe.grace()),
            config.probe.max_models_per_provider,
        ))
    }

    /// Probe every provider. Never fails; each failure is a result.
    pub async fn run(&self, providers: &[ProviderSpec]) -> Vec<ProbeResult> {
        let tasks = expand_tasks(providers, self.max_models);
        info!(
            "🔍 Probing {} models across {} providers ({} workers)",
            tasks.len(),
            providers.len(),
            self.pool.concurrency()
        );

        let started = Instant::now();
        let results = self.pool.run(self.policy.clone(), tasks).await;

        let passed = results.iter().filter(|r| r.success).count();
        info!(
            passed,
            failed = results.len() - passed,
            elapsed_secs = started.elapsed().as_secs(),
            "Probe run complete"
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prober::policy::tests::{http_provider, Stubs};
    use crate::strategies::{ProbeStatus, Route, Stage};

    #[tokio::test]
    async fn test_prober_runs_every_capped_model() {
        let stubs = Stubs::new(ProbeStatus::HttpError(503), ProbeStatus::Ok(Route::Spawn));
        let prober = Prober::new(EscalationPolicy::new(stubs.set()), WorkerPool::new(4), 2);

        let mut acme = http_provider();
        acme.models.push(crate::registry::ModelSpec::new("m2"));
        acme.models.push(crate::registry::ModelSpec::new("m3"));

        let results = prober.run(&[acme]).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success && r.stage == Stage::Fallback));
        assert_eq!(stubs.openai.calls(), 2);
        assert_eq!(stubs.spawn.calls(), 2);
    }

    #[tokio::test]
    async fn test_prober_with_no_providers() {
        let stubs = Stubs::new(ProbeStatus::Ok(Route::Http), ProbeStatus::Ok(Route::Spawn));
        let prober = Prober::new(EscalationPolicy::new(stubs.set()), WorkerPool::new(5), 2);
        assert!(prober.run(&[]).await.is_empty());
    }

    #[test]
    fn test_from_default_config() {
        let prober = Prober::from_config(&ProberConfig::default()).unwrap();
        assert_eq!(prober.pool.concurrency(), 5);
        assert_eq!(prober.max_models, 2);
    }
}
