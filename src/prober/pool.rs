//! Bounded worker pool — fans probe tasks out to a fixed number of tokio
//! workers and collects one result per task.
//!
//! Every task runs in its own spawned future under a backstop deadline of
//! `budget + grace`. A strategy that hangs past its own timeout is aborted
//! and reported as a timeout; a probe that panics is reported as unknown.
//! Neither stops the remaining tasks.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use super::policy::{plan, EscalationPolicy};
use crate::registry::{ModelSpec, ProviderSpec};
use crate::strategies::{Attempt, ProbeResult, ProbeStatus, Stage};

/// Slack on top of a chain's timeout budget before the pool gives up on it.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// One (provider, model) pair to probe.
#[derive(Debug, Clone)]
pub struct ProbeTask {
    pub provider: Arc<ProviderSpec>,
    pub model: ModelSpec,
}

/// Expand providers into tasks, keeping the first `max_models` models of
/// each provider in registry order.
pub fn expand_tasks(providers: &[ProviderSpec], max_models: usize) -> Vec<ProbeTask> {
    let mut tasks = Vec::new();
    for provider in providers {
        let shared = Arc::new(provider.clone());
        if provider.models.len() > max_models {
            debug!(
                provider = %provider.name,
                listed = provider.models.len(),
                probed = max_models,
                "Capping models per provider"
            );
        }
        for model in provider.models.iter().take(max_models) {
            tasks.push(ProbeTask {
                provider: shared.clone(),
                model: model.clone(),
            });
        }
    }
    tasks
}

pub struct WorkerPool {
    concurrency: usize,
    grace: Duration,
}

impl WorkerPool {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            grace: DEFAULT_GRACE,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every task and return exactly one result per task, in
    /// completion order. Returns only after every worker has finished.
    pub async fn run(&self, policy: Arc<EscalationPolicy>, tasks: Vec<ProbeTask>) -> Vec<ProbeResult> {
        let total = tasks.len();
        if total == 0 {
            return Vec::new();
        }

        let (task_tx, task_rx) = mpsc::unbounded_channel();
        for task in tasks {
            // Receiver is alive until the end of this function.
            let _ = task_tx.send(task);
        }
        drop(task_tx);
        let queue = Arc::new(Mutex::new(task_rx));

        let (result_tx, mut result_rx) = mpsc::unbounded_channel();
        let mut workers = JoinSet::new();

        for worker in 0..self.concurrency.min(total) {
            let queue = queue.clone();
            let results = result_tx.clone();
            let policy = policy.clone();
            let grace = self.grace;

            workers.spawn(async move {
                loop {
                    let next = queue.lock().await.recv().await;
                    let Some(task) = next else { break };
                    let result = run_task(&policy, task, grace).await;
                    if results.send(result).is_err() {
                        break;
                    }
                }
                debug!(worker, "Worker drained queue");
            });
        }
        drop(result_tx);

        // Barrier: no result is read until every worker has exited.
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Probe worker failed: {}", e);
            }
        }

        let mut results = Vec::with_capacity(total);
        while let Some(result) = result_rx.recv().await {
            results.push(result);
        }
        if results.len() != total {
            warn!(expected = total, got = results.len(), "Probe results missing");
        }
        results
    }
}

/// Run one escalation chain under the backstop deadline.
async fn run_task(policy: &Arc<EscalationPolicy>, task: ProbeTask, grace: Duration) -> ProbeResult {
    let deadline = policy.budget(&task.provider.kind) + grace;
    let strategy = plan(&task.provider.kind).primary;
    let provider = task.provider.name.clone();
    let model = task.model.id.clone();

    let chain = policy.clone();
    let started = Instant::now();
    let handle = tokio::spawn(async move {
        let ProbeTask { provider, model } = task;
        chain.execute(&provider, &model).await.into_result(&provider.name, &model.id)
    });
    let abort = handle.abort_handle();

    match tokio::time::timeout(deadline, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            error!(provider = %provider, model = %model, "Probe crashed: {}", e);
            let attempt = Attempt::unreached(strategy, ProbeStatus::Unknown, format!("probe crashed: {}", e));
            ProbeResult::from_attempt(provider, model, attempt, Stage::Primary)
        }
        Err(_) => {
            abort.abort();
            warn!(
                provider = %provider,
                model = %model,
                deadline_secs = deadline.as_secs_f64(),
                "Probe overran its budget — aborted"
            );
            let attempt = Attempt::completed(
                strategy,
                ProbeStatus::Timeout,
                started.elapsed(),
                format!("Exceeded {:.1}s budget", deadline.as_secs_f64()),
            );
            ProbeResult::from_attempt(provider, model, attempt, Stage::Primary)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prober::policy::tests::{http_provider, Fixed, Stubs};
    use crate::registry::ApiKind;
    use crate::strategies::{ProbeStrategy, Route, StrategyId, StrategySet};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn spawn_provider(name: &str, models: &[&str]) -> ProviderSpec {
        ProviderSpec {
            name: name.into(),
            kind: ApiKind::CliSpawn,
            models: models.iter().map(|m| ModelSpec::new(*m)).collect(),
        }
    }

    #[test]
    fn test_expand_caps_models_per_provider() {
        let providers = vec![
            spawn_provider("a", &["a1", "a2", "a3"]),
            spawn_provider("b", &["b1"]),
            spawn_provider("c", &[]),
        ];
        let tasks = expand_tasks(&providers, 2);
        let ids: Vec<_> = tasks.iter().map(|t| format!("{}/{}", t.provider.name, t.model.id)).collect();
        assert_eq!(ids, vec!["a/a1", "a/a2", "b/b1"]);
    }

    #[tokio::test]
    async fn test_one_result_per_task() {
        let stubs = Stubs::new(ProbeStatus::Ok(Route::Http), ProbeStatus::Ok(Route::Spawn));
        let policy = Arc::new(EscalationPolicy::new(stubs.set()));
        let providers: Vec<_> = (0..7)
            .map(|i| spawn_provider(&format!("p{}", i), &["m1", "m2"]))
            .collect();

        let results = WorkerPool::new(3).run(policy, expand_tasks(&providers, 2)).await;
        assert_eq!(results.len(), 14);
        assert_eq!(stubs.spawn.calls(), 14);
        assert!(results.iter().all(|r| r.success));
    }

    #[tokio::test]
    async fn test_empty_task_list() {
        let stubs = Stubs::new(ProbeStatus::Ok(Route::Http), ProbeStatus::Ok(Route::Spawn));
        let policy = Arc::new(EscalationPolicy::new(stubs.set()));
        let results = WorkerPool::new(5).run(policy, Vec::new()).await;
        assert!(results.is_empty());
    }

    /// Tracks the peak number of probes in flight.
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ProbeStrategy for Gauge {
        fn id(&self) -> StrategyId {
            StrategyId::Spawn
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(5)
        }

        async fn probe(&self, _p: &ProviderSpec, _m: &ModelSpec, _t: Duration) -> Attempt {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Attempt::completed(StrategyId::Spawn, ProbeStatus::Ok(Route::Spawn), Duration::from_millis(30), "ok")
        }
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let gauge = Arc::new(Gauge {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let stubs = Stubs::new(ProbeStatus::Ok(Route::Http), ProbeStatus::Ok(Route::Spawn));
        let set = StrategySet { spawn: gauge.clone(), ..stubs.set() };
        let policy = Arc::new(EscalationPolicy::new(set));
        let providers: Vec<_> = (0..10).map(|i| spawn_provider(&format!("p{}", i), &["m"])).collect();

        let results = WorkerPool::new(2).run(policy, expand_tasks(&providers, 2)).await;
        assert_eq!(results.len(), 10);
        assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
        assert!(gauge.peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_hung_strategy_is_aborted_as_timeout() {
        let stubs = Stubs::new(ProbeStatus::Ok(Route::Http), ProbeStatus::Ok(Route::Spawn));
        let hung = Fixed::slow(
            StrategyId::Spawn,
            ProbeStatus::Ok(Route::Spawn),
            Duration::from_millis(50),
            Duration::from_secs(30),
        );
        let set = StrategySet { spawn: hung, ..stubs.set() };
        let policy = Arc::new(EscalationPolicy::new(set));
        let providers = vec![spawn_provider("slow", &["m"]), http_provider()];

        let started = Instant::now();
        let results = WorkerPool::new(2)
            .with_grace(Duration::from_millis(100))
            .run(policy, expand_tasks(&providers, 2))
            .await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(results.len(), 2);

        let slow = results.iter().find(|r| r.provider == "slow").unwrap();
        assert_eq!(slow.status, ProbeStatus::Timeout);
        assert!(slow.latency.is_some());
        assert!(!slow.success);

        let acme = results.iter().find(|r| r.provider == "acme").unwrap();
        assert!(acme.success);
    }

    struct Panics;

    #[async_trait]
    impl ProbeStrategy for Panics {
        fn id(&self) -> StrategyId {
            StrategyId::Spawn
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }

        async fn probe(&self, _p: &ProviderSpec, _m: &ModelSpec, _t: Duration) -> Attempt {
            panic!("strategy bug")
        }
    }

    #[tokio::test]
    async fn test_panicking_probe_becomes_unknown() {
        let stubs = Stubs::new(ProbeStatus::Ok(Route::Http), ProbeStatus::Ok(Route::Spawn));
        let set = StrategySet { spawn: Arc::new(Panics), ..stubs.set() };
        let policy = Arc::new(EscalationPolicy::new(set));
        let providers = vec![spawn_provider("buggy", &["m1", "m2"]), http_provider()];

        let results = WorkerPool::new(1).run(policy, expand_tasks(&providers, 2)).await;
        assert_eq!(results.len(), 3);
        let buggy: Vec<_> = results.iter().filter(|r| r.provider == "buggy").collect();
        assert_eq!(buggy.len(), 2);
        assert!(buggy.iter().all(|r| r.status == ProbeStatus::Unknown && r.latency.is_none()));
    }
}
