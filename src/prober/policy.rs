//! Escalation policy — which strategy runs first for each API kind, and
//! when the session-manager fallback gets a turn.
//!
//! Escalation is one level deep: primary, then at most one fallback.
//! The fallback is a strategy substitution, not a retry of the primary.

use std::time::Duration;
use tracing::{debug, warn};

use crate::registry::{ApiKind, ModelSpec, ProviderSpec};
use crate::strategies::{Attempt, ProbeResult, Stage, StrategyId, StrategySet};

/// The strategy chain for one API kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub primary: StrategyId,
    pub fallback: Option<StrategyId>,
}

pub fn plan(kind: &ApiKind) -> Plan {
    match kind {
        ApiKind::HttpCompletions { .. } => Plan {
            primary: StrategyId::OpenAi,
            fallback: Some(StrategyId::Spawn),
        },
        ApiKind::GoogleGenerative { .. } => Plan { primary: StrategyId::Google, fallback: None },
        ApiKind::OauthManaged { .. } => Plan { primary: StrategyId::Oauth, fallback: None },
        ApiKind::CliSpawn | ApiKind::Unknown { .. } => Plan { primary: StrategyId::Spawn, fallback: None },
        ApiKind::OpencodeCli => Plan { primary: StrategyId::Opencode, fallback: None },
    }
}

/// Both stages of one probe, kept side by side.
#[derive(Debug, Clone, PartialEq)]
pub struct Escalation {
    pub primary: Attempt,
    pub fallback: Option<Attempt>,
}

impl Escalation {
    /// Which stage's attempt becomes the final result.
    ///
    /// A successful fallback always wins. A failed fallback only wins when
    /// it returns a definitive verdict (auth rejected, model not allowed);
    /// otherwise the primary failure is kept.
    pub fn adopted(&self) -> Stage {
        if self.primary.succeeded() {
            return Stage::Primary;
        }
        match &self.fallback {
            Some(fb) if fb.succeeded() || fb.status.is_definitive() => Stage::Fallback,
            _ => Stage::Primary,
        }
    }

    pub fn into_result(self, provider: &str, model: &str) -> ProbeResult {
        let stage = self.adopted();
        let attempt = match (stage, self.fallback) {
            (Stage::Fallback, Some(fallback)) => fallback,
            _ => self.primary,
        };
        ProbeResult::from_attempt(provider, model, attempt, stage)
    }
}

pub struct EscalationPolicy {
    strategies: StrategySet,
}

impl EscalationPolicy {
    pub fn new(strategies: StrategySet) -> Self {
        Self { strategies }
    }

    /// Worst-case wall time of the full chain for `kind`.
    pub fn budget(&self, kind: &ApiKind) -> Duration {
        let plan = plan(kind);
        let primary = self.strategies.get(plan.primary).timeout();
        let fallback = plan
            .fallback
            .map(|id| self.strategies.get(id).timeout())
            .unwrap_or_default();
        primary + fallback
    }

    pub async fn execute(&self, provider: &ProviderSpec, model: &ModelSpec) -> Escalation {
        let plan = plan(&provider.kind);

        let primary_strategy = self.strategies.get(plan.primary);
        let primary = primary_strategy
            .probe(provider, model, primary_strategy.timeout())
            .await;

        debug!(
            provider = %provider.name,
            kind = provider.kind.label(),
            model = %model.id,
            model_name = model.display_name(),
            strategy = %plan.primary,
            status = %primary.status.label(primary.latency),
            "Primary probe finished"
        );

        let fallback = match plan.fallback {
            Some(fallback_id) if !primary.succeeded() => {
                warn!(
                    provider = %provider.name,
                    model = %model.id,
                    status = %primary.status.label(primary.latency),
                    "Direct probe failed — escalating to {}",
                    fallback_id
                );
                let strategy = self.strategies.get(fallback_id);
                Some(strategy.probe(provider, model, strategy.timeout()).await)
            }
            _ => None,
        };

        Escalation { primary, fallback }
    }
}
