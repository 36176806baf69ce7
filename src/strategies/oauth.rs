//! OAuth passthrough — providers whose tokens live in the gateway's auth
//! manager. Nothing to call from here; trust the manager.

use async_trait::async_trait;
use std::time::Duration;

use super::{Attempt, ProbeStatus, ProbeStrategy, StrategyId};
use crate::registry::{ModelSpec, ProviderSpec};

pub struct OauthStrategy;

#[async_trait]
impl ProbeStrategy for OauthStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::Oauth
    }

    fn timeout(&self) -> Duration {
        Duration::ZERO
    }

    async fn probe(&self, _provider: &ProviderSpec, _model: &ModelSpec, _timeout: Duration) -> Attempt {
        Attempt::unreached(self.id(), ProbeStatus::OauthManaged, "managed externally")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ApiKind;

    #[tokio::test]
    async fn test_oauth_is_success_without_round_trip() {
        let provider = ProviderSpec {
            name: "qwen-portal".into(),
            kind: ApiKind::OauthManaged { sentinel: "qwen-oauth".into() },
            models: vec![ModelSpec::new("coder-model")],
        };
        let attempt = OauthStrategy.probe(&provider, &provider.models[0], Duration::ZERO).await;
        assert_eq!(attempt.status, ProbeStatus::OauthManaged);
        assert!(attempt.succeeded());
        assert_eq!(attempt.latency, None);
        assert_eq!(attempt.status.label(attempt.latency), "oauth-managed");
    }
}
