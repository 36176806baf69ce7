//! OpenAI-compatible completions probe — one tiny chat completion against
//! `{baseUrl}/chat/completions`.

use async_trait::async_trait;
use serde_json::Value;
use std::time::{Duration, Instant};

use super::{transport_failure, Attempt, ProbeStatus, ProbeStrategy, Route, StrategyId};
use crate::registry::{ApiKind, Credential, ModelSpec, ProviderSpec};

const PROBE_PROMPT: &str = "hi";
const PROBE_MAX_TOKENS: u32 = 10;

pub struct OpenAiStrategy {
    client: reqwest::Client,
    timeout: Duration,
    /// Credentials that are placeholders, not bearer tokens.
    sentinels: Vec<String>,
}

impl OpenAiStrategy {
    pub fn new(client: reqwest::Client, timeout: Duration, sentinels: Vec<String>) -> Self {
        Self { client, timeout, sentinels }
    }

    fn bearer<'a>(&self, credential: Option<&'a Credential>) -> Option<&'a str> {
        credential
            .filter(|c| !c.is_empty())
            .map(Credential::expose)
            .filter(|key| !self.sentinels.iter().any(|s| s == key))
    }
}

pub fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// Text of the first choice that has any.
fn first_choice_text(body: &Value) -> Option<&str> {
    body["choices"].as_array()?.iter().find_map(|choice| {
        choice["message"]["content"]
            .as_str()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    })
}

#[async_trait]
impl ProbeStrategy for OpenAiStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::OpenAi
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn probe(&self, provider: &ProviderSpec, model: &ModelSpec, timeout: Duration) -> Attempt {
        let ApiKind::HttpCompletions { base_url, credential } = &provider.kind else {
            return Attempt::unreached(
                self.id(),
                ProbeStatus::Unknown,
                format!("{} is not an http-completions provider", provider.name),
            );
        };

        let mut request = self
            .client
            .post(completions_url(base_url))
            .timeout(timeout)
            .json(&serde_json::json!({
                "model": &model.id,
                "messages": [{"role": "user", "content": PROBE_PROMPT}],
                "max_tokens": PROBE_MAX_TOKENS,
            }));
        if let Some(key) = self.bearer(credential.as_ref()) {
            request = request.bearer_auth(key);
        }

        let start = Instant::now();
        let resp = match request.send().await {
            Ok(resp) => resp,
            Err(e) => return transport_failure(self.id(), e, start),
        };

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Attempt::completed(
                self.id(),
                ProbeStatus::HttpError(status),
                start.elapsed(),
                body,
            );
        }

        let body: Value = match resp.json().await {
            Ok(body) => body,
            Err(e) => return transport_failure(self.id(), e, start),
        };
        let latency = start.elapsed();

        match first_choice_text(&body) {
            Some(text) => Attempt::completed(self.id(), ProbeStatus::Ok(Route::Http), latency, text),
            None => Attempt::completed(
                self.id(),
                ProbeStatus::EmptyResponse,
                latency,
                "No choices in JSON",
            ),
        }
    }
}
