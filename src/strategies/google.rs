//! Google Gemini probe — a one-shot `generateContent` call against the
//! generativelanguage REST API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

use super::{transport_failure, Attempt, ProbeStatus, ProbeStrategy, Route, StrategyId};
use crate::registry::{ApiKind, ModelSpec, ProviderSpec};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Keeps the key out of the URL, and so out of any error text.
const API_KEY_HEADER: &str = "x-goog-api-key";

const UNEXPECTED_FORMAT: &str = "Response matched but unexpected format";

/// What a 200 response with an unfamiliar body means.
///
/// Gemini payloads vary between model families (safety blocks, thinking
/// parts, empty candidates), so by default a 200 is trusted as liveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapePolicy {
    /// 200 counts as success; the snippet notes the unexpected shape.
    #[default]
    Lenient,
    /// 200 without `candidates[0].content.parts[0].text` is a failure.
    Strict,
}

pub struct GoogleStrategy {
    client: reqwest::Client,
    timeout: Duration,
    policy: ShapePolicy,
}

impl GoogleStrategy {
    pub fn new(client: reqwest::Client, timeout: Duration, policy: ShapePolicy) -> Self {
        Self { client, timeout, policy }
    }
}

pub fn generate_url(base_url: Option<&str>, model_id: &str) -> String {
    let base = base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/');
    format!("{}/models/{}:generateContent", base, model_id)
}

fn candidate_text(body: &Value) -> Option<&str> {
    body["candidates"][0]["content"]["parts"][0]["text"].as_str()
}

#[async_trait]
impl ProbeStrategy for GoogleStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::Google
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn probe(&self, provider: &ProviderSpec, model: &ModelSpec, timeout: Duration) -> Attempt {
        let ApiKind::GoogleGenerative { base_url, credential } = &provider.kind else {
            return Attempt::unreached(
                self.id(),
                ProbeStatus::Unknown,
                format!("{} is not a google-generative provider", provider.name),
            );
        };
        let Some(key) = credential.as_ref().filter(|c| !c.is_empty()) else {
            return Attempt::unreached(self.id(), ProbeStatus::MissingCredential, "No API key configured");
        };

        let request = self
            .client
            .post(generate_url(base_url.as_deref(), &model.id))
            .header(API_KEY_HEADER, key.expose())
            .timeout(timeout)
            .json(&serde_json::json!({
                "contents": [{"parts": [{"text": "hi"}]}],
                "generationConfig": {"maxOutputTokens": 10}
            }));

        let start = Instant::now();
        let resp = match request.send().await {
            Ok(resp) => resp,
            Err(e) => return transport_failure(self.id(), e, start),
        };

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Attempt::completed(self.id(), ProbeStatus::HttpError(status), start.elapsed(), body);
        }

        let text = match resp.text().await {
            Ok(text) => text,
            Err(e) => return transport_failure(self.id(), e, start),
        };
        let latency = start.elapsed();

        let parsed: Option<Value> = serde_json::from_str(&text).ok();
        match (parsed.as_ref().and_then(candidate_text), self.policy) {
            (Some(reply), _) => Attempt::completed(self.id(), ProbeStatus::Ok(Route::Http), latency, reply),
            (None, ShapePolicy::Lenient) => {
                tracing::debug!(
                    provider = %provider.name,
                    model = %model.id,
                    "Gemini 200 with unexpected shape — trusted as alive"
                );
                Attempt::completed(self.id(), ProbeStatus::Ok(Route::Http), latency, UNEXPECTED_FORMAT)
            }
            (None, ShapePolicy::Strict) => {
                Attempt::completed(self.id(), ProbeStatus::MalformedResponse, latency, text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Credential;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: &str, key: Option<&str>) -> ProviderSpec {
        ProviderSpec {
            name: "google".into(),
            kind: ApiKind::GoogleGenerative {
                base_url: Some(base_url.to_string()),
                credential: key.map(Credential::new),
            },
            models: vec![ModelSpec::new("gemini-2.5-flash")],
        }
    }

    fn strategy(policy: ShapePolicy) -> GoogleStrategy {
        GoogleStrategy::new(reqwest::Client::new(), Duration::from_secs(5), policy)
    }

    #[test]
    fn test_generate_url() {
        assert_eq!(
            generate_url(None, "gemini-2.5-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(
            generate_url(Some("http://localhost:9/v1beta/"), "g"),
            "http://localhost:9/v1beta/models/g:generateContent"
        );
    }

    #[tokio::test]
    async fn test_candidate_text_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "AIza-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "Hello!"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let p = provider(&server.uri(), Some("AIza-test"));
        let attempt = strategy(ShapePolicy::Lenient).probe(&p, &p.models[0], Duration::from_secs(5)).await;
        assert_eq!(attempt.status, ProbeStatus::Ok(Route::Http));
        assert_eq!(attempt.snippet, "Hello!");
    }

    #[tokio::test]
    async fn test_unexpected_shape_depends_on_policy() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"finishReason": "SAFETY"}]
            })))
            .mount(&server)
            .await;

        let p = provider(&server.uri(), Some("AIza-test"));

        let lenient = strategy(ShapePolicy::Lenient).probe(&p, &p.models[0], Duration::from_secs(5)).await;
        assert!(lenient.succeeded());
        assert_eq!(lenient.snippet, UNEXPECTED_FORMAT);

        let strict = strategy(ShapePolicy::Strict).probe(&p, &p.models[0], Duration::from_secs(5)).await;
        assert_eq!(strict.status, ProbeStatus::MalformedResponse);
        assert!(strict.latency.is_some());
    }

    #[tokio::test]
    async fn test_quota_error_is_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"))
            .mount(&server)
            .await;

        let p = provider(&server.uri(), Some("AIza-test"));
        let attempt = strategy(ShapePolicy::Lenient).probe(&p, &p.models[0], Duration::from_secs(5)).await;
        assert_eq!(attempt.status, ProbeStatus::HttpError(429));
        assert_eq!(attempt.snippet, "RESOURCE_EXHAUSTED");
    }

    #[tokio::test]
    async fn test_connect_failure_does_not_expose_key() {
        // Bind then release a port so nothing listens on it.
        let port = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let p = provider(&format!("http://127.0.0.1:{}/v1beta", port), Some("AIzaSECRETKEY123"));

        let attempt = strategy(ShapePolicy::Lenient).probe(&p, &p.models[0], Duration::from_secs(5)).await;
        assert_eq!(attempt.status, ProbeStatus::Network);
        assert!(!attempt.snippet.contains("AIzaSECRETKEY123"), "{}", attempt.snippet);
    }

    #[tokio::test]
    async fn test_timeout_does_not_expose_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let p = provider(&server.uri(), Some("AIzaSECRETKEY123"));
        let attempt = strategy(ShapePolicy::Lenient).probe(&p, &p.models[0], Duration::from_millis(200)).await;
        assert_eq!(attempt.status, ProbeStatus::Timeout);
        assert!(!attempt.snippet.contains("AIzaSECRETKEY123"), "{}", attempt.snippet);
    }

    #[tokio::test]
    async fn test_missing_key_is_preflight_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let p = provider(&server.uri(), None);
        let attempt = strategy(ShapePolicy::Lenient).probe(&p, &p.models[0], Duration::from_secs(5)).await;
        assert_eq!(attempt.status, ProbeStatus::MissingCredential);
        assert_eq!(attempt.latency, None);
    }
}
