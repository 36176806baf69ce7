//! Probe strategies — one way of checking liveness per API kind.
//!
//! A strategy never returns an error. Network failures, bad payloads,
//! non-2xx responses, timeouts and crashed subprocesses all come back as
//! an [`Attempt`] with the matching [`ProbeStatus`]. The escalation policy
//! decides which strategies run; strategies never see each other.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ProberConfig;
use crate::registry::{ModelSpec, ProviderSpec};

pub mod google;
pub mod oauth;
pub mod openai;
pub mod opencode;
pub mod spawn;

/// Maximum characters kept from any response or error text.
pub const SNIPPET_LIMIT: usize = 160;

// ── Status Taxonomy ─────────────────────────────────────────────────

/// Which leg produced a successful round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Http,
    Spawn,
    Cli,
}

/// Coarse failure class every status belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCategory {
    Ok,
    Timeout,
    Network,
    Malformed,
    HttpError,
    CliError,
    AuthFailed,
    NotAllowed,
    Unknown,
}

impl StatusCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCategory::Ok => "ok",
            StatusCategory::Timeout => "timeout",
            StatusCategory::Network => "network",
            StatusCategory::Malformed => "malformed",
            StatusCategory::HttpError => "http-error",
            StatusCategory::CliError => "cli-error",
            StatusCategory::AuthFailed => "auth-failed",
            StatusCategory::NotAllowed => "not-allowed",
            StatusCategory::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    Ok(Route),
    OauthManaged,
    EmptyResponse,
    MalformedResponse,
    HttpError(u16),
    Timeout,
    Network,
    MissingCredential,
    SpawnTimeout,
    SpawnError,
    SpawnNoReply,
    CliError(i32),
    AuthFailed,
    NotAllowed,
    Unknown,
}

impl ProbeStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeStatus::Ok(_) | ProbeStatus::OauthManaged)
    }

    pub fn category(&self) -> StatusCategory {
        match self {
            ProbeStatus::Ok(_) | ProbeStatus::OauthManaged => StatusCategory::Ok,
            ProbeStatus::EmptyResponse | ProbeStatus::MalformedResponse => StatusCategory::Malformed,
            ProbeStatus::HttpError(_) => StatusCategory::HttpError,
            ProbeStatus::Timeout | ProbeStatus::SpawnTimeout => StatusCategory::Timeout,
            ProbeStatus::Network => StatusCategory::Network,
            ProbeStatus::MissingCredential | ProbeStatus::AuthFailed => StatusCategory::AuthFailed,
            ProbeStatus::SpawnError | ProbeStatus::SpawnNoReply | ProbeStatus::CliError(_) => {
                StatusCategory::CliError
            }
            ProbeStatus::NotAllowed => StatusCategory::NotAllowed,
            ProbeStatus::Unknown => StatusCategory::Unknown,
        }
    }

    /// A verdict the session manager gives about the model itself, as
    /// opposed to a transport problem.
    pub fn is_definitive(&self) -> bool {
        matches!(self, ProbeStatus::AuthFailed | ProbeStatus::NotAllowed)
    }

    /// Report label. Success labels carry the round-trip time.
    pub fn label(&self, latency: Option<Duration>) -> String {
        match self {
            ProbeStatus::Ok(route) => {
                let Some(latency) = latency else {
                    return "OK".to_string();
                };
                let secs = latency.as_secs_f64();
                match route {
                    Route::Http => format!("OK ({:.2}s)", secs),
                    Route::Spawn => format!("OK (spawn {:.1}s)", secs),
                    Route::Cli => format!("OK (cli {:.1}s)", secs),
                }
            }
            ProbeStatus::OauthManaged => "oauth-managed".to_string(),
            ProbeStatus::EmptyResponse => "empty-response".to_string(),
            ProbeStatus::MalformedResponse => "malformed-response".to_string(),
            ProbeStatus::HttpError(code) => format!("http-error-{}", code),
            ProbeStatus::Timeout => "timeout".to_string(),
            ProbeStatus::Network => "network-error".to_string(),
            ProbeStatus::MissingCredential => "missing-credential".to_string(),
            ProbeStatus::SpawnTimeout => "spawn-timeout".to_string(),
            ProbeStatus::SpawnError => "spawn-error".to_string(),
            ProbeStatus::SpawnNoReply => "spawn-no-reply".to_string(),
            ProbeStatus::CliError(code) => format!("cli-error-{}", code),
            ProbeStatus::AuthFailed => "Auth Failed".to_string(),
            ProbeStatus::NotAllowed => "Not Allowed".to_string(),
            ProbeStatus::Unknown => "unknown".to_string(),
        }
    }
}

// ── Attempts & Results ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyId {
    OpenAi,
    Google,
    Oauth,
    Spawn,
    Opencode,
}

impl StrategyId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyId::OpenAi => "openai",
            StrategyId::Google => "google",
            StrategyId::Oauth => "oauth",
            StrategyId::Spawn => "spawn",
            StrategyId::Opencode => "opencode",
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single strategy call.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub strategy: StrategyId,
    pub status: ProbeStatus,
    /// Set iff a round trip happened.
    pub latency: Option<Duration>,
    pub snippet: String,
}

impl Attempt {
    /// The request went out and something came back (or the clock ran out).
    pub fn completed(
        strategy: StrategyId,
        status: ProbeStatus,
        latency: Duration,
        text: impl AsRef<str>,
    ) -> Self {
        Self {
            strategy,
            status,
            latency: Some(latency),
            snippet: snippet(text.as_ref()),
        }
    }

    /// Nothing reached the backend: pre-flight rejection, connect failure,
    /// or no network involved at all.
    pub fn unreached(strategy: StrategyId, status: ProbeStatus, text: impl AsRef<str>) -> Self {
        Self {
            strategy,
            status,
            latency: None,
            snippet: snippet(text.as_ref()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status.is_success()
    }
}

/// Which stage of the escalation pipeline produced the final outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Primary,
    Fallback,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Primary => "primary",
            Stage::Fallback => "fallback",
        }
    }
}

/// Final, normalized outcome for one (provider, model) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub provider: String,
    pub model: String,
    pub success: bool,
    pub status: ProbeStatus,
    pub latency: Option<Duration>,
    pub snippet: String,
    pub strategy: StrategyId,
    pub stage: Stage,
}

impl ProbeResult {
    pub fn from_attempt(
        provider: impl Into<String>,
        model: impl Into<String>,
        attempt: Attempt,
        stage: Stage,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            success: attempt.status.is_success(),
            status: attempt.status,
            latency: attempt.latency,
            snippet: attempt.snippet,
            strategy: attempt.strategy,
            stage,
        }
    }

    pub fn status_label(&self) -> String {
        self.status.label(self.latency)
    }

    pub fn latency_ms(&self) -> Option<u64> {
        self.latency.map(|d| d.as_millis() as u64)
    }
}

// ── Strategy Trait ──────────────────────────────────────────────────

#[async_trait]
pub trait ProbeStrategy: Send + Sync {
    fn id(&self) -> StrategyId;

    /// Upper bound this strategy enforces on a single probe.
    fn timeout(&self) -> Duration;

    /// Probe one model. Must return within `timeout` plus scheduling slack.
    async fn probe(&self, provider: &ProviderSpec, model: &ModelSpec, timeout: Duration) -> Attempt;
}

/// The full set of strategies, one per [`StrategyId`].
#[derive(Clone)]
pub struct StrategySet {
    pub openai: Arc<dyn ProbeStrategy>,
    pub google: Arc<dyn ProbeStrategy>,
    pub oauth: Arc<dyn ProbeStrategy>,
    pub spawn: Arc<dyn ProbeStrategy>,
    pub opencode: Arc<dyn ProbeStrategy>,
}

impl StrategySet {
    pub fn from_config(config: &ProberConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("model-status/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let probe = &config.probe;

        Ok(Self {
            openai: Arc::new(openai::OpenAiStrategy::new(
                client.clone(),
                probe.http_timeout(),
                probe.oauth_sentinels.clone(),
            )),
            google: Arc::new(google::GoogleStrategy::new(
                client,
                probe.http_timeout(),
                probe.google_shape_policy,
            )),
            oauth: Arc::new(oauth::OauthStrategy),
            spawn: Arc::new(spawn::SpawnStrategy::new(
                config.spawn.clone(),
                probe.spawn_timeout(),
            )),
            opencode: Arc::new(opencode::OpencodeStrategy::new(
                config.opencode.clone(),
                probe.cli_timeout(),
            )),
        })
    }

    pub fn get(&self, id: StrategyId) -> &Arc<dyn ProbeStrategy> {
        match id {
            StrategyId::OpenAi => &self.openai,
            StrategyId::Google => &self.google,
            StrategyId::Oauth => &self.oauth,
            StrategyId::Spawn => &self.spawn,
            StrategyId::Opencode => &self.opencode,
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Single-line, bounded diagnostic text.
pub fn snippet(text: &str) -> String {
    let flat = text.replace(['\r', '\n'], " ");
    truncate_chars(flat.trim(), SNIPPET_LIMIT)
}

/// Truncate to at most `limit` characters, on a char boundary.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Normalize a reqwest failure. Timeouts count as a round trip of
/// `elapsed`; connect and other transport errors never reached the model.
///
/// The URL is stripped from the message; it may carry a credential.
pub(crate) fn transport_failure(strategy: StrategyId, err: reqwest::Error, started: Instant) -> Attempt {
    let err = err.without_url();
    if err.is_timeout() {
        Attempt::completed(strategy, ProbeStatus::Timeout, started.elapsed(), err.to_string())
    } else if err.is_decode() {
        Attempt::completed(strategy, ProbeStatus::MalformedResponse, started.elapsed(), err.to_string())
    } else {
        Attempt::unreached(strategy, ProbeStatus::Network, err.to_string())
    }
}
