//! Provider registry — the backends to probe and how each is reached.
//!
//! Every provider resolves to exactly one [`ApiKind`] variant. The variant
//! carries only what its probe strategy needs, so the escalation policy
//! can match exhaustively and a new provider kind is a compile error until
//! every match handles it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod loader;

pub use loader::RegistryLoader;

// ── Core Types ──────────────────────────────────────────────────────

/// A pre-resolved API credential. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for building the outgoing request only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ModelSpec {
    #[cfg(test)]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), name: None }
    }

    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: Some(name.into()) }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// How a provider is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiKind {
    /// OpenAI-compatible `/chat/completions` endpoint.
    HttpCompletions {
        base_url: String,
        credential: Option<Credential>,
    },
    /// Google Generative Language API (`:generateContent`).
    GoogleGenerative {
        base_url: Option<String>,
        credential: Option<Credential>,
    },
    /// Auth handled by the gateway; the credential is a sentinel.
    OauthManaged { sentinel: String },
    /// Only reachable through the session manager.
    CliSpawn,
    /// Locally installed `opencode` CLI.
    OpencodeCli,
    /// Unrecognized `api` string; probed through the session manager.
    Unknown { api: String },
}

impl ApiKind {
    pub fn label(&self) -> &'static str {
        match self {
            ApiKind::HttpCompletions { .. } => "http-completions",
            ApiKind::GoogleGenerative { .. } => "google-generative",
            ApiKind::OauthManaged { .. } => "oauth-managed",
            ApiKind::CliSpawn => "cli-spawn",
            ApiKind::OpencodeCli => "opencode-cli",
            ApiKind::Unknown { .. } => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSpec {
    pub name: String,
    pub kind: ApiKind,
    pub models: Vec<ModelSpec>,
}

// ── Default Models ──────────────────────────────────────────────────

/// Models probed for a provider whose registry entry lists none.
///
/// Passed into the loader as a value so tests can swap in their own table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefaultModels(BTreeMap<String, Vec<ModelSpec>>);

impl DefaultModels {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, provider: impl Into<String>, models: Vec<ModelSpec>) -> Self {
        self.0.insert(provider.into(), models);
        self
    }

    pub fn for_provider(&self, provider: &str) -> Option<&[ModelSpec]> {
        self.0.get(provider).map(Vec::as_slice)
    }
}

impl Default for DefaultModels {
    fn default() -> Self {
        let gemini = vec![ModelSpec::named("gemini-1.5-flash", "Gemini 1.5 Flash")];
        Self::empty()
            .with("google", gemini.clone())
            .with("google-alt", gemini)
            .with(
                "nvidia",
                vec![ModelSpec::named("qwen/qwen2.5-coder-32b-instruct", "NVIDIA Qwen")],
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_debug_is_redacted() {
        let cred = Credential::new("sk-live-123456");
        assert_eq!(format!("{:?}", cred), "Credential(***)");
        assert_eq!(cred.expose(), "sk-live-123456");

        let kind = ApiKind::HttpCompletions {
            base_url: "https://x".into(),
            credential: Some(cred),
        };
        assert!(!format!("{:?}", kind).contains("sk-live"));
    }

    #[test]
    fn test_model_display_name_falls_back_to_id() {
        assert_eq!(ModelSpec::new("m1").display_name(), "m1");
        assert_eq!(ModelSpec::named("m1", "Model One").display_name(), "Model One");
    }

    #[test]
    fn test_builtin_default_models() {
        let defaults = DefaultModels::default();
        assert_eq!(defaults.for_provider("google").unwrap()[0].id, "gemini-1.5-flash");
        assert_eq!(defaults.for_provider("google-alt").unwrap().len(), 1);
        assert_eq!(
            defaults.for_provider("nvidia").unwrap()[0].id,
            "qwen/qwen2.5-coder-32b-instruct"
        );
        assert!(defaults.for_provider("acme").is_none());
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(ApiKind::CliSpawn.label(), "cli-spawn");
        assert_eq!(ApiKind::Unknown { api: "x".into() }.label(), "unknown");
        assert_eq!(ApiKind::OauthManaged { sentinel: "s".into() }.label(), "oauth-managed");
    }
}
