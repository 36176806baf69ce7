//! Registry loader — reads `models.providers` out of the OpenClaw config
//! and resolves each entry into a [`ProviderSpec`].

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use super::{ApiKind, Credential, DefaultModels, ModelSpec, ProviderSpec};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry file not found at {0}")]
    NotFound(PathBuf),

    #[error("failed to read registry {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse registry {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// ── File Shape ──────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    models: ModelsSection,
}

#[derive(Debug, Default, Deserialize)]
struct ModelsSection {
    #[serde(default)]
    providers: BTreeMap<String, RawProvider>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProvider {
    #[serde(default)]
    api: String,
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    models: Vec<ModelSpec>,
}

// ── Loader ──────────────────────────────────────────────────────────

pub struct RegistryLoader {
    oauth_sentinels: Vec<String>,
    defaults: DefaultModels,
}

impl RegistryLoader {
    pub fn new(oauth_sentinels: Vec<String>, defaults: DefaultModels) -> Self {
        Self { oauth_sentinels, defaults }
    }

    /// Load every provider from the registry file, ordered by name.
    pub fn load_file(&self, path: &Path) -> Result<Vec<ProviderSpec>, RegistryError> {
        if !path.exists() {
            return Err(RegistryError::NotFound(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse(&raw).map_err(|source| RegistryError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(&self, raw: &str) -> Result<Vec<ProviderSpec>, serde_json::Error> {
        let file: RegistryFile = serde_json::from_str(raw)?;
        Ok(file
            .models
            .providers
            .into_iter()
            .map(|(name, raw)| self.resolve(name, raw))
            .collect())
    }

    fn resolve(&self, name: String, raw: RawProvider) -> ProviderSpec {
        let kind = self.resolve_kind(&name, &raw.api, raw.base_url, raw.api_key);

        let models = if raw.models.is_empty() {
            match self.defaults.for_provider(&name) {
                Some(defaults) => {
                    debug!(provider = %name, "No models listed — using built-in defaults");
                    defaults.to_vec()
                }
                None => {
                    warn!(provider = %name, "No models listed and no defaults — nothing to probe");
                    Vec::new()
                }
            }
        } else {
            raw.models
        };

        ProviderSpec { name, kind, models }
    }

    /// Map the loose registry fields onto a closed [`ApiKind`].
    ///
    /// Precedence: an OAuth sentinel credential wins over any `api` value;
    /// then the `api` string; a provider named like `google` with no
    /// recognised `api` is treated as Google.
    pub fn resolve_kind(
        &self,
        name: &str,
        api: &str,
        base_url: Option<String>,
        api_key: Option<String>,
    ) -> ApiKind {
        let credential = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(Credential::new);

        if let Some(sentinel) = credential
            .as_ref()
            .and_then(|c| self.oauth_sentinels.iter().find(|s| s.as_str() == c.expose()))
        {
            return ApiKind::OauthManaged { sentinel: sentinel.clone() };
        }

        let base_url = base_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        match api.trim() {
            "openai-completions" | "http-completions" => match base_url {
                Some(base_url) => ApiKind::HttpCompletions { base_url, credential },
                None => {
                    debug!(provider = %name, "http-completions without baseUrl — probing via spawn");
                    ApiKind::CliSpawn
                }
            },
            "google-generative-ai" | "google-generative" => {
                ApiKind::GoogleGenerative { base_url, credential }
            }
            "oauth-managed" => ApiKind::OauthManaged {
                sentinel: "external".to_string(),
            },
            "cli-spawn" => ApiKind::CliSpawn,
            "opencode-cli" | "opencode" => ApiKind::OpencodeCli,
            _ if name.contains("google") => ApiKind::GoogleGenerative { base_url, credential },
            other => ApiKind::Unknown { api: other.to_string() },
        }
    }
}
