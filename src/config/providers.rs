// src/config/providers.rs
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::ai::http::HttpChatProvider;
use crate::ai::{DynProvider, Operation};
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatFlavor {
    /// OpenAI chat completions; also Gemini's compatibility endpoint and Ollama.
    #[serde(rename = "openai", alias = "open_ai")]
    OpenAi,
    #[serde(rename = "anthropic", alias = "claude")]
    Anthropic,
}

fn all_operations() -> Vec<Operation> {
    Operation::ALL.to_vec()
}

fn default_max_tokens() -> u32 {
    1024
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub name: String,
    pub flavor: ChatFlavor,
    pub endpoint: String,
    pub model: String,
    /// "ENV" means: read from `<NAME>_API_KEY`
    #[serde(default)]
    pub api_key: String,
    /// 0 disables local throttling.
    #[serde(default)]
    pub requests_per_minute: u32,
    #[serde(default = "all_operations")]
    pub capabilities: Vec<Operation>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl ProviderSpec {
    pub fn key_env_var(&self) -> String {
        format!("{}_API_KEY", self.name.to_ascii_uppercase().replace('-', "_"))
    }
}

/// Load `[[provider]]` tables from a TOML file, resolving `api_key = "ENV"`.
pub fn load_provider_specs(
    path: &Path,
    env: &dyn Fn(&str) -> Option<String>,
) -> anyhow::Result<Vec<ProviderSpec>> {
    #[derive(Deserialize)]
    struct ProvidersFile {
        #[serde(default)]
        provider: Vec<ProviderSpec>,
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("reading providers from {}", path.display()))?;
    let file: ProvidersFile = toml::from_str(&data)
        .with_context(|| format!("parsing providers in {}", path.display()))?;

    let mut specs = Vec::with_capacity(file.provider.len());
    for mut spec in file.provider {
        spec.name = spec.name.trim().to_lowercase();
        if spec.name.is_empty() {
            bail!("provider without a name in {}", path.display());
        }
        if spec.api_key.trim().eq_ignore_ascii_case("env") {
            let var = spec.key_env_var();
            spec.api_key = env(&var).ok_or_else(|| anyhow::anyhow!("Missing {var} env var"))?;
        }
        if spec.capabilities.is_empty() {
            bail!("provider {} declares no capabilities", spec.name);
        }
        specs.push(spec);
    }
    Ok(specs)
}

/// Provider list from well-known variables, in priority order openai → claude → gemini → local.
pub fn specs_from_env(env: &dyn Fn(&str) -> Option<String>) -> Vec<ProviderSpec> {
    let var = |k: &str| env(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let mut specs = Vec::new();

    if let Some(key) = var("OPENAI_API_KEY") {
        specs.push(ProviderSpec {
            name: "openai".into(),
            flavor: ChatFlavor::OpenAi,
            endpoint: "https://api.openai.com/v1/chat/completions".into(),
            model: var("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".into()),
            api_key: key,
            requests_per_minute: 60,
            capabilities: all_operations(),
            max_tokens: default_max_tokens(),
        });
    }
    if let Some(key) = var("CLAUDE_API_KEY") {
        specs.push(ProviderSpec {
            name: "claude".into(),
            flavor: ChatFlavor::Anthropic,
            endpoint: "https://api.anthropic.com/v1/messages".into(),
            model: var("CLAUDE_MODEL").unwrap_or_else(|| "claude-3-5-haiku-latest".into()),
            api_key: key,
            requests_per_minute: 40,
            capabilities: all_operations(),
            max_tokens: default_max_tokens(),
        });
    }
    if let Some(key) = var("GEMINI_API_KEY") {
        specs.push(ProviderSpec {
            name: "gemini".into(),
            flavor: ChatFlavor::OpenAi,
            endpoint: "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
                .into(),
            model: var("GEMINI_MODEL").unwrap_or_else(|| "gemini-1.5-flash".into()),
            api_key: key,
            requests_per_minute: 15,
            capabilities: all_operations(),
            max_tokens: default_max_tokens(),
        });
    }
    if let Some(base) = var("OLLAMA_URL") {
        specs.push(ProviderSpec {
            name: "local".into(),
            flavor: ChatFlavor::OpenAi,
            endpoint: format!("{}/v1/chat/completions", base.trim_end_matches('/')),
            model: var("OLLAMA_MODEL").unwrap_or_else(|| "llama3.1".into()),
            api_key: String::new(),
            requests_per_minute: 0,
            capabilities: all_operations(),
            max_tokens: default_max_tokens(),
        });
    }
    specs
}

/// Reorder/filter specs by a comma-separated name list; unknown names are ignored.
pub fn apply_priority(specs: Vec<ProviderSpec>, priority: &str) -> Vec<ProviderSpec> {
    let order: Vec<String> = priority
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    if order.is_empty() {
        return specs;
    }
    order
        .iter()
        .filter_map(|name| specs.iter().find(|s| &s.name == name).cloned())
        .collect()
}

pub fn build_providers(specs: &[ProviderSpec]) -> Result<Vec<DynProvider>, ConfigError> {
    specs
        .iter()
        .map(|spec| HttpChatProvider::new(spec.clone()).map(|p| Arc::new(p) as DynProvider))
        .collect()
}
