use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;

use super::client::LlmProvider;
use super::error_handler::LlmError;

/// LLM settings, stored under the `llm` key of the application config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub default_provider: Option<String>,
    pub providers: BTreeMap<String, ProviderConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl LlmConfig {
    fn provider_entry(&mut self, provider: &str) -> &mut ProviderConfig {
        self.providers.entry(provider.to_string()).or_default()
    }

    /// Set API key for a provider
    pub fn set_api_key(&mut self, provider: &str, api_key: String) {
        self.provider_entry(provider).api_key = api_key;
    }

    /// Get API key for a provider
    pub fn get_api_key(&self, provider: &str) -> Option<&str> {
        self.providers.get(provider).map(|config| config.api_key.as_str())
    }

    /// Set default provider
    pub fn set_default_provider(&mut self, provider: String) -> Result<(), LlmError> {
        LlmProvider::from_str(&provider)?;
        self.default_provider = Some(provider);
        Ok(())
    }

    pub fn set_model(&mut self, provider: &str, model: String) {
        self.provider_entry(provider).model = Some(model);
    }

    /// Set base URL for a provider (useful for Ollama or proxies)
    pub fn set_base_url(&mut self, provider: &str, base_url: String) {
        self.provider_entry(provider).base_url = Some(base_url);
    }

    /// Whether a provider has enough settings to be used
    pub fn has_provider(&self, provider: &str) -> bool {
        match self.providers.get(provider) {
            Some(config) => {
                !config.api_key.is_empty()
                    || LlmProvider::from_str(provider).is_ok_and(|p| !p.requires_api_key())
            }
            None => false,
        }
    }

    /// API key from the config file, falling back to the provider's environment variable
    pub fn get_api_key_with_fallback(&self, provider: &str) -> Option<String> {
        self.api_key_with(provider, |name| env::var(name).ok())
    }

    fn api_key_with(&self, provider: &str, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        if let Some(key) = self.get_api_key(provider) {
            if !key.is_empty() {
                return Some(key.to_string());
            }
        }

        let env_var = LlmProvider::from_str(provider).ok()?.api_key_env_var()?;
        lookup(env_var).filter(|key| !key.trim().is_empty())
    }

    /// Provider that enhancement requests should go to, if any
    pub fn active_provider(&self) -> Option<String> {
        self.active_provider_with(|name| env::var(name).ok())
    }

    fn active_provider_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        if let Some(default) = &self.default_provider {
            if self.has_provider(default) || self.api_key_with(default, &lookup).is_some() {
                return Some(default.clone());
            }
        }

        if let Some(name) = self.providers.keys().find(|name| self.has_provider(name)) {
            return Some(name.clone());
        }

        [LlmProvider::Claude, LlmProvider::ChatGpt]
            .into_iter()
            .find(|provider| {
                provider
                    .api_key_env_var()
                    .and_then(&lookup)
                    .is_some_and(|key| !key.trim().is_empty())
            })
            .map(|provider| provider.name().to_string())
    }

    /// Problems worth telling the user about
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (provider_name, config) in &self.providers {
            match LlmProvider::from_str(provider_name) {
                Ok(provider) if provider.requires_api_key() && config.api_key.is_empty() => {
                    warnings.push(format!("Provider '{}' has no API key", provider_name));
                }
                Ok(_) => {}
                Err(_) => warnings.push(format!("Unknown provider: '{}'", provider_name)),
            }
        }

        if let Some(default) = &self.default_provider {
            if !self.providers.contains_key(default) {
                warnings.push(format!("Default provider '{}' is not configured", default));
            }
        }

        warnings
    }

    /// Human-readable summary with API keys masked
    pub fn describe(&self) -> String {
        let mut lines = vec![format!(
            "Default provider: {}",
            self.default_provider.as_deref().unwrap_or("(none)")
        )];

        if self.providers.is_empty() {
            lines.push("No providers configured".to_string());
        }

        for (name, config) in &self.providers {
            lines.push(format!("[{}]", name));
            lines.push(format!("  api_key: {}", mask_api_key(&config.api_key)));
            if let Some(model) = &config.model {
                lines.push(format!("  model: {}", model));
            }
            if let Some(base_url) = &config.base_url {
                lines.push(format!("  base_url: {}", base_url));
            }
        }

        lines.join("\n")
    }
}

/// Show only the ends of a key
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.is_empty() {
        return "(not set)".to_string();
    }
    if chars.len() <= 12 {
        return "****".to_string();
    }

    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}****{tail}")
}
