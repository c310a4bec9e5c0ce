use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

use super::config::LlmConfig;
use super::error_handler::{ErrorHandler, LlmError, RetryConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Claude,
    ChatGpt,
    Ollama,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Result<Self, LlmError> {
        match s.to_lowercase().as_str() {
            "claude" | "anthropic" => Ok(LlmProvider::Claude),
            "chatgpt" | "openai" => Ok(LlmProvider::ChatGpt),
            "ollama" | "local" => Ok(LlmProvider::Ollama),
            _ => Err(LlmError::UnsupportedProvider(s.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::Claude => "claude",
            LlmProvider::ChatGpt => "chatgpt",
            LlmProvider::Ollama => "ollama",
        }
    }

    pub fn api_base_url(&self) -> &'static str {
        match self {
            LlmProvider::Claude => "https://api.anthropic.com/v1",
            LlmProvider::ChatGpt => "https://api.openai.com/v1",
            LlmProvider::Ollama => "http://localhost:11434/api",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Claude => "claude-3-5-haiku-latest",
            LlmProvider::ChatGpt => "gpt-4o-mini",
            LlmProvider::Ollama => "llama3",
        }
    }

    /// Environment variable consulted when no key is stored in the config file
    pub fn api_key_env_var(&self) -> Option<&'static str> {
        match self {
            LlmProvider::Claude => Some("ANTHROPIC_API_KEY"),
            LlmProvider::ChatGpt => Some("OPENAI_API_KEY"),
            LlmProvider::Ollama => None,
        }
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, LlmProvider::Ollama)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub prompt: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub usage: Option<Usage>,
    pub model: String,
    pub provider: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

pub struct LlmClient {
    provider: LlmProvider,
    api_key: String,
    base_url: String,
    client: Client,
    model: String,
    max_tokens: u32,
    temperature: f32,
    error_handler: ErrorHandler,
}

impl LlmClient {
    pub fn new(provider: LlmProvider, api_key: String) -> Result<Self, LlmError> {
        if provider.requires_api_key() && api_key.trim().is_empty() {
            return Err(LlmError::Authentication {
                provider: provider.name().to_string(),
                message: "API key cannot be empty".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| LlmError::Network {
                provider: provider.name().to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            provider,
            api_key,
            base_url: provider.api_base_url().to_string(),
            client,
            model: provider.default_model().to_string(),
            max_tokens: 4096,
            temperature: 0.3,
            error_handler: ErrorHandler::new(RetryConfig::default()),
        })
    }

    /// Build a client for the configured (or environment-detected) provider
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let provider_name = config.active_provider().ok_or(LlmError::NotConfigured)?;
        let provider = LlmProvider::from_str(&provider_name)?;
        let api_key = config.get_api_key_with_fallback(&provider_name).unwrap_or_default();

        let mut client = Self::new(provider, api_key)?;
        if let Some(settings) = config.providers.get(&provider_name) {
            if let Some(model) = &settings.model {
                client.model = model.clone();
            }
            if let Some(base_url) = &settings.base_url {
                client.base_url = base_url.trim_end_matches('/').to_string();
            }
            if let Some(max_tokens) = settings.max_tokens {
                client.max_tokens = max_tokens;
            }
            if let Some(temperature) = settings.temperature {
                client.temperature = temperature;
            }
        }

        tracing::debug!(provider = provider.name(), model = %client.model, "LLM client ready");
        Ok(client)
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let request = &request;
        self.error_handler
            .execute_with_retry(self.provider.name(), move || self.send(request))
            .await
    }

    async fn send(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        match self.provider {
            LlmProvider::Claude => self.generate_claude(request).await,
            LlmProvider::ChatGpt => self.generate_chatgpt(request).await,
            LlmProvider::Ollama => self.generate_ollama(request).await,
        }
    }

    async fn post_json(&self, request: reqwest::RequestBuilder, payload: &Value) -> Result<Value, LlmError> {
        let provider = self.provider.name();

        let response = request
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| LlmError::Network {
                provider: provider.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(provider, status.as_u16(), error_text));
        }

        response.json().await.map_err(|e| LlmError::Parse {
            provider: provider.to_string(),
            message: e.to_string(),
        })
    }

    fn parse_error(&self, message: &str) -> LlmError {
        LlmError::Parse {
            provider: self.provider.name().to_string(),
            message: message.to_string(),
        }
    }

    async fn generate_claude(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/messages", self.base_url);

        let mut payload = json!({
            "model": self.model,
            "max_tokens": request.max_tokens.unwrap_or(self.max_tokens),
            "temperature": request.temperature.unwrap_or(self.temperature),
            "messages": [{ "role": "user", "content": request.prompt }]
        });

        // System prompt is a top-level parameter for Claude
        if let Some(system) = &request.system_prompt {
            payload["system"] = json!(system);
        }

        let http = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01");
        let response_json = self.post_json(http, &payload).await?;

        let content = response_json["content"]
            .as_array()
            .and_then(|blocks| blocks.iter().find(|b| b["type"] == "text"))
            .and_then(|block| block["text"].as_str())
            .ok_or_else(|| self.parse_error("Invalid Claude response format"))?
            .to_string();

        let usage = response_json.get("usage").map(|usage_data| {
            let input = usage_data["input_tokens"].as_u64().unwrap_or(0) as u32;
            let output = usage_data["output_tokens"].as_u64().unwrap_or(0) as u32;
            Usage {
                prompt_tokens: input,
                completion_tokens: output,
                total_tokens: input + output,
            }
        });

        Ok(self.response(content, usage))
    }

    async fn generate_chatgpt(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut messages = Vec::new();
        if let Some(system) = &request.system_prompt {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let payload = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(self.max_tokens),
            "temperature": request.temperature.unwrap_or(self.temperature)
        });

        let http = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key));
        let response_json = self.post_json(http, &payload).await?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| self.parse_error("Invalid ChatGPT response format"))?
            .to_string();

        let usage = response_json.get("usage").map(|usage_data| Usage {
            prompt_tokens: usage_data["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            completion_tokens: usage_data["completion_tokens"].as_u64().unwrap_or(0) as u32,
            total_tokens: usage_data["total_tokens"].as_u64().unwrap_or(0) as u32,
        });

        Ok(self.response(content, usage))
    }

    async fn generate_ollama(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/generate", self.base_url);

        let mut payload = json!({
            "model": self.model,
            "prompt": request.prompt,
            "stream": false,
            "format": "json",
            "options": {
                "num_predict": request.max_tokens.unwrap_or(self.max_tokens),
                "temperature": request.temperature.unwrap_or(self.temperature)
            }
        });
        if let Some(system) = &request.system_prompt {
            payload["system"] = json!(system);
        }

        let response_json = self.post_json(self.client.post(&url), &payload).await?;

        let content = response_json["response"]
            .as_str()
            .ok_or_else(|| self.parse_error("Invalid Ollama response format"))?
            .to_string();

        let usage = response_json.get("prompt_eval_count").map(|count| {
            let prompt_tokens = count.as_u64().unwrap_or(0) as u32;
            let completion_tokens = response_json["eval_count"].as_u64().unwrap_or(0) as u32;
            Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }
        });

        Ok(self.response(content, usage))
    }

    fn response(&self, content: String, usage: Option<Usage>) -> LlmResponse {
        LlmResponse {
            content,
            usage,
            model: self.model.clone(),
            provider: self.provider.name().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_string() {
        assert_eq!(LlmProvider::from_str("claude").unwrap(), LlmProvider::Claude);
        assert_eq!(LlmProvider::from_str("Anthropic").unwrap(), LlmProvider::Claude);
        assert_eq!(LlmProvider::from_str("ChatGPT").unwrap(), LlmProvider::ChatGpt);
        assert_eq!(LlmProvider::from_str("openai").unwrap(), LlmProvider::ChatGpt);
        assert_eq!(LlmProvider::from_str("OLLAMA").unwrap(), LlmProvider::Ollama);
        assert_eq!(LlmProvider::from_str("local").unwrap(), LlmProvider::Ollama);

        assert!(matches!(
            LlmProvider::from_str("invalid"),
            Err(LlmError::UnsupportedProvider(_))
        ));
    }

    #[test]
    fn test_provider_properties() {
        let claude = LlmProvider::Claude;
        assert_eq!(claude.name(), "claude");
        assert!(claude.api_base_url().contains("anthropic"));
        assert_eq!(claude.api_key_env_var(), Some("ANTHROPIC_API_KEY"));

        let chatgpt = LlmProvider::ChatGpt;
        assert!(chatgpt.api_base_url().contains("openai"));
        assert_eq!(chatgpt.api_key_env_var(), Some("OPENAI_API_KEY"));

        let ollama = LlmProvider::Ollama;
        assert!(ollama.api_base_url().contains("localhost"));
        assert!(!ollama.requires_api_key());
    }

    #[test]
    fn test_llm_client_creation() {
        let client = LlmClient::new(LlmProvider::Claude, "test-key".to_string()).unwrap();
        assert_eq!(client.provider(), LlmProvider::Claude);
        assert_eq!(client.model(), LlmProvider::Claude.default_model());

        assert!(LlmClient::new(LlmProvider::Claude, "  ".to_string()).is_err());
        assert!(LlmClient::new(LlmProvider::Ollama, String::new()).is_ok());
    }

    #[test]
    fn test_from_config_trims_base_url() {
        let mut config = LlmConfig::default();
        config.set_model("ollama", "mistral".to_string());
        config.set_base_url("ollama", "http://gpu-box:11434/api/".to_string());
        config.set_default_provider("ollama".to_string()).unwrap();

        let client = LlmClient::from_config(&config).unwrap();
        assert_eq!(client.model(), "mistral");
        assert_eq!(client.base_url, "http://gpu-box:11434/api");
    }

    #[test]
    fn test_from_config_applies_provider_settings() {
        let mut config = LlmConfig::default();
        config.set_api_key("chatgpt", "sk-test".to_string());
        config.set_model("chatgpt", "gpt-4o".to_string());
        config.set_default_provider("chatgpt".to_string()).unwrap();

        let client = LlmClient::from_config(&config).unwrap();
        assert_eq!(client.provider(), LlmProvider::ChatGpt);
        assert_eq!(client.model(), "gpt-4o");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let mut client = LlmClient::new(LlmProvider::Ollama, String::new()).unwrap();
        client.base_url = "http://127.0.0.1:9/api".to_string();
        client.error_handler = ErrorHandler::new(RetryConfig {
            max_retries: 0,
            ..Default::default()
        });

        let request = LlmRequest {
            prompt: "ping".to_string(),
            max_tokens: Some(5),
            temperature: None,
            system_prompt: None,
        };

        let err = client.generate(request).await.unwrap_err();
        assert!(matches!(err, LlmError::MaxRetriesExceeded { attempts: 1, .. }));
    }
}
