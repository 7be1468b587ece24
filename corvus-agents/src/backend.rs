//! LLM backend abstraction
//!
//! The built-in specialists are prompt-driven: each one is a system prompt
//! over a shared LLM backend. OpenAI-compatible endpoints (incl. OpenRouter)
//! and Anthropic are supported.

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// LLM backend errors
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Empty response from model")]
    EmptyResponse,
}

/// Generic completion backend shared by all specialists
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate a completion for a system prompt and user content
    async fn generate(&self, system: &str, user: &str) -> Result<String, LlmError>;

    /// Model identifier for logging
    fn model_name(&self) -> &str;
}

/// Thread-safe reference to an LLM backend
pub type SharedBackend = Arc<dyn LlmBackend>;

/// OpenAI-compatible backend configuration
#[derive(Debug, Clone)]
pub struct OpenAiBackendConfig {
    pub api_key: String,
    /// Override for OpenRouter or self-hosted endpoints
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl OpenAiBackendConfig {
    pub fn openai(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: None,
            model: model.to_string(),
            temperature: 0.0,
            max_tokens: 4096,
        }
    }

    pub fn openrouter(api_key: &str, model: &str) -> Self {
        Self {
            base_url: Some("https://openrouter.ai/api/v1".to_string()),
            ..Self::openai(api_key, model)
        }
    }
}

/// OpenAI-compatible LLM backend
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
    config: OpenAiBackendConfig,
}

impl OpenAiBackend {
    pub fn new(config: OpenAiBackendConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::Config("API key is empty".to_string()));
        }
        let mut openai_config = OpenAIConfig::new().with_api_key(&config.api_key);
        if let Some(base_url) = &config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }
        Ok(Self {
            client: Client::with_config(openai_config),
            config,
        })
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn generate(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()
                    .map_err(|e| LlmError::Api(e.to_string()))?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user)
                    .build()
                    .map_err(|e| LlmError::Api(e.to_string()))?,
            ),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.model)
            .messages(messages)
            .temperature(self.config.temperature)
            .max_tokens(self.config.max_tokens)
            .build()
            .map_err(|e| LlmError::Api(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or(LlmError::EmptyResponse)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Anthropic backend configuration
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
}

impl AnthropicConfig {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens: 4096,
        }
    }
}

/// Anthropic Claude backend (Messages API over plain reqwest)
pub struct AnthropicBackend {
    client: reqwest::Client,
    config: AnthropicConfig,
}

impl AnthropicBackend {
    pub fn new(config: AnthropicConfig) -> Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::Config("API key is empty".to_string()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            config,
        })
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn generate(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "system": system,
            "messages": [{"role": "user", "content": user}]
        });

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("Anthropic API error {}: {}", status, text)));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;

        json["content"]
            .as_array()
            .and_then(|blocks| blocks.first())
            .and_then(|block| block["text"].as_str())
            .map(str::to_string)
            .ok_or(LlmError::EmptyResponse)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Create a shared OpenAI-compatible backend
pub fn create_backend(config: OpenAiBackendConfig) -> Result<SharedBackend, LlmError> {
    Ok(Arc::new(OpenAiBackend::new(config)?))
}

/// Create a shared Anthropic backend
pub fn create_anthropic_backend(config: AnthropicConfig) -> Result<SharedBackend, LlmError> {
    Ok(Arc::new(AnthropicBackend::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_rejected() {
        let result = OpenAiBackend::new(OpenAiBackendConfig::openai("", "gpt-4o-mini"));
        assert!(matches!(result, Err(LlmError::Config(_))));

        let result = AnthropicBackend::new(AnthropicConfig::new("", "claude-sonnet-4-20250514"));
        assert!(matches!(result, Err(LlmError::Config(_))));
    }

    #[test]
    fn test_openrouter_base_url() {
        let config = OpenAiBackendConfig::openrouter("key", "some/model");
        assert!(config.base_url.as_deref().unwrap().contains("openrouter.ai"));
    }
}
