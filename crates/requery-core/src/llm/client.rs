//! HTTP client for external LLM services (OpenAI, OpenRouter, vLLM, etc.)

use crate::error::{RequeryError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Trait for LLM completion clients
///
/// Reformulation methods depend on this seam only, so tests can substitute
/// scripted in-memory clients.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Request `n` completions for one chat message list
    async fn generate(&self, messages: &[ChatMessage], n: usize) -> Result<Vec<String>>;

    /// Request a single completion
    async fn generate_one(&self, messages: &[ChatMessage]) -> Result<String> {
        self.generate(messages, 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RequeryError::Llm("No response from LLM".to_string()))
    }

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Chat message for completion requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Hosting provider for a model preset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    OpenRouter,
}

impl Provider {
    pub fn base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::OpenRouter => "https://openrouter.ai/api/v1",
        }
    }

    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::OpenRouter => "OPENROUTER_API_KEY",
        }
    }
}

/// Short experiment names mapped to (provider, provider model id)
const MODEL_PRESETS: &[(&str, Provider, &str)] = &[
    ("gpt-4.1", Provider::OpenAi, "gpt-4.1"),
    ("gpt-4.1-nano", Provider::OpenAi, "gpt-4.1-nano"),
    ("qwen-72b", Provider::OpenRouter, "qwen/qwen-2.5-72b-instruct"),
    ("qwen-7b", Provider::OpenRouter, "qwen/qwen-2.5-7b-instruct"),
];

/// Resolve an experiment model name to its provider and provider model id.
///
/// Names missing from the preset table are passed through as OpenAI model
/// ids, so new models work without a registry change.
pub fn resolve_model(name: &str) -> (Provider, String) {
    for (short, provider, model_id) in MODEL_PRESETS {
        if *short == name {
            return (*provider, model_id.to_string());
        }
    }
    (Provider::OpenAi, name.to_string())
}

fn default_model() -> String {
    "gpt-4.1".to_string()
}

fn default_max_tokens() -> u32 {
    256
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    120
}

/// Completion service settings (the `llm:` config section)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Experiment model name (preset) or raw provider model id
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Override the provider base URL (e.g. a local vLLM endpoint)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,

    /// Override the API key; defaults to the provider's environment variable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            api_base: None,
            api_key: None,
        }
    }
}

/// OpenAI-compatible chat completions client
pub struct OpenAiClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model_id: String,
    settings: LlmSettings,
}

impl OpenAiClient {
    /// Create a client for `settings.model`, resolving provider presets
    pub fn new(settings: LlmSettings) -> Result<Self> {
        let (provider, model_id) = resolve_model(&settings.model);

        let base_url = settings
            .api_base
            .clone()
            .unwrap_or_else(|| provider.base_url().to_string());

        let api_key = settings
            .api_key
            .clone()
            .or_else(|| std::env::var(provider.api_key_env()).ok());

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(RequeryError::Http)?;

        Ok(Self {
            http_client,
            base_url,
            api_key,
            model_id,
            settings,
        })
    }

    async fn request_completions(&self, messages: &[ChatMessage], n: usize) -> Result<Vec<String>> {
        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
            temperature: f32,
            max_tokens: u32,
            n: usize,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<ChatChoice>,
        }

        #[derive(Deserialize)]
        struct ChatChoice {
            message: ChatMessage,
        }

        let request = ChatRequest {
            model: &self.model_id,
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            n,
        };

        let url = format!("{}/chat/completions", self.base_url);

        let mut req = self.http_client.post(&url).json(&request);

        if let Some(ref api_key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req.send().await.map_err(RequeryError::Http)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RequeryError::Llm(format!(
                "LLM service error (HTTP {}): {}",
                status, body
            )));
        }

        let chat_response: ChatResponse = response.json().await.map_err(RequeryError::Http)?;

        if chat_response.choices.is_empty() {
            return Err(RequeryError::Llm("No response from LLM".to_string()));
        }

        Ok(chat_response
            .choices
            .into_iter()
            .map(|c| c.message.content.trim().to_string())
            .collect())
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn generate(&self, messages: &[ChatMessage], n: usize) -> Result<Vec<String>> {
        let max_attempts = self.settings.max_retries.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.request_completions(messages, n).await {
                Ok(choices) => return Ok(choices),
                Err(e) if attempt < max_attempts => {
                    let delay = Duration::from_secs(1u64 << attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        "Completion request failed ({}), retrying in {}s",
                        e,
                        delay.as_secs()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}
