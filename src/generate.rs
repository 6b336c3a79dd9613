//! Answer generation providers.
//!
//! A [`Generator`] turns a fully assembled prompt into plain answer text.
//! Providers share the retry policy of the embedding providers (see
//! [`crate::retry`]).
//!
//! | `generation.provider` | Endpoint |
//! |-----------------------|----------|
//! | `"gemini"` | `{base}/{model}:generateContent` |
//! | `"openai"` | `{base}/v1/chat/completions` |
//! | `"ollama"` | `{base}/api/generate` (non-streaming) |
//! | `"disabled"` | always errors |

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{require_env, GenerationConfig};
use crate::embedding::{gemini_model_path, GEMINI_BASE_URL, OLLAMA_BASE_URL, OPENAI_BASE_URL};
use crate::retry::{send_json, RetryPolicy};

#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

fn async_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        bail!("Generation provider is disabled")
    }
}

// ============ Gemini ============

pub struct GeminiGenerator {
    model: String,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
    retry: RetryPolicy,
}

impl GeminiGenerator {
    /// Reads `GOOGLE_API_KEY` from the environment.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = require_env("GOOGLE_API_KEY")?;
        Ok(Self::with_api_key(config, api_key))
    }

    pub fn with_api_key(config: &GenerationConfig, api_key: impl Into<String>) -> Self {
        Self {
            model: gemini_model_path(&config.model_name()),
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            api_key: api_key.into(),
            timeout_secs: config.timeout_secs,
            retry: RetryPolicy::new(config.max_retries),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let client = async_client(self.timeout_secs)?;
        let url = format!(
            "{}/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        });

        let json = send_json(&self.retry, "Gemini", || {
            client
                .post(&url)
                .header("x-goog-api-key", self.api_key.as_str())
                .json(&body)
        })
        .await?;
        parse_gemini_answer(&json)
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_gemini_answer(json: &serde_json::Value) -> Result<String> {
    let candidate = json
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| {
            let reason = json
                .pointer("/promptFeedback/blockReason")
                .and_then(|r| r.as_str())
                .unwrap_or("no candidates returned");
            anyhow!("Gemini returned no answer: {}", reason)
        })?;

    let parts = candidate
        .pointer("/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow!("Invalid Gemini response: candidate has no content parts"))?;

    Ok(parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join(""))
}

// ============ OpenAI ============

pub struct OpenAIGenerator {
    model: String,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
    retry: RetryPolicy,
}

impl OpenAIGenerator {
    /// Reads `OPENAI_API_KEY` from the environment.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = require_env("OPENAI_API_KEY")?;
        Ok(Self {
            model: config.model_name(),
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            api_key,
            timeout_secs: config.timeout_secs,
            retry: RetryPolicy::new(config.max_retries),
        })
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let client = async_client(self.timeout_secs)?;
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let json = send_json(&self.retry, "OpenAI", || {
            client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
        })
        .await?;

        json.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
    }
}

// ============ Ollama ============

pub struct OllamaGenerator {
    model: String,
    base_url: String,
    timeout_secs: u64,
    retry: RetryPolicy,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Self {
        Self {
            model: config.model_name(),
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OLLAMA_BASE_URL.to_string()),
            timeout_secs: config.timeout_secs,
            retry: RetryPolicy::new(config.max_retries),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let client = async_client(self.timeout_secs)?;
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let json = send_json(&self.retry, "Ollama", || client.post(&url).json(&body))
            .await
            .map_err(|e| e.context(format!("is Ollama running at {}?", self.base_url)))?;

        json.get("response")
            .and_then(|r| r.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Invalid Ollama response: missing response"))
    }
}

/// Create the generator named by `config.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiGenerator::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config))),
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        other => bail!("Unknown generation provider: {}", other),
    }
}
