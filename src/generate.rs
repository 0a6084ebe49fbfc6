//! Text-generation capability adapters.
//!
//! Defines the [`Generator`] trait and an adapter for OpenAI-compatible
//! chat-completions endpoints (OpenAI, OpenRouter, Ollama's compatible
//! API). The adapter owns transport concerns (auth, timeout, retry on
//! 429/5xx) while the retrieval facade owns prompt construction. A
//! [`DisabledGenerator`] stands in when no provider is configured.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::config::GenerationConfig;

/// Trait for generation providers.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier.
    fn model_name(&self) -> &str;

    /// Generate text from a system instruction and a user prompt.
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;
}

/// Create the appropriate [`Generator`] based on configuration.
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn Generator>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiGenerator::new(config)?)),
        "disabled" => Ok(Box::new(DisabledGenerator)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

/// A no-op generator that always errors. Used when
/// `generation.provider = "disabled"`; ingestion, status, and reset keep
/// working without an LLM endpoint.
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _system: &str, _prompt: &str) -> Result<String> {
        bail!("Generation provider is disabled")
    }
}

/// Generation adapter for an OpenAI-compatible `/chat/completions`
/// endpoint.
///
/// Reads the API key from the environment variable named by
/// `generation.api_key_env` (default `OPENAI_API_KEY`). Retry strategy
/// matches the embedding adapters: 429/5xx/network errors back off
/// exponentially, other 4xx fail immediately.
pub struct OpenAiGenerator {
    model: String,
    url: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow!("{} environment variable not set", config.api_key_env))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            url: config.url.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt },
            ],
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(format!("{}/chat/completions", self.url))
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_chat_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow!("chat API error {}: {}", status, text));
                        continue;
                    }

                    let text = response.text().await.unwrap_or_default();
                    bail!("chat API error {}: {}", status, text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("generation failed after retries")))
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("no content found in chat response"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response() {
        let json = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "  the answer  " } }
            ]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "  the answer  ");
    }

    #[test]
    fn test_parse_chat_response_missing_content() {
        let json = serde_json::json!({ "choices": [] });
        assert!(parse_chat_response(&json).is_err());
    }

    #[tokio::test]
    async fn test_disabled_generator_errors() {
        let generator = DisabledGenerator;
        assert!(generator.generate("system", "prompt").await.is_err());
    }
}
