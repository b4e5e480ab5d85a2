//! Hosted language model client.
//!
//! [`ServingEndpoint`] posts a single-turn chat request to an
//! OpenAI-compatible serving endpoint. The chat layer only sees the
//! [`LanguageModel`] trait, so tests can substitute a canned model.

use std::time::Duration;

use serde_json::json;

use crate::config::{resolve_sources, LlmConfig};
use crate::error::{Error, Result};

pub trait LanguageModel: Send + Sync {
    /// Complete `prompt` and return the generated text.
    fn complete(&self, prompt: &str) -> Result<String>;
}

pub struct ServingEndpoint {
    client: reqwest::blocking::Client,
    endpoint: String,
    token: Option<String>,
    max_tokens: u32,
    temperature: f32,
}

impl ServingEndpoint {
    /// Build a client from config, resolving the endpoint and token through
    /// their fallback sources. Returns `Ok(None)` when no endpoint is set.
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>> {
        let endpoint = resolve_sources(&config.endpoint_sources());
        endpoint.warn_failures("llm.endpoint");
        let Some(endpoint) = endpoint.into_value() else {
            tracing::info!("no language model endpoint configured");
            return Ok(None);
        };

        let token = resolve_sources(&config.token_sources());
        token.warn_failures("llm.token");

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Llm(e.to_string()))?;

        Ok(Some(Self {
            client,
            endpoint,
            token: token.into_value(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl LanguageModel for ServingEndpoint {
    fn complete(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .map_err(|e| Error::Llm(format!("request failed: {}", e)))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(Error::Llm(format!("endpoint returned {}: {}", status, text)));
        }

        let json: serde_json::Value = response
            .json()
            .map_err(|e| Error::Llm(format!("invalid response body: {}", e)))?;
        completion_text(&json)
    }
}

/// Pull the generated text out of a response body.
///
/// Accepts the chat-completions shape (`choices[0].message.content`) as
/// well as flat `response` or `content` fields.
pub fn completion_text(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .or_else(|| json.get("response"))
        .or_else(|| json.get("content"))
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| Error::Llm(format!("unrecognized response shape: {}", json)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_chat_completion_shape() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": " Hi there. "}}]});
        assert_eq!(completion_text(&body).unwrap(), "Hi there.");
    }

    #[test]
    fn reads_flat_shapes() {
        assert_eq!(completion_text(&json!({"response": "a"})).unwrap(), "a");
        assert_eq!(completion_text(&json!({"content": "b"})).unwrap(), "b");
    }

    #[test]
    fn unknown_shape_is_llm_error() {
        let err = completion_text(&json!({"data": 1})).unwrap_err();
        assert!(matches!(err, Error::Llm(_)));
    }

    #[test]
    fn missing_endpoint_disables_model() {
        let config = LlmConfig {
            endpoint: None,
            ..LlmConfig::default()
        };
        // KA_LLM_ENDPOINT is not set in the test environment.
        if std::env::var(crate::config::ENV_LLM_ENDPOINT).is_err() {
            assert!(ServingEndpoint::from_config(&config).unwrap().is_none());
        }
    }

    #[test]
    fn configured_endpoint_builds_client() {
        let config = LlmConfig {
            endpoint: Some("http://127.0.0.1:9/v1/chat".into()),
            token: Some("secret".into()),
            ..LlmConfig::default()
        };
        let model = ServingEndpoint::from_config(&config).unwrap().unwrap();
        assert_eq!(model.endpoint(), "http://127.0.0.1:9/v1/chat");
    }
}
