//! Gemini-backed oracle with a single fallback retry.

use super::content::parse_content;
use super::{Oracle, OracleError, OracleRequest, OracleResponse, ResponseMetadata, TokenUsage};
use ::gemini::{Gemini, Message, Model, Request};
use async_trait::async_trait;
use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are an expert literary analyst. \
Answer with a single JSON object and nothing else.";

/// Configuration for [`GeminiOracle`].
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Model tried first.
    pub primary_model: Model,
    /// Model retried once when the primary call fails.
    pub fallback_model: Option<Model>,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            primary_model: Model::Pro,
            fallback_model: Some(Model::Flash),
            temperature: 0.7,
            max_tokens: 8192,
            timeout: Duration::from_secs(120),
        }
    }
}

impl OracleConfig {
    /// Read overrides from `GEMINI_MODEL`, `GEMINI_FALLBACK_MODEL` and
    /// `GEMINI_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            config.primary_model = Model::parse(&model);
        }
        if let Ok(model) = std::env::var("GEMINI_FALLBACK_MODEL") {
            config.fallback_model = match model.trim() {
                "" | "none" => None,
                name => Some(Model::parse(name)),
            };
        }
        if let Some(secs) = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }
        config
    }

    pub fn with_primary_model(mut self, model: Model) -> Self {
        self.primary_model = model;
        self
    }

    pub fn with_fallback_model(mut self, model: Option<Model>) -> Self {
        self.fallback_model = model;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Oracle backed by the Gemini API.
pub struct GeminiOracle {
    client: Gemini,
    config: OracleConfig,
}

impl GeminiOracle {
    pub fn new(api_key: impl Into<String>, config: OracleConfig) -> Self {
        let client = Gemini::new(api_key)
            .with_model(config.primary_model)
            .with_timeout(config.timeout);
        Self { client, config }
    }

    /// Build from `GEMINI_API_KEY` and [`OracleConfig::from_env`].
    pub fn from_env() -> Result<Self, OracleError> {
        let client = Gemini::from_env().map_err(|_| OracleError::NoApiKey)?;
        let config = OracleConfig::from_env();
        Ok(Self {
            client: client
                .with_model(config.primary_model)
                .with_timeout(config.timeout),
            config,
        })
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    fn build_request(&self, request: &OracleRequest, model: Model) -> Request {
        let system = request
            .system_instruction
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.to_string());
        Request::new(vec![Message::user(request.render_prompt())])
            .with_model(model)
            .with_system(system)
            .with_temperature(request.temperature.unwrap_or(self.config.temperature))
            .with_max_tokens(request.max_tokens.unwrap_or(self.config.max_tokens))
    }

    #[tracing::instrument(skip(self, request))]
    async fn call(
        &self,
        request: &OracleRequest,
        model: Model,
    ) -> Result<::gemini::Response, ::gemini::Error> {
        let response = self.client.complete(self.build_request(request, model)).await?;
        debug!(
            chars = response.text.len(),
            finish_reason = ?response.finish_reason,
            "Model call completed"
        );
        Ok(response)
    }
}

#[async_trait]
impl Oracle for GeminiOracle {
    async fn generate(&self, request: OracleRequest) -> Result<OracleResponse, OracleError> {
        let started = Instant::now();
        let primary = request.model.unwrap_or(self.config.primary_model);

        let response = match self.call(&request, primary).await {
            Ok(response) => response,
            Err(error) => match self.config.fallback_model.filter(|m| *m != primary) {
                Some(fallback) => {
                    warn!(%error, %primary, %fallback, "Primary model failed, retrying with fallback");
                    self.call(&request, fallback).await?
                }
                None => return Err(error.into()),
            },
        };

        let content = request.check(parse_content(&response.text))?;
        let usage = response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_else(|| TokenUsage::estimate(&request.render_prompt(), &response.text));

        Ok(OracleResponse {
            model: response.model,
            content,
            usage,
            metadata: ResponseMetadata {
                timestamp: Utc::now(),
                latency_ms: started.elapsed().as_millis() as u64,
            },
        })
    }

    fn model_name(&self) -> &str {
        self.config.primary_model.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OracleConfig::default();
        assert_eq!(config.primary_model, Model::Pro);
        assert_eq!(config.fallback_model, Some(Model::Flash));
    }

    #[test]
    fn test_build_request_uses_overrides() {
        let oracle = GeminiOracle::new("test-key", OracleConfig::default());
        let request = OracleRequest::new("Summarize")
            .with_context("Text")
            .with_temperature(0.1)
            .with_max_tokens(256);

        let built = oracle.build_request(&request, Model::Flash);
        assert_eq!(built.model, Some(Model::Flash));
        assert_eq!(built.temperature, Some(0.1));
        assert_eq!(built.max_tokens, 256);
        assert_eq!(built.system.as_deref(), Some(DEFAULT_SYSTEM_INSTRUCTION));
        assert!(built.messages[0].text.starts_with("Context:\nText"));
    }

    #[test]
    fn test_model_name_reports_primary() {
        let oracle = GeminiOracle::new(
            "test-key",
            OracleConfig::default().with_primary_model(Model::Flash),
        );
        assert_eq!(oracle.model_name(), "gemini-2.5-flash");
    }
}
