//! The generative text oracle.
//!
//! Stations never talk to a model directly. They hand an [`OracleRequest`]
//! to an [`Oracle`] and receive a best-effort JSON payload back. The
//! production implementation is [`GeminiOracle`]; tests use
//! [`crate::testing::MockOracle`].

mod content;
mod gemini;

pub use content::{
    is_raw, number_field, object_list, parse_content, strength_field, string_list, text_field,
    text_or, NOT_AVAILABLE, RAW_KEY,
};
pub use gemini::{GeminiOracle, OracleConfig};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Errors from oracle calls.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Model call failed: {0}")]
    Api(#[from] ::gemini::Error),

    #[error("No API key configured - set GEMINI_API_KEY environment variable")]
    NoApiKey,

    #[error("Response rejected by validator: {0}")]
    Rejected(String),
}

/// Checks a parsed payload before it is handed back.
pub type ContentValidator = fn(&Value) -> bool;

/// A request for structured content.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    pub prompt: String,
    /// Overrides the oracle's primary model for this call.
    pub model: Option<::gemini::Model>,
    /// Source material the prompt refers to.
    pub context: Option<String>,
    pub system_instruction: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    pub validator: Option<ContentValidator>,
    /// Return content that fails validation instead of erroring.
    pub allow_partial: bool,
}

impl OracleRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            context: None,
            system_instruction: None,
            temperature: None,
            max_tokens: None,
            validator: None,
            allow_partial: false,
        }
    }

    pub fn with_model(mut self, model: ::gemini::Model) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system_instruction = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 2.0));
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_validator(mut self, validator: ContentValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn allow_partial(mut self) -> Self {
        self.allow_partial = true;
        self
    }

    /// The full user turn: context first, then the instruction.
    pub fn render_prompt(&self) -> String {
        match &self.context {
            Some(context) if !context.trim().is_empty() => {
                format!("Context:\n{context}\n\n{}", self.prompt)
            }
            _ => self.prompt.clone(),
        }
    }

    /// Run the validator over parsed content.
    pub fn check(&self, content: Value) -> Result<Value, OracleError> {
        match self.validator {
            Some(validate) if !validate(&content) => {
                if self.allow_partial {
                    warn!("Oracle content failed validation, returning partial result");
                    Ok(content)
                } else {
                    Err(OracleError::Rejected(truncate_for_log(&content.to_string(), 200)))
                }
            }
            _ => Ok(content),
        }
    }
}

/// Token accounting for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl TokenUsage {
    /// Rough estimate at four characters per token.
    pub fn estimate(prompt: &str, completion: &str) -> Self {
        let prompt_tokens = prompt.chars().count().div_ceil(4);
        let completion_tokens = completion.chars().count().div_ceil(4);
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Timing for one call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub timestamp: DateTime<Utc>,
    pub latency_ms: u64,
}

/// Structured content returned by an oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleResponse {
    pub model: String,
    pub content: Value,
    pub usage: TokenUsage,
    pub metadata: ResponseMetadata,
}

/// A source of structured generative content.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Generate content for a request.
    ///
    /// Unparseable model output is not an error; it arrives as a
    /// `{"raw": text}` payload.
    async fn generate(&self, request: OracleRequest) -> Result<OracleResponse, OracleError>;

    /// Name of the model answering by default.
    fn model_name(&self) -> &str;
}

pub(crate) fn truncate_for_log(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn has_names(value: &Value) -> bool {
        value.get("names").is_some()
    }

    #[test]
    fn test_render_prompt_with_context() {
        let request = OracleRequest::new("List the characters.").with_context("Once upon a time");
        assert_eq!(
            request.render_prompt(),
            "Context:\nOnce upon a time\n\nList the characters."
        );
        assert_eq!(OracleRequest::new("Hi").render_prompt(), "Hi");
    }

    #[test]
    fn test_validator_rejects_unless_partial() {
        let strict = OracleRequest::new("x").with_validator(has_names);
        assert!(strict.check(json!({"names": []})).is_ok());
        assert!(matches!(
            strict.check(json!({"other": 1})),
            Err(OracleError::Rejected(_))
        ));

        let lenient = strict.allow_partial();
        assert_eq!(lenient.check(json!({"other": 1})).unwrap(), json!({"other": 1}));
    }

    #[test]
    fn test_usage_estimate() {
        let usage = TokenUsage::estimate("abcdefgh", "abc");
        assert_eq!(usage.prompt_tokens, 2);
        assert_eq!(usage.completion_tokens, 1);
        assert_eq!(usage.total_tokens, 3);
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("abcdef", 3), "abc...");
        assert_eq!(truncate_for_log("ab", 3), "ab");
    }
}
