//! Chat-completion backend over any `edgequake-llm` provider.
//!
//! The prompt goes in the user turn and the document rides along as an
//! attachment. Provider errors carry no structured status, so overload is
//! recognised from the message text.

use super::{InferenceBackend, InferenceRequest};
use crate::error::{BackendError, PipelineError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::debug;

/// Routes extraction requests through an `edgequake-llm` provider.
pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl ProviderBackend {
    /// Wrap an already-constructed provider; `label` names it in logs.
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }

    /// Create a named provider (`"openai"`, `"anthropic"`, `"gemini"` …).
    ///
    /// API keys are read from the provider's usual environment variables by
    /// the factory.
    pub fn from_name(provider_name: &str, model: &str) -> Result<Self, PipelineError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
            PipelineError::ProviderNotConfigured {
                provider: provider_name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider, provider_name))
    }
}

#[async_trait]
impl InferenceBackend for ProviderBackend {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, request: &InferenceRequest) -> Result<String, BackendError> {
        let messages = vec![ChatMessage::user_with_images(
            request.prompt.as_str(),
            vec![request.document.to_image_data()],
        )];
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_output_tokens),
            ..Default::default()
        };

        match self.provider.chat(&messages, Some(&options)).await {
            Ok(response) => {
                debug!(
                    "{}: {} input tokens, {} output tokens",
                    self.label, response.prompt_tokens, response.completion_tokens
                );
                Ok(response.content)
            }
            Err(e) => Err(classify(&e.to_string())),
        }
    }
}

/// Map a provider error message onto a backend error.
fn classify(message: &str) -> BackendError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("503") || lower.contains("overload") || lower.contains("unavailable") {
        BackendError::Overloaded(message.to_string())
    } else {
        BackendError::Transport(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overload_messages_are_retryable() {
        assert!(classify("HTTP 503: model is overloaded").is_retryable());
        assert!(classify("Service Unavailable").is_retryable());
        assert!(classify("The model is Overloaded. Please try later").is_retryable());
    }

    #[test]
    fn other_messages_are_final() {
        let e = classify("401 Unauthorized: bad key");
        assert!(!e.is_retryable());
        assert!(matches!(e, BackendError::Transport(_)));
    }
}
