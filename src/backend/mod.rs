//! Inference backends: the network seam of the pipeline.
//!
//! [`InferenceBackend`] is one attempt at one request. It knows nothing about
//! retries, fences or JSON; that lives in
//! [`crate::pipeline::llm::ExtractionClient`], which wraps any backend.
//!
//! * [`GeminiBackend`] calls the Gemini `generateContent` REST API directly.
//! * [`ProviderBackend`] routes through any `edgequake-llm` chat provider.
//!
//! Tests substitute scripted fakes.

pub mod gemini;
pub mod provider;

pub use gemini::GeminiBackend;
pub use provider::ProviderBackend;

use crate::error::BackendError;
use crate::pipeline::encode::InlineDocument;
use async_trait::async_trait;

/// Everything a backend needs for one completion.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub prompt: String,
    pub document: InlineDocument,
    pub temperature: f32,
    pub max_output_tokens: usize,
}

/// One attempt at a multimodal completion.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Send the request once and return the completion text.
    ///
    /// Returns [`BackendError::Overloaded`] for transient overload so the
    /// caller can retry; every other failure is final for this request.
    async fn complete(&self, request: &InferenceRequest) -> Result<String, BackendError>;
}
