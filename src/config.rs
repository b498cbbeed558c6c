//! Configuration types for purchase-order extraction.
//!
//! All pipeline behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. The config is passed explicitly to the
//! extraction client and the orchestrator at construction; nothing inside the
//! library reads API keys or endpoints from the process environment. Tests
//! build a config with zero delays and a fake backend.

use crate::error::PipelineError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default base URL for the Gemini `generateContent` REST API.
pub const DEFAULT_API_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default multimodal model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Configuration for one extraction pipeline.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use po_extract::{Backoff, ExtractionConfig};
///
/// let config = ExtractionConfig::builder()
///     .api_key("test-key")
///     .max_retries(3)
///     .retry_backoff(Backoff::Exponential { base_ms: 500 })
///     .batch_size(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.batch_size, 4);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Base URL of the inference API. Default: [`DEFAULT_API_ENDPOINT`].
    pub api_endpoint: String,

    /// API key sent with every request. Default: empty.
    pub api_key: String,

    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Extraction is transcription, not generation; anything much above zero
    /// lets the model paraphrase field values.
    pub temperature: f32,

    /// Maximum tokens the model may generate per request. Default: 8192.
    pub max_output_tokens: usize,

    /// Retries after the first attempt when the API reports overload. Default: 5.
    pub max_retries: u32,

    /// Delay strategy between overload retries. Default: fixed 5 s.
    pub retry_backoff: Backoff,

    /// Per-request timeout in seconds. Default: 120.
    ///
    /// A 5-PO batch with inline PDF routinely takes 20–60 s to answer.
    pub api_timeout_secs: u64,

    /// A document is split only when it holds **more** than this many
    /// distinct POs. Default: 5.
    pub split_threshold: usize,

    /// Maximum POs per batch when splitting. Default: 5.
    pub batch_size: usize,

    /// Pause between consecutive batch requests, in milliseconds. Default: 1000.
    pub batch_delay_ms: u64,

    /// Pages scanned for buyer detection. Default: 2.
    pub detection_pages: usize,

    /// Upper bound on accepted document size. Default: 10 MiB.
    pub max_file_bytes: usize,

    /// Run the text-layer regex parser when the single request yields no
    /// records. Default: false.
    pub text_fallback: bool,

    /// Documents processed concurrently by [`crate::jobs::JobRunner`]. Default: 2.
    pub concurrency: usize,

    /// Outer attempts per document in [`crate::jobs::JobRunner`]. Default: 3.
    pub job_attempts: u32,

    /// Optional per-batch progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.1,
            max_output_tokens: 8192,
            max_retries: 5,
            retry_backoff: Backoff::default(),
            api_timeout_secs: 120,
            split_threshold: 5,
            batch_size: 5,
            batch_delay_ms: 1000,
            detection_pages: 2,
            max_file_bytes: 10 * 1024 * 1024,
            text_fallback: false,
            concurrency: 2,
            job_attempts: 3,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("api_endpoint", &self.api_endpoint)
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff", &self.retry_backoff)
            .field("split_threshold", &self.split_threshold)
            .field("batch_size", &self.batch_size)
            .field("batch_delay_ms", &self.batch_delay_ms)
            .field("text_fallback", &self.text_fallback)
            .field("concurrency", &self.concurrency)
            .field("job_attempts", &self.job_attempts)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Pause inserted between batch requests.
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn api_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.api_endpoint = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_output_tokens(mut self, n: usize) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff(mut self, backoff: Backoff) -> Self {
        self.config.retry_backoff = backoff;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn split_threshold(mut self, n: usize) -> Self {
        self.config.split_threshold = n;
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n;
        self
    }

    pub fn batch_delay_ms(mut self, ms: u64) -> Self {
        self.config.batch_delay_ms = ms;
        self
    }

    pub fn detection_pages(mut self, n: usize) -> Self {
        self.config.detection_pages = n;
        self
    }

    pub fn max_file_bytes(mut self, n: usize) -> Self {
        self.config.max_file_bytes = n;
        self
    }

    pub fn text_fallback(mut self, v: bool) -> Self {
        self.config.text_fallback = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn job_attempts(mut self, n: u32) -> Self {
        self.config.job_attempts = n;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, PipelineError> {
        let c = &self.config;
        if c.batch_size == 0 {
            return Err(PipelineError::InvalidConfig("batch_size must be ≥ 1".into()));
        }
        if c.detection_pages == 0 {
            return Err(PipelineError::InvalidConfig(
                "detection_pages must be ≥ 1".into(),
            ));
        }
        if c.max_output_tokens == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_output_tokens must be ≥ 1".into(),
            ));
        }
        if c.job_attempts == 0 {
            return Err(PipelineError::InvalidConfig("job_attempts must be ≥ 1".into()));
        }
        if c.api_endpoint.is_empty() {
            return Err(PipelineError::InvalidConfig("api_endpoint is empty".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Delay strategy between retries of an overloaded request.
///
/// `attempt` passed to [`Backoff::delay_for`] is the 1-based retry number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backoff {
    /// Same pause before every retry.
    Fixed { delay_ms: u64 },
    /// `base_ms * 2^(attempt-1)`: 500 ms → 1 s → 2 s …
    Exponential { base_ms: u64 },
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Fixed { delay_ms: 5000 }
    }
}

impl Backoff {
    /// No pause at all; for tests.
    pub const NONE: Backoff = Backoff::Fixed { delay_ms: 0 };

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed { delay_ms } => Duration::from_millis(delay_ms),
            Backoff::Exponential { base_ms } => {
                let exp = attempt.saturating_sub(1).min(16);
                Duration::from_millis(base_ms.saturating_mul(1u64 << exp))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ExtractionConfig::default();
        assert_eq!(c.model, DEFAULT_MODEL);
        assert_eq!(c.max_output_tokens, 8192);
        assert_eq!(c.max_retries, 5);
        assert_eq!(c.split_threshold, 5);
        assert_eq!(c.batch_size, 5);
        assert_eq!(c.batch_delay(), Duration::from_secs(1));
        assert_eq!(c.detection_pages, 2);
        assert!(!c.text_fallback);
        assert!((c.temperature - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn zero_batch_size_rejected() {
        let err = ExtractionConfig::builder().batch_size(0).build().unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn endpoint_trailing_slash_trimmed() {
        let c = ExtractionConfig::builder()
            .api_endpoint("http://localhost:8080/v1beta/")
            .build()
            .unwrap();
        assert_eq!(c.api_endpoint, "http://localhost:8080/v1beta");
    }

    #[test]
    fn temperature_clamped() {
        let c = ExtractionConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let b = Backoff::Fixed { delay_ms: 5000 };
        assert_eq!(b.delay_for(1), Duration::from_secs(5));
        assert_eq!(b.delay_for(4), Duration::from_secs(5));
    }

    #[test]
    fn exponential_backoff_doubles() {
        let b = Backoff::Exponential { base_ms: 500 };
        assert_eq!(b.delay_for(1), Duration::from_millis(500));
        assert_eq!(b.delay_for(2), Duration::from_millis(1000));
        assert_eq!(b.delay_for(3), Duration::from_millis(2000));
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = ExtractionConfig::builder().api_key("secret-123").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret-123"));
        assert!(dbg.contains("<redacted>"));
    }
}
