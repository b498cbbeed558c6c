//! Extraction Client: prompt + document in, purchase-order records out.
//!
//! Wraps an [`InferenceBackend`] with the two policies every request shares:
//!
//! ## Retry
//!
//! Only overload ([`BackendError::Overloaded`], HTTP 503) is retried, up to
//! `max_retries` times after the first attempt, sleeping
//! [`Backoff::delay_for`] between attempts. Any other failure ends the
//! request immediately.
//!
//! ## Degrade, never abort
//!
//! [`ExtractionClient::extract`] never returns an error. Every failure
//! (overload exhausted, bad status, transport, empty text, unparseable JSON)
//! is logged and turned into an empty record list, with the cause kept on the
//! [`ExtractionOutcome`]. Whether zero records is fatal is the orchestrator's
//! call.

use crate::backend::{InferenceBackend, InferenceRequest};
use crate::config::{Backoff, ExtractionConfig};
use crate::error::{BackendError, ExtractionError};
use crate::pipeline::encode::InlineDocument;
use crate::record::PurchaseOrderRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Result of one extraction request.
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    pub records: Vec<PurchaseOrderRecord>,
    /// Backend calls made, including the first.
    pub attempts: u32,
    pub duration_ms: u64,
    /// Why `records` is empty, when it is because of a failure.
    pub error: Option<ExtractionError>,
}

impl ExtractionOutcome {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Sends one document per request and parses the answer.
#[derive(Clone)]
pub struct ExtractionClient {
    backend: Arc<dyn InferenceBackend>,
    temperature: f32,
    max_output_tokens: usize,
    max_retries: u32,
    backoff: Backoff,
}

impl std::fmt::Debug for ExtractionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionClient")
            .field("backend", &self.backend.name())
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl ExtractionClient {
    pub fn new(backend: Arc<dyn InferenceBackend>, config: &ExtractionConfig) -> Self {
        Self {
            backend,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            max_retries: config.max_retries,
            backoff: config.retry_backoff,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Run one extraction request with retry, returning whatever records
    /// could be recovered.
    pub async fn extract(&self, document: &InlineDocument, prompt: &str) -> ExtractionOutcome {
        let start = Instant::now();
        let request = InferenceRequest {
            prompt: prompt.to_string(),
            document: document.clone(),
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        };

        let (result, attempts) = self.complete_with_retry(&request).await;
        let parsed = result.and_then(|text| parse_records(&text));
        let duration_ms = start.elapsed().as_millis() as u64;

        match parsed {
            Ok(records) => {
                debug!(
                    "{}: {} record(s) after {} attempt(s) in {} ms",
                    self.backend.name(),
                    records.len(),
                    attempts,
                    duration_ms
                );
                ExtractionOutcome {
                    records,
                    attempts,
                    duration_ms,
                    error: None,
                }
            }
            Err(e) => {
                warn!("{}: extraction yielded nothing: {}", self.backend.name(), e);
                ExtractionOutcome {
                    records: Vec::new(),
                    attempts,
                    duration_ms,
                    error: Some(e),
                }
            }
        }
    }

    async fn complete_with_retry(
        &self,
        request: &InferenceRequest,
    ) -> (Result<String, ExtractionError>, u32) {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = self.backoff.delay_for(attempt);
                warn!(
                    "{}: service overloaded, retry {}/{} in {:?}",
                    self.backend.name(),
                    attempt,
                    self.max_retries,
                    delay
                );
                sleep(delay).await;
            }

            let result = self.backend.complete(request).await;
            let calls = attempt + 1;
            match result {
                Ok(text) => return (Ok(text), calls),
                Err(BackendError::Overloaded(detail)) => {
                    if attempt >= self.max_retries {
                        return (
                            Err(ExtractionError::Overloaded {
                                retries: self.max_retries,
                                detail,
                            }),
                            calls,
                        );
                    }
                }
                Err(BackendError::Status { status, body }) => {
                    return (Err(ExtractionError::ApiStatus { status, body }), calls)
                }
                Err(BackendError::Transport(msg)) => {
                    return (Err(ExtractionError::Transport(msg)), calls)
                }
            }
            attempt += 1;
        }
    }
}

// ── Response parsing ───────────────────────────────────────────────────────

static RE_CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)\r?\n?```").expect("valid regex"));

/// Contents of the first fenced block (```` ```json ```` or bare ```` ``` ````),
/// wherever it sits in the reply. Text without a complete fence is returned
/// trimmed.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    match RE_CODE_FENCE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}

/// Parse completion text into records.
///
/// The text must be a JSON array; elements that are not objects are skipped.
pub fn parse_records(text: &str) -> Result<Vec<PurchaseOrderRecord>, ExtractionError> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(ExtractionError::EmptyResponse);
    }

    let value: Value =
        serde_json::from_str(body).map_err(|e| ExtractionError::InvalidJson(e.to_string()))?;
    let Value::Array(items) = value else {
        return Err(ExtractionError::InvalidJson(
            "expected a JSON array of purchase orders".to_string(),
        ));
    };

    let total = items.len();
    let records: Vec<_> = items
        .iter()
        .filter_map(PurchaseOrderRecord::from_value)
        .collect();
    if records.len() < total {
        warn!("Skipped {} non-object element(s) in model output", total - records.len());
    }
    Ok(records)
}
