//! Error types for the po-extract library.
//!
//! Three error types match three failure scopes:
//!
//! * [`PipelineError`] is **fatal**: the run for one document cannot finish
//!   (no buyer detected, split failed, nothing extracted). Its display text is
//!   stored verbatim as the document's `error_message`.
//!
//! * [`ExtractionError`] is **non-fatal**: one extraction request produced
//!   nothing usable (overload after retries, bad status, unparseable JSON).
//!   The extraction client logs it and contributes an empty result instead.
//!
//! * [`BackendError`]: what an inference backend reports for a single
//!   attempt. Only [`BackendError::Overloaded`] is retried.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors for one document-processing run.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The store could not find or read the document.
    #[error("Document {id} could not be read: {reason}")]
    DocumentUnavailable { id: String, reason: String },

    /// File extension/content type outside the accepted set.
    #[error("Unsupported file type '{extension}': must be a PDF or image file (JPEG, PNG)")]
    UnsupportedFileType { extension: String },

    /// File exceeds the configured upload limit.
    #[error("File is {size} bytes; must be less than {limit} bytes")]
    FileTooLarge { size: usize, limit: usize },

    /// The bytes claim to be a PDF but lack the `%PDF` header.
    #[error("File '{filename}' is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { filename: String, magic: Vec<u8> },

    /// Writing or reading the transient working copy failed.
    #[error("Working copy error at '{path}': {source}")]
    WorkingCopy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Detection errors ──────────────────────────────────────────────────
    /// No buyer template matched the first pages of the document.
    #[error(
        "Unable to detect buyer type. Please ensure the document is a valid \
         Levi Strauss or PVH Tommy Hilfiger purchase order."
    )]
    BuyerNotDetected,

    /// A buyer identifier outside the closed set was supplied.
    #[error("Unknown buyer: {0}")]
    UnknownBuyer(String),

    // ── Split errors ──────────────────────────────────────────────────────
    /// The document could not be opened for PO scanning.
    #[error("Failed to read PDF for splitting: {detail}")]
    UnreadablePdf { detail: String },

    /// Materialising a batch's page range failed.
    #[error("Failed to create split PDF for batch {batch} (pages {start_page}-{end_page}): {detail}")]
    SplitFailed {
        batch: usize,
        start_page: u32,
        end_page: u32,
        detail: String,
    },

    // ── Outcome errors ────────────────────────────────────────────────────
    /// The single extraction request returned nothing usable.
    #[error("No data extracted from document")]
    NoDataExtracted,

    /// Every batch of a split document returned nothing usable.
    #[error("No data extracted from any batch ({batches} batches attempted)")]
    NoDataFromBatches { batches: usize },

    // ── Collaborator errors ───────────────────────────────────────────────
    /// A persistence callback failed.
    #[error("Document store error: {0}")]
    Store(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The LLM provider could not be created.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (task panicked, runtime unavailable).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Whether running the same document again can only fail the same way.
    ///
    /// [`crate::jobs::JobRunner`] does not spend further attempts on these.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            PipelineError::UnsupportedFileType { .. }
                | PipelineError::FileTooLarge { .. }
                | PipelineError::NotAPdf { .. }
                | PipelineError::BuyerNotDetected
                | PipelineError::UnknownBuyer(_)
                | PipelineError::InvalidConfig(_)
                | PipelineError::ProviderNotConfigured { .. }
        )
    }
}

/// A non-fatal failure of one extraction request.
///
/// Never propagated out of [`crate::pipeline::llm::ExtractionClient`]; kept
/// on the request outcome so callers and logs can tell *why* it was empty.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ExtractionError {
    /// The service stayed overloaded through every retry.
    #[error("service overloaded after {retries} retries: {detail}")]
    Overloaded { retries: u32, detail: String },

    /// Non-success, non-retryable HTTP status.
    #[error("API request failed ({status}): {body}")]
    ApiStatus { status: u16, body: String },

    /// Network/transport failure or timeout.
    #[error("request failed: {0}")]
    Transport(String),

    /// Success status but no completion text in the response.
    #[error("empty response from model")]
    EmptyResponse,

    /// The completion text was not a JSON array of purchase orders.
    #[error("failed to parse model JSON response: {0}")]
    InvalidJson(String),
}

/// Result of a single backend attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Transient overload (HTTP 503 or provider equivalent). Retryable.
    #[error("Service overloaded ({0})")]
    Overloaded(String),

    /// Any other non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection, TLS, timeout or body-decoding failure.
    #[error("{0}")]
    Transport(String),
}

impl BackendError {
    /// Whether the extraction client should retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BackendError::Overloaded(_))
    }
}
