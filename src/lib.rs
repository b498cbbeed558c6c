//! # po-extract
//!
//! Turn buyer purchase-order PDFs into rows of a fixed 48-column export
//! schema using a multimodal LLM.
//!
//! ## Why this crate?
//!
//! Purchase orders from different buyers carry the same facts (PO number,
//! style, colour, size, quantity, price, delivery) in completely different
//! layouts. Template-based PDF parsers break whenever a buyer moves a box.
//! Instead this crate detects the buyer from the text layer, sends the PDF
//! itself to a vision model with a buyer-specific prompt, and maps the JSON
//! it returns onto one canonical row per line item.
//!
//! ## Pipeline Overview
//!
//! ```text
//! stored document
//!  │
//!  ├─ 1. Input    validate + transient working copy
//!  ├─ 2. Detect   buyer patterns on the first pages (or a manual override)
//!  ├─ 3. Split    > 5 POs → page-range batches of ≤ 5 POs (lopdf, spawn_blocking)
//!  ├─ 4. Extract  inline PDF → Gemini / edgequake-llm, retry on 503
//!  ├─ 5. Map      buyer column table → 48-column rows
//!  └─ 6. Persist  mark_completed / mark_failed through the DocumentStore
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use po_extract::{DocumentContent, ExtractionConfig, GeminiBackend, MemoryStore, Processor};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::builder()
//!         .api_key(std::env::var("GOOGLE_GEMINI_API_KEY")?)
//!         .build()?;
//!     let backend = Arc::new(GeminiBackend::new(&config)?);
//!
//!     let store = Arc::new(MemoryStore::new());
//!     let bytes = std::fs::read("orders.pdf")?;
//!     let doc = store
//!         .insert("orders", DocumentContent::from_filename("orders.pdf", bytes))
//!         .await;
//!
//!     let processor = Processor::new(store.clone(), backend, config);
//!     let result = processor.process(&doc).await?;
//!     println!("{} rows from {} POs", result.total_line_items, result.total_pos);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `po-extract` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! po-extract = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod buyer;
pub mod config;
pub mod document;
pub mod error;
pub mod jobs;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;
pub mod record;
pub mod row;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{GeminiBackend, InferenceBackend, InferenceRequest, ProviderBackend};
pub use buyer::{Buyer, BuyerProfile};
pub use config::{Backoff, ExtractionConfig, ExtractionConfigBuilder};
pub use document::{
    DetectionMethod, Document, DocumentContent, DocumentRef, DocumentStatus, DocumentStore,
    MemoryStore, ProcessingSummary,
};
pub use error::{BackendError, ExtractionError, PipelineError};
pub use jobs::{JobOutcome, JobRunner};
pub use output::{ExtractionMethod, ExtractionResult};
pub use pipeline::llm::{ExtractionClient, ExtractionOutcome};
pub use process::Processor;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use record::{LineItem, PurchaseOrderRecord};
pub use row::{CanonicalRow, Column, COLUMN_COUNT};
