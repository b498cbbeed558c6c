//! Pipeline Orchestrator: one document from `pending` to `completed` or
//! `failed`.
//!
//! ## Stages
//!
//! ```text
//! mark processing ─▶ working copy ─▶ buyer ─▶ split plan ─┬─▶ single request ─┐
//!                                                         └─▶ batch loop ─────┴─▶ mark completed
//! ```
//!
//! Stages run strictly in order; batches run one at a time with a pause
//! between them. Every error after `mark_processing` lands in
//! `mark_failed` with its display text, so a document never stays in
//! `processing` because of a pipeline error.
//!
//! ## Resources
//!
//! The working copy and each batch's split file are owned values that delete
//! their files on drop. A failure, a panic or cancellation of the run's
//! future releases them the same way success does.

use crate::backend::InferenceBackend;
use crate::buyer::Buyer;
use crate::config::ExtractionConfig;
use crate::document::{DetectionMethod, DocumentRef, DocumentStore};
use crate::error::PipelineError;
use crate::output::{ExtractionMethod, ExtractionResult};
use crate::pipeline::encode::encode_document;
use crate::pipeline::input::{self, ContentKind, WorkingCopy};
use crate::pipeline::llm::ExtractionClient;
use crate::pipeline::split::{DocumentSplitter, SplitPlan};
use crate::pipeline::text::PdfText;
use crate::pipeline::{detect, fallback, mapper};
use crate::progress::ProgressCallback;
use crate::prompts::prompt_for;
use crate::record::count_unique_pos;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Runs the extraction pipeline against documents in a store.
pub struct Processor {
    store: Arc<dyn DocumentStore>,
    client: ExtractionClient,
    splitter: DocumentSplitter,
    config: ExtractionConfig,
}

impl Processor {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        backend: Arc<dyn InferenceBackend>,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            store,
            client: ExtractionClient::new(backend, &config),
            splitter: DocumentSplitter::from_config(&config),
            config,
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Process one document.
    ///
    /// The outcome is persisted through the store either way. The returned
    /// value mirrors what was persisted so callers can decide on retries.
    pub async fn process(&self, doc: &DocumentRef) -> Result<ExtractionResult, PipelineError> {
        let start = Instant::now();
        info!("Processing document {}", doc);

        let outcome = match self.store.mark_processing(doc).await {
            Ok(()) => self.run(doc).await,
            Err(e) => Err(e),
        };

        let outcome = match outcome {
            Ok(result) => self
                .store
                .mark_completed(doc, result.clone())
                .await
                .map(|()| result),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => {
                info!(
                    "Document {} completed: {} row(s), {} PO(s), {} ms",
                    doc,
                    result.total_line_items,
                    result.total_pos,
                    start.elapsed().as_millis()
                );
                Ok(result)
            }
            Err(e) => {
                error!("Document {} failed: {}", doc, e);
                self.fail(doc, &e).await;
                Err(e)
            }
        }
    }

    async fn fail(&self, doc: &DocumentRef, err: &PipelineError) {
        if let Err(store_err) = self.store.mark_failed(doc, &err.to_string()).await {
            error!("Could not mark document {} failed: {}", doc, store_err);
        }
    }

    async fn run(&self, doc: &DocumentRef) -> Result<ExtractionResult, PipelineError> {
        // ── Step 1: Working copy ─────────────────────────────────────────
        let content = self.store.read_document(doc).await?;
        let kind = input::validate(&content, self.config.max_file_bytes)?;
        let working = WorkingCopy::create(&content, kind).await?;
        drop(content);
        let bytes: Arc<Vec<u8>> = Arc::new(working.read().await?);

        // ── Step 2: Buyer ────────────────────────────────────────────────
        let buyer = self.resolve_buyer(doc, &bytes, kind).await?;
        let prompt = prompt_for(buyer);

        // ── Step 3: Split plan ───────────────────────────────────────────
        let plan = if kind.is_pdf() {
            let splitter = self.splitter;
            let pdf = Arc::clone(&bytes);
            Some(blocking(move || splitter.analyze(&pdf)).await??)
        } else {
            None
        };

        // ── Step 4: Extraction ───────────────────────────────────────────
        let result = match plan {
            Some(plan) if plan.split => self.run_split(&bytes, buyer, prompt, &plan).await,
            _ => self.run_single(&bytes, kind, buyer, prompt).await,
        };

        working.release();
        result
    }

    async fn resolve_buyer(
        &self,
        doc: &DocumentRef,
        bytes: &Arc<Vec<u8>>,
        kind: ContentKind,
    ) -> Result<Buyer, PipelineError> {
        if let Some(buyer) = self.store.manual_buyer(doc).await? {
            info!("Using manually assigned buyer {}", buyer);
            return Ok(buyer);
        }
        if !kind.is_pdf() {
            debug!("{} input has no text layer to detect from", kind.mime_type());
            return Err(PipelineError::BuyerNotDetected);
        }

        let pages = self.config.detection_pages;
        let pdf = Arc::clone(bytes);
        let buyer = blocking(move || detect::detect_buyer(&pdf, pages))
            .await?
            .ok_or(PipelineError::BuyerNotDetected)?;

        info!("Detected buyer {}", buyer);
        self.store
            .set_detected_buyer(doc, buyer, DetectionMethod::Auto)
            .await?;
        Ok(buyer)
    }

    async fn run_single(
        &self,
        bytes: &Arc<Vec<u8>>,
        kind: ContentKind,
        buyer: Buyer,
        prompt: &str,
    ) -> Result<ExtractionResult, PipelineError> {
        let progress = self.progress();
        progress.iter().for_each(|cb| cb.on_run_start(1));
        progress.iter().for_each(|cb| cb.on_batch_start(1, 1));

        let document = encode_document(bytes, kind);
        let outcome = self.client.extract(&document, prompt).await;

        let mut method = ExtractionMethod::Single;
        let mut records = outcome.records;
        if records.is_empty() && self.config.text_fallback && kind.is_pdf() {
            warn!("Model returned no data; trying text-layer fallback parser");
            let pdf = Arc::clone(bytes);
            records = blocking(move || match PdfText::parse(&pdf) {
                Ok(text) => fallback::parse_text(&text.full_text()),
                Err(_) => Vec::new(),
            })
            .await?;
            method = ExtractionMethod::TextFallback;
        }

        if records.is_empty() {
            progress.iter().for_each(|cb| cb.on_batch_empty(1, 1));
            return Err(PipelineError::NoDataExtracted);
        }

        let rows = mapper::map_records(buyer, &records);
        let total_pos = count_unique_pos(&records);
        progress.iter().for_each(|cb| cb.on_batch_complete(1, 1, rows.len()));
        progress.iter().for_each(|cb| cb.on_run_complete(rows.len(), total_pos));

        Ok(ExtractionResult {
            extraction_method: method,
            buyer,
            total_line_items: rows.len(),
            total_pos,
            rows,
            batches_processed: None,
            processed_at: Utc::now(),
        })
    }

    async fn run_split(
        &self,
        bytes: &Arc<Vec<u8>>,
        buyer: Buyer,
        prompt: &str,
        plan: &SplitPlan,
    ) -> Result<ExtractionResult, PipelineError> {
        let total = plan.batches.len();
        let progress = self.progress();
        progress.iter().for_each(|cb| cb.on_run_start(total));
        info!("Processing {} POs in {} batches", plan.po_count(), total);

        let mut rows = Vec::new();
        let mut total_pos = 0;

        for (i, batch_plan) in plan.batches.iter().enumerate() {
            let n = i + 1;
            if i > 0 {
                tokio::time::sleep(self.config.batch_delay()).await;
            }
            progress.iter().for_each(|cb| cb.on_batch_start(n, total));
            info!(
                "Batch {}/{}: pages {}-{}, POs {}",
                n,
                total,
                batch_plan.start_page,
                batch_plan.end_page,
                batch_plan.po_numbers.join(", ")
            );

            let splitter = self.splitter;
            let pdf = Arc::clone(bytes);
            let owned_plan = batch_plan.clone();
            let batch = blocking(move || splitter.materialize(&pdf, &owned_plan)).await??;
            let batch_bytes = tokio::fs::read(batch.path()).await.map_err(|e| {
                PipelineError::SplitFailed {
                    batch: n,
                    start_page: batch_plan.start_page,
                    end_page: batch_plan.end_page,
                    detail: e.to_string(),
                }
            })?;

            let document = encode_document(&batch_bytes, ContentKind::Pdf);
            let outcome = self.client.extract(&document, prompt).await;
            batch.release();

            if outcome.records.is_empty() {
                warn!(
                    "Batch {}/{} returned no data{}",
                    n,
                    total,
                    outcome
                        .error
                        .as_ref()
                        .map(|e| format!(": {e}"))
                        .unwrap_or_default()
                );
                progress.iter().for_each(|cb| cb.on_batch_empty(n, total));
                continue;
            }

            let batch_rows = mapper::map_records(buyer, &outcome.records);
            total_pos += batch_plan.po_count();
            debug!("Batch {}/{}: {} row(s)", n, total, batch_rows.len());
            progress
                .iter()
                .for_each(|cb| cb.on_batch_complete(n, total, batch_rows.len()));
            rows.extend(batch_rows);
        }

        if rows.is_empty() {
            return Err(PipelineError::NoDataFromBatches { batches: total });
        }
        progress.iter().for_each(|cb| cb.on_run_complete(rows.len(), total_pos));

        Ok(ExtractionResult {
            extraction_method: ExtractionMethod::Split,
            buyer,
            total_line_items: rows.len(),
            total_pos,
            rows,
            batches_processed: Some(total),
            processed_at: Utc::now(),
        })
    }

    fn progress(&self) -> Option<&ProgressCallback> {
        self.config.progress_callback.as_ref()
    }
}

/// Run CPU-bound PDF work off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PipelineError::Internal(format!("blocking task failed: {e}")))
}
