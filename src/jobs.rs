//! Background-style job runner over [`Processor`].
//!
//! A job is one document. The runner adds two things the orchestrator does
//! not do itself: a bounded number of outer attempts per document, and
//! concurrency across documents. Within one document the pipeline stays
//! strictly sequential.

use crate::document::{DocumentRef, DocumentStatus};
use crate::error::PipelineError;
use crate::output::ExtractionResult;
use crate::process::Processor;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};

/// What happened to one document.
#[derive(Debug)]
pub enum JobOutcome {
    /// Processed in this run.
    Completed(ExtractionResult),
    /// Already `completed` before the runner reached it.
    Skipped,
    /// Every attempt failed; holds the last error.
    Failed(PipelineError),
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed(_))
    }
}

/// Runs documents through a shared [`Processor`].
#[derive(Clone)]
pub struct JobRunner {
    processor: Arc<Processor>,
}

impl JobRunner {
    pub fn new(processor: Arc<Processor>) -> Self {
        Self { processor }
    }

    /// Process one document with up to `job_attempts` attempts.
    ///
    /// Documents already `completed` are left alone. Permanent failures
    /// (bad input, no buyer) end the job after the first attempt.
    pub async fn run(&self, doc: &DocumentRef) -> JobOutcome {
        match self.processor.store().status(doc).await {
            Ok(DocumentStatus::Completed) => {
                info!("Document {} already completed; skipping", doc);
                return JobOutcome::Skipped;
            }
            Ok(_) => {}
            Err(e) => return JobOutcome::Failed(e),
        }

        let attempts = self.processor.config().job_attempts;
        let mut attempt = 1;
        loop {
            match self.processor.process(doc).await {
                Ok(result) => return JobOutcome::Completed(result),
                Err(e) if e.is_permanent() || attempt >= attempts => {
                    return JobOutcome::Failed(e)
                }
                Err(e) => {
                    warn!(
                        "Document {} attempt {}/{} failed: {}; retrying",
                        doc, attempt, attempts, e
                    );
                    attempt += 1;
                }
            }
        }
    }

    /// Process many documents, at most `concurrency` at a time.
    ///
    /// Outcomes are returned in input order.
    pub async fn run_all(&self, docs: &[DocumentRef]) -> Vec<(DocumentRef, JobOutcome)> {
        let concurrency = self.processor.config().concurrency.max(1);
        info!("Running {} document(s), concurrency {}", docs.len(), concurrency);

        let mut outcomes: Vec<(usize, DocumentRef, JobOutcome)> =
            stream::iter(docs.iter().cloned().enumerate().map(|(idx, doc)| {
                let runner = self.clone();
                async move {
                    let outcome = runner.run(&doc).await;
                    (idx, doc, outcome)
                }
            }))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        outcomes.sort_by_key(|(idx, _, _)| *idx);
        outcomes
            .into_iter()
            .map(|(_, doc, outcome)| (doc, outcome))
            .collect()
    }
}
