//! Progress-callback trait for per-batch extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the orchestrator works through a document.
//!
//! A document that is not split reports exactly one batch.
//!
//! # Example
//!
//! ```rust
//! use po_extract::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct RowCounter {
//!     rows: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for RowCounter {
//!     fn on_batch_complete(&self, _batch: usize, _total: usize, rows: usize) {
//!         self.rows.fetch_add(rows, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(RowCounter { rows: AtomicUsize::new(0) });
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it processes each batch.
///
/// Implementations must be `Send + Sync`: [`crate::jobs::JobRunner`] runs
/// several documents at once and they share one config. All methods default
/// to no-ops.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once the batch plan is known.
    fn on_run_start(&self, total_batches: usize) {
        let _ = total_batches;
    }

    /// Called just before the extraction request for a batch (1-indexed).
    fn on_batch_start(&self, batch: usize, total_batches: usize) {
        let _ = (batch, total_batches);
    }

    /// Called when a batch contributed `rows` canonical rows.
    fn on_batch_complete(&self, batch: usize, total_batches: usize, rows: usize) {
        let _ = (batch, total_batches, rows);
    }

    /// Called when a batch contributed nothing.
    fn on_batch_empty(&self, batch: usize, total_batches: usize) {
        let _ = (batch, total_batches);
    }

    /// Called once after the last batch, before the run is finalised.
    fn on_run_complete(&self, rows: usize, total_pos: usize) {
        let _ = (rows, total_pos);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Tracking {
        starts: AtomicUsize,
        completes: AtomicUsize,
        empties: AtomicUsize,
        rows: AtomicUsize,
    }

    impl ExtractionProgressCallback for Tracking {
        fn on_batch_start(&self, _batch: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _batch: usize, _total: usize, rows: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            self.rows.fetch_add(rows, Ordering::SeqCst);
        }

        fn on_batch_empty(&self, _batch: usize, _total: usize) {
            self.empties.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(3);
        cb.on_batch_start(1, 3);
        cb.on_batch_complete(1, 3, 10);
        cb.on_batch_empty(2, 3);
        cb.on_run_complete(10, 5);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let t = Tracking::default();
        t.on_batch_start(1, 3);
        t.on_batch_complete(1, 3, 4);
        t.on_batch_start(2, 3);
        t.on_batch_empty(2, 3);
        t.on_batch_start(3, 3);
        t.on_batch_complete(3, 3, 2);

        assert_eq!(t.starts.load(Ordering::SeqCst), 3);
        assert_eq!(t.completes.load(Ordering::SeqCst), 2);
        assert_eq!(t.empties.load(Ordering::SeqCst), 1);
        assert_eq!(t.rows.load(Ordering::SeqCst), 6);
    }
}
