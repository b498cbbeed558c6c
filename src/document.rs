//! Documents and the persistence seam.
//!
//! The pipeline never owns storage. It reads bytes and reports state through
//! a [`DocumentStore`]; the web layer, database and file storage behind it are
//! somebody else's problem. [`MemoryStore`] is the in-process implementation
//! used by the CLI and the tests.

use crate::buyer::Buyer;
use crate::error::PipelineError;
use crate::output::ExtractionResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;

/// Opaque document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentRef(String);

impl DocumentRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DocumentRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Raw document bytes plus the name they were uploaded under.
#[derive(Clone, PartialEq, Eq)]
pub struct DocumentContent {
    pub bytes: Vec<u8>,
    pub filename: String,
    /// Extension without the dot (`"pdf"`, `"png"` …).
    pub extension: String,
}

impl DocumentContent {
    /// Build from a file name, taking the extension from it.
    pub fn from_filename(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        let filename = filename.into();
        let extension = std::path::Path::new(&filename)
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            bytes,
            filename,
            extension,
        }
    }
}

impl fmt::Debug for DocumentContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentContent")
            .field("filename", &self.filename)
            .field("extension", &self.extension)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Lifecycle of one document. `Completed` and `Failed` are terminal for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Failed)
    }
}

/// How the buyer on a document was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Auto,
    Manual,
}

/// A document as the store sees it.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: DocumentRef,
    pub filename: String,
    pub status: DocumentStatus,
    pub buyer: Option<Buyer>,
    pub buyer_detection: Option<DetectionMethod>,
    pub extracted_data: Option<ExtractionResult>,
    pub error_message: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Headline numbers for list views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingSummary {
    pub total_pos: usize,
    pub total_line_items: usize,
    pub processed_at: Option<DateTime<Utc>>,
    pub has_data: bool,
}

impl Document {
    pub fn new(id: DocumentRef, filename: impl Into<String>) -> Self {
        Self {
            id,
            filename: filename.into(),
            status: DocumentStatus::Pending,
            buyer: None,
            buyer_detection: None,
            extracted_data: None,
            error_message: None,
            processed_at: None,
        }
    }

    pub fn processing_summary(&self) -> ProcessingSummary {
        let data = self.extracted_data.as_ref();
        ProcessingSummary {
            total_pos: data.map_or(0, |d| d.total_pos),
            total_line_items: data.map_or(0, |d| d.total_line_items),
            processed_at: self.processed_at,
            has_data: data.is_some_and(|d| !d.rows.is_empty()),
        }
    }
}

/// Storage and persistence callbacks consumed by the orchestrator.
///
/// Every method may fail; the orchestrator converts failures into
/// [`PipelineError::Store`] and, where it can, a failed document.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Bytes, filename and extension of the stored file.
    async fn read_document(&self, doc: &DocumentRef) -> Result<DocumentContent, PipelineError>;

    /// Current status, used to skip documents that already completed.
    async fn status(&self, doc: &DocumentRef) -> Result<DocumentStatus, PipelineError>;

    /// Enter `processing`, clearing extracted data, error and timestamp.
    async fn mark_processing(&self, doc: &DocumentRef) -> Result<(), PipelineError>;

    async fn mark_completed(
        &self,
        doc: &DocumentRef,
        result: ExtractionResult,
    ) -> Result<(), PipelineError>;

    async fn mark_failed(&self, doc: &DocumentRef, message: &str) -> Result<(), PipelineError>;

    async fn set_detected_buyer(
        &self,
        doc: &DocumentRef,
        buyer: Buyer,
        method: DetectionMethod,
    ) -> Result<(), PipelineError>;

    /// A buyer assigned by hand, which skips detection. Default: none.
    async fn manual_buyer(&self, doc: &DocumentRef) -> Result<Option<Buyer>, PipelineError> {
        let _ = doc;
        Ok(None)
    }
}

struct Entry {
    document: Document,
    content: DocumentContent,
}

/// In-memory [`DocumentStore`].
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<DocumentRef, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pending document.
    pub async fn insert(&self, id: impl Into<DocumentRef>, content: DocumentContent) -> DocumentRef {
        let id = id.into();
        let document = Document::new(id.clone(), content.filename.clone());
        self.entries
            .write()
            .await
            .insert(id.clone(), Entry { document, content });
        id
    }

    /// Add a pending document with a manually assigned buyer.
    pub async fn insert_with_buyer(
        &self,
        id: impl Into<DocumentRef>,
        content: DocumentContent,
        buyer: Buyer,
    ) -> DocumentRef {
        let id = self.insert(id, content).await;
        if let Some(entry) = self.entries.write().await.get_mut(&id) {
            entry.document.buyer = Some(buyer);
            entry.document.buyer_detection = Some(DetectionMethod::Manual);
        }
        id
    }

    /// Snapshot of a document's state.
    pub async fn get(&self, id: &DocumentRef) -> Option<Document> {
        self.entries.read().await.get(id).map(|e| e.document.clone())
    }

    async fn update<F>(&self, id: &DocumentRef, f: F) -> Result<(), PipelineError>
    where
        F: FnOnce(&mut Document) + Send,
    {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| PipelineError::Store(format!("document {id} not found")))?;
        f(&mut entry.document);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read_document(&self, doc: &DocumentRef) -> Result<DocumentContent, PipelineError> {
        self.entries
            .read()
            .await
            .get(doc)
            .map(|e| e.content.clone())
            .ok_or_else(|| PipelineError::DocumentUnavailable {
                id: doc.to_string(),
                reason: "not found".to_string(),
            })
    }

    async fn status(&self, doc: &DocumentRef) -> Result<DocumentStatus, PipelineError> {
        self.entries
            .read()
            .await
            .get(doc)
            .map(|e| e.document.status)
            .ok_or_else(|| PipelineError::Store(format!("document {doc} not found")))
    }

    async fn mark_processing(&self, doc: &DocumentRef) -> Result<(), PipelineError> {
        self.update(doc, |d| {
            d.status = DocumentStatus::Processing;
            d.extracted_data = None;
            d.error_message = None;
            d.processed_at = None;
        })
        .await
    }

    async fn mark_completed(
        &self,
        doc: &DocumentRef,
        result: ExtractionResult,
    ) -> Result<(), PipelineError> {
        self.update(doc, move |d| {
            d.status = DocumentStatus::Completed;
            d.processed_at = Some(result.processed_at);
            d.error_message = None;
            d.extracted_data = Some(result);
        })
        .await
    }

    async fn mark_failed(&self, doc: &DocumentRef, message: &str) -> Result<(), PipelineError> {
        let message = message.to_string();
        self.update(doc, move |d| {
            d.status = DocumentStatus::Failed;
            d.error_message = Some(message);
            d.processed_at = Some(Utc::now());
        })
        .await
    }

    async fn set_detected_buyer(
        &self,
        doc: &DocumentRef,
        buyer: Buyer,
        method: DetectionMethod,
    ) -> Result<(), PipelineError> {
        self.update(doc, move |d| {
            d.buyer = Some(buyer);
            d.buyer_detection = Some(method);
        })
        .await
    }

    async fn manual_buyer(&self, doc: &DocumentRef) -> Result<Option<Buyer>, PipelineError> {
        Ok(self.entries.read().await.get(doc).and_then(|e| {
            match e.document.buyer_detection {
                Some(DetectionMethod::Manual) => e.document.buyer,
                _ => None,
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ExtractionMethod;
    use crate::row::CanonicalRow;

    fn content() -> DocumentContent {
        DocumentContent::from_filename("po.pdf", b"%PDF".to_vec())
    }

    fn result() -> ExtractionResult {
        ExtractionResult {
            extraction_method: ExtractionMethod::Single,
            buyer: Buyer::Levis,
            rows: vec![CanonicalRow::blank(), CanonicalRow::blank()],
            total_line_items: 2,
            total_pos: 1,
            batches_processed: None,
            processed_at: Utc::now(),
        }
    }

    #[test]
    fn extension_taken_from_filename() {
        assert_eq!(content().extension, "pdf");
        assert_eq!(DocumentContent::from_filename("noext", vec![]).extension, "");
    }

    #[tokio::test]
    async fn lifecycle_updates_state() {
        let store = MemoryStore::new();
        let id = store.insert("d1", content()).await;
        assert_eq!(store.status(&id).await.unwrap(), DocumentStatus::Pending);

        store.mark_processing(&id).await.unwrap();
        store
            .set_detected_buyer(&id, Buyer::PvhTommy, DetectionMethod::Auto)
            .await
            .unwrap();
        store.mark_completed(&id, result()).await.unwrap();

        let doc = store.get(&id).await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Completed);
        assert_eq!(doc.buyer, Some(Buyer::PvhTommy));
        let summary = doc.processing_summary();
        assert_eq!(summary.total_line_items, 2);
        assert!(summary.has_data);
        assert!(summary.processed_at.is_some());
    }

    #[tokio::test]
    async fn processing_resets_previous_run() {
        let store = MemoryStore::new();
        let id = store.insert("d1", content()).await;
        store.mark_failed(&id, "boom").await.unwrap();
        store.mark_processing(&id).await.unwrap();

        let doc = store.get(&id).await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Processing);
        assert!(doc.error_message.is_none());
        assert!(doc.processed_at.is_none());
        assert!(!doc.processing_summary().has_data);
    }

    #[tokio::test]
    async fn manual_buyer_only_when_assigned_by_hand() {
        let store = MemoryStore::new();
        let auto = store.insert("a", content()).await;
        store
            .set_detected_buyer(&auto, Buyer::Levis, DetectionMethod::Auto)
            .await
            .unwrap();
        let manual = store.insert_with_buyer("m", content(), Buyer::PvhTommy).await;

        assert_eq!(store.manual_buyer(&auto).await.unwrap(), None);
        assert_eq!(store.manual_buyer(&manual).await.unwrap(), Some(Buyer::PvhTommy));
    }

    #[tokio::test]
    async fn unknown_document_errors() {
        let store = MemoryStore::new();
        let missing = DocumentRef::new("nope");
        assert!(matches!(
            store.read_document(&missing).await,
            Err(PipelineError::DocumentUnavailable { .. })
        ));
        assert!(store.mark_processing(&missing).await.is_err());
    }
}
