//! Document Splitter.
//!
//! Large multi-PO documents blow past the model's output budget, so a
//! document holding more than `split_threshold` distinct POs is cut into
//! page-range batches of at most `batch_size` POs each.
//!
//! ## How boundaries are found
//!
//! Every page's text is tested against three marker patterns in priority
//! order; the first one that matches yields the page's PO identifier. A PO
//! starts on the first page its identifier appears on and ends the page
//! before the next PO starts. Later pages repeating an identifier already
//! seen are treated as continuation pages, even when non-contiguous.
//!
//! ## Coverage
//!
//! The first batch always starts at page 1 and the last PO always ends on the
//! last page, so the batch ranges partition the document exactly.
//!
//! ## Temporary files
//!
//! [`DocumentSplitter::materialize`] writes one batch at a time into a
//! [`NamedTempFile`] owned by the returned [`PoBatch`]. Dropping the batch
//! deletes the file, on every exit path.

use crate::config::ExtractionConfig;
use crate::error::PipelineError;
use crate::pipeline::text::PdfText;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

static PO_MARKERS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        r"PO NUMBER\s+([A-Z]?\d+)",
        r"Purchase Order#?\s*([A-Z]?\d+)",
        r"PO Number:\s*([A-Z]?\d+)",
    ]
    .map(|p| {
        RegexBuilder::new(p)
            .case_insensitive(true)
            .build()
            .expect("valid PO marker pattern")
    })
});

/// Where one PO sits in the document (pages are 1-based, inclusive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoMarker {
    pub po_number: String,
    pub start_page: u32,
    pub end_page: u32,
}

/// One planned batch: a contiguous page range and the POs it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchPlan {
    /// 1-based batch number.
    pub index: usize,
    pub start_page: u32,
    pub end_page: u32,
    pub po_numbers: Vec<String>,
}

impl BatchPlan {
    pub fn po_count(&self) -> usize {
        self.po_numbers.len()
    }

    pub fn page_count(&self) -> u32 {
        (self.end_page + 1).saturating_sub(self.start_page)
    }
}

/// The outcome of scanning a document.
#[derive(Debug, Clone, Serialize)]
pub struct SplitPlan {
    pub page_count: u32,
    pub markers: Vec<PoMarker>,
    pub split: bool,
    pub batches: Vec<BatchPlan>,
}

impl SplitPlan {
    pub fn po_count(&self) -> usize {
        self.markers.len()
    }
}

/// A materialised batch. Owns its temporary PDF; dropping it deletes the file.
#[derive(Debug)]
pub struct PoBatch {
    plan: BatchPlan,
    file: NamedTempFile,
}

impl PoBatch {
    pub fn plan(&self) -> &BatchPlan {
        &self.plan
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the temporary file now, reporting any error.
    pub fn release(self) {
        let path = self.file.path().to_path_buf();
        if let Err(e) = self.file.close() {
            warn!("Failed to remove batch file {}: {}", path.display(), e);
        }
    }
}

/// Decides on and performs page-range splitting.
#[derive(Debug, Clone, Copy)]
pub struct DocumentSplitter {
    split_threshold: usize,
    batch_size: usize,
}

impl DocumentSplitter {
    pub fn new(split_threshold: usize, batch_size: usize) -> Self {
        Self {
            split_threshold,
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config.split_threshold, config.batch_size)
    }

    /// True iff `po_count` exceeds the threshold.
    pub fn should_split(&self, po_count: usize) -> bool {
        po_count > self.split_threshold
    }

    /// Find the first page of every distinct PO and derive its page range.
    pub fn find_po_markers(pdf: &PdfText) -> Vec<PoMarker> {
        let page_count = pdf.page_count();
        let mut seen = HashSet::new();
        let mut starts: Vec<(String, u32)> = Vec::new();

        for (page, text) in pdf.pages() {
            let Some(po) = first_marker(&text) else {
                continue;
            };
            if seen.insert(po.clone()) {
                starts.push((po, page));
            }
        }

        let mut markers = Vec::with_capacity(starts.len());
        for (i, (po_number, start_page)) in starts.iter().enumerate() {
            let end_page = match starts.get(i + 1) {
                Some((_, next)) => next - 1,
                None => page_count,
            };
            markers.push(PoMarker {
                po_number: po_number.clone(),
                start_page: *start_page,
                end_page,
            });
        }
        markers
    }

    /// Group markers into batches.
    ///
    /// Without a split, returns one batch spanning the whole document.
    pub fn plan_batches(&self, markers: &[PoMarker], page_count: u32) -> Vec<BatchPlan> {
        if !self.should_split(markers.len()) {
            return vec![BatchPlan {
                index: 1,
                start_page: 1,
                end_page: page_count,
                po_numbers: markers.iter().map(|m| m.po_number.clone()).collect(),
            }];
        }

        markers
            .chunks(self.batch_size)
            .enumerate()
            .filter_map(|(i, chunk)| {
                let first = chunk.first()?;
                let last = chunk.last()?;
                Some(BatchPlan {
                    index: i + 1,
                    start_page: if i == 0 { 1 } else { first.start_page },
                    end_page: last.end_page,
                    po_numbers: chunk.iter().map(|m| m.po_number.clone()).collect(),
                })
            })
            .collect()
    }

    /// Parse a PDF, find its POs and plan batches.
    pub fn analyze(&self, bytes: &[u8]) -> Result<SplitPlan, PipelineError> {
        let pdf = PdfText::parse(bytes).map_err(|e| PipelineError::UnreadablePdf {
            detail: e.to_string(),
        })?;
        let page_count = pdf.page_count();
        let markers = Self::find_po_markers(&pdf);
        let split = self.should_split(markers.len());
        let batches = self.plan_batches(&markers, page_count);

        info!(
            "Found {} PO(s) across {} page(s); {}",
            markers.len(),
            page_count,
            if split {
                format!("splitting into {} batches", batches.len())
            } else {
                "no split needed".to_string()
            }
        );
        for m in &markers {
            debug!("PO {} on pages {}-{}", m.po_number, m.start_page, m.end_page);
        }

        Ok(SplitPlan {
            page_count,
            markers,
            split,
            batches,
        })
    }

    /// Write a new PDF holding exactly the batch's pages.
    pub fn materialize(&self, bytes: &[u8], plan: &BatchPlan) -> Result<PoBatch, PipelineError> {
        let fail = |detail: String| PipelineError::SplitFailed {
            batch: plan.index,
            start_page: plan.start_page,
            end_page: plan.end_page,
            detail,
        };

        let mut doc = lopdf::Document::load_mem(bytes).map_err(|e| fail(e.to_string()))?;
        let total = doc.get_pages().len() as u32;
        if plan.start_page < 1 || plan.end_page > total || plan.start_page > plan.end_page {
            return Err(fail(format!("document has {total} pages")));
        }

        let outside: Vec<u32> = (1..=total)
            .filter(|p| *p < plan.start_page || *p > plan.end_page)
            .collect();
        doc.delete_pages(&outside);
        doc.prune_objects();

        let mut file = tempfile::Builder::new()
            .prefix("po-batch-")
            .suffix(".pdf")
            .tempfile()
            .map_err(|e| fail(e.to_string()))?;
        doc.save_to(&mut file).map_err(|e| fail(e.to_string()))?;

        debug!(
            "Batch {}: pages {}-{} written to {}",
            plan.index,
            plan.start_page,
            plan.end_page,
            file.path().display()
        );
        Ok(PoBatch {
            plan: plan.clone(),
            file,
        })
    }

    /// Analyse and materialise every batch up front.
    ///
    /// Returns an empty vector when no split is needed. The orchestrator
    /// materialises lazily instead; this is for callers that want all files.
    pub fn split_into_batches(&self, bytes: &[u8]) -> Result<Vec<PoBatch>, PipelineError> {
        let plan = self.analyze(bytes)?;
        if !plan.split {
            return Ok(Vec::new());
        }
        plan.batches
            .iter()
            .map(|b| self.materialize(bytes, b))
            .collect()
    }
}

fn first_marker(text: &str) -> Option<String> {
    PO_MARKERS
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::text::fixtures::build_pdf;

    fn po_pages(n: usize) -> Vec<Vec<String>> {
        (0..n)
            .map(|i| vec![format!("PO NUMBER {}", 4500 + i), "Size M Qty 10".to_string()])
            .collect()
    }

    fn pdf_from(pages: &[Vec<String>]) -> Vec<u8> {
        let owned: Vec<Vec<&str>> = pages
            .iter()
            .map(|p| p.iter().map(String::as_str).collect())
            .collect();
        let refs: Vec<&[&str]> = owned.iter().map(Vec::as_slice).collect();
        build_pdf(&refs)
    }

    #[test]
    fn marker_priority_per_page() {
        assert_eq!(first_marker("PO NUMBER 123 Purchase Order# 999"), Some("123".into()));
        assert_eq!(first_marker("Purchase Order#A77"), Some("A77".into()));
        assert_eq!(first_marker("PO Number: 4300158881"), Some("4300158881".into()));
        assert_eq!(first_marker("no marker"), None);
    }

    #[test]
    fn markers_ignore_case() {
        assert_eq!(first_marker("Purchase order# 2500043993"), Some("2500043993".into()));
        assert_eq!(first_marker("PURCHASE ORDER# t530038084"), Some("t530038084".into()));
        assert_eq!(first_marker("po number 123"), Some("123".into()));
        assert_eq!(first_marker("Po Number: 88"), Some("88".into()));
    }

    #[test]
    fn continuation_pages_extend_previous_po() {
        let bytes = build_pdf(&[
            &["PO NUMBER 1"],
            &["continued"],
            &["PO NUMBER 2"],
            &["PO NUMBER 1"],
            &["PO NUMBER 3"],
        ]);
        let pdf = PdfText::parse(&bytes).unwrap();
        let markers = DocumentSplitter::find_po_markers(&pdf);
        let summary: Vec<_> = markers
            .iter()
            .map(|m| (m.po_number.as_str(), m.start_page, m.end_page))
            .collect();
        assert_eq!(summary, vec![("1", 1, 2), ("2", 3, 4), ("3", 5, 5)]);
    }

    #[test]
    fn threshold_is_exclusive() {
        let s = DocumentSplitter::new(5, 5);
        assert!(!s.should_split(5));
        assert!(s.should_split(6));
    }

    #[test]
    fn at_threshold_one_batch_covers_document() {
        let bytes = pdf_from(&po_pages(5));
        let plan = DocumentSplitter::new(5, 5).analyze(&bytes).unwrap();
        assert!(!plan.split);
        assert_eq!(plan.batches.len(), 1);
        assert_eq!((plan.batches[0].start_page, plan.batches[0].end_page), (1, 5));
        assert_eq!(plan.batches[0].po_count(), 5);
    }

    #[test]
    fn twelve_pos_make_three_batches_partitioning_pages() {
        let mut pages = vec![vec!["Cover sheet".to_string()]];
        pages.extend(po_pages(12));
        let bytes = pdf_from(&pages);

        let plan = DocumentSplitter::new(5, 5).analyze(&bytes).unwrap();
        assert!(plan.split);
        let counts: Vec<_> = plan.batches.iter().map(BatchPlan::po_count).collect();
        assert_eq!(counts, vec![5, 5, 2]);

        let mut expected_next = 1;
        for b in &plan.batches {
            assert_eq!(b.start_page, expected_next);
            assert!(b.end_page >= b.start_page);
            expected_next = b.end_page + 1;
        }
        assert_eq!(expected_next, plan.page_count + 1);
    }

    #[test]
    fn materialized_batch_holds_only_its_pages() {
        let bytes = pdf_from(&po_pages(7));
        let splitter = DocumentSplitter::new(5, 5);
        let plan = splitter.analyze(&bytes).unwrap();
        let second = &plan.batches[1];
        let batch = splitter.materialize(&bytes, second).unwrap();

        let path = batch.path().to_path_buf();
        let written = std::fs::read(&path).unwrap();
        let pdf = PdfText::parse(&written).unwrap();
        assert_eq!(pdf.page_count(), 2);
        assert!(pdf.page_text(1).contains("4505"));

        batch.release();
        assert!(!path.exists());
    }

    #[test]
    fn dropping_batch_removes_file() {
        let bytes = pdf_from(&po_pages(7));
        let batches = DocumentSplitter::new(5, 5).split_into_batches(&bytes).unwrap();
        assert_eq!(batches.len(), 2);
        let paths: Vec<_> = batches.iter().map(|b| b.path().to_path_buf()).collect();
        assert!(paths.iter().all(|p| p.exists()));
        drop(batches);
        assert!(paths.iter().all(|p| !p.exists()));
    }

    #[test]
    fn out_of_range_plan_fails() {
        let bytes = pdf_from(&po_pages(2));
        let bad = BatchPlan {
            index: 1,
            start_page: 2,
            end_page: 9,
            po_numbers: vec![],
        };
        let err = DocumentSplitter::new(5, 5).materialize(&bytes, &bad).unwrap_err();
        assert!(matches!(err, PipelineError::SplitFailed { batch: 1, .. }));
    }

    #[test]
    fn textless_pdf_is_not_split() {
        let bytes = build_pdf(&[&[], &[]]);
        let plan = DocumentSplitter::new(5, 5).analyze(&bytes).unwrap();
        assert_eq!(plan.po_count(), 0);
        assert!(!plan.split);
        assert_eq!(plan.batches.len(), 1);
    }
}
