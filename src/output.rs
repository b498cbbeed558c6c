//! Run result types.

use crate::buyer::Buyer;
use crate::row::{header_labels, CanonicalRow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a run obtained its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// One request over the whole document.
    Single,
    /// Page-range batches, one request each.
    Split,
    /// Regex parsing of the PDF text layer.
    TextFallback,
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExtractionMethod::Single => "single",
            ExtractionMethod::Split => "split",
            ExtractionMethod::TextFallback => "text_fallback",
        })
    }
}

/// The payload handed to `mark_completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub extraction_method: ExtractionMethod,
    pub buyer: Buyer,
    /// Canonical rows in extraction order.
    #[serde(rename = "excel_data")]
    pub rows: Vec<CanonicalRow>,
    pub total_line_items: usize,
    pub total_pos: usize,
    /// Set only for split runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batches_processed: Option<usize>,
    pub processed_at: DateTime<Utc>,
}

impl ExtractionResult {
    /// Rows as tab-separated text with the export labels as the first line.
    ///
    /// Tabs and newlines inside cells are replaced by spaces.
    pub fn to_tsv(&self) -> String {
        let mut out = header_labels().join("\t");
        out.push('\n');
        for row in &self.rows {
            let cells: Vec<String> = row
                .values()
                .iter()
                .map(|v| v.replace(['\t', '\n', '\r'], " "))
                .collect();
            out.push_str(&cells.join("\t"));
            out.push('\n');
        }
        out
    }
}
