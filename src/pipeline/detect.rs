//! Buyer Detector.
//!
//! Tests the text of the first pages against each buyer's patterns in
//! [`Buyer::ALL`] order and returns the first buyer with any match. Never
//! fails: unreadable PDFs and empty text layers both mean "no buyer".

use crate::buyer::Buyer;
use crate::pipeline::text::PdfText;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

static DETECTION_TABLE: Lazy<Vec<(Buyer, Vec<Regex>)>> = Lazy::new(|| {
    Buyer::ALL
        .iter()
        .map(|&buyer| {
            let patterns = buyer
                .profile()
                .detection_patterns
                .iter()
                .map(|p| {
                    RegexBuilder::new(p)
                        .case_insensitive(true)
                        .build()
                        .expect("valid detection pattern")
                })
                .collect();
            (buyer, patterns)
        })
        .collect()
});

/// Match already-extracted text against the detection table.
pub fn detect_in_text(text: &str) -> Option<Buyer> {
    DETECTION_TABLE
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|re| re.is_match(text)))
        .map(|(buyer, _)| *buyer)
}

/// Detect the buyer of a PDF from the text of its first `pages` pages.
pub fn detect_buyer(bytes: &[u8], pages: usize) -> Option<Buyer> {
    let pdf = match PdfText::parse(bytes) {
        Ok(pdf) => pdf,
        Err(e) => {
            warn!("Buyer detection could not read PDF: {}", e);
            return None;
        }
    };

    let text = pdf.leading_text(pages);
    if text.trim().is_empty() {
        debug!("No text layer in the first {} page(s)", pages);
        return None;
    }

    let buyer = detect_in_text(&text);
    debug!("Detected buyer: {:?}", buyer);
    buyer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::text::fixtures::build_pdf;

    #[test]
    fn matches_case_insensitively() {
        assert_eq!(detect_in_text("levi   strauss & co"), Some(Buyer::Levis));
        assert_eq!(detect_in_text("Tommy Hilfiger Europe"), Some(Buyer::PvhTommy));
        assert_eq!(detect_in_text("pvh corp"), Some(Buyer::PvhTommy));
        assert_eq!(detect_in_text("Gap Inc."), None);
    }

    #[test]
    fn earlier_buyer_wins_on_tie() {
        assert_eq!(detect_in_text("PVH sourcing for LEVIS"), Some(Buyer::Levis));
    }

    #[test]
    fn reads_only_leading_pages() {
        let bytes = build_pdf(&[&["Invoice"], &["Terms"], &["TOMMY HILFIGER"]]);
        assert_eq!(detect_buyer(&bytes, 2), None);
        assert_eq!(detect_buyer(&bytes, 3), Some(Buyer::PvhTommy));
    }

    #[test]
    fn detects_from_pdf() {
        let bytes = build_pdf(&[&["Levi Strauss Global Trading", "PO NUMBER 4531021625"]]);
        assert_eq!(detect_buyer(&bytes, 2), Some(Buyer::Levis));
    }

    #[test]
    fn unreadable_or_textless_input_is_none() {
        assert_eq!(detect_buyer(b"%PDF-1.4 truncated", 2), None);
        assert_eq!(detect_buyer(&build_pdf(&[&[]]), 2), None);
    }
}
