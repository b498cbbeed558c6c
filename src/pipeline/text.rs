//! PDF text-layer access.
//!
//! Detection, splitting and the fallback parser all read the embedded text
//! layer through [`PdfText`]. This is not OCR: a scanned, image-only PDF
//! yields empty strings, which callers treat as "nothing recognisable".
//!
//! `lopdf` parsing is CPU-bound and synchronous; async callers run it inside
//! `spawn_blocking`.

use lopdf::Document;
use tracing::debug;

/// A parsed PDF, ready for page-wise text extraction.
pub struct PdfText {
    document: Document,
}

impl PdfText {
    /// Parse PDF bytes. Fails for anything `lopdf` cannot load.
    pub fn parse(bytes: &[u8]) -> Result<Self, lopdf::Error> {
        let document = Document::load_mem(bytes)?;
        Ok(Self { document })
    }

    pub fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }

    /// Text of one page (1-based). Pages whose content cannot be decoded
    /// read as `""`.
    pub fn page_text(&self, page: u32) -> String {
        match self.document.extract_text(&[page]) {
            Ok(text) => text,
            Err(e) => {
                debug!("No text layer on page {}: {}", page, e);
                String::new()
            }
        }
    }

    /// Concatenated text of the first `pages` pages.
    pub fn leading_text(&self, pages: usize) -> String {
        let last = (pages as u32).min(self.page_count());
        (1..=last)
            .map(|p| self.page_text(p))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// `(page_number, text)` for every page, in order.
    pub fn pages(&self) -> impl Iterator<Item = (u32, String)> + '_ {
        (1..=self.page_count()).map(move |p| (p, self.page_text(p)))
    }

    /// Entire text layer, pages separated by newlines.
    pub fn full_text(&self) -> String {
        self.leading_text(self.page_count() as usize)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::build_pdf;
    use super::*;

    #[test]
    fn reads_text_per_page() {
        let bytes = build_pdf(&[&["LEVI STRAUSS", "PO NUMBER 111"], &["PO NUMBER 222"]]);
        let pdf = PdfText::parse(&bytes).unwrap();
        assert_eq!(pdf.page_count(), 2);
        assert!(pdf.page_text(1).contains("LEVI STRAUSS"));
        assert!(pdf.page_text(2).contains("222"));
        assert!(!pdf.page_text(2).contains("LEVI"));
    }

    #[test]
    fn leading_text_stops_at_requested_pages() {
        let bytes = build_pdf(&[&["first"], &["second"], &["third"]]);
        let pdf = PdfText::parse(&bytes).unwrap();
        let text = pdf.leading_text(2);
        assert!(text.contains("first") && text.contains("second"));
        assert!(!text.contains("third"));
        assert!(pdf.leading_text(10).contains("third"));
    }

    #[test]
    fn blank_page_reads_empty() {
        let bytes = build_pdf(&[&[]]);
        let pdf = PdfText::parse(&bytes).unwrap();
        assert!(pdf.page_text(1).trim().is_empty());
    }

    #[test]
    fn garbage_fails_to_parse() {
        assert!(PdfText::parse(b"not a pdf at all").is_err());
    }
}
