//! Document encoding: raw bytes → base64 payload with its MIME type.
//!
//! Multimodal APIs accept the whole document inline in the JSON request body.
//! The document is sent as-is (no rasterisation): Gemini reads PDFs natively
//! and keeps the text layer, which matters for small print in size tables.

use crate::pipeline::input::ContentKind;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use tracing::debug;

/// A document ready to embed in an inference request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineDocument {
    pub mime_type: &'static str,
    /// Standard base64, no line breaks.
    pub data: String,
}

impl InlineDocument {
    /// Wrap as an `edgequake-llm` attachment for chat-completion providers.
    pub fn to_image_data(&self) -> ImageData {
        ImageData::new(self.data.clone(), self.mime_type)
    }
}

/// Base64-encode a document.
pub fn encode_document(bytes: &[u8], kind: ContentKind) -> InlineDocument {
    let data = STANDARD.encode(bytes);
    debug!("Encoded {} bytes → {} bytes base64 ({})", bytes.len(), data.len(), kind.mime_type());
    InlineDocument {
        mime_type: kind.mime_type(),
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_with_mime_type() {
        let doc = encode_document(b"%PDF-1.5", ContentKind::Pdf);
        assert_eq!(doc.mime_type, "application/pdf");
        assert_eq!(STANDARD.decode(&doc.data).unwrap(), b"%PDF-1.5");
        assert!(!doc.data.contains('\n'));
    }

    #[test]
    fn converts_to_attachment() {
        let img = encode_document(b"\x89PNG", ContentKind::Png).to_image_data();
        assert_eq!(img.mime_type, "image/png");
        assert!(!img.data.is_empty());
    }
}
