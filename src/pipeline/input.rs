//! Input validation and the transient working copy.
//!
//! ## Why a working copy?
//!
//! The stored document may live anywhere (object storage, a database blob).
//! Each run materialises the bytes into a [`NamedTempFile`] so every later
//! stage reads one local, immutable copy, and the file disappears when the
//! [`WorkingCopy`] is dropped, whether the run succeeds, fails, panics or is
//! cancelled. PDF magic bytes (`%PDF`) are checked up front so a mislabelled
//! upload fails with a clear message rather than a parser error.

use crate::document::DocumentContent;
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Accepted document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Pdf,
    Jpeg,
    Png,
}

impl ContentKind {
    /// Resolve a file extension (with or without the leading dot).
    pub fn from_extension(extension: &str) -> Result<Self, PipelineError> {
        match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Ok(ContentKind::Pdf),
            "jpg" | "jpeg" => Ok(ContentKind::Jpeg),
            "png" => Ok(ContentKind::Png),
            _ => Err(PipelineError::UnsupportedFileType {
                extension: extension.to_string(),
            }),
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ContentKind::Pdf => "application/pdf",
            ContentKind::Jpeg => "image/jpeg",
            ContentKind::Png => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ContentKind::Pdf => "pdf",
            ContentKind::Jpeg => "jpg",
            ContentKind::Png => "png",
        }
    }

    pub fn is_pdf(self) -> bool {
        self == ContentKind::Pdf
    }
}

/// Check type, size and (for PDFs) magic bytes.
pub fn validate(content: &DocumentContent, max_bytes: usize) -> Result<ContentKind, PipelineError> {
    let kind = ContentKind::from_extension(&content.extension)?;

    let size = content.bytes.len();
    if size >= max_bytes {
        return Err(PipelineError::FileTooLarge {
            size,
            limit: max_bytes,
        });
    }

    if kind.is_pdf() && !content.bytes.starts_with(b"%PDF") {
        return Err(PipelineError::NotAPdf {
            filename: content.filename.clone(),
            magic: content.bytes.iter().take(4).copied().collect(),
        });
    }

    debug!("Validated {} ({} bytes, {})", content.filename, size, kind.mime_type());
    Ok(kind)
}

/// A local, self-deleting copy of the document being processed.
#[derive(Debug)]
pub struct WorkingCopy {
    file: NamedTempFile,
    kind: ContentKind,
}

impl WorkingCopy {
    /// Write `content` to a fresh temporary file.
    pub async fn create(content: &DocumentContent, kind: ContentKind) -> Result<Self, PipelineError> {
        let file = tempfile::Builder::new()
            .prefix("po-extract-")
            .suffix(&format!(".{}", kind.extension()))
            .tempfile()
            .map_err(|source| PipelineError::WorkingCopy {
                path: std::env::temp_dir(),
                source,
            })?;

        tokio::fs::write(file.path(), &content.bytes)
            .await
            .map_err(|source| PipelineError::WorkingCopy {
                path: file.path().to_path_buf(),
                source,
            })?;

        debug!("Working copy at {}", file.path().display());
        Ok(Self { file, kind })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    /// Read the working copy back.
    pub async fn read(&self) -> Result<Vec<u8>, PipelineError> {
        tokio::fs::read(self.path())
            .await
            .map_err(|source| PipelineError::WorkingCopy {
                path: self.path().to_path_buf(),
                source,
            })
    }

    /// Delete the file now, reporting any error.
    pub fn release(self) {
        let path = self.file.path().to_path_buf();
        if let Err(e) = self.file.close() {
            warn!("Failed to remove working copy {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(name: &str, ext: &str, bytes: &[u8]) -> DocumentContent {
        DocumentContent {
            bytes: bytes.to_vec(),
            filename: name.to_string(),
            extension: ext.to_string(),
        }
    }

    #[test]
    fn extensions_resolve() {
        assert_eq!(ContentKind::from_extension(".PDF").unwrap(), ContentKind::Pdf);
        assert_eq!(ContentKind::from_extension("jpeg").unwrap().mime_type(), "image/jpeg");
        assert_eq!(ContentKind::from_extension("png").unwrap(), ContentKind::Png);
        assert!(matches!(
            ContentKind::from_extension("docx"),
            Err(PipelineError::UnsupportedFileType { .. })
        ));
    }

    #[test]
    fn rejects_oversized_files() {
        let c = content("big.pdf", "pdf", &[b'%'; 64]);
        let err = validate(&c, 64).unwrap_err();
        assert!(matches!(err, PipelineError::FileTooLarge { size: 64, limit: 64 }));
    }

    #[test]
    fn rejects_pdf_without_magic() {
        let c = content("fake.pdf", "pdf", b"PK\x03\x04zip");
        let err = validate(&c, 1024).unwrap_err();
        assert!(matches!(err, PipelineError::NotAPdf { ref magic, .. } if magic == b"PK\x03\x04"));
    }

    #[test]
    fn accepts_images_without_pdf_magic() {
        let c = content("scan.png", "png", b"\x89PNG....");
        assert_eq!(validate(&c, 1024).unwrap(), ContentKind::Png);
    }

    #[tokio::test]
    async fn working_copy_round_trips_and_cleans_up() {
        let c = content("po.pdf", "pdf", b"%PDF-1.5 body");
        let copy = WorkingCopy::create(&c, ContentKind::Pdf).await.unwrap();
        let path = copy.path().to_path_buf();
        assert_eq!(path.extension().unwrap(), "pdf");
        assert_eq!(copy.read().await.unwrap(), b"%PDF-1.5 body");

        drop(copy);
        assert!(!path.exists());
    }
}
