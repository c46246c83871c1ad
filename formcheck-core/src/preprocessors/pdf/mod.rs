//! PDF Preprocessor
//!
//! Main preprocessor for PDF documents. Uses a pluggable backend to parse the
//! file structure and interpret page content streams into positioned spans.

pub mod backends;
pub mod content;
pub mod fonts;

use crate::error::{AnalysisError, AnalysisResult};
use crate::preprocessors::traits::Preprocessor;
use crate::types::Document;
use anyhow::Result;
use std::path::Path;

pub use backends::{LopdfBackend, PdfBackend};

/// The header may be preceded by junk; readers look this far in
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Backend enum for runtime backend selection
pub enum PdfBackendImpl {
    Lopdf(LopdfBackend),
}

impl PdfBackend for PdfBackendImpl {
    fn extract(&self, pdf_bytes: &[u8]) -> Result<Document> {
        match self {
            PdfBackendImpl::Lopdf(backend) => backend.extract(pdf_bytes),
        }
    }

    fn name(&self) -> &str {
        match self {
            PdfBackendImpl::Lopdf(backend) => backend.name(),
        }
    }
}

/// PDF Preprocessor with pluggable backend
///
/// Rejects anything that is not a PDF before the backend sees it, and turns
/// every backend failure into a single `AnalysisError::Format`.
pub struct PdfPreprocessor {
    backend: PdfBackendImpl,
}

impl PdfPreprocessor {
    pub fn new() -> Self {
        Self::with_backend(PdfBackendImpl::Lopdf(LopdfBackend::new()))
    }

    pub fn with_backend(backend: PdfBackendImpl) -> Self {
        Self { backend }
    }

    /// Get the backend name for logging
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }
}

impl Default for PdfPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// True when a `%PDF-` marker appears near the start of the input
pub fn has_pdf_header(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    window.windows(5).any(|w| w == b"%PDF-")
}

impl Preprocessor for PdfPreprocessor {
    fn load(&self, bytes: &[u8]) -> AnalysisResult<Document> {
        if !has_pdf_header(bytes) {
            return Err(AnalysisError::Format(
                "missing %PDF- header".to_string(),
            ));
        }

        let document = self
            .backend
            .extract(bytes)
            .map_err(|e| AnalysisError::Format(format!("{e:#}")))?;

        if document.pages.is_empty() {
            return Err(AnalysisError::Format("document has no pages".to_string()));
        }

        tracing::debug!(
            backend = self.backend.name(),
            pages = document.page_count(),
            spans = document.total_spans(),
            "Loaded PDF"
        );
        Ok(document)
    }

    fn name(&self) -> &str {
        "PdfPreprocessor"
    }

    fn supports_file_type(&self, path: &Path) -> bool {
        if let Some(extension) = path.extension() {
            matches!(
                extension.to_str().unwrap_or("").to_lowercase().as_str(),
                "pdf"
            )
        } else {
            false
        }
    }
}
