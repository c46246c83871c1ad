// Preprocessor abstraction for document loading
//
// This module defines the boundary between document loading (bytes -> Document)
// and analysis (Document -> metrics -> report). Everything after this point
// works with Pages and TextSpans and is format-agnostic.

use crate::error::AnalysisResult;
use crate::types::Document;
use std::path::Path;

/// Preprocessor trait - converts raw document bytes into a Document
///
/// Preprocessors handle:
/// - Document format parsing
/// - Text extraction with font and position per span
/// - Page geometry
///
/// A preprocessor never mutates its input and either returns a complete
/// Document or an `AnalysisError::Format`.
pub trait Preprocessor: Send + Sync {
    /// Parse bytes into a Document
    fn load(&self, bytes: &[u8]) -> AnalysisResult<Document>;

    /// Convenience method: Process from file path
    fn load_file(&self, input: &Path) -> AnalysisResult<Document> {
        let bytes = std::fs::read(input)?;
        self.load(&bytes)
    }

    /// Get preprocessor name for debugging/logging
    fn name(&self) -> &str;

    /// Check if preprocessor supports the given file type
    fn supports_file_type(&self, path: &Path) -> bool;
}
