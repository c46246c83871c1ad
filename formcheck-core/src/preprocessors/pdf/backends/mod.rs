//! PDF Backend trait
//!
//! Defines the interface that PDF extraction backends implement. Every
//! backend produces the same `Document` shape:
//! - One Page per physical page, indexed from 0 in page-tree order
//! - One TextSpan per run of glyphs sharing font family, size and line
//! - Bounding boxes in a top-left-origin page space, in points

use crate::types::Document;
use anyhow::Result;

/// Backend trait for PDF extraction
pub trait PdfBackend: Send + Sync {
    /// Extract PDF bytes into a Document
    fn extract(&self, pdf_bytes: &[u8]) -> Result<Document>;

    /// Backend identifier for logging/debugging
    fn name(&self) -> &str;
}

pub mod lopdf_backend;

pub use lopdf_backend::LopdfBackend;
