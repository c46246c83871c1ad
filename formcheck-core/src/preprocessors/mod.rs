//! Document Preprocessors
//!
//! This module provides the loading layer that turns raw document bytes into
//! the page-and-span `Document` every analyzer consumes.
//!
//! ## Architecture
//!
//! ```text
//! Document bytes (PDF)
//!     ↓
//! [Format-specific Preprocessor]
//!     ↓
//! Document { pages: [Page { spans: [TextSpan] }] }
//!     ↓
//! [Font / Margin / Section analyzers]
//! ```
//!
//! ## Available Preprocessors
//!
//! - `PdfPreprocessor` - PDF documents via the lopdf backend

pub mod pdf;
pub mod traits;

// Re-export main types
pub use pdf::{LopdfBackend, PdfBackend, PdfBackendImpl, PdfPreprocessor};
pub use traits::Preprocessor;
