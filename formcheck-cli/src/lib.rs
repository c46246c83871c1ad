// All analysis lives in formcheck-core
// This CLI acts as a thin wrapper around the core library

// CLI-specific modules
pub mod summary;

// Re-export core types for convenience
pub use formcheck_core::*;

// Re-export CLI utilities
pub use summary::{default_output_path, render_summary};
