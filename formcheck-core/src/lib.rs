// Formcheck Core Library
//
// Checks a PDF against a rule set: dominant font family and size, first-page
// margins, and page budgets for keyword-detected sections.
// Main interface: bytes + RuleSet → AnalysisReport.

pub mod config;
pub mod error;
pub mod preprocessors;
pub mod processor;
pub mod report;
pub mod rules;
pub mod types;

// Re-export main types and functions for easy use
pub use config::{ProfileRegistry, RuleSet};
pub use error::{AnalysisError, AnalysisResult};
pub use preprocessors::{PdfPreprocessor, Preprocessor};
pub use processor::{DocumentAnalyzer, PipelineStages, StepProfiler};
pub use report::{AnalysisReport, DetailedReport, Verdict};
pub use types::*;

/// Analyze PDF bytes against the default rule set.
pub fn analyze(bytes: &[u8]) -> AnalysisResult<AnalysisReport> {
    analyze_with_rules(bytes, &RuleSet::default())
}

pub fn analyze_with_rules(bytes: &[u8], rules: &RuleSet) -> AnalysisResult<AnalysisReport> {
    DocumentAnalyzer::new().analyze(bytes, rules)
}
